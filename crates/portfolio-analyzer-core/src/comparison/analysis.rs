use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::models::{ModelCatalog, ModelMatch, ModelMatcher};
use crate::aggregation::combine::{combine_portfolios, PortfolioSpec};
use crate::aggregation::ledger::project_each;
use crate::error::PortfolioAnalyticsError;
use crate::historical::analysis::{analyze_historical, HistoricalPerformance, HistoricalWindow};
use crate::historical::prices::PriceSource;
use crate::holdings::{AssetClassifier, HoldingDetail, Portfolio};
use crate::projection::forward::{
    portfolio_projection_input, project, ProjectionResult, DEFAULT_PROJECTION_YEARS,
};
use crate::types::{
    with_metadata, AccountType, AssetAllocation, ComputationOutput, ExpenseRatios, Holdings, Money, Rate,
    Weights,
};
use crate::PortfolioAnalyticsResult;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A single account to compare against the closest model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub holdings: Holdings,
    #[serde(default)]
    pub advisory_fee: Rate,
    #[serde(default)]
    pub asset_class_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub annual_cash_flow: Money,
    #[serde(default)]
    pub tax_rate: Rate,
    #[serde(default = "default_years")]
    pub years: i32,
}

/// Several accounts compared, as one combined book, against the closest model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateAnalysisRequest {
    pub portfolios: Vec<PortfolioSpec>,
    #[serde(default)]
    pub tax_rate: Rate,
    #[serde(default = "default_years")]
    pub years: i32,
}

fn default_years() -> i32 {
    DEFAULT_PROJECTION_YEARS
}

/// Price history to backtest both sides of a comparison over.
pub struct HistoryConfig<'a> {
    pub source: &'a dyn PriceSource,
    pub window: HistoricalWindow,
}

/// Collaborators shared by every comparison.
pub struct AnalysisContext<'a> {
    pub catalog: &'a ModelCatalog,
    pub matcher: &'a dyn ModelMatcher,
    pub classifier: &'a dyn AssetClassifier,
    pub expense_ratios: &'a ExpenseRatios,
    /// Historical backtests are skipped when absent.
    pub history: Option<HistoryConfig<'a>>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub total_value: Money,
    pub weights: Weights,
    pub weighted_avg_er: Rate,
    pub asset_class_allocation: AssetAllocation,
    pub advisory_fee: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAnalysis {
    /// (weighted ER + advisory fee) × total value for the current holdings.
    pub current_annual_fee: Money,
    pub model_annual_fee: Money,
    pub annual_savings: Money,
    /// Cumulative projected fees over the horizon.
    pub current_total_fees: Money,
    pub model_total_fees: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionPair {
    pub current: ProjectionResult,
    pub model: ProjectionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPair {
    pub current: Option<HistoricalPerformance>,
    pub model: Option<HistoricalPerformance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub current_portfolio: PortfolioSnapshot,
    pub model_portfolio: PortfolioSnapshot,
    pub model_name: String,
    pub similarity: Decimal,
    pub projections: ProjectionPair,
    pub historical_performance: Option<HistoricalPair>,
    pub fee_analysis: FeeAnalysis,
    pub current_holdings: Vec<HoldingDetail>,
    pub model_holdings: Vec<HoldingDetail>,
}

// ---------------------------------------------------------------------------
// Single account
// ---------------------------------------------------------------------------

/// Compare one account with its closest model: both are projected with the same
/// cash flow, tax rate and account type, and their annual fee drag is compared.
pub fn analyze_portfolio(
    request: &AnalysisRequest,
    ctx: &AnalysisContext<'_>,
) -> PortfolioAnalyticsResult<ComputationOutput<ComparisonReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if request.holdings.is_empty() {
        return Err(PortfolioAnalyticsError::InsufficientData(
            "Portfolio must have at least one holding".into(),
        ));
    }
    ctx.catalog.validate()?;

    let current = Portfolio::new("Current", request.holdings.clone(), request.advisory_fee)?
        .with_overrides(request.asset_class_overrides.clone());
    let (model_match, model) = match_model(&current, ctx)?;

    let current_projection = project(&portfolio_projection_input(
        &current,
        ctx.classifier,
        ctx.expense_ratios,
        &ctx.catalog.growth_rates,
        request.annual_cash_flow,
        request.tax_rate,
        request.account_type,
        request.years,
    ))?;
    let model_projection = project(&portfolio_projection_input(
        &model,
        ctx.classifier,
        ctx.expense_ratios,
        &ctx.catalog.growth_rates,
        request.annual_cash_flow,
        request.tax_rate,
        request.account_type,
        request.years,
    ))?;
    warnings.extend(current_projection.warnings);
    warnings.extend(model_projection.warnings);

    let historical_performance = backtest(&current, &model, ctx, &mut warnings);
    let report = build_report(
        &current,
        &model,
        model_match,
        ProjectionPair {
            current: current_projection.result,
            model: model_projection.result,
        },
        historical_performance,
        ctx,
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Model comparison (value-matched model, identical cash flow, tax and account treatment)",
        &serde_json::json!({
            "model": report.model_name,
            "model_fee": ctx.catalog.model_fee.to_string(),
            "account_type": request.account_type.to_string(),
            "tax_rate": request.tax_rate.to_string(),
            "annual_cash_flow": request.annual_cash_flow.to_string(),
            "years": request.years,
        }),
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Multiple accounts
// ---------------------------------------------------------------------------

/// Compare several accounts with one model. The current side is projected account
/// by account; the model is projected as a single brokerage account carrying the
/// combined balance and the summed cash flow.
pub fn analyze_aggregate(
    request: &AggregateAnalysisRequest,
    ctx: &AnalysisContext<'_>,
) -> PortfolioAnalyticsResult<ComputationOutput<ComparisonReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    ctx.catalog.validate()?;
    let combined = combine_portfolios(&request.portfolios)?;
    let (model_match, model) = match_model(&combined.portfolio, ctx)?;

    let current_projection = project_each(
        &request.portfolios,
        ctx.classifier,
        ctx.expense_ratios,
        &ctx.catalog.growth_rates,
        request.tax_rate,
        request.years,
    )?;
    let model_projection = project(&portfolio_projection_input(
        &model,
        ctx.classifier,
        ctx.expense_ratios,
        &ctx.catalog.growth_rates,
        combined.total_annual_cash_flow,
        request.tax_rate,
        AccountType::Brokerage,
        request.years,
    ))?;
    warnings.extend(model_projection.warnings);

    let historical_performance = backtest(&combined.portfolio, &model, ctx, &mut warnings);
    let report = build_report(
        &combined.portfolio,
        &model,
        model_match,
        ProjectionPair {
            current: current_projection,
            model: model_projection.result,
        },
        historical_performance,
        ctx,
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Aggregate model comparison (per-account projection vs single brokerage model)",
        &serde_json::json!({
            "accounts": request.portfolios.len(),
            "model": report.model_name,
            "model_fee": ctx.catalog.model_fee.to_string(),
            "blended_advisory_fee": combined.portfolio.advisory_fee.to_string(),
            "total_annual_cash_flow": combined.total_annual_cash_flow.to_string(),
            "tax_rate": request.tax_rate.to_string(),
            "years": request.years,
        }),
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Ask the matcher for a model and size it to the current portfolio's value.
fn match_model(
    current: &Portfolio,
    ctx: &AnalysisContext<'_>,
) -> PortfolioAnalyticsResult<(ModelMatch, Portfolio)> {
    let total = current.total_value();
    if total <= Decimal::ZERO {
        return Err(PortfolioAnalyticsError::InsufficientData(format!(
            "Portfolio '{}' has no value to compare",
            current.name
        )));
    }
    let allocation = current.asset_class_allocation(ctx.classifier);
    let model_match = ctx
        .matcher
        .best_match(&allocation)
        .ok_or(PortfolioAnalyticsError::NoMatchingModel)?;
    tracing::debug!(model = %model_match.name, similarity = %model_match.similarity, "matched model");

    let dollars: Holdings = model_match
        .allocations
        .iter()
        .map(|(ticker, weight)| (ticker.clone(), total * weight))
        .collect();
    let model = Portfolio::new(&model_match.name, dollars, ctx.catalog.model_fee)?;
    Ok((model_match, model))
}

/// Backtest both sides; a failed backtest is reported as a warning rather than
/// failing the comparison.
fn backtest(
    current: &Portfolio,
    model: &Portfolio,
    ctx: &AnalysisContext<'_>,
    warnings: &mut Vec<String>,
) -> Option<HistoricalPair> {
    let history = ctx.history.as_ref()?;
    let mut run = |portfolio: &Portfolio| {
        match analyze_historical(portfolio, ctx.expense_ratios, history.source, &history.window) {
            Ok(out) => {
                warnings.extend(out.warnings);
                Some(out.result)
            }
            Err(e) => {
                warnings.push(format!("Historical analysis of '{}' unavailable: {e}", portfolio.name));
                None
            }
        }
    };
    let current = run(current);
    let model = run(model);
    Some(HistoricalPair { current, model })
}

fn snapshot(portfolio: &Portfolio, ctx: &AnalysisContext<'_>) -> PortfolioSnapshot {
    PortfolioSnapshot {
        total_value: portfolio.total_value(),
        weights: portfolio.weights(),
        weighted_avg_er: portfolio.weighted_avg_expense_ratio(ctx.expense_ratios),
        asset_class_allocation: portfolio.asset_class_allocation(ctx.classifier),
        advisory_fee: portfolio.advisory_fee,
    }
}

fn build_report(
    current: &Portfolio,
    model: &Portfolio,
    model_match: ModelMatch,
    projections: ProjectionPair,
    historical_performance: Option<HistoricalPair>,
    ctx: &AnalysisContext<'_>,
) -> ComparisonReport {
    let current_portfolio = snapshot(current, ctx);
    let model_portfolio = snapshot(model, ctx);
    let current_annual_fee =
        (current_portfolio.weighted_avg_er + current_portfolio.advisory_fee) * current_portfolio.total_value;
    let model_annual_fee =
        (model_portfolio.weighted_avg_er + model_portfolio.advisory_fee) * model_portfolio.total_value;
    let fee_analysis = FeeAnalysis {
        current_annual_fee,
        model_annual_fee,
        annual_savings: current_annual_fee - model_annual_fee,
        current_total_fees: projections.current.total_fees,
        model_total_fees: projections.model.total_fees,
    };

    ComparisonReport {
        current_portfolio,
        model_portfolio,
        model_name: model_match.name,
        similarity: model_match.similarity,
        projections,
        historical_performance,
        fee_analysis,
        current_holdings: current.detailed_holdings(ctx.classifier, ctx.expense_ratios),
        model_holdings: model.detailed_holdings(ctx.classifier, ctx.expense_ratios),
    }
}

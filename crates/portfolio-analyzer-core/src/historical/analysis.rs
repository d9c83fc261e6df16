use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::fees::{apply_expense_ratios, apply_fees};
use super::performance::{summarize, PerformanceStats};
use super::prices::{fetch_prices, PriceSource};
use super::returns::{compute_returns, individual_returns};
use crate::error::PortfolioAnalyticsError;
use crate::holdings::Portfolio;
use crate::types::{with_metadata, ComputationOutput, ExpenseRatios, Rate};
use crate::PortfolioAnalyticsResult;

/// Historical window and risk-free rate for a holdings-driven backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_risk_free")]
    pub risk_free_rate: Rate,
}

fn default_risk_free() -> Rate {
    super::performance::DEFAULT_RISK_FREE_RATE
}

/// Backtest of a portfolio with all fees, and with expense ratios only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPerformance {
    pub dates: Vec<NaiveDate>,
    pub with_fees: PerformanceStats,
    pub without_advisory: PerformanceStats,
    pub cumulative_with_fees: Vec<Rate>,
    pub cumulative_no_advisory: Vec<Rate>,
    pub individual_returns: BTreeMap<String, Rate>,
}

/// Fetch prices for the portfolio's holdings and summarise their static-weight
/// performance over the window.
pub fn analyze_historical(
    portfolio: &Portfolio,
    expense_ratios: &ExpenseRatios,
    source: &dyn PriceSource,
    window: &HistoricalWindow,
) -> PortfolioAnalyticsResult<ComputationOutput<HistoricalPerformance>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let weights = portfolio.weights();
    if weights.is_empty() {
        return Err(PortfolioAnalyticsError::InsufficientData(format!(
            "Portfolio '{}' has no value to weight",
            portfolio.name
        )));
    }

    let prices = fetch_prices(source, weights.keys(), window.start, window.end)?;
    let raw = compute_returns(&prices, &weights)?;
    let with_fees = apply_fees(&raw, portfolio.advisory_fee, expense_ratios, &weights)?;
    let no_advisory = apply_expense_ratios(&raw, expense_ratios, &weights)?;

    let fee_summary = summarize(&with_fees, window.risk_free_rate)?;
    let gross_summary = summarize(&no_advisory, window.risk_free_rate)?;

    if fee_summary.stats.risk_adjusted_return.is_none() {
        warnings.push("Zero volatility: risk-adjusted return is undefined".into());
    }
    if let (Some(first), Some(last)) = (raw.dates.first(), raw.dates.last()) {
        if (*last - *first).num_days() < 365 {
            warnings.push(format!(
                "Less than one year of aligned history ({first} to {last}); annualised figures are extrapolated"
            ));
        }
    }

    let output = HistoricalPerformance {
        dates: fee_summary.cumulative.dates.clone(),
        with_fees: fee_summary.stats,
        without_advisory: gross_summary.stats,
        cumulative_with_fees: fee_summary.cumulative.values,
        cumulative_no_advisory: gross_summary.cumulative.values,
        individual_returns: individual_returns(&prices)?,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical performance (static weights, daily-compounded advisory and expense-ratio drag)",
        &serde_json::json!({
            "portfolio": portfolio.name,
            "start": window.start.to_string(),
            "end": window.end.to_string(),
            "risk_free_rate": window.risk_free_rate.to_string(),
            "advisory_fee": portfolio.advisory_fee.to_string(),
            "periods_per_year": 252,
        }),
        warnings,
        elapsed,
        output,
    ))
}

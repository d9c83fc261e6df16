use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use portfolio_analyzer_core::historical::analysis::{analyze_historical, HistoricalWindow};
use portfolio_analyzer_core::historical::fees::apply_fees;
use portfolio_analyzer_core::historical::performance::{summarize, DEFAULT_RISK_FREE_RATE};
use portfolio_analyzer_core::historical::prices::{PriceTable, StaticPriceSource};
use portfolio_analyzer_core::historical::returns::{compute_returns, ReturnSeries};
use portfolio_analyzer_core::holdings::Portfolio;
use portfolio_analyzer_core::{ExpenseRatios, Holdings, Rate, Weights};

use crate::input;

/// Arguments for the weighted return series
#[derive(Args)]
pub struct ReturnsArgs {
    /// Path to JSON/YAML price table (ticker → [{date, price}])
    #[arg(long)]
    pub prices: Option<String>,

    /// Path to JSON/YAML ticker weights
    #[arg(long)]
    pub weights: Option<String>,
}

/// Arguments for fee-adjusting a return series
#[derive(Args)]
pub struct FeesArgs {
    /// Path to JSON/YAML with returns, advisory_fee, expense_ratios and weights
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for summarising a return series
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct PerformanceArgs {
    /// Path to JSON/YAML return series ({dates, returns})
    #[arg(long)]
    pub input: Option<String>,

    /// Annual risk-free rate for the risk-adjusted return
    #[arg(long, default_value = "0.02")]
    pub risk_free_rate: Decimal,
}

/// Arguments for a holdings-driven backtest
#[derive(Args)]
pub struct HistoricalArgs {
    /// Path to JSON/YAML with holdings, fees and the date window
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON/YAML price table covering every held ticker
    #[arg(long)]
    pub prices: String,
}

#[derive(Deserialize)]
struct ReturnsDocument {
    prices: PriceTable,
    weights: Weights,
}

#[derive(Deserialize)]
struct FeesDocument {
    returns: ReturnSeries,
    #[serde(default)]
    advisory_fee: Rate,
    #[serde(default)]
    expense_ratios: ExpenseRatios,
    #[serde(default)]
    weights: Weights,
}

#[derive(Deserialize)]
struct HistoricalDocument {
    holdings: Holdings,
    #[serde(default)]
    advisory_fee: Rate,
    #[serde(default)]
    asset_class_overrides: BTreeMap<String, String>,
    #[serde(default)]
    expense_ratios: ExpenseRatios,
    start: NaiveDate,
    end: NaiveDate,
    #[serde(default = "default_risk_free")]
    risk_free_rate: Rate,
}

fn default_risk_free() -> Rate {
    DEFAULT_RISK_FREE_RATE
}

pub fn run_returns(args: ReturnsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let doc = match (args.prices.as_deref(), args.weights.as_deref()) {
        (Some(prices), Some(weights)) => ReturnsDocument {
            prices: input::file::read_document(prices)?,
            weights: input::file::read_document(weights)?,
        },
        (None, None) => input::load(None, "prices <file> --weights")?,
        _ => return Err("--prices and --weights must be given together".into()),
    };
    let result = compute_returns(&doc.prices, &doc.weights)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_fees(args: FeesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let doc: FeesDocument = input::load(args.input.as_deref(), "input")?;
    let result = apply_fees(&doc.returns, doc.advisory_fee, &doc.expense_ratios, &doc.weights)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_performance(args: PerformanceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let returns: ReturnSeries = input::load(args.input.as_deref(), "input")?;
    let result = summarize(&returns, args.risk_free_rate)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_historical(args: HistoricalArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let doc: HistoricalDocument = input::load(args.input.as_deref(), "input")?;
    let prices: PriceTable = input::file::read_document(&args.prices)?;
    let source = StaticPriceSource::new(prices);

    let portfolio =
        Portfolio::new("Current", doc.holdings, doc.advisory_fee)?.with_overrides(doc.asset_class_overrides);
    let window = HistoricalWindow {
        start: doc.start,
        end: doc.end,
        risk_free_rate: doc.risk_free_rate,
    };
    let result = analyze_historical(&portfolio, &doc.expense_ratios, &source, &window)?;
    Ok(serde_json::to_value(result)?)
}

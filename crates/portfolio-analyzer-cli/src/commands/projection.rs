use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use portfolio_analyzer_core::aggregation::combine::PortfolioSpec;
use portfolio_analyzer_core::aggregation::ledger::project_each;
use portfolio_analyzer_core::projection::forward::{project, ProjectionInput, DEFAULT_PROJECTION_YEARS};
use portfolio_analyzer_core::{AccountType, Rate};

use super::comparison::CatalogFile;
use crate::input;

/// Arguments for a forward projection
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ProjectArgs {
    /// Path to JSON/YAML projection input
    #[arg(long)]
    pub input: Option<String>,

    /// Override the account type (brokerage, roth_ira, traditional_ira)
    #[arg(long)]
    pub account_type: Option<AccountType>,

    /// Override the horizon in years
    #[arg(long)]
    pub years: Option<i32>,

    /// Override the marginal tax rate
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Override the annual cash flow (negative for withdrawals)
    #[arg(long)]
    pub annual_cash_flow: Option<Decimal>,
}

/// Arguments for a multi-account projection
#[derive(Args)]
pub struct AggregateArgs {
    /// Path to JSON/YAML with the accounts, tax rate and horizon
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON/YAML model catalog (growth rates, asset classes, expense ratios)
    #[arg(long)]
    pub catalog: String,
}

#[derive(Deserialize)]
struct AggregateDocument {
    portfolios: Vec<PortfolioSpec>,
    #[serde(default)]
    tax_rate: Rate,
    #[serde(default = "default_years")]
    years: i32,
}

fn default_years() -> i32 {
    DEFAULT_PROJECTION_YEARS
}

pub fn run_project(args: ProjectArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut projection: ProjectionInput = input::load(args.input.as_deref(), "input")?;
    if let Some(account_type) = args.account_type {
        projection.account_type = account_type;
    }
    if let Some(years) = args.years {
        projection.years = years;
    }
    if let Some(tax_rate) = args.tax_rate {
        projection.tax_rate = tax_rate;
    }
    if let Some(cash_flow) = args.annual_cash_flow {
        projection.annual_cash_flow = cash_flow;
    }

    let result = project(&projection)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_aggregate(args: AggregateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let doc: AggregateDocument = input::load(args.input.as_deref(), "input")?;
    let catalog: CatalogFile = input::file::read_document(&args.catalog)?;
    let result = project_each(
        &doc.portfolios,
        &catalog.asset_classes,
        &catalog.expense_ratios,
        &catalog.growth_rates,
        doc.tax_rate,
        doc.years,
    )?;
    Ok(serde_json::to_value(result)?)
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::PortfolioAnalyticsError;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Ticker → fraction of portfolio value. Iterates in ascending ticker order,
/// which fixes the order fee layers are compounded in.
pub type Weights = BTreeMap<String, Rate>;

/// Ticker → annual fund expense ratio. Tickers not present are treated as 0.
pub type ExpenseRatios = BTreeMap<String, Rate>;

/// Ticker → dollar amount held.
pub type Holdings = BTreeMap<String, Money>;

/// Asset class → weight (e.g. "US Equity" → 0.6).
pub type AssetAllocation = BTreeMap<String, Rate>;

/// Asset class → assumed annual growth rate.
pub type GrowthRates = BTreeMap<String, Rate>;

/// Tax treatment of the account holding a portfolio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AccountType {
    /// Taxable: growth is taxed every year.
    #[default]
    Brokerage,
    /// Tax exempt: never taxed.
    RothIra,
    /// Tax deferred: untaxed during accumulation, liability tracked on the balance.
    TraditionalIra,
}

impl AccountType {
    pub fn is_taxable(&self) -> bool {
        matches!(self, AccountType::Brokerage)
    }

    pub fn is_tax_deferred(&self) -> bool {
        matches!(self, AccountType::TraditionalIra)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::Brokerage => write!(f, "Brokerage"),
            AccountType::RothIra => write!(f, "Roth IRA"),
            AccountType::TraditionalIra => write!(f, "Traditional IRA"),
        }
    }
}

impl FromStr for AccountType {
    type Err = PortfolioAnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match normalised.as_str() {
            "brokerage" | "taxable" => Ok(AccountType::Brokerage),
            "rothira" | "roth" => Ok(AccountType::RothIra),
            "traditionalira" | "traditional" => Ok(AccountType::TraditionalIra),
            _ => Err(PortfolioAnalyticsError::InvalidAccountType(s.to_string())),
        }
    }
}

impl TryFrom<String> for AccountType {
    type Error = PortfolioAnalyticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountType> for String {
    fn from(value: AccountType) -> Self {
        value.to_string()
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    for warning in &warnings {
        tracing::warn!(methodology = %methodology, "{warning}");
    }
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

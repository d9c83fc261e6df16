use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PortfolioAnalyticsError;
use crate::types::{AssetAllocation, ExpenseRatios, Holdings, Money, Rate, Weights};
use crate::PortfolioAnalyticsResult;

/// Asset class assigned to tickers the classifier does not recognise.
pub const UNCLASSIFIED_ASSET_CLASS: &str = "Other";

/// Maps a ticker to its asset class (ticker metadata in production).
pub trait AssetClassifier {
    fn classify(&self, ticker: &str) -> Option<String>;
}

impl AssetClassifier for BTreeMap<String, String> {
    fn classify(&self, ticker: &str) -> Option<String> {
        self.get(ticker).cloned()
    }
}

/// A set of dollar holdings with its advisory fee and any manual asset-class
/// assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub name: String,
    pub holdings: Holdings,
    #[serde(default)]
    pub advisory_fee: Rate,
    #[serde(default)]
    pub asset_class_overrides: BTreeMap<String, String>,
}

/// Per-ticker breakdown of a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingDetail {
    pub ticker: String,
    pub amount: Money,
    pub weight: Rate,
    pub asset_class: String,
    pub expense_ratio: Rate,
    pub annual_expense: Money,
}

impl Portfolio {
    pub fn new(name: &str, holdings: Holdings, advisory_fee: Rate) -> PortfolioAnalyticsResult<Self> {
        for (ticker, amount) in &holdings {
            if *amount < Decimal::ZERO {
                return Err(PortfolioAnalyticsError::InvalidInput {
                    field: format!("holdings.{ticker}"),
                    reason: format!("holding amount {amount} is negative"),
                });
            }
        }
        if advisory_fee < Decimal::ZERO || advisory_fee >= Decimal::ONE {
            return Err(PortfolioAnalyticsError::InvalidInput {
                field: "advisory_fee".into(),
                reason: format!("Advisory fee {advisory_fee} must be in [0, 1)"),
            });
        }
        Ok(Portfolio {
            name: name.to_string(),
            holdings,
            advisory_fee,
            asset_class_overrides: BTreeMap::new(),
        })
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.asset_class_overrides = overrides;
        self
    }

    pub fn total_value(&self) -> Money {
        self.holdings.values().sum()
    }

    /// Dollar amounts as fractions of the total; empty when the total is zero.
    pub fn weights(&self) -> Weights {
        let total = self.total_value();
        if total.is_zero() {
            return Weights::new();
        }
        self.holdings
            .iter()
            .map(|(ticker, amount)| (ticker.clone(), amount / total))
            .collect()
    }

    /// `Σ weight · expense_ratio`, unknown tickers counting as 0.
    pub fn weighted_avg_expense_ratio(&self, expense_ratios: &ExpenseRatios) -> Rate {
        self.weights()
            .iter()
            .map(|(ticker, weight)| weight * expense_ratios.get(ticker).copied().unwrap_or(Decimal::ZERO))
            .sum()
    }

    /// Expense ratio plus advisory fee, the annual drag used for projections.
    pub fn total_fee_rate(&self, expense_ratios: &ExpenseRatios) -> Rate {
        self.weighted_avg_expense_ratio(expense_ratios) + self.advisory_fee
    }

    /// Overrides win over the classifier; unknown tickers are "Other".
    pub fn asset_class_of(&self, ticker: &str, classifier: &dyn AssetClassifier) -> String {
        self.asset_class_overrides
            .get(ticker)
            .cloned()
            .or_else(|| classifier.classify(ticker))
            .unwrap_or_else(|| UNCLASSIFIED_ASSET_CLASS.to_string())
    }

    pub fn asset_class_allocation(&self, classifier: &dyn AssetClassifier) -> AssetAllocation {
        let mut allocation = AssetAllocation::new();
        for (ticker, weight) in self.weights() {
            *allocation
                .entry(self.asset_class_of(&ticker, classifier))
                .or_insert(Decimal::ZERO) += weight;
        }
        allocation
    }

    pub fn detailed_holdings(
        &self,
        classifier: &dyn AssetClassifier,
        expense_ratios: &ExpenseRatios,
    ) -> Vec<HoldingDetail> {
        let weights = self.weights();
        self.holdings
            .iter()
            .map(|(ticker, amount)| {
                let expense_ratio = expense_ratios.get(ticker).copied().unwrap_or(Decimal::ZERO);
                HoldingDetail {
                    ticker: ticker.clone(),
                    amount: *amount,
                    weight: weights.get(ticker).copied().unwrap_or(Decimal::ZERO),
                    asset_class: self.asset_class_of(ticker, classifier),
                    expense_ratio,
                    annual_expense: amount * expense_ratio,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn classifier() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("SPY".to_string(), "US Equity".to_string()),
            ("VOO".to_string(), "US Equity".to_string()),
            ("BND".to_string(), "US Bonds".to_string()),
        ])
    }

    fn sample() -> Portfolio {
        Portfolio::new(
            "Current",
            Holdings::from([
                ("SPY".to_string(), dec!(60000)),
                ("BND".to_string(), dec!(30000)),
                ("ARKK".to_string(), dec!(10000)),
            ]),
            dec!(0.01),
        )
        .unwrap()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let p = sample();
        assert_eq!(p.total_value(), dec!(100000));
        assert_eq!(p.weights()["SPY"], dec!(0.6));
        assert_eq!(p.weights().values().sum::<Decimal>(), Decimal::ONE);
    }

    #[test]
    fn test_weighted_avg_expense_ratio() {
        let er = ExpenseRatios::from([("SPY".to_string(), dec!(0.0009)), ("BND".to_string(), dec!(0.0003))]);
        // 0.6*0.0009 + 0.3*0.0003 = 0.00063
        assert_eq!(sample().weighted_avg_expense_ratio(&er), dec!(0.00063));
        assert_eq!(sample().total_fee_rate(&er), dec!(0.01063));
    }

    #[test]
    fn test_allocation_uses_overrides_then_other() {
        let alloc = sample().asset_class_allocation(&classifier());
        assert_eq!(alloc["US Equity"], dec!(0.6));
        assert_eq!(alloc[UNCLASSIFIED_ASSET_CLASS], dec!(0.1));

        let overridden = sample()
            .with_overrides(BTreeMap::from([("ARKK".to_string(), "US Equity".to_string())]))
            .asset_class_allocation(&classifier());
        assert_eq!(overridden["US Equity"], dec!(0.7));
        assert!(!overridden.contains_key(UNCLASSIFIED_ASSET_CLASS));
    }

    #[test]
    fn test_zero_value_portfolio_has_no_weights() {
        let p = Portfolio::new("Empty", Holdings::from([("SPY".to_string(), dec!(0))]), dec!(0)).unwrap();
        assert!(p.weights().is_empty());
        assert_eq!(p.weighted_avg_expense_ratio(&ExpenseRatios::new()), Decimal::ZERO);
    }

    #[test]
    fn test_negative_holding_rejected() {
        let holdings = Holdings::from([("SPY".to_string(), dec!(-5))]);
        assert!(Portfolio::new("Bad", holdings, dec!(0)).is_err());
    }

    #[test]
    fn test_detailed_holdings() {
        let er = ExpenseRatios::from([("SPY".to_string(), dec!(0.0009))]);
        let details = sample().detailed_holdings(&classifier(), &er);
        let spy = details.iter().find(|h| h.ticker == "SPY").unwrap();
        assert_eq!(spy.annual_expense, dec!(54));
        assert_eq!(spy.asset_class, "US Equity");
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PortfolioAnalyticsError;
use crate::holdings::Portfolio;
use crate::types::{AccountType, Holdings, Money, Rate};
use crate::PortfolioAnalyticsResult;

/// One account within a multi-account analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSpec {
    pub holdings: Holdings,
    #[serde(default)]
    pub advisory_fee: Rate,
    #[serde(default)]
    pub asset_class_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub annual_cash_flow: Money,
}

impl PortfolioSpec {
    pub fn total_value(&self) -> Money {
        self.holdings.values().sum()
    }

    pub fn to_portfolio(&self, name: &str) -> PortfolioAnalyticsResult<Portfolio> {
        Ok(Portfolio::new(name, self.holdings.clone(), self.advisory_fee)?
            .with_overrides(self.asset_class_overrides.clone()))
    }
}

/// Several accounts merged into a single holdings view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedPortfolio {
    pub portfolio: Portfolio,
    pub total_annual_cash_flow: Money,
}

/// Value-weighted advisory fee, `Σ (value_i / total) · fee_i`; zero when there is no value.
pub fn blended_advisory_fee(specs: &[PortfolioSpec]) -> Rate {
    let total: Money = specs.iter().map(PortfolioSpec::total_value).sum();
    if total <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    specs
        .iter()
        .map(|spec| (spec.total_value(), spec.advisory_fee))
        .filter(|(value, _)| *value > Decimal::ZERO)
        .map(|(value, fee)| value / total * fee)
        .sum()
}

/// Merge accounts: holdings add per ticker, overrides are last-write-wins,
/// the advisory fee is value-weighted and cash flows are summed.
pub fn combine_portfolios(specs: &[PortfolioSpec]) -> PortfolioAnalyticsResult<CombinedPortfolio> {
    if specs.is_empty() {
        return Err(PortfolioAnalyticsError::InsufficientData(
            "At least one portfolio is required".into(),
        ));
    }

    let mut holdings = Holdings::new();
    let mut overrides = BTreeMap::new();
    for spec in specs {
        for (ticker, amount) in &spec.holdings {
            *holdings.entry(ticker.clone()).or_insert(Decimal::ZERO) += *amount;
        }
        overrides.extend(spec.asset_class_overrides.clone());
    }
    if holdings.is_empty() {
        return Err(PortfolioAnalyticsError::InsufficientData(
            "No holdings found in any portfolio".into(),
        ));
    }

    let portfolio = Portfolio::new("Aggregate", holdings, blended_advisory_fee(specs))?.with_overrides(overrides);
    Ok(CombinedPortfolio {
        portfolio,
        total_annual_cash_flow: specs.iter().map(|s| s.annual_cash_flow).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn spec(holdings: &[(&str, Decimal)], fee: Decimal, account_type: AccountType) -> PortfolioSpec {
        PortfolioSpec {
            holdings: holdings.iter().map(|(t, a)| (t.to_string(), *a)).collect(),
            advisory_fee: fee,
            asset_class_overrides: BTreeMap::new(),
            account_type,
            annual_cash_flow: Decimal::ZERO,
        }
    }

    #[test]
    fn test_same_ticker_is_additive() {
        let a = spec(&[("SPY", dec!(1000)), ("BND", dec!(500))], dec!(0.01), AccountType::Brokerage);
        let b = spec(&[("SPY", dec!(250))], dec!(0.005), AccountType::RothIra);
        let combined = combine_portfolios(&[a, b]).unwrap();
        assert_eq!(combined.portfolio.holdings["SPY"], dec!(1250));
        assert_eq!(combined.portfolio.holdings["BND"], dec!(500));
        assert_eq!(combined.portfolio.name, "Aggregate");
    }

    #[test]
    fn test_overrides_last_write_wins() {
        let mut a = spec(&[("XYZ", dec!(100))], dec!(0), AccountType::Brokerage);
        a.asset_class_overrides.insert("XYZ".into(), "US Equity".into());
        let mut b = spec(&[("XYZ", dec!(100))], dec!(0), AccountType::Brokerage);
        b.asset_class_overrides.insert("XYZ".into(), "International Equity".into());
        let combined = combine_portfolios(&[a, b]).unwrap();
        assert_eq!(combined.portfolio.asset_class_overrides["XYZ"], "International Equity");
    }

    #[test]
    fn test_blended_fee_is_value_weighted() {
        let a = spec(&[("SPY", dec!(3000))], dec!(0.01), AccountType::Brokerage);
        let b = spec(&[("VOO", dec!(1000))], dec!(0.002), AccountType::TraditionalIra);
        // 0.75*0.01 + 0.25*0.002 = 0.008
        assert_eq!(blended_advisory_fee(&[a, b]), dec!(0.008));
    }

    #[test]
    fn test_blended_fee_zero_value_is_zero() {
        let a = spec(&[("SPY", dec!(0))], dec!(0.01), AccountType::Brokerage);
        assert_eq!(blended_advisory_fee(&[a]), Decimal::ZERO);
        assert_eq!(blended_advisory_fee(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_cash_flows_summed() {
        let mut a = spec(&[("SPY", dec!(100))], dec!(0), AccountType::Brokerage);
        a.annual_cash_flow = dec!(6000);
        let mut b = spec(&[("BND", dec!(100))], dec!(0), AccountType::RothIra);
        b.annual_cash_flow = dec!(-1000);
        assert_eq!(combine_portfolios(&[a, b]).unwrap().total_annual_cash_flow, dec!(5000));
    }

    #[test]
    fn test_no_holdings_rejected() {
        let empty = spec(&[], dec!(0), AccountType::Brokerage);
        assert!(combine_portfolios(&[empty]).is_err());
        assert!(combine_portfolios(&[]).is_err());
    }
}

use rust_decimal::Decimal;

use super::combine::PortfolioSpec;
use crate::error::PortfolioAnalyticsError;
use crate::holdings::AssetClassifier;
use crate::projection::forward::{
    portfolio_projection_input, project, ProjectionResult, YearlyProjectionRecord,
};
use crate::types::{ExpenseRatios, GrowthRates, Money, Rate};
use crate::PortfolioAnalyticsResult;

/// Sum independently projected ledgers position-wise by year.
///
/// Every dollar field is added across portfolios for the same year index, so each
/// account keeps its own tax treatment. The headline deferred liability is the
/// sum of each account's final-year liability.
pub fn aggregate_projections(results: &[ProjectionResult]) -> PortfolioAnalyticsResult<ProjectionResult> {
    let first = results.first().ok_or_else(|| {
        PortfolioAnalyticsError::InsufficientData("At least one projection is required to aggregate".into())
    })?;
    let horizon = first.yearly_projections.len();
    if let Some(mismatch) = results.iter().find(|r| r.yearly_projections.len() != horizon) {
        return Err(PortfolioAnalyticsError::InvalidHorizon(mismatch.yearly_projections.len() as i64));
    }

    let mut yearly_projections: Vec<YearlyProjectionRecord> = first
        .yearly_projections
        .iter()
        .map(|y| YearlyProjectionRecord {
            year: y.year,
            starting_value: Decimal::ZERO,
            cash_flow: Decimal::ZERO,
            after_cash_flow_value: Decimal::ZERO,
            growth: Decimal::ZERO,
            taxes: Decimal::ZERO,
            fees: Decimal::ZERO,
            ending_value: Decimal::ZERO,
            annual_return_rate: Decimal::ZERO,
            deferred_tax_liability: Decimal::ZERO,
        })
        .collect();

    for result in results {
        for (total, year) in yearly_projections.iter_mut().zip(&result.yearly_projections) {
            accumulate(&mut total.starting_value, year.starting_value)?;
            accumulate(&mut total.cash_flow, year.cash_flow)?;
            accumulate(&mut total.after_cash_flow_value, year.after_cash_flow_value)?;
            accumulate(&mut total.growth, year.growth)?;
            accumulate(&mut total.taxes, year.taxes)?;
            accumulate(&mut total.fees, year.fees)?;
            accumulate(&mut total.ending_value, year.ending_value)?;
            accumulate(&mut total.deferred_tax_liability, year.deferred_tax_liability)?;
        }
    }
    for total in &mut yearly_projections {
        total.annual_return_rate = if total.after_cash_flow_value.is_zero() {
            Decimal::ZERO
        } else {
            total.growth / total.after_cash_flow_value
        };
    }

    let opening_total = yearly_projections
        .first()
        .map(|y| y.starting_value)
        .unwrap_or(Decimal::ZERO);
    let account_type = first
        .account_type
        .filter(|t| results.iter().all(|r| r.account_type == Some(*t)));

    Ok(ProjectionResult {
        weighted_annual_return: blended_return(results, opening_total),
        final_portfolio_value: checked_total(results, |r| r.final_portfolio_value)?,
        total_fees: checked_total(results, |r| r.total_fees)?,
        total_taxes: checked_total(results, |r| r.total_taxes)?,
        total_cash_flows: checked_total(results, |r| r.total_cash_flows)?,
        total_contributions: checked_total(results, |r| r.total_contributions)?,
        deferred_tax_liability: checked_total(results, |r| r.deferred_tax_liability)?,
        account_type,
        yearly_projections,
    })
}

fn accumulate(total: &mut Money, value: Money) -> PortfolioAnalyticsResult<()> {
    *total = total.checked_add(value).ok_or_else(|| PortfolioAnalyticsError::InvalidInput {
        field: "portfolios".into(),
        reason: "combined balance exceeds the decimal range".into(),
    })?;
    Ok(())
}

fn checked_total(results: &[ProjectionResult], field: impl Fn(&ProjectionResult) -> Money) -> PortfolioAnalyticsResult<Money> {
    let mut total = Decimal::ZERO;
    for result in results {
        accumulate(&mut total, field(result))?;
    }
    Ok(total)
}

/// Average of each input's blended return, weighted by its year-one starting value.
fn blended_return(results: &[ProjectionResult], total: Money) -> Rate {
    let opening = |r: &ProjectionResult| {
        r.yearly_projections
            .first()
            .map(|y| y.starting_value)
            .unwrap_or(Decimal::ZERO)
    };
    if total.is_zero() {
        let n = Decimal::from(results.len() as u64);
        return results.iter().map(|r| r.weighted_annual_return).sum::<Decimal>() / n;
    }
    results
        .iter()
        .map(|r| opening(r) / total * r.weighted_annual_return)
        .sum()
}

/// Project each account on its own (own holdings, fees, cash flow and account
/// type) and sum the ledgers. Accounts without holdings are skipped.
pub fn project_each(
    specs: &[PortfolioSpec],
    classifier: &dyn AssetClassifier,
    expense_ratios: &ExpenseRatios,
    growth_rates: &GrowthRates,
    tax_rate: Rate,
    years: i32,
) -> PortfolioAnalyticsResult<ProjectionResult> {
    let mut results = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        if spec.holdings.is_empty() {
            continue;
        }
        let portfolio = spec.to_portfolio(&format!("Account {}", i + 1))?;
        let input = portfolio_projection_input(
            &portfolio,
            classifier,
            expense_ratios,
            growth_rates,
            spec.annual_cash_flow,
            tax_rate,
            spec.account_type,
            years,
        );
        let projected = project(&input)?;
        tracing::debug!(
            account = i + 1,
            account_type = %spec.account_type,
            final_value = %projected.result.final_portfolio_value,
            "projected account"
        );
        results.push(projected.result);
    }
    aggregate_projections(&results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::forward::ProjectionInput;
    use crate::types::{AccountType, AssetAllocation};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn run(account_type: AccountType, initial: Decimal, cash_flow: Decimal, years: i32) -> ProjectionResult {
        project(&ProjectionInput {
            allocation: AssetAllocation::from([("Equity".to_string(), dec!(1))]),
            growth_rates: GrowthRates::from([("Equity".to_string(), dec!(0.07))]),
            total_fee_rate: dec!(0.01),
            initial_value: initial,
            annual_cash_flow: cash_flow,
            tax_rate: dec!(0.24),
            account_type,
            years,
        })
        .unwrap()
        .result
    }

    #[test]
    fn test_ending_values_sum_by_year() {
        let a = run(AccountType::Brokerage, dec!(10000), dec!(500), 10);
        let b = run(AccountType::TraditionalIra, dec!(5000), dec!(1000), 10);
        let agg = aggregate_projections(&[a.clone(), b.clone()]).unwrap();
        for k in 0..10 {
            assert_eq!(
                agg.yearly_projections[k].ending_value,
                a.yearly_projections[k].ending_value + b.yearly_projections[k].ending_value
            );
        }
        assert_eq!(agg.final_portfolio_value, a.final_portfolio_value + b.final_portfolio_value);
        assert_eq!(agg.total_taxes, a.total_taxes);
        assert_eq!(agg.deferred_tax_liability, b.deferred_tax_liability);
        assert_eq!(agg.account_type, None);
    }

    #[test]
    fn test_aggregate_preserves_chain() {
        let a = run(AccountType::RothIra, dec!(2000), dec!(100), 5);
        let b = run(AccountType::Brokerage, dec!(3000), dec!(-50), 5);
        let agg = aggregate_projections(&[a, b]).unwrap();
        for pair in agg.yearly_projections.windows(2) {
            assert_eq!(pair[0].ending_value, pair[1].starting_value);
        }
    }

    #[test]
    fn test_single_projection_round_trips() {
        let a = run(AccountType::TraditionalIra, dec!(1000), dec!(0), 3);
        let agg = aggregate_projections(std::slice::from_ref(&a)).unwrap();
        assert_eq!(agg.account_type, Some(AccountType::TraditionalIra));
        assert_eq!(agg.weighted_annual_return, a.weighted_annual_return);
        assert_eq!(agg.yearly_projections, a.yearly_projections);
    }

    #[test]
    fn test_mismatched_horizons_rejected() {
        let a = run(AccountType::Brokerage, dec!(1000), dec!(0), 3);
        let b = run(AccountType::Brokerage, dec!(1000), dec!(0), 5);
        assert!(matches!(
            aggregate_projections(&[a, b]),
            Err(PortfolioAnalyticsError::InvalidHorizon(5))
        ));
    }

    #[test]
    fn test_overflowing_sum_is_error() {
        let big = run(AccountType::Brokerage, Decimal::MAX / dec!(4), dec!(0), 1);
        let err = aggregate_projections(&[big.clone(), big.clone(), big.clone(), big]).unwrap_err();
        assert!(matches!(err, PortfolioAnalyticsError::InvalidInput { ref field, .. } if field == "portfolios"));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(aggregate_projections(&[]).is_err());
    }

    #[test]
    fn test_project_each_keeps_account_tax_treatment() {
        let classifier = BTreeMap::from([("SPY".to_string(), "Equity".to_string())]);
        let growth = GrowthRates::from([("Equity".to_string(), dec!(0.07))]);
        let specs = vec![
            PortfolioSpec {
                holdings: BTreeMap::from([("SPY".to_string(), dec!(1000))]),
                advisory_fee: dec!(0.01),
                asset_class_overrides: BTreeMap::new(),
                account_type: AccountType::RothIra,
                annual_cash_flow: Decimal::ZERO,
            },
            PortfolioSpec {
                holdings: BTreeMap::new(),
                advisory_fee: Decimal::ZERO,
                asset_class_overrides: BTreeMap::new(),
                account_type: AccountType::Brokerage,
                annual_cash_flow: dec!(100),
            },
        ];
        let agg = project_each(&specs, &classifier, &ExpenseRatios::new(), &growth, dec!(0.3), 1).unwrap();
        // Only the Roth account is projected: no taxes despite a 30% rate
        assert_eq!(agg.total_taxes, Decimal::ZERO);
        assert_eq!(agg.final_portfolio_value, dec!(1059.3));
        assert_eq!(agg.account_type, Some(AccountType::RothIra));
    }
}

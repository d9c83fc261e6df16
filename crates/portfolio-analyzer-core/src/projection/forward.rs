use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PortfolioAnalyticsError;
use crate::holdings::{AssetClassifier, Portfolio};
use crate::types::{
    with_metadata, AccountType, AssetAllocation, ComputationOutput, ExpenseRatios, GrowthRates, Money, Rate,
};
use crate::PortfolioAnalyticsResult;

pub const DEFAULT_PROJECTION_YEARS: i32 = 10;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input parameters for a forward projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionInput {
    /// Asset class → weight.
    pub allocation: AssetAllocation,
    /// Asset class → assumed annual growth rate.
    pub growth_rates: GrowthRates,
    /// Expense ratio plus advisory fee, charged on the after-tax balance each year.
    pub total_fee_rate: Rate,
    #[serde(default = "default_initial_value")]
    pub initial_value: Money,
    /// Added at the start of each year; negative for withdrawals.
    #[serde(default)]
    pub annual_cash_flow: Money,
    #[serde(default)]
    pub tax_rate: Rate,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default = "default_years")]
    pub years: i32,
}

fn default_initial_value() -> Money {
    Decimal::ONE
}

fn default_years() -> i32 {
    DEFAULT_PROJECTION_YEARS
}

/// One simulated year. Never modified after it is appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyProjectionRecord {
    pub year: u32,
    pub starting_value: Money,
    pub cash_flow: Money,
    pub after_cash_flow_value: Money,
    pub growth: Money,
    pub taxes: Money,
    pub fees: Money,
    pub ending_value: Money,
    pub annual_return_rate: Rate,
    /// Tax owed if the balance were withdrawn at year end (Traditional IRA only).
    pub deferred_tax_liability: Money,
}

/// Year-by-year ledger plus totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub weighted_annual_return: Rate,
    pub final_portfolio_value: Money,
    pub total_fees: Money,
    pub total_taxes: Money,
    pub total_cash_flows: Money,
    /// Initial value plus positive contributions (tracked for Traditional IRA basis).
    pub total_contributions: Money,
    /// Final year's liability; a point-in-time figure, not a sum.
    pub deferred_tax_liability: Money,
    /// `None` for an aggregate spanning several account types.
    pub account_type: Option<AccountType>,
    pub yearly_projections: Vec<YearlyProjectionRecord>,
}

// ---------------------------------------------------------------------------
// Fold state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ProjectionState {
    value: Money,
    contribution_basis: Money,
    total_fees: Money,
    total_taxes: Money,
    total_cash_flows: Money,
}

#[derive(Debug, Clone, Copy)]
struct YearParams {
    annual_return: Rate,
    fee_rate: Rate,
    cash_flow: Money,
    tax_rate: Rate,
    account_type: AccountType,
}

impl ProjectionState {
    fn start(initial_value: Money) -> Self {
        ProjectionState {
            value: initial_value,
            contribution_basis: initial_value,
            total_fees: Decimal::ZERO,
            total_taxes: Decimal::ZERO,
            total_cash_flows: Decimal::ZERO,
        }
    }

    /// Cash flow, growth, taxes, fees, liability snapshot, in that order.
    fn step(self, year: u32, p: &YearParams) -> (Self, YearlyProjectionRecord) {
        let starting_value = self.value;

        let after_cash_flow = starting_value + p.cash_flow;
        let mut contribution_basis = self.contribution_basis;
        if p.account_type.is_tax_deferred() && p.cash_flow > Decimal::ZERO {
            contribution_basis += p.cash_flow;
        }

        let growth = after_cash_flow * p.annual_return;
        let after_growth = after_cash_flow + growth;

        let taxes = if p.account_type.is_taxable() && p.tax_rate > Decimal::ZERO {
            growth * p.tax_rate
        } else {
            Decimal::ZERO
        };
        let after_taxes = after_growth - taxes;

        let fees = after_taxes * p.fee_rate;
        let ending_value = after_taxes - fees;

        let deferred_tax_liability = if p.account_type.is_tax_deferred() {
            ending_value * p.tax_rate
        } else {
            Decimal::ZERO
        };

        let record = YearlyProjectionRecord {
            year,
            starting_value,
            cash_flow: p.cash_flow,
            after_cash_flow_value: after_cash_flow,
            growth,
            taxes,
            fees,
            ending_value,
            annual_return_rate: p.annual_return,
            deferred_tax_liability,
        };
        let next = ProjectionState {
            value: ending_value,
            contribution_basis,
            total_fees: self.total_fees + fees,
            total_taxes: self.total_taxes + taxes,
            total_cash_flows: self.total_cash_flows + p.cash_flow,
        };
        (next, record)
    }
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Blended growth rate: `Σ allocation[c] · growth[c]` over the classes in the
/// growth table. Classes without an allocation contribute nothing.
pub fn weighted_annual_return(allocation: &AssetAllocation, growth_rates: &GrowthRates) -> Rate {
    growth_rates
        .iter()
        .map(|(class, rate)| allocation.get(class).copied().unwrap_or(Decimal::ZERO) * rate)
        .sum()
}

/// Deterministic single-path projection over `years` annual periods.
pub fn project(input: &ProjectionInput) -> PortfolioAnalyticsResult<ComputationOutput<ProjectionResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate(input)?;

    let allocated: Decimal = input.allocation.values().sum();
    if allocated > Decimal::ONE {
        warnings.push(format!("Asset-class allocation sums to {allocated}, above 1.0"));
    }
    let unpriced: Vec<&str> = input
        .allocation
        .keys()
        .filter(|class| !input.growth_rates.contains_key(*class))
        .map(String::as_str)
        .collect();
    if !unpriced.is_empty() {
        warnings.push(format!(
            "No growth assumption for {}; treated as 0% growth",
            unpriced.join(", ")
        ));
    }

    let annual_return = weighted_annual_return(&input.allocation, &input.growth_rates);
    check_balance_range(input, annual_return)?;

    let params = YearParams {
        annual_return,
        fee_rate: input.total_fee_rate,
        cash_flow: input.annual_cash_flow,
        tax_rate: input.tax_rate,
        account_type: input.account_type,
    };

    let years = input.years as u32;
    let mut state = ProjectionState::start(input.initial_value);
    let mut yearly_projections = Vec::with_capacity(years as usize);
    let mut depleted_in: Option<u32> = None;
    for year in 1..=years {
        let (next, record) = state.step(year, &params);
        if record.ending_value < Decimal::ZERO && depleted_in.is_none() {
            depleted_in = Some(year);
        }
        yearly_projections.push(record);
        state = next;
    }
    if let Some(year) = depleted_in {
        warnings.push(format!(
            "Withdrawals exceed the balance: portfolio value is negative from year {year}"
        ));
    }

    let output = ProjectionResult {
        weighted_annual_return: params.annual_return,
        final_portfolio_value: state.value,
        total_fees: state.total_fees,
        total_taxes: state.total_taxes,
        total_cash_flows: state.total_cash_flows,
        total_contributions: state.contribution_basis,
        deferred_tax_liability: yearly_projections
            .last()
            .map(|r| r.deferred_tax_liability)
            .unwrap_or(Decimal::ZERO),
        account_type: Some(input.account_type),
        yearly_projections,
    };
    tracing::debug!(
        account_type = %input.account_type,
        years,
        weighted_annual_return = %output.weighted_annual_return,
        final_value = %output.final_portfolio_value,
        "projection complete"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Forward projection (cash flow → growth → tax → fee, annual deterministic compounding)",
        &serde_json::json!({
            "years": input.years,
            "account_type": input.account_type.to_string(),
            "total_fee_rate": input.total_fee_rate.to_string(),
            "tax_rate": input.tax_rate.to_string(),
            "annual_cash_flow": input.annual_cash_flow.to_string(),
            "initial_value": input.initial_value.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn validate(input: &ProjectionInput) -> PortfolioAnalyticsResult<()> {
    if input.years <= 0 {
        return Err(PortfolioAnalyticsError::InvalidHorizon(input.years as i64));
    }
    if input.total_fee_rate < Decimal::ZERO || input.total_fee_rate > Decimal::ONE {
        return Err(PortfolioAnalyticsError::InvalidInput {
            field: "total_fee_rate".into(),
            reason: "Fee rate must be between 0 and 1".into(),
        });
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(PortfolioAnalyticsError::InvalidInput {
            field: "tax_rate".into(),
            reason: "Tax rate must be between 0 and 1".into(),
        });
    }
    if input.initial_value < Decimal::ZERO {
        return Err(PortfolioAnalyticsError::InvalidInput {
            field: "initial_value".into(),
            reason: "Initial value cannot be negative".into(),
        });
    }
    if let Some((class, weight)) = input.allocation.iter().find(|(_, w)| **w < Decimal::ZERO) {
        return Err(PortfolioAnalyticsError::InvalidInput {
            field: format!("allocation.{class}"),
            reason: format!("Allocation weight {weight} is negative"),
        });
    }
    Ok(())
}

/// Reject horizons whose balance could leave the `Decimal` range before the
/// fold starts.
///
/// `|value_n| <= (1 + |w|)^n · (initial + n·|cash_flow|)` since taxes and fees
/// only remove part of the growth. Running totals add at most `n` such terms.
fn check_balance_range(input: &ProjectionInput, annual_return: Rate) -> PortfolioAnalyticsResult<()> {
    let years = Decimal::from(input.years);
    let bound = (Decimal::ONE + annual_return.abs())
        .checked_powu(input.years as u64)
        .zip(
            input
                .annual_cash_flow
                .abs()
                .checked_mul(years)
                .and_then(|flows| flows.checked_add(input.initial_value)),
        )
        .and_then(|(growth, base)| growth.checked_mul(base))
        .and_then(|balance| balance.checked_mul(years + Decimal::ONE));
    match bound {
        Some(_) => Ok(()),
        None => Err(PortfolioAnalyticsError::InvalidInput {
            field: "years".into(),
            reason: format!(
                "balance after {} years at {annual_return} annual growth exceeds the decimal range",
                input.years
            ),
        }),
    }
}

/// Projection input for a holdings portfolio: its asset-class mix, and its
/// expense ratios plus advisory fee as the annual drag.
#[allow(clippy::too_many_arguments)]
pub fn portfolio_projection_input(
    portfolio: &Portfolio,
    classifier: &dyn AssetClassifier,
    expense_ratios: &ExpenseRatios,
    growth_rates: &GrowthRates,
    annual_cash_flow: Money,
    tax_rate: Rate,
    account_type: AccountType,
    years: i32,
) -> ProjectionInput {
    ProjectionInput {
        allocation: portfolio.asset_class_allocation(classifier),
        growth_rates: growth_rates.clone(),
        total_fee_rate: portfolio.total_fee_rate(expense_ratios),
        initial_value: portfolio.total_value(),
        annual_cash_flow,
        tax_rate,
        account_type,
        years,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compounding::compound;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn equity_input(account_type: AccountType, tax_rate: Rate, years: i32) -> ProjectionInput {
        ProjectionInput {
            allocation: AssetAllocation::from([("Equity".to_string(), dec!(1.0))]),
            growth_rates: GrowthRates::from([("Equity".to_string(), dec!(0.07))]),
            total_fee_rate: dec!(0.01),
            initial_value: dec!(1.0),
            annual_cash_flow: Decimal::ZERO,
            tax_rate,
            account_type,
            years,
        }
    }

    #[test]
    fn test_brokerage_single_year_scenario() {
        let out = project(&equity_input(AccountType::Brokerage, Decimal::ZERO, 1)).unwrap();
        let year = &out.result.yearly_projections[0];
        assert_eq!(
            year,
            &YearlyProjectionRecord {
                year: 1,
                starting_value: dec!(1.0),
                cash_flow: dec!(0),
                after_cash_flow_value: dec!(1.0),
                growth: dec!(0.07),
                taxes: dec!(0),
                fees: dec!(0.0107),
                ending_value: dec!(1.0593),
                annual_return_rate: dec!(0.07),
                deferred_tax_liability: dec!(0),
            }
        );
        assert_eq!(out.result.final_portfolio_value, dec!(1.0593));
    }

    #[test]
    fn test_traditional_ira_defers_tax() {
        let out = project(&equity_input(AccountType::TraditionalIra, dec!(0.2), 1)).unwrap();
        let year = &out.result.yearly_projections[0];
        assert_eq!(year.taxes, Decimal::ZERO);
        assert_eq!(year.fees, dec!(0.0107));
        assert_eq!(year.ending_value, dec!(1.0593));
        assert_eq!(year.deferred_tax_liability, dec!(0.21186));
        assert_eq!(out.result.deferred_tax_liability, dec!(0.21186));
    }

    #[test]
    fn test_brokerage_taxes_growth_only() {
        let mut input = equity_input(AccountType::Brokerage, dec!(0.25), 1);
        input.annual_cash_flow = dec!(1.0);
        let out = project(&input).unwrap();
        let year = &out.result.yearly_projections[0];
        // Growth on 2.0 at 7% = 0.14; tax 25% of growth only
        assert_eq!(year.after_cash_flow_value, dec!(2.0));
        assert_eq!(year.growth, dec!(0.14));
        assert_eq!(year.taxes, dec!(0.035));
        assert_eq!(year.fees, (dec!(2.14) - dec!(0.035)) * dec!(0.01));
        assert_eq!(out.result.total_taxes, dec!(0.035));
    }

    #[test]
    fn test_roth_never_taxed() {
        let mut input = equity_input(AccountType::RothIra, dec!(0.37), 10);
        input.annual_cash_flow = dec!(0.5);
        let out = project(&input).unwrap();
        assert!(out.result.yearly_projections.iter().all(|y| y.taxes.is_zero()));
        assert!(out.result.yearly_projections.iter().all(|y| y.deferred_tax_liability.is_zero()));
        assert_eq!(out.result.total_taxes, Decimal::ZERO);
    }

    #[test]
    fn test_no_drag_matches_closed_form() {
        let mut input = equity_input(AccountType::Brokerage, Decimal::ZERO, 10);
        input.total_fee_rate = Decimal::ZERO;
        input.initial_value = dec!(1000);
        let out = project(&input).unwrap();
        let expected = dec!(1000) * compound(dec!(0.07), 10);
        assert!((out.result.final_portfolio_value - expected).abs() < dec!(0.000000000001));
    }

    #[test]
    fn test_ledger_is_chained() {
        let mut input = equity_input(AccountType::TraditionalIra, dec!(0.22), 10);
        input.annual_cash_flow = dec!(0.1);
        let out = project(&input).unwrap();
        let years = &out.result.yearly_projections;
        assert_eq!(years.len(), 10);
        for pair in years.windows(2) {
            assert_eq!(pair[0].ending_value, pair[1].starting_value);
            assert_eq!(pair[1].year, pair[0].year + 1);
        }
        assert_eq!(out.result.total_cash_flows, dec!(1.0));
        assert_eq!(out.result.total_contributions, dec!(2.0));
    }

    #[test]
    fn test_liability_recomputed_each_year() {
        let out = project(&equity_input(AccountType::TraditionalIra, dec!(0.3), 5)).unwrap();
        for y in &out.result.yearly_projections {
            assert_eq!(y.deferred_tax_liability, y.ending_value * dec!(0.3));
        }
    }

    #[test]
    fn test_withdrawals_are_not_contributions() {
        let mut input = equity_input(AccountType::TraditionalIra, dec!(0.2), 3);
        input.annual_cash_flow = dec!(-0.1);
        let out = project(&input).unwrap();
        assert_eq!(out.result.total_contributions, dec!(1.0));
        assert_eq!(out.result.total_cash_flows, dec!(-0.3));
    }

    #[test]
    fn test_depletion_warns_but_completes() {
        let mut input = equity_input(AccountType::Brokerage, Decimal::ZERO, 5);
        input.annual_cash_flow = dec!(-0.6);
        let out = project(&input).unwrap();
        assert_eq!(out.result.yearly_projections.len(), 5);
        assert!(out.warnings.iter().any(|w| w.contains("negative")));
    }

    #[test]
    fn test_growth_table_drives_blend() {
        let allocation = AssetAllocation::from([
            ("US Equity".to_string(), dec!(0.6)),
            ("US Bonds".to_string(), dec!(0.3)),
            ("Crypto".to_string(), dec!(0.1)),
        ]);
        let growth = GrowthRates::from([
            ("US Equity".to_string(), dec!(0.08)),
            ("US Bonds".to_string(), dec!(0.04)),
            ("Cash".to_string(), dec!(0.02)),
        ]);
        assert_eq!(weighted_annual_return(&allocation, &growth), dec!(0.06));
    }

    #[test]
    fn test_unpriced_class_warns() {
        let mut input = equity_input(AccountType::Brokerage, Decimal::ZERO, 1);
        input.allocation.insert("Gold".to_string(), dec!(0.0));
        let out = project(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("Gold")));
    }

    #[test]
    fn test_invalid_horizon_rejected() {
        for years in [0, -3] {
            let err = project(&equity_input(AccountType::Brokerage, Decimal::ZERO, years)).unwrap_err();
            assert!(matches!(err, PortfolioAnalyticsError::InvalidHorizon(y) if y == years as i64));
        }
    }

    #[test]
    fn test_invalid_rates_rejected() {
        let mut input = equity_input(AccountType::Brokerage, dec!(1.5), 1);
        assert!(project(&input).is_err());
        input.tax_rate = Decimal::ZERO;
        input.total_fee_rate = dec!(-0.01);
        assert!(project(&input).is_err());
    }

    #[test]
    fn test_long_horizon_within_range_completes() {
        let out = project(&equity_input(AccountType::Brokerage, dec!(0.15), 500)).unwrap();
        assert_eq!(out.result.yearly_projections.len(), 500);
        assert!(out.result.final_portfolio_value > dec!(1));
    }

    #[test]
    fn test_unrepresentable_horizon_rejected_before_fold() {
        let mut input = equity_input(AccountType::Brokerage, Decimal::ZERO, 900);
        input.total_fee_rate = Decimal::ZERO;
        input.initial_value = dec!(1000000);
        let err = project(&input).unwrap_err();
        assert!(matches!(err, PortfolioAnalyticsError::InvalidInput { ref field, .. } if field == "years"));
    }

    #[test]
    fn test_input_defaults_from_json() {
        let json = r#"{
            "allocation": {"Equity": "1.0"},
            "growth_rates": {"Equity": "0.07"},
            "total_fee_rate": "0.01",
            "account_type": "Traditional IRA"
        }"#;
        let input: ProjectionInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.years, DEFAULT_PROJECTION_YEARS);
        assert_eq!(input.initial_value, Decimal::ONE);
        assert_eq!(input.account_type, AccountType::TraditionalIra);
    }

    #[test]
    fn test_malformed_account_type_fails_before_projection() {
        let json = r#"{
            "allocation": {}, "growth_rates": {}, "total_fee_rate": "0",
            "account_type": "HSA"
        }"#;
        let err = serde_json::from_str::<ProjectionInput>(json).unwrap_err();
        assert!(err.to_string().contains("Invalid account type"));
    }
}

use rust_decimal::Decimal;

use super::returns::ReturnSeries;
use crate::compounding::{checked_pow, period_factor, TRADING_DAYS_PER_YEAR};
use crate::error::PortfolioAnalyticsError;
use crate::types::{ExpenseRatios, Rate, Weights};
use crate::PortfolioAnalyticsResult;

/// Deduct the advisory fee and then each fund's expense ratio, compounding daily.
///
/// Layers are applied advisory first, then expense ratios in ascending ticker order.
/// With a zero advisory fee and no expense ratios the series is returned unchanged.
pub fn apply_fees(
    returns: &ReturnSeries,
    advisory_fee: Rate,
    expense_ratios: &ExpenseRatios,
    weights: &Weights,
) -> PortfolioAnalyticsResult<ReturnSeries> {
    let after_advisory = apply_advisory_fee(returns, advisory_fee)?;
    apply_expense_ratios(&after_advisory, expense_ratios, weights)
}

/// `(1 + r) · (1 - fee)^(1/252) - 1` for every period.
pub fn apply_advisory_fee(returns: &ReturnSeries, advisory_fee: Rate) -> PortfolioAnalyticsResult<ReturnSeries> {
    let factor = period_factor(advisory_fee, TRADING_DAYS_PER_YEAR).map_err(|_| {
        PortfolioAnalyticsError::InvalidInput {
            field: "advisory_fee".into(),
            reason: format!("Advisory fee {advisory_fee} must be in [0, 1)"),
        }
    })?;
    Ok(apply_layers(returns, &[factor]))
}

/// One weight-scaled drag layer per fund with a positive expense ratio:
/// `(1 + r) · ((1 - er)^(1/252))^weight - 1`.
pub fn apply_expense_ratios(
    returns: &ReturnSeries,
    expense_ratios: &ExpenseRatios,
    weights: &Weights,
) -> PortfolioAnalyticsResult<ReturnSeries> {
    let mut layers = Vec::new();
    for (ticker, weight) in weights {
        let er = expense_ratios.get(ticker).copied().unwrap_or(Decimal::ZERO);
        if er < Decimal::ZERO || er >= Decimal::ONE {
            return Err(PortfolioAnalyticsError::InvalidInput {
                field: format!("expense_ratios.{ticker}"),
                reason: format!("Expense ratio {er} must be in [0, 1)"),
            });
        }
        if er > Decimal::ZERO {
            let daily = period_factor(er, TRADING_DAYS_PER_YEAR)?;
            layers.push(checked_pow(daily, *weight, "expense_ratio_layer")?);
        }
    }
    Ok(apply_layers(returns, &layers))
}

fn apply_layers(returns: &ReturnSeries, layers: &[Decimal]) -> ReturnSeries {
    returns.map(|r| {
        layers
            .iter()
            .fold(*r, |acc, factor| (Decimal::ONE + acc) * factor - Decimal::ONE)
    })
}

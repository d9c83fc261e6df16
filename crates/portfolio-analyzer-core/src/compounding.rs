use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::PortfolioAnalyticsError;
use crate::types::Rate;
use crate::PortfolioAnalyticsResult;

/// Trading-day convention used for every periodic/annual conversion.
pub const TRADING_DAYS_PER_YEAR: Decimal = dec!(252);

/// (1 + rate)^n by repeated multiplication, exact for integer horizons.
pub fn compound(rate: Rate, n: u32) -> Decimal {
    let mut result = Decimal::ONE;
    let factor = Decimal::ONE + rate;
    for _ in 0..n {
        result *= factor;
    }
    result
}

/// Per-period survival multiplier for an annual fee: `(1 - rate)^(1/periods)`.
///
/// Exactly one for a zero rate, so a zero fee leaves returns untouched.
pub fn period_factor(annual_rate: Rate, periods_per_year: Decimal) -> PortfolioAnalyticsResult<Decimal> {
    if annual_rate.is_zero() {
        return Ok(Decimal::ONE);
    }
    if annual_rate < Decimal::ZERO || annual_rate >= Decimal::ONE {
        return Err(PortfolioAnalyticsError::InvalidInput {
            field: "fee_rate".into(),
            reason: format!("Annual fee rate {annual_rate} must be in [0, 1)"),
        });
    }
    if periods_per_year <= Decimal::ZERO {
        return Err(PortfolioAnalyticsError::InvalidInput {
            field: "periods_per_year".into(),
            reason: "Periods per year must be positive".into(),
        });
    }
    checked_pow(Decimal::ONE - annual_rate, Decimal::ONE / periods_per_year, "period_factor")
}

/// Annualise a total return earned over `periods` observations:
/// `(1 + total)^(periods_per_year / periods) - 1`.
///
/// A total loss (growth factor <= 0) annualises to -100%. A short, strongly
/// positive series whose annual growth factor exceeds `Decimal::MAX` is an
/// `InvalidInput` error on `annualized_return`.
pub fn annualize(
    total_return: Rate,
    periods: usize,
    periods_per_year: Decimal,
) -> PortfolioAnalyticsResult<Rate> {
    if periods == 0 {
        return Err(PortfolioAnalyticsError::InsufficientData(
            "Cannot annualise over zero periods".into(),
        ));
    }
    let growth = Decimal::ONE + total_return;
    if growth <= Decimal::ZERO {
        return Ok(-Decimal::ONE);
    }
    let exponent = periods_per_year / Decimal::from(periods as u64);
    let annual_growth = growth
        .checked_powd(exponent)
        .ok_or_else(|| PortfolioAnalyticsError::InvalidInput {
            field: "annualized_return".into(),
            reason: format!(
                "{total_return} over {periods} period(s) compounds past the decimal range when annualised"
            ),
        })?;
    Ok(annual_growth - Decimal::ONE)
}

/// `base^exponent` that surfaces overflow as an input error instead of panicking.
pub fn checked_pow(base: Decimal, exponent: Decimal, context: &str) -> PortfolioAnalyticsResult<Decimal> {
    base.checked_powd(exponent)
        .ok_or_else(|| PortfolioAnalyticsError::InvalidInput {
            field: context.to_string(),
            reason: format!("{base}^{exponent} is not representable"),
        })
}

/// Square root of a non-negative value; zero for anything else.
pub fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::returns::ReturnSeries;
use crate::compounding::{annualize, sqrt_decimal, TRADING_DAYS_PER_YEAR};
use crate::error::PortfolioAnalyticsError;
use crate::types::Rate;
use crate::PortfolioAnalyticsResult;

pub const DEFAULT_RISK_FREE_RATE: Rate = dec!(0.02);

/// Scalar statistics of a periodic return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_return: Rate,
    pub annualized_return: Rate,
    pub volatility: Rate,
    /// Sharpe-style ratio; `None` when volatility is zero.
    pub risk_adjusted_return: Option<Decimal>,
    /// Worst peak-to-trough decline, always <= 0.
    pub max_drawdown: Rate,
    pub periods: usize,
}

/// Growth of one unit invested at the start of the series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeCurve {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub stats: PerformanceStats,
    pub cumulative: CumulativeCurve,
}

/// Reduce a (fee-adjusted) return series to performance statistics and its
/// cumulative-value curve.
pub fn summarize(returns: &ReturnSeries, risk_free_rate: Rate) -> PortfolioAnalyticsResult<PerformanceSummary> {
    let n = returns.len();
    if n == 0 {
        return Err(PortfolioAnalyticsError::InsufficientData(
            "At least 1 return observation required".into(),
        ));
    }

    let cumulative = cumulative_curve(returns)?;
    let final_value = cumulative.values[n - 1];
    let total_return = final_value - Decimal::ONE;
    let annualized_return = annualize(total_return, n, TRADING_DAYS_PER_YEAR)?;

    let mean = returns.returns.iter().sum::<Decimal>() / Decimal::from(n as u64);
    let volatility = sqrt_decimal(sample_variance(&returns.returns, mean)) * sqrt_decimal(TRADING_DAYS_PER_YEAR);

    let risk_adjusted_return = if volatility.is_zero() {
        None
    } else {
        Some((annualized_return - risk_free_rate) / volatility)
    };

    let stats = PerformanceStats {
        total_return,
        annualized_return,
        volatility,
        risk_adjusted_return,
        max_drawdown: max_drawdown(&cumulative.values),
        periods: n,
    };
    tracing::debug!(
        periods = n,
        total_return = %stats.total_return,
        max_drawdown = %stats.max_drawdown,
        "summarized return series"
    );

    Ok(PerformanceSummary { stats, cumulative })
}

/// Running product of `(1 + r)`.
pub fn cumulative_curve(returns: &ReturnSeries) -> PortfolioAnalyticsResult<CumulativeCurve> {
    let mut value = Decimal::ONE;
    let mut values = Vec::with_capacity(returns.len());
    for (date, r) in returns.dates.iter().zip(&returns.returns) {
        value = (Decimal::ONE + r)
            .checked_mul(value)
            .ok_or_else(|| PortfolioAnalyticsError::InvalidInput {
                field: "returns".into(),
                reason: format!("cumulative growth exceeds the decimal range on {date}"),
            })?;
        values.push(value);
    }
    Ok(CumulativeCurve {
        dates: returns.dates.clone(),
        values,
    })
}

/// Minimum of `cumulative / running_max - 1`. The running max starts at the
/// first cumulative value, not at the initial unit.
fn max_drawdown(cumulative: &[Decimal]) -> Rate {
    let mut peak = match cumulative.first() {
        Some(first) => *first,
        None => return Decimal::ZERO,
    };
    let mut worst = Decimal::ZERO;
    for value in cumulative {
        if *value > peak {
            peak = *value;
        }
        let drawdown = if peak > Decimal::ZERO {
            *value / peak - Decimal::ONE
        } else {
            -Decimal::ONE
        };
        if drawdown < worst {
            worst = drawdown;
        }
    }
    worst
}

/// Sample variance (n-1 denominator); zero for fewer than two observations.
fn sample_variance(data: &[Decimal], mean: Decimal) -> Decimal {
    let n = data.len();
    if n < 2 {
        return Decimal::ZERO;
    }
    let sum_sq: Decimal = data.iter().map(|x| (x - mean) * (x - mean)).sum();
    sum_sq / Decimal::from((n - 1) as u64)
}

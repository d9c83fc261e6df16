use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::prices::PriceTable;
use crate::error::PortfolioAnalyticsError;
use crate::types::{Rate, Weights};
use crate::PortfolioAnalyticsResult;

/// Periodic portfolio returns aligned to the date each period ends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<Decimal>,
}

impl ReturnSeries {
    pub fn new(dates: Vec<NaiveDate>, returns: Vec<Decimal>) -> PortfolioAnalyticsResult<Self> {
        if dates.len() != returns.len() {
            return Err(PortfolioAnalyticsError::InvalidInput {
                field: "returns".into(),
                reason: format!(
                    "{} dates but {} returns; series must be aligned",
                    dates.len(),
                    returns.len()
                ),
            });
        }
        Ok(ReturnSeries { dates, returns })
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Same dates, returns replaced element-wise.
    pub fn map(&self, f: impl FnMut(&Decimal) -> Decimal) -> ReturnSeries {
        ReturnSeries {
            dates: self.dates.clone(),
            returns: self.returns.iter().map(f).collect(),
        }
    }
}

/// Static-weight portfolio returns from adjusted closes.
///
/// Each period's return is `Σ weight · (p[t] / p[t-1] - 1)` over the dates every
/// weighted ticker has a price for. The first aligned date has no return and is dropped.
pub fn compute_returns(prices: &PriceTable, weights: &Weights) -> PortfolioAnalyticsResult<ReturnSeries> {
    if weights.is_empty() {
        return Err(PortfolioAnalyticsError::InsufficientData(
            "At least one weighted ticker is required".into(),
        ));
    }

    let mut columns: Vec<(Rate, BTreeMap<NaiveDate, Decimal>)> = Vec::with_capacity(weights.len());
    for (ticker, weight) in weights {
        if *weight < Decimal::ZERO {
            return Err(PortfolioAnalyticsError::InvalidWeights {
                ticker: ticker.clone(),
                reason: format!("weight {weight} is negative"),
            });
        }
        let series = prices
            .get(ticker)
            .ok_or_else(|| PortfolioAnalyticsError::MissingPriceData {
                ticker: ticker.clone(),
                reason: "no price data returned".into(),
            })?;
        series.validate(ticker)?;
        if series.len() < 2 {
            return Err(PortfolioAnalyticsError::MissingPriceData {
                ticker: ticker.clone(),
                reason: format!("{} price point(s); at least 2 required", series.len()),
            });
        }
        let column = series.points.iter().map(|p| (p.date, p.price)).collect();
        columns.push((*weight, column));
    }

    // Dates every ticker traded on.
    let mut aligned: BTreeSet<NaiveDate> = columns[0].1.keys().copied().collect();
    for (_, column) in &columns[1..] {
        aligned.retain(|date| column.contains_key(date));
    }
    if aligned.len() < 2 {
        return Err(PortfolioAnalyticsError::MissingPriceData {
            ticker: weights.keys().cloned().collect::<Vec<_>>().join(","),
            reason: format!("{} overlapping date(s); at least 2 required", aligned.len()),
        });
    }

    let dates: Vec<NaiveDate> = aligned.into_iter().collect();
    let mut returns = Vec::with_capacity(dates.len() - 1);
    for pair in dates.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        let mut period_return = Decimal::ZERO;
        for ((weight, column), ticker) in columns.iter().zip(weights.keys()) {
            let p0 = column[&prev];
            let p1 = column[&curr];
            if p0.is_zero() {
                return Err(PortfolioAnalyticsError::InvalidInput {
                    field: format!("prices.{ticker}"),
                    reason: format!("zero price on {prev}"),
                });
            }
            period_return += *weight * (p1 / p0 - Decimal::ONE);
        }
        returns.push(period_return);
    }

    tracing::debug!(
        tickers = weights.len(),
        periods = returns.len(),
        "computed weighted portfolio returns"
    );
    ReturnSeries::new(dates[1..].to_vec(), returns)
}

/// Total return of each ticker from its first to its last price.
pub fn individual_returns(prices: &PriceTable) -> PortfolioAnalyticsResult<BTreeMap<String, Rate>> {
    let mut out = BTreeMap::new();
    for (ticker, series) in prices {
        let (first, last) = match (series.first(), series.last()) {
            (Some(f), Some(l)) => (f.price, l.price),
            _ => {
                return Err(PortfolioAnalyticsError::MissingPriceData {
                    ticker: ticker.clone(),
                    reason: "empty price series".into(),
                })
            }
        };
        if first.is_zero() {
            return Err(PortfolioAnalyticsError::InvalidInput {
                field: format!("prices.{ticker}"),
                reason: "starting price is zero".into(),
            });
        }
        out.insert(ticker.clone(), (last - first) / first);
    }
    Ok(out)
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PortfolioAnalyticsError;
use crate::PortfolioAnalyticsResult;

/// A single adjusted close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: Decimal,
}

/// Date-ordered adjusted closes for one ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
}

/// Ticker → price series.
pub type PriceTable = BTreeMap<String, PriceSeries>;

impl PriceSeries {
    /// Build a series, rejecting out-of-order or duplicate dates.
    pub fn new(ticker: &str, points: Vec<PricePoint>) -> PortfolioAnalyticsResult<Self> {
        let series = PriceSeries { points };
        series.validate(ticker)?;
        Ok(series)
    }

    /// Dates must be strictly increasing.
    pub fn validate(&self, ticker: &str) -> PortfolioAnalyticsResult<()> {
        for pair in self.points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(PortfolioAnalyticsError::InvalidInput {
                    field: format!("prices.{ticker}"),
                    reason: format!(
                        "Dates must be strictly increasing ({} follows {})",
                        pair[1].date, pair[0].date
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Points with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        PriceSeries {
            points: self
                .points
                .iter()
                .filter(|p| p.date >= start && p.date <= end)
                .copied()
                .collect(),
        }
    }
}

/// Supplier of historical prices (a market data vendor in production).
pub trait PriceSource {
    fn price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortfolioAnalyticsResult<PriceSeries>;
}

/// In-memory price source backed by a preloaded table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticPriceSource {
    pub table: PriceTable,
}

impl StaticPriceSource {
    pub fn new(table: PriceTable) -> Self {
        StaticPriceSource { table }
    }
}

impl PriceSource for StaticPriceSource {
    fn price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortfolioAnalyticsResult<PriceSeries> {
        let series = self
            .table
            .get(ticker)
            .ok_or_else(|| PortfolioAnalyticsError::MissingPriceData {
                ticker: ticker.to_string(),
                reason: "ticker not available from price source".into(),
            })?;
        series.validate(ticker)?;
        Ok(series.between(start, end))
    }
}

/// Fetch every ticker over the same window into a table.
pub fn fetch_prices<'a>(
    source: &dyn PriceSource,
    tickers: impl IntoIterator<Item = &'a String>,
    start: NaiveDate,
    end: NaiveDate,
) -> PortfolioAnalyticsResult<PriceTable> {
    if end < start {
        return Err(PortfolioAnalyticsError::InvalidInput {
            field: "end".into(),
            reason: format!("End date {end} precedes start date {start}"),
        });
    }
    let mut table = PriceTable::new();
    for ticker in tickers {
        let series = source.price_series(ticker, start, end)?;
        tracing::debug!(ticker = %ticker, points = series.len(), "fetched price series");
        table.insert(ticker.clone(), series);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_new_rejects_duplicate_dates() {
        let points = vec![
            PricePoint { date: d(2024, 1, 2), price: dec!(100) },
            PricePoint { date: d(2024, 1, 2), price: dec!(101) },
        ];
        assert!(PriceSeries::new("SPY", points).is_err());
    }

    #[test]
    fn test_new_rejects_descending_dates() {
        let points = vec![
            PricePoint { date: d(2024, 1, 3), price: dec!(100) },
            PricePoint { date: d(2024, 1, 2), price: dec!(101) },
        ];
        assert!(PriceSeries::new("SPY", points).is_err());
    }

    #[test]
    fn test_static_source_filters_window() {
        let series = PriceSeries::new(
            "VOO",
            vec![
                PricePoint { date: d(2024, 1, 2), price: dec!(400) },
                PricePoint { date: d(2024, 1, 3), price: dec!(404) },
                PricePoint { date: d(2024, 1, 4), price: dec!(402) },
            ],
        )
        .unwrap();
        let source = StaticPriceSource::new(PriceTable::from([("VOO".to_string(), series)]));
        let window = source.price_series("VOO", d(2024, 1, 3), d(2024, 1, 10)).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.first().unwrap().price, dec!(404));
    }

    #[test]
    fn test_static_source_missing_ticker() {
        let source = StaticPriceSource::default();
        let err = source.price_series("XYZ", d(2024, 1, 1), d(2024, 2, 1)).unwrap_err();
        assert!(matches!(err, PortfolioAnalyticsError::MissingPriceData { .. }));
    }

    #[test]
    fn test_price_table_deserializes_from_json() {
        let json = r#"{"SPY": [{"date": "2024-01-02", "price": "470.10"},
                               {"date": "2024-01-03", "price": 472.5}]}"#;
        let table: PriceTable = serde_json::from_str(json).unwrap();
        assert_eq!(table["SPY"].len(), 2);
        assert_eq!(table["SPY"].last().unwrap().price, dec!(472.5));
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PortfolioAnalyticsError;
use crate::types::{AssetAllocation, GrowthRates, Rate, Weights};
use crate::PortfolioAnalyticsResult;

/// Closest reference model for an allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMatch {
    pub name: String,
    /// Ticker → target weight.
    pub allocations: Weights,
    pub similarity: Decimal,
}

/// Similarity search over the reference models. The ranking algorithm lives
/// outside this crate.
pub trait ModelMatcher {
    fn best_match(&self, allocation: &AssetAllocation) -> Option<ModelMatch>;
}

impl<F> ModelMatcher for F
where
    F: Fn(&AssetAllocation) -> Option<ModelMatch>,
{
    fn best_match(&self, allocation: &AssetAllocation) -> Option<ModelMatch> {
        self(allocation)
    }
}

/// A match computed ahead of time, returned regardless of the allocation.
#[derive(Debug, Clone)]
pub struct FixedModel(pub ModelMatch);

impl ModelMatcher for FixedModel {
    fn best_match(&self, _allocation: &AssetAllocation) -> Option<ModelMatch> {
        Some(self.0.clone())
    }
}

/// Reference models, their flat advisory fee and the growth assumptions
/// used to project every portfolio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub models: BTreeMap<String, Weights>,
    pub model_fee: Rate,
    pub growth_rates: GrowthRates,
}

impl ModelCatalog {
    pub fn get(&self, name: &str) -> Option<&Weights> {
        self.models.get(name)
    }

    /// Look a model up by name and pair it with an externally computed similarity.
    pub fn select(&self, name: &str, similarity: Decimal) -> PortfolioAnalyticsResult<ModelMatch> {
        let allocations = self.get(name).ok_or_else(|| PortfolioAnalyticsError::InvalidInput {
            field: "model".into(),
            reason: format!(
                "Unknown model '{name}'; available: {}",
                self.models.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        })?;
        Ok(ModelMatch {
            name: name.to_string(),
            allocations: allocations.clone(),
            similarity,
        })
    }

    /// Model weights must be non-negative and fees/growth rates sane.
    pub fn validate(&self) -> PortfolioAnalyticsResult<()> {
        if self.model_fee < Decimal::ZERO || self.model_fee >= Decimal::ONE {
            return Err(PortfolioAnalyticsError::InvalidInput {
                field: "model_fee".into(),
                reason: format!("Model fee {} must be in [0, 1)", self.model_fee),
            });
        }
        for (name, weights) in &self.models {
            if let Some((ticker, weight)) = weights.iter().find(|(_, w)| **w < Decimal::ZERO) {
                return Err(PortfolioAnalyticsError::InvalidWeights {
                    ticker: ticker.clone(),
                    reason: format!("model '{name}' has negative weight {weight}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn catalog() -> ModelCatalog {
        ModelCatalog {
            models: BTreeMap::from([
                (
                    "Balanced".to_string(),
                    Weights::from([("VTI".to_string(), dec!(0.6)), ("BND".to_string(), dec!(0.4))]),
                ),
                ("Aggressive".to_string(), Weights::from([("VTI".to_string(), dec!(1))])),
            ]),
            model_fee: dec!(0.0025),
            growth_rates: GrowthRates::from([("US Equity".to_string(), dec!(0.08))]),
        }
    }

    #[test]
    fn test_select_known_model() {
        let m = catalog().select("Balanced", dec!(0.93)).unwrap();
        assert_eq!(m.allocations["BND"], dec!(0.4));
        assert_eq!(m.similarity, dec!(0.93));
    }

    #[test]
    fn test_select_unknown_model_lists_available() {
        let err = catalog().select("Income", dec!(1)).unwrap_err();
        assert!(err.to_string().contains("Aggressive, Balanced"));
    }

    #[test]
    fn test_closure_matcher() {
        let cat = catalog();
        let matcher = |alloc: &AssetAllocation| {
            let equity = alloc.get("US Equity").copied().unwrap_or(Decimal::ZERO);
            let name = if equity > dec!(0.8) { "Aggressive" } else { "Balanced" };
            cat.select(name, Decimal::ONE - (equity - dec!(0.6)).abs()).ok()
        };
        let alloc = AssetAllocation::from([("US Equity".to_string(), dec!(0.9))]);
        assert_eq!(matcher.best_match(&alloc).unwrap().name, "Aggressive");
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut cat = catalog();
        cat.models.insert("Short".into(), Weights::from([("SH".to_string(), dec!(-0.5))]));
        assert!(cat.validate().is_err());
        assert!(catalog().validate().is_ok());
    }
}

use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use portfolio_analyzer_core::comparison::analysis::{
    analyze_aggregate, analyze_portfolio, AggregateAnalysisRequest, AnalysisContext, AnalysisRequest,
    HistoryConfig,
};
use portfolio_analyzer_core::comparison::models::{FixedModel, ModelCatalog, ModelMatch, ModelMatcher};
use portfolio_analyzer_core::historical::analysis::HistoricalWindow;
use portfolio_analyzer_core::historical::prices::{PriceTable, StaticPriceSource};
use portfolio_analyzer_core::holdings::{AssetClassifier, UNCLASSIFIED_ASSET_CLASS};
use portfolio_analyzer_core::{AssetAllocation, ExpenseRatios, GrowthRates, Rate, Weights};

use crate::input;

/// Arguments for comparing holdings against the closest model
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct AnalyzeArgs {
    /// Path to JSON/YAML request: one account, or {"portfolios": [...]} for several
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON/YAML model catalog
    #[arg(long)]
    pub catalog: String,

    /// Compare against this model instead of the nearest one
    #[arg(long)]
    pub model: Option<String>,

    /// Path to JSON/YAML price table; enables the historical backtest
    #[arg(long, requires_all = ["start", "end"])]
    pub prices: Option<String>,

    /// Backtest start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Backtest end date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Annual risk-free rate for the backtest
    #[arg(long, default_value = "0.02")]
    pub risk_free_rate: Decimal,
}

/// Arguments for inspecting the model catalog
#[derive(Args)]
pub struct ModelsArgs {
    /// Path to JSON/YAML model catalog
    #[arg(long)]
    pub catalog: String,

    /// Show a single model
    #[arg(long)]
    pub name: Option<String>,
}

/// Model catalog plus the ticker metadata the CLI stands in for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub models: BTreeMap<String, Weights>,
    pub model_fee: Rate,
    pub growth_rates: GrowthRates,
    /// Ticker → asset class.
    #[serde(default)]
    pub asset_classes: BTreeMap<String, String>,
    #[serde(default)]
    pub expense_ratios: ExpenseRatios,
}

impl CatalogFile {
    pub fn model_catalog(&self) -> ModelCatalog {
        ModelCatalog {
            models: self.models.clone(),
            model_fee: self.model_fee,
            growth_rates: self.growth_rates.clone(),
        }
    }
}

/// Nearest model by asset-class overlap: `1 - ½ Σ |current[c] - model[c]|`.
pub struct AllocationMatcher<'a> {
    pub catalog: &'a ModelCatalog,
    pub classifier: &'a dyn AssetClassifier,
}

impl AllocationMatcher<'_> {
    fn model_allocation(&self, weights: &Weights) -> AssetAllocation {
        let mut allocation = AssetAllocation::new();
        for (ticker, weight) in weights {
            let class = self
                .classifier
                .classify(ticker)
                .unwrap_or_else(|| UNCLASSIFIED_ASSET_CLASS.to_string());
            *allocation.entry(class).or_insert(Decimal::ZERO) += *weight;
        }
        allocation
    }
}

impl ModelMatcher for AllocationMatcher<'_> {
    fn best_match(&self, allocation: &AssetAllocation) -> Option<ModelMatch> {
        let mut best: Option<ModelMatch> = None;
        for (name, weights) in &self.catalog.models {
            let model = self.model_allocation(weights);
            let classes: BTreeSet<&String> = allocation.keys().chain(model.keys()).collect();
            let distance: Decimal = classes
                .into_iter()
                .map(|class| {
                    let a = allocation.get(class).copied().unwrap_or(Decimal::ZERO);
                    let m = model.get(class).copied().unwrap_or(Decimal::ZERO);
                    (a - m).abs()
                })
                .sum();
            let similarity = Decimal::ONE - distance / Decimal::TWO;
            // Ties keep the first model in name order.
            if best.as_ref().map_or(true, |b| similarity > b.similarity) {
                best = Some(ModelMatch {
                    name: name.clone(),
                    allocations: weights.clone(),
                    similarity,
                });
            }
        }
        best
    }
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: Value = input::load(args.input.as_deref(), "input")?;
    let file: CatalogFile = input::file::read_document(&args.catalog)?;
    let catalog = file.model_catalog();

    let prices: Option<PriceTable> = args.prices.as_deref().map(input::file::read_document).transpose()?;
    let source = prices.map(StaticPriceSource::new);
    let history = match (&source, args.start, args.end) {
        (Some(source), Some(start), Some(end)) => Some(HistoryConfig {
            source,
            window: HistoricalWindow {
                start,
                end,
                risk_free_rate: args.risk_free_rate,
            },
        }),
        _ => None,
    };

    let nearest = AllocationMatcher {
        catalog: &catalog,
        classifier: &file.asset_classes,
    };
    let fixed = match args.model.as_deref() {
        Some(name) => Some(FixedModel(catalog.select(name, Decimal::ONE)?)),
        None => None,
    };
    let matcher: &dyn ModelMatcher = match &fixed {
        Some(fixed) => fixed,
        None => &nearest,
    };

    let ctx = AnalysisContext {
        catalog: &catalog,
        matcher,
        classifier: &file.asset_classes,
        expense_ratios: &file.expense_ratios,
        history,
    };

    if request.get("portfolios").is_some() {
        let request: AggregateAnalysisRequest = serde_json::from_value(request)?;
        Ok(serde_json::to_value(analyze_aggregate(&request, &ctx)?)?)
    } else {
        let request: AnalysisRequest = serde_json::from_value(request)?;
        Ok(serde_json::to_value(analyze_portfolio(&request, &ctx)?)?)
    }
}

pub fn run_models(args: ModelsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let file: CatalogFile = input::file::read_document(&args.catalog)?;
    let catalog = file.model_catalog();
    catalog.validate()?;
    match args.name.as_deref() {
        Some(name) => {
            let model = catalog.select(name, Decimal::ONE)?;
            Ok(serde_json::json!({
                "name": model.name,
                "allocations": model.allocations,
                "fee": catalog.model_fee,
            }))
        }
        None => Ok(serde_json::to_value(&catalog)?),
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
                (
                    "Conservative".to_string(),
                    Weights::from([("VTI".to_string(), dec!(0.3)), ("BND".to_string(), dec!(0.7))]),
                ),
            ]),
            model_fee: dec!(0.0025),
            growth_rates: GrowthRates::new(),
        }
    }

    fn classes() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("VTI".to_string(), "US Equity".to_string()),
            ("BND".to_string(), "US Bonds".to_string()),
        ])
    }

    #[test]
    fn test_nearest_model_by_overlap() {
        let (cat, cls) = (catalog(), classes());
        let matcher = AllocationMatcher {
            catalog: &cat,
            classifier: &cls,
        };
        let current = AssetAllocation::from([
            ("US Equity".to_string(), dec!(0.5)),
            ("US Bonds".to_string(), dec!(0.5)),
        ]);
        let m = matcher.best_match(&current).unwrap();
        assert_eq!(m.name, "Balanced");
        assert_eq!(m.similarity, dec!(0.9));
    }

    #[test]
    fn test_unclassified_holdings_reduce_similarity() {
        let (cat, cls) = (catalog(), classes());
        let matcher = AllocationMatcher {
            catalog: &cat,
            classifier: &cls,
        };
        let current = AssetAllocation::from([("Other".to_string(), dec!(1))]);
        let m = matcher.best_match(&current).unwrap();
        assert_eq!(m.similarity, Decimal::ZERO);
    }

    #[test]
    fn test_empty_catalog_has_no_match() {
        let cat = ModelCatalog::default();
        let cls = classes();
        let matcher = AllocationMatcher {
            catalog: &cat,
            classifier: &cls,
        };
        assert!(matcher.best_match(&AssetAllocation::new()).is_none());
    }

    #[test]
    fn test_catalog_file_yaml() {
        let file: CatalogFile = serde_yaml::from_str(
            "models:\n  Balanced:\n    VTI: '0.6'\n    BND: '0.4'\nmodel_fee: '0.0025'\ngrowth_rates:\n  US Equity: '0.07'\nasset_classes:\n  VTI: US Equity\n",
        )
        .unwrap();
        assert_eq!(file.model_catalog().models["Balanced"]["BND"], dec!(0.4));
        assert!(file.expense_ratios.is_empty());
    }
}

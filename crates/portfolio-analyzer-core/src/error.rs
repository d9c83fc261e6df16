use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortfolioAnalyticsError {
    #[error("Missing price data for {ticker}: {reason}")]
    MissingPriceData { ticker: String, reason: String },

    #[error("Invalid weights: {ticker} — {reason}")]
    InvalidWeights { ticker: String, reason: String },

    #[error("Invalid account type '{0}': expected Brokerage, Roth IRA or Traditional IRA")]
    InvalidAccountType(String),

    #[error("Invalid horizon: {0} years (must be at least 1)")]
    InvalidHorizon(i64),

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No model portfolio matched the asset-class allocation")]
    NoMatchingModel,

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PortfolioAnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        PortfolioAnalyticsError::SerializationError(e.to_string())
    }
}

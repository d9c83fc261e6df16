pub mod compounding;
pub mod error;
pub mod holdings;
pub mod types;

#[cfg(feature = "historical")]
pub mod historical;

#[cfg(feature = "projection")]
pub mod projection;

#[cfg(feature = "aggregation")]
pub mod aggregation;

#[cfg(feature = "comparison")]
pub mod comparison;

pub use error::PortfolioAnalyticsError;
pub use types::*;

/// Standard result type for all portfolio analytics operations
pub type PortfolioAnalyticsResult<T> = Result<T, PortfolioAnalyticsError>;

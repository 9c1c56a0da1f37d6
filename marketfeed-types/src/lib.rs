//! Shared data-transfer objects and configuration primitives for the
//! market-data ingestion and analysis-task dispatch platform.
#![warn(missing_docs)]

mod attribution;
mod capability;
mod codes;
mod config;
mod connector;
mod error;
pub mod model;
pub mod routing;
mod units;

pub use attribution::{ConsistencyReport, FallbackResult, MetricComparison, RecommendedAction};
pub use capability::Capability;
pub use codes::{exchange_suffix, full_symbol, normalize_code};
pub use config::{BackoffConfig, PlatformConfig, QuotaConfig, QuotaConsumptionStrategy, QuotaState};
pub use connector::DataSourceKey;
pub use error::PlatformError;
pub use routing::{DataSourceGrouping, SourcePriorities};
pub use units::{tushare_amount_to_yuan, tushare_volume_to_shares};

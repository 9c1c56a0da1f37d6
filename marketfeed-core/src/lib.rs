//! marketfeed-core
//!
//! Adapter trait, priority-fallback manager, and consistency checker shared
//! across data-source adapters and the ingestion/quote-rotation services.
//!
//! - `adapter`: the `DataSourceAdapter` trait and its request/response types.
//! - `manager`: `DataSourceManager`, priority-ordered fallback and
//!   dual-source consistency-checked fetching.
//! - `consistency`: the pure-function `ConsistencyChecker`.
//! - `task_handle`: graceful-shutdown handle for background loops.
#![warn(missing_docs)]

/// The `DataSourceAdapter` trait and its capability request/response types.
pub mod adapter;
/// Pure-function dual-source consistency checking.
pub mod consistency;
/// Priority-ordered fallback routing across adapters.
pub mod manager;
/// Graceful-shutdown handle for long-running background loops.
pub mod task_handle;

pub use adapter::{
    Availability, CredentialOrigin, DailyBasicRequest, DailyBasicRow, DataSourceAdapter,
    KlineRequest, NewsItem, NewsKind, NewsRequest,
};
pub use consistency::{ConsistencyChecker, DailyBasicLike};
pub use manager::{DataSourceManager, Emptyable};
pub use task_handle::{Abortable, Stoppable, TaskHandle};

//! marketfeed orchestrates market data ingestion, quote rotation, analysis
//! task dispatch, and notifications behind one composition root.
//!
//! Overview
//! - Ingests basics/historical/financial data from multiple providers with
//!   priority-and-fallback routing (spec.md §4.2-§4.4).
//! - Rotates realtime quote collection across CN providers during trading
//!   hours, backfilling from the latest historical bar off-hours (§4.5).
//! - Recomputes per-symbol valuation snapshots from stored fundamentals
//!   (§4.6).
//! - Dispatches analysis tasks through a Redis-backed queue with admission
//!   gates, a worker pool, and zombie reclamation (§4.7).
//! - Rate-limits and quota-gates the external interface, caching coarse
//!   report blobs (§4.8-§4.10).
//! - Persists and fans out per-user notifications (§4.11).
//!
//! The LLM-driven analysis engine and the HTTP/WebSocket transport are
//! explicit external collaborators (spec.md §1): this crate exposes the
//! [`orchestrator::AnalysisExecutor`] seam and the [`interfaces`] module's
//! transport-agnostic entry points, not a server binary.
#![warn(missing_docs)]

pub mod ingestion;
pub mod interfaces;
pub mod notifications;
pub mod orchestrator;
pub mod platform;
pub mod queue;
pub mod quote_rotation;
pub mod settings;
pub mod sources;
pub mod store;
pub mod valuation;

pub use notifications::NotificationService;
pub use orchestrator::{AnalysisExecutor, TaskOrchestrator};
pub use platform::Platform;
pub use queue::{QueueLimits, QueuedTask, TaskQueue};
pub use quote_rotation::QuoteRotationPipeline;
pub use settings::{Settings, SettingsError};
pub use store::DocumentStore;
pub use valuation::{recompute, Valuation, ValuationError, ValuationSource};

pub use marketfeed_core::adapter::{Availability, CredentialOrigin, DataSourceAdapter};
pub use marketfeed_core::manager::DataSourceManager;
pub use marketfeed_core::task_handle::TaskHandle;
pub use marketfeed_middleware::{CacheLayer, DailyQuotaGate, GateDecision, RateLimitGate, TushareAdmission};
pub use marketfeed_types::model::{
    AnalysisReport, AnalysisTask, AnalysisTaskStatus, MarketCategory, Notification, SyncStatus,
};
pub use marketfeed_types::{DataSourceKey, PlatformConfig, PlatformError};

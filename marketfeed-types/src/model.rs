//! Persisted entities, per the data model in spec.md §3.
//!
//! Every entity round-trips through the Document Store Gateway (in the
//! `marketfeed` crate), which owns the `ObjectId`↔`String` conversion at its
//! boundary; these structs never carry a raw `bson::oid::ObjectId` field so
//! they can be constructed and compared freely in adapter/service code that
//! has no MongoDB dependency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connector::DataSourceKey;

/// Instrument metadata plus a valuation snapshot. Unique key: `(code, source)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBasics {
    /// Mongo `_id` as a string; `None` until first persisted.
    pub id: Option<String>,
    /// Canonical 6-digit zero-padded code.
    pub code: String,
    /// Provider that authored this row. Never the literal `"multi_source"`.
    pub source: String,
    /// Derived full symbol, e.g. `600036.SS`.
    pub full_symbol: String,
    /// Display name.
    pub name: String,
    /// Industry classification, if known.
    pub industry: Option<String>,
    /// Market segment (e.g. "主板", "创业板"), if known.
    pub market: Option<String>,
    /// Listing date, `YYYY-MM-DD`.
    pub list_date: Option<String>,
    /// Total market capitalization in 亿元 (hundred-million yuan).
    pub total_mv: Option<f64>,
    /// Circulating market capitalization in 亿元.
    pub circ_mv: Option<f64>,
    /// Price/earnings ratio.
    pub pe: Option<f64>,
    /// Trailing-twelve-month price/earnings ratio.
    pub pe_ttm: Option<f64>,
    /// Price/book ratio.
    pub pb: Option<f64>,
    /// Price/sales ratio.
    pub ps: Option<f64>,
    /// Turnover rate, percent.
    pub turnover_rate: Option<f64>,
    /// Return on equity, percent, from the latest financial indicator row.
    pub roe: Option<f64>,
    /// Total share count, in 万股 (10,000-share units), when the provider states it.
    pub total_share: Option<f64>,
    /// Trade date this snapshot reflects, `YYYY-MM-DD`.
    pub trade_date: Option<String>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Latest near-real-time snapshot for one instrument. Unique key: `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Mongo `_id` as a string.
    pub id: Option<String>,
    /// Canonical 6-digit code.
    pub code: String,
    /// Exchange-qualified symbol, if known.
    pub symbol: Option<String>,
    /// Last trade price.
    pub close: f64,
    /// Opening price.
    pub open: Option<f64>,
    /// Session high.
    pub high: Option<f64>,
    /// Session low.
    pub low: Option<f64>,
    /// Previous session's close.
    pub pre_close: Option<f64>,
    /// Percent change vs. `pre_close`.
    pub pct_chg: Option<f64>,
    /// Cumulative traded volume, shares.
    pub volume: Option<f64>,
    /// Cumulative traded amount, yuan.
    pub amount: Option<f64>,
    /// Trading day this snapshot belongs to, `YYYY-MM-DD`.
    pub trade_date: String,
    /// Provider that supplied this snapshot.
    pub source: String,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Trading period granularity for historical bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Period {
    /// One bar per trading day.
    Daily,
    /// One bar per trading week.
    Weekly,
    /// One bar per trading month.
    Monthly,
}

impl Period {
    /// Lowercase identifier persisted as `HistoricalBar.period`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// One OHLCV bar. Unique key: `(symbol, trade_date, data_source, period)`.
/// Immutable once written; units are always yuan and shares (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    /// Mongo `_id` as a string.
    pub id: Option<String>,
    /// Exchange-qualified symbol or 6-digit code, provider-dependent.
    pub symbol: String,
    /// Bar date, `YYYY-MM-DD`.
    pub trade_date: String,
    /// Provider that supplied this bar.
    pub data_source: String,
    /// Bar granularity.
    pub period: Period,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Previous bar's close; derived by shifting when the provider omits it
    /// (HK/US path, spec.md §4.4).
    pub pre_close: Option<f64>,
    /// Traded volume in shares.
    pub volume: f64,
    /// Traded amount in yuan.
    pub amount: Option<f64>,
}

/// One reporting period's financial statement rows plus headline indicators.
/// Key: `(code, report_period)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    /// Mongo `_id` as a string.
    pub id: Option<String>,
    /// Canonical 6-digit code.
    pub code: String,
    /// Reporting period end date, `YYYY-MM-DD`.
    pub report_period: String,
    /// Total shareholders' equity, in 亿元.
    pub total_equity: Option<f64>,
    /// Net profit attributable to parent, trailing twelve months, in 亿元.
    pub ttm_net_profit: Option<f64>,
    /// Total revenue for the period, in 亿元.
    pub total_revenue: Option<f64>,
    /// Provider that supplied this statement.
    pub source: String,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of an [`AnalysisTask`]. Once terminal, never regresses
/// (spec.md §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnalysisTaskStatus {
    /// Enqueued, not yet picked up by a worker.
    Queued,
    /// Claimed by a worker and running.
    Processing,
    /// Reached a terminal state: succeeded.
    Completed,
    /// Reached a terminal state: raised an error.
    Failed,
    /// Reached a terminal state: cancelled cooperatively.
    Cancelled,
}

impl AnalysisTaskStatus {
    /// True once the status can never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase identifier, the literal value stored in Redis/Mongo.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One analysis job's lifecycle record, mirrored between the in-memory
/// progress table and MongoDB (spec.md §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    /// Task id (UUID v4 string); also the Redis hash key suffix.
    pub task_id: String,
    /// Owning user id.
    pub user_id: String,
    /// Target instrument code.
    pub symbol: String,
    /// Current lifecycle status.
    pub status: AnalysisTaskStatus,
    /// Arbitrary request parameters, opaque to the orchestrator.
    pub params: serde_json::Value,
    /// Optional batch this task belongs to.
    pub batch_id: Option<String>,
    /// Worker id that claimed this task, once processing.
    pub worker_id: Option<String>,
    /// 0-100 progress indicator the worker reports between checkpoints.
    pub progress: u8,
    /// Last human-readable progress message.
    pub progress_message: Option<String>,
    /// Populated only when `status == Failed`.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A completed analysis artifact, written once on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Mongo `_id` as a string.
    pub id: Option<String>,
    /// Owning task id.
    pub task_id: String,
    /// Target instrument code.
    pub symbol: String,
    /// Analysis date this report covers, kept as a string (it is a date,
    /// not an instant — spec.md §9).
    pub analysis_date: String,
    /// Named report sections (market, sentiment, news, fundamentals,
    /// investment plan, trader plan, final decision, debate summaries).
    /// All values are coerced to strings at the boundary (spec.md §4.7).
    pub sections: std::collections::BTreeMap<String, String>,
    /// Short human summary, derived if not supplied directly.
    pub summary: Option<String>,
    /// Short recommendation string, derived if not supplied directly.
    pub recommendation: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of the last run of one ingestion job. Overwritten each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SyncJobStatus {
    /// No run has started, or the previous run's state was cleared.
    Idle,
    /// A run is currently in flight.
    Running,
    /// The last run completed with no errors.
    Success,
    /// The last run completed but some sources/batches errored.
    SuccessWithErrors,
    /// The last run raised a fatal error before completing.
    Failed,
}

impl SyncJobStatus {
    /// Lowercase identifier, the literal persisted value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Success => "success",
            Self::SuccessWithErrors => "success_with_errors",
            Self::Failed => "failed",
        }
    }
}

/// Last-run outcome for one named ingestion job. Unique on `job`; when
/// `data_type` is present it further partitions the document (spec.md §9's
/// open question — see DESIGN.md for the decision).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Mongo `_id` as a string.
    pub id: Option<String>,
    /// Job name, e.g. `"basics_sync"`, `"quotes_ingestion"`.
    pub job: String,
    /// Optional denormalized partition tag, e.g. `"cn"`, `"hk"`, `"us"`.
    pub data_type: Option<String>,
    pub status: SyncJobStatus,
    /// Provider that produced this run's data, when single-sourced.
    pub source: Option<String>,
    pub records_count: u64,
    pub error_count: u64,
    /// Populated when `status == Failed` or `SuccessWithErrors`.
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A user-visible event. Pruned by retention policy (time + count bound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Mongo `_id` as a string.
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    pub body: String,
    /// Whether the user has acknowledged this notification.
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-market priority override for a named data source. Larger `rank` wins
/// (spec.md §4.2). Admin-managed; read once at adapter/manager
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceGrouping {
    /// Market category this override applies to (e.g. "cn", "hk", "us").
    pub market_category_id: MarketCategory,
    pub data_source: DataSourceKey,
    pub rank: i32,
}

/// Market category an instrument or priority override belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum MarketCategory {
    /// Mainland China A-shares (Shanghai/Shenzhen/Beijing).
    Cn,
    /// Hong Kong.
    Hk,
    /// United States.
    Us,
}

impl MarketCategory {
    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cn => "cn",
            Self::Hk => "hk",
            Self::Us => "us",
        }
    }
}

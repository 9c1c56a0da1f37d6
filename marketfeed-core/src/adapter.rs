//! The `DataSourceAdapter` trait: a single closed capability set
//! (spec.md §4.1), generalized from the teacher's `BorsaConnector` plus its
//! dozen per-capability role traits (`borsa_core::connector`). This domain
//! does not need fundamentals/options/news-search role proliferation, so
//! the whole capability set collapses into one trait with one method per
//! capability, matching spec.md's closed set exactly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketfeed_types::model::{HistoricalBar, MarketQuote, Period, StockBasics};
use marketfeed_types::{Capability, PlatformError};

/// Where a provider's credentials were sourced from, for providers whose
/// token may come from either the process environment or a config
/// collection (spec.md §4.1: "Tushare token source: environment vs.
/// database").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// Sourced from a process environment variable (e.g. `TUSHARE_TOKEN`).
    Environment,
    /// Sourced from a database-backed config collection.
    Database,
    /// No credential configured; the adapter is unauthenticated or unusable.
    None,
}

/// Outcome of an [`DataSourceAdapter::availability`] probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// Whether the adapter is currently usable.
    pub available: bool,
    /// Where its credential came from, if applicable.
    pub credential_origin: CredentialOrigin,
}

/// Request parameters for [`DataSourceAdapter::daily_basic`].
#[derive(Debug, Clone)]
pub struct DailyBasicRequest {
    /// Trade date in `YYYYMMDD` form.
    pub trade_date: String,
}

/// A single row of the `daily_basic` response: per-instrument valuation
/// metrics, any of which may be absent (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct DailyBasicRow {
    pub code: String,
    pub close: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ps: Option<f64>,
    pub total_mv: Option<f64>,
    pub circ_mv: Option<f64>,
}

/// Request parameters for [`DataSourceAdapter::kline`].
#[derive(Debug, Clone)]
pub struct KlineRequest {
    pub code: String,
    pub period: Period,
    pub limit: Option<u32>,
    /// Adjustment flavor: `"qfq"`, `"hfq"`, or `None` for unadjusted.
    pub adj: Option<String>,
}

/// Whether a news item is a news article or a regulatory/exchange
/// announcement (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsKind {
    News,
    Announcement,
}

/// A single news or announcement item.
#[derive(Debug, Clone)]
pub struct NewsItem {
    pub code: String,
    pub kind: NewsKind,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub url: Option<String>,
}

/// Request parameters for [`DataSourceAdapter::news`].
#[derive(Debug, Clone)]
pub struct NewsRequest {
    pub code: String,
    pub days: u32,
    pub limit: u32,
    pub include_announcements: bool,
}

/// A single data-source connector: Tushare, `AKShare`, `BaoStock` (CN),
/// Yahoo Finance (HK/US), Finnhub (US), or a test double.
///
/// Each method may return [`PlatformError::Unsupported`] when the provider
/// has no concept of the requested capability at all; the
/// [`super::DataSourceManager`](crate) treats only other error variants as
/// a fallback trigger (spec.md §4.1).
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    /// Stable identifier used in logs, provenance tags, and config keys.
    fn key(&self) -> marketfeed_types::DataSourceKey;

    /// Capabilities this adapter implements. A capability absent from this
    /// set always yields [`PlatformError::Unsupported`] without a network
    /// call.
    fn capabilities(&self) -> &'static [Capability];

    /// Cheap, synchronous-in-spirit availability probe (spec.md §4.1: "must
    /// not make a network call that can fail noisily").
    async fn availability(&self) -> Availability;

    /// Tabular stock list; an empty `Vec` is a valid, non-error response.
    async fn stock_list(&self) -> Result<Vec<StockBasics>, PlatformError>;

    /// Per-instrument valuation snapshot for `trade_date`.
    async fn daily_basic(
        &self,
        req: DailyBasicRequest,
    ) -> Result<Vec<DailyBasicRow>, PlatformError>;

    /// Most recent trade date this provider has data for, as `YYYYMMDD`.
    async fn find_latest_trade_date(&self) -> Result<String, PlatformError>;

    /// Realtime snapshot keyed by 6-digit code.
    async fn realtime_quotes(
        &self,
        codes: &[String],
    ) -> Result<Vec<MarketQuote>, PlatformError>;

    /// Ordered (oldest-first) OHLCV history.
    async fn kline(&self, req: KlineRequest) -> Result<Vec<HistoricalBar>, PlatformError>;

    /// News and announcement items for `code`.
    async fn news(&self, req: NewsRequest) -> Result<Vec<NewsItem>, PlatformError>;
}

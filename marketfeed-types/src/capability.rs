use core::fmt;
use serde::{Deserialize, Serialize};

/// Closed capability set every [`DataSourceAdapter`](../marketfeed_core/trait.DataSourceAdapter.html)
/// implements, per spec.md §4.1. Each capability is either unsupported by a
/// given provider (`PlatformError::Unsupported`) or supported-but-possibly-empty
/// (`PlatformError::Empty`) — the two are never conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Cheap synchronous-ish probe of provider reachability/credentials.
    Availability,
    /// Tabular instrument list: symbol, name, industry, market, list date.
    StockList,
    /// Per-instrument market-cap / PE / PB / PS / turnover for one trade date.
    DailyBasic,
    /// Most recent trading day known to the provider.
    LatestTradeDate,
    /// Near-real-time snapshot quotes keyed by 6-digit code.
    RealtimeQuotes,
    /// Ordered (oldest-first) OHLCV bars.
    Kline,
    /// News and announcement items.
    News,
}

impl Capability {
    /// Stable identifier used in logs, errors, and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Availability => "availability",
            Self::StockList => "stock_list",
            Self::DailyBasic => "daily_basic",
            Self::LatestTradeDate => "find_latest_trade_date",
            Self::RealtimeQuotes => "realtime_quotes",
            Self::Kline => "kline",
            Self::News => "news",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

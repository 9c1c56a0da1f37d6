use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed key identifying a data source adapter, used in priority
/// configuration, provenance tags, and SyncStatus records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DataSourceKey {
    /// Tushare Pro (CN).
    Tushare,
    /// AKShare (CN).
    AkShare,
    /// BaoStock (CN).
    BaoStock,
    /// Yahoo Finance via the `yfinance` convention (HK/US).
    YahooFinance,
    /// Finnhub (US).
    Finnhub,
}

impl DataSourceKey {
    /// Stable lowercase identifier, the literal value persisted as
    /// `StockBasics.source` / `SyncStatus.source` (spec.md §4.4: never the
    /// `"multi_source"` sentinel).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tushare => "tushare",
            Self::AkShare => "akshare",
            Self::BaoStock => "baostock",
            Self::YahooFinance => "yfinance",
            Self::Finnhub => "finnhub",
        }
    }

    /// Parse the persisted string form back into a key, if recognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tushare" => Some(Self::Tushare),
            "akshare" => Some(Self::AkShare),
            "baostock" => Some(Self::BaoStock),
            "yfinance" | "yahoo_finance" => Some(Self::YahooFinance),
            "finnhub" => Some(Self::Finnhub),
            _ => None,
        }
    }
}

impl fmt::Display for DataSourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

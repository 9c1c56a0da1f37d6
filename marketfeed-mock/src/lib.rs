//! marketfeed-mock
//!
//! Deterministic [`DataSourceAdapter`] implementations for tests, generalized
//! from `borsa-mock::MockConnector` (magic-symbol failure injection) and
//! `borsa-mock::dynamic::DynamicMockConnector` (programmable per-call
//! behavior rules).

use async_trait::async_trait;
use marketfeed_core::adapter::{
    Availability, CredentialOrigin, DailyBasicRequest, DailyBasicRow, DataSourceAdapter,
    KlineRequest, NewsKind, NewsRequest,
};
use marketfeed_types::model::{HistoricalBar, MarketQuote, StockBasics};
use marketfeed_types::{Capability, DataSourceKey, PlatformError};

pub mod configurable;
mod fixtures;

pub use configurable::{ConfigurableAdapter, MockBehavior};

/// A single news or announcement item, re-exported here since it is part of
/// this crate's public fixture surface.
pub type NewsItem = marketfeed_core::adapter::NewsItem;

/// Fixed-behavior mock adapter for CI-safe tests. Returns deterministic
/// fixtures for every capability; three magic codes let tests force
/// specific failure/latency shapes without a programmable rule table:
///
/// - `"FAIL"` — a [`PlatformError::Permanent`] failure.
/// - `"TIMEOUT"` — sleeps past any reasonable adapter timeout.
/// - `"EMPTY"` — a successful-but-empty result.
pub struct MockAdapter {
    key: DataSourceKey,
    capabilities: &'static [Capability],
}

impl MockAdapter {
    /// A mock standing in for the given source, implementing every
    /// capability (useful as the sole adapter in a manager under test).
    #[must_use]
    pub const fn new(key: DataSourceKey) -> Self {
        Self {
            key,
            capabilities: &[
                Capability::Availability,
                Capability::StockList,
                Capability::DailyBasic,
                Capability::LatestTradeDate,
                Capability::RealtimeQuotes,
                Capability::Kline,
                Capability::News,
            ],
        }
    }

    /// A mock that only implements `capabilities`; anything else returns
    /// [`PlatformError::Unsupported`] without consulting the fixtures.
    #[must_use]
    pub const fn with_capabilities(key: DataSourceKey, capabilities: &'static [Capability]) -> Self {
        Self { key, capabilities }
    }

    fn supports(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    async fn maybe_inject(code: &str, capability: &'static str) -> Result<InjectedOutcome, PlatformError> {
        match code {
            "FAIL" => Err(PlatformError::permanent("marketfeed-mock", format!("forced failure: {capability}"))),
            "TIMEOUT" => {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(InjectedOutcome::Proceed)
            }
            "EMPTY" => Ok(InjectedOutcome::Empty),
            _ => Ok(InjectedOutcome::Proceed),
        }
    }
}

enum InjectedOutcome {
    Proceed,
    Empty,
}

#[async_trait]
impl DataSourceAdapter for MockAdapter {
    fn key(&self) -> DataSourceKey {
        self.key
    }

    fn capabilities(&self) -> &'static [Capability] {
        self.capabilities
    }

    async fn availability(&self) -> Availability {
        Availability {
            available: self.supports(Capability::Availability),
            credential_origin: CredentialOrigin::Environment,
        }
    }

    async fn stock_list(&self) -> Result<Vec<StockBasics>, PlatformError> {
        if !self.supports(Capability::StockList) {
            return Err(PlatformError::unsupported("stock_list"));
        }
        match Self::maybe_inject("", "stock_list").await? {
            InjectedOutcome::Empty => Ok(vec![]),
            InjectedOutcome::Proceed => Ok(fixtures::stock_basics(self.key.as_str())),
        }
    }

    async fn daily_basic(&self, req: DailyBasicRequest) -> Result<Vec<DailyBasicRow>, PlatformError> {
        if !self.supports(Capability::DailyBasic) {
            return Err(PlatformError::unsupported("daily_basic"));
        }
        match Self::maybe_inject(&req.trade_date, "daily_basic").await? {
            InjectedOutcome::Empty => Ok(vec![]),
            InjectedOutcome::Proceed => Ok(fixtures::daily_basic_rows(0.0)),
        }
    }

    async fn find_latest_trade_date(&self) -> Result<String, PlatformError> {
        if !self.supports(Capability::LatestTradeDate) {
            return Err(PlatformError::unsupported("find_latest_trade_date"));
        }
        Ok("20260731".to_string())
    }

    async fn realtime_quotes(&self, codes: &[String]) -> Result<Vec<MarketQuote>, PlatformError> {
        if !self.supports(Capability::RealtimeQuotes) {
            return Err(PlatformError::unsupported("realtime_quotes"));
        }
        let mut out = Vec::with_capacity(codes.len());
        for code in codes {
            match Self::maybe_inject(code, "realtime_quotes").await? {
                InjectedOutcome::Empty => {}
                InjectedOutcome::Proceed => out.push(fixtures::quote(code, self.key.as_str())),
            }
        }
        Ok(out)
    }

    async fn kline(&self, req: KlineRequest) -> Result<Vec<HistoricalBar>, PlatformError> {
        if !self.supports(Capability::Kline) {
            return Err(PlatformError::unsupported("kline"));
        }
        match Self::maybe_inject(&req.code, "kline").await? {
            InjectedOutcome::Empty => Ok(vec![]),
            InjectedOutcome::Proceed => {
                Ok(fixtures::kline(&req.code, self.key.as_str(), req.period, req.limit.unwrap_or(30)))
            }
        }
    }

    async fn news(&self, req: NewsRequest) -> Result<Vec<NewsItem>, PlatformError> {
        if !self.supports(Capability::News) {
            return Err(PlatformError::unsupported("news"));
        }
        match Self::maybe_inject(&req.code, "news").await? {
            InjectedOutcome::Empty => Ok(vec![]),
            InjectedOutcome::Proceed => {
                let mut items = fixtures::news(&req.code);
                if !req.include_announcements {
                    items.retain(|n| n.kind != NewsKind::Announcement);
                }
                items.truncate(req.limit as usize);
                Ok(items)
            }
        }
    }
}

//! Programmable mock adapter: tests register a [`MockBehavior`] per code so
//! manager/ingestion tests can exercise mixed success/failure across a
//! priority-ordered set of sources without a real network. Generalized from
//! `borsa-mock::dynamic::DynamicMockConnector`'s per-symbol rule tables
//! (streaming-specific `StreamBehavior`/`StreamController` dropped — this
//! domain polls rather than streams).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use marketfeed_core::adapter::{
    Availability, CredentialOrigin, DailyBasicRequest, DailyBasicRow, DataSourceAdapter,
    KlineRequest, NewsRequest,
};
use marketfeed_types::model::{HistoricalBar, MarketQuote, StockBasics};
use marketfeed_types::{Capability, DataSourceKey, PlatformError};

use crate::NewsItem;

/// Instruction for how a call should behave for a given key.
#[derive(Clone)]
pub enum MockBehavior<T> {
    /// Return the provided value immediately.
    Return(T),
    /// Fail immediately with the provided error.
    Fail(PlatformError),
}

#[derive(Default)]
struct Rules {
    stock_list: Option<MockBehavior<Vec<StockBasics>>>,
    daily_basic: HashMap<String, MockBehavior<Vec<DailyBasicRow>>>,
    latest_trade_date: Option<MockBehavior<String>>,
    quotes: HashMap<String, MockBehavior<MarketQuote>>,
    kline: HashMap<String, MockBehavior<Vec<HistoricalBar>>>,
    news: HashMap<String, MockBehavior<Vec<NewsItem>>>,
}

/// A [`DataSourceAdapter`] whose responses are set programmatically per
/// test, keyed by trade date / code as appropriate to each capability.
pub struct ConfigurableAdapter {
    key: DataSourceKey,
    rules: Mutex<Rules>,
}

impl ConfigurableAdapter {
    /// An adapter with no rules configured; every call returns
    /// [`PlatformError::Empty`] until a rule is registered.
    #[must_use]
    pub fn new(key: DataSourceKey) -> Self {
        Self {
            key,
            rules: Mutex::new(Rules::default()),
        }
    }

    /// Set the fixed response for `stock_list()`.
    pub fn set_stock_list(&self, behavior: MockBehavior<Vec<StockBasics>>) {
        self.rules.lock().expect("mock lock poisoned").stock_list = Some(behavior);
    }

    /// Set the response for `daily_basic()` on a given trade date.
    pub fn set_daily_basic(&self, trade_date: impl Into<String>, behavior: MockBehavior<Vec<DailyBasicRow>>) {
        self.rules
            .lock()
            .expect("mock lock poisoned")
            .daily_basic
            .insert(trade_date.into(), behavior);
    }

    /// Set the fixed response for `find_latest_trade_date()`.
    pub fn set_latest_trade_date(&self, behavior: MockBehavior<String>) {
        self.rules.lock().expect("mock lock poisoned").latest_trade_date = Some(behavior);
    }

    /// Set the response for `realtime_quotes()` on a given code.
    pub fn set_quote(&self, code: impl Into<String>, behavior: MockBehavior<MarketQuote>) {
        self.rules.lock().expect("mock lock poisoned").quotes.insert(code.into(), behavior);
    }

    /// Set the response for `kline()` on a given code.
    pub fn set_kline(&self, code: impl Into<String>, behavior: MockBehavior<Vec<HistoricalBar>>) {
        self.rules.lock().expect("mock lock poisoned").kline.insert(code.into(), behavior);
    }

    /// Set the response for `news()` on a given code.
    pub fn set_news(&self, code: impl Into<String>, behavior: MockBehavior<Vec<NewsItem>>) {
        self.rules.lock().expect("mock lock poisoned").news.insert(code.into(), behavior);
    }
}

fn resolve<T: Clone>(behavior: Option<&MockBehavior<T>>, empty_capability: &'static str) -> Result<T, PlatformError> {
    match behavior {
        Some(MockBehavior::Return(v)) => Ok(v.clone()),
        Some(MockBehavior::Fail(e)) => Err(e.clone()),
        None => Err(PlatformError::empty(empty_capability)),
    }
}

#[async_trait]
impl DataSourceAdapter for ConfigurableAdapter {
    fn key(&self) -> DataSourceKey {
        self.key
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::Availability,
            Capability::StockList,
            Capability::DailyBasic,
            Capability::LatestTradeDate,
            Capability::RealtimeQuotes,
            Capability::Kline,
            Capability::News,
        ]
    }

    async fn availability(&self) -> Availability {
        Availability {
            available: true,
            credential_origin: CredentialOrigin::Environment,
        }
    }

    async fn stock_list(&self) -> Result<Vec<StockBasics>, PlatformError> {
        resolve(self.rules.lock().expect("mock lock poisoned").stock_list.as_ref(), "stock_list")
    }

    async fn daily_basic(&self, req: DailyBasicRequest) -> Result<Vec<DailyBasicRow>, PlatformError> {
        resolve(
            self.rules.lock().expect("mock lock poisoned").daily_basic.get(&req.trade_date),
            "daily_basic",
        )
    }

    async fn find_latest_trade_date(&self) -> Result<String, PlatformError> {
        resolve(
            self.rules.lock().expect("mock lock poisoned").latest_trade_date.as_ref(),
            "find_latest_trade_date",
        )
    }

    async fn realtime_quotes(&self, codes: &[String]) -> Result<Vec<MarketQuote>, PlatformError> {
        let rules = self.rules.lock().expect("mock lock poisoned");
        let mut out = Vec::with_capacity(codes.len());
        for code in codes {
            match resolve(rules.quotes.get(code), "realtime_quotes") {
                Ok(q) => out.push(q),
                Err(PlatformError::Empty { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    async fn kline(&self, req: KlineRequest) -> Result<Vec<HistoricalBar>, PlatformError> {
        resolve(self.rules.lock().expect("mock lock poisoned").kline.get(&req.code), "kline")
    }

    async fn news(&self, req: NewsRequest) -> Result<Vec<NewsItem>, PlatformError> {
        resolve(self.rules.lock().expect("mock lock poisoned").news.get(&req.code), "news")
    }
}

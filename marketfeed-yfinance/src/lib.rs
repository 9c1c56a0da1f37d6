//! marketfeed-yfinance
//!
//! [`DataSourceAdapter`] implementation for HK/US instruments, backed by the
//! `yfinance-rs` client. Generalized from `borsa-yfinance::RealAdapter`
//! (wraps a single `yf::YfClient`, implements one teacher role-trait per
//! capability) down to this domain's closed capability set: `availability`,
//! `realtime_quotes`, `kline`, and `news`. `stock_list`/`daily_basic`/
//! `find_latest_trade_date` are CN-only concepts (spec.md §4.1) and always
//! return [`PlatformError::Unsupported`] here.
#![warn(missing_docs)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use marketfeed_core::adapter::{
    Availability, CredentialOrigin, DailyBasicRequest, DailyBasicRow, DataSourceAdapter,
    KlineRequest, NewsItem, NewsKind, NewsRequest,
};
use marketfeed_types::model::{HistoricalBar, MarketQuote, Period, StockBasics};
use marketfeed_types::{Capability, DataSourceKey, PlatformError};

const CAPABILITIES: &[Capability] = &[
    Capability::Availability,
    Capability::RealtimeQuotes,
    Capability::Kline,
    Capability::News,
];

fn map_yf_err(e: &yfinance_rs::YfError, context: &str) -> PlatformError {
    use yfinance_rs::YfError;
    match e {
        YfError::NotFound { .. } => PlatformError::NotFound {
            what: context.to_string(),
        },
        YfError::RateLimited { .. } => {
            PlatformError::transient("yfinance", format!("rate limited: {context}"))
        }
        YfError::Status { status, .. } => {
            PlatformError::transient("yfinance", format!("status {status}: {context}"))
        }
        other => PlatformError::permanent("yfinance", format!("{other}: {context}")),
    }
}

/// Connector backed by a single `yfinance_rs::YfClient`. `YfClient` is
/// `Clone + Send + Sync`, so no external locking is needed.
pub struct YfAdapter {
    client: yfinance_rs::YfClient,
}

impl YfAdapter {
    /// Build a default client with a recommended user agent, matching the
    /// teacher's `RealAdapter::new_default` configuration.
    ///
    /// # Panics
    /// Panics if the underlying `YfClient` builder fails, which is not
    /// expected in normal environments.
    #[must_use]
    pub fn new_default() -> Self {
        Self {
            client: yfinance_rs::YfClient::builder()
                .user_agent(
                    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                     Chrome/122.0.0.0 Safari/537.36",
                )
                .build()
                .expect("failed to build YfClient"),
        }
    }

    /// Wrap an existing client (used by tests to point at a mock transport).
    #[must_use]
    pub const fn new_with_client(client: yfinance_rs::YfClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceAdapter for YfAdapter {
    fn key(&self) -> DataSourceKey {
        DataSourceKey::YahooFinance
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn availability(&self) -> Availability {
        Availability {
            available: true,
            credential_origin: CredentialOrigin::None,
        }
    }

    async fn stock_list(&self) -> Result<Vec<StockBasics>, PlatformError> {
        Err(PlatformError::unsupported("stock_list"))
    }

    async fn daily_basic(&self, _req: DailyBasicRequest) -> Result<Vec<DailyBasicRow>, PlatformError> {
        Err(PlatformError::unsupported("daily_basic"))
    }

    async fn find_latest_trade_date(&self) -> Result<String, PlatformError> {
        Err(PlatformError::unsupported("find_latest_trade_date"))
    }

    #[tracing::instrument(skip(self), fields(source = "yfinance", capability = "realtime_quotes"))]
    async fn realtime_quotes(&self, codes: &[String]) -> Result<Vec<MarketQuote>, PlatformError> {
        let quotes = yfinance_rs::quotes(&self.client, codes.iter().cloned())
            .await
            .map_err(|e| map_yf_err(&e, "quotes"))?;
        Ok(quotes.into_iter().map(quote_to_market_quote).collect())
    }

    #[tracing::instrument(skip(self), fields(source = "yfinance", capability = "kline", symbol = %req.code))]
    async fn kline(&self, req: KlineRequest) -> Result<Vec<HistoricalBar>, PlatformError> {
        if req.period != Period::Daily {
            return Err(PlatformError::unsupported("kline: non-daily period"));
        }
        let auto_adjust = req.adj.is_some();
        let response = yfinance_rs::HistoryBuilder::new(&self.client, &req.code)
            .range(yfinance_rs::Range::Y1)
            .interval(yfinance_rs::Interval::D1)
            .fetch()
            .await
            .map_err(|e| map_yf_err(&e, &format!("history for {}", req.code)))?;
        let _ = auto_adjust;

        let mut bars: Vec<HistoricalBar> = response
            .candles
            .into_iter()
            .map(|c| candle_to_bar(&req.code, &c))
            .collect();
        derive_pre_close(&mut bars);
        if let Some(limit) = req.limit {
            let start = bars.len().saturating_sub(limit as usize);
            bars = bars.split_off(start);
        }
        Ok(bars)
    }

    #[tracing::instrument(skip(self), fields(source = "yfinance", capability = "news", symbol = %req.code))]
    async fn news(&self, req: NewsRequest) -> Result<Vec<NewsItem>, PlatformError> {
        let articles = yfinance_rs::NewsBuilder::new(&self.client, &req.code)
            .count(req.limit)
            .tab(yfinance_rs::NewsTab::News)
            .fetch()
            .await
            .map_err(|e| map_yf_err(&e, &format!("news for {}", req.code)))?;

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(req.days));
        Ok(articles
            .into_iter()
            .filter_map(|a| {
                let published_at = Utc.timestamp_opt(a.provider_publish_time, 0).single()?;
                (published_at >= cutoff).then_some(NewsItem {
                    code: req.code.clone(),
                    kind: NewsKind::News,
                    title: a.title,
                    published_at,
                    url: a.link,
                })
            })
            .take(req.limit as usize)
            .collect())
    }
}

fn quote_to_market_quote(q: yfinance_rs::Quote) -> MarketQuote {
    let now = Utc::now();
    let close = q.regular_market_price.unwrap_or_default();
    let pre_close = q.regular_market_previous_close;
    MarketQuote {
        id: None,
        code: q.symbol.clone(),
        symbol: Some(q.symbol),
        close,
        open: None,
        high: None,
        low: None,
        pre_close,
        pct_chg: pre_close
            .filter(|p| *p != 0.0)
            .map(|p| (close - p) / p * 100.0),
        volume: None,
        amount: None,
        trade_date: now.format("%Y-%m-%d").to_string(),
        source: DataSourceKey::YahooFinance.as_str().to_string(),
        updated_at: now,
    }
}

fn candle_to_bar(code: &str, c: &yfinance_rs::Candle) -> HistoricalBar {
    let trade_date = Utc
        .timestamp_opt(c.ts, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d")
        .to_string();
    HistoricalBar {
        id: None,
        symbol: code.to_string(),
        trade_date,
        data_source: DataSourceKey::YahooFinance.as_str().to_string(),
        period: Period::Daily,
        open: c.open,
        high: c.high,
        low: c.low,
        close: c.close,
        pre_close: None,
        volume: c.volume.unwrap_or_default() as f64,
        amount: None,
    }
}

/// Yahoo omits `pre_close`; derive it by shifting (spec.md §4.4).
fn derive_pre_close(bars: &mut [HistoricalBar]) {
    for i in 1..bars.len() {
        bars[i].pre_close = Some(bars[i - 1].close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quote(symbol: &str, price: f64, prev_close: f64) -> yfinance_rs::Quote {
        yfinance_rs::Quote {
            symbol: symbol.to_string(),
            regular_market_price: Some(price),
            regular_market_previous_close: Some(prev_close),
            currency: Some("USD".to_string()),
            exchange: Some("NMS".to_string()),
            market_state: Some("REGULAR".to_string()),
        }
    }

    #[test]
    fn pct_chg_is_derived_from_close_and_pre_close() {
        let mq = quote_to_market_quote(sample_quote("AAPL", 110.0, 100.0));
        assert_eq!(mq.close, 110.0);
        assert_eq!(mq.pct_chg, Some(10.0));
    }

    #[test]
    fn zero_pre_close_does_not_divide_by_zero() {
        let mq = quote_to_market_quote(sample_quote("NEWCO", 5.0, 0.0));
        assert_eq!(mq.pct_chg, None);
    }

    #[test]
    fn pre_close_is_derived_by_shifting_candles() {
        let mut bars = vec![
            candle_to_bar(
                "AAPL",
                &yfinance_rs::Candle {
                    ts: 1_700_000_000,
                    open: 10.0,
                    high: 10.5,
                    low: 9.8,
                    close: 10.2,
                    volume: Some(1000),
                },
            ),
            candle_to_bar(
                "AAPL",
                &yfinance_rs::Candle {
                    ts: 1_700_086_400,
                    open: 10.2,
                    high: 10.8,
                    low: 10.1,
                    close: 10.6,
                    volume: Some(1200),
                },
            ),
        ];
        derive_pre_close(&mut bars);
        assert_eq!(bars[0].pre_close, None);
        assert_eq!(bars[1].pre_close, Some(10.2));
    }
}

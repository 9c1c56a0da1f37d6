//! Quote Rotation Pipeline (spec.md §4.5): trading-hours gating, one
//! provider per tick with no within-tick fallback, Tushare free-tier
//! admission, and off-hours backfill.
//!
//! Rotation walks a configurable provider list rather than the spec's
//! literal `[tushare, akshare_eastmoney, akshare_sina]` triple: this
//! domain's `DataSourceKey` models AKShare as one adapter (spec.md §4.1
//! does not split it into per-backend keys), so the rotation list defaults
//! to `[Tushare, AkShare, BaoStock]` — the same three CN sources, in the
//! same provider-diversity spirit, generalized to however many CN
//! adapters are actually registered.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

use marketfeed_core::manager::DataSourceManager;
use marketfeed_types::model::MarketCategory;
use marketfeed_types::{DataSourceKey, PlatformError};
use marketfeed_middleware::TushareAdmission;

use crate::ingestion::{record_running, record_terminal, RunOutcome};
use crate::store::{DocumentStore, UpsertOp};

const JOB: &str = "quotes_ingestion";

fn morning() -> (NaiveTime, NaiveTime) {
    (NaiveTime::from_hms_opt(9, 30, 0).unwrap(), NaiveTime::from_hms_opt(11, 30, 0).unwrap())
}

fn afternoon() -> (NaiveTime, NaiveTime) {
    (NaiveTime::from_hms_opt(13, 0, 0).unwrap(), NaiveTime::from_hms_opt(15, 30, 0).unwrap())
}

/// True when `local_time` on `weekday` falls inside a trading window
/// (spec.md §4.5: "weekday, and local clock within [09:30, 11:30] ∪
/// [13:00, 15:30]" — the 15:00-15:30 tail exists to catch the final print
/// after close).
fn is_trading_time(weekday: Weekday, local_time: NaiveTime) -> bool {
    if matches!(weekday, Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let (m_start, m_end) = morning();
    let (a_start, a_end) = afternoon();
    (local_time >= m_start && local_time <= m_end) || (local_time >= a_start && local_time <= a_end)
}

/// Rotates through a fixed provider list, one advance per tick.
struct Rotation {
    providers: Vec<DataSourceKey>,
    index: AtomicUsize,
}

impl Rotation {
    fn next(&self) -> DataSourceKey {
        let i = self.index.fetch_add(1, Ordering::Relaxed) % self.providers.len();
        self.providers[i]
    }
}

/// Drives realtime `MarketQuote` collection on a timer (spec.md §4.5).
pub struct QuoteRotationPipeline {
    store: DocumentStore,
    manager: Arc<DataSourceManager>,
    tushare: Arc<TushareAdmission>,
    rotation: Rotation,
    tz: Tz,
    backfill_on_offhours: bool,
}

impl QuoteRotationPipeline {
    /// Build a pipeline. `providers` is tried in rotation order; `tz_name`
    /// must be a valid IANA zone (default in spec.md §4.5 is
    /// `Asia/Shanghai`).
    pub fn new(
        store: DocumentStore,
        manager: Arc<DataSourceManager>,
        tushare: Arc<TushareAdmission>,
        tz_name: &str,
        providers: Vec<DataSourceKey>,
        backfill_on_offhours: bool,
    ) -> Result<Self, PlatformError> {
        let tz = Tz::from_str(tz_name).map_err(|_| PlatformError::InvalidArg(format!("invalid timezone: {tz_name}")))?;
        Ok(Self {
            store,
            manager,
            tushare,
            rotation: Rotation { providers, index: AtomicUsize::new(0) },
            tz,
            backfill_on_offhours,
        })
    }

    /// Run the pipeline forever at `interval`, sleeping between ticks.
    /// Intended to be wrapped in a [`marketfeed_core::task_handle::TaskHandle`]
    /// by the composition root.
    pub async fn run_forever(self: Arc<Self>, interval: Duration) {
        loop {
            self.tick().await;
            tokio::time::sleep(interval).await;
        }
    }

    /// Execute one tick of the pipeline (spec.md §4.5 "Pipeline per tick").
    pub async fn tick(&self) {
        let now = Utc::now().with_timezone(&self.tz);
        if !is_trading_time(now.weekday(), now.time()) {
            if self.backfill_on_offhours {
                self.backfill().await;
            }
            return;
        }

        let provider = self.rotation.next();
        if provider == DataSourceKey::Tushare && !self.tushare.admit() {
            record_running(&self.store, JOB, None).await;
            record_terminal(&self.store, JOB, None, RunOutcome::failed("tushare budget exhausted".to_string())).await;
            return;
        }

        let Some(adapter) = self.manager.adapter(provider) else { return };
        record_running(&self.store, JOB, None).await;

        let codes = self.known_codes().await;
        let outcome = match adapter.realtime_quotes(&codes).await {
            Ok(quotes) if quotes.is_empty() => RunOutcome::failed("empty realtime_quotes result".to_string()),
            Ok(quotes) => {
                if provider == DataSourceKey::Tushare {
                    self.tushare.record_call();
                }
                self.write_quotes(provider, quotes).await
            }
            Err(e) => RunOutcome::failed(e.to_string()),
        };
        record_terminal(&self.store, JOB, None, outcome).await;
    }

    async fn write_quotes(&self, provider: DataSourceKey, quotes: Vec<marketfeed_types::model::MarketQuote>) -> RunOutcome {
        let ops: Vec<UpsertOp> = quotes
            .iter()
            .map(|q| {
                let mut q = q.clone();
                q.code = marketfeed_types::normalize_code(&q.code);
                q.updated_at = Utc::now();
                let body = bson::to_document(&q).expect("MarketQuote always serializes");
                UpsertOp { filter: bson::doc! {"code": &q.code}, body }
            })
            .collect();
        let (written, errored) = self.store.bulk_upsert(&self.store.raw_market_quotes(), ops, marketfeed_types::BackoffConfig::standard()).await;
        if errored == 0 {
            RunOutcome::success(Some(provider.as_str().to_string()), written)
        } else {
            RunOutcome::success_with_errors(Some(provider.as_str().to_string()), written, errored, format!("{errored} quotes failed to upsert"))
        }
    }

    /// Codes already tracked in `stock_basic_info`, used as the realtime
    /// quote universe. A full catalogue scan rather than a caller-supplied
    /// watchlist, matching spec.md §4.5's "poll the whole market" framing.
    async fn known_codes(&self) -> Vec<String> {
        use futures::stream::TryStreamExt;
        match self.store.stock_basics().find(bson::doc! {}).await {
            Ok(cursor) => cursor.try_collect::<Vec<_>>().await.unwrap_or_default().into_iter().map(|r| r.code).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Off-hours path: fill `MarketQuote` from the latest historical bar
    /// when empty, or when the stored snapshot predates today's latest
    /// trade date (spec.md §4.5 step 1). This is distinct from the §9
    /// 15:00-15:30 buffer decision (DESIGN.md), which prefers the realtime
    /// snapshot *when one is available that tick* — here, off trading
    /// hours, no realtime snapshot is being produced this tick at all.
    async fn backfill(&self) {
        let Ok(latest) = self.manager.find_latest_trade_date_with_fallback(MarketCategory::Cn, &[]).await else { return };
        let latest_date = latest.value;

        let is_stale_or_empty = match self.store.market_quote().find_one(bson::doc! {}).await {
            Ok(Some(q)) => q.trade_date < latest_date,
            Ok(None) => true,
            Err(_) => return,
        };
        if !is_stale_or_empty {
            return;
        }

        record_running(&self.store, JOB, Some("backfill")).await;
        let outcome = self.backfill_from_historical(&latest_date).await;
        record_terminal(&self.store, JOB, Some("backfill"), outcome).await;
    }

    async fn backfill_from_historical(&self, trade_date: &str) -> RunOutcome {
        use futures::stream::TryStreamExt;
        let filter = bson::doc! {"trade_date": trade_date, "period": "daily"};
        let bars: Vec<marketfeed_types::model::HistoricalBar> = match self.store.historical_bar().find(filter).await {
            Ok(cursor) => cursor.try_collect().await.unwrap_or_default(),
            Err(e) => return RunOutcome::failed(e.to_string()),
        };

        let ops: Vec<UpsertOp> = bars
            .iter()
            .map(|bar| {
                let code = marketfeed_types::normalize_code(&bar.symbol);
                let quote = marketfeed_types::model::MarketQuote {
                    id: None,
                    code: code.clone(),
                    symbol: Some(bar.symbol.clone()),
                    close: bar.close,
                    open: Some(bar.open),
                    high: Some(bar.high),
                    low: Some(bar.low),
                    pre_close: bar.pre_close,
                    pct_chg: bar.pre_close.filter(|p| *p != 0.0).map(|p| (bar.close - p) / p * 100.0),
                    volume: Some(bar.volume),
                    amount: bar.amount,
                    trade_date: bar.trade_date.clone(),
                    source: bar.data_source.clone(),
                    updated_at: Utc::now(),
                };
                let body = bson::to_document(&quote).expect("MarketQuote always serializes");
                UpsertOp { filter: bson::doc! {"code": &code}, body }
            })
            .collect();

        let (written, errored) = self.store.bulk_upsert(&self.store.raw_market_quotes(), ops, marketfeed_types::BackoffConfig::standard()).await;
        if errored == 0 {
            RunOutcome::success(None, written)
        } else {
            RunOutcome::success_with_errors(None, written, errored, format!("{errored} backfill rows failed to upsert"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn weekday_morning_window_is_trading_time() {
        let wd = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap().weekday(); // Monday
        assert!(is_trading_time(wd, NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
        assert!(is_trading_time(wd, NaiveTime::from_hms_opt(15, 15, 0).unwrap()));
        assert!(!is_trading_time(wd, NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        assert!(!is_trading_time(wd, NaiveTime::from_hms_opt(16, 0, 0).unwrap()));
    }

    #[test]
    fn weekend_is_never_trading_time() {
        let sat = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap().weekday();
        assert!(!is_trading_time(sat, NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
    }

    #[test]
    fn rotation_cycles_through_providers_in_order() {
        let rotation = Rotation { providers: vec![DataSourceKey::Tushare, DataSourceKey::AkShare], index: AtomicUsize::new(0) };
        assert_eq!(rotation.next(), DataSourceKey::Tushare);
        assert_eq!(rotation.next(), DataSourceKey::AkShare);
        assert_eq!(rotation.next(), DataSourceKey::Tushare);
    }
}

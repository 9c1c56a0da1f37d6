use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marketfeed_core::adapter::{
    Availability, CredentialOrigin, DailyBasicRequest, DailyBasicRow, DataSourceAdapter,
    KlineRequest, NewsItem, NewsRequest,
};
use marketfeed_core::manager::DataSourceManager;
use marketfeed_types::model::{HistoricalBar, MarketCategory, MarketQuote, StockBasics};
use marketfeed_types::routing::SourcePriorities;
use marketfeed_types::{Capability, DataSourceKey, PlatformError};

struct FixedAdapter {
    key: DataSourceKey,
    stock_list: Result<Vec<StockBasics>, PlatformError>,
}

#[async_trait]
impl DataSourceAdapter for FixedAdapter {
    fn key(&self) -> DataSourceKey {
        self.key
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::StockList]
    }

    async fn availability(&self) -> Availability {
        Availability {
            available: true,
            credential_origin: CredentialOrigin::Environment,
        }
    }

    async fn stock_list(&self) -> Result<Vec<StockBasics>, PlatformError> {
        self.stock_list.clone()
    }

    async fn daily_basic(&self, _req: DailyBasicRequest) -> Result<Vec<DailyBasicRow>, PlatformError> {
        Err(PlatformError::unsupported("daily_basic"))
    }

    async fn find_latest_trade_date(&self) -> Result<String, PlatformError> {
        Err(PlatformError::unsupported("find_latest_trade_date"))
    }

    async fn realtime_quotes(&self, _codes: &[String]) -> Result<Vec<MarketQuote>, PlatformError> {
        Err(PlatformError::unsupported("realtime_quotes"))
    }

    async fn kline(&self, _req: KlineRequest) -> Result<Vec<HistoricalBar>, PlatformError> {
        Err(PlatformError::unsupported("kline"))
    }

    async fn news(&self, _req: NewsRequest) -> Result<Vec<NewsItem>, PlatformError> {
        Err(PlatformError::unsupported("news"))
    }
}

fn basics(code: &str, source: DataSourceKey) -> StockBasics {
    StockBasics {
        id: None,
        code: code.to_string(),
        source: source.as_str().to_string(),
        full_symbol: format!("{code}.SZ"),
        name: "Test Co".to_string(),
        industry: None,
        market: None,
        list_date: None,
        total_mv: None,
        circ_mv: None,
        pe: None,
        pe_ttm: None,
        pb: None,
        ps: None,
        turnover_rate: None,
        roe: None,
        total_share: None,
        trade_date: None,
        updated_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn falls_back_past_an_empty_higher_priority_source() {
    let tushare = Arc::new(FixedAdapter {
        key: DataSourceKey::Tushare,
        stock_list: Ok(vec![]),
    });
    let akshare = Arc::new(FixedAdapter {
        key: DataSourceKey::AkShare,
        stock_list: Ok(vec![basics("000001", DataSourceKey::AkShare)]),
    });
    let manager = DataSourceManager::new(
        vec![tushare, akshare],
        SourcePriorities::default(),
        Duration::from_secs(1),
    );

    let result = manager
        .with_fallback(MarketCategory::Cn, &[], "stock_list", |a| async move {
            a.stock_list().await
        })
        .await
        .expect("a lower-priority source should satisfy the call");

    assert_eq!(result.source, DataSourceKey::AkShare);
    assert_eq!(result.value.len(), 1);
}

#[tokio::test]
async fn all_sources_failing_is_reported_as_an_aggregate() {
    let tushare = Arc::new(FixedAdapter {
        key: DataSourceKey::Tushare,
        stock_list: Err(PlatformError::transient("tushare", "connection reset")),
    });
    let manager = DataSourceManager::new(
        vec![tushare],
        SourcePriorities::default(),
        Duration::from_secs(1),
    );

    let err = manager
        .with_fallback(MarketCategory::Cn, &[], "stock_list", |a| async move {
            a.stock_list().await
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::AllSourcesFailed(_)));
}

#[tokio::test]
async fn preferred_sources_are_tried_first() {
    let tushare = Arc::new(FixedAdapter {
        key: DataSourceKey::Tushare,
        stock_list: Ok(vec![basics("000001", DataSourceKey::Tushare)]),
    });
    let baostock = Arc::new(FixedAdapter {
        key: DataSourceKey::BaoStock,
        stock_list: Ok(vec![basics("000001", DataSourceKey::BaoStock)]),
    });
    let manager = DataSourceManager::new(
        vec![tushare, baostock],
        SourcePriorities::default(),
        Duration::from_secs(1),
    );

    let result = manager
        .with_fallback(
            MarketCategory::Cn,
            &[DataSourceKey::BaoStock],
            "stock_list",
            |a| async move { a.stock_list().await },
        )
        .await
        .unwrap();

    assert_eq!(result.source, DataSourceKey::BaoStock);
}

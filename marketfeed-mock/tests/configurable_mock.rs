use marketfeed_core::adapter::{DailyBasicRequest, DataSourceAdapter};
use marketfeed_mock::{ConfigurableAdapter, MockBehavior};
use marketfeed_types::DataSourceKey;

#[tokio::test]
async fn unset_rule_resolves_to_empty() {
    let adapter = ConfigurableAdapter::new(DataSourceKey::Tushare);
    let result = adapter
        .daily_basic(DailyBasicRequest {
            trade_date: "20260731".to_string(),
        })
        .await;
    assert!(matches!(result, Err(marketfeed_types::PlatformError::Empty { .. })));
}

#[tokio::test]
async fn registered_failure_propagates() {
    let adapter = ConfigurableAdapter::new(DataSourceKey::Tushare);
    adapter.set_latest_trade_date(MockBehavior::Fail(marketfeed_types::PlatformError::transient(
        "tushare",
        "rate limited",
    )));
    let err = adapter.find_latest_trade_date().await.unwrap_err();
    assert!(matches!(err, marketfeed_types::PlatformError::Transient { .. }));
}

#[tokio::test]
async fn registered_success_round_trips() {
    let adapter = ConfigurableAdapter::new(DataSourceKey::AkShare);
    adapter.set_latest_trade_date(MockBehavior::Return("20260731".to_string()));
    let date = adapter.find_latest_trade_date().await.unwrap();
    assert_eq!(date, "20260731");
}

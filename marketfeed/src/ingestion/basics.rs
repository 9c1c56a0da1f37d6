//! Basics sync and multi-source basics sync (spec.md §4.4): fetch the CN
//! stock list plus same-day valuation enrichment, write `StockBasics`, and
//! hand the caller a [`RunOutcome`] to record. Grounded on
//! `original_source/app/services/basics_sync_service.py`'s
//! fetch-list/enrich-with-daily-basic/convert-units/filter-nan/upsert shape.

use std::collections::HashMap;

use chrono::Utc;

use marketfeed_core::adapter::DailyBasicRequest;
use marketfeed_core::manager::DataSourceManager;
use marketfeed_types::model::{MarketCategory, StockBasics};
use marketfeed_types::{BackoffConfig, DataSourceKey, PlatformError};

use super::RunOutcome;
use crate::store::{DocumentStore, UpsertOp};

/// Fetch the stock list and same-day valuation snapshot from the
/// highest-priority available CN source, write `StockBasics`.
pub async fn basics_sync(store: &DocumentStore, manager: &DataSourceManager, trade_date: &str) -> RunOutcome {
    to_outcome(run(store, manager, trade_date, &[]).await)
}

/// Like [`basics_sync`], but lets the caller override which sources are
/// tried and in what order (spec.md §4.4: "multi-source basics sync").
/// Written documents always carry the literal provider name that actually
/// produced them, never a `"multi_source"` sentinel (spec.md §3).
pub async fn multi_source_basics_sync(
    store: &DocumentStore,
    manager: &DataSourceManager,
    trade_date: &str,
    preferred_sources: &[DataSourceKey],
) -> RunOutcome {
    to_outcome(run(store, manager, trade_date, preferred_sources).await)
}

fn to_outcome(result: Result<(String, u64, u64), PlatformError>) -> RunOutcome {
    match result {
        Ok((source, written, 0)) => RunOutcome::success(Some(source), written),
        Ok((source, written, errored)) => {
            RunOutcome::success_with_errors(Some(source), written, errored, format!("{errored} rows failed to upsert"))
        }
        Err(e) => RunOutcome::failed(e.to_string()),
    }
}

async fn run(
    store: &DocumentStore,
    manager: &DataSourceManager,
    trade_date: &str,
    preferred_sources: &[DataSourceKey],
) -> Result<(String, u64, u64), PlatformError> {
    let list_result = manager
        .with_fallback(MarketCategory::Cn, preferred_sources, "stock_list", |a| async move { a.stock_list().await })
        .await?;
    let source = list_result.source;
    let mut rows = list_result.value;

    let req_date = trade_date.to_string();
    let basic_result = manager
        .with_fallback(MarketCategory::Cn, &[source], "daily_basic", move |a| {
            let trade_date = req_date.clone();
            async move { a.daily_basic(DailyBasicRequest { trade_date }).await }
        })
        .await;

    if let Ok(basic) = basic_result {
        let by_code: HashMap<String, _> = basic.value.into_iter().map(|r| (r.code.clone(), r)).collect();
        for row in &mut rows {
            if let Some(enrich) = by_code.get(&row.code) {
                row.turnover_rate = enrich.turnover_rate;
                row.pe = enrich.pe;
                row.pe_ttm = row.pe_ttm.or(enrich.pe);
                row.pb = enrich.pb;
                row.ps = enrich.ps;
                row.total_mv = convert_mv(source, enrich.total_mv);
                row.circ_mv = convert_mv(source, enrich.circ_mv);
                // row.roe is left as stock_list() reported it: DailyBasicRow
                // has no ROE field, so there is no fina_indicator-style pull
                // to enrich it with (see ingestion/financial.rs; recorded in
                // DESIGN.md).
            }
            row.trade_date = Some(trade_date.to_string());
        }
    }

    for row in &mut rows {
        row.source = source.as_str().to_string();
        row.updated_at = Utc::now();
    }

    let total = rows.len();
    let ops: Vec<UpsertOp> = rows
        .iter()
        .filter(|r| !has_nan(r))
        .map(|r| {
            let body = bson::to_document(r).expect("StockBasics always serializes");
            UpsertOp { filter: bson::doc! {"code": &r.code, "source": &r.source}, body }
        })
        .collect();
    let skipped = (total - ops.len()) as u64;

    let (written, errored) = store.bulk_upsert(&store.raw_stock_basic_info(), ops, BackoffConfig::standard()).await;
    Ok((source.as_str().to_string(), written, errored + skipped))
}

/// Tushare reports market-cap fields in 万元 (10k yuan); this domain's
/// `total_mv`/`circ_mv` are always 亿元 (spec.md §3). Other CN sources are
/// assumed to already report 亿元 until a second source supplies this
/// field in the pack.
fn convert_mv(source: DataSourceKey, raw: Option<f64>) -> Option<f64> {
    raw.map(|v| if source == DataSourceKey::Tushare { v / 10_000.0 } else { v })
}

fn has_nan(r: &StockBasics) -> bool {
    [r.total_mv, r.circ_mv, r.pe, r.pe_ttm, r.pb, r.ps, r.turnover_rate, r.roe, r.total_share]
        .into_iter()
        .flatten()
        .any(f64::is_nan)
}

//! External interface shapes (spec.md §6): request/response structs and the
//! orchestrator entry points a transport layer (HTTP/WebSocket) would call.
//! Transport framing, auth, and session tokens are explicit external
//! collaborators (spec.md §1) — this module defines shapes only, the way the
//! teacher itself is a transport-free library with no `axum` binding of its
//! own (`borsa::core::Borsa`'s public methods are the same kind of bare
//! entry point).

use std::collections::BTreeMap;
use std::sync::Arc;

use marketfeed_core::manager::DataSourceManager;
use marketfeed_types::model::{AnalysisTaskStatus, MarketCategory, SyncStatus};
use marketfeed_types::{DataSourceKey, PlatformError};

use crate::orchestrator::TaskOrchestrator;
use crate::store::DocumentStore;

/// Live feed of task lifecycle updates (spec.md §6
/// `subscribe_task_progress`).
#[must_use]
pub fn subscribe_task_progress(
    orchestrator: &TaskOrchestrator,
) -> tokio::sync::broadcast::Receiver<marketfeed_types::model::AnalysisTask> {
    orchestrator.subscribe_task_progress()
}

/// `submit_single` request payload.
#[derive(Debug, Clone)]
pub struct SingleAnalysisRequest {
    pub user_id: String,
    pub symbol: String,
    pub params: serde_json::Value,
}

/// `submit_batch` request payload: one user, many symbols sharing `params`.
#[derive(Debug, Clone)]
pub struct BatchAnalysisRequest {
    pub user_id: String,
    pub symbols: Vec<String>,
    pub params: serde_json::Value,
}

/// Maximum symbols accepted by one `/analysis/batch` call (spec.md §6).
pub const MAX_BATCH_SIZE: usize = 10;

/// `submit_batch` response: the shared batch id, every task id that was
/// created, and the per-symbol outcome (spec.md §6 `POST /analysis/batch`
/// → `{batch_id, task_ids[], mapping[]}`).
#[derive(Debug, Clone)]
pub struct BatchAnalysisResponse {
    pub batch_id: String,
    pub task_ids: Vec<String>,
    pub mapping: Vec<BatchMappingEntry>,
}

/// One symbol's outcome within a batch submission.
#[derive(Debug, Clone)]
pub struct BatchMappingEntry {
    pub symbol: String,
    pub task_id: Option<String>,
    pub error: Option<String>,
}

/// `task_status` response.
#[derive(Debug, Clone)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: AnalysisTaskStatus,
    pub progress: u8,
    pub progress_message: Option<String>,
    pub error_message: Option<String>,
}

/// `task_result` response.
#[derive(Debug, Clone)]
pub struct TaskResultResponse {
    pub task_id: String,
    pub symbol: String,
    pub analysis_date: String,
    pub sections: BTreeMap<String, String>,
    pub summary: Option<String>,
    pub recommendation: Option<String>,
}

/// `test_sources` per-provider probe result.
#[derive(Debug, Clone)]
pub struct SourceProbe {
    pub source: DataSourceKey,
    pub available: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// Create one analysis task; returns the new task id immediately (spec.md
/// §4.7: never runs the analysis inline).
pub async fn submit_single(
    orchestrator: &TaskOrchestrator,
    request: SingleAnalysisRequest,
) -> Result<String, PlatformError> {
    orchestrator.create_analysis_task(&request.user_id, &request.symbol, request.params).await
}

/// Create N independent tasks under one batch id, one per symbol; a
/// per-symbol failure does not abort the others (spec.md §4.7 "return
/// exceptions"). Rejects up front when `symbols` exceeds
/// [`MAX_BATCH_SIZE`] (spec.md §6 "max batch size 10").
pub async fn submit_batch(
    orchestrator: &TaskOrchestrator,
    request: BatchAnalysisRequest,
) -> Result<BatchAnalysisResponse, PlatformError> {
    if request.symbols.len() > MAX_BATCH_SIZE {
        return Err(PlatformError::InvalidArg(format!(
            "batch of {} symbols exceeds the max of {MAX_BATCH_SIZE}",
            request.symbols.len()
        )));
    }

    let batch_id = uuid::Uuid::new_v4().to_string();
    let symbols = request.symbols.clone();
    let requests = request.symbols.into_iter().map(|symbol| (symbol, request.params.clone())).collect();
    let results = orchestrator.create_batch(&request.user_id, &batch_id, requests).await;

    let mut task_ids = Vec::with_capacity(results.len());
    let mapping = symbols
        .into_iter()
        .zip(results)
        .map(|(symbol, result)| match result {
            Ok(task_id) => {
                task_ids.push(task_id.clone());
                BatchMappingEntry { symbol, task_id: Some(task_id), error: None }
            }
            Err(e) => BatchMappingEntry { symbol, task_id: None, error: Some(e.to_string()) },
        })
        .collect();

    Ok(BatchAnalysisResponse { batch_id, task_ids, mapping })
}

/// Poll one task's lifecycle state.
pub async fn task_status(
    orchestrator: &TaskOrchestrator,
    task_id: &str,
) -> Result<Option<TaskStatusResponse>, PlatformError> {
    let task = orchestrator.get_task_status(task_id).await?;
    Ok(task.map(|t| TaskStatusResponse {
        task_id: t.task_id,
        status: t.status,
        progress: t.progress,
        progress_message: t.progress_message,
        error_message: t.error_message,
    }))
}

/// Fetch one task's assembled report.
pub async fn task_result(
    orchestrator: &TaskOrchestrator,
    task_id: &str,
) -> Result<Option<TaskResultResponse>, PlatformError> {
    let report = orchestrator.get_task_result(task_id).await?;
    Ok(report.map(|r| TaskResultResponse {
        task_id: r.task_id,
        symbol: r.symbol,
        analysis_date: r.analysis_date,
        sections: r.sections,
        summary: r.summary,
        recommendation: r.recommendation,
    }))
}

/// Cooperatively cancel a task.
pub async fn cancel_task(orchestrator: &TaskOrchestrator, task_id: &str, user_id: &str) -> Result<(), PlatformError> {
    orchestrator.cancel_task(task_id, user_id).await
}

/// Permanently delete a task's durable record and any assembled report.
/// Distinct from [`cancel_task`]: this removes history, it does not stop a
/// run.
pub async fn delete_task(store: &DocumentStore, task_id: &str) -> Result<(), PlatformError> {
    store
        .raw_analysis_tasks()
        .delete_one(bson::doc! {"task_id": task_id})
        .await
        .map_err(|e| PlatformError::Store(e.to_string()))?;
    store
        .raw_analysis_reports()
        .delete_one(bson::doc! {"task_id": task_id})
        .await
        .map_err(|e| PlatformError::Store(e.to_string()))?;
    Ok(())
}

/// Trigger an out-of-band basics sync across preferred sources (spec.md
/// §4.4, wired through the same ingestion entry point the scheduler uses).
pub async fn run_multi_source_basics_sync(
    store: &DocumentStore,
    manager: &DataSourceManager,
    trade_date: &str,
    preferred_sources: &[DataSourceKey],
) -> crate::ingestion::RunOutcome {
    crate::ingestion::basics::multi_source_basics_sync(store, manager, trade_date, preferred_sources).await
}

/// Read the last recorded outcome of one ingestion job.
pub async fn sync_status(
    store: &DocumentStore,
    job: &str,
    data_type: Option<&str>,
) -> Result<Option<SyncStatus>, PlatformError> {
    let filter = match data_type {
        Some(dt) => bson::doc! {"data_type": dt, "job": job},
        None => bson::doc! {"job": job},
    };
    store.find_one(&store.raw_sync_status(), filter).await
}

/// Probe every adapter registered for `market`, delegating the actual
/// timed call to [`crate::sources::test_sources`] (spec.md §6
/// `POST /sync/multi-source/test-sources`).
pub async fn test_sources(manager: &DataSourceManager, market: MarketCategory) -> Vec<SourceProbe> {
    let candidates: &[DataSourceKey] = match market {
        MarketCategory::Cn => &[DataSourceKey::Tushare, DataSourceKey::AkShare, DataSourceKey::BaoStock],
        MarketCategory::Hk | MarketCategory::Us => &[DataSourceKey::YahooFinance, DataSourceKey::Finnhub],
    };
    let adapters: Vec<Arc<dyn marketfeed_core::adapter::DataSourceAdapter>> =
        candidates.iter().filter_map(|k| manager.adapter(*k)).collect();

    crate::sources::test_sources(&adapters)
        .await
        .into_iter()
        .map(|(source, availability, elapsed)| SourceProbe {
            source,
            available: availability.available,
            latency_ms: elapsed.as_millis() as u64,
            error: None,
        })
        .collect()
}

//! Task Orchestrator (spec.md §4.7): dispatches analysis tasks to an
//! opaque, caller-supplied engine, keeps an in-memory progress table mirrored
//! to MongoDB, and assembles a result by falling back from the durable report
//! to disk-scanned `*.md` fragments. Grounded on
//! `app/routers/analysis.py::get_task_result`'s memory → `analysis_reports`
//! → `analysis_tasks.result` → filesystem fallback chain in
//! `original_source/`; the LLM analysis engine itself is out of scope
//! (spec.md §1) and is injected as an [`AnalysisExecutor`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{broadcast, RwLock};

use marketfeed_core::task_handle::TaskHandle;
use marketfeed_types::PlatformError;
use marketfeed_types::model::{AnalysisReport, AnalysisTask, AnalysisTaskStatus};

use crate::queue::{QueuedTask, TaskQueue};
use crate::store::DocumentStore;

/// The report-section keys `get_task_result` recognizes (spec.md §4.7),
/// in the order the original extracts them from a run's `state`.
const REPORT_FIELDS: &[&str] = &[
    "market_report",
    "sentiment_report",
    "news_report",
    "fundamentals_report",
    "investment_plan",
    "trader_investment_plan",
    "final_trade_decision",
];

/// The opaque analysis engine (spec.md §1: "the engine invokes it as an
/// opaque function"). Implementations own whatever LLM/agent pipeline
/// produces the named report sections; the orchestrator never looks inside.
#[async_trait]
pub trait AnalysisExecutor: Send + Sync {
    /// Run one analysis and return its named report sections, keyed the
    /// same way [`REPORT_FIELDS`] and the debate-history fields are named.
    async fn execute(
        &self,
        task_id: &str,
        symbol: &str,
        params: &serde_json::Value,
    ) -> Result<BTreeMap<String, String>, String>;
}

/// Dispatches analysis tasks and tracks their lifecycle (spec.md §4.7).
pub struct TaskOrchestrator {
    store: DocumentStore,
    queue: Arc<TaskQueue>,
    executor: Arc<dyn AnalysisExecutor>,
    memory: RwLock<HashMap<String, AnalysisTask>>,
    results_dir: String,
    progress_tx: broadcast::Sender<AnalysisTask>,
}

impl TaskOrchestrator {
    #[must_use]
    pub fn new(
        store: DocumentStore,
        queue: Arc<TaskQueue>,
        executor: Arc<dyn AnalysisExecutor>,
        results_dir: String,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(256);
        Self { store, queue, executor, memory: RwLock::new(HashMap::new()), results_dir, progress_tx }
    }

    /// Live feed of task lifecycle updates (spec.md §6
    /// `subscribe_task_progress`); each [`Self::update_task`] publishes
    /// here alongside the memory/MongoDB mirror.
    #[must_use]
    pub fn subscribe_task_progress(&self) -> broadcast::Receiver<AnalysisTask> {
        self.progress_tx.subscribe()
    }

    /// Create one task and return its id immediately; the actual run
    /// happens on a worker pulled by [`Self::spawn_workers`], never inline
    /// (spec.md §4.7 "not inline").
    pub async fn create_analysis_task(
        &self,
        user_id: &str,
        symbol: &str,
        params: serde_json::Value,
    ) -> Result<String, PlatformError> {
        self.create_task_internal(user_id, symbol, params, None).await
    }

    async fn create_task_internal(
        &self,
        user_id: &str,
        symbol: &str,
        params: serde_json::Value,
        batch_id: Option<String>,
    ) -> Result<String, PlatformError> {
        let task_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let task = AnalysisTask {
            task_id: task_id.clone(),
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            status: AnalysisTaskStatus::Queued,
            params: params.clone(),
            batch_id: batch_id.clone(),
            worker_id: None,
            progress: 0,
            progress_message: None,
            error_message: None,
            created_at: now,
            enqueued_at: Some(now),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        };
        self.persist_task(&task).await?;
        self.memory.write().await.insert(task_id.clone(), task);

        self.queue
            .enqueue(&QueuedTask {
                id: task_id.clone(),
                user_id: user_id.to_string(),
                symbol: symbol.to_string(),
                params,
                batch_id,
            })
            .await?;
        Ok(task_id)
    }

    /// Submit N independent tasks under one `batch_id` with full
    /// parallelism; a failure on one does not abort the others (spec.md
    /// §4.7 "return exceptions"). The batch-size-10 cap (spec.md §6) is
    /// the caller's responsibility (`interfaces::submit_batch`), since it
    /// must reject before any task is created.
    pub async fn create_batch(
        &self,
        user_id: &str,
        batch_id: &str,
        requests: Vec<(String, serde_json::Value)>,
    ) -> Vec<Result<String, PlatformError>> {
        let _ = self.queue.record_batch(batch_id, user_id, requests.len()).await;
        join_all(requests.into_iter().map(|(symbol, params)| {
            let batch_id = batch_id.to_string();
            async move { self.create_task_internal(user_id, &symbol, params, Some(batch_id)).await }
        }))
        .await
    }

    /// Spawn `worker_count` loops, each polling [`TaskQueue::dequeue`] and
    /// running claimed tasks to completion (spec.md §4.7 "worker pool").
    pub fn spawn_workers(self: &Arc<Self>, worker_count: usize, poll_interval: Duration) -> Vec<TaskHandle> {
        (0..worker_count)
            .map(|i| {
                let this = Arc::clone(self);
                let worker_id = format!("worker-{i}");
                let handle = tokio::spawn(async move { this.worker_loop(worker_id, poll_interval).await });
                TaskHandle::new_abort_only(handle)
            })
            .collect()
    }

    async fn worker_loop(self: Arc<Self>, worker_id: String, poll_interval: Duration) {
        loop {
            match self.queue.dequeue(&worker_id).await {
                Ok(Some(task_id)) => self.execute_analysis_background(&task_id, &worker_id).await,
                Ok(None) => tokio::time::sleep(poll_interval).await,
                Err(_) => tokio::time::sleep(poll_interval).await,
            }
        }
    }

    /// Run one claimed task: load it, invoke the executor, persist the
    /// outcome, release its queue slot.
    async fn execute_analysis_background(&self, task_id: &str, worker_id: &str) {
        let Some(mut task) = self.load_task(task_id).await else { return };
        task.status = AnalysisTaskStatus::Processing;
        task.worker_id = Some(worker_id.to_string());
        task.started_at = Some(Utc::now());
        self.update_task(task.clone()).await;

        match self.executor.execute(task_id, &task.symbol, &task.params).await {
            Ok(sections) => {
                let report = self.assemble_report_from_sections(task_id, &task.symbol, sections);
                if let Err(e) = self.persist_report(&report).await {
                    task.status = AnalysisTaskStatus::Failed;
                    task.error_message = Some(e.to_string());
                } else {
                    task.status = AnalysisTaskStatus::Completed;
                }
            }
            Err(message) => {
                task.status = AnalysisTaskStatus::Failed;
                task.error_message = Some(message);
            }
        }
        task.completed_at = Some(Utc::now());
        self.update_task(task.clone()).await;
        let succeeded = task.status == AnalysisTaskStatus::Completed;
        let _ = self.queue.complete(task_id, &task.user_id, succeeded).await;
    }

    /// Cooperative cancellation; threads through to the queue's own
    /// queued/processing branches (spec.md §4.7 "Cancellation").
    pub async fn cancel_task(&self, task_id: &str, user_id: &str) -> Result<(), PlatformError> {
        self.queue.cancel(task_id, user_id).await?;
        if let Some(mut task) = self.load_task(task_id).await {
            task.status = AnalysisTaskStatus::Cancelled;
            task.cancelled_at = Some(Utc::now());
            self.update_task(task).await;
        }
        Ok(())
    }

    /// State-getter: memory first, then `analysis_tasks`, then
    /// `analysis_reports` synthesized into a completed-from-history
    /// response (spec.md §4.7).
    pub async fn get_task_status(&self, task_id: &str) -> Result<Option<AnalysisTask>, PlatformError> {
        if let Some(task) = self.memory.read().await.get(task_id).cloned() {
            return Ok(Some(task));
        }
        if let Some(task) = self
            .store
            .find_one::<AnalysisTask>(&self.store.raw_analysis_tasks(), bson::doc! {"task_id": task_id})
            .await?
        {
            return Ok(Some(task));
        }
        if let Some(report) = self
            .store
            .find_one::<AnalysisReport>(&self.store.raw_analysis_reports(), bson::doc! {"task_id": task_id})
            .await?
        {
            return Ok(Some(self.synthesize_task_from_report(&report)));
        }
        Ok(None)
    }

    /// Result assembly (spec.md §4.7 "Result assembly"): prefer the
    /// persisted report; otherwise synthesize one from disk.
    pub async fn get_task_result(&self, task_id: &str) -> Result<Option<AnalysisReport>, PlatformError> {
        let existing = self
            .store
            .find_one::<AnalysisReport>(&self.store.raw_analysis_reports(), bson::doc! {"task_id": task_id})
            .await?;
        if existing.is_some() {
            return Ok(existing);
        }

        let Some(task) = self.get_task_status(task_id).await? else { return Ok(None) };
        let analysis_date = task.completed_at.unwrap_or(task.created_at).format("%Y-%m-%d").to_string();
        let sections = self.scan_report_files(&task.symbol, &analysis_date).await;
        if sections.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.assemble_report_from_sections(task_id, &task.symbol, sections)))
    }

    /// Scan `{results_dir}/{symbol}/{date}/reports/*.md`, using each file's
    /// stem as its section key (spec.md §4.7 step (a)).
    async fn scan_report_files(&self, symbol: &str, analysis_date: &str) -> BTreeMap<String, String> {
        let dir = Path::new(&self.results_dir).join(symbol).join(analysis_date).join("reports");
        let mut sections = BTreeMap::new();
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else { return sections };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    sections.insert(stem.to_string(), trimmed.to_string());
                }
            }
        }
        sections
    }

    /// Build an [`AnalysisReport`], deriving `summary`/`recommendation`
    /// from the longest available fragment when neither was supplied
    /// directly (spec.md §4.7 step (c)).
    fn assemble_report_from_sections(
        &self,
        task_id: &str,
        symbol: &str,
        sections: BTreeMap<String, String>,
    ) -> AnalysisReport {
        let summary = sections.get("summary").cloned().or_else(|| longest_fragment(&sections, REPORT_FIELDS));
        let recommendation = sections
            .get("recommendation")
            .cloned()
            .or_else(|| sections.get("final_trade_decision").cloned())
            .or_else(|| longest_fragment(&sections, REPORT_FIELDS));

        AnalysisReport {
            id: None,
            task_id: task_id.to_string(),
            symbol: symbol.to_string(),
            analysis_date: Utc::now().format("%Y-%m-%d").to_string(),
            sections,
            summary,
            recommendation,
            created_at: Utc::now(),
        }
    }

    fn synthesize_task_from_report(&self, report: &AnalysisReport) -> AnalysisTask {
        AnalysisTask {
            task_id: report.task_id.clone(),
            user_id: String::new(),
            symbol: report.symbol.clone(),
            status: AnalysisTaskStatus::Completed,
            params: serde_json::Value::Null,
            batch_id: None,
            worker_id: None,
            progress: 100,
            progress_message: None,
            error_message: None,
            created_at: report.created_at,
            enqueued_at: None,
            started_at: None,
            completed_at: Some(report.created_at),
            cancelled_at: None,
        }
    }

    async fn load_task(&self, task_id: &str) -> Option<AnalysisTask> {
        if let Some(task) = self.memory.read().await.get(task_id).cloned() {
            return Some(task);
        }
        self.store.find_one::<AnalysisTask>(&self.store.raw_analysis_tasks(), bson::doc! {"task_id": task_id}).await.ok().flatten()
    }

    async fn update_task(&self, task: AnalysisTask) {
        let id = task.task_id.clone();
        self.memory.write().await.insert(id, task.clone());
        let _ = self.persist_task(&task).await;
        let _ = self.progress_tx.send(task);
    }

    async fn persist_task(&self, task: &AnalysisTask) -> Result<(), PlatformError> {
        let body = bson::to_document(task).map_err(|e| PlatformError::Store(e.to_string()))?;
        self.store.upsert_one(&self.store.raw_analysis_tasks(), bson::doc! {"task_id": &task.task_id}, body).await
    }

    async fn persist_report(&self, report: &AnalysisReport) -> Result<(), PlatformError> {
        let body = bson::to_document(report).map_err(|e| PlatformError::Store(e.to_string()))?;
        self.store.upsert_one(&self.store.raw_analysis_reports(), bson::doc! {"task_id": &report.task_id}, body).await
    }
}

/// Longest value among `fields` present in `sections`, used when neither
/// `summary` nor `recommendation` was produced directly.
fn longest_fragment(sections: &BTreeMap<String, String>, fields: &[&str]) -> Option<String> {
    fields.iter().filter_map(|f| sections.get(*f)).max_by_key(|s| s.len()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_fragment_picks_the_biggest_section() {
        let mut sections = BTreeMap::new();
        sections.insert("market_report".to_string(), "short".to_string());
        sections.insert("final_trade_decision".to_string(), "a much longer fragment of text".to_string());
        let picked = longest_fragment(&sections, REPORT_FIELDS).unwrap();
        assert_eq!(picked, "a much longer fragment of text");
    }

    #[test]
    fn longest_fragment_is_none_when_nothing_matches() {
        let sections = BTreeMap::new();
        assert!(longest_fragment(&sections, REPORT_FIELDS).is_none());
    }
}

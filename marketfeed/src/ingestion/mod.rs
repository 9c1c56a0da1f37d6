//! Ingestion Services (spec.md §4.4): one module per domain, sharing the
//! run-lock + `SyncStatus` recording algorithm described in §4.4's opening
//! paragraph, grounded on
//! `original_source/app/services/basics_sync_service.py`'s
//! acquire-lock/record-running/fetch/write/record-terminal/release-lock
//! shape (the teacher has no batch-ingestion analogue; router/fetch code
//! is per-request, not scheduled).

pub mod basics;
pub mod financial;
pub mod historical;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use marketfeed_types::model::{SyncJobStatus, SyncStatus};

use crate::store::DocumentStore;

/// Per-job advisory run lock (spec.md §5: "`_running` boolean under an
/// async mutex"). The `SyncStatus` document is the cross-process-
/// authoritative signal; this guard only prevents two tasks in the same
/// process from racing the same job.
#[derive(Default)]
pub struct RunGuards {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RunGuards {
    /// Lock for `job`, creating it on first use.
    pub async fn lock_for(&self, job: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(job.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Outcome of one ingestion run, used to build the terminal `SyncStatus`.
pub struct RunOutcome {
    pub status: SyncJobStatus,
    pub source: Option<String>,
    pub records_count: u64,
    pub error_count: u64,
    pub error_message: Option<String>,
}

impl RunOutcome {
    /// All records written, zero errors.
    #[must_use]
    pub fn success(source: Option<String>, records_count: u64) -> Self {
        Self { status: SyncJobStatus::Success, source, records_count, error_count: 0, error_message: None }
    }

    /// Some chunks/sources failed but the run completed (spec.md §7:
    /// ingestion never reports `failed` just because part of a batch
    /// errored).
    #[must_use]
    pub fn success_with_errors(source: Option<String>, records_count: u64, error_count: u64, message: String) -> Self {
        Self {
            status: SyncJobStatus::SuccessWithErrors,
            source,
            records_count,
            error_count,
            error_message: Some(message),
        }
    }

    /// The run raised a fatal error before producing any usable output.
    #[must_use]
    pub fn failed(message: String) -> Self {
        Self { status: SyncJobStatus::Failed, source: None, records_count: 0, error_count: 1, error_message: Some(message) }
    }
}

/// Record a `running` marker, then the terminal outcome, for `job`
/// (optionally partitioned by `data_type`, spec.md §9's decided
/// partitioning). Recording `running` happens unconditionally before the
/// caller's work; recording the terminal status happens in every exit path
/// the caller takes, including early `failed` returns — callers should
/// wrap their fetch/write logic so this is reachable from a single
/// `finally`-style tail, matching spec.md §4.4's "release the run lock on
/// every exit path including panics" requirement as closely as Rust's
/// non-unwinding-by-default model allows (panics here would poison the
/// `RunGuards` mutex, which is an accepted degradation: the job simply
/// stays locked out until the process restarts).
pub async fn record_running(store: &DocumentStore, job: &str, data_type: Option<&str>) {
    let doc = SyncStatus {
        id: None,
        job: job.to_string(),
        data_type: data_type.map(str::to_string),
        status: SyncJobStatus::Running,
        source: None,
        records_count: 0,
        error_count: 0,
        error_message: None,
        started_at: Utc::now(),
        finished_at: None,
    };
    let _ = write_sync_status(store, &doc).await;
}

/// Record the terminal outcome for `job`.
pub async fn record_terminal(store: &DocumentStore, job: &str, data_type: Option<&str>, outcome: RunOutcome) {
    let doc = SyncStatus {
        id: None,
        job: job.to_string(),
        data_type: data_type.map(str::to_string),
        status: outcome.status,
        source: outcome.source,
        records_count: outcome.records_count,
        error_count: outcome.error_count,
        error_message: outcome.error_message,
        started_at: Utc::now(),
        finished_at: Some(Utc::now()),
    };
    let _ = write_sync_status(store, &doc).await;
}

async fn write_sync_status(store: &DocumentStore, doc: &SyncStatus) -> Result<(), marketfeed_types::PlatformError> {
    let filter = match &doc.data_type {
        Some(dt) => bson::doc! {"data_type": dt, "job": &doc.job},
        None => bson::doc! {"job": &doc.job},
    };
    let body = bson::to_document(doc).map_err(|e| marketfeed_types::PlatformError::Store(e.to_string()))?;
    store.upsert_one(&store.raw_sync_status(), filter, body).await
}

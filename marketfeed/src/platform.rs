//! Composition root (spec.md §2/§6): wires [`Settings`] into a running
//! platform instance. Generalized from the teacher's `Borsa::connect`
//! constructor, which built one `BorsaConnector` from a `BorsaConfig`; here
//! the same shape builds the wider set of subsystems spec.md §4 names.
//!
//! CN adapters (Tushare/AKShare/BaoStock) have no vendored Rust client in
//! this pack (see `sources` module doc), so the caller supplies them; the
//! analysis executor (spec.md §1 Non-goal) is likewise caller-supplied.

use std::sync::Arc;
use std::time::Duration;

use marketfeed_core::adapter::DataSourceAdapter;
use marketfeed_core::manager::DataSourceManager;
use marketfeed_core::task_handle::TaskHandle;
use marketfeed_middleware::{CacheLayer, DailyQuotaGate, RateLimitGate, TushareAdmission};
use marketfeed_types::{DataSourceKey, PlatformError};
use marketfeed_yfinance::YfAdapter;

use crate::notifications::NotificationService;
use crate::orchestrator::{AnalysisExecutor, TaskOrchestrator};
use crate::queue::{QueueLimits, TaskQueue};
use crate::quote_rotation::QuoteRotationPipeline;
use crate::settings::Settings;
use crate::store::DocumentStore;

/// A fully wired platform instance: every subsystem spec.md §4 names,
/// sharing one Mongo connection pool and one Redis connection manager.
pub struct Platform {
    pub settings: Settings,
    pub store: DocumentStore,
    pub manager: Arc<DataSourceManager>,
    pub tushare: Arc<TushareAdmission>,
    pub quote_rotation: Arc<QuoteRotationPipeline>,
    pub queue: Arc<TaskQueue>,
    pub orchestrator: Arc<TaskOrchestrator>,
    pub notifications: Arc<NotificationService>,
    pub rate_limit: Arc<RateLimitGate>,
    pub daily_quota: Arc<DailyQuotaGate>,
    pub cache: Arc<CacheLayer>,
}

impl Platform {
    /// Connect Mongo and Redis, wire every subsystem, and return a
    /// `Platform` ready for [`Self::spawn_background`]. `cn_adapters` are
    /// the caller's Tushare/AKShare/BaoStock clients (may be empty in a
    /// deployment that only serves HK/US); `executor` is the caller's
    /// analysis engine binding.
    pub async fn connect(
        settings: Settings,
        cn_adapters: Vec<Arc<dyn DataSourceAdapter>>,
        executor: Arc<dyn AnalysisExecutor>,
    ) -> Result<Self, PlatformError> {
        let store = DocumentStore::connect(&settings.mongo_uri, &settings.mongo_db).await?;
        store.ensure_indexes().await?;

        let redis_client = redis::Client::open(settings.redis_url.as_str())
            .map_err(|e| PlatformError::Store(format!("invalid REDIS_URL: {e}")))?;
        let conn = redis::aio::ConnectionManager::new(redis_client)
            .await
            .map_err(|e| PlatformError::Store(format!("redis connect: {e}")))?;

        let mut adapters = cn_adapters;
        adapters.push(Arc::new(YfAdapter::new_default()));
        let manager = Arc::new(crate::sources::build_manager(&store, adapters, settings.platform.adapter_timeout).await?);

        let tushare = Arc::new(TushareAdmission::tushare_free_tier());

        let quote_rotation = Arc::new(QuoteRotationPipeline::new(
            store.clone(),
            manager.clone(),
            tushare.clone(),
            &settings.platform.timezone,
            vec![DataSourceKey::Tushare, DataSourceKey::AkShare, DataSourceKey::BaoStock],
            settings.platform.quotes_backfill_on_offhours,
        )?);

        let queue_limits = QueueLimits {
            user_limit: settings.platform.user_concurrent_limit,
            global_limit: settings.platform.global_concurrent_limit,
            visibility_timeout: settings.platform.visibility_timeout,
        };
        let queue = Arc::new(TaskQueue::new(conn.clone(), queue_limits));
        let orchestrator =
            Arc::new(TaskOrchestrator::new(store.clone(), queue.clone(), executor, settings.results_dir.clone()));
        let notifications = Arc::new(NotificationService::new(store.clone(), 256));

        let rate_limit = Arc::new(RateLimitGate::new(conn.clone()));
        let daily_quota = Arc::new(DailyQuotaGate::new(conn));
        let cache = Arc::new(CacheLayer::new(10_000, settings.us_data_cache));

        Ok(Self {
            settings,
            store,
            manager,
            tushare,
            quote_rotation,
            queue,
            orchestrator,
            notifications,
            rate_limit,
            daily_quota,
            cache,
        })
    }

    /// Start every background loop spec.md §4 runs continuously: the quote
    /// rotation tick, `worker_count` analysis workers, and the queue's
    /// zombie-reclamation sweep. Returns their handles for graceful
    /// shutdown; dropping a handle aborts its loop.
    pub fn spawn_background(self: &Arc<Self>, worker_count: usize) -> Vec<TaskHandle> {
        let mut handles = Vec::with_capacity(worker_count + 2);

        let rotation = self.quote_rotation.clone();
        let rotation_interval = self.settings.platform.quotes_ingest_interval;
        handles.push(TaskHandle::new_abort_only(tokio::spawn(async move {
            rotation.run_forever(rotation_interval).await;
        })));

        handles.extend(self.orchestrator.spawn_workers(worker_count, Duration::from_secs(2)));

        let queue = self.queue.clone();
        handles.push(TaskHandle::new_abort_only(tokio::spawn(async move {
            loop {
                let _ = queue.reclaim_zombies().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        })));

        handles
    }
}

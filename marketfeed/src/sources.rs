//! Wires concrete [`DataSourceAdapter`] implementations into one
//! [`DataSourceManager`] at composition time, loading the priority table
//! from the `DataSourceGrouping` collection (spec.md §4.2). Tushare and
//! AKShare/BaoStock adapters are out of this pack's reach (no vendored
//! Rust client for either exists in the corpus), so this module documents
//! the seam and wires the one adapter this pack *can* ground
//! (`marketfeed-yfinance`) plus whatever the caller supplies for the rest.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::TryStreamExt;
use marketfeed_core::adapter::DataSourceAdapter;
use marketfeed_core::manager::DataSourceManager;
use marketfeed_types::PlatformError;
use marketfeed_types::model::DataSourceGrouping;
use marketfeed_types::routing::SourcePriorities;

use crate::store::DocumentStore;

/// Build a [`DataSourceManager`] from a fixed adapter set and the priority
/// overrides currently persisted in `data_source_groupings`.
pub async fn build_manager(
    store: &DocumentStore,
    adapters: Vec<Arc<dyn DataSourceAdapter>>,
    adapter_timeout: Duration,
) -> Result<DataSourceManager, PlatformError> {
    let overrides: Vec<DataSourceGrouping> = store
        .data_source_grouping()
        .find(bson::doc! {})
        .await
        .map_err(|e| PlatformError::Store(format!("load data_source_groupings: {e}")))?
        .try_collect()
        .await
        .map_err(|e| PlatformError::Store(format!("load data_source_groupings: {e}")))?;

    let priorities = SourcePriorities::from_overrides(&overrides);
    Ok(DataSourceManager::new(adapters, priorities, adapter_timeout))
}

/// Connectivity probe of every adapter with the spec's 10s-per-adapter
/// timeout (spec.md §5, §6's `POST /sync/multi-source/test-sources`).
/// Returns each adapter's key, its availability, and how long the probe
/// took — `interfaces::test_sources` surfaces the latter as `latency_ms`.
pub async fn test_sources(
    adapters: &[Arc<dyn DataSourceAdapter>],
) -> Vec<(marketfeed_types::DataSourceKey, marketfeed_core::adapter::Availability, Duration)> {
    let mut out = Vec::with_capacity(adapters.len());
    for adapter in adapters {
        let started = std::time::Instant::now();
        let availability = match tokio::time::timeout(Duration::from_secs(10), adapter.availability()).await {
            Ok(a) => a,
            Err(_) => marketfeed_core::adapter::Availability {
                available: false,
                credential_origin: marketfeed_core::adapter::CredentialOrigin::None,
            },
        };
        out.push((adapter.key(), availability, started.elapsed()));
    }
    out
}

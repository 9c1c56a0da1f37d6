//! `DataSourceManager`: priority-ordered fallback and dual-source
//! consistency-checked fetching across a set of [`DataSourceAdapter`]s,
//! generalized from `borsa::core::Borsa`'s
//! `fetch_single`/`fetch_single_priority_with_fallback` (priority loop,
//! per-provider timeout, `NotFound`-vs-other error aggregation) and
//! `ordered()` (priority-rank sort). Unlike the teacher, every adapter here
//! implements every method of the trait (returning `Unsupported` rather
//! than being absent), so the loop has no `Option<Fut>` step — it always
//! calls, and treats `Unsupported` as "this source doesn't attempt it"
//! rather than a fallback-worthy failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use marketfeed_types::{DataSourceKey, FallbackResult, PlatformError};
use marketfeed_types::model::MarketCategory;
use marketfeed_types::routing::SourcePriorities;
use tracing::instrument;

use crate::adapter::DataSourceAdapter;
use crate::consistency::{ConsistencyChecker, DailyBasicLike};

/// A result type whose "no data" case is distinguishable from an error, so
/// the fallback loop can decide whether to keep trying lower-priority
/// sources (spec.md §4.2: "return the first non-empty result").
pub trait Emptyable {
    /// True when this value counts as "no data" for fallback purposes.
    fn is_empty_result(&self) -> bool;
}

impl<T> Emptyable for Vec<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl Emptyable for String {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

/// Routes capability calls across registered [`DataSourceAdapter`]s.
pub struct DataSourceManager {
    adapters: Vec<Arc<dyn DataSourceAdapter>>,
    priorities: SourcePriorities,
    adapter_timeout: Duration,
}

impl DataSourceManager {
    /// Build a manager from a fixed adapter set and priority table
    /// (spec.md §4.2: "loads priority map from `DataSourceGrouping` at
    /// construction").
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn DataSourceAdapter>>,
        priorities: SourcePriorities,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            priorities,
            adapter_timeout,
        }
    }

    /// Look up one adapter by key, bypassing priority ordering and
    /// fallback entirely. Used by callers that must call exactly one named
    /// provider with no cross-provider fallback within the same attempt
    /// (spec.md §4.5: quote rotation tries one provider per tick; a miss
    /// is retried on the next tick's rotation, never within the same tick).
    #[must_use]
    pub fn adapter(&self, key: DataSourceKey) -> Option<Arc<dyn DataSourceAdapter>> {
        self.adapters.iter().find(|a| a.key() == key).cloned()
    }

    fn ordered(&self, market: MarketCategory, preferred: &[DataSourceKey]) -> Vec<Arc<dyn DataSourceAdapter>> {
        let available: Vec<DataSourceKey> = self.adapters.iter().map(|a| a.key()).collect();
        let order = self.priorities.ordered(market, &available, preferred);
        order
            .into_iter()
            .filter_map(|key| self.adapters.iter().find(|a| a.key() == key).cloned())
            .collect()
    }

    async fn call_with_timeout<T, Fut>(&self, fut: Fut) -> Result<T, PlatformError>
    where
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        match tokio::time::timeout(self.adapter_timeout, fut).await {
            Ok(r) => r,
            Err(_) => Err(PlatformError::transient("adapter", "call timed out")),
        }
    }

    /// Iterate adapters for `market` in priority order (optionally reordered
    /// by `preferred`), returning the first non-empty, non-error result with
    /// its source tag (spec.md §4.2: `with_fallback`).
    #[instrument(skip(self, op), fields(capability = capability_label))]
    pub async fn with_fallback<T, F, Fut>(
        &self,
        market: MarketCategory,
        preferred: &[DataSourceKey],
        capability_label: &'static str,
        op: F,
    ) -> Result<FallbackResult<T>, PlatformError>
    where
        T: Emptyable + Send,
        F: Fn(Arc<dyn DataSourceAdapter>) -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let mut attempted_any = false;
        let mut errors = Vec::new();

        for adapter in self.ordered(market, preferred) {
            let source = adapter.key();
            match self.call_with_timeout(op(adapter)).await {
                Ok(value) if !value.is_empty_result() => {
                    return Ok(FallbackResult::new(value, source, Utc::now()));
                }
                Ok(_empty) => {
                    attempted_any = true;
                }
                Err(PlatformError::Unsupported { .. }) => {}
                Err(e) => {
                    attempted_any = true;
                    errors.push(e);
                }
            }
        }

        if !attempted_any && errors.is_empty() {
            return Err(PlatformError::unsupported(capability_label));
        }
        if errors.is_empty() {
            return Err(PlatformError::empty(capability_label));
        }
        Err(PlatformError::AllSourcesFailed(errors))
    }

    /// Like [`with_fallback`](Self::with_fallback), but the success
    /// predicate is "returned a non-empty trade-date string" (spec.md §4.2:
    /// `find_latest_trade_date_with_fallback`).
    pub async fn find_latest_trade_date_with_fallback(
        &self,
        market: MarketCategory,
        preferred: &[DataSourceKey],
    ) -> Result<FallbackResult<String>, PlatformError> {
        self.with_fallback(market, preferred, "find_latest_trade_date", |a| async move {
            a.find_latest_trade_date().await
        })
        .await
    }

    /// Call the top two adapters by priority in parallel and run them
    /// through the [`ConsistencyChecker`]; degrade silently to
    /// [`with_fallback`](Self::with_fallback) when fewer than two adapters
    /// are available (spec.md §4.2: `with_consistency_check`). The primary
    /// result is always what's returned; the report is advisory.
    pub async fn with_consistency_check<T, F, Fut>(
        &self,
        market: MarketCategory,
        preferred: &[DataSourceKey],
        capability_label: &'static str,
        op: F,
    ) -> Result<(FallbackResult<T>, Option<marketfeed_types::ConsistencyReport>), PlatformError>
    where
        T: Emptyable + DailyBasicLike + Clone + Send,
        F: Fn(Arc<dyn DataSourceAdapter>) -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let candidates = self.ordered(market, preferred);
        if candidates.len() < 2 {
            let primary = self.with_fallback(market, preferred, capability_label, op).await?;
            return Ok((primary, None));
        }

        let primary_adapter = candidates[0].clone();
        let secondary_adapter = candidates[1].clone();
        let (primary_res, secondary_res) = tokio::join!(
            self.call_with_timeout(op(primary_adapter.clone())),
            self.call_with_timeout(op(secondary_adapter.clone())),
        );

        let primary_value = match primary_res {
            Ok(v) if !v.is_empty_result() => v,
            _ => {
                // Primary failed or was empty; fall back across the rest.
                let primary = self.with_fallback(market, preferred, capability_label, op).await?;
                return Ok((primary, None));
            }
        };

        let report = match secondary_res {
            Ok(secondary_value) if !secondary_value.is_empty_result() => Some(
                ConsistencyChecker::default().compare(
                    primary_adapter.key(),
                    secondary_adapter.key(),
                    &primary_value,
                    &secondary_value,
                ),
            ),
            _ => None,
        };

        Ok((
            FallbackResult::new(primary_value, primary_adapter.key(), Utc::now()),
            report,
        ))
    }
}

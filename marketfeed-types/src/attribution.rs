//! Provenance and consistency-report envelopes, generalized from the
//! teacher's `Attribution`/`Span` (`borsa-types::attribution`) and
//! `InfoReport`/`SearchReport` (`borsa-types::reports`) into the two shapes
//! this spec's manager returns: a fallback result tagged with its winning
//! source, and a dual-source consistency report (spec.md §4.2/§4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connector::DataSourceKey;

/// The result of a `*_with_fallback` call: a value plus the source that
/// produced it and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackResult<T> {
    pub value: T,
    pub source: DataSourceKey,
    pub fetched_at: DateTime<Utc>,
}

impl<T> FallbackResult<T> {
    #[must_use]
    pub fn new(value: T, source: DataSourceKey, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            source,
            fetched_at,
        }
    }
}

/// Action recommended by the consistency checker, per spec.md §4.3 step 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RecommendedAction {
    /// Confidence >= 0.8: both sources agree closely enough to use either.
    UseEither,
    /// Confidence >= 0.6: use the primary, but flag the disagreement.
    UsePrimaryWithWarning,
    /// Confidence >= 0.3: use the primary only; secondary is unreliable.
    UsePrimaryOnly,
    /// Confidence < 0.3: sources disagree badly enough to warrant a human
    /// look.
    InvestigateSources,
}

impl RecommendedAction {
    /// Map a confidence score in `[0, 1]` to the recommended action ladder.
    #[must_use]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            Self::UseEither
        } else if confidence >= 0.6 {
            Self::UsePrimaryWithWarning
        } else if confidence >= 0.3 {
            Self::UsePrimaryOnly
        } else {
            Self::InvestigateSources
        }
    }
}

/// Per-metric comparison detail, one row per metric checked by the
/// consistency checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: String,
    pub primary_mean: Option<f64>,
    pub secondary_mean: Option<f64>,
    /// `|secondary - primary| / |primary|`, `None` if not computable.
    pub relative_diff: Option<f64>,
    pub tolerance: f64,
    pub is_significant: bool,
}

/// Full output of `with_consistency_check` (spec.md §4.2/§4.3). The caller
/// always keeps `primary_source`'s data; this is an advisory attached to
/// the response, never an error (spec.md §7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub primary_source: DataSourceKey,
    pub secondary_source: DataSourceKey,
    pub common_instrument_count: usize,
    pub comparisons: Vec<MetricComparison>,
    pub confidence_score: f64,
    pub is_consistent: bool,
    pub recommended_action: RecommendedAction,
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the market-data platform.
///
/// Mirrors the taxonomy of spec.md §7: upstream-unavailable and
/// upstream-empty are distinct from validation and transient-store errors,
/// so callers can decide per-variant whether to fall back, retry, or fail
/// fast.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlatformError {
    /// The requested capability is not implemented by this adapter (distinct
    /// from `Empty`: the adapter never claims to support this operation).
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// Capability label, e.g. "`realtime_quotes`".
        capability: String,
    },

    /// The adapter supports the capability but legitimately has no data to
    /// return (e.g. no news in the requested window). Never an error to the
    /// end user; callers may fall back to another source.
    #[error("empty result: {capability}")]
    Empty {
        /// Capability label that returned no rows.
        capability: String,
    },

    /// Input failed validation; never retried.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A provider call failed in a way that is likely transient (timeout,
    /// connection reset, rate limited upstream). Eligible for backoff retry.
    #[error("{source_name} transient failure: {msg}")]
    Transient {
        /// Name of the adapter or store that failed.
        source_name: String,
        /// Human-readable failure detail.
        msg: String,
    },

    /// A provider call failed in a way that will not resolve by retrying
    /// (bad credentials, malformed response schema).
    #[error("{source_name} permanent failure: {msg}")]
    Permanent {
        /// Name of the adapter or store that failed.
        source_name: String,
        /// Human-readable failure detail.
        msg: String,
    },

    /// A resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource.
        what: String,
    },

    /// All attempted adapters failed for a `with_fallback` call.
    #[error("all sources failed: {0:?}")]
    AllSourcesFailed(Vec<PlatformError>),

    /// An individual adapter call exceeded the configured connectivity
    /// timeout (spec.md §5: 10s per adapter).
    #[error("{source_name} timed out calling {capability}")]
    SourceTimeout {
        /// Name of the adapter that timed out.
        source_name: String,
        /// Capability label being called.
        capability: String,
    },

    /// The request exceeds the configured rate-limit window (spec.md §4.8).
    #[error("rate limit exceeded: limit={limit} current_count={current_count} reset_time={reset_time}")]
    RateLimitExceeded {
        /// Configured requests-per-window cap.
        limit: u64,
        /// Observed count in the current window, inclusive of this request.
        current_count: u64,
        /// Seconds until the window resets.
        reset_time: u64,
    },

    /// The request exceeds the caller's daily analysis/screening quota.
    #[error("daily quota exceeded, resets {reset_date}")]
    DailyQuotaExceeded {
        /// ISO date (`YYYY-MM-DD`) the quota resets.
        reset_date: String,
    },

    /// A caller attempted to enqueue a task while already holding the
    /// per-user or global concurrency limit.
    #[error("concurrency limit reached: {0}")]
    ConcurrencyLimitReached(String),

    /// A MongoDB/Redis operation failed after exhausting retries.
    #[error("store error: {0}")]
    Store(String),
}

impl PlatformError {
    /// Build an `Unsupported` error for a capability string.
    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: capability.into(),
        }
    }

    /// Build an `Empty` error for a capability string.
    pub fn empty(capability: impl Into<String>) -> Self {
        Self::Empty {
            capability: capability.into(),
        }
    }

    /// Build a `Transient` error tagged with the failing source's name.
    pub fn transient(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transient {
            source_name: source_name.into(),
            msg: msg.into(),
        }
    }

    /// Build a `Permanent` error tagged with the failing source's name.
    pub fn permanent(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Permanent {
            source_name: source_name.into(),
            msg: msg.into(),
        }
    }

    /// Returns true when this error is safe to fall back from (i.e. it is
    /// not a validation error that would also fail on the next source).
    #[must_use]
    pub fn is_fallback_trigger(&self) -> bool {
        !matches!(self, Self::InvalidArg(_) | Self::RateLimitExceeded { .. } | Self::DailyQuotaExceeded { .. })
    }

    /// Flatten nested `AllSourcesFailed` aggregates into a plain vector.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::AllSourcesFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}

//! Per-endpoint sliding-minute rate limits and per-user daily quotas
//! (spec.md §4.8), structurally modeled on
//! `borsa_middleware::quota::QuotaAwareConnector`'s window accounting but
//! backed by Redis `INCR`/`EXPIRE` counters instead of an in-process
//! `Mutex<QuotaRuntime>`, since this gate must agree across every
//! request-handling task and process, not just one connector instance.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use marketfeed_types::PlatformError;

/// Per-endpoint sliding-60s request cap (spec.md §4.8 defaults table).
#[must_use]
pub fn endpoint_limit(endpoint: &str) -> u64 {
    match endpoint {
        "/analysis/single" => 10,
        "/analysis/batch" => 5,
        "/screening/filter" => 20,
        "/auth/login" => 5,
        "/auth/register" => 3,
        _ => 100,
    }
}

/// Endpoints whose calls count against a user's daily analysis/screening
/// quota (spec.md §4.8: "applies only to analysis and screening
/// endpoints").
fn is_quota_scoped(endpoint: &str) -> bool {
    endpoint.starts_with("/analysis") || endpoint.starts_with("/screening")
}

/// Operational paths that never count against either gate, mirroring
/// `app/middleware/rate_limit.py`'s health/docs bypass allowlist.
const BYPASSED_PATHS: &[&str] = &["/health", "/healthz", "/docs", "/openapi.json", "/metrics"];

/// True when `endpoint` is an operational path exempt from both gates.
#[must_use]
pub fn is_bypassed(endpoint: &str) -> bool {
    BYPASSED_PATHS.contains(&endpoint)
}

const RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DAILY_QUOTA_TTL_SECS: i64 = 86_400;

fn sanitize_endpoint(endpoint: &str) -> String {
    endpoint.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Sliding-60-second per-endpoint request gate, keyed by user (or by IP for
/// anonymous callers per spec.md §4.8).
pub struct RateLimitGate {
    conn: ConnectionManager,
}

impl RateLimitGate {
    /// Build a gate over an existing Redis connection manager.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Check and consume one unit of the caller's budget for `endpoint`.
    /// `identity` is the user id, or the caller's IP address when anonymous
    /// (spec.md §4.8: "rate limit...uses IP as fallback identity").
    ///
    /// # Errors
    /// Returns [`PlatformError::RateLimitExceeded`] once the endpoint's cap
    /// is exceeded within the current 60-second window, or
    /// [`PlatformError::Store`] if Redis is unreachable.
    pub async fn check(&self, identity: &str, endpoint: &str) -> Result<(), PlatformError> {
        if is_bypassed(endpoint) {
            return Ok(());
        }
        let key = format!("user:rate_limit:{identity}:{}", sanitize_endpoint(endpoint));
        let limit = endpoint_limit(endpoint);
        let mut conn = self.conn.clone();

        let count: u64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| PlatformError::Store(format!("rate limit incr failed: {e}")))?;
        if count == 1 {
            let _: () = conn
                .expire(&key, RATE_LIMIT_WINDOW_SECS as i64)
                .await
                .map_err(|e| PlatformError::Store(format!("rate limit expire failed: {e}")))?;
        }

        if count > limit {
            return Err(PlatformError::RateLimitExceeded {
                limit,
                current_count: count,
                reset_time: RATE_LIMIT_WINDOW_SECS,
            });
        }
        Ok(())
    }
}

/// Per-user daily quota for analysis/screening endpoints (spec.md §4.8).
/// Anonymous users bypass quota entirely (but not [`RateLimitGate`]).
pub struct DailyQuotaGate {
    conn: ConnectionManager,
}

impl DailyQuotaGate {
    /// Build a gate over an existing Redis connection manager.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Check and consume one unit of `user_id`'s daily quota for `endpoint`,
    /// if that endpoint is quota-scoped. Anonymous callers (`user_id ==
    /// None`) always pass.
    ///
    /// # Errors
    /// Returns [`PlatformError::DailyQuotaExceeded`] once the day's quota is
    /// spent, or [`PlatformError::Store`] if Redis is unreachable.
    pub async fn check(
        &self,
        user_id: Option<&str>,
        endpoint: &str,
        daily_limit: u64,
        today: &str,
    ) -> Result<(), PlatformError> {
        let Some(user_id) = user_id else {
            return Ok(());
        };
        if !is_quota_scoped(endpoint) {
            return Ok(());
        }

        let key = format!("user:daily_quota:{user_id}:{today}");
        let mut conn = self.conn.clone();

        let count: u64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| PlatformError::Store(format!("daily quota incr failed: {e}")))?;
        if count == 1 {
            let _: () = conn
                .expire(&key, DAILY_QUOTA_TTL_SECS)
                .await
                .map_err(|e| PlatformError::Store(format!("daily quota expire failed: {e}")))?;
        }

        if count > daily_limit {
            return Err(PlatformError::DailyQuotaExceeded {
                reset_date: today.to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome reported to the caller at the HTTP boundary (spec.md §6):
/// admitted, or rejected with the structured 429-equivalent payload.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// The call may proceed.
    Admitted,
    /// The call was rejected; carries the specific gate error.
    Rejected(PlatformError),
}

impl From<Result<(), PlatformError>> for GateDecision {
    fn from(result: Result<(), PlatformError>) -> Self {
        match result {
            Ok(()) => Self::Admitted,
            Err(e) => Self::Rejected(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_endpoints_use_their_specific_cap() {
        assert_eq!(endpoint_limit("/analysis/single"), 10);
        assert_eq!(endpoint_limit("/analysis/batch"), 5);
        assert_eq!(endpoint_limit("/screening/filter"), 20);
        assert_eq!(endpoint_limit("/auth/login"), 5);
        assert_eq!(endpoint_limit("/auth/register"), 3);
    }

    #[test]
    fn unknown_endpoints_fall_back_to_default_cap() {
        assert_eq!(endpoint_limit("/health"), 100);
    }

    #[test]
    fn only_analysis_and_screening_are_quota_scoped() {
        assert!(is_quota_scoped("/analysis/single"));
        assert!(is_quota_scoped("/screening/filter"));
        assert!(!is_quota_scoped("/auth/login"));
        assert!(!is_quota_scoped("/health"));
    }

    #[test]
    fn health_and_docs_paths_are_bypassed() {
        assert!(is_bypassed("/health"));
        assert!(is_bypassed("/docs"));
        assert!(!is_bypassed("/analysis/single"));
    }

    #[test]
    fn sanitize_replaces_non_alphanumeric_characters() {
        assert_eq!(sanitize_endpoint("/analysis/single"), "_analysis_single");
    }

    #[test]
    fn gate_decision_converts_from_result() {
        assert_eq!(GateDecision::from(Ok(())), GateDecision::Admitted);
        let err = PlatformError::DailyQuotaExceeded {
            reset_date: "2026-08-01".to_string(),
        };
        assert_eq!(GateDecision::from(Err(err.clone())), GateDecision::Rejected(err));
    }
}

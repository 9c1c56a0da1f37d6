//! Tushare realtime-quote admission gate (spec.md §4.5).
//!
//! Generalized from `borsa_middleware::quota::QuotaAwareConnector`'s
//! in-process window accounting, re-targeted from a generic per-connector
//! quota to the specific free-tier rule: a rolling 1-hour deque of call
//! timestamps, capacity 2, with a one-time permission probe that upgrades
//! the account to "premium" (no local gate) or pins it to "free-tier".

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use marketfeed_types::QuotaConfig;

/// Outcome of a premium-permission probe (spec.md §4.5 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionProbe {
    /// The premium endpoint answered normally.
    Premium,
    /// The premium endpoint returned permission-denied; pin to free-tier.
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Unknown,
    Premium,
    Free,
}

struct Window {
    calls: VecDeque<Instant>,
    capacity: usize,
    span: Duration,
}

impl Window {
    fn admit(&mut self) -> bool {
        let now = Instant::now();
        while let Some(&front) = self.calls.front() {
            if now.duration_since(front) >= self.span {
                self.calls.pop_front();
            } else {
                break;
            }
        }
        self.calls.len() < self.capacity
    }

    fn record(&mut self) {
        self.calls.push_back(Instant::now());
    }
}

/// Gate that decides whether a Tushare realtime-quote call is admitted this
/// tick. Premium accounts are never gated; free-tier accounts are limited to
/// `config.limit` calls per `config.window` (spec.md default: 2/hour).
pub struct TushareAdmission {
    tier: Mutex<Tier>,
    window: Mutex<Window>,
}

impl TushareAdmission {
    /// Build a gate that has not yet probed for premium access.
    #[must_use]
    pub fn new(config: &QuotaConfig) -> Self {
        Self {
            tier: Mutex::new(Tier::Unknown),
            window: Mutex::new(Window {
                calls: VecDeque::new(),
                capacity: config.limit as usize,
                span: config.window,
            }),
        }
    }

    /// Free-tier gate using the spec's default 2-calls/hour budget.
    #[must_use]
    pub fn tushare_free_tier() -> Self {
        Self::new(&QuotaConfig::tushare_free_tier())
    }

    /// Record the outcome of the one-time permission probe. Idempotent:
    /// later calls are ignored once the tier is resolved, since the probe
    /// only runs once per process per spec.md §4.5 step 1.
    pub fn record_probe(&self, outcome: PermissionProbe) {
        let mut tier = self.tier.lock().expect("mutex poisoned");
        if *tier == Tier::Unknown {
            *tier = match outcome {
                PermissionProbe::Premium => Tier::Premium,
                PermissionProbe::Denied => Tier::Free,
            };
        }
    }

    /// True once the probe has resolved a tier (premium or free).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        *self.tier.lock().expect("mutex poisoned") != Tier::Unknown
    }

    /// Whether a call should be admitted right now. Unresolved accounts are
    /// treated as free-tier until the probe completes, the conservative
    /// default.
    #[must_use]
    pub fn admit(&self) -> bool {
        let tier = *self.tier.lock().expect("mutex poisoned");
        if tier == Tier::Premium {
            return true;
        }
        self.window.lock().expect("mutex poisoned").admit()
    }

    /// Record that an admitted call actually went out. Only free-tier calls
    /// consume the deque; premium accounts never populate it.
    pub fn record_call(&self) {
        if *self.tier.lock().expect("mutex poisoned") != Tier::Premium {
            self.window.lock().expect("mutex poisoned").record();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_tier_is_never_gated() {
        let gate = TushareAdmission::tushare_free_tier();
        gate.record_probe(PermissionProbe::Premium);
        for _ in 0..10 {
            assert!(gate.admit());
        }
    }

    #[test]
    fn free_tier_admits_up_to_capacity_then_blocks() {
        let gate = TushareAdmission::tushare_free_tier();
        gate.record_probe(PermissionProbe::Denied);
        assert!(gate.admit());
        gate.record_call();
        assert!(gate.admit());
        gate.record_call();
        assert!(!gate.admit());
    }

    #[test]
    fn probe_outcome_is_sticky() {
        let gate = TushareAdmission::tushare_free_tier();
        gate.record_probe(PermissionProbe::Premium);
        gate.record_probe(PermissionProbe::Denied);
        assert!(gate.admit());
    }

    #[test]
    fn unresolved_account_defaults_to_gated() {
        let gate = TushareAdmission::tushare_free_tier();
        assert!(!gate.is_resolved());
        assert!(gate.admit());
        gate.record_call();
        assert!(gate.admit());
        gate.record_call();
        assert!(!gate.admit());
    }
}

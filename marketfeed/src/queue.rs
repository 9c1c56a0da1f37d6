//! Redis-backed Task Queue (spec.md §4.7): admission gates, a FIFO dequeue
//! protocol with a per-user race recheck, completion/cancellation
//! bookkeeping, and periodic zombie reclamation. Grounded on
//! `marketfeed-middleware::gate`'s `INCR`/`EXPIRE` Redis primitives,
//! generalized from per-request counters to the queue's richer
//! hash/list/set layout (spec.md §4.7's exact key names).

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use marketfeed_types::PlatformError;

fn store_err(context: &str, e: impl std::fmt::Display) -> PlatformError {
    PlatformError::Store(format!("{context}: {e}"))
}

/// A task's queue-side identity, handed to [`TaskQueue::enqueue`]. Its
/// result lives in `AnalysisTask`/`AnalysisReport` via the Document Store
/// Gateway, not here.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub params: serde_json::Value,
    pub batch_id: Option<String>,
}

/// Concurrency limits enforced at enqueue and dequeue time (spec.md §4.7).
#[derive(Debug, Clone, Copy)]
pub struct QueueLimits {
    pub user_limit: u64,
    pub global_limit: u64,
    pub visibility_timeout: Duration,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self { user_limit: 3, global_limit: 50, visibility_timeout: Duration::from_secs(30 * 60) }
    }
}

/// The Redis-backed task queue described in spec.md §4.7.
pub struct TaskQueue {
    conn: ConnectionManager,
    limits: QueueLimits,
}

impl TaskQueue {
    /// Build a queue over an existing Redis connection manager.
    #[must_use]
    pub const fn new(conn: ConnectionManager, limits: QueueLimits) -> Self {
        Self { conn, limits }
    }

    /// Admission-gated enqueue (spec.md §4.7 "Admission gates on enqueue").
    pub async fn enqueue(&self, task: &QueuedTask) -> Result<(), PlatformError> {
        let mut conn = self.conn.clone();
        let user_count: u64 = conn.scard(user_set(&task.user_id)).await.map_err(|e| store_err("scard", e))?;
        if user_count >= self.limits.user_limit {
            return Err(PlatformError::ConcurrencyLimitReached(format!("user {} at limit", task.user_id)));
        }
        let global_count: u64 = conn.get("global:concurrent").await.unwrap_or(0);
        if global_count >= self.limits.global_limit {
            return Err(PlatformError::ConcurrencyLimitReached("global limit reached".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let fields: Vec<(&str, String)> = vec![
            ("id", task.id.clone()),
            ("user", task.user_id.clone()),
            ("symbol", task.symbol.clone()),
            ("status", "queued".to_string()),
            ("created_at", now.clone()),
            ("params", task.params.to_string()),
            ("enqueued_at", now),
            ("batch_id", task.batch_id.clone().unwrap_or_default()),
        ];
        let _: () = conn.hset_multiple(task_key(&task.id), &fields).await.map_err(|e| store_err("hset task", e))?;
        let _: () = conn.lpush("queue:ready", &task.id).await.map_err(|e| store_err("lpush", e))?;
        if let Some(batch_id) = &task.batch_id {
            let _: () =
                conn.sadd(batch_tasks_key(batch_id), &task.id).await.map_err(|e| store_err("sadd batch", e))?;
        }
        Ok(())
    }

    /// Dequeue protocol for one worker (spec.md §4.7 "Dequeue protocol").
    /// Returns `None` when the queue was empty or the popped task was
    /// stale/raced away; either way the caller should sleep and retry.
    pub async fn dequeue(&self, worker_id: &str) -> Result<Option<String>, PlatformError> {
        let mut conn = self.conn.clone();
        let popped: Option<String> = conn.rpop("queue:ready", None).await.map_err(|e| store_err("rpop", e))?;
        let Some(task_id) = popped else { return Ok(None) };

        let exists: bool = conn.exists(task_key(&task_id)).await.map_err(|e| store_err("exists", e))?;
        if !exists {
            return Ok(None);
        }
        let user_id: String = conn.hget(task_key(&task_id), "user").await.map_err(|e| store_err("hget user", e))?;

        let user_count: u64 = conn.scard(user_set(&user_id)).await.map_err(|e| store_err("scard", e))?;
        if user_count >= self.limits.user_limit {
            let _: () = conn.lpush("queue:ready", &task_id).await.map_err(|e| store_err("lpush requeue", e))?;
            return Ok(None);
        }

        let _: () = conn.sadd(user_set(&user_id), &task_id).await.map_err(|e| store_err("sadd user", e))?;
        let _: () = conn.incr("global:concurrent", 1).await.map_err(|e| store_err("incr global", e))?;

        let timeout_at = (Utc::now()
            + chrono::Duration::from_std(self.limits.visibility_timeout).unwrap_or_default())
        .to_rfc3339();
        let vis_fields =
            [("task_id", task_id.clone()), ("worker_id", worker_id.to_string()), ("timeout_at", timeout_at)];
        let _: () = conn
            .hset_multiple(visibility_key(&task_id), &vis_fields)
            .await
            .map_err(|e| store_err("hset visibility", e))?;

        let now = Utc::now().to_rfc3339();
        let status_fields = [("status", "processing".to_string()), ("worker_id", worker_id.to_string()), ("started_at", now)];
        let _: () =
            conn.hset_multiple(task_key(&task_id), &status_fields).await.map_err(|e| store_err("hset status", e))?;

        Ok(Some(task_id))
    }

    /// Mark a claimed task completed or failed, releasing its concurrency
    /// slot (spec.md §4.7 "Completion").
    pub async fn complete(&self, task_id: &str, user_id: &str, succeeded: bool) -> Result<(), PlatformError> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(user_set(user_id), task_id).await.map_err(|e| store_err("srem user", e))?;
        let _: () = conn.decr("global:concurrent", 1).await.map_err(|e| store_err("decr global", e))?;
        let _: () = conn.del(visibility_key(task_id)).await.map_err(|e| store_err("del visibility", e))?;

        let (status, target_set) = if succeeded { ("completed", "set:completed") } else { ("failed", "set:failed") };
        let now = Utc::now().to_rfc3339();
        let fields = [("status", status.to_string()), ("completed_at", now)];
        let _: () =
            conn.hset_multiple(task_key(task_id), &fields).await.map_err(|e| store_err("hset completion", e))?;
        let _: () = conn.sadd(target_set, task_id).await.map_err(|e| store_err("sadd terminal", e))?;
        Ok(())
    }

    /// Cooperative cancellation (spec.md §4.7 "Cancellation").
    pub async fn cancel(&self, task_id: &str, user_id: &str) -> Result<(), PlatformError> {
        let mut conn = self.conn.clone();
        let status: String = conn.hget(task_key(task_id), "status").await.unwrap_or_default();

        match status.as_str() {
            "queued" => {
                let _: () = conn.lrem("queue:ready", 0, task_id).await.map_err(|e| store_err("lrem", e))?;
            }
            "processing" => {
                let _: () = conn.srem(user_set(user_id), task_id).await.map_err(|e| store_err("srem cancel", e))?;
                let _: () = conn.decr("global:concurrent", 1).await.map_err(|e| store_err("decr cancel", e))?;
                let _: () =
                    conn.del(visibility_key(task_id)).await.map_err(|e| store_err("del visibility cancel", e))?;
            }
            _ => {}
        }

        let now = Utc::now().to_rfc3339();
        let fields = [("status", "cancelled".to_string()), ("cancelled_at", now)];
        let _: () = conn.hset_multiple(task_key(task_id), &fields).await.map_err(|e| store_err("hset cancel", e))?;
        Ok(())
    }

    /// Record a batch submission's `batch:{id}` hash (spec.md §6
    /// `/analysis/batch` response; SPEC_FULL.md §4.7 "batch tracking").
    /// Per-task membership is recorded separately by [`Self::enqueue`]'s
    /// `batch:tasks:{id}` set.
    pub async fn record_batch(&self, batch_id: &str, user_id: &str, submitted: usize) -> Result<(), PlatformError> {
        let mut conn = self.conn.clone();
        let fields = [
            ("id", batch_id.to_string()),
            ("user", user_id.to_string()),
            ("submitted", submitted.to_string()),
            ("created_at", Utc::now().to_rfc3339()),
        ];
        let _: () = conn.hset_multiple(batch_key(batch_id), &fields).await.map_err(|e| store_err("hset batch", e))?;
        Ok(())
    }

    /// Sweep `visibility:*` keys for expired timeouts, requeueing their
    /// tasks (spec.md §4.7 "Zombie reclamation"). Intended to run
    /// periodically from a background loop.
    pub async fn reclaim_zombies(&self) -> Result<u64, PlatformError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys("visibility:*").await.map_err(|e| store_err("keys", e))?;
        let now = Utc::now();
        let mut reclaimed = 0u64;

        for key in keys {
            let fields: HashMap<String, String> = conn.hgetall(&key).await.map_err(|e| store_err("hgetall", e))?;
            let Some(timeout_at) =
                fields.get("timeout_at").and_then(|v| chrono::DateTime::parse_from_rfc3339(v).ok())
            else {
                continue;
            };
            if timeout_at.with_timezone(&Utc) >= now {
                continue;
            }
            let Some(task_id) = fields.get("task_id") else { continue };

            let user_id: String = conn.hget(task_key(task_id), "user").await.unwrap_or_default();
            let _: () = conn.srem(user_set(&user_id), task_id).await.map_err(|e| store_err("srem reclaim", e))?;
            let _: () = conn.decr("global:concurrent", 1).await.map_err(|e| store_err("decr reclaim", e))?;
            let _: () = conn.del(&key).await.map_err(|e| store_err("del reclaim", e))?;
            let _: () = conn.lpush("queue:ready", task_id).await.map_err(|e| store_err("lpush reclaim", e))?;

            let now_str = now.to_rfc3339();
            let fields2 = [("status", "queued".to_string()), ("requeued_at", now_str)];
            let _: () =
                conn.hset_multiple(task_key(task_id), &fields2).await.map_err(|e| store_err("hset reclaim", e))?;
            reclaimed += 1;
        }
        Ok(reclaimed)
    }
}

fn task_key(id: &str) -> String {
    format!("task:{id}")
}
fn visibility_key(id: &str) -> String {
    format!("visibility:{id}")
}
fn user_set(user_id: &str) -> String {
    format!("user:processing:{user_id}")
}
fn batch_tasks_key(batch_id: &str) -> String {
    format!("batch:tasks:{batch_id}")
}
fn batch_key(batch_id: &str) -> String {
    format!("batch:{batch_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_spec_defaults() {
        let limits = QueueLimits::default();
        assert_eq!(limits.user_limit, 3);
        assert_eq!(limits.global_limit, 50);
        assert_eq!(limits.visibility_timeout, Duration::from_secs(30 * 60));
    }

    #[test]
    fn key_helpers_match_spec_naming() {
        assert_eq!(task_key("abc"), "task:abc");
        assert_eq!(visibility_key("abc"), "visibility:abc");
        assert_eq!(user_set("u1"), "user:processing:u1");
        assert_eq!(batch_tasks_key("b1"), "batch:tasks:b1");
        assert_eq!(batch_key("b1"), "batch:b1");
    }
}

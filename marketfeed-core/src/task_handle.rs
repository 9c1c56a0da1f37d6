//! Graceful-shutdown handle for long-running background loops, generalized
//! from the teacher's `StreamHandle` (used there to own a live quote
//! stream's `JoinHandle`). Here it owns the quote-rotation tick loop and the
//! task-dispatch background loop (spec.md §4.5, §4.7).

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Abstraction over a handle that can be queried for completion and aborted.
pub trait Abortable {
    /// Abort the underlying task if it is still running.
    fn abort(&mut self);
    /// Return `true` if the underlying task has completed.
    fn is_finished(&self) -> bool;
}

impl Abortable for JoinHandle<()> {
    fn abort(&mut self) {
        Self::abort(self);
    }

    fn is_finished(&self) -> bool {
        Self::is_finished(self)
    }
}

/// Abstraction over a one-shot stop signal.
pub trait Stoppable {
    /// Send a best-effort stop signal to request graceful shutdown.
    fn send(self);
}

impl Stoppable for oneshot::Sender<()> {
    fn send(self) {
        let _ = Self::send(self, ());
    }
}

/// Drop-time logic for background-loop handles:
/// - send a best-effort stop signal if present
/// - abort the task if it hasn't finished yet
pub fn drop_impl<H, S>(inner: &mut Option<H>, stop_tx: &mut Option<S>)
where
    H: Abortable,
    S: Stoppable,
{
    if let Some(tx) = stop_tx.take() {
        tx.send();
    }
    if let Some(mut h) = inner.take()
        && !h.is_finished()
    {
        h.abort();
    }
}

/// Handle to a long-lived background loop (quote rotation, task dispatch).
///
/// Lifecycle contract:
/// - Prefer [`stop`](TaskHandle::stop) to request a graceful shutdown and await completion.
/// - Call [`abort`](TaskHandle::abort) for immediate, non-graceful termination.
/// - If dropped without an explicit shutdown, a best-effort stop signal is sent (if available) and
///   the underlying task is then aborted. The task may not observe the stop signal before abort.
#[derive(Debug)]
pub struct TaskHandle {
    inner: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl TaskHandle {
    /// Create a new `TaskHandle` that can be asked to stop gracefully.
    #[must_use]
    pub const fn new(inner: JoinHandle<()>, stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: Some(stop_tx),
        }
    }

    /// Create a `TaskHandle` that can only abort the task (no graceful stop).
    #[must_use]
    pub const fn new_abort_only(inner: JoinHandle<()>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: None,
        }
    }

    /// Gracefully stop the underlying loop and await its completion.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(inner) = self.inner.take() {
            let _ = inner.await;
        }
    }

    /// Force-abort the underlying loop without waiting for completion.
    pub fn abort(mut self) {
        if let Some(inner) = self.inner.take() {
            inner.abort();
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        drop_impl(&mut self.inner, &mut self.stop_tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot as ot;

    #[tokio::test]
    async fn stop_awaits_completion() {
        let (stop_tx, stop_rx) = ot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = stop_rx.await;
        });
        let th = TaskHandle::new(handle, stop_tx);
        th.stop().await;
    }

    #[tokio::test]
    async fn abort_only_handle_can_be_aborted() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        let th = TaskHandle::new_abort_only(handle);
        th.abort();
    }
}

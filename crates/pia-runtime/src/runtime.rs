//! The process-wide runtime singleton and its `submit` bridge (spec.md 4.7,
//! 9: "The runtime's event-loop thread and NM client are process-wide
//! singletons with a defined lifecycle (lazy start, implicit tear-down at
//! process exit)").

use crate::handle::CompletionHandle;
use crate::loop_thread::{self, Job};
use std::future::Future;
use std::sync::OnceLock;
use tokio::sync::{mpsc, oneshot};

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// Owns the background event-loop thread and the channel used to submit
/// work to it. Cloning is cheap (an `UnboundedSender` clone); there is
/// exactly one loop thread per process regardless of how many `Runtime`
/// values exist, because [`Runtime::global`] always returns the same
/// instance.
#[derive(Clone)]
pub struct Runtime {
    tx: mpsc::UnboundedSender<Job>,
}

impl Runtime {
    /// Starts a loop thread of its own. Most callers want [`Runtime::global`]
    /// instead; this is exposed for tests that want an isolated loop.
    pub fn start() -> Self {
        Self {
            tx: loop_thread::spawn(),
        }
    }

    /// The process-wide runtime, started lazily on first use (spec.md 9).
    pub fn global() -> &'static Runtime {
        GLOBAL.get_or_init(Runtime::start)
    }

    /// Schedules `op` onto the loop thread and returns a handle resolvable
    /// from any thread. `op` itself need not be `Send` once it starts
    /// running - only the closure that produces it crosses threads.
    pub fn submit<F, Fut, T>(&self, op: F) -> CompletionHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let result = op().await;
                let _ = tx.send(result);
            })
        });

        // An error here means the loop thread is gone; the caller learns
        // about it the same way as any other lost operation, by observing
        // `RuntimeError::OperationLost` on the handle, since `rx` will
        // simply never be sent to.
        let _ = self.tx.send(job);

        CompletionHandle { rx }
    }

    /// Whether `self` is healthy, i.e. the loop thread is still consuming
    /// submissions. Best-effort - a `true` result can become stale the
    /// instant after it is observed.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// True if called from inside the runtime's own event-loop thread. Exposed
/// so collaborators (like `pia-nm`) can assert they are not about to
/// self-await (spec.md 4.7).
pub fn on_loop_thread() -> bool {
    crate::loop_thread::on_loop_thread()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_runs_on_the_loop_and_resolves() {
        let rt = Runtime::start();
        let handle = rt.submit(|| async { 2 + 2 });
        assert_eq!(handle.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn concurrent_submissions_all_resolve() {
        let rt = Runtime::start();
        let handles: Vec<_> = (0..16).map(|i| rt.submit(move || async move { i * 2 })).collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), (i as u32) * 2);
        }
    }

    #[tokio::test]
    async fn global_returns_the_same_instance_across_calls() {
        let a = Runtime::global();
        let b = Runtime::global();
        let handle_a = a.submit(|| async { 1u32 });
        let handle_b = b.submit(|| async { 1u32 });
        assert_eq!(handle_a.await.unwrap(), 1);
        assert_eq!(handle_b.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn is_alive_is_true_for_a_fresh_runtime() {
        let rt = Runtime::start();
        assert!(rt.is_alive());
    }
}

//! `LazyOnLoop<T>` - the "construct once, on the loop thread, block the
//! first caller until ready" pattern the NM client needs (spec.md 4.7:
//! "Performs NM client construction asynchronously on the loop, blocking
//! the first caller until the client is ready").

use crate::error::RuntimeError;
use crate::runtime::Runtime;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Wraps a fallible async initializer for a value that must be built on
/// the runtime's event-loop thread exactly once, then shared. Every caller
/// after the first observes the same already-built value (or the same
/// failure, since `tokio::sync::OnceCell::get_or_try_init` does not retry
/// a prior failure); concurrent first-callers all await the single
/// in-flight initialization rather than racing to build their own.
pub struct LazyOnLoop<T> {
    cell: Arc<OnceCell<T>>,
}

impl<T> Default for LazyOnLoop<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> LazyOnLoop<T> {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Returns the initialized value, building it on `runtime`'s loop
    /// thread the first time this is called for `self`.
    pub async fn get_or_init<F, Fut, E>(&self, runtime: &Runtime, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
        E: From<RuntimeError> + Send + 'static,
    {
        let cell = Arc::clone(&self.cell);
        runtime
            .submit(move || async move {
                cell.get_or_try_init(init)
                    .await
                    .map(|v| v.clone())
            })
            .await
            .map_err(E::from)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct BuildError;
    impl From<RuntimeError> for BuildError {
        fn from(_: RuntimeError) -> Self {
            BuildError
        }
    }

    #[tokio::test]
    async fn initializes_exactly_once() {
        let rt = Runtime::start();
        let lazy: LazyOnLoop<u32> = LazyOnLoop::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..5 {
            let calls = Arc::clone(&calls);
            let value = lazy
                .get_or_init(&rt, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, BuildError>(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

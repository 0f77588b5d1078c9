//! `CompletionHandle<T>` - the future side of the submit/await bridge
//! (spec.md 4.7).

use crate::error::RuntimeError;
use crate::loop_thread::on_loop_thread;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves at most once, to the result of the operation it was created
/// for by [`Runtime::submit`](crate::Runtime::submit). Awaiting it from the
/// loop thread itself panics rather than deadlocking silently.
pub struct CompletionHandle<T> {
    pub(crate) rx: oneshot::Receiver<T>,
}

impl<T> Future for CompletionHandle<T> {
    type Output = Result<T, RuntimeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if on_loop_thread() {
            panic!(
                "CompletionHandle polled from the runtime's own event-loop thread; \
                 this would starve the only thread able to resolve it"
            );
        }
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RuntimeError::OperationLost)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_with_sent_value() {
        let (tx, rx) = oneshot::channel();
        tx.send(42u32).unwrap();
        let handle = CompletionHandle { rx };
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn dropped_sender_surfaces_operation_lost() {
        let (tx, rx) = oneshot::channel::<u32>();
        drop(tx);
        let handle = CompletionHandle { rx };
        assert!(matches!(handle.await, Err(RuntimeError::OperationLost)));
    }
}

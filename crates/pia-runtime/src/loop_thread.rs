//! The single background event-loop thread NM's async object API requires
//! (spec.md 4.7). Modeled on `fos-tabs::worker::spawn_worker`'s
//! `thread::Builder::new().name(...).spawn(...)` plus channel-driven loop,
//! generalized from a fixed `TabMessage` enum to an arbitrary boxed job so
//! any async operation can be scheduled onto it, and from an OS channel
//! drained synchronously to a `tokio::sync::mpsc` drained by a
//! single-threaded Tokio runtime (the cooperative loop the NM object API
//! needs) plus a `LocalSet` (jobs need not be `Send` once running - only
//! the boxed closure that produces them must be, to cross the channel).

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

pub(crate) type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()>>> + Send>;

thread_local! {
    static ON_LOOP_THREAD: Cell<bool> = const { Cell::new(false) };
}

pub(crate) fn on_loop_thread() -> bool {
    ON_LOOP_THREAD.with(Cell::get)
}

/// Spawns the daemon-style loop thread and returns the sender jobs are
/// pushed through. The thread is deliberately not joined anywhere - it is
/// marked non-joining so it never blocks process exit (spec.md 4.7).
pub(crate) fn spawn() -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

    std::thread::Builder::new()
        .name("pia-nm-loop".to_string())
        .spawn(move || {
            ON_LOOP_THREAD.with(|f| f.set(true));
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build the event-loop's single-threaded Tokio runtime");
            let local = tokio::task::LocalSet::new();

            local.block_on(&rt, async move {
                while let Some(job) = rx.recv().await {
                    tokio::task::spawn_local(job());
                }
            });
        })
        .expect("failed to spawn the pia-nm-loop thread");

    tx
}

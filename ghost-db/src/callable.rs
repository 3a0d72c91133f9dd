//! The async work registry ("callables" in the original bot).
//!
//! A [`Callable`] is a unit of database work submitted by a realm session or
//! a game worker: "look up this account", "save this replay's score", and
//! so on. The work runs to completion somewhere else (a `tokio::task`
//! spawned by whoever created it); the registry's only job is to let the
//! orchestrator notice when a callable is done and hand it back to the
//! database backend for recovery.

use std::sync::Arc;
use tokio::sync::Mutex;

/// A unit of asynchronous database work.
///
/// `is_ready` must be cheap and non-blocking; implementations typically
/// back it with an `Arc<AtomicBool>` flipped by the spawned task, or a
/// `tokio::sync::oneshot::Receiver` polled with `try_recv`.
pub trait Callable: Send + Sync {
    fn is_ready(&self) -> bool;

    /// A short, human-readable label used only for logging.
    fn label(&self) -> &str {
        "callable"
    }
}

/// Thread-safe sequence of in-flight callables.
///
/// Lock scope is exactly the traversal performed by [`CallableRegistry::drain_ready`];
/// the sink passed to it must not re-enter the registry or it will deadlock.
#[derive(Default)]
pub struct CallableRegistry {
    items: Mutex<Vec<Arc<dyn Callable>>>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callable. Any component may call this at any time.
    pub async fn push(&self, item: Arc<dyn Callable>) {
        self.items.lock().await.push(item);
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes every ready callable and invokes `sink` once per item, then
    /// drops it. Returns the number reaped.
    pub async fn drain_ready<F>(&self, mut sink: F) -> usize
    where
        F: FnMut(Arc<dyn Callable>),
    {
        let mut guard = self.items.lock().await;
        let mut reaped = 0;
        guard.retain(|item| {
            if item.is_ready() {
                sink(item.clone());
                reaped += 1;
                false
            } else {
                true
            }
        });
        reaped
    }
}

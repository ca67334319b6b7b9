use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::debug;
use tokio::sync::Mutex;

/// Collapses concurrent work per key: while a run for `key` is in flight,
/// every caller awaits that same run; once it settles (success or failure)
/// the entry is removed so the next request starts fresh work. A driver
/// task polls each run to completion, so the work finishes even if every
/// caller drops its future mid-flight. Has no opinion about what the
/// factory does.
pub struct Dedupe<T: Clone> {
    pending: Arc<Mutex<HashMap<String, Shared<BoxFuture<'static, T>>>>>,
}

impl<T: Clone + Send + Sync + 'static> Dedupe<T> {
    pub fn new() -> Self {
        Dedupe {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Await the in-flight run for `key`, or install `factory()` as the new
    /// one. Installation happens under the table lock, before the first
    /// poll, so a concurrent caller can never start a duplicate run.
    pub async fn run<F, Fut>(&self, key: &str, factory: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let fut = {
            let mut pending = self.pending.lock().await;
            if let Some(existing) = pending.get(key) {
                debug!("Joining in-flight run for key {key}");
                existing.clone()
            } else {
                debug!("Starting new run for key {key}");
                let fut = factory().boxed().shared();
                pending.insert(key.to_string(), fut.clone());
                spawn_driver(self.pending.clone(), key.to_string(), fut.clone());
                fut
            }
        };

        let result = fut.clone().await;

        // Remove the settled entry promptly rather than waiting for the
        // driver's turn. Pointer comparison so a slow waiter never evicts
        // a newer run that reused the key in the meantime.
        let mut pending = self.pending.lock().await;
        if pending.get(key).is_some_and(|current| Shared::ptr_eq(current, &fut)) {
            pending.remove(key);
        }

        result
    }
}

/// Drive the shared run to completion independently of its waiters, then
/// remove the settled entry. Pointer comparison so the driver never evicts
/// a newer run that reused the key in the meantime.
fn spawn_driver<T: Clone + Send + Sync + 'static>(
    pending: Arc<Mutex<HashMap<String, Shared<BoxFuture<'static, T>>>>>,
    key: String,
    fut: Shared<BoxFuture<'static, T>>,
) {
    tokio::spawn(async move {
        fut.clone().await;
        let mut pending = pending.lock().await;
        if pending.get(&key).is_some_and(|current| Shared::ptr_eq(current, &fut)) {
            pending.remove(&key);
        }
    });
}

impl<T: Clone + Send + Sync + 'static> Default for Dedupe<T> {
    fn default() -> Self {
        Self::new()
    }
}

//! Collapse concurrent work for the same key into one task

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};

use crate::prelude::HashMap;
use crate::{ChunkError, Result};

type Flight<V> = Shared<BoxFuture<'static, Result<V>>>;
type Registry<K, V> = Mutex<HashMap<K, Flight<V>>>;

/// Registry of in-flight operations, one per key.
///
/// The first caller for a key spawns the work on the tokio runtime; every
/// caller, first included, awaits a shared handle to the same result. The
/// work runs to completion even if every caller goes away, and the key is
/// deregistered as soon as it settles, success or failure.
pub struct SingleFlight<K, V> {
    pending: Arc<Registry<K, V>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::default())),
        }
    }

    /// Join the flight for `key`, starting it with `work` if none exists.
    ///
    /// `work` is only called when this caller becomes the leader.
    pub fn run<F, Fut>(&self, key: K, work: F) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(flight) = pending.get(&key) {
            return flight.clone();
        }

        let guard = Deregister {
            registry: Arc::downgrade(&self.pending),
            key: Some(key.clone()),
        };
        let fut = work();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            fut.await
        });
        let flight = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(ChunkError::Aborted(err.to_string())),
            }
        }
        .boxed()
        .shared();

        pending.insert(key, flight.clone());
        flight
    }

    /// Number of keys currently being resolved
    pub fn in_flight(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.pending
            .lock()
            .map(|p| p.contains_key(key))
            .unwrap_or(false)
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the key when the spawned task finishes or unwinds
struct Deregister<K: Eq + Hash, V> {
    registry: Weak<Registry<K, V>>,
    key: Option<K>,
}

impl<K: Eq + Hash, V> Drop for Deregister<K, V> {
    fn drop(&mut self) {
        if let (Some(registry), Some(key)) = (self.registry.upgrade(), self.key.take()) {
            if let Ok(mut pending) = registry.lock() {
                pending.remove(&key);
            }
        }
    }
}

//! Debounced background writes keyed by entity. Scheduling the same key
//! again inside the window restarts the timer and merges the pending
//! payloads, so a burst of edits turns into one flush.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::debug;

pub type FlushFn<K, P> = Arc<dyn Fn(K, P) -> BoxFuture<'static, ()> + Send + Sync>;

/// Payload of a queued write. `coalesce` folds a newer write for the same
/// key into the pending one.
pub trait Coalesce {
    fn coalesce(&mut self, newer: Self);
}

impl<V: Ord> Coalesce for BTreeSet<V> {
    fn coalesce(&mut self, newer: Self) {
        self.extend(newer);
    }
}

struct Pending<K, P> {
    payload: P,
    generation: u64,
    timer: JoinHandle<()>,
    flush: FlushFn<K, P>,
}

type PendingMap<K, P> = BTreeMap<K, Pending<K, P>>;

pub struct WriteQueue<K, P> {
    window: Duration,
    pending: Arc<Mutex<PendingMap<K, P>>>,
    generations: Mutex<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K, P> WriteQueue<K, P>
where
    K: Ord + Clone + Send + std::fmt::Display + 'static,
    P: Coalesce + Clone + Send + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(BTreeMap::new())),
            generations: Mutex::new(0),
        }
    }

    /// Queues `payload` under `key` and (re)arms its timer. The most recent
    /// `flush` wins.
    pub fn schedule(&self, key: K, payload: P, flush: FlushFn<K, P>) {
        let generation = {
            let mut generations = lock(&self.generations);
            *generations += 1;
            *generations
        };

        let mut pending = lock(&self.pending);
        let payload = match pending.remove(&key) {
            Some(previous) => {
                previous.timer.abort();
                debug!(key = %key, "write queue: coalesced pending write");
                let mut merged = previous.payload;
                merged.coalesce(payload);
                merged
            }
            None => payload,
        };

        let timer = tokio::spawn(fire_after(
            Arc::clone(&self.pending),
            key.clone(),
            generation,
            self.window,
        ));
        pending.insert(
            key,
            Pending {
                payload,
                generation,
                timer,
                flush,
            },
        );
    }

    pub fn pending_keys(&self) -> Vec<K> {
        lock(&self.pending).keys().cloned().collect()
    }

    pub fn pending(&self, key: &K) -> Option<P> {
        lock(&self.pending).get(key).map(|entry| entry.payload.clone())
    }

    /// Every queued payload, in key order.
    pub fn snapshot(&self) -> Vec<(K, P)> {
        lock(&self.pending)
            .iter()
            .map(|(key, entry)| (key.clone(), entry.payload.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.pending).is_empty()
    }

    /// Drops the pending write for `key` without flushing it.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.pending).remove(key) {
            Some(entry) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Runs every pending flush now, in key order.
    pub async fn flush_all(&self) {
        let drained = std::mem::take(&mut *lock(&self.pending));
        for (key, entry) in drained {
            entry.timer.abort();
            debug!(key = %key, "write queue: flushing early");
            (entry.flush)(key, entry.payload).await;
        }
    }
}

impl<K, P> Drop for WriteQueue<K, P> {
    fn drop(&mut self) {
        for entry in lock(&self.pending).values() {
            entry.timer.abort();
        }
    }
}

async fn fire_after<K, P>(
    pending: Arc<Mutex<PendingMap<K, P>>>,
    key: K,
    generation: u64,
    window: Duration,
) where
    K: Ord + Clone + Send + std::fmt::Display + 'static,
    P: Send + 'static,
{
    tokio::time::sleep(window).await;
    let entry = {
        let mut guard = lock(&pending);
        match guard.get(&key) {
            Some(entry) if entry.generation == generation => guard.remove(&key),
            _ => None,
        }
    };
    if let Some(entry) = entry {
        debug!(key = %key, "write queue: window elapsed");
        (entry.flush)(key, entry.payload).await;
    }
}

#[cfg(test)]
#[path = "tests/write_queue_tests.rs"]
mod tests;

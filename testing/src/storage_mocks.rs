//! In-memory key-value storage for fast, deterministic tests.
//!
//! [`InMemoryStorage`] implements [`KeyValueStorage`] over a `HashMap` and
//! adds the knobs persistence tests need:
//!
//! - failure injection for reads and writes
//! - an artificial write delay, to widen race windows
//! - a log of every successful write per key
//! - the peak number of concurrent `set` calls, to assert per-key
//!   write serialization

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tasklist_core::storage::{KeyValueStorage, StorageError, StorageFuture};

#[derive(Debug, Default)]
struct Inner {
    data: HashMap<String, String>,
    writes: Vec<(String, String)>,
    fail_reads: Option<StorageError>,
    fail_writes: Option<StorageError>,
    write_delay: Duration,
}

/// In-memory storage adapter for tests and demos.
///
/// Cloning shares the underlying map, so a clone handed to a fresh list
/// store sees everything the previous one wrote (a simulated restart).
///
/// # Example
///
/// ```
/// use tasklist_testing::InMemoryStorage;
/// use tasklist_core::storage::KeyValueStorage;
///
/// # tokio_test::block_on(async {
/// let storage = InMemoryStorage::new();
/// storage.set("@TODOS", "[]".to_string()).await.unwrap();
/// assert_eq!(storage.value("@TODOS").as_deref(), Some("[]"));
/// assert_eq!(storage.write_count(), 1);
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<Inner>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without going through the async API or the write log
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner
            .write()
            .unwrap()
            .data
            .insert(key.into(), value.into());
    }

    /// Current value under `key`
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.inner.read().unwrap().data.get(key).cloned()
    }

    /// Remove everything, as if storage were cleared externally
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.data.clear();
        inner.writes.clear();
    }

    /// Make every subsequent `get` fail with `error` (`None` heals)
    pub fn fail_reads(&self, error: Option<StorageError>) {
        self.inner.write().unwrap().fail_reads = error;
    }

    /// Make every subsequent `set` fail with `error` (`None` heals)
    pub fn fail_writes(&self, error: Option<StorageError>) {
        self.inner.write().unwrap().fail_writes = error;
    }

    /// Delay every `set` by `delay` before it takes effect
    pub fn set_write_delay(&self, delay: Duration) {
        self.inner.write().unwrap().write_delay = delay;
    }

    /// Number of successful writes across all keys
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.read().unwrap().writes.len()
    }

    /// Successful writes to `key`, oldest first
    #[must_use]
    pub fn writes_for(&self, key: &str) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .writes
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Highest number of `set` calls that were running at the same time
    #[must_use]
    pub fn peak_concurrent_writes(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight write counter when a `set` finishes or is dropped
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        Box::pin(async move {
            let inner = self.inner.read().unwrap();
            if let Some(error) = &inner.fail_reads {
                return Err(error.clone());
            }
            Ok(inner.data.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            let _in_flight = InFlight(Arc::clone(&self.in_flight));

            let delay = self.inner.read().unwrap().write_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut inner = self.inner.write().unwrap();
            if let Some(error) = &inner.fail_writes {
                return Err(error.clone());
            }
            inner.data.insert(key.to_string(), value.clone());
            inner.writes.push((key.to_string(), value));
            Ok(())
        })
    }
}

//! Per-key write serialization.
//!
//! Writes for one storage key must never overlap: two concurrent `set`
//! calls could complete out of order and leave an older list in storage.
//! [`Persister`] keeps at most one write in flight and at most one payload
//! waiting. A newer payload replaces the waiting one (the older one would
//! be overwritten immediately anyway), and every caller is answered by the
//! first finished write whose revision covers its own.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tasklist_core::storage::{KeyValueStorage, StorageError};
use tokio::sync::{watch, Mutex};

/// Outcome of one write to storage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteReport {
    /// Revision of the list the written payload was encoded from
    pub revision: u64,
    /// Adapter result
    pub result: Result<(), StorageError>,
}

impl WriteReport {
    /// Whether the write reached storage
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
struct Slot {
    /// Newest payload not yet handed to storage
    pending: Option<(u64, String)>,
    /// Highest revision handed to storage so far
    submitted: u64,
    /// Whether a drain task owns the key
    writing: bool,
}

impl Slot {
    fn newest(&self) -> u64 {
        self.pending
            .as_ref()
            .map_or(self.submitted, |(revision, _)| (*revision).max(self.submitted))
    }
}

/// Serializes writes of one storage key
pub struct Persister {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    window: Duration,
    slot: Mutex<Slot>,
    reports: watch::Sender<Option<WriteReport>>,
}

impl Persister {
    /// Create a writer for `key`
    ///
    /// With a non-zero `window` the writer waits that long before taking the
    /// newest pending payload, so bursts of mutations become one write.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>, window: Duration) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            storage,
            key: key.into(),
            window,
            slot: Mutex::new(Slot::default()),
            reports,
        }
    }

    /// Storage key this writer owns
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Most recently published report
    #[must_use]
    pub fn latest(&self) -> Option<WriteReport> {
        self.reports.borrow().clone()
    }

    /// Submit the list encoded at `revision` and wait for the write covering it
    ///
    /// Returns the report of the first finished write whose revision is at
    /// least `revision`. That may be a newer payload that superseded this one.
    pub async fn persist(self: &Arc<Self>, revision: u64, payload: String) -> WriteReport {
        let reports = self.reports.subscribe();

        let start_writer = {
            let mut slot = self.slot.lock().await;
            if revision > slot.newest() {
                if slot.pending.is_some() {
                    counter!("tasklist.persist.superseded").increment(1);
                }
                slot.pending = Some((revision, payload));
            } else {
                counter!("tasklist.persist.superseded").increment(1);
                tracing::trace!(revision, newest = slot.newest(), "Payload already superseded");
            }

            if slot.writing {
                false
            } else {
                slot.writing = true;
                true
            }
        };

        if start_writer {
            // Detached so a dropped caller cannot strand the key mid-drain.
            tokio::spawn(Arc::clone(self).drain());
        }

        self.wait_for(reports, revision).await
    }

    /// Wait until a write covering `revision` has finished
    pub async fn wait_durable(&self, revision: u64) -> WriteReport {
        let reports = self.reports.subscribe();
        self.wait_for(reports, revision).await
    }

    /// Answer waiters for `revision` with `error` without touching storage
    ///
    /// Used when the payload could not be produced at all.
    pub fn reject(&self, revision: u64, error: StorageError) {
        counter!("tasklist.persist.failures").increment(1);
        self.publish(WriteReport {
            revision,
            result: Err(error),
        });
    }

    async fn drain(self: Arc<Self>) {
        loop {
            {
                let mut slot = self.slot.lock().await;
                if slot.pending.is_none() {
                    slot.writing = false;
                    return;
                }
            }

            if !self.window.is_zero() {
                tokio::time::sleep(self.window).await;
            }

            let next = {
                let mut slot = self.slot.lock().await;
                let next = slot.pending.take();
                if let Some((revision, _)) = &next {
                    slot.submitted = *revision;
                }
                next
            };
            let Some((revision, payload)) = next else {
                continue;
            };

            tracing::debug!(key = %self.key, revision, bytes = payload.len(), "Writing list");
            let result = self.storage.set(&self.key, payload).await;
            match &result {
                Ok(()) => counter!("tasklist.persist.writes").increment(1),
                Err(error) => {
                    counter!("tasklist.persist.failures").increment(1);
                    tracing::warn!(key = %self.key, revision, error = %error, "Write failed");
                },
            }

            self.publish(WriteReport { revision, result });
        }
    }

    fn publish(&self, report: WriteReport) {
        self.reports.send_if_modified(|current| {
            let newer = current
                .as_ref()
                .is_none_or(|existing| existing.revision < report.revision);
            if newer {
                *current = Some(report);
            }
            newer
        });
    }

    async fn wait_for(
        &self,
        mut reports: watch::Receiver<Option<WriteReport>>,
        revision: u64,
    ) -> WriteReport {
        let outcome = reports
            .wait_for(|report| report.as_ref().is_some_and(|r| r.revision >= revision))
            .await
            .map(|report| report.clone());

        match outcome {
            Ok(Some(report)) => report,
            _ => WriteReport {
                revision,
                result: Err(StorageError::Unavailable("writer stopped".to_string())),
            },
        }
    }
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("key", &self.key)
            .field("window", &self.window)
            .field("latest", &self.latest())
            .finish_non_exhaustive()
    }
}

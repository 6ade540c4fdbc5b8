//! The list store facade used by the presentation layer.
//!
//! [`ListStore`] wraps the runtime [`Store`] with typed operations. Each
//! command is reduced under the store's write lock and its outcome is read
//! back under the same lock, so concurrent callers never see each other's
//! results. Under the eager sync strategy a command then waits for the write
//! covering it before returning.

use crate::config::ListConfig;
use crate::error::ListError;
use crate::persister::Persister;
use crate::reducer::{ListEnvironment, ListReducer};
use crate::types::{
    Disposition, Item, ListAction, ListSnapshot, ListState, LoadOutcome, WriteStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tasklist_core::storage::KeyValueStorage;
use tasklist_runtime::Store;
use tokio::sync::watch;

type Runtime = Store<ListState, ListAction, ListEnvironment, ListReducer>;

/// Result of a mutation command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The list changed
    Applied {
        /// State right after the mutation
        snapshot: ListSnapshot,
        /// Whether the mutation reached storage
        write: WriteStatus,
    },
    /// Held until the initial load completes
    Queued {
        /// One-based position in the pending queue
        position: usize,
    },
    /// Blank title; nothing changed
    Ignored,
}

impl CommandOutcome {
    /// Snapshot after the mutation, if it was applied
    #[must_use]
    pub const fn snapshot(&self) -> Option<&ListSnapshot> {
        match self {
            Self::Applied { snapshot, .. } => Some(snapshot),
            Self::Queued { .. } | Self::Ignored => None,
        }
    }

    /// Whether the mutation was applied and written
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        matches!(
            self,
            Self::Applied {
                write: WriteStatus::Durable,
                ..
            }
        )
    }
}

/// Task list with durable persistence
///
/// Cheap to clone; clones share the same list.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tasklist::{ListConfig, ListStore};
/// use tasklist_testing::InMemoryStorage;
///
/// # tokio_test::block_on(async {
/// let list = ListStore::new(Arc::new(InMemoryStorage::new()), ListConfig::default())?;
/// list.load().await?;
/// list.add("Buy milk").await?;
/// list.add("Call mom").await?;
/// list.toggle_done(0).await?;
///
/// assert_eq!(list.outstanding_count().await, 1);
/// # Ok::<(), tasklist::ListError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct ListStore {
    store: Runtime,
    persister: Arc<Persister>,
    config: Arc<ListConfig>,
}

impl ListStore {
    /// Create a store over `storage`; nothing is read until [`ListStore::load`]
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Config`] if `config` fails [`ListConfig::validate`].
    pub fn new(storage: Arc<dyn KeyValueStorage>, config: ListConfig) -> Result<Self, ListError> {
        config.validate()?;
        let environment = ListEnvironment::new(storage, config);
        let persister = Arc::clone(&environment.persister);
        let config = Arc::clone(&environment.config);
        let store = Store::new(ListState::new(), ListReducer::new(), environment);
        Ok(Self {
            store,
            persister,
            config,
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Read the persisted list
    ///
    /// Unreadable or corrupt data is not an error: the list starts empty and
    /// the reason is reported in [`LoadOutcome::Recovered`]. Commands queued
    /// before the load are replayed once it completes.
    ///
    /// # Errors
    ///
    /// - [`ListError::AlreadyLoaded`] if a load already ran or is running
    /// - [`ListError::Store`] if the store is shutting down
    #[tracing::instrument(skip(self), fields(key = %self.config.storage_key))]
    pub async fn load(&self) -> Result<LoadOutcome, ListError> {
        let (mut handle, disposition) = self
            .store
            .send_then(ListAction::Load, |state| state.last_disposition.clone())
            .await?;

        if let Some(Disposition::Rejected(error)) = disposition {
            return Err(error);
        }

        handle.wait().await;

        self.store
            .state(|state| state.load_outcome.clone())
            .await
            .ok_or_else(|| ListError::CorruptState("load finished without an outcome".to_string()))
    }

    /// Add an item with the given title
    ///
    /// The title is stored as given; a blank title is [`CommandOutcome::Ignored`].
    ///
    /// # Errors
    ///
    /// - [`ListError::TitleTooLong`] if the title exceeds the configured limit
    /// - [`ListError::NotReady`] before load under the reject policy
    /// - [`ListError::Store`] if the store is shutting down
    #[tracing::instrument(skip(self, title))]
    pub async fn add(&self, title: impl Into<String>) -> Result<CommandOutcome, ListError> {
        self.dispatch(ListAction::Add {
            title: title.into(),
        })
        .await
    }

    /// Flip the done flag of the item at `index`
    ///
    /// # Errors
    ///
    /// - [`ListError::IndexOutOfRange`] if `index` is past the end
    /// - [`ListError::NotReady`] before load under the reject policy
    /// - [`ListError::Store`] if the store is shutting down
    #[tracing::instrument(skip(self))]
    pub async fn toggle_done(&self, index: usize) -> Result<CommandOutcome, ListError> {
        self.dispatch(ListAction::ToggleDone { index }).await
    }

    /// Remove the item at `index`
    ///
    /// # Errors
    ///
    /// - [`ListError::IndexOutOfRange`] if `index` is past the end
    /// - [`ListError::NotReady`] before load under the reject policy
    /// - [`ListError::Store`] if the store is shutting down
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, index: usize) -> Result<CommandOutcome, ListError> {
        self.dispatch(ListAction::Delete { index }).await
    }

    async fn dispatch(&self, action: ListAction) -> Result<CommandOutcome, ListError> {
        let (mut handle, (disposition, snapshot)) = self
            .store
            .send_then(action, |state| {
                (state.last_disposition.clone(), state.snapshot())
            })
            .await?;

        match disposition {
            Some(Disposition::Applied { revision }) => {
                let write = if self.config.sync.is_eager() {
                    handle.wait().await;
                    self.store.state(|state| state.write_status(revision)).await
                } else {
                    WriteStatus::Scheduled
                };
                Ok(CommandOutcome::Applied { snapshot, write })
            },
            Some(Disposition::Queued { position }) => Ok(CommandOutcome::Queued { position }),
            Some(Disposition::Ignored) => Ok(CommandOutcome::Ignored),
            Some(Disposition::Rejected(error)) => Err(error),
            None => Err(ListError::CorruptState(
                "command finished without a disposition".to_string(),
            )),
        }
    }

    /// Current read model
    pub async fn snapshot(&self) -> ListSnapshot {
        self.store.state(ListState::snapshot).await
    }

    /// Items in display order
    pub async fn items(&self) -> Vec<Item> {
        self.store
            .state(|state| state.items.as_slice().to_vec())
            .await
    }

    /// Number of items not yet done
    pub async fn outstanding_count(&self) -> usize {
        self.store.state(ListState::outstanding).await
    }

    /// Whether the initial load has completed
    pub async fn is_ready(&self) -> bool {
        self.store.state(ListState::is_ready).await
    }

    /// Observe state changes
    #[must_use]
    pub fn subscribe(&self) -> ListSubscription {
        ListSubscription {
            changes: self.store.subscribe_changes(),
            store: self.store.clone(),
        }
    }

    /// Wait until the latest in-memory revision has been written (or failed)
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Storage`] if the covering write failed.
    #[tracing::instrument(skip(self), fields(key = %self.persister.key()))]
    pub async fn flush(&self) -> Result<(), ListError> {
        let revision = self.store.state(|state| state.revision).await;
        if revision == 0 {
            return Ok(());
        }
        self.persister.wait_durable(revision).await.result?;
        Ok(())
    }

    /// Flush pending writes, then stop accepting commands
    ///
    /// # Errors
    ///
    /// - [`ListError::Storage`] if the final write failed
    /// - [`ListError::Store`] if effects are still running after `timeout`
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ListError> {
        let flushed = match tokio::time::timeout(timeout, self.flush()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(?timeout, "Flush did not finish before shutdown timeout");
                Ok(())
            },
        };
        self.store.shutdown(timeout).await?;
        flushed
    }
}

impl std::fmt::Debug for ListStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListStore")
            .field("config", &self.config)
            .field("persister", &self.persister)
            .finish_non_exhaustive()
    }
}

/// Stream of snapshots, one per observed state change
///
/// Slow consumers skip intermediate states but always see the latest one.
pub struct ListSubscription {
    changes: watch::Receiver<u64>,
    store: Runtime,
}

impl ListSubscription {
    /// Wait for the next change and return the state after it
    ///
    /// Returns `None` if the change feed has closed.
    pub async fn changed(&mut self) -> Option<ListSnapshot> {
        self.changes.changed().await.ok()?;
        Some(self.store.state(ListState::snapshot).await)
    }

    /// State right now, without waiting
    pub async fn current(&self) -> ListSnapshot {
        self.store.state(ListState::snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncStrategy;
    use tasklist_core::storage::StorageError;
    use tasklist_testing::InMemoryStorage;

    fn store_over(storage: &InMemoryStorage) -> ListStore {
        ListStore::new(Arc::new(storage.clone()), ListConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn eager_commands_are_durable_on_return() {
        let storage = InMemoryStorage::new();
        let list = store_over(&storage);
        assert_eq!(list.load().await.unwrap(), LoadOutcome::Empty);

        let outcome = list.add("Buy milk").await.unwrap();
        assert!(outcome.is_durable());
        assert_eq!(outcome.snapshot().map(|s| s.outstanding), Some(1));
        assert_eq!(
            storage.value("@TODOS").as_deref(),
            Some(r#"[{"title":"Buy milk","done":false}]"#)
        );
    }

    #[test]
    fn invalid_config_is_refused() {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(InMemoryStorage::new());
        for config in [
            ListConfig::default().with_storage_key(""),
            ListConfig::default().with_max_title_len(0),
        ] {
            assert!(matches!(
                ListStore::new(Arc::clone(&storage), config),
                Err(ListError::Config(_))
            ));
        }
    }

    #[tokio::test]
    async fn blank_add_is_ignored() {
        let storage = InMemoryStorage::new();
        let list = store_over(&storage);
        list.load().await.unwrap();

        assert_eq!(list.add("   ").await.unwrap(), CommandOutcome::Ignored);
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn out_of_range_is_an_error() {
        let list = store_over(&InMemoryStorage::new());
        list.load().await.unwrap();
        list.add("only").await.unwrap();

        assert_eq!(
            list.delete(1).await,
            Err(ListError::IndexOutOfRange { index: 1, len: 1 })
        );
        assert_eq!(list.items().await.len(), 1);
    }

    #[tokio::test]
    async fn load_twice_is_rejected() {
        let list = store_over(&InMemoryStorage::new());
        list.load().await.unwrap();
        assert_eq!(list.load().await, Err(ListError::AlreadyLoaded));
    }

    #[tokio::test]
    async fn write_failure_is_reported_not_fatal() {
        let storage = InMemoryStorage::new();
        let list = store_over(&storage);
        list.load().await.unwrap();

        storage.fail_writes(Some(StorageError::Backend("quota".to_string())));
        let outcome = list.add("kept in memory").await.unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Applied {
                snapshot: list.snapshot().await,
                write: WriteStatus::Failed(StorageError::Backend("quota".to_string())),
            }
        );
        assert!(list.flush().await.is_err());
        assert_eq!(list.outstanding_count().await, 1);
    }

    #[tokio::test]
    async fn batched_commands_return_scheduled() {
        let storage = InMemoryStorage::new();
        let config = ListConfig::default().with_sync(SyncStrategy::Batched {
            window: Duration::from_millis(20),
        });
        let list = ListStore::new(Arc::new(storage.clone()), config).unwrap();
        list.load().await.unwrap();

        let outcome = list.add("later").await.unwrap();
        assert!(matches!(
            outcome,
            CommandOutcome::Applied {
                write: WriteStatus::Scheduled,
                ..
            }
        ));

        list.flush().await.unwrap();
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_flushes_and_rejects_new_commands() {
        let storage = InMemoryStorage::new();
        let list = store_over(&storage);
        list.load().await.unwrap();
        list.add("last one").await.unwrap();

        list.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(matches!(list.add("too late").await, Err(ListError::Store(_))));
        assert_eq!(storage.writes_for("@TODOS").len(), 1);
    }
}

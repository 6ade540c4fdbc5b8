//! Reducer logic for the task list.
//!
//! Commands mutate the in-memory list synchronously and return a persist
//! effect carrying the whole list encoded at the new revision. The effect
//! hands the payload to the [`Persister`], which serializes writes for the
//! key, and feeds the outcome back as a `Persisted` or `PersistFailed`
//! event. The load command works the same way: its effect reads and
//! decodes the stored list and feeds back `Loaded`.

use crate::codec;
use crate::config::{InsertionPolicy, ListConfig, PendingPolicy, ReorderPolicy};
use crate::error::ListError;
use crate::persister::{Persister, WriteReport};
use crate::types::{Disposition, Item, ItemList, ListAction, ListState, LoadOutcome, LoadPhase};
use std::sync::Arc;
use tasklist_core::{
    effect::Effect,
    reducer::Reducer,
    smallvec,
    storage::{KeyValueStorage, StorageError},
    SmallVec,
};

/// Environment dependencies for the list reducer
#[derive(Clone)]
pub struct ListEnvironment {
    /// Adapter the list is read from
    pub storage: Arc<dyn KeyValueStorage>,
    /// Serialized writer for the list key
    pub persister: Arc<Persister>,
    /// Policies
    pub config: Arc<ListConfig>,
}

impl ListEnvironment {
    /// Creates a new `ListEnvironment` with a writer for the configured key
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>, config: ListConfig) -> Self {
        let persister = Arc::new(Persister::new(
            Arc::clone(&storage),
            config.storage_key.clone(),
            config.sync.window(),
        ));
        Self {
            storage,
            persister,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for ListEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListEnvironment")
            .field("persister", &self.persister)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Reducer for the task list
#[derive(Clone, Debug, Default)]
pub struct ListReducer;

impl ListReducer {
    /// Creates a new `ListReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks a title before it is added or queued
    ///
    /// Returns `Ok(false)` for a blank title. The title is stored as given;
    /// trimming only decides whether it is blank.
    fn check_title(title: &str, config: &ListConfig) -> Result<bool, ListError> {
        if title.trim().is_empty() {
            return Ok(false);
        }

        if let Some(max) = config.max_title_len {
            let len = title.chars().count();
            if len > max {
                return Err(ListError::TitleTooLong { len, max });
            }
        }
        Ok(true)
    }

    /// Applies a mutation to a ready list
    ///
    /// Returns `Ok(false)` when the command was a no-op (blank title).
    fn apply(items: &mut ItemList, action: ListAction, config: &ListConfig) -> Result<bool, ListError> {
        match action {
            ListAction::Add { title } => {
                if !Self::check_title(&title, config)? {
                    return Ok(false);
                }

                let item = Item::new(title);
                match config.insertion {
                    InsertionPolicy::Append => items.push(item),
                    InsertionPolicy::Prepend => items.push_front(item),
                }
                Ok(true)
            },

            ListAction::ToggleDone { index } => {
                items.toggle(index)?;
                if config.reorder == ReorderPolicy::Partition {
                    items.partition_outstanding_first();
                }
                Ok(true)
            },

            ListAction::Delete { index } => {
                items.remove(index)?;
                Ok(true)
            },

            ListAction::Load
            | ListAction::Loaded { .. }
            | ListAction::Persisted { .. }
            | ListAction::PersistFailed { .. } => Ok(false),
        }
    }

    /// Reports a failed mutation the way its cause deserves
    fn log_rejection(action: &str, error: &ListError) {
        match error {
            ListError::IndexOutOfRange { index, len } => {
                tracing::error!(action, index, len, "Index out of range");
            },
            other => tracing::warn!(action, error = %other, "Command rejected"),
        }
    }

    /// Queues or refuses a command that arrived before the list is ready
    ///
    /// Titles are checked before queueing. Index checks wait for the loaded
    /// list.
    fn hold(state: &mut ListState, command: ListAction, config: &ListConfig) -> Disposition {
        if config.pending == PendingPolicy::Reject {
            return Disposition::Rejected(ListError::NotReady);
        }

        if let ListAction::Add { title } = &command {
            match Self::check_title(title, config) {
                Ok(true) => {},
                Ok(false) => return Disposition::Ignored,
                Err(error) => {
                    Self::log_rejection(command_name(&command), &error);
                    return Disposition::Rejected(error);
                },
            }
        }

        state.pending.push_back(command);
        Disposition::Queued {
            position: state.pending.len(),
        }
    }

    /// Bumps the revision after a successful mutation
    fn commit(state: &mut ListState) -> u64 {
        state.revision += 1;
        state.revision
    }

    /// Effect writing the list as of the current revision
    fn persist(state: &ListState, env: &ListEnvironment) -> Effect<ListAction> {
        let revision = state.revision;
        let encoded = codec::encode(state.items.as_slice());
        let persister = Arc::clone(&env.persister);

        Effect::future(async move {
            let report = match encoded {
                Ok(payload) => persister.persist(revision, payload).await,
                Err(error) => {
                    let error = StorageError::Backend(error.to_string());
                    persister.reject(revision, error.clone());
                    WriteReport {
                        revision,
                        result: Err(error),
                    }
                },
            };

            Some(match report.result {
                Ok(()) => ListAction::Persisted {
                    revision: report.revision,
                },
                Err(error) => ListAction::PersistFailed {
                    revision: report.revision,
                    error,
                },
            })
        })
    }

    /// Effect reading and decoding the stored list
    fn load(env: &ListEnvironment) -> Effect<ListAction> {
        let storage = Arc::clone(&env.storage);
        let key = env.config.storage_key.clone();
        let legacy_key = env.config.legacy_count_key.clone();

        Effect::future(async move {
            let (items, outcome) = match storage.get(&key).await {
                Ok(None) => (Vec::new(), LoadOutcome::Empty),
                Ok(Some(payload)) => match codec::decode(&payload) {
                    Ok(items) => {
                        let restored = items.len();
                        (items, LoadOutcome::Restored { items: restored })
                    },
                    Err(reason) => {
                        tracing::warn!(key = %key, error = %reason, "Stored list is corrupt, starting empty");
                        (Vec::new(), LoadOutcome::Recovered { reason })
                    },
                },
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Could not read stored list, starting empty");
                    (
                        Vec::new(),
                        LoadOutcome::Recovered {
                            reason: ListError::Storage(error),
                        },
                    )
                },
            };

            if let Some(legacy_key) = legacy_key {
                check_legacy_count(storage.as_ref(), &legacy_key, &items).await;
            }

            Some(ListAction::Loaded { items, outcome })
        })
    }
}

/// Warns when a separately stored count disagrees with the restored list
async fn check_legacy_count(storage: &dyn KeyValueStorage, key: &str, items: &[Item]) {
    let derived = items.iter().filter(|item| !item.done).count();
    match storage.get(key).await {
        Ok(Some(payload)) => match codec::decode_legacy_count(&payload) {
            Some(stored) if stored != derived => {
                tracing::warn!(key, stored, derived, "Stored count drifted from list, ignoring it");
            },
            Some(_) => {},
            None => tracing::warn!(key, payload = %payload, "Stored count is not a number, ignoring it"),
        },
        Ok(None) => {},
        Err(error) => tracing::debug!(key, error = %error, "Could not read stored count"),
    }
}

impl Reducer for ListReducer {
    type State = ListState;
    type Action = ListAction;
    type Environment = ListEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        tracing::debug!(?action, revision = state.revision, "Reducing list action");

        match action {
            // ========== Commands ==========
            ListAction::Load => {
                if state.phase != LoadPhase::Unloaded {
                    state.last_disposition = Some(Disposition::Rejected(ListError::AlreadyLoaded));
                    return SmallVec::new();
                }

                state.phase = LoadPhase::Loading;
                state.last_disposition = None;
                smallvec![Self::load(env)]
            },

            command @ (ListAction::Add { .. }
            | ListAction::ToggleDone { .. }
            | ListAction::Delete { .. }) => {
                if !state.is_ready() {
                    state.last_disposition = Some(Self::hold(state, command, &env.config));
                    return SmallVec::new();
                }

                let name = command_name(&command);
                match Self::apply(&mut state.items, command, &env.config) {
                    Ok(true) => {
                        let revision = Self::commit(state);
                        state.last_disposition = Some(Disposition::Applied { revision });
                        smallvec![Self::persist(state, env)]
                    },
                    Ok(false) => {
                        state.last_disposition = Some(Disposition::Ignored);
                        SmallVec::new()
                    },
                    Err(error) => {
                        Self::log_rejection(name, &error);
                        state.last_disposition = Some(Disposition::Rejected(error));
                        SmallVec::new()
                    },
                }
            },

            // ========== Events ==========
            ListAction::Loaded { items, outcome } => {
                if state.phase != LoadPhase::Loading {
                    tracing::warn!(phase = ?state.phase, "Load result arrived outside loading phase, ignoring");
                    return SmallVec::new();
                }

                tracing::info!(?outcome, items = items.len(), queued = state.pending.len(), "List loaded");
                state.items = ItemList::from(items);
                state.phase = LoadPhase::Ready;
                state.load_outcome = Some(outcome);

                let mut changed = false;
                while let Some(command) = state.pending.pop_front() {
                    let name = command_name(&command);
                    match Self::apply(&mut state.items, command, &env.config) {
                        Ok(true) => {
                            Self::commit(state);
                            changed = true;
                        },
                        Ok(false) => {},
                        Err(error) => Self::log_rejection(name, &error),
                    }
                }

                if changed {
                    smallvec![Self::persist(state, env)]
                } else {
                    SmallVec::new()
                }
            },

            ListAction::Persisted { revision } => {
                state.record_write(&WriteReport {
                    revision,
                    result: Ok(()),
                });
                SmallVec::new()
            },

            ListAction::PersistFailed { revision, error } => {
                state.record_write(&WriteReport {
                    revision,
                    result: Err(error),
                });
                SmallVec::new()
            },
        }
    }
}

const fn command_name(action: &ListAction) -> &'static str {
    match action {
        ListAction::Load => "load",
        ListAction::Add { .. } => "add",
        ListAction::ToggleDone { .. } => "toggle_done",
        ListAction::Delete { .. } => "delete",
        ListAction::Loaded { .. } => "loaded",
        ListAction::Persisted { .. } => "persisted",
        ListAction::PersistFailed { .. } => "persist_failed",
    }
}

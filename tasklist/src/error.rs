//! Error type for list store operations.

use tasklist_core::storage::StorageError;
use tasklist_runtime::StoreError;
use thiserror::Error;

/// Errors returned by the list store.
///
/// Only [`ListError::IndexOutOfRange`] signals a bug in the caller. Corrupt
/// state and storage failures are recovered from locally and reported for
/// information; they never poison the in-memory list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    /// Persisted data could not be decoded into a valid item list.
    #[error("Persisted list is corrupt: {0}")]
    CorruptState(String),

    /// A mutation arrived before the initial load completed and the store
    /// is configured to reject rather than queue.
    #[error("List store is not ready: initial load has not completed")]
    NotReady,

    /// The caller addressed a position that does not exist.
    #[error("Index {index} out of range for list of {len} items")]
    IndexOutOfRange {
        /// Requested position.
        index: usize,
        /// Length of the list at the time of the request.
        len: usize,
    },

    /// The title exceeds the configured maximum length.
    #[error("Title too long ({len} characters, max {max})")]
    TitleTooLong {
        /// Length of the title in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// `load()` was called while a load is running or after it finished.
    #[error("List store is already loaded")]
    AlreadyLoaded,

    /// The storage adapter failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The runtime store refused the action.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

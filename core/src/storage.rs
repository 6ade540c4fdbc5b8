//! Durable key-value storage trait and related types.
//!
//! The list store never talks to a concrete database. It persists through the
//! [`KeyValueStorage`] adapter: an asynchronous `get`/`set` service addressed
//! by string keys and storing only string values.
//!
//! # Guarantees
//!
//! The adapter promises nothing beyond single-key reads and writes:
//!
//! - No transactions
//! - No atomicity across keys
//! - No ordering between concurrent `set` calls for the same key
//!
//! Callers that need ordered writes (the list store does) serialize them
//! per key themselves.
//!
//! # Implementations
//!
//! - `InMemoryStorage` (in `tasklist-testing`): `HashMap` backed, with failure
//!   injection for tests and demos
//!
//! # Example
//!
//! ```no_run
//! use tasklist_core::storage::{KeyValueStorage, StorageError};
//!
//! async fn example<S: KeyValueStorage>(storage: &S) -> Result<(), StorageError> {
//!     storage.set("@TODOS", "[]".to_string()).await?;
//!     let value = storage.get("@TODOS").await?;
//!     assert_eq!(value.as_deref(), Some("[]"));
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`KeyValueStorage`] methods.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Errors that can occur during storage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend cannot be reached at all.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    ///
    /// Timeouts are the adapter's concern; callers only see this variant.
    #[error("Storage operation timed out for key {key}")]
    Timeout {
        /// Key of the operation that timed out.
        key: String,
    },

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Asynchronous string key-value store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the list store shares one adapter
/// between its reducer environment and the background writer.
///
/// # Dyn Compatibility
///
/// Methods return [`StorageFuture`] instead of using `async fn` so the trait
/// can be used as `Arc<dyn KeyValueStorage>` inside effects.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet. An absent key is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend fails or times out.
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend fails or times out. The
    /// previous value may or may not have been replaced in that case.
    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()>;
}

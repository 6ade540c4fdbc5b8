//! # Tasklist Testing
//!
//! Testing utilities and helpers for the tasklist workspace.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - [`assertions`]: Effect assertion helpers
//! - [`InMemoryStorage`]: A `KeyValueStorage` adapter with failure injection,
//!   write latency and a write log
//!
//! ## Example
//!
//! ```ignore
//! use tasklist_testing::InMemoryStorage;
//! use std::sync::Arc;
//!
//! #[tokio::test]
//! async fn survives_restart() {
//!     let storage = Arc::new(InMemoryStorage::new());
//!     let list = ListStore::new(storage.clone(), ListConfig::default())?;
//!     list.load().await?;
//!     list.add("Buy milk").await?;
//!
//!     let reopened = ListStore::new(storage, ListConfig::default())?;
//!     reopened.load().await?;
//!     assert_eq!(reopened.items().await.len(), 1);
//! }
//! ```

/// Given-When-Then testing for reducers
pub mod reducer_test;

/// In-memory key-value storage for tests
pub mod storage_mocks;

// Re-export commonly used items
pub use reducer_test::{assertions, ReducerTest};
pub use storage_mocks::InMemoryStorage;

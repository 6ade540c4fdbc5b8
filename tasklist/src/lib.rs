//! Personal task list with durable persistence.
//!
//! A task list is an ordered sequence of items, each a title and a done
//! flag. Users add items, mark them done or undone, and delete them; a
//! running count of outstanding items is always derived from the list
//! itself, never stored beside it. The whole list is written to a
//! key-value storage adapter after every change, one write at a time per
//! key, so the stored list always converges to the latest in-memory state.
//!
//! The crate is built on the reducer architecture:
//!
//! - [`ListReducer`] applies commands to [`ListState`] and returns effects
//! - [`Persister`] serializes writes for the list key
//! - [`ListStore`] is the facade the presentation layer talks to
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tasklist::{ListConfig, ListStore};
//! # use tasklist_core::storage::KeyValueStorage;
//!
//! # async fn example(storage: Arc<dyn KeyValueStorage>) -> Result<(), tasklist::ListError> {
//! let list = ListStore::new(storage, ListConfig::from_env()?)?;
//! list.load().await?;
//!
//! list.add("Buy milk").await?;
//! list.add("Call mom").await?;
//! list.toggle_done(0).await?;
//!
//! let snapshot = list.snapshot().await;
//! println!("{} outstanding", snapshot.outstanding);
//! for item in &snapshot.items {
//!     println!("[{}] {}", if item.done { "x" } else { " " }, item.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod persister;
pub mod reducer;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{InsertionPolicy, ListConfig, PendingPolicy, ReorderPolicy, SyncStrategy};
pub use error::ListError;
pub use persister::{Persister, WriteReport};
pub use reducer::{ListEnvironment, ListReducer};
pub use store::{CommandOutcome, ListStore, ListSubscription};
pub use types::{
    Disposition, Item, ItemList, ListAction, ListSnapshot, ListState, LoadOutcome, LoadPhase,
    WriteStatus,
};

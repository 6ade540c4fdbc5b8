//! Domain types for the task list.
//!
//! A task list is an ordered sequence of items, each a title and a done
//! flag. Items have no identity beyond their position, and the outstanding
//! count is always derived from the list rather than stored next to it.

use crate::error::ListError;
use crate::persister::WriteReport;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tasklist_core::storage::StorageError;

/// A single task
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// What needs doing, as typed; never blank
    pub title: String,
    /// Whether the task is finished
    pub done: bool,
}

impl Item {
    /// Creates a new, not yet done item
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            done: false,
        }
    }
}

/// Ordered collection of items owned by the list state
///
/// Serializes as a plain array of items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemList(Vec<Item>);

impl ItemList {
    /// Creates an empty list
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Item at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.0.get(index)
    }

    /// Items in order
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.0.iter()
    }

    /// Items as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[Item] {
        &self.0
    }

    /// Number of items not yet done
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.0.iter().filter(|item| !item.done).count()
    }

    /// Appends an item
    pub fn push(&mut self, item: Item) {
        self.0.push(item);
    }

    /// Inserts an item at the front
    pub fn push_front(&mut self, item: Item) {
        self.0.insert(0, item);
    }

    /// Flips the done flag at `index`, returning the new value
    ///
    /// # Errors
    ///
    /// Returns [`ListError::IndexOutOfRange`] if `index` is past the end.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ListError> {
        let len = self.0.len();
        let item = self
            .0
            .get_mut(index)
            .ok_or(ListError::IndexOutOfRange { index, len })?;
        item.done = !item.done;
        Ok(item.done)
    }

    /// Removes and returns the item at `index`; later items shift down by one
    ///
    /// # Errors
    ///
    /// Returns [`ListError::IndexOutOfRange`] if `index` is past the end.
    pub fn remove(&mut self, index: usize) -> Result<Item, ListError> {
        if index >= self.0.len() {
            return Err(ListError::IndexOutOfRange {
                index,
                len: self.0.len(),
            });
        }
        Ok(self.0.remove(index))
    }

    /// Stable partition: outstanding items first, then done items
    ///
    /// Relative order inside each group is preserved.
    pub fn partition_outstanding_first(&mut self) {
        let (mut open, done): (Vec<Item>, Vec<Item>) =
            self.0.drain(..).partition(|item| !item.done);
        open.extend(done);
        self.0 = open;
    }
}

impl From<Vec<Item>> for ItemList {
    fn from(items: Vec<Item>) -> Self {
        Self(items)
    }
}

impl From<ItemList> for Vec<Item> {
    fn from(list: ItemList) -> Self {
        list.0
    }
}

impl<'a> IntoIterator for &'a ItemList {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Read model handed to the presentation layer
///
/// Always an owned copy; holding a snapshot never blocks the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ListSnapshot {
    /// Items in display order
    pub items: Vec<Item>,
    /// Number of items not yet done
    pub outstanding: usize,
    /// Whether the initial load has completed
    pub ready: bool,
    /// In-memory revision the snapshot was taken at
    pub revision: u64,
}

/// Load lifecycle of the list state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadPhase {
    /// `load()` has not been called yet
    #[default]
    Unloaded,
    /// The read from storage is in flight
    Loading,
    /// Loaded (or recovered to empty); mutations are applied directly
    Ready,
}

/// Result of the initial load
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was stored under the list key
    Empty,
    /// The stored list was decoded
    Restored {
        /// Number of items restored
        items: usize,
    },
    /// Stored data was unreadable; the list starts empty
    Recovered {
        /// Why the stored data was discarded
        reason: ListError,
    },
}

/// Durability of a command's mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    /// A write covering this mutation reached storage
    Durable,
    /// The write covering this mutation failed; the next mutation retries
    Failed(StorageError),
    /// A coalesced write will pick this mutation up
    Scheduled,
}

/// What the reducer did with the most recent command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// The mutation was applied, producing `revision`
    Applied {
        /// Revision after the mutation
        revision: u64,
    },
    /// Stored until the initial load completes
    Queued {
        /// One-based position in the pending queue
        position: usize,
    },
    /// Blank title; nothing changed
    Ignored,
    /// Nothing changed because of `ListError`
    Rejected(ListError),
}

/// State of the task list
#[derive(Clone, Debug, Default)]
pub struct ListState {
    /// The canonical ordered list
    pub items: ItemList,
    /// Load lifecycle
    pub phase: LoadPhase,
    /// Commands received before the initial load completed, oldest first
    pub pending: VecDeque<ListAction>,
    /// Bumped on every in-memory mutation
    pub revision: u64,
    /// Highest revision confirmed written to storage
    pub durable_revision: u64,
    /// Most recent failed write newer than `durable_revision`
    pub last_write_error: Option<(u64, StorageError)>,
    /// Outcome of the most recent command
    pub last_disposition: Option<Disposition>,
    /// Outcome of the initial load, once it finished
    pub load_outcome: Option<LoadOutcome>,
}

impl ListState {
    /// Creates an unloaded, empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ready state holding `items`
    #[must_use]
    pub fn ready(items: Vec<Item>) -> Self {
        Self {
            items: ItemList::from(items),
            phase: LoadPhase::Ready,
            ..Self::default()
        }
    }

    /// Whether the initial load has completed
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase == LoadPhase::Ready
    }

    /// Number of items not yet done
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.items.outstanding()
    }

    /// Owned read model of the current state
    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            items: self.items.as_slice().to_vec(),
            outstanding: self.items.outstanding(),
            ready: self.is_ready(),
            revision: self.revision,
        }
    }

    /// Durability of the mutation that produced `revision`
    #[must_use]
    pub fn write_status(&self, revision: u64) -> WriteStatus {
        if self.durable_revision >= revision {
            return WriteStatus::Durable;
        }
        match &self.last_write_error {
            Some((failed, error)) if *failed >= revision => WriteStatus::Failed(error.clone()),
            _ => WriteStatus::Scheduled,
        }
    }

    /// Records the outcome of a finished write
    pub fn record_write(&mut self, report: &WriteReport) {
        match &report.result {
            Ok(()) => {
                self.durable_revision = self.durable_revision.max(report.revision);
                if matches!(self.last_write_error, Some((failed, _)) if failed <= report.revision) {
                    self.last_write_error = None;
                }
            },
            Err(error) => {
                let newer = self
                    .last_write_error
                    .as_ref()
                    .is_none_or(|(failed, _)| *failed < report.revision);
                if report.revision > self.durable_revision && newer {
                    self.last_write_error = Some((report.revision, error.clone()));
                }
            },
        }
    }
}

/// Commands and events for the task list
///
/// Commands come from the presentation layer (or from `load()`); events are
/// produced by effects and fed back through the reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListAction {
    // ========== Commands ==========
    /// Command: read the persisted list
    Load,

    /// Command: add an item
    Add {
        /// Title as typed; a blank title is a no-op
        title: String,
    },

    /// Command: flip the done flag of the item at `index`
    ToggleDone {
        /// Position in the current list
        index: usize,
    },

    /// Command: remove the item at `index`
    Delete {
        /// Position in the current list
        index: usize,
    },

    // ========== Events ==========
    /// Event: the persisted list was read
    Loaded {
        /// Decoded items (empty when nothing usable was stored)
        items: Vec<Item>,
        /// What the read found
        outcome: LoadOutcome,
    },

    /// Event: a write covering `revision` reached storage
    Persisted {
        /// Revision the written payload was encoded from
        revision: u64,
    },

    /// Event: the write covering `revision` failed
    PersistFailed {
        /// Revision the failed payload was encoded from
        revision: u64,
        /// Adapter failure
        error: StorageError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[(&str, bool)]) -> ItemList {
        ItemList::from(
            entries
                .iter()
                .map(|(title, done)| Item {
                    title: (*title).to_string(),
                    done: *done,
                })
                .collect::<Vec<_>>(),
        )
    }

    fn titles(list: &ItemList) -> Vec<&str> {
        list.iter().map(|item| item.title.as_str()).collect()
    }

    #[test]
    fn outstanding_counts_not_done() {
        let items = list(&[("a", false), ("b", true), ("c", false)]);
        assert_eq!(items.outstanding(), 2);
        assert_eq!(ItemList::new().outstanding(), 0);
    }

    #[test]
    fn toggle_flips_and_reports() {
        let mut items = list(&[("a", false)]);
        assert_eq!(items.toggle(0), Ok(true));
        assert_eq!(items.toggle(0), Ok(false));
        assert_eq!(
            items.toggle(1),
            Err(ListError::IndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn remove_shifts_later_items() {
        let mut items = list(&[("a", false), ("b", true), ("c", false)]);
        let removed = items.remove(1);
        assert_eq!(removed.map(|item| item.title), Ok("b".to_string()));
        assert_eq!(titles(&items), vec!["a", "c"]);
        assert!(matches!(
            items.remove(2),
            Err(ListError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn partition_is_stable() {
        let mut items = list(&[
            ("d1", true),
            ("o1", false),
            ("d2", true),
            ("o2", false),
            ("o3", false),
        ]);
        items.partition_outstanding_first();
        assert_eq!(titles(&items), vec!["o1", "o2", "o3", "d1", "d2"]);
    }

    #[test]
    fn push_front_prepends() {
        let mut items = list(&[("a", false)]);
        items.push_front(Item::new("b"));
        items.push(Item::new("c"));
        assert_eq!(titles(&items), vec!["b", "a", "c"]);
    }

    #[test]
    fn snapshot_derives_count() {
        let state = ListState::ready(vec![Item::new("a"), Item::new("b")]);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.outstanding, 2);
        assert!(snapshot.ready);
        assert!(!ListState::new().snapshot().ready);
    }

    #[test]
    fn write_status_tracks_reports() {
        let mut state = ListState::ready(vec![]);
        assert_eq!(state.write_status(1), WriteStatus::Scheduled);

        let failure = StorageError::Backend("full".to_string());
        state.record_write(&WriteReport {
            revision: 1,
            result: Err(failure.clone()),
        });
        assert_eq!(state.write_status(1), WriteStatus::Failed(failure));
        assert_eq!(state.write_status(2), WriteStatus::Scheduled);

        state.record_write(&WriteReport {
            revision: 2,
            result: Ok(()),
        });
        assert_eq!(state.write_status(1), WriteStatus::Durable);
        assert_eq!(state.write_status(2), WriteStatus::Durable);
        assert!(state.last_write_error.is_none());
    }

    #[test]
    fn stale_failure_does_not_shadow_success() {
        let mut state = ListState::ready(vec![]);
        state.record_write(&WriteReport {
            revision: 3,
            result: Ok(()),
        });
        state.record_write(&WriteReport {
            revision: 2,
            result: Err(StorageError::Backend("late".to_string())),
        });
        assert!(state.last_write_error.is_none());
        assert_eq!(state.write_status(3), WriteStatus::Durable);
    }
}

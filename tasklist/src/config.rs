//! Configuration for the list store.
//!
//! Every policy has a default matching the behaviour users expect from a
//! personal task list: new items go to the end, finished items sink below
//! open ones, each mutation is written through before it is acknowledged,
//! and commands issued during startup are queued until the saved list is in.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tasklist::config::{InsertionPolicy, ListConfig, SyncStrategy};
//!
//! let config = ListConfig::default()
//!     .with_insertion(InsertionPolicy::Prepend)
//!     .with_sync(SyncStrategy::Batched { window: Duration::from_millis(50) });
//!
//! assert_eq!(config.storage_key, "@TODOS");
//! ```

use crate::error::ListError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Storage key the list is saved under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "@TODOS";

/// Legacy key older releases stored a separate outstanding count under
pub const LEGACY_COUNT_KEY: &str = "@COUNT";

/// Where `add` places a new item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertionPolicy {
    /// After all existing items
    #[default]
    Append,
    /// Before all existing items
    Prepend,
}

/// What happens to the order after a mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReorderPolicy {
    /// Stable partition: not-done items first, done items last
    #[default]
    Partition,
    /// Items keep their positions
    InPlace,
}

/// How mutations reach storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStrategy {
    /// Each command resolves once the write covering it has finished
    #[default]
    Eager,
    /// Commands resolve immediately; writes are coalesced over `window`
    Batched {
        /// How long the writer waits for more mutations before writing
        window: Duration,
    },
}

impl SyncStrategy {
    /// Coalescing window (zero for eager writes)
    #[must_use]
    pub const fn window(self) -> Duration {
        match self {
            Self::Eager => Duration::ZERO,
            Self::Batched { window } => window,
        }
    }

    /// Whether commands wait for their write
    #[must_use]
    pub const fn is_eager(self) -> bool {
        matches!(self, Self::Eager)
    }
}

/// What happens to mutations issued before the initial load completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PendingPolicy {
    /// Hold them and replay in arrival order once loaded
    #[default]
    Queue,
    /// Refuse them with [`ListError::NotReady`]
    Reject,
}

macro_rules! policy_names {
    ($ty:ty, $what:literal, { $($name:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ListError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(ListError::Config(format!(
                        concat!("unknown ", $what, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

policy_names!(InsertionPolicy, "insertion policy", {
    "append" => InsertionPolicy::Append,
    "prepend" => InsertionPolicy::Prepend,
});

policy_names!(ReorderPolicy, "reorder policy", {
    "partition" => ReorderPolicy::Partition,
    "in-place" => ReorderPolicy::InPlace,
    "inplace" => ReorderPolicy::InPlace,
});

policy_names!(PendingPolicy, "pending policy", {
    "queue" => PendingPolicy::Queue,
    "reject" => PendingPolicy::Reject,
});

impl fmt::Display for InsertionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::Prepend => write!(f, "prepend"),
        }
    }
}

impl fmt::Display for ReorderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partition => write!(f, "partition"),
            Self::InPlace => write!(f, "in-place"),
        }
    }
}

/// List store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Key the serialized list is stored under
    pub storage_key: String,
    /// Key of a separately stored count, read once at load to report drift
    pub legacy_count_key: Option<String>,
    /// Placement of new items
    pub insertion: InsertionPolicy,
    /// Ordering after mutations
    pub reorder: ReorderPolicy,
    /// Write strategy
    pub sync: SyncStrategy,
    /// Handling of commands issued before load completes
    pub pending: PendingPolicy,
    /// Maximum title length, in characters (`None` accepts any length)
    pub max_title_len: Option<usize>,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            legacy_count_key: None,
            insertion: InsertionPolicy::default(),
            reorder: ReorderPolicy::default(),
            sync: SyncStrategy::default(),
            pending: PendingPolicy::default(),
            max_title_len: None,
        }
    }
}

impl ListConfig {
    /// Set the storage key
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set (or clear) the legacy count key
    #[must_use]
    pub fn with_legacy_count_key(mut self, key: Option<String>) -> Self {
        self.legacy_count_key = key;
        self
    }

    /// Set the insertion policy
    #[must_use]
    pub const fn with_insertion(mut self, insertion: InsertionPolicy) -> Self {
        self.insertion = insertion;
        self
    }

    /// Set the reorder policy
    #[must_use]
    pub const fn with_reorder(mut self, reorder: ReorderPolicy) -> Self {
        self.reorder = reorder;
        self
    }

    /// Set the sync strategy
    #[must_use]
    pub const fn with_sync(mut self, sync: SyncStrategy) -> Self {
        self.sync = sync;
        self
    }

    /// Set the pending policy
    #[must_use]
    pub const fn with_pending(mut self, pending: PendingPolicy) -> Self {
        self.pending = pending;
        self
    }

    /// Limit titles to `max` characters
    #[must_use]
    pub const fn with_max_title_len(mut self, max: usize) -> Self {
        self.max_title_len = Some(max);
        self
    }

    /// Load configuration from `TASKLIST_*` environment variables
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Config`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ListError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Config`] if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ListError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("TASKLIST_STORAGE_KEY") {
            config.storage_key = key;
        }
        if let Some(key) = lookup("TASKLIST_LEGACY_COUNT_KEY") {
            config.legacy_count_key = Some(key);
        }
        if let Some(value) = lookup("TASKLIST_INSERTION") {
            config.insertion = value.parse()?;
        }
        if let Some(value) = lookup("TASKLIST_REORDER") {
            config.reorder = value.parse()?;
        }
        if let Some(value) = lookup("TASKLIST_PENDING") {
            config.pending = value.parse()?;
        }
        if let Some(value) = lookup("TASKLIST_MAX_TITLE_LEN") {
            config.max_title_len = Some(parse_number("TASKLIST_MAX_TITLE_LEN", &value)?);
        }

        let window = lookup("TASKLIST_BATCH_WINDOW_MS")
            .map(|value| parse_number("TASKLIST_BATCH_WINDOW_MS", &value))
            .transpose()?
            .map_or(Duration::from_millis(100), Duration::from_millis);
        if let Some(value) = lookup("TASKLIST_SYNC") {
            config.sync = match value.trim().to_lowercase().as_str() {
                "eager" => SyncStrategy::Eager,
                "batched" => SyncStrategy::Batched { window },
                other => {
                    return Err(ListError::Config(format!("unknown sync strategy '{other}'")));
                },
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Config`] for an empty storage key, a legacy key
    /// equal to the storage key, or a title limit of zero.
    pub fn validate(&self) -> Result<(), ListError> {
        if self.storage_key.trim().is_empty() {
            return Err(ListError::Config("storage key must not be empty".to_string()));
        }
        if self.legacy_count_key.as_deref() == Some(self.storage_key.as_str()) {
            return Err(ListError::Config(
                "legacy count key must differ from the storage key".to_string(),
            ));
        }
        if self.max_title_len == Some(0) {
            return Err(ListError::Config("max title length must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, ListError> {
    value
        .trim()
        .parse()
        .map_err(|_| ListError::Config(format!("{name} must be a non-negative integer, got '{value}'")))
}

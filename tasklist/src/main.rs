//! Task list demo binary
//!
//! Walks through a short session, then opens the same storage again the way
//! an app does after a restart and shows that the list survived.
//!
//! Policies come from `TASKLIST_*` environment variables; log verbosity from
//! `RUST_LOG`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tasklist::{CommandOutcome, ListConfig, ListSnapshot, ListStore};
use tasklist_core::storage::{KeyValueStorage, StorageFuture};
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Process-local key-value storage standing in for a device store
#[derive(Clone, Default)]
struct DeviceStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl KeyValueStorage for DeviceStorage {
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.data.read().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.data.write().await.insert(key.to_string(), value);
            Ok(())
        })
    }
}

fn print_list(heading: &str, snapshot: &ListSnapshot) {
    println!("\n{heading} ({} outstanding)", snapshot.outstanding);
    for (index, item) in snapshot.items.iter().enumerate() {
        let status = if item.done { "✓" } else { " " };
        println!("  {index}. [{status}] {}", item.title);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasklist=info,tasklist_runtime=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Task List ===");

    let config = ListConfig::from_env()?;
    let storage = DeviceStorage::default();

    let list = ListStore::new(Arc::new(storage.clone()), config.clone())?;

    // Typed before the saved list is in: queued, replayed after load.
    match list.add("Water the plants").await {
        Ok(CommandOutcome::Queued { position }) => {
            println!("Queued before load at position {position}");
        },
        Ok(_) => {},
        Err(error) => println!("Not accepted before load: {error}"),
    }

    let outcome = list.load().await?;
    println!("Loaded: {outcome:?}");

    list.add("Buy milk").await?;
    list.add("Call mom").await?;
    list.add("   ").await?;
    list.toggle_done(0).await?;
    print_list("After marking the first item done", &list.snapshot().await);

    list.delete(2).await?;
    print_list("After deleting the done item", &list.snapshot().await);

    if let Err(error) = list.toggle_done(42).await {
        println!("\nRejected: {error}");
    }

    list.shutdown(Duration::from_secs(1)).await?;

    println!("\n--- restart ---");
    let reopened = ListStore::new(Arc::new(storage), config)?;
    let outcome = reopened.load().await?;
    println!("Loaded: {outcome:?}");
    print_list("Restored list", &reopened.snapshot().await);

    Ok(())
}

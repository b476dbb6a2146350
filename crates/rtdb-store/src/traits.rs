use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreResult;
use crate::query::{Query, Snapshot};

/// Identifier of a registered listener, unique per store instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Receiving side of a listener registration.
pub type SnapshotStream = broadcast::Receiver<Snapshot>;

/// A live listener: its id and the stream of snapshots delivered to it.
///
/// The first snapshot carries the value current at registration time.
/// Later snapshots arrive whenever the value visible to the query changes.
#[derive(Debug)]
pub struct Listener {
    pub id: ListenerId,
    pub snapshots: SnapshotStream,
}

/// Path-addressed realtime document store.
///
/// Implementations must satisfy these invariants:
/// - A multi-path [`update`](RemoteStore::update) is atomic: either every
///   entry lands or none does, and listeners observe a single change.
/// - Writing `Value::Null` deletes the addressed location.
/// - A listener stays registered until it is unsubscribed or its stream is
///   dropped.
/// - All backend errors are propagated, never silently ignored.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// One-shot read of the query's current snapshot.
    async fn get(&self, query: &Query) -> StoreResult<Snapshot>;

    /// Register a listener for `query`. Resolves once the registration is
    /// acknowledged.
    async fn subscribe(&self, query: &Query) -> StoreResult<Listener>;

    /// Remove a listener. Returns `true` if it was still registered.
    async fn unsubscribe(&self, id: ListenerId) -> StoreResult<bool>;

    /// Apply several absolute-path writes as one atomic change at the root.
    async fn update(&self, entries: &BTreeMap<String, Value>) -> StoreResult<()>;

    /// Overwrite the whole value at `path`.
    async fn set(&self, path: &str, value: &Value) -> StoreResult<()>;
}

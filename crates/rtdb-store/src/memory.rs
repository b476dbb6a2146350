use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use rtdb_types::{normalize_path, validate_key};

use crate::error::{StoreError, StoreResult};
use crate::query::{Query, Snapshot};
use crate::traits::{Listener, ListenerId, RemoteStore};

/// Default capacity of each listener's snapshot channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Internal registration: a query paired with a broadcast sender and the
/// last snapshot delivered through it.
struct Registration {
    id: ListenerId,
    query: Query,
    sender: broadcast::Sender<Snapshot>,
    last: Snapshot,
}

/// In-memory, JSON-tree backed realtime store.
///
/// Intended for tests and embedding. The whole tree lives behind one
/// `RwLock`, which makes every multi-path update trivially atomic. Listeners
/// are notified after each write whose paths overlap their query, and only
/// when the snapshot they see actually changed.
///
/// Lock order is always `root` then `listeners`.
pub struct InMemoryStore {
    root: RwLock<Value>,
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    registrations: AtomicU64,
    writes: AtomicU64,
    failure: RwLock<Option<String>>,
    closed: AtomicBool,
    channel_capacity: usize,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new empty store whose listener channels hold `capacity`
    /// undelivered snapshots.
    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            root: RwLock::new(Value::Null),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            registrations: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            failure: RwLock::new(None),
            closed: AtomicBool::new(false),
            channel_capacity: capacity.max(1),
        }
    }

    /// Make every subsequent write fail with [`StoreError::Rejected`], or
    /// clear the failure with `None`.
    pub fn fail_writes(&self, reason: Option<&str>) {
        *self.failure.write().expect("lock poisoned") = reason.map(str::to_string);
    }

    /// Mark the store unavailable. All later requests fail and every listener
    /// stream is closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listeners.write().expect("lock poisoned").clear();
        info!("in-memory store closed");
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().expect("lock poisoned").len()
    }

    /// Total number of listener registrations ever accepted.
    pub fn registration_count(&self) -> u64 {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Total number of successful write calls (`set` or `update`).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// The raw value stored at `path`, if any.
    pub fn value_at(&self, path: &str) -> Option<Value> {
        let path = normalize_path(path).ok()?;
        let root = self.root.read().expect("lock poisoned");
        node_at(&root, &path).cloned()
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is closed".into()));
        }
        Ok(())
    }

    fn check_writable(&self) -> StoreResult<()> {
        self.check_open()?;
        if let Some(reason) = self.failure.read().expect("lock poisoned").as_ref() {
            return Err(StoreError::Rejected(reason.clone()));
        }
        Ok(())
    }

    /// Apply validated writes under one lock and notify affected listeners.
    fn apply(&self, writes: Vec<(String, Value)>) -> StoreResult<()> {
        self.check_writable()?;

        let mut root = self.root.write().expect("lock poisoned");
        for (path, value) in &writes {
            let segments: Vec<&str> = path.split('/').collect();
            write_node(&mut root, &segments, value.clone());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        let changed: Vec<&str> = writes.iter().map(|(p, _)| p.as_str()).collect();
        self.notify(&root, &changed);
        debug!(count = writes.len(), "write applied");
        Ok(())
    }

    /// Deliver fresh snapshots to listeners whose queries overlap `changed`.
    /// Registrations whose receivers are all gone are pruned.
    fn notify(&self, root: &Value, changed: &[&str]) {
        let mut listeners = self.listeners.write().expect("lock poisoned");
        listeners.retain_mut(|reg| {
            if reg.sender.receiver_count() == 0 {
                debug!(id = %reg.id, "pruning listener with no receivers");
                return false;
            }
            if !changed.iter().any(|p| overlaps(p, reg.query.path())) {
                return true;
            }
            let snapshot = reg.query.apply(node_at(root, reg.query.path()));
            if snapshot == reg.last {
                return true;
            }
            reg.last = snapshot.clone();
            reg.sender.send(snapshot).is_ok()
        });
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn get(&self, query: &Query) -> StoreResult<Snapshot> {
        self.check_open()?;
        let root = self.root.read().expect("lock poisoned");
        Ok(query.apply(node_at(&root, query.path())))
    }

    async fn subscribe(&self, query: &Query) -> StoreResult<Listener> {
        self.check_open()?;

        // Hold the tree lock while registering so no write slips between the
        // initial snapshot and the registration.
        let root = self.root.read().expect("lock poisoned");
        let snapshot = query.apply(node_at(&root, query.path()));

        let (sender, snapshots) = broadcast::channel(self.channel_capacity);
        // Cannot fail: `snapshots` is alive.
        let _ = sender.send(snapshot.clone());

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .write()
            .expect("lock poisoned")
            .push(Registration {
                id,
                query: query.clone(),
                sender,
                last: snapshot,
            });
        self.registrations.fetch_add(1, Ordering::SeqCst);

        debug!(%id, query = %query, "listener registered");
        Ok(Listener { id, snapshots })
    }

    async fn unsubscribe(&self, id: ListenerId) -> StoreResult<bool> {
        let mut listeners = self.listeners.write().expect("lock poisoned");
        let before = listeners.len();
        listeners.retain(|reg| reg.id != id);
        let removed = listeners.len() != before;
        if removed {
            debug!(%id, "listener removed");
        }
        Ok(removed)
    }

    async fn update(&self, entries: &BTreeMap<String, Value>) -> StoreResult<()> {
        let mut writes = Vec::with_capacity(entries.len());
        for (path, value) in entries {
            let normalized =
                normalize_path(path).map_err(|e| StoreError::invalid_path(path, e))?;
            let value = sanitize(&normalized, value)?;
            writes.push((normalized, value));
        }

        for (i, (first, _)) in writes.iter().enumerate() {
            for (second, _) in &writes[i + 1..] {
                if overlaps(first, second) {
                    return Err(StoreError::OverlappingPaths {
                        first: first.clone(),
                        second: second.clone(),
                    });
                }
            }
        }

        if writes.is_empty() {
            return Ok(());
        }
        self.apply(writes)
    }

    async fn set(&self, path: &str, value: &Value) -> StoreResult<()> {
        let normalized = normalize_path(path).map_err(|e| StoreError::invalid_path(path, e))?;
        let value = sanitize(&normalized, value)?;
        self.apply(vec![(normalized, value)])
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("listener_count", &self.listener_count())
            .field("write_count", &self.write_count())
            .finish()
    }
}

/// `true` if one path equals or contains the other.
fn overlaps(a: &str, b: &str) -> bool {
    a == b || is_ancestor(a, b) || is_ancestor(b, a)
}

fn is_ancestor(ancestor: &str, path: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

fn node_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .try_fold(root, |node, segment| node.get(segment))
        .filter(|node| !node.is_null())
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Write `value` at `segments` below `node`, creating intermediate objects
/// and pruning any branch left empty.
fn write_node(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        write_node(child, rest, value);
        if is_empty(child) {
            map.remove(*head);
        }
    }
}

/// Validate nested keys and bring a value into stored form: nulls and empty
/// objects are dropped, arrays become index-keyed objects.
fn sanitize(path: &str, value: &Value) -> StoreResult<Value> {
    let entries: Vec<(String, &Value)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        other => return Ok(other.clone()),
    };

    let mut out = Map::new();
    for (key, child) in entries {
        let child_path = format!("{path}/{key}");
        validate_key(&key).map_err(|e| StoreError::invalid_path(&child_path, e))?;
        let child = sanitize(&child_path, child)?;
        if !is_empty(&child) {
            out.insert(key, child);
        }
    }
    if out.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(out))
    }
}

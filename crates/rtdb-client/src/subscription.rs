//! Debounced, shared snapshot subscriptions.
//!
//! Reads are grouped by normalized path. All reads of one path share a
//! single registry entry, and the entry owns at most one store listener:
//!
//! 1. The first read creates the entry in the `Pending` phase and starts a
//!    debounce timer tagged with a fresh generation.
//! 2. Every further read of the path while `Pending` bumps the generation
//!    and starts a new timer. Timers whose generation is stale exit without
//!    registering, so only the last one in a burst reaches the store.
//! 3. The surviving timer registers the listener and then runs the dispatch
//!    loop, delivering each snapshot to every attached reader.
//! 4. Reads arriving after that attach to the live listener and are served
//!    from the last snapshot it delivered.
//!
//! Each entry is reference-counted by its readers. A reader detaches when
//! it times out, is cancelled, or its future is dropped before settling;
//! when the last reader detaches the entry's cancellation token fires and
//! the dispatch loop unregisters the store listener.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rtdb_store::{Query, RemoteStore, Snapshot, StoreError};
use rtdb_types::{normalize_path, MESSAGE_ORDER_KEY};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::normalize::{normalize, ReadMode, ReadValue};

/// Number of most recent children a read asks for.
pub const READ_WINDOW: usize = 150;

/// Scheduler passes granted to in-flight deliveries once the read timer
/// fires, before the read is declared timed out.
const SETTLE_YIELDS: usize = 8;

/// Callback invoked with every normalized snapshot a reader receives.
pub type DataCallback = Arc<dyn Fn(&ReadValue) + Send + Sync>;

struct Reader {
    id: u64,
    mode: ReadMode,
    on_data: DataCallback,
    settle: Option<oneshot::Sender<ClientResult<ReadValue>>>,
}

enum Phase {
    /// Waiting out the debounce window.
    Pending { generation: u64 },
    /// The surviving timer is registering with the store.
    Registering,
    /// A store listener is delivering snapshots.
    Live { last: Option<Snapshot> },
}

struct Entry {
    id: u64,
    query: Query,
    phase: Phase,
    readers: Vec<Reader>,
    cancel: CancellationToken,
}

/// Work computed under the registry lock and run after releasing it, so
/// callbacks never execute while the lock is held.
struct Delivery {
    on_data: DataCallback,
    value: ReadValue,
    settle: Option<(oneshot::Sender<ClientResult<ReadValue>>, ClientResult<ReadValue>)>,
}

impl Delivery {
    fn prepare(reader: &mut Reader, path: &str, snapshot: &Snapshot) -> Self {
        let (value, result) = match normalize(snapshot, reader.mode) {
            Some(value) => (value.clone(), Ok(value)),
            None => (
                ReadValue::empty(),
                Err(ClientError::NoData {
                    path: path.to_string(),
                }),
            ),
        };
        Self {
            on_data: Arc::clone(&reader.on_data),
            value,
            settle: reader.settle.take().map(|tx| (tx, result)),
        }
    }

    fn run(self) {
        (self.on_data)(&self.value);
        if let Some((tx, result)) = self.settle {
            // The reader may already have given up.
            let _ = tx.send(result);
        }
    }
}

struct Inner {
    store: Arc<dyn RemoteStore>,
    config: ClientConfig,
    entries: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

/// Registry of debounced subscriptions, keyed by normalized path.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<Inner>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn RemoteStore>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Read `path`, invoking `on_data` with the first and every later
    /// snapshot until the reader is cancelled.
    ///
    /// The result settles once, with the first snapshot delivered to this
    /// reader: the normalized value, or [`ClientError::NoData`] when nothing
    /// is stored (the callback still receives an empty sequence). If no
    /// snapshot arrives within the read timeout the result is
    /// [`ClientError::Timeout`] and the reader detaches. A snapshot the store
    /// delivers in the same instant as the timeout still wins.
    pub async fn read(
        &self,
        path: &str,
        mode: ReadMode,
        on_data: DataCallback,
        cancel: CancellationToken,
    ) -> ClientResult<ReadValue> {
        let key = normalize_path(path)?;
        let query = Query::at(&key)?
            .order_by_child(MESSAGE_ORDER_KEY)
            .limit_to_last(READ_WINDOW);

        let (tx, mut rx) = oneshot::channel();
        let reader = Reader {
            id: self.next_id(),
            mode,
            on_data,
            settle: Some(tx),
        };
        let reader_id = reader.id;
        let (entry_id, entry_cancel) = self.attach(&key, query, reader);
        let mut guard = ReaderGuard {
            registry: self,
            key: &key,
            entry_id,
            reader_id,
            armed: true,
        };

        let timeout = self.inner.config.read_timeout();
        let outcome = tokio::select! {
            biased;
            settled = &mut rx => settled.unwrap_or_else(|_| Err(listener_closed(&key))),
            _ = cancel.cancelled() => Err(ClientError::Cancelled { path: key.clone() }),
            _ = tokio::time::sleep(timeout) => match drain_settled(&mut rx, &key).await {
                Some(settled) => settled,
                None => {
                    warn!(path = %key, ?timeout, "read timed out");
                    Err(ClientError::Timeout { path: key.clone(), after: timeout })
                }
            },
        };

        // Settled readers keep listening until cancelled.
        if matches!(outcome, Ok(_) | Err(ClientError::NoData { .. })) {
            guard.armed = false;
            let registry = self.clone();
            let key = key.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => registry.detach(&key, entry_id, reader_id),
                    _ = entry_cancel.cancelled() => {}
                }
            });
        }
        outcome
    }

    /// Number of entries with a live store listener.
    pub fn active_listeners(&self) -> usize {
        self.lock()
            .values()
            .filter(|e| matches!(e.phase, Phase::Live { .. }))
            .count()
    }

    /// Number of readers attached to `path`.
    pub fn reader_count(&self, path: &str) -> usize {
        let Ok(key) = normalize_path(path) else {
            return 0;
        };
        self.lock().get(&key).map_or(0, |e| e.readers.len())
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.inner.entries.lock().expect("registry lock poisoned")
    }

    /// Attach a reader to the entry for `key`, creating the entry or
    /// restarting its debounce timer as needed.
    fn attach(&self, key: &str, query: Query, mut reader: Reader) -> (u64, CancellationToken) {
        let mut immediate = None;
        let (entry_id, cancel) = {
            let mut entries = self.lock();
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                id: self.next_id(),
                query,
                phase: Phase::Pending { generation: 0 },
                readers: Vec::new(),
                cancel: CancellationToken::new(),
            });

            match &mut entry.phase {
                Phase::Pending { generation } => {
                    *generation = self.next_id();
                    self.spawn_registration(key, entry.id, *generation, entry.query.clone());
                    debug!(path = %key, generation = *generation, "registration debounced");
                }
                Phase::Registering | Phase::Live { last: None } => {}
                Phase::Live {
                    last: Some(snapshot),
                } => {
                    immediate = Some(Delivery::prepare(&mut reader, key, snapshot));
                }
            }

            entry.readers.push(reader);
            (entry.id, entry.cancel.clone())
        };

        if let Some(delivery) = immediate {
            delivery.run();
        }
        (entry_id, cancel)
    }

    /// Remove one reader. The last reader out tears the entry down.
    fn detach(&self, key: &str, entry_id: u64, reader_id: u64) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.id != entry_id {
            return;
        }
        entry.readers.retain(|r| r.id != reader_id);
        if entry.readers.is_empty() {
            entry.cancel.cancel();
            entries.remove(key);
            debug!(path = %key, "subscription released");
        }
    }

    fn spawn_registration(&self, key: &str, entry_id: u64, generation: u64, query: Query) {
        let registry = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            registry.run_registration(key, entry_id, generation, query).await;
        });
    }

    async fn run_registration(&self, key: String, entry_id: u64, generation: u64, query: Query) {
        tokio::time::sleep(self.inner.config.debounce()).await;

        let cancel = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&key).filter(|e| e.id == entry_id) else {
                return;
            };
            match entry.phase {
                Phase::Pending { generation: current } if current == generation => {}
                _ => {
                    debug!(path = %key, generation, "superseded registration discarded");
                    return;
                }
            }
            entry.phase = Phase::Registering;
            entry.cancel.clone()
        };

        let mut listener = match self.inner.store.subscribe(&query).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(path = %key, error = %err, "listener registration failed");
                self.fail_entry(&key, entry_id, err);
                return;
            }
        };

        if !self.go_live(&key, entry_id) {
            self.unregister(&key, listener.id).await;
            return;
        }
        info!(path = %key, listener = %listener.id, "listener registered");

        loop {
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = listener.snapshots.recv() => match received {
                    Ok(snapshot) => snapshot,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(path = %key, skipped, "listener lagged; skipping stale snapshots");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        warn!(path = %key, "listener stream closed by store");
                        self.close_entry(&key, entry_id);
                        return;
                    }
                },
            };
            self.dispatch(&key, entry_id, snapshot);
        }

        self.unregister(&key, listener.id).await;
    }

    fn go_live(&self, key: &str, entry_id: u64) -> bool {
        let mut entries = self.lock();
        match entries.get_mut(key).filter(|e| e.id == entry_id) {
            Some(entry) if !entry.cancel.is_cancelled() => {
                entry.phase = Phase::Live { last: None };
                true
            }
            _ => false,
        }
    }

    async fn unregister(&self, key: &str, listener: rtdb_store::ListenerId) {
        match self.inner.store.unsubscribe(listener).await {
            Ok(_) => debug!(path = %key, %listener, "listener unregistered"),
            Err(err) => warn!(path = %key, %listener, error = %err, "failed to unregister listener"),
        }
    }

    fn dispatch(&self, key: &str, entry_id: u64, snapshot: Snapshot) {
        let deliveries: Vec<Delivery> = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(key).filter(|e| e.id == entry_id) else {
                return;
            };
            let deliveries = entry
                .readers
                .iter_mut()
                .map(|reader| Delivery::prepare(reader, key, &snapshot))
                .collect();
            entry.phase = Phase::Live {
                last: Some(snapshot),
            };
            deliveries
        };
        debug!(path = %key, readers = deliveries.len(), "snapshot dispatched");
        for delivery in deliveries {
            delivery.run();
        }
    }

    /// Fail every unsettled reader with `err` and drop the entry.
    fn fail_entry(&self, key: &str, entry_id: u64, err: StoreError) {
        let Some(entry) = self.take_entry(key, entry_id) else {
            return;
        };
        for reader in entry.readers {
            if let Some(tx) = reader.settle {
                let _ = tx.send(Err(ClientError::Store(err.clone())));
            }
        }
    }

    /// Drop the entry after the store closed its stream. Unsettled readers
    /// observe their settle channel closing.
    fn close_entry(&self, key: &str, entry_id: u64) {
        drop(self.take_entry(key, entry_id));
    }

    fn take_entry(&self, key: &str, entry_id: u64) -> Option<Entry> {
        let mut entries = self.lock();
        if entries.get(key).map(|e| e.id) != Some(entry_id) {
            return None;
        }
        let entry = entries.remove(key)?;
        entry.cancel.cancel();
        Some(entry)
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("active_listeners", &self.active_listeners())
            .finish()
    }
}

fn listener_closed(key: &str) -> ClientError {
    ClientError::Store(StoreError::Unavailable(format!("listener for {key} closed")))
}

/// Let snapshots emitted at the timer instant travel through the dispatch
/// loop. Returns the settled result if one arrives.
async fn drain_settled(
    rx: &mut oneshot::Receiver<ClientResult<ReadValue>>,
    key: &str,
) -> Option<ClientResult<ReadValue>> {
    for _ in 0..SETTLE_YIELDS {
        match rx.try_recv() {
            Ok(settled) => return Some(settled),
            Err(TryRecvError::Closed) => return Some(Err(listener_closed(key))),
            Err(TryRecvError::Empty) => tokio::task::yield_now().await,
        }
    }
    rx.try_recv().ok()
}

/// Detaches an unsettled reader when its read is abandoned.
struct ReaderGuard<'a> {
    registry: &'a SubscriptionRegistry,
    key: &'a str,
    entry_id: u64,
    reader_id: u64,
    armed: bool,
}

impl Drop for ReaderGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.registry.detach(self.key, self.entry_id, self.reader_id);
        }
    }
}

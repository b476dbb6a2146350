//! Remote store contract for rtdb.
//!
//! The client never talks to a concrete backend directly. Everything it
//! needs from the realtime store is captured by the [`RemoteStore`] trait:
//!
//! - path-addressed queries with order-by-child and limit-to-last
//! - snapshot subscriptions that deliver the full current value plus an
//!   existence flag, first on registration and then on every change
//! - atomic multi-path updates against the store root
//! - whole-document overwrite (`set`)
//!
//! # Storage Backends
//!
//! - [`InMemoryStore`] -- JSON-tree store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Paths are normalized before use: no leading, trailing or doubled
//!    slashes, and no `. # $ [ ]` inside keys.
//! 2. Writing null deletes; empty branches are pruned.
//! 3. Two entries of one update may not address the same subtree.
//! 4. Listeners are told about a change only when their visible value
//!    changed.
//! 5. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod query;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, DEFAULT_CHANNEL_CAPACITY};
pub use query::{Query, Snapshot};
pub use traits::{Listener, ListenerId, RemoteStore, SnapshotStream};

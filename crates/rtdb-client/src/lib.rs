//! Client data-access layer for rtdb.
//!
//! [`RealtimeDb`] is the entry point. It wraps any [`RemoteStore`] and
//! offers three operations:
//!
//! - **read**: a debounced, shared subscription that settles with the first
//!   snapshot (or times out) and keeps invoking the caller's callback on
//!   later changes
//! - **update**: routes a namespace-tagged payload to its store entries and
//!   applies them as one atomic multi-path update
//! - **write profile**: a full overwrite of `profiles/{userUid}`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rtdb_client::{ReadMode, RealtimeDb};
//! use rtdb_store::InMemoryStore;
//! use rtdb_types::{BoardNamespace, MessageRecord, PublicMessage};
//!
//! # async fn demo() -> rtdb_client::ClientResult<()> {
//! let db = RealtimeDb::new(Arc::new(InMemoryStore::new()));
//! db.update_user_data(PublicMessage::new(
//!     BoardNamespace::Public,
//!     MessageRecord::now("ann", "hello"),
//! ))
//! .await?;
//!
//! let board = db
//!     .read_public(ReadMode::Array, |value| println!("{} messages", value.len()))
//!     .await?;
//! for message in board.messages()? {
//!     println!("{}: {}", message.author_name, message.body);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod profile;
pub mod router;
pub mod subscription;

pub use client::{RealtimeDb, WriteAck};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, ErrorKind};
pub use normalize::{normalize, ReadMode, ReadValue};
pub use profile::ProfileWriter;
pub use router::{UpdateBatch, WriteRouter};
pub use subscription::{DataCallback, SubscriptionRegistry, READ_WINDOW};

pub use tokio_util::sync::CancellationToken;

// Re-export the types callers need to build requests.
pub use rtdb_store::RemoteStore;
pub use rtdb_types::{
    BoardNamespace, ChatMessage, FriendEdge, MessageRecord, ProfilePayload, PublicMessage,
    UpdatePayload,
};

/// Path read by [`RealtimeDb::read_public`] unless configured otherwise.
pub const DEFAULT_READ_PATH: &str = "public/";

//! Foundation types for rtdb.
//!
//! This crate holds the path model and the record shapes shared by the store
//! and client crates. Nothing here performs I/O.
//!
//! # Key Types
//!
//! - [`Namespace`] -- the closed set of root namespaces
//! - [`DatabasePath`] -- a namespace-qualified path with validated sub-keys
//! - [`MessageRecord`] -- a chronological message, ordered by send time
//! - [`UpdatePayload`] -- the tagged union accepted by the update path
//! - [`ProfilePayload`] / [`ProfileDocument`] -- profile input and stored form

pub mod error;
pub mod message;
pub mod path;
pub mod payload;
pub mod profile;

pub use error::{TypeError, TypeResult};
pub use message::{new_message_id, now_epoch_millis, MessageRecord};
pub use path::{normalize_path, validate_key, DatabasePath, Namespace, MESSAGE_ORDER_KEY};
pub use payload::{BoardNamespace, ChatMessage, FriendEdge, PublicMessage, UpdatePayload};
pub use profile::{ProfileDocument, ProfilePayload};

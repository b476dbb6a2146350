//! Write payloads accepted by the update path.
//!
//! [`UpdatePayload`] is a closed union discriminated by namespace. Typed
//! callers construct a variant directly; loosely-typed callers hand over a
//! JSON object with a `namespace` tag and go through
//! [`UpdatePayload::from_json`], which is where a missing tag or an unknown
//! namespace is detected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TypeError, TypeResult};
use crate::message::{new_message_id, MessageRecord};
use crate::path::Namespace;

/// Namespaces that hold a flat, board-style message list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardNamespace {
    Public,
    Tests,
}

impl BoardNamespace {
    pub fn namespace(&self) -> Namespace {
        match self {
            BoardNamespace::Public => Namespace::Public,
            BoardNamespace::Tests => Namespace::Tests,
        }
    }
}

/// A message posted to `public/` or `tests/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMessage {
    pub namespace: BoardNamespace,
    pub message_id: String,
    #[serde(flatten)]
    pub record: MessageRecord,
}

impl PublicMessage {
    /// Post `record` to `namespace` under a freshly generated message id.
    pub fn new(namespace: BoardNamespace, record: MessageRecord) -> Self {
        Self {
            namespace,
            message_id: new_message_id(),
            record,
        }
    }
}

/// A direct message from one user to another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub from_uid: String,
    pub to_uid: String,
    pub message_id: String,
    #[serde(flatten)]
    pub record: MessageRecord,
}

impl ChatMessage {
    pub fn new(from_uid: impl Into<String>, to_uid: impl Into<String>, record: MessageRecord) -> Self {
        Self {
            from_uid: from_uid.into(),
            to_uid: to_uid.into(),
            message_id: new_message_id(),
            record,
        }
    }
}

/// One direction of a friendship. The reverse edge is a separate write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendEdge {
    pub owner_uid: String,
    pub friend_uid: String,
}

impl FriendEdge {
    pub fn new(owner_uid: impl Into<String>, friend_uid: impl Into<String>) -> Self {
        Self {
            owner_uid: owner_uid.into(),
            friend_uid: friend_uid.into(),
        }
    }

    /// The same edge seen from the other side.
    pub fn reversed(&self) -> Self {
        Self {
            owner_uid: self.friend_uid.clone(),
            friend_uid: self.owner_uid.clone(),
        }
    }
}

/// An incremental update, discriminated by namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdatePayload {
    PublicMessage(PublicMessage),
    ChatMessage(ChatMessage),
    FriendEdge(FriendEdge),
}

impl UpdatePayload {
    /// The namespace this payload writes into.
    pub fn namespace(&self) -> Namespace {
        match self {
            UpdatePayload::PublicMessage(m) => m.namespace.namespace(),
            UpdatePayload::ChatMessage(_) => Namespace::Chats,
            UpdatePayload::FriendEdge(_) => Namespace::Friends,
        }
    }

    /// Decode a loosely-typed payload.
    ///
    /// The `namespace` tag is inspected first: an absent or null tag is a
    /// missing field, a tag outside `public`, `tests`, `chats` and `friends`
    /// is an unknown namespace. The remaining fields are then checked for the
    /// selected shape.
    pub fn from_json(value: &Value) -> TypeResult<Self> {
        let object = match value {
            Value::Null => return Err(TypeError::MissingField("payload")),
            Value::Object(map) => map,
            other => {
                return Err(TypeError::Serialization(format!(
                    "update payload must be an object, got {other}"
                )))
            }
        };

        let tag = match object.get("namespace") {
            None | Some(Value::Null) => return Err(TypeError::MissingField("namespace")),
            Some(Value::String(tag)) => tag.as_str(),
            Some(other) => return Err(TypeError::UnknownNamespace(other.to_string())),
        };

        let raw: RawUpdate = serde_json::from_value(value.clone())
            .map_err(|e| TypeError::Serialization(e.to_string()))?;

        match Namespace::parse(tag)? {
            Namespace::Public => raw.into_public(BoardNamespace::Public),
            Namespace::Tests => raw.into_public(BoardNamespace::Tests),
            Namespace::Chats => raw.into_chat(),
            Namespace::Friends => raw.into_friend(),
            Namespace::Profiles => Err(TypeError::UnknownNamespace(tag.to_string())),
        }
    }
}

impl From<PublicMessage> for UpdatePayload {
    fn from(m: PublicMessage) -> Self {
        UpdatePayload::PublicMessage(m)
    }
}

impl From<ChatMessage> for UpdatePayload {
    fn from(m: ChatMessage) -> Self {
        UpdatePayload::ChatMessage(m)
    }
}

impl From<FriendEdge> for UpdatePayload {
    fn from(e: FriendEdge) -> Self {
        UpdatePayload::FriendEdge(e)
    }
}

/// Every field any payload shape may carry, all optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUpdate {
    message_id: Option<String>,
    author_name: Option<String>,
    body: Option<String>,
    sent_at_epoch_millis: Option<u64>,
    from_uid: Option<String>,
    to_uid: Option<String>,
    owner_uid: Option<String>,
    friend_uid: Option<String>,
}

/// Identifiers count as missing when absent or empty.
fn require_id(value: Option<String>, field: &'static str) -> TypeResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(TypeError::MissingField(field)),
    }
}

fn require<T>(value: Option<T>, field: &'static str) -> TypeResult<T> {
    value.ok_or(TypeError::MissingField(field))
}

impl RawUpdate {
    fn record(&mut self) -> TypeResult<MessageRecord> {
        Ok(MessageRecord {
            author_name: require(self.author_name.take(), "authorName")?,
            body: require(self.body.take(), "body")?,
            sent_at_epoch_millis: require(self.sent_at_epoch_millis, "sentAtEpochMillis")?,
        })
    }

    fn into_public(mut self, namespace: BoardNamespace) -> TypeResult<UpdatePayload> {
        let message_id = require_id(self.message_id.take(), "messageId")?;
        let record = self.record()?;
        Ok(UpdatePayload::PublicMessage(PublicMessage {
            namespace,
            message_id,
            record,
        }))
    }

    fn into_chat(mut self) -> TypeResult<UpdatePayload> {
        let from_uid = require_id(self.from_uid.take(), "fromUid")?;
        let to_uid = require_id(self.to_uid.take(), "toUid")?;
        let message_id = require_id(self.message_id.take(), "messageId")?;
        let record = self.record()?;
        Ok(UpdatePayload::ChatMessage(ChatMessage {
            from_uid,
            to_uid,
            message_id,
            record,
        }))
    }

    fn into_friend(self) -> TypeResult<UpdatePayload> {
        Ok(UpdatePayload::FriendEdge(FriendEdge {
            owner_uid: require_id(self.owner_uid, "ownerUid")?,
            friend_uid: require_id(self.friend_uid, "friendUid")?,
        }))
    }
}

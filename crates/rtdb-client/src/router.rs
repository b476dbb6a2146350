//! Routing of update payloads to multi-path write entries.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use rtdb_types::{DatabasePath, MessageRecord, UpdatePayload};

use crate::error::{ClientError, ClientResult};

/// The flattened entry set of one atomic multi-path update.
///
/// Keys are absolute store paths without a leading slash.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateBatch {
    entries: BTreeMap<String, Value>,
}

impl UpdateBatch {
    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    fn insert(&mut self, path: DatabasePath, value: Value) {
        self.entries.insert(path.to_string(), value);
    }

    fn extend(&mut self, other: UpdateBatch) {
        self.entries.extend(other.entries);
    }
}

/// Maps each [`UpdatePayload`] variant to the store entries it writes.
///
/// | payload          | entry                                   | value            |
/// |------------------|-----------------------------------------|------------------|
/// | `PublicMessage`  | `{public,tests}/{messageId}`            | message record   |
/// | `ChatMessage`    | `chats/{fromUid}/{toUid}/{messageId}`   | message record   |
/// | `FriendEdge`     | `friends/{ownerUid}/{friendUid}`        | `{friendUid}`    |
///
/// Chat and friend keys are directional. Nothing is mirrored.
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteRouter;

impl WriteRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, payload: &UpdatePayload) -> ClientResult<UpdateBatch> {
        let mut batch = UpdateBatch::default();
        match payload {
            UpdatePayload::PublicMessage(message) => {
                require("messageId", &message.message_id)?;
                let path =
                    DatabasePath::board_message(message.namespace.namespace(), &message.message_id)?;
                batch.insert(path, record_value(&message.record)?);
            }
            UpdatePayload::ChatMessage(message) => {
                require("fromUid", &message.from_uid)?;
                require("toUid", &message.to_uid)?;
                require("messageId", &message.message_id)?;
                let path = DatabasePath::chat_message(
                    &message.from_uid,
                    &message.to_uid,
                    &message.message_id,
                )?;
                batch.insert(path, record_value(&message.record)?);
            }
            UpdatePayload::FriendEdge(edge) => {
                require("ownerUid", &edge.owner_uid)?;
                require("friendUid", &edge.friend_uid)?;
                let path = DatabasePath::friend_edge(&edge.owner_uid, &edge.friend_uid)?;
                batch.insert(path, json!({ "friendUid": edge.friend_uid }));
            }
        }
        debug!(namespace = %payload.namespace(), entries = batch.len(), "payload routed");
        Ok(batch)
    }

    /// Decode a loosely-typed payload and route it.
    pub fn route_json(&self, payload: &Value) -> ClientResult<UpdateBatch> {
        let payload = UpdatePayload::from_json(payload)?;
        self.route(&payload)
    }

    /// Route several payloads into one batch, so they land atomically.
    ///
    /// Later payloads overwrite earlier ones that address the same key.
    pub fn route_all(&self, payloads: &[UpdatePayload]) -> ClientResult<UpdateBatch> {
        let mut batch = UpdateBatch::default();
        for payload in payloads {
            batch.extend(self.route(payload)?);
        }
        Ok(batch)
    }
}

fn require(field: &'static str, value: &str) -> ClientResult<()> {
    if value.is_empty() {
        Err(ClientError::MissingField(field))
    } else {
        Ok(())
    }
}

fn record_value(record: &MessageRecord) -> ClientResult<Value> {
    Ok(serde_json::to_value(record)?)
}

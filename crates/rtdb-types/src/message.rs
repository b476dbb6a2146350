use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A single chronological message as stored under `public/`, `tests/` or
/// `chats/`.
///
/// Records are ordered by `sent_at_epoch_millis` ascending; reads ask for the
/// most recent window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub author_name: String,
    pub body: String,
    pub sent_at_epoch_millis: u64,
}

impl MessageRecord {
    /// Create a record with an explicit send time.
    pub fn new(
        author_name: impl Into<String>,
        body: impl Into<String>,
        sent_at_epoch_millis: u64,
    ) -> Self {
        Self {
            author_name: author_name.into(),
            body: body.into(),
            sent_at_epoch_millis,
        }
    }

    /// Create a record stamped with the current wall-clock time.
    pub fn now(author_name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(author_name, body, now_epoch_millis())
    }
}

/// Wall-clock milliseconds since the UNIX epoch.
pub fn now_epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Generate a fresh, time-ordered message id (UUID v7).
///
/// Ids generated later sort after ids generated earlier, so message keys
/// enumerate roughly in send order even without the order-by clause.
pub fn new_message_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_fields() {
        let record = MessageRecord::new("Ann", "hello", 1_700_000_000_000);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["authorName"], "Ann");
        assert_eq!(json["body"], "hello");
        assert_eq!(json["sentAtEpochMillis"], 1_700_000_000_000u64);
    }

    #[test]
    fn now_uses_current_time() {
        let before = now_epoch_millis();
        let record = MessageRecord::now("Ann", "hi");
        assert!(record.sent_at_epoch_millis >= before);
    }

    #[test]
    fn message_ids_are_unique() {
        let a = new_message_id();
        let b = new_message_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}

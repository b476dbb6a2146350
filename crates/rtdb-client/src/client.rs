use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rtdb_store::RemoteStore;
use rtdb_types::{ProfilePayload, UpdatePayload};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::normalize::{ReadMode, ReadValue};
use crate::profile::ProfileWriter;
use crate::router::{UpdateBatch, WriteRouter};
use crate::subscription::{DataCallback, SubscriptionRegistry};

/// Acknowledgement of a completed write: the store paths it touched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub paths: Vec<String>,
}

/// Client facade over a [`RemoteStore`].
///
/// Cloning is cheap. Clones share the subscription registry, so reads of
/// one path from any clone collapse into a single store listener.
#[derive(Clone)]
pub struct RealtimeDb {
    store: Arc<dyn RemoteStore>,
    config: ClientConfig,
    subscriptions: SubscriptionRegistry,
    router: WriteRouter,
    profiles: ProfileWriter,
}

impl RealtimeDb {
    /// Create a client with the default configuration.
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::build(store, ClientConfig::default())
    }

    /// Create a client with a validated configuration.
    pub fn with_config(store: Arc<dyn RemoteStore>, config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        Ok(Self::build(store, config))
    }

    fn build(store: Arc<dyn RemoteStore>, config: ClientConfig) -> Self {
        Self {
            subscriptions: SubscriptionRegistry::new(Arc::clone(&store), config.clone()),
            router: WriteRouter::new(),
            profiles: ProfileWriter::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ---- Reads ----

    /// Read `path` and keep listening.
    ///
    /// `on_data` receives the first snapshot and every later change. The
    /// returned result settles with the first snapshot only. See
    /// [`SubscriptionRegistry::read`] for the failure modes.
    ///
    /// A reader that settles stays attached for the life of the client, so
    /// each call adds one more callback to the path's listener. Callers that
    /// read the same path repeatedly should use
    /// [`read_user_data_with_cancel`](Self::read_user_data_with_cancel) and
    /// cancel readers they no longer need.
    pub async fn read_user_data<F>(
        &self,
        path: &str,
        mode: ReadMode,
        on_data: F,
    ) -> ClientResult<ReadValue>
    where
        F: Fn(&ReadValue) + Send + Sync + 'static,
    {
        self.read_user_data_with_cancel(path, mode, on_data, CancellationToken::new())
            .await
    }

    /// Like [`read_user_data`](Self::read_user_data), but the reader detaches
    /// once `cancel` fires.
    pub async fn read_user_data_with_cancel<F>(
        &self,
        path: &str,
        mode: ReadMode,
        on_data: F,
        cancel: CancellationToken,
    ) -> ClientResult<ReadValue>
    where
        F: Fn(&ReadValue) + Send + Sync + 'static,
    {
        let on_data: DataCallback = Arc::new(on_data);
        self.subscriptions.read(path, mode, on_data, cancel).await
    }

    /// Read the configured default path, `public/` unless overridden.
    pub async fn read_public<F>(&self, mode: ReadMode, on_data: F) -> ClientResult<ReadValue>
    where
        F: Fn(&ReadValue) + Send + Sync + 'static,
    {
        let path = self.config.default_read_path.clone();
        self.read_user_data(&path, mode, on_data).await
    }

    /// Number of store listeners currently held by this client.
    pub fn active_listeners(&self) -> usize {
        self.subscriptions.active_listeners()
    }

    // ---- Profile writes ----

    /// Overwrite `profiles/{userUid}` with `profile`.
    pub async fn write_user_data(&self, profile: ProfilePayload) -> ClientResult<WriteAck> {
        self.profiles.write(profile).await
    }

    /// Decode a loosely-typed profile and write it.
    pub async fn write_user_data_json(&self, profile: &Value) -> ClientResult<WriteAck> {
        if profile.is_null() {
            return Err(ClientError::MissingField("payload"));
        }
        let profile: ProfilePayload = serde_json::from_value(profile.clone())?;
        self.write_user_data(profile).await
    }

    // ---- Incremental updates ----

    /// Route `payload` and apply it as one atomic multi-path update.
    pub async fn update_user_data(
        &self,
        payload: impl Into<UpdatePayload>,
    ) -> ClientResult<WriteAck> {
        let batch = self.router.route(&payload.into())?;
        self.apply(batch).await
    }

    /// Decode a loosely-typed payload by its `namespace` tag, then update.
    pub async fn update_user_data_json(&self, payload: &Value) -> ClientResult<WriteAck> {
        let batch = self.router.route_json(payload)?;
        self.apply(batch).await
    }

    /// Apply several payloads in one atomic update.
    pub async fn update_user_data_batch(
        &self,
        payloads: &[UpdatePayload],
    ) -> ClientResult<WriteAck> {
        let batch = self.router.route_all(payloads)?;
        self.apply(batch).await
    }

    async fn apply(&self, batch: UpdateBatch) -> ClientResult<WriteAck> {
        if batch.is_empty() {
            return Ok(WriteAck::default());
        }
        if let Err(err) = self.store.update(batch.entries()).await {
            warn!(entries = batch.len(), error = %err, "multi-path update failed");
            return Err(err.into());
        }
        let paths = batch.paths();
        info!(entries = paths.len(), "multi-path update applied");
        Ok(WriteAck { paths })
    }
}

impl std::fmt::Debug for RealtimeDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeDb")
            .field("config", &self.config)
            .field("active_listeners", &self.active_listeners())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rtdb_store::{InMemoryStore, StoreError};
    use rtdb_types::{BoardNamespace, ChatMessage, FriendEdge, MessageRecord, PublicMessage};
    use serde_json::json;

    fn db() -> (Arc<InMemoryStore>, RealtimeDb) {
        let store = Arc::new(InMemoryStore::new());
        let db = RealtimeDb::new(store.clone());
        (store, db)
    }

    // ---------------------------------------------------------------
    // Round trips
    // ---------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn public_message_round_trips_through_array_read() {
        let (_, db) = db();
        let record = MessageRecord::new("Ann", "hello board", 1_700_000_000_123);
        let ack = db
            .update_user_data(PublicMessage {
                namespace: BoardNamespace::Public,
                message_id: "m1".into(),
                record: record.clone(),
            })
            .await
            .unwrap();
        assert_eq!(ack.paths, vec!["public/m1".to_string()]);

        let value = db.read_public(ReadMode::Array, |_| {}).await.unwrap();
        assert_eq!(value.messages().unwrap(), vec![record]);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_thread_is_read_per_direction() {
        let (_, db) = db();
        db.update_user_data(ChatMessage::new("A", "B", MessageRecord::new("A", "hi", 1)))
            .await
            .unwrap();

        let forward = db
            .read_user_data("chats/A/B", ReadMode::Array, |_| {})
            .await
            .unwrap();
        assert_eq!(forward.len(), 1);

        let backward = db.read_user_data("chats/B/A", ReadMode::Array, |_| {}).await;
        assert!(matches!(backward, Err(ClientError::NoData { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn live_callback_sees_later_updates() {
        let (_, db) = db();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let first = db
            .read_user_data("tests", ReadMode::Array, move |v: &ReadValue| {
                sink.lock().unwrap().push(v.len());
            })
            .await;
        assert!(matches!(first, Err(ClientError::NoData { .. })));

        db.update_user_data(PublicMessage::new(
            BoardNamespace::Tests,
            MessageRecord::new("bot", "ping", 5),
        ))
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;

        assert_eq!(seen.lock().unwrap().as_slice(), &[0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_repeat_readers_release_listener() {
        let (store, db) = db();
        store
            .set("public/m1", &json!({ "authorName": "a", "body": "b", "sentAtEpochMillis": 1 }))
            .await
            .unwrap();

        let tokens: Vec<CancellationToken> = (0..3).map(|_| CancellationToken::new()).collect();
        for token in &tokens {
            db.read_user_data_with_cancel("public", ReadMode::Array, |_| {}, token.clone())
                .await
                .unwrap();
        }
        assert_eq!(db.subscriptions.reader_count("public"), 3);
        assert_eq!(store.registration_count(), 1);

        for token in &tokens {
            token.cancel();
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        assert_eq!(db.subscriptions.reader_count("public"), 0);
        assert_eq!(db.active_listeners(), 0);
        assert_eq!(store.listener_count(), 0);
    }

    // ---------------------------------------------------------------
    // Updates
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn unknown_namespace_issues_no_write() {
        let (store, db) = db();
        let err = db
            .update_user_data_json(&json!({
                "namespace": "bogus",
                "messageId": "m1",
                "authorName": "Ann",
                "body": "x",
                "sentAtEpochMillis": 1,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidPath);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_namespace_is_missing_field() {
        let (store, db) = db();
        assert_eq!(
            db.update_user_data_json(&json!({ "messageId": "m1" })).await,
            Err(ClientError::MissingField("namespace"))
        );
        assert_eq!(
            db.update_user_data_json(&Value::Null).await,
            Err(ClientError::MissingField("payload"))
        );
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn friend_edges_are_not_mirrored() {
        let (store, db) = db();
        db.update_user_data(FriendEdge::new("A", "B")).await.unwrap();
        assert_eq!(store.value_at("friends/A/B"), Some(json!({ "friendUid": "B" })));
        assert_eq!(store.value_at("friends/B/A"), None);
    }

    #[tokio::test]
    async fn batch_lands_as_one_write() {
        let (store, db) = db();
        let edge = FriendEdge::new("A", "B");
        let ack = db
            .update_user_data_batch(&[edge.clone().into(), edge.reversed().into()])
            .await
            .unwrap();
        assert_eq!(ack.paths.len(), 2);
        assert_eq!(store.write_count(), 1);
        assert!(store.value_at("friends/B/A").is_some());
    }

    #[tokio::test]
    async fn empty_batch_skips_store() {
        let (store, db) = db();
        let ack = db.update_user_data_batch(&[]).await.unwrap();
        assert!(ack.paths.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn update_failure_is_store_error() {
        let (store, db) = db();
        store.fail_writes(Some("offline"));
        let result = db.update_user_data(FriendEdge::new("A", "B")).await;
        assert_eq!(
            result,
            Err(ClientError::Store(StoreError::Rejected("offline".into())))
        );
    }

    // ---------------------------------------------------------------
    // Profiles
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn profile_json_defaults_text_fields() {
        let (store, db) = db();
        db.write_user_data_json(&json!({ "userUid": "u1", "userName": "Ann" }))
            .await
            .unwrap();
        let stored = store.value_at("profiles/u1").unwrap();
        assert_eq!(stored["lastName"], "");
        assert_eq!(stored["state"], "");
        assert_eq!(stored["about"], "");
        assert_eq!(stored["userName"], "Ann");
    }

    #[tokio::test]
    async fn profile_json_requires_identity() {
        let (_, db) = db();
        assert_eq!(
            db.write_user_data_json(&Value::Null).await,
            Err(ClientError::MissingField("payload"))
        );
        assert_eq!(
            db.write_user_data_json(&json!({ "userName": "Ann" })).await,
            Err(ClientError::MissingField("userUid"))
        );
    }

    // ---------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------

    #[test]
    fn invalid_config_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let config = ClientConfig {
            read_timeout_ms: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(
            RealtimeDb::with_config(store, config),
            Err(ClientError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn read_public_uses_configured_path() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set("tests/t1", &json!({ "authorName": "a", "body": "b", "sentAtEpochMillis": 1 }))
            .await
            .unwrap();
        let config = ClientConfig::from_toml_str("default_read_path = \"tests/\"").unwrap();
        let db = RealtimeDb::with_config(store, config).unwrap();

        let value = db.read_public(ReadMode::Array, |_| {}).await.unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(db.active_listeners(), 1);
    }
}

use std::sync::Arc;

use tracing::{info, warn};

use rtdb_store::RemoteStore;
use rtdb_types::ProfilePayload;

use crate::error::ClientResult;
use crate::WriteAck;

/// Writes whole profile documents to `profiles/{userUid}`.
///
/// Every write is a full overwrite. Fields absent from the payload are not
/// merged with what is stored; `lastName`, `state` and `about` are written
/// as empty strings instead.
#[derive(Clone)]
pub struct ProfileWriter {
    store: Arc<dyn RemoteStore>,
}

impl ProfileWriter {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn write(&self, payload: ProfilePayload) -> ClientResult<WriteAck> {
        let path = payload.path()?.to_string();
        let document = payload.into_document()?;
        let value = serde_json::to_value(&document)?;

        if let Err(err) = self.store.set(&path, &value).await {
            warn!(path = %path, error = %err, "profile write failed");
            return Err(err.into());
        }
        info!(path = %path, "profile written");
        Ok(WriteAck { paths: vec![path] })
    }
}

impl std::fmt::Debug for ProfileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileWriter").finish_non_exhaustive()
    }
}

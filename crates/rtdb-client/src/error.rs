use std::time::Duration;

use thiserror::Error;

use rtdb_store::StoreError;
use rtdb_types::TypeError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("no data at {path}")]
    NoData { path: String },

    #[error("no snapshot for {path} within {after:?}")]
    Timeout { path: String, after: Duration },

    #[error("read of {path} was cancelled")]
    Cancelled { path: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of a [`ClientError`], for callers that branch on
/// the failure kind rather than its detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    MissingField,
    NoData,
    Timeout,
    Cancelled,
    Store,
    Serialization,
    Config,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::InvalidPath(_) => ErrorKind::InvalidPath,
            ClientError::MissingField(_) => ErrorKind::MissingField,
            ClientError::NoData { .. } => ErrorKind::NoData,
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::Cancelled { .. } => ErrorKind::Cancelled,
            ClientError::Store(_) => ErrorKind::Store,
            ClientError::Serialization(_) => ErrorKind::Serialization,
            ClientError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<TypeError> for ClientError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::MissingField(field) => ClientError::MissingField(field),
            TypeError::Serialization(msg) => ClientError::Serialization(msg),
            other => ClientError::InvalidPath(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_errors_map_to_client_kinds() {
        assert_eq!(
            ClientError::from(TypeError::EmptyPath).kind(),
            ErrorKind::InvalidPath
        );
        assert_eq!(
            ClientError::from(TypeError::UnknownNamespace("bogus".into())).kind(),
            ErrorKind::InvalidPath
        );
        assert_eq!(
            ClientError::from(TypeError::MissingField("userUid")),
            ClientError::MissingField("userUid")
        );
    }

    #[test]
    fn store_errors_are_wrapped_verbatim() {
        let err = ClientError::from(StoreError::Rejected("denied".into()));
        assert_eq!(err.kind(), ErrorKind::Store);
        assert_eq!(err.to_string(), "store error: write rejected: denied");
    }
}

use thiserror::Error;

/// Errors produced while building paths and payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("store path must not be empty")]
    EmptyPath,

    #[error("unknown namespace: {0:?}")]
    UnknownNamespace(String),

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for type-level operations.
pub type TypeResult<T> = Result<T, TypeError>;

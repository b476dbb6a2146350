use rtdb_types::TypeError;

/// Errors from remote store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A path or key was rejected by the store.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Two entries of one multi-path update address the same subtree.
    #[error("overlapping update paths: {first:?} and {second:?}")]
    OverlappingPaths { first: String, second: String },

    /// The store refused the write (permissions, quota, validation rules).
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The store connection is gone and cannot accept requests.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn invalid_path(path: &str, err: TypeError) -> Self {
        StoreError::InvalidPath {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

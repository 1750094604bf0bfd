use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// A key the caller expected to be present is missing.
    #[error("{key} not found")]
    NotFound { key: String },

    #[error("storage engine failure: {reason}")]
    Engine { reason: String },

    #[error("failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    #[error("corrupt {what}: {reason}")]
    Corrupt { what: &'static str, reason: String },
}

use thiserror::Error;

/// Storage-layer failures. Grounded in `sentinel-registry`'s error shape —
/// a thin wrapper over the two things that can actually go wrong against an
/// embedded database: the database itself, and the JSON we serialize into it.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("extension not found: {0}")]
    NotFound(String),
    #[error("illegal scan state transition for {extension_id}: {from} -> {to}")]
    IllegalTransition { extension_id: String, from: String, to: String },
    #[error("hash mismatch for {extension_id}: stored hash is immutable once set")]
    HashMismatch { extension_id: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

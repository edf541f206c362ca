//! Store, storage, and configuration error types

use thiserror::Error;

/// Errors surfaced to the caller of a store operation
#[derive(Error, Debug)]
pub enum StoreError {
    /// The update could not be applied as a state change
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A replacement function failed; nothing was committed
    #[error("state update function failed: {0:#}")]
    UpdateFunction(anyhow::Error),
}

/// Errors raised by a storage backend
///
/// The store never surfaces these: persistence is best-effort and failures
/// are logged.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend cannot currently be read or written
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Writing the value would exceed the backend's quota
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Snapshot could not be serialized
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading a store configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

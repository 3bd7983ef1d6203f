//! Durable key-value storage.
//!
//! The session manager keeps its marker here
//! ([`crate::env::store::SESSION_MARKER_KEY`]) and the notification registrar
//! caches the push token ([`crate::env::store::PUSH_TOKEN_KEY`]). The command
//! line client also saves the backend cookie between runs.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// String key-value store that survives process restarts
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Errors raised by storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage data is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

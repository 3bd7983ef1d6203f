use crate::store::{KeyValueStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;

/// Process-local store, used when nothing must outlive the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a key without going through the async interface
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|value| value.clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("memberId").await.unwrap(), None);

        store.set("memberId", "42").await.unwrap();
        assert_eq!(store.peek("memberId").as_deref(), Some("42"));

        store.remove("memberId").await.unwrap();
        store.remove("memberId").await.unwrap();
        assert_eq!(store.get("memberId").await.unwrap(), None);
    }
}

use crate::env;
use crate::store::{KeyValueStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Entries = BTreeMap<String, String>;

/// JSON-file backed store with atomic replace-on-write
///
/// The whole map is loaded on first access and kept in memory. Every write
/// serializes the map to a temporary file in the same directory and renames
/// it over the store file, so readers never observe a half-written file.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Option<Entries>>,
}

impl FileStore {
    /// Open the store file inside `data_dir`, creating the directory if needed
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self::at_path(env::store_file_path(data_dir)))
    }

    /// Use an explicit store file path
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries, StoreError> {
        let content = match async_fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Entries>(&content) {
            Ok(entries) => {
                debug!("Loaded {} entries from {}", entries.len(), self.path.display());
                Ok(entries)
            }
            Err(e) => {
                // Keep the unreadable file for inspection and start empty
                let corrupt_path = self.path.with_extension("json.corrupt");
                warn!(
                    "Store file {} is corrupt ({}), moving it to {}",
                    self.path.display(),
                    e,
                    corrupt_path.display()
                );
                async_fs::rename(&self.path, &corrupt_path).await?;
                Ok(Entries::new())
            }
        }
    }

    async fn persist(&self, entries: &Entries) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(entries)?;
        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));

        let mut file = async_fs::File::create(&temp_path).await?;
        let written = async {
            file.write_all(&content).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = async_fs::rename(&temp_path, &self.path).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Apply `change` to the loaded map and persist it when it reports a modification
    async fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Entries) -> bool,
    {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let Some(entries) = guard.as_mut() else {
            return Ok(());
        };

        let mut next = entries.clone();
        if change(&mut next) {
            self.persist(&next).await?;
            *entries = next;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let store = FileStore::open(temp_dir.path()).unwrap();
        store.set("memberId", "42").await.unwrap();
        store.set("pushToken", "tok-1").await.unwrap();
        store.remove("pushToken").await.unwrap();

        let reopened = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.get("memberId").await.unwrap().as_deref(), Some("42"));
        assert_eq!(reopened.get("pushToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();

        assert_eq!(store.get("memberId").await.unwrap(), None);
        store.remove("memberId").await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_set_aside() {
        let temp_dir = TempDir::new().unwrap();
        let path = env::store_file_path(temp_dir.path());
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.get("memberId").await.unwrap(), None);
        assert!(path.with_extension("json.corrupt").exists());

        store.set("memberId", "7").await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"memberId\""));
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.set("memberId", "1").await.unwrap();
        store.set("memberId", "2").await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

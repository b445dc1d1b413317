use crate::model::StorageError;
use crate::storage::{validate_name, DocumentStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// In-process store for exercising the service without a data directory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn with_files<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            files: Mutex::new(
                files
                    .into_iter()
                    .map(|(name, text)| (name.to_string(), text.to_string()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStorage {
    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.files.lock().await.keys().cloned().collect())
    }

    async fn read(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.files.lock().await.get(name).cloned())
    }

    async fn write(&self, name: &str, contents: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        self.files
            .lock()
            .await
            .insert(name.to_string(), contents.to_string());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.files.lock().await.remove(name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.files.lock().await.contains_key(name))
    }
}

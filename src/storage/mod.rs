// Persistence of JSON documents
pub mod json_file;
#[cfg(test)]
pub mod memory;

pub use json_file::JsonFileStorage;

use crate::model::{Document, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Flat collection of named JSON files.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of all `*.json` files, sorted.
    async fn list(&self) -> Result<Vec<String>, StorageError>;
    /// File contents, or `None` when the file does not exist.
    async fn read(&self, name: &str) -> Result<Option<String>, StorageError>;
    /// Replaces the whole file.
    async fn write(&self, name: &str, contents: &str) -> Result<(), StorageError>;
    /// Deletes the file; deleting a missing file is not an error.
    async fn remove(&self, name: &str) -> Result<(), StorageError>;
    async fn exists(&self, name: &str) -> Result<bool, StorageError>;
}

/// Rejects names that would escape the data directory.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let valid = name.ends_with(".json")
        && name.len() > ".json".len()
        && !name.starts_with('.')
        && !name.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

pub async fn load_document<S>(store: &S, name: &str) -> Result<Option<Document>, StorageError>
where
    S: DocumentStore + ?Sized,
{
    match store.read(name).await? {
        Some(text) => Ok(Some(Document::from_json(&text)?)),
        None => Ok(None),
    }
}

pub async fn save_document<S>(store: &S, name: &str, document: &Document) -> Result<(), StorageError>
where
    S: DocumentStore + ?Sized,
{
    let text = document.to_json_pretty()?;
    store.write(name, &text).await
}

/// One mutex per document name so read-modify-write cycles on the same file
/// never interleave.
#[derive(Debug, Default)]
pub struct DocumentLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

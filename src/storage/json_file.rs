use crate::model::StorageError;
use crate::storage::{validate_name, DocumentStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

/// Documents stored as `*.json` files in one directory.
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl DocumentStore for JsonFileStorage {
    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, name: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(name)?).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a temporary sibling first and renames it over the target,
    /// so readers never observe a half-written file.
    async fn write(&self, name: &str, contents: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        fs::create_dir_all(&self.root).await?;

        let tmp = self
            .root
            .join(format!(".{}.{:08x}.tmp", name, rand::random::<u32>()));
        if let Err(e) = fs::write(&tmp, contents).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            warn!("Failed to replace {}: {}", path.display(), e);
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!("Saved {}", path.display());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.path(name)?).await?)
    }
}

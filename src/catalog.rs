// Catalog of section documents, rebuilt from storage for every request
use crate::model::{Document, StorageError};
use crate::storage::{load_document, DocumentStore};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CatalogDocument {
    pub file_name: String,
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSummary {
    pub name: String,
    pub filename: String,
    pub characteristics_count: usize,
}

/// Snapshot of every readable section document, ordered by file name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    documents: Vec<CatalogDocument>,
}

impl Catalog {
    /// Loads every JSON file except the users file. Files that cannot be read
    /// or parsed are skipped with a warning.
    pub async fn scan<S>(store: &S, users_file: &str) -> Result<Self, StorageError>
    where
        S: DocumentStore + ?Sized,
    {
        let names: Vec<String> = store
            .list()
            .await?
            .into_iter()
            .filter(|name| name != users_file)
            .collect();

        let loads = names.iter().map(|name| load_document(store, name));
        let results = join_all(loads).await;

        let mut documents = Vec::with_capacity(names.len());
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(Some(document)) => documents.push(CatalogDocument {
                    file_name: name,
                    document,
                }),
                Ok(None) => debug!("{} disappeared during scan", name),
                Err(e) => warn!("Skipping unreadable document {}: {}", name, e),
            }
        }

        debug!("Catalog scanned: {} documents", documents.len());
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[CatalogDocument] {
        &self.documents
    }

    /// First document holding a table called `section`.
    pub fn find_section(&self, section: &str) -> Option<&CatalogDocument> {
        self.documents
            .iter()
            .find(|doc| doc.document.table(section).is_some())
    }

    pub fn contains_section(&self, section: &str) -> bool {
        self.find_section(section).is_some()
    }

    /// Named tables with their row counts, header row excluded.
    pub fn sections(&self) -> Vec<SectionSummary> {
        self.documents
            .iter()
            .flat_map(|doc| {
                doc.document
                    .tables()
                    .iter()
                    .filter(|table| !table.name().is_empty())
                    .map(|table| SectionSummary {
                        name: table.name().to_string(),
                        filename: doc.file_name.clone(),
                        characteristics_count: table.rows().len().saturating_sub(1),
                    })
            })
            .collect()
    }
}

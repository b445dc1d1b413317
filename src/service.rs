// Dashboard operations: authorization, catalog lookup, locked rewrites
use crate::catalog::{Catalog, SectionSummary};
use crate::config::AppConfig;
use crate::editor::{self, CharacteristicSummary, FieldUpdate, NewCharacteristic};
use crate::model::{DashboardError, Document, Row, Table};
use crate::resolver::find_row;
use crate::storage::{load_document, save_document, DocumentLocks, DocumentStore};
use crate::users::{authorize_admin, authorize_read, User};
use crate::utils::section_file_name;
use crate::view::{build_plan_view, filter_plans, merge_plan_views, PlanFilter, PlanView, ViewSettings};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Edit of one field of one characteristic, as sent by the dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateValueRequest {
    pub section: String,
    pub characteristic: String,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub new_value: String,
    #[serde(default = "default_field_type")]
    pub field_type: String,
}

fn default_field_type() -> String {
    "value".to_string()
}

pub struct Dashboard<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    locks: DocumentLocks,
    settings: ViewSettings,
    users_file: String,
}

impl<S: DocumentStore + ?Sized> Dashboard<S> {
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        Self {
            store,
            locks: DocumentLocks::default(),
            settings: ViewSettings::from_config(config),
            users_file: config.users_file.clone(),
        }
    }

    async fn catalog(&self) -> Result<Catalog, DashboardError> {
        Ok(Catalog::scan(self.store.as_ref(), &self.users_file).await?)
    }

    async fn section_file(&self, section: &str) -> Result<String, DashboardError> {
        self.catalog()
            .await?
            .find_section(section)
            .map(|doc| doc.file_name.clone())
            .ok_or_else(|| DashboardError::SectionNotFound(section.to_string()))
    }

    /// Reloads `file` under its lock, lets `edit` change the document and
    /// writes it back when `edit` succeeds.
    async fn rewrite<R>(
        &self,
        file: &str,
        edit: impl FnOnce(&mut Document) -> Result<R, DashboardError>,
    ) -> Result<R, DashboardError> {
        let _guard = self.locks.acquire(file).await;
        let mut document = load_document(self.store.as_ref(), file)
            .await?
            .ok_or_else(|| DashboardError::InvalidRequest(format!("file '{}' vanished", file)))?;
        let result = edit(&mut document)?;
        save_document(self.store.as_ref(), file, &document).await?;
        Ok(result)
    }

    /// Rewrites the table named `section`, wherever it lives.
    async fn edit_section<R>(
        &self,
        section: &str,
        edit: impl FnOnce(&mut Table) -> Result<R, DashboardError>,
    ) -> Result<R, DashboardError> {
        let file = self.section_file(section).await?;
        self.rewrite(&file, |document| {
            let table = document
                .table_mut(section)
                .ok_or_else(|| DashboardError::SectionNotFound(section.to_string()))?;
            edit(table)
        })
        .await
    }

    pub async fn plans(&self, actor: &User, filter: &PlanFilter) -> Result<Vec<PlanView>, DashboardError> {
        authorize_read(actor)?;
        let catalog = self.catalog().await?;
        let views = catalog
            .documents()
            .iter()
            .map(|doc| build_plan_view(&doc.document, &self.settings));
        let plans = merge_plan_views(views, &self.settings);
        Ok(filter_plans(plans, filter))
    }

    pub async fn sections(&self, actor: &User) -> Result<Vec<SectionSummary>, DashboardError> {
        authorize_read(actor)?;
        Ok(self.catalog().await?.sections())
    }

    pub async fn section_characteristics(
        &self,
        actor: &User,
        section: &str,
    ) -> Result<Vec<CharacteristicSummary>, DashboardError> {
        authorize_read(actor)?;
        let catalog = self.catalog().await?;
        let table = catalog
            .find_section(section)
            .and_then(|doc| doc.document.table(section))
            .ok_or_else(|| DashboardError::SectionNotFound(section.to_string()))?;
        Ok(editor::list_characteristics(table))
    }

    /// The row a characteristic name resolves to, as stored.
    pub async fn characteristic(
        &self,
        actor: &User,
        section: &str,
        name: &str,
    ) -> Result<Row, DashboardError> {
        authorize_read(actor)?;
        let catalog = self.catalog().await?;
        let table = catalog
            .find_section(section)
            .and_then(|doc| doc.document.table(section))
            .ok_or_else(|| DashboardError::SectionNotFound(section.to_string()))?;
        find_row(table.rows(), name)
            .cloned()
            .ok_or_else(|| DashboardError::CharacteristicNotFound(name.to_string()))
    }

    pub async fn update_value(&self, actor: &User, request: UpdateValueRequest) -> Result<(), DashboardError> {
        authorize_admin(actor)?;
        let update = FieldUpdate::parse(
            &request.field_type,
            request.plan_name.as_deref(),
            request.new_value,
        )?;
        self.edit_section(&request.section, |table| {
            editor::update_characteristic(table, &request.characteristic, update)
        })
        .await?;
        info!(
            "{} updated {} of '{}' in '{}'",
            actor.username, request.field_type, request.characteristic, request.section
        );
        Ok(())
    }

    /// Creates a single-table file named after the section. Returns the file name.
    pub async fn create_section(&self, actor: &User, name: &str) -> Result<String, DashboardError> {
        authorize_admin(actor)?;
        if name.trim().is_empty() {
            return Err(DashboardError::InvalidRequest("section name is empty".into()));
        }
        if self.catalog().await?.contains_section(name) {
            return Err(DashboardError::SectionExists(name.to_string()));
        }

        let file = section_file_name(name);
        let _guard = self.locks.acquire(&file).await;
        if self.store.exists(&file).await? {
            return Err(DashboardError::FileExists(file));
        }
        let document = Document::Single(editor::new_section_table(name));
        save_document(self.store.as_ref(), &file, &document).await?;
        info!("{} created section '{}' in {}", actor.username, name, file);
        Ok(file)
    }

    pub async fn rename_section(&self, actor: &User, old: &str, new: &str) -> Result<(), DashboardError> {
        authorize_admin(actor)?;
        let catalog = self.catalog().await?;
        let file = catalog
            .find_section(old)
            .map(|doc| doc.file_name.clone())
            .ok_or_else(|| DashboardError::SectionNotFound(old.to_string()))?;
        if old != new && catalog.contains_section(new) {
            return Err(DashboardError::SectionExists(new.to_string()));
        }

        self.rewrite(&file, |document| {
            let table = document
                .table_mut(old)
                .ok_or_else(|| DashboardError::SectionNotFound(old.to_string()))?;
            table.set_name(new);
            Ok(())
        })
        .await?;
        info!("{} renamed section '{}' to '{}'", actor.username, old, new);
        Ok(())
    }

    /// Drops the section's table; the file goes away with its last table.
    pub async fn delete_section(&self, actor: &User, name: &str) -> Result<(), DashboardError> {
        authorize_admin(actor)?;
        let file = self.section_file(name).await?;
        let _guard = self.locks.acquire(&file).await;

        let mut document = load_document(self.store.as_ref(), &file)
            .await?
            .filter(|doc| doc.table(name).is_some())
            .ok_or_else(|| DashboardError::SectionNotFound(name.to_string()))?;
        if document.is_bundle() {
            if !document.remove_table(name) {
                return Err(DashboardError::SectionNotFound(name.to_string()));
            }
            if !document.tables().is_empty() {
                save_document(self.store.as_ref(), &file, &document).await?;
                info!("{} deleted section '{}' from {}", actor.username, name, file);
                return Ok(());
            }
        }
        self.store.remove(&file).await?;
        info!("{} deleted section '{}' ({} removed)", actor.username, name, file);
        Ok(())
    }

    pub async fn add_characteristic(
        &self,
        actor: &User,
        section: &str,
        characteristic: NewCharacteristic,
    ) -> Result<(), DashboardError> {
        authorize_admin(actor)?;
        let name = characteristic.name.clone();
        self.edit_section(section, |table| {
            editor::add_characteristic(table, characteristic);
            Ok(())
        })
        .await?;
        info!("{} added '{}' to '{}'", actor.username, name, section);
        Ok(())
    }

    pub async fn rename_characteristic(
        &self,
        actor: &User,
        section: &str,
        old: &str,
        new: &str,
    ) -> Result<(), DashboardError> {
        authorize_admin(actor)?;
        self.edit_section(section, |table| editor::rename_characteristic(table, old, new))
            .await?;
        info!("{} renamed '{}' to '{}' in '{}'", actor.username, old, new, section);
        Ok(())
    }

    pub async fn delete_characteristic(
        &self,
        actor: &User,
        section: &str,
        name: &str,
    ) -> Result<(), DashboardError> {
        authorize_admin(actor)?;
        self.edit_section(section, |table| editor::delete_characteristic(table, name).map(|_| ()))
            .await?;
        info!("{} deleted '{}' from '{}'", actor.username, name, section);
        Ok(())
    }

    pub async fn reorder_characteristics(
        &self,
        actor: &User,
        section: &str,
        order: &[String],
    ) -> Result<(), DashboardError> {
        authorize_admin(actor)?;
        self.edit_section(section, |table| {
            editor::reorder_characteristics(table, order);
            Ok(())
        })
        .await?;
        info!("{} reordered '{}'", actor.username, section);
        Ok(())
    }

    /// Batch clean-up of legacy pain columns in every document. Returns the
    /// number of rows changed.
    pub async fn consolidate_all(&self, actor: &User) -> Result<usize, DashboardError> {
        authorize_admin(actor)?;
        let catalog = self.catalog().await?;
        let mut total = 0;
        for doc in catalog.documents() {
            let changed = self
                .rewrite(&doc.file_name, |document| Ok(editor::consolidate_document(document)))
                .await?;
            info!("{}: {} rows changed", doc.file_name, changed);
            total += changed;
        }
        info!("Consolidation finished: {} rows changed", total);
        Ok(total)
    }
}

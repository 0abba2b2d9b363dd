//! Document store - per-collection JSON records keyed by id
//!
//! Two implementations:
//! - `SqliteStore`: one row per document, atomic read-merge-write
//! - `JsonFileStore`: the legacy single-file format, rewritten wholesale

pub mod json_file;
pub mod sqlite;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::models::Collection;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteStore;

/// Storage port for the persistence backend
pub trait Store: Send + Sync {
    /// All documents of a collection, optionally only those of one owner
    fn list(&self, collection: Collection, owner: Option<&str>) -> Result<Vec<Value>>;

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Insert or replace by id
    fn put(&self, collection: Collection, id: &str, doc: Value) -> Result<()>;

    /// Read-modify-write one document; `NotFound` if it doesn't exist.
    /// Returns the document as written.
    fn modify(
        &self,
        collection: Collection,
        id: &str,
        f: &mut dyn FnMut(Value) -> Result<Value>,
    ) -> Result<Value>;

    /// Returns whether a document was deleted
    fn remove(&self, collection: Collection, id: &str) -> Result<bool>;
}

/// The on-disk JSON document: one array per collection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreDocument {
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(default)]
    pub students: Vec<Value>,
    #[serde(default)]
    pub workouts: Vec<Value>,
    #[serde(default)]
    pub diets: Vec<Value>,
    #[serde(default)]
    pub progress: Vec<Value>,
    #[serde(default)]
    pub media: Vec<Value>,
}

impl StoreDocument {
    pub fn collection(&self, collection: Collection) -> &Vec<Value> {
        match collection {
            Collection::Users => &self.users,
            Collection::Students => &self.students,
            Collection::Workouts => &self.workouts,
            Collection::Diets => &self.diets,
            Collection::Progress => &self.progress,
            Collection::Media => &self.media,
        }
    }

    pub fn collection_mut(&mut self, collection: Collection) -> &mut Vec<Value> {
        match collection {
            Collection::Users => &mut self.users,
            Collection::Students => &mut self.students,
            Collection::Workouts => &mut self.workouts,
            Collection::Diets => &mut self.diets,
            Collection::Progress => &mut self.progress,
            Collection::Media => &mut self.media,
        }
    }

    pub fn len(&self) -> usize {
        Collection::all().iter().map(|c| self.collection(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn document_id(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

pub(crate) fn document_owner(collection: Collection, doc: &Value) -> Option<&str> {
    collection
        .owner_field()
        .and_then(|field| doc.get(field))
        .and_then(Value::as_str)
}

/// Open the store selected by configuration
pub fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    let path = config.store_path();
    info!("Opening {:?} store at {}", config.store_backend, path.display());
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&path)?),
        StoreBackend::JsonFile => Arc::new(JsonFileStore::new(&path)),
    };
    Ok(store)
}

/// Snapshot every collection into the JSON file format
pub fn export_document(store: &dyn Store) -> Result<StoreDocument> {
    let mut doc = StoreDocument::default();
    for collection in Collection::all() {
        *doc.collection_mut(*collection) = store.list(*collection, None)?;
    }
    Ok(doc)
}

/// Copy every record of a JSON document into a store; returns records written
pub fn import_document(store: &dyn Store, doc: &StoreDocument) -> Result<usize> {
    let mut written = 0;
    for collection in Collection::all() {
        for record in doc.collection(*collection) {
            let Some(id) = document_id(record) else {
                tracing::warn!("Skipping {} record without id", collection.name());
                continue;
            };
            store.put(*collection, id, record.clone())?;
            written += 1;
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_owner() {
        let doc = json!({"id": "w_1", "studentId": "s_1"});
        assert_eq!(document_owner(Collection::Workouts, &doc), Some("s_1"));
        assert_eq!(document_owner(Collection::Students, &doc), None);
        assert_eq!(document_owner(Collection::Users, &doc), None);
    }

    #[test]
    fn test_export_import_between_stores() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileStore::new(dir.path().join("data.json"));
        source.put(Collection::Students, "s_1", json!({"id": "s_1", "trainerId": "t_1"})).unwrap();
        source.put(Collection::Diets, "d_1", json!({"id": "d_1", "studentId": "s_1"})).unwrap();

        let doc = export_document(&source).unwrap();
        assert_eq!(doc.len(), 2);

        let target = SqliteStore::open_in_memory().unwrap();
        assert_eq!(import_document(&target, &doc).unwrap(), 2);
        assert_eq!(export_document(&target).unwrap(), doc);
    }

    #[test]
    fn test_import_skips_records_without_id() {
        let target = SqliteStore::open_in_memory().unwrap();
        let doc = StoreDocument {
            media: vec![json!({"url": "x"})],
            ..Default::default()
        };
        assert_eq!(import_document(&target, &doc).unwrap(), 0);
    }
}

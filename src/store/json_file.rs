//! Single-file JSON store
//!
//! Every operation reads the whole document, mutates it in memory and writes
//! the whole document back. Calls through one `JsonFileStore` are serialized,
//! but two stores (or processes) on the same file can overwrite each other's
//! changes. Prefer `SqliteStore` for anything shared.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use super::{document_id, document_owner, Store, StoreDocument};
use crate::error::{CoachError, Result};
use crate::models::Collection;

pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file; a missing file is an empty document
    pub fn load_document(&self) -> Result<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overwrite the whole file
    pub fn save_document(&self, doc: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec_pretty(doc)?)?;
        debug!("Wrote {} records to {}", doc.len(), self.path.display());
        Ok(())
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> Result<(T, bool)>,
    ) -> Result<T> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| CoachError::Storage("json store lock poisoned".to_string()))?;
        let mut doc = self.load_document()?;
        let (out, dirty) = f(&mut doc)?;
        if dirty {
            self.save_document(&doc)?;
        }
        Ok(out)
    }
}

fn position(records: &[Value], id: &str) -> Option<usize> {
    records.iter().position(|r| document_id(r) == Some(id))
}

impl Store for JsonFileStore {
    fn list(&self, collection: Collection, owner: Option<&str>) -> Result<Vec<Value>> {
        let doc = self.with_document(|doc| Ok((doc.collection(collection).clone(), false)))?;
        Ok(match owner {
            Some(owner) => doc
                .into_iter()
                .filter(|r| document_owner(collection, r) == Some(owner))
                .collect(),
            None => doc,
        })
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        self.with_document(|doc| {
            let records = doc.collection(collection);
            Ok((position(records, id).map(|i| records[i].clone()), false))
        })
    }

    fn put(&self, collection: Collection, id: &str, value: Value) -> Result<()> {
        self.with_document(|doc| {
            let records = doc.collection_mut(collection);
            match position(records, id) {
                Some(i) => records[i] = value,
                None => records.push(value),
            }
            Ok(((), true))
        })
    }

    fn modify(
        &self,
        collection: Collection,
        id: &str,
        f: &mut dyn FnMut(Value) -> Result<Value>,
    ) -> Result<Value> {
        self.with_document(|doc| {
            let records = doc.collection_mut(collection);
            let i = position(records, id)
                .ok_or_else(|| CoachError::not_found(collection.kind(), id))?;
            let updated = f(records[i].clone())?;
            records[i] = updated.clone();
            Ok((updated, true))
        })
    }

    fn remove(&self, collection: Collection, id: &str) -> Result<bool> {
        self.with_document(|doc| {
            let records = doc.collection_mut(collection);
            let before = records.len();
            records.retain(|r| document_id(r) != Some(id));
            let removed = records.len() != before;
            Ok((removed, removed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diet() -> Value {
        json!({"id": "d_1", "studentId": "s_1", "name": "Base", "notes": null})
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.list(Collection::Users, None).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_layout_has_array_per_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("db.json"));
        store.put(Collection::Diets, "d_1", diet()).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["diets"][0]["id"], "d_1");
        assert!(raw["users"].as_array().unwrap().is_empty());
        assert!(raw["media"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_modify_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("db.json"));
        store.put(Collection::Diets, "d_1", diet()).unwrap();

        let updated = store
            .modify(Collection::Diets, "d_1", &mut |mut doc| {
                doc["name"] = json!("Cut");
                Ok(doc)
            })
            .unwrap();
        assert_eq!(updated["name"], "Cut");
        assert_eq!(store.get(Collection::Diets, "d_1").unwrap().unwrap()["name"], "Cut");

        assert!(store.modify(Collection::Diets, "d_2", &mut |d| Ok(d)).unwrap_err().is_not_found());
        assert!(store.remove(Collection::Diets, "d_1").unwrap());
        assert!(store.get(Collection::Diets, "d_1").unwrap().is_none());
    }

    /// Two writers each load the file, change a different field of the same
    /// plan and save. The second save silently discards the first change.
    #[test]
    fn test_whole_file_writers_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let writer_a = JsonFileStore::new(&path);
        let writer_b = JsonFileStore::new(&path);
        writer_a.put(Collection::Diets, "d_1", diet()).unwrap();

        let mut doc_a = writer_a.load_document().unwrap();
        let mut doc_b = writer_b.load_document().unwrap();

        doc_a.diets[0]["name"] = json!("Cut");
        doc_b.diets[0]["notes"] = json!("no dairy");

        writer_a.save_document(&doc_a).unwrap();
        writer_b.save_document(&doc_b).unwrap();

        let stored = writer_a.get(Collection::Diets, "d_1").unwrap().unwrap();
        assert_eq!(stored["notes"], "no dairy");
        // writer A's rename is gone
        assert_eq!(stored["name"], "Base");
    }
}

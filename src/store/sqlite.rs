//! SQLite document store - one row per record

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;

use super::{document_owner, Store};
use crate::error::{CoachError, Result};
use crate::models::Collection;

/// Document store backed by a single SQLite table
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                owner TEXT,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX IF NOT EXISTS documents_owner ON documents (collection, owner);",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoachError::Storage("sqlite connection lock poisoned".to_string()))
    }
}

fn upsert_row(conn: &Connection, collection: Collection, id: &str, doc: &Value) -> Result<()> {
    // ON CONFLICT keeps the rowid, so list order stays insertion order
    conn.execute(
        "INSERT INTO documents (collection, id, owner, body, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (collection, id) DO UPDATE SET
            owner = excluded.owner,
            body = excluded.body,
            updated_at = excluded.updated_at",
        params![
            collection.name(),
            id,
            document_owner(collection, doc),
            serde_json::to_string(doc)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn parse_body(body: String) -> Result<Value> {
    Ok(serde_json::from_str(&body)?)
}

impl Store for SqliteStore {
    fn list(&self, collection: Collection, owner: Option<&str>) -> Result<Vec<Value>> {
        let conn = self.lock()?;
        let bodies: Vec<String> = match owner {
            Some(owner) => {
                let mut stmt = conn.prepare(
                    "SELECT body FROM documents WHERE collection = ?1 AND owner = ?2 ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map(params![collection.name(), owner], |row| row.get(0))?
                    .collect::<std::result::Result<_, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY rowid")?;
                let rows = stmt
                    .query_map(params![collection.name()], |row| row.get(0))?
                    .collect::<std::result::Result<_, _>>()?;
                rows
            }
        };
        bodies.into_iter().map(parse_body).collect()
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.name(), id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(parse_body).transpose()
    }

    fn put(&self, collection: Collection, id: &str, doc: Value) -> Result<()> {
        let conn = self.lock()?;
        upsert_row(&conn, collection, id, &doc)
    }

    fn modify(
        &self,
        collection: Collection,
        id: &str,
        f: &mut dyn FnMut(Value) -> Result<Value>,
    ) -> Result<Value> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front, so other processes can't
        // interleave between our read and our write
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.name(), id],
                |row| row.get(0),
            )
            .optional()?;
        let current = match body {
            Some(body) => parse_body(body)?,
            None => return Err(CoachError::not_found(collection.kind(), id)),
        };

        // An error from `f` drops the transaction, which rolls back
        let updated = f(current)?;
        upsert_row(&tx, collection, id, &updated)?;
        tx.commit()?;
        Ok(updated)
    }

    fn remove(&self, collection: Collection, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.name(), id],
        )?;
        Ok(deleted > 0)
    }
}

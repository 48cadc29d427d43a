//! SQLite persistence for saved automerge documents.
//!
//! One row per document holding the full `Automerge::save()` output. Changes
//! are read-modify-write under an IMMEDIATE transaction so concurrent
//! processes sharing the database serialize on the write lock.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::error::RepoError;
use crate::ids::DocumentId;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    bytes BLOB NOT NULL,
    updated_at INTEGER DEFAULT (unixepoch())
);
"#;

/// Database handle for document persistence.
pub struct DocStore {
    conn: Connection,
}

impl DocStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepoError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, RepoError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Load the saved bytes for a document.
    pub fn load(&self, id: &DocumentId) -> Result<Option<Vec<u8>>, RepoError> {
        let bytes = self
            .conn
            .query_row(
                "SELECT bytes FROM documents WHERE id = ?1",
                params![id.encoded()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes)
    }

    /// Store a new document. Fails if the id is already taken.
    pub fn insert(&self, id: &DocumentId, bytes: &[u8]) -> Result<(), RepoError> {
        self.conn.execute(
            "INSERT INTO documents (id, bytes) VALUES (?1, ?2)",
            params![id.encoded(), bytes],
        )?;
        Ok(())
    }

    /// Replace a document's bytes with the output of `f`, atomically.
    ///
    /// Returns `Ok(None)` without calling `f` when the document does not exist.
    /// If `f` fails, nothing is written.
    pub fn update<F, O, E>(&mut self, id: &DocumentId, f: F) -> Result<Option<O>, E>
    where
        F: FnOnce(Vec<u8>) -> Result<(Vec<u8>, O), E>,
        E: From<RepoError>,
    {
        let key = id.encoded();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;

        let current: Option<Vec<u8>> = tx
            .query_row(
                "SELECT bytes FROM documents WHERE id = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(RepoError::from)?;

        let Some(current) = current else {
            return Ok(None);
        };

        let (bytes, output) = f(current)?;
        tx.execute(
            "UPDATE documents SET bytes = ?2, updated_at = unixepoch() WHERE id = ?1",
            params![key, bytes],
        )
        .map_err(RepoError::from)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(Some(output))
    }

    /// Delete a document. Returns whether a row was removed.
    pub fn delete(&self, id: &DocumentId) -> Result<bool, RepoError> {
        let removed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id.encoded()])?;
        Ok(removed > 0)
    }
}

//! SQLite storage backend

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use scrawl_core::store::{RoomStore, StoreError};
use scrawl_core::RoomId;

/// SQLite storage backend
///
/// Embedded persistence suitable for single-node deployments: one row per
/// room, the record blob overwritten in place on every save.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store with the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                record BLOB NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
            );

            CREATE INDEX IF NOT EXISTS idx_rooms_updated_at ON rooms(updated_at);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl RoomStore for SqliteStore {
    async fn load(&self, id: &RoomId) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT record FROM rooms WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn save(&self, id: &RoomId, record: &[u8]) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO rooms (id, record, updated_at)
            VALUES (?1, ?2, strftime('%s', 'now') * 1000)
            ON CONFLICT(id) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
            params![id.as_str(), record],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_save_load_overwrite() {
        let store = SqliteStore::in_memory().unwrap();
        let id = RoomId::new("room:sqlite").unwrap();

        assert!(store.load(&id).await.unwrap().is_none());

        store.save(&id, b"v1").await.unwrap();
        assert_eq!(store.load(&id).await.unwrap().unwrap(), b"v1");

        store.save(&id, b"v2").await.unwrap();
        assert_eq!(store.load(&id).await.unwrap().unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.db");
        let id = RoomId::new("room:durable").unwrap();

        {
            let store = SqliteStore::new(&path).unwrap();
            store.save(&id, b"persisted").await.unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.load(&id).await.unwrap().unwrap(), b"persisted");
    }

    #[tokio::test]
    async fn test_sqlite_rooms_are_independent() {
        let store = SqliteStore::in_memory().unwrap();
        let a = RoomId::new("room:a").unwrap();
        let b = RoomId::new("room:b").unwrap();

        store.save(&a, b"alpha").await.unwrap();
        store.save(&b, b"beta").await.unwrap();

        assert_eq!(store.load(&a).await.unwrap().unwrap(), b"alpha");
        assert_eq!(store.load(&b).await.unwrap().unwrap(), b"beta");
    }
}

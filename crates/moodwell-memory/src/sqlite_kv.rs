use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use moodwell_schema::WellnessError;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

use crate::kv::KvBackend;

/// SQLite-backed key-value items, for profiles that outgrow a single file.
#[derive(Clone)]
pub struct SqliteKv {
    db: Arc<Mutex<Connection>>,
}

fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv_items (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
}

impl SqliteKv {
    pub fn open(path: &str) -> Result<Self, WellnessError> {
        let conn = Connection::open(path).map_err(WellnessError::unavailable)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(WellnessError::unavailable)?;
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(WellnessError::unavailable)?;
        run_migrations(&conn).map_err(WellnessError::unavailable)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, WellnessError> {
        let conn = Connection::open_in_memory().map_err(WellnessError::unavailable)?;
        run_migrations(&conn).map_err(WellnessError::unavailable)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, WellnessError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| WellnessError::unavailable("failed to lock sqlite connection"))?;
            f(&conn).map_err(WellnessError::unavailable)
        })
        .await
        .map_err(WellnessError::unavailable)?
    }
}

#[async_trait]
impl KvBackend for SqliteKv {
    async fn get_item(&self, key: &str) -> Result<Option<String>, WellnessError> {
        let key = key.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_items WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), WellnessError> {
        let key = key.to_owned();
        let value = value.to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO kv_items (key, value, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map(|_| ())
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<(), WellnessError> {
        let key = key.to_owned();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM kv_items WHERE key = ?1", params![key])
                .map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let kv = SqliteKv::open_in_memory().unwrap();
        assert_eq!(kv.get_item("k").await.unwrap(), None);

        kv.set_item("k", "first").await.unwrap();
        kv.set_item("k", "second").await.unwrap();
        assert_eq!(kv.get_item("k").await.unwrap().as_deref(), Some("second"));

        kv.remove_item("k").await.unwrap();
        kv.remove_item("k").await.unwrap();
        assert_eq!(kv.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("journal.db");
        let path = path.to_str().unwrap();

        SqliteKv::open(path)
            .unwrap()
            .set_item("wellness.mood.entries", "[]")
            .await
            .unwrap();

        let reopened = SqliteKv::open(path).unwrap();
        assert_eq!(
            reopened
                .get_item("wellness.mood.entries")
                .await
                .unwrap()
                .as_deref(),
            Some("[]")
        );
    }
}

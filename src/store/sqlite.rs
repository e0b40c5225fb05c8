//! SQLite-backed document store
//!
//! Documents live in one table keyed by path with a version column; the
//! compare-and-set is a single `UPDATE ... WHERE version = ?`, so it stays
//! linearizable even when several processes share the database file.
//! Change notifications only reach subscribers in the same process.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{ChangeFeed, DocChange, DocPath, ProgressStore, StoreError, Versioned};
use crate::domain::{Notification, UserId};

/// Durable store shared by every device on this machine
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    feed: Arc<ChangeFeed>,
}

impl SqliteStore {
    /// Open or create the store at a specific path
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store dir: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store db: {}", path.display()))?;

        // WAL so a second process (the other "device") can read while we write
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Self::with_connection(conn)
    }

    /// Throwaway store, mostly for tests
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize store schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            feed: Arc::new(ChangeFeed::new()),
        })
    }

    /// Run a blocking database closure off the async executor
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Versioned<Value>>, StoreError> {
        let key = path.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT version, body FROM documents WHERE path = ?1",
                    [&key],
                    |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)),
                )
                .optional()?;
            row.map(|(version, body)| -> Result<_, StoreError> {
                Ok(Versioned {
                    version: version as u64,
                    value: serde_json::from_str(&body)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn compare_and_set(
        &self,
        path: &DocPath,
        expected_version: Option<u64>,
        value: Value,
    ) -> Result<u64, StoreError> {
        let key = path.to_string();
        let body = serde_json::to_string(&value)?;
        let now = Utc::now().timestamp_millis();

        let version = self
            .with_conn(move |conn| {
                let (changed, version) = match expected_version {
                    None => (
                        conn.execute(
                            "INSERT OR IGNORE INTO documents (path, version, body, updated_at)
                             VALUES (?1, 1, ?2, ?3)",
                            params![key, body, now],
                        )?,
                        1,
                    ),
                    Some(expected) => (
                        conn.execute(
                            "UPDATE documents SET version = version + 1, body = ?2, updated_at = ?3
                             WHERE path = ?1 AND version = ?4",
                            params![key, body, now, expected as i64],
                        )?,
                        expected + 1,
                    ),
                };
                if changed == 0 {
                    return Err(StoreError::Conflict(key));
                }
                Ok(version)
            })
            .await?;

        self.feed.publish(path, DocChange::Updated(value));
        Ok(version)
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let key = path.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM documents WHERE path = ?1", [&key])?;
            if changed == 0 {
                return Err(StoreError::NotFound(key));
            }
            Ok(())
        })
        .await?;
        self.feed.publish(path, DocChange::Deleted);
        Ok(())
    }

    fn subscribe(&self, path: &DocPath) -> broadcast::Receiver<DocChange> {
        self.feed.subscribe(path)
    }

    async fn push_notification(
        &self,
        user: &UserId,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        let user = user.to_string();
        let id = notification.id.clone();
        let created_at = notification.created_at.timestamp_millis();
        let body = serde_json::to_string(notification)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO notifications (id, user_id, body, read, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![id, user, body, created_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn notifications(&self, user: &UserId) -> Result<Vec<Notification>, StoreError> {
        let user = user.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT body, read FROM notifications WHERE user_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map([&user], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, bool>(1)?))
            })?;

            let mut list = Vec::new();
            for row in rows {
                let (body, read) = row?;
                let mut notification: Notification = serde_json::from_str(&body)?;
                notification.read = read;
                list.push(notification);
            }
            Ok(list)
        })
        .await
    }

    async fn mark_notification_read(&self, user: &UserId, id: &str) -> Result<(), StoreError> {
        let user = user.to_string();
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND id = ?2",
                params![user, id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!(
                    "users/{}/notifications/{}",
                    user, id
                )));
            }
            Ok(())
        })
        .await
    }
}

/// SQL schema for the document store
const SCHEMA_SQL: &str = r#"
-- One row per document (duels/{id}, users/{uid})
CREATE TABLE IF NOT EXISTS documents (
    path TEXT PRIMARY KEY,
    version INTEGER NOT NULL,
    body TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Per-user notification feed
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    body TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DuelId, NotificationKind};
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_compare_and_set_conflicts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let path = DocPath::Duel(DuelId::from("d1"));

        assert_eq!(store.compare_and_set(&path, None, json!({"a": 1})).await.unwrap(), 1);
        assert!(matches!(
            store.compare_and_set(&path, None, json!({"a": 2})).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            store.compare_and_set(&path, Some(1), json!({"a": 2})).await.unwrap(),
            2
        );
        assert!(matches!(
            store.compare_and_set(&path, Some(1), json!({"a": 3})).await,
            Err(StoreError::Conflict(_))
        ));

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.value, json!({"a": 2}));
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("duels.db");
        let path = DocPath::User(UserId::from("u1"));

        {
            let store = SqliteStore::open(&db_path).unwrap();
            store.compare_and_set(&path, None, json!({"level": 3})).await.unwrap();
        }

        let store = SqliteStore::open(&db_path).unwrap();
        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.value["level"], 3);
    }

    #[tokio::test]
    async fn test_notification_feed() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = UserId::from("u1");
        let n = Notification::new(
            NotificationKind::DuelRequest,
            "New duel",
            "bob challenged you",
            json!({"duelId": "d1"}),
            Utc::now(),
        );
        store.push_notification(&user, &n).await.unwrap();
        store.mark_notification_read(&user, &n.id).await.unwrap();

        let feed = store.notifications(&user).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert!(feed[0].read);
        assert_eq!(feed[0].kind, NotificationKind::DuelRequest);
    }
}

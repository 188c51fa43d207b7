// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! User record store backed by SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::sync::RecordStore;
use crate::{OculareError, Result};

/// Database manager for Oculare (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A user row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: Option<String>,
    /// Serialized diagnosis summary, `None` when the user has no scans
    pub diagnoses: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub user_count: i64,
    pub users_with_diagnoses: i64,
}

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| OculareError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT,
                diagnoses TEXT,
                created_at TEXT NOT NULL
            );
        "#)?;
        Ok(())
    }

    /// Insert a user, or update the name of an existing one
    pub fn upsert_user(&self, id: &str, name: Option<&str>) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO users (id, name, diagnoses, created_at) VALUES (?1, ?2, NULL, ?3)
               ON CONFLICT(id) DO UPDATE SET name = excluded.name"#,
            params![id, name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Fetch one user
    pub fn get_user(&self, id: &str) -> Result<UserRecord> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, name, diagnoses, created_at FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .optional()?
        .ok_or_else(|| OculareError::UserNotFound(id.to_string()))
    }

    /// All users, oldest first
    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, diagnoses, created_at FROM users ORDER BY created_at, id",
        )?;
        let users = stmt.query_map([], row_to_user)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Overwrite a user's diagnosis summary
    pub fn set_diagnoses(&self, id: &str, diagnoses: Option<&str>) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE users SET diagnoses = ?2 WHERE id = ?1",
            params![id, diagnoses],
        )?;
        if changed == 0 {
            return Err(OculareError::UserNotFound(id.to_string()));
        }
        debug!("Updated diagnoses for user {}", id);
        Ok(())
    }

    /// Read a user's diagnosis summary
    pub fn get_diagnoses(&self, id: &str) -> Result<Option<String>> {
        Ok(self.get_user(id)?.diagnoses)
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DbStats> {
        let conn = self.lock_conn()?;
        let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let users_with_diagnoses: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE diagnoses IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(DbStats { user_count, users_with_diagnoses })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let created_str: String = row.get(3)?;
    Ok(UserRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        diagnoses: row.get(2)?,
        created_at: DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl RecordStore for Database {
    async fn write_diagnoses(&self, user_id: &str, summary: Option<&str>) -> Result<()> {
        self.set_diagnoses(user_id, summary)
    }

    async fn read_diagnoses(&self, user_id: &str) -> Result<Option<String>> {
        self.get_diagnoses(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_roundtrip() {
        let db = Database::in_memory().unwrap();
        db.upsert_user("u1", Some("Ada")).unwrap();
        db.upsert_user("u1", Some("Ada L.")).unwrap();

        let user = db.get_user("u1").unwrap();
        assert_eq!(user.name.as_deref(), Some("Ada L."));
        assert!(user.diagnoses.is_none());
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn diagnoses_can_be_set_and_cleared() {
        let db = Database::in_memory().unwrap();
        db.upsert_user("u1", None).unwrap();

        db.set_diagnoses("u1", Some("[]")).unwrap();
        assert_eq!(db.get_diagnoses("u1").unwrap().as_deref(), Some("[]"));
        assert_eq!(db.get_stats().unwrap().users_with_diagnoses, 1);

        db.set_diagnoses("u1", None).unwrap();
        assert!(db.get_diagnoses("u1").unwrap().is_none());
    }

    #[test]
    fn unknown_user_is_reported() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(db.set_diagnoses("ghost", None), Err(OculareError::UserNotFound(_))));
        assert!(matches!(db.get_user("ghost"), Err(OculareError::UserNotFound(_))));
    }
}

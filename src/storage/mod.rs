use crate::auth::token::RefreshToken;
use crate::auth::token_store::TokenStore;
use crate::error::{OneNoteError, Result};
use anyhow::Context;
use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub mod types;
pub use types::CourseSectionMapping;

/// Persistence for course → section mappings
pub trait MappingStore: Send + Sync {
    /// Inserts or overwrites the mapping keyed by (course, user)
    fn upsert_mapping(&self, mapping: &CourseSectionMapping) -> Result<()>;

    /// Looks up the mapping for a course and user
    fn get_mapping(&self, course_id: &str, user_id: &str) -> Result<Option<CourseSectionMapping>>;

    /// All mappings recorded for a user, ordered by course id
    fn list_mappings(&self, user_id: &str) -> Result<Vec<CourseSectionMapping>>;
}

/// SQLite backend holding both the refresh-token table and the
/// course/section mapping table
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory, unless
    /// `ONENOTE_DB_PATH` points somewhere else.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("ONENOTE_DB_PATH") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "onenote-sync", "onenote-sync")
            .ok_or_else(|| OneNoteError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("onenote.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use onenote_sync::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("onenote.db")).unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| OneNoteError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| OneNoteError::Storage(e.to_string()).into())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                user_id TEXT PRIMARY KEY,
                refresh_token TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS course_sections (
                course_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                section_id TEXT NOT NULL,
                PRIMARY KEY (course_id, user_id)
            );",
        )
        .context("Failed to create tables")
        .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        Ok(())
    }
}

impl TokenStore for SqliteStorage {
    fn get(&self, user_id: &str) -> Result<Option<RefreshToken>> {
        let conn = self.open()?;

        let token = conn
            .query_row(
                "SELECT refresh_token FROM refresh_tokens WHERE user_id = ?",
                params![user_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to query refresh token")
            .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        Ok(token.map(|token| RefreshToken {
            user_id: user_id.to_string(),
            token,
        }))
    }

    fn upsert(&self, user_id: &str, token: &str) -> Result<()> {
        let conn = self.open()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO refresh_tokens (user_id, refresh_token, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                refresh_token = excluded.refresh_token,
                updated_at = excluded.updated_at",
            params![user_id, token, now],
        )
        .context("Failed to store refresh token")
        .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "DELETE FROM refresh_tokens WHERE user_id = ?",
            params![user_id],
        )
        .context("Failed to delete refresh token")
        .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        Ok(())
    }
}

impl MappingStore for SqliteStorage {
    fn upsert_mapping(&self, mapping: &CourseSectionMapping) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "INSERT INTO course_sections (course_id, user_id, section_id)
            VALUES (?, ?, ?)
            ON CONFLICT(course_id, user_id) DO UPDATE SET
                section_id = excluded.section_id",
            params![mapping.course_id, mapping.user_id, mapping.section_id],
        )
        .context("Failed to store course section mapping")
        .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        Ok(())
    }

    fn get_mapping(&self, course_id: &str, user_id: &str) -> Result<Option<CourseSectionMapping>> {
        let conn = self.open()?;

        let section_id = conn
            .query_row(
                "SELECT section_id FROM course_sections WHERE course_id = ? AND user_id = ?",
                params![course_id, user_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to query course section mapping")
            .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        Ok(section_id.map(|section_id| CourseSectionMapping {
            course_id: course_id.to_string(),
            section_id,
            user_id: user_id.to_string(),
        }))
    }

    fn list_mappings(&self, user_id: &str) -> Result<Vec<CourseSectionMapping>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(
                "SELECT course_id, section_id FROM course_sections
                WHERE user_id = ?
                ORDER BY course_id",
            )
            .context("Failed to prepare statement")
            .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(CourseSectionMapping {
                    course_id: row.get(0)?,
                    section_id: row.get(1)?,
                    user_id: user_id.to_string(),
                })
            })
            .context("Failed to query course section mappings")
            .map_err(|e| OneNoteError::Storage(e.to_string()))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read course section mapping")
            .map_err(|e| OneNoteError::Storage(e.to_string()).into())
    }
}

/// In-memory [`MappingStore`]
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    rows: Mutex<HashMap<(String, String), String>>,
}

impl MemoryMappingStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), String>>> {
        self.rows
            .lock()
            .map_err(|_| OneNoteError::Storage("mapping lock poisoned".to_string()).into())
    }
}

impl MappingStore for MemoryMappingStore {
    fn upsert_mapping(&self, mapping: &CourseSectionMapping) -> Result<()> {
        self.lock()?.insert(
            (mapping.course_id.clone(), mapping.user_id.clone()),
            mapping.section_id.clone(),
        );
        Ok(())
    }

    fn get_mapping(&self, course_id: &str, user_id: &str) -> Result<Option<CourseSectionMapping>> {
        Ok(self
            .lock()?
            .get(&(course_id.to_string(), user_id.to_string()))
            .map(|section_id| CourseSectionMapping {
                course_id: course_id.to_string(),
                section_id: section_id.clone(),
                user_id: user_id.to_string(),
            }))
    }

    fn list_mappings(&self, user_id: &str) -> Result<Vec<CourseSectionMapping>> {
        let mut mappings: Vec<_> = self
            .lock()?
            .iter()
            .filter(|((_, uid), _)| uid == user_id)
            .map(|((course_id, uid), section_id)| CourseSectionMapping {
                course_id: course_id.clone(),
                section_id: section_id.clone(),
                user_id: uid.clone(),
            })
            .collect();
        mappings.sort_by(|a, b| a.course_id.cmp(&b.course_id));
        Ok(mappings)
    }
}

//! Storage layer for jotter.
//!
//! This module provides `SQLite`-based persistent storage for note records:
//! insert-only adds, whole-record puts, point lookups and ordered scans over
//! the `modified` and `created` orderings.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::note::{NoteId, NoteRecord};

/// Secondary ordering used by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteIndex {
    /// Order by modification time.
    Modified,
    /// Order by creation time.
    Created,
}

/// Scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Oldest first.
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

/// Storage engine for note records.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a note database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// then runs the schema version gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema upgrade fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&mut conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&mut conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The schema version recorded in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata table cannot be read.
    pub fn schema_version(&self) -> Result<i32> {
        migrations::get_schema_version(&self.conn)
    }

    /// Insert a new record. Fails if the id is already stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateNote`] on an id conflict, or a query error.
    pub fn add(&self, record: &NoteRecord) -> Result<()> {
        let result = self.conn.execute(
            r"
            INSERT INTO notes (id, title, text, created, modified, format)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                record.id.as_str(),
                record.title,
                record.text,
                format_timestamp(record.created),
                format_timestamp(record.modified),
                record.format,
            ],
        );

        match result {
            Ok(_) => {
                debug!("Added note {}", record.id);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(Error::DuplicateNote {
                    id: record.id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace a whole record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put(&self, record: &NoteRecord) -> Result<()> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO notes (id, title, text, created, modified, format)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                record.id.as_str(),
                record.title,
                record.text,
                format_timestamp(record.created),
                format_timestamp(record.modified),
                record.format,
            ],
        )?;
        debug!("Stored note {}", record.id);
        Ok(())
    }

    /// Get a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the stored row
    /// cannot be decoded.
    pub fn get(&self, id: &NoteId) -> Result<Option<NoteRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, title, text, created, modified, format
            FROM notes WHERE id = ?1
            ",
        )?;
        let mut rows = stmt.query([id.as_str()])?;
        let record = rows.next()?.map(Self::row_to_record).transpose()?;
        Ok(record)
    }

    /// Visit records in `index` order. The visitor returns `false` to stop early.
    ///
    /// Returns the number of records visited.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn scan<F>(&self, index: NoteIndex, direction: Direction, mut visit: F) -> Result<usize>
    where
        F: FnMut(NoteRecord) -> bool,
    {
        let sql = match (index, direction) {
            (NoteIndex::Modified, Direction::Ascending) => {
                "SELECT id, title, text, created, modified, format FROM notes ORDER BY modified ASC"
            }
            (NoteIndex::Modified, Direction::Descending) => {
                "SELECT id, title, text, created, modified, format FROM notes ORDER BY modified DESC"
            }
            (NoteIndex::Created, Direction::Ascending) => {
                "SELECT id, title, text, created, modified, format FROM notes ORDER BY created ASC"
            }
            (NoteIndex::Created, Direction::Descending) => {
                "SELECT id, title, text, created, modified, format FROM notes ORDER BY created DESC"
            }
        };

        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut visited = 0;
        while let Some(row) = rows.next()? {
            let record = Self::row_to_record(row)?;
            visited += 1;
            if !visit(record) {
                break;
            }
        }
        Ok(visited)
    }

    /// Count stored notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_notes = self.count()?;

        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT modified FROM notes ORDER BY modified DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let last_modified = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_notes,
            last_modified,
            schema_version: self.schema_version()?,
            db_size_bytes,
        })
    }

    /// Convert a database row to a note record.
    fn row_to_record(row: &rusqlite::Row<'_>) -> Result<NoteRecord> {
        let id: String = row.get(0)?;
        let title: String = row.get(1)?;
        let text: String = row.get(2)?;
        let created = parse_timestamp(&id, "created", &row.get::<_, String>(3)?)?;
        let modified = parse_timestamp(&id, "modified", &row.get::<_, String>(4)?)?;
        let format: String = row.get(5)?;

        Ok(NoteRecord {
            id: NoteId::from(id),
            title,
            text,
            created,
            modified,
            format,
        })
    }
}

/// Statistics about the note store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of stored notes.
    pub total_notes: i64,
    /// Most recent modification time across all notes.
    pub last_modified: Option<DateTime<Utc>>,
    /// Recorded schema version.
    pub schema_version: i32,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Fixed-width RFC 3339 so that lexical order matches time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: &str, column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::invalid_record(format!("note {id}: {column} {value:?}: {e}")))
}

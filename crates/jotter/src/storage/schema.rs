//! `SQLite` schema definitions for jotter.
//!
//! This module contains the SQL statements for creating and managing
//! the note store schema.

/// SQL statement to create the notes table, keyed by note id.
pub const CREATE_NOTES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    text TEXT NOT NULL,
    created TEXT NOT NULL,
    modified TEXT NOT NULL,
    format TEXT NOT NULL
)
";

/// SQL statement to create the secondary ordering on `modified`.
pub const CREATE_MODIFIED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_notes_modified ON notes(modified)
";

/// SQL statement to create the secondary ordering on `created`.
pub const CREATE_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_notes_created ON notes(created)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Note store statements, in order. Every statement is idempotent.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_NOTES_TABLE,
    CREATE_MODIFIED_INDEX,
    CREATE_CREATED_INDEX,
];

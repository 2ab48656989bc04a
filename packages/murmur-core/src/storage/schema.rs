//! # Database Schema
//!
//! SQL schema for the durable key store.
//!
//! ```text
//! ┌─────────────────────────────────────┐   ┌─────────────────────┐
//! │             key_slots               │   │   schema_version    │
//! ├─────────────────────────────────────┤   ├─────────────────────┤
//! │ key         TEXT PRIMARY KEY        │   │ version  INTEGER    │
//! │ value       TEXT NOT NULL           │   └─────────────────────┘
//! │ updated_at  INTEGER NOT NULL        │
//! └─────────────────────────────────────┘
//! ```

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS key_slots (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

//! `SQLite` schema definitions for queueline.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the accounts table.
pub const CREATE_ACCOUNTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS accounts (
    email TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    password_digest TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the sessions table.
pub const CREATE_SESSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
)
";

/// SQL statement to create the per-service queue state table.
pub const CREATE_SERVICES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS services (
    key TEXT PRIMARY KEY,
    next_number INTEGER NOT NULL,
    paused INTEGER NOT NULL DEFAULT 0,
    joined INTEGER NOT NULL DEFAULT 0,
    served INTEGER NOT NULL DEFAULT 0,
    cancelled INTEGER NOT NULL DEFAULT 0
)
";

/// SQL statement to create the tickets table.
///
/// `position` is set for waiting tickets only and orders the line.
pub const CREATE_TICKETS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number TEXT NOT NULL,
    service TEXT NOT NULL,
    owner TEXT,
    status TEXT NOT NULL,
    position INTEGER,
    joined_at TEXT NOT NULL,
    called_at TEXT,
    finished_at TEXT
)
";

/// SQL statement to create an index on ticket owner for history lookups.
pub const CREATE_OWNER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_tickets_owner ON tickets(owner)
";

/// SQL statement to create an index for rebuilding lines in order.
pub const CREATE_LINE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_tickets_line ON tickets(service, status, position)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ACCOUNTS_TABLE,
    CREATE_SESSIONS_TABLE,
    CREATE_SERVICES_TABLE,
    CREATE_TICKETS_TABLE,
    CREATE_OWNER_INDEX,
    CREATE_LINE_INDEX,
    CREATE_METADATA_TABLE,
];

/// Tables holding application data, cleared by a reset.
pub const DATA_TABLES: &[&str] = &["accounts", "sessions", "services", "tickets"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_tickets_table_columns() {
        assert!(CREATE_TICKETS_TABLE.contains("number TEXT NOT NULL"));
        assert!(CREATE_TICKETS_TABLE.contains("owner TEXT,"));
        assert!(CREATE_TICKETS_TABLE.contains("position INTEGER"));
    }

    #[test]
    fn test_every_data_table_is_created() {
        for table in DATA_TABLES {
            let needle = format!("CREATE TABLE IF NOT EXISTS {table} ");
            assert!(
                SCHEMA_STATEMENTS.iter().any(|s| s.contains(&needle)),
                "missing table {table}"
            );
        }
    }
}

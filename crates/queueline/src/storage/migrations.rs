//! Schema versioning for the queueline database.
//!
//! The applied version lives in `PRAGMA user_version`. Each entry in
//! [`MIGRATIONS`] brings the schema from the previous version to its own and
//! runs inside a transaction together with the version bump.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// A single schema step.
#[derive(Debug)]
struct Migration {
    version: i32,
    description: &'static str,
    statements: &'static [&'static str],
}

/// Ordered schema steps. Versions must be contiguous starting at 1.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "accounts, sessions, services, tickets",
    statements: SCHEMA_STATEMENTS,
}];

/// The schema version this build writes.
pub const CURRENT_VERSION: i32 = 1;

/// Bring the database schema up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns `DatabaseMigration` if the file was written by a newer build, or
/// a query error if a step fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > version) {
        apply(conn, migration)?;
    }
    Ok(())
}

/// Read the applied schema version (0 for a fresh file).
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    debug!(
        "Applying schema v{}: {}",
        migration.version, migration.description
    );
    let tx = conn.unchecked_transaction()?;
    for statement in migration.statements {
        tx.execute(statement, [])?;
    }
    // PRAGMA does not take bound parameters
    tx.execute_batch(&format!("PRAGMA user_version = {}", migration.version))?;
    tx.commit()?;
    info!("Database schema at v{}", migration.version);
    Ok(())
}

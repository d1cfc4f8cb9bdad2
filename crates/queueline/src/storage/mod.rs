//! Storage layer for queueline.
//!
//! This module mirrors accounts, sessions and queue state into a local
//! `SQLite` file and loads it back on start. Writes are whole snapshots of
//! one kind of state, each in a single transaction.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::account::{Account, AccountBook, Role};
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::manager::QueueManager;
use crate::queue::{QueueCounters, ServiceQueue};
use crate::session::{Session, SessionRegistry};
use crate::ticket::{Ticket, TicketStatus};

/// Metadata key remembering the signed-in session of this installation.
const CURRENT_SESSION_KEY: &str = "current_session";

/// Columns selected for every ticket query, in [`Storage::row_to_ticket`] order.
const TICKET_COLUMNS: &str =
    "number, service, owner, status, joined_at, called_at, finished_at";

/// Local mirror of application state.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
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
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        debug!("Database ready at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

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

    // === Accounts ===

    /// Replace the stored accounts with the book's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_accounts(&self, book: &AccountBook) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM accounts", [])?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO accounts (email, name, password_digest, role, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )?;
            for account in book.iter() {
                stmt.execute(params![
                    account.email,
                    account.name,
                    account.password_digest,
                    account.role.to_string(),
                    account.created_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        debug!("Saved {} accounts", book.len());
        Ok(())
    }

    /// Load all stored accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_accounts(&self) -> Result<Vec<Account>> {
        let mut stmt = self.conn.prepare(
            "SELECT email, name, password_digest, role, created_at FROM accounts ORDER BY email",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut accounts = Vec::with_capacity(rows.len());
        for (email, name, password_digest, role, created_at) in rows {
            let Ok(role) = role.parse::<Role>() else {
                warn!("Skipping account {} with unknown role {}", email, role);
                continue;
            };
            accounts.push(Account {
                email,
                name,
                password_digest,
                role,
                created_at: parse_time(&created_at),
            });
        }
        Ok(accounts)
    }

    // === Sessions ===

    /// Replace the stored sessions with the registry's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_sessions(&self, registry: &SessionRegistry) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM sessions", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sessions (token, email, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for session in registry.iter() {
                stmt.execute(params![
                    session.token,
                    session.email,
                    session.created_at.to_rfc3339(),
                    session.expires_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load all stored sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare("SELECT token, email, created_at, expires_at FROM sessions")?;
        let sessions = stmt
            .query_map([], |row| {
                let created_at: String = row.get(2)?;
                let expires_at: String = row.get(3)?;
                Ok(Session {
                    token: row.get(0)?,
                    email: row.get(1)?,
                    created_at: parse_time(&created_at),
                    // An unreadable expiry counts as already expired
                    expires_at: DateTime::parse_from_rfc3339(&expires_at)
                        .map_or(DateTime::<Utc>::MIN_UTC, |dt| dt.with_timezone(&Utc)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// The session token this installation is signed in with.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn current_session(&self) -> Result<Option<String>> {
        let token = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [CURRENT_SESSION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token)
    }

    /// Remember (or forget, with `None`) the signed-in session token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_current_session(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                    params![CURRENT_SESSION_KEY, token],
                )?;
            }
            None => {
                self.conn.execute(
                    "DELETE FROM metadata WHERE key = ?1",
                    [CURRENT_SESSION_KEY],
                )?;
            }
        }
        Ok(())
    }

    // === Queues ===

    /// Replace the stored queue state with the manager's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_queues(&self, manager: &QueueManager) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM services", [])?;
        tx.execute("DELETE FROM tickets", [])?;
        {
            let mut service_stmt = tx.prepare(
                r"
                INSERT INTO services (key, next_number, paused, joined, served, cancelled)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?;
            let mut ticket_stmt = tx.prepare(
                r"
                INSERT INTO tickets
                    (number, service, owner, status, position, joined_at, called_at, finished_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )?;

            for queue in manager.services() {
                let counters = queue.counters();
                service_stmt.execute(params![
                    queue.key(),
                    queue.next_number(),
                    queue.is_paused(),
                    to_sql_count(counters.joined),
                    to_sql_count(counters.served),
                    to_sql_count(counters.cancelled),
                ])?;

                if let Some(ticket) = queue.serving() {
                    insert_ticket(&mut ticket_stmt, ticket, None)?;
                }
                for (position, ticket) in queue.waiting().enumerate() {
                    let position = i64::try_from(position).unwrap_or(i64::MAX);
                    insert_ticket(&mut ticket_stmt, ticket, Some(position))?;
                }
            }

            for ticket in manager.closed_tickets() {
                insert_ticket(&mut ticket_stmt, ticket, None)?;
            }
        }
        tx.commit()?;
        debug!("Saved queue state");
        Ok(())
    }

    /// Rebuild the queue manager for the configured services.
    ///
    /// Returns `None` when nothing has been stored yet. Services present in
    /// the configuration but not in the store start empty; stored services
    /// that are no longer configured are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_queues(&self, services: &[ServiceConfig]) -> Result<Option<QueueManager>> {
        let stored: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))?;
        if stored == 0 {
            return Ok(None);
        }

        let mut queues = Vec::with_capacity(services.len());
        for config in services {
            let state = self
                .conn
                .query_row(
                    "SELECT next_number, paused, joined, served, cancelled FROM services WHERE key = ?1",
                    [&config.key],
                    |row| {
                        Ok((
                            row.get::<_, u32>(0)?,
                            row.get::<_, bool>(1)?,
                            QueueCounters {
                                joined: from_sql_count(row.get(2)?),
                                served: from_sql_count(row.get(3)?),
                                cancelled: from_sql_count(row.get(4)?),
                            },
                        ))
                    },
                )
                .optional()?;

            let Some((next_number, paused, counters)) = state else {
                info!("Service {} has no stored state, starting empty", config.key);
                queues.push(ServiceQueue::new(config));
                continue;
            };

            let waiting = self.query_tickets(
                &format!(
                    "SELECT {TICKET_COLUMNS} FROM tickets WHERE service = ?1 AND status = 'active' ORDER BY position"
                ),
                &config.key,
            )?;
            let serving = self
                .query_tickets(
                    &format!(
                        "SELECT {TICKET_COLUMNS} FROM tickets WHERE service = ?1 AND status = 'serving' LIMIT 1"
                    ),
                    &config.key,
                )?
                .into_iter()
                .next();

            queues.push(ServiceQueue::restore(
                config,
                next_number,
                paused,
                counters,
                waiting,
                serving,
            ));
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE status NOT IN ('active', 'serving') AND owner IS NOT NULL ORDER BY id"
        ))?;
        let history = stmt
            .query_map([], Self::row_to_ticket)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(QueueManager::restore(queues, history)))
    }

    fn query_tickets(&self, sql: &str, service: &str) -> Result<Vec<Ticket>> {
        let mut stmt = self.conn.prepare(sql)?;
        let tickets = stmt
            .query_map([service], Self::row_to_ticket)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    // === Maintenance ===

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            accounts: count("SELECT COUNT(*) FROM accounts")?,
            sessions: count("SELECT COUNT(*) FROM sessions")?,
            tickets: count("SELECT COUNT(*) FROM tickets")?,
            open_tickets: count(
                "SELECT COUNT(*) FROM tickets WHERE status IN ('active', 'serving')",
            )?,
            schema_version: migrations::schema_version(&self.conn)?,
            db_size_bytes,
        })
    }

    /// Delete all application data, keeping the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn reset(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for table in schema::DATA_TABLES {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        tx.execute(
            "DELETE FROM metadata WHERE key = ?1",
            [CURRENT_SESSION_KEY],
        )?;
        tx.commit()?;
        info!("Reset all stored data at {}", self.path.display());
        Ok(())
    }

    /// Convert a database row to a Ticket.
    fn row_to_ticket(row: &Row) -> rusqlite::Result<Ticket> {
        let number: String = row.get(0)?;
        let status_str: String = row.get(3)?;
        let joined_at: String = row.get(4)?;
        let called_at: Option<String> = row.get(5)?;
        let finished_at: Option<String> = row.get(6)?;

        let status = status_str.parse().unwrap_or_else(|_| {
            warn!(
                "Unknown status {} on ticket {}, treating as cancelled",
                status_str, number
            );
            TicketStatus::Cancelled
        });

        Ok(Ticket {
            number,
            service: row.get(1)?,
            owner: row.get(2)?,
            status,
            joined_at: parse_time(&joined_at),
            called_at: called_at.as_deref().map(parse_time),
            finished_at: finished_at.as_deref().map(parse_time),
        })
    }
}

fn insert_ticket(
    stmt: &mut rusqlite::Statement<'_>,
    ticket: &Ticket,
    position: Option<i64>,
) -> Result<()> {
    stmt.execute(params![
        ticket.number,
        ticket.service,
        ticket.owner,
        ticket.status.to_string(),
        position,
        ticket.joined_at.to_rfc3339(),
        ticket.called_at.map(|t| t.to_rfc3339()),
        ticket.finished_at.map(|t| t.to_rfc3339()),
    ])?;
    Ok(())
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Stored accounts.
    pub accounts: i64,
    /// Stored sessions (including expired ones not yet purged).
    pub sessions: i64,
    /// Stored tickets of any status.
    pub tickets: i64,
    /// Tickets waiting or at a counter.
    pub open_tickets: i64,
    /// Applied schema version.
    pub schema_version: i32,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

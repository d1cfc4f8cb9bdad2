//! Error types for queueline.
//!
//! This module defines all error types used throughout the queueline crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for queueline operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Authentication Errors ===
    /// Registration input was rejected.
    #[error("invalid registration: {message}")]
    InvalidRegistration {
        /// Why the input was rejected.
        message: String,
    },

    /// An account with this email already exists.
    #[error("an account for {email} already exists")]
    AccountExists {
        /// The duplicate email.
        email: String,
    },

    /// Unknown email or wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// No session is active.
    #[error("not signed in")]
    NotAuthenticated,

    /// The session token has expired.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// The signed-in account lacks the required role.
    #[error("{action} requires the {required} role")]
    Forbidden {
        /// The attempted action.
        action: &'static str,
        /// The role needed.
        required: &'static str,
    },

    // === Queue Errors ===
    /// No service is registered under this key.
    #[error("unknown service '{key}'")]
    UnknownService {
        /// The requested service key.
        key: String,
    },

    /// The waiting line is empty.
    #[error("no one in queue for {service}")]
    QueueEmpty {
        /// The service key.
        service: String,
    },

    /// The queue is paused and refuses the operation.
    #[error("queue for {service} is paused")]
    QueuePaused {
        /// The service key.
        service: String,
    },

    /// The ticket is not waiting in this queue.
    #[error("ticket {number} is not waiting in {service}")]
    TicketNotFound {
        /// The service key.
        service: String,
        /// The ticket display number.
        number: String,
    },

    /// No ticket is currently being served.
    #[error("no ticket is being served at {service}")]
    NothingServing {
        /// The service key.
        service: String,
    },

    /// The customer already holds an open ticket.
    #[error("already holding ticket {number}")]
    AlreadyInQueue {
        /// The open ticket's number.
        number: String,
    },

    /// The customer holds no waiting ticket.
    #[error("not waiting in any queue")]
    NotInQueue,

    /// The service has handed out every ticket number.
    #[error("{service} has run out of ticket numbers")]
    NumbersExhausted {
        /// The service key.
        service: String,
    },

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A specialized Result type for queueline operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a registration validation error.
    #[must_use]
    pub fn invalid_registration(message: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            message: message.into(),
        }
    }

    /// Create an unknown service error.
    #[must_use]
    pub fn unknown_service(key: impl Into<String>) -> Self {
        Self::UnknownService { key: key.into() }
    }

    /// Create a ticket not found error.
    #[must_use]
    pub fn ticket_not_found(service: impl Into<String>, number: impl Into<String>) -> Self {
        Self::TicketNotFound {
            service: service.into(),
            number: number.into(),
        }
    }

    /// Check if this error means the caller must sign in (again).
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::SessionExpired | Self::InvalidCredentials
        )
    }

    /// Check if this error is a guard condition on queue state rather than a failure.
    #[must_use]
    pub fn is_queue_guard(&self) -> bool {
        matches!(
            self,
            Self::QueueEmpty { .. }
                | Self::QueuePaused { .. }
                | Self::NothingServing { .. }
                | Self::AlreadyInQueue { .. }
                | Self::NotInQueue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotAuthenticated;
        assert_eq!(err.to_string(), "not signed in");

        let err = Error::unknown_service("dentist");
        assert_eq!(err.to_string(), "unknown service 'dentist'");
    }

    #[test]
    fn test_error_is_auth_error() {
        assert!(Error::NotAuthenticated.is_auth_error());
        assert!(Error::SessionExpired.is_auth_error());
        assert!(Error::InvalidCredentials.is_auth_error());
        assert!(!Error::NotInQueue.is_auth_error());
    }

    #[test]
    fn test_error_is_queue_guard() {
        let err = Error::QueueEmpty {
            service: "bank".to_string(),
        };
        assert!(err.is_queue_guard());
        assert!(Error::NotInQueue.is_queue_guard());
        assert!(!Error::NotAuthenticated.is_queue_guard());

        let err = Error::NumbersExhausted {
            service: "bank".to_string(),
        };
        assert!(!err.is_queue_guard());
    }

    #[test]
    fn test_forbidden_display() {
        let err = Error::Forbidden {
            action: "call next",
            required: "admin",
        };
        assert_eq!(err.to_string(), "call next requires the admin role");
    }

    #[test]
    fn test_ticket_not_found_display() {
        let err = Error::ticket_not_found("hospital", "H099");
        let msg = err.to_string();
        assert!(msg.contains("H099"));
        assert!(msg.contains("hospital"));
    }

    #[test]
    fn test_numbers_exhausted_display() {
        let err = Error::NumbersExhausted {
            service: "bank".to_string(),
        };
        assert_eq!(err.to_string(), "bank has run out of ticket numbers");
    }

    #[test]
    fn test_invalid_registration_display() {
        let err = Error::invalid_registration("password too short");
        assert!(err.to_string().contains("password too short"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "no services".to_string(),
        };
        assert!(err.to_string().contains("no services"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}

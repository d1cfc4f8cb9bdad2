//! Time-limited sign-in sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Distinguishes tokens issued within the same instant.
static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A sign-in binding a token to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// Email of the signed-in account.
    pub email: String,
    /// When the session was issued.
    pub created_at: DateTime<Utc>,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, zero if already expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Generate a fresh session token.
fn new_token(email: &str, now: DateTime<Utc>) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let counter = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(email.as_bytes());
    hasher.update(now.to_rfc3339().as_bytes());
    hasher.update(&counter.to_le_bytes());
    hasher.update(&salt);
    hasher.finalize().to_hex().to_string()
}

/// In-memory session table keyed by token.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding previously stored sessions.
    #[must_use]
    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions: sessions
                .into_iter()
                .map(|s| (s.token.clone(), s))
                .collect(),
        }
    }

    /// Issue a session for an account.
    pub fn issue(&mut self, email: &str, ttl: Duration) -> Session {
        self.issue_at(email, ttl, Utc::now())
    }

    /// Issue a session as of a given instant.
    pub fn issue_at(&mut self, email: &str, ttl: Duration, now: DateTime<Utc>) -> Session {
        let session = Session {
            token: new_token(email, now),
            email: email.to_string(),
            created_at: now,
            expires_at: now + ttl,
        };
        debug!("Issued session for {} until {}", email, session.expires_at);
        self.sessions
            .insert(session.token.clone(), session.clone());
        session
    }

    /// Resolve a token to its session.
    ///
    /// An expired session is dropped on the way out.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` for an unknown token and `SessionExpired`
    /// for an expired one.
    pub fn resolve(&mut self, token: &str, now: DateTime<Utc>) -> Result<&Session> {
        let expired = self
            .sessions
            .get(token)
            .ok_or(Error::NotAuthenticated)?
            .is_expired(now);
        if expired {
            if let Some(s) = self.sessions.remove(token) {
                debug!("Session for {} expired at {}", s.email, s.expires_at);
            }
            return Err(Error::SessionExpired);
        }
        self.sessions.get(token).ok_or(Error::NotAuthenticated)
    }

    /// Revoke a session. Returns `true` if it existed.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop every expired session, returning how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before - self.sessions.len()
    }

    /// All sessions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_resolve() {
        let mut registry = SessionRegistry::new();
        let now = Utc::now();
        let session = registry.issue_at("ada@example.com", Duration::minutes(30), now);

        assert_eq!(session.token.len(), 64);
        let resolved = registry.resolve(&session.token, now).unwrap();
        assert_eq!(resolved.email, "ada@example.com");
    }

    #[test]
    fn test_tokens_are_unique() {
        let mut registry = SessionRegistry::new();
        let now = Utc::now();
        let a = registry.issue_at("ada@example.com", Duration::minutes(1), now);
        let b = registry.issue_at("ada@example.com", Duration::minutes(1), now);
        assert_ne!(a.token, b.token);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_token() {
        let mut registry = SessionRegistry::new();
        assert!(matches!(
            registry.resolve("nope", Utc::now()),
            Err(Error::NotAuthenticated)
        ));
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let mut registry = SessionRegistry::new();
        let now = Utc::now();
        let session = registry.issue_at("ada@example.com", Duration::minutes(5), now);

        let later = now + Duration::minutes(5);
        assert!(matches!(
            registry.resolve(&session.token, later),
            Err(Error::SessionExpired)
        ));
        assert!(registry.is_empty());
        assert!(matches!(
            registry.resolve(&session.token, now),
            Err(Error::NotAuthenticated)
        ));
    }

    #[test]
    fn test_revoke() {
        let mut registry = SessionRegistry::new();
        let session = registry.issue("ada@example.com", Duration::minutes(5));
        assert!(registry.revoke(&session.token));
        assert!(!registry.revoke(&session.token));
    }

    #[test]
    fn test_purge_expired() {
        let mut registry = SessionRegistry::new();
        let now = Utc::now();
        registry.issue_at("a@example.com", Duration::minutes(1), now);
        registry.issue_at("b@example.com", Duration::minutes(60), now);

        let purged = registry.purge_expired(now + Duration::minutes(10));
        assert_eq!(purged, 1);
        assert_eq!(registry.iter().next().unwrap().email, "b@example.com");
    }

    #[test]
    fn test_remaining() {
        let now = Utc::now();
        let session = Session {
            token: "t".to_string(),
            email: "a@example.com".to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(10),
        };
        assert_eq!(session.remaining(now), Duration::minutes(10));
        assert_eq!(
            session.remaining(now + Duration::hours(1)),
            Duration::zero()
        );
    }
}

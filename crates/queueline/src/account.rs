//! Accounts and roles.
//!
//! Accounts are keyed by normalized email. Passwords are kept as a BLAKE3
//! digest; this is a demo credential check, not a password store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// What an account may see and do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Joins queues and sees the customer view.
    Customer,
    /// Runs the counter and sees the admin view.
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Normalized email, the account's identity.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Hex BLAKE3 digest of `email:password`.
    #[serde(skip_serializing, default)]
    pub password_digest: String,
    /// Access role.
    pub role: Role,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether the account has staff access.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Check a password against the stored digest.
    #[must_use]
    pub fn password_matches(&self, password: &str) -> bool {
        digest_password(&self.email, password) == self.password_digest
    }
}

/// Normalize an email for lookup: trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Digest a password salted with its (normalized) email.
#[must_use]
pub fn digest_password(email: &str, password: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// In-memory account registry.
#[derive(Debug, Clone)]
pub struct AccountBook {
    accounts: BTreeMap<String, Account>,
    email_pattern: Regex,
    min_password_length: usize,
}

impl AccountBook {
    /// Create an empty book with the configured validation rules.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidation` if the email pattern does not compile.
    pub fn new(auth: &AuthConfig) -> Result<Self> {
        let email_pattern = Regex::new(&auth.email_pattern).map_err(|e| {
            Error::ConfigValidation {
                message: format!("invalid email regex pattern: {e}"),
            }
        })?;
        Ok(Self {
            accounts: BTreeMap::new(),
            email_pattern,
            min_password_length: auth.min_password_length,
        })
    }

    /// Create a book holding previously stored accounts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidation` if the email pattern does not compile.
    pub fn with_accounts(auth: &AuthConfig, accounts: Vec<Account>) -> Result<Self> {
        let mut book = Self::new(auth)?;
        book.accounts = accounts
            .into_iter()
            .map(|a| (a.email.clone(), a))
            .collect();
        Ok(book)
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegistration` for a malformed email, empty name or
    /// short password, and `AccountExists` for a taken email.
    pub fn register(
        &mut self,
        email: &str,
        name: &str,
        password: &str,
        role: Role,
    ) -> Result<&Account> {
        let email = normalize_email(email);
        if !self.email_pattern.is_match(&email) {
            return Err(Error::invalid_registration(format!(
                "'{email}' is not a valid email address"
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_registration("name cannot be empty"));
        }
        if password.chars().count() < self.min_password_length {
            return Err(Error::invalid_registration(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }
        if self.accounts.contains_key(&email) {
            return Err(Error::AccountExists { email });
        }

        let account = Account {
            password_digest: digest_password(&email, password),
            email: email.clone(),
            name: name.to_string(),
            role,
            created_at: Utc::now(),
        };
        info!("Registered {} account {}", role, email);
        Ok(self.accounts.entry(email).or_insert(account))
    }

    /// Check credentials.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email or a wrong password.
    pub fn verify(&self, email: &str, password: &str) -> Result<&Account> {
        self.accounts
            .get(&normalize_email(email))
            .filter(|a| a.password_matches(password))
            .ok_or(Error::InvalidCredentials)
    }

    /// Look up an account by email.
    #[must_use]
    pub fn get(&self, email: &str) -> Option<&Account> {
        self.accounts.get(&normalize_email(email))
    }

    /// All accounts, ordered by email.
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no accounts exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Create the configured default admin when the book is empty.
    ///
    /// Returns `true` if an account was created.
    ///
    /// # Errors
    ///
    /// Returns a registration error if the configured credentials are invalid.
    pub fn seed_admin(&mut self, auth: &AuthConfig) -> Result<bool> {
        if !auth.seed_admin || !self.accounts.is_empty() {
            return Ok(false);
        }
        self.register(
            &auth.admin_email,
            "Administrator",
            &auth.admin_password,
            Role::Admin,
        )?;
        Ok(true)
    }
}

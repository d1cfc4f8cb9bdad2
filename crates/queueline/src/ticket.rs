//! Ticket types for queueline.
//!
//! A ticket is one customer's place in a service queue, identified by a
//! display number such as `H021` and moving through a small lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Waiting in line.
    Active,
    /// Called to the counter.
    Serving,
    /// Served and finished.
    Completed,
    /// Left the line or was removed by staff.
    Cancelled,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Serving => write!(f, "serving"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "serving" => Ok(Self::Serving),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

/// A ticket issued by a service queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Display number, e.g. `B036`.
    pub number: String,

    /// Key of the service that issued the ticket.
    pub service: String,

    /// Email of the account holding the ticket; `None` for walk-ins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Where the ticket is in its lifecycle.
    pub status: TicketStatus,

    /// When the ticket was issued.
    pub joined_at: DateTime<Utc>,

    /// When the ticket was called to the counter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub called_at: Option<DateTime<Utc>>,

    /// When the ticket was completed or cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Format a ticket display number: prefix letter plus at least three digits.
#[must_use]
pub fn format_number(prefix: char, number: u32) -> String {
    format!("{}{:03}", prefix.to_ascii_uppercase(), number)
}

impl Ticket {
    /// Issue a new waiting ticket stamped with the current time.
    #[must_use]
    pub fn new(number: String, service: impl Into<String>, owner: Option<String>) -> Self {
        Self {
            number,
            service: service.into(),
            owner,
            status: TicketStatus::Active,
            joined_at: Utc::now(),
            called_at: None,
            finished_at: None,
        }
    }

    /// Whether the ticket still occupies a place (waiting or at the counter).
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.status, TicketStatus::Active | TicketStatus::Serving)
    }

    /// Whether the ticket belongs to the given account.
    #[must_use]
    pub fn is_owned_by(&self, email: &str) -> bool {
        self.owner.as_deref() == Some(email)
    }

    /// Move the ticket to the counter.
    pub fn mark_serving(&mut self) {
        self.status = TicketStatus::Serving;
        self.called_at = Some(Utc::now());
    }

    /// Mark the ticket as served.
    pub fn mark_completed(&mut self) {
        self.status = TicketStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Mark the ticket as cancelled.
    pub fn mark_cancelled(&mut self) {
        self.status = TicketStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }
}

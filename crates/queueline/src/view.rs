//! Customer and staff views of a service queue.
//!
//! Views are plain snapshots built from a [`ServiceQueue`]. They serialize to
//! JSON for `--json` output and implement [`Display`](std::fmt::Display) for
//! the text rendering printed by `qline`.

use std::fmt;

use serde::Serialize;

use crate::queue::{QueueStats, ServiceQueue, WaitEstimate};
use crate::ticket::Ticket;

/// Shown wherever a value is missing.
const BLANK: &str = "-";

/// One row of a live queue listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    /// Ticket number.
    pub number: String,
    /// 1-based position; `None` for the ticket at the counter.
    pub position: Option<usize>,
    /// Whether this ticket is at the counter.
    pub serving: bool,
    /// Whether the viewer holds this ticket.
    pub mine: bool,
}

/// Where the viewer stands with respect to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    /// The viewer's ticket is at the counter.
    YourTurn,
    /// The viewer is waiting in this line.
    InQueue,
    /// The viewer holds no ticket here.
    NotQueued,
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YourTurn => write!(f, "Your turn!"),
            Self::InQueue => write!(f, "In queue"),
            Self::NotQueued => write!(f, "Join queue to get token"),
        }
    }
}

fn live_entries(queue: &ServiceQueue, viewer: Option<&str>) -> Vec<QueueEntry> {
    let is_mine = |t: &Ticket| viewer.is_some_and(|v| t.is_owned_by(v));

    let serving = queue.serving().map(|t| QueueEntry {
        number: t.number.clone(),
        position: None,
        serving: true,
        mine: is_mine(t),
    });
    let waiting = queue.waiting().enumerate().map(|(i, t)| QueueEntry {
        number: t.number.clone(),
        position: Some(i + 1),
        serving: false,
        mine: is_mine(t),
    });
    serving.into_iter().chain(waiting).collect()
}

fn write_entries(f: &mut fmt::Formatter<'_>, entries: &[QueueEntry]) -> fmt::Result {
    if entries.is_empty() {
        return writeln!(f, "  (queue is empty)");
    }
    for entry in entries {
        let marker = if entry.mine { "*" } else { " " };
        match entry.position {
            None => writeln!(f, " {marker}{:<8} Currently Serving", entry.number)?,
            Some(p) => writeln!(f, " {marker}{:<8} Position {p}", entry.number)?,
        }
    }
    Ok(())
}

/// What a customer sees for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerView {
    /// Service key.
    pub service: String,
    /// Service display name.
    pub name: String,
    /// The viewer's ticket at this service.
    pub your_ticket: Option<String>,
    /// The viewer's standing.
    pub status: CustomerStatus,
    /// Ticket at the counter.
    pub currently_serving: Option<String>,
    /// Tickets ahead of the viewer's.
    pub people_ahead: Option<usize>,
    /// Estimated wait for the viewer's ticket.
    pub estimated_wait: WaitEstimate,
    /// Whether the queue is paused.
    pub paused: bool,
    /// The live queue, counter first.
    pub entries: Vec<QueueEntry>,
}

impl CustomerView {
    /// Build the view of `queue` for an optional signed-in viewer.
    #[must_use]
    pub fn build(queue: &ServiceQueue, viewer: Option<&str>) -> Self {
        let serving_is_mine = viewer
            .is_some_and(|v| queue.serving().is_some_and(|t| t.is_owned_by(v)));
        let waiting_ticket = viewer.and_then(|v| queue.waiting().find(|t| t.is_owned_by(v)));

        let (your_ticket, status) = if serving_is_mine {
            (
                queue.serving().map(|t| t.number.clone()),
                CustomerStatus::YourTurn,
            )
        } else if let Some(ticket) = waiting_ticket {
            (Some(ticket.number.clone()), CustomerStatus::InQueue)
        } else {
            (None, CustomerStatus::NotQueued)
        };

        let people_ahead = your_ticket.as_deref().and_then(|n| queue.people_ahead(n));
        let estimated_wait = your_ticket
            .as_deref()
            .map_or(WaitEstimate::Unknown, |n| queue.estimated_wait(n));

        Self {
            service: queue.key().to_string(),
            name: queue.name().to_string(),
            your_ticket,
            status,
            currently_serving: queue.serving().map(|t| t.number.clone()),
            people_ahead,
            estimated_wait,
            paused: queue.is_paused(),
            entries: live_entries(queue, viewer),
        }
    }
}

impl fmt::Display for CustomerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;
        writeln!(
            f,
            "Your token:         {}",
            self.your_ticket.as_deref().unwrap_or(BLANK)
        )?;
        writeln!(f, "Status:             {}", self.status)?;
        writeln!(
            f,
            "Currently serving:  {}",
            self.currently_serving.as_deref().unwrap_or(BLANK)
        )?;
        match self.people_ahead {
            Some(n) => writeln!(f, "People ahead:       {n}")?,
            None => writeln!(f, "People ahead:       {BLANK}")?,
        }
        writeln!(f, "Estimated wait:     {}", self.estimated_wait)?;
        if self.paused {
            writeln!(f, "Queue is paused")?;
        }
        writeln!(f)?;
        writeln!(f, "Live queue")?;
        write_entries(f, &self.entries)
    }
}

/// What staff see for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminView {
    /// Service display name.
    pub name: String,
    /// Queue statistics.
    #[serde(flatten)]
    pub stats: QueueStats,
    /// The line, counter first.
    pub entries: Vec<QueueEntry>,
}

impl AdminView {
    /// Build the staff view of `queue`.
    #[must_use]
    pub fn build(queue: &ServiceQueue) -> Self {
        Self {
            name: queue.name().to_string(),
            stats: queue.stats(),
            entries: live_entries(queue, None),
        }
    }
}

impl fmt::Display for AdminView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "{} [admin]", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len() + 8))?;
        writeln!(f, "Total in queue:     {}", stats.total_waiting)?;
        writeln!(
            f,
            "Currently serving:  {}",
            stats.currently_serving.as_deref().unwrap_or(BLANK)
        )?;
        writeln!(f, "Avg wait (min):     {}", stats.avg_wait_minutes)?;
        writeln!(f, "Served:             {}", stats.counters.served)?;
        writeln!(f, "Cancelled:          {}", stats.counters.cancelled)?;
        writeln!(f, "Joined:             {}", stats.counters.joined)?;
        writeln!(
            f,
            "State:              {}",
            if stats.paused { "paused" } else { "open" }
        )?;
        writeln!(f)?;
        write_entries(f, &self.entries)
    }
}

/// One line of the service list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    /// Service key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Ticket prefix.
    pub prefix: char,
    /// Tickets waiting.
    pub waiting: usize,
    /// Ticket at the counter.
    pub currently_serving: Option<String>,
    /// Average minutes per customer.
    pub avg_wait_minutes: u32,
    /// Whether the queue is paused.
    pub paused: bool,
}

impl From<&ServiceQueue> for ServiceSummary {
    fn from(queue: &ServiceQueue) -> Self {
        Self {
            key: queue.key().to_string(),
            name: queue.name().to_string(),
            prefix: queue.prefix(),
            waiting: queue.len(),
            currently_serving: queue.serving().map(|t| t.number.clone()),
            avg_wait_minutes: queue.avg_wait_minutes(),
            paused: queue.is_paused(),
        }
    }
}

impl fmt::Display for ServiceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} {:<34} waiting {:>3}  serving {:<6} ~{} min{}",
            self.key,
            self.name,
            self.waiting,
            self.currently_serving.as_deref().unwrap_or(BLANK),
            self.avg_wait_minutes,
            if self.paused { "  (paused)" } else { "" }
        )
    }
}

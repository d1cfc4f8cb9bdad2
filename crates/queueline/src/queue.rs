//! Per-service FIFO queue.
//!
//! A [`ServiceQueue`] holds the waiting line for one service, the ticket
//! currently at the counter, the next number to hand out, and running
//! counters. Admission appends to the back, calling pops the front.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::ticket::{format_number, Ticket, TicketStatus};

/// Running counters kept per service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounters {
    /// Tickets issued.
    pub joined: u64,
    /// Tickets completed at the counter.
    pub served: u64,
    /// Tickets that left or were removed.
    pub cancelled: u64,
}

/// Snapshot of a queue's statistics for the staff view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Service key.
    pub service: String,
    /// Tickets waiting in line.
    pub total_waiting: usize,
    /// Number of the ticket at the counter.
    pub currently_serving: Option<String>,
    /// Average minutes per customer.
    pub avg_wait_minutes: u32,
    /// Whether the queue is paused.
    pub paused: bool,
    /// Running counters.
    #[serde(flatten)]
    pub counters: QueueCounters,
}

/// Estimated wait for a ticket as shown to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "minutes")]
pub enum WaitEstimate {
    /// Minutes until the ticket is expected to be called.
    Minutes(u32),
    /// The ticket is at the counter.
    YourTurn,
    /// No estimate (not queued, or first in line).
    Unknown,
}

impl std::fmt::Display for WaitEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minutes(m) => write!(f, "{m} min"),
            Self::YourTurn => write!(f, "Your turn!"),
            Self::Unknown => write!(f, "-"),
        }
    }
}

/// Result of calling a ticket to the counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    /// The ticket now being served.
    pub called: Ticket,
    /// The previously served ticket, completed by this call.
    pub finished: Option<Ticket>,
}

/// The queue for a single service.
#[derive(Debug, Clone)]
pub struct ServiceQueue {
    key: String,
    name: String,
    prefix: char,
    avg_wait_minutes: u32,
    waiting: VecDeque<Ticket>,
    serving: Option<Ticket>,
    next_number: u32,
    paused: bool,
    counters: QueueCounters,
}

impl ServiceQueue {
    /// Create an empty queue for a configured service.
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            key: config.key.clone(),
            name: config.name.clone(),
            prefix: config.prefix.to_ascii_uppercase(),
            avg_wait_minutes: config.avg_wait_minutes,
            waiting: VecDeque::new(),
            serving: None,
            next_number: config.starting_number.max(1),
            paused: false,
            counters: QueueCounters::default(),
        }
    }

    /// Rebuild a queue from persisted parts.
    ///
    /// `waiting` must already be in line order.
    #[must_use]
    pub fn restore(
        config: &ServiceConfig,
        next_number: u32,
        paused: bool,
        counters: QueueCounters,
        waiting: Vec<Ticket>,
        serving: Option<Ticket>,
    ) -> Self {
        let mut queue = Self::new(config);
        queue.next_number = next_number;
        queue.paused = paused;
        queue.counters = counters;
        queue.waiting = waiting.into();
        queue.serving = serving;
        queue
    }

    /// Fill the queue with the demo line: one walk-in at the counter and
    /// `demo_waiting` walk-ins behind it.
    ///
    /// Does nothing if the queue has already issued tickets.
    pub fn seed_demo(&mut self, starting_number: u32, demo_waiting: u32) {
        if self.counters.joined > 0 || self.serving.is_some() || !self.waiting.is_empty() {
            return;
        }
        let Some(next_number) = starting_number
            .checked_add(demo_waiting)
            .and_then(|n| n.checked_add(1))
        else {
            warn!(
                "Demo line for {} does not fit ticket numbering, not seeding",
                self.key
            );
            return;
        };

        let mut current = Ticket::new(
            format_number(self.prefix, starting_number),
            self.key.clone(),
            None,
        );
        current.mark_serving();
        self.serving = Some(current);

        for n in starting_number + 1..=starting_number + demo_waiting {
            self.waiting
                .push_back(Ticket::new(format_number(self.prefix, n), self.key.clone(), None));
        }

        self.next_number = next_number;
        self.counters.joined = u64::from(demo_waiting) + 1;
        debug!(
            "Seeded {} with {} waiting, next number {}",
            self.key, demo_waiting, self.next_number
        );
    }

    /// Service key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ticket prefix.
    #[must_use]
    pub fn prefix(&self) -> char {
        self.prefix
    }

    /// Average minutes per customer.
    #[must_use]
    pub fn avg_wait_minutes(&self) -> u32 {
        self.avg_wait_minutes
    }

    /// The number the next issued ticket will get.
    #[must_use]
    pub fn next_number(&self) -> u32 {
        self.next_number
    }

    /// Whether the queue is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Running counters.
    #[must_use]
    pub fn counters(&self) -> QueueCounters {
        self.counters
    }

    /// Tickets waiting, front first.
    pub fn waiting(&self) -> impl Iterator<Item = &Ticket> {
        self.waiting.iter()
    }

    /// Number of tickets waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// Whether no one is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// The ticket at the counter.
    #[must_use]
    pub fn serving(&self) -> Option<&Ticket> {
        self.serving.as_ref()
    }

    /// Issue the next ticket and append it to the line.
    ///
    /// # Errors
    ///
    /// Returns `QueuePaused` if the queue is paused.
    pub fn issue(&mut self, owner: Option<String>) -> Result<Ticket> {
        if self.paused {
            return Err(Error::QueuePaused {
                service: self.key.clone(),
            });
        }

        let following = self
            .next_number
            .checked_add(1)
            .ok_or_else(|| Error::NumbersExhausted {
                service: self.key.clone(),
            })?;

        let number = format_number(self.prefix, self.next_number);
        let ticket = Ticket::new(number, self.key.clone(), owner);
        self.waiting.push_back(ticket.clone());
        self.next_number = following;
        self.counters.joined += 1;
        Ok(ticket)
    }

    /// 1-based position of a waiting ticket.
    #[must_use]
    pub fn position(&self, number: &str) -> Option<usize> {
        self.index_of(number).map(|i| i + 1)
    }

    /// How many tickets are ahead of a waiting ticket.
    #[must_use]
    pub fn people_ahead(&self, number: &str) -> Option<usize> {
        self.index_of(number)
    }

    /// Estimated wait for a ticket.
    #[must_use]
    pub fn estimated_wait(&self, number: &str) -> WaitEstimate {
        if self.serving.as_ref().is_some_and(|t| t.number == number) {
            return WaitEstimate::YourTurn;
        }
        match self.people_ahead(number) {
            Some(ahead) if ahead > 0 => {
                let ahead = u32::try_from(ahead).unwrap_or(u32::MAX);
                WaitEstimate::Minutes(ahead.saturating_mul(self.avg_wait_minutes))
            }
            _ => WaitEstimate::Unknown,
        }
    }

    /// Call the front of the line to the counter.
    ///
    /// # Errors
    ///
    /// Returns `QueuePaused` if paused or `QueueEmpty` if no one is waiting.
    pub fn call_next(&mut self) -> Result<CallOutcome> {
        self.ensure_running()?;
        let ticket = self.waiting.pop_front().ok_or_else(|| Error::QueueEmpty {
            service: self.key.clone(),
        })?;
        Ok(self.seat(ticket))
    }

    /// Call a specific waiting ticket to the counter, skipping the line.
    ///
    /// # Errors
    ///
    /// Returns `QueuePaused` if paused or `TicketNotFound` if the ticket is
    /// not waiting here.
    pub fn call_specific(&mut self, number: &str) -> Result<CallOutcome> {
        self.ensure_running()?;
        let ticket = self.take(number)?;
        Ok(self.seat(ticket))
    }

    /// Remove a waiting ticket and cancel it.
    ///
    /// # Errors
    ///
    /// Returns `TicketNotFound` if the ticket is not waiting here.
    pub fn remove(&mut self, number: &str) -> Result<Ticket> {
        let mut ticket = self.take(number)?;
        ticket.mark_cancelled();
        self.counters.cancelled += 1;
        Ok(ticket)
    }

    /// Take a waiting ticket out of line at its holder's request.
    ///
    /// # Errors
    ///
    /// Returns `TicketNotFound` if the ticket is not waiting here.
    pub fn leave(&mut self, number: &str) -> Result<Ticket> {
        debug!("{} leaving {}", number, self.key);
        self.remove(number)
    }

    /// Complete the ticket at the counter.
    ///
    /// # Errors
    ///
    /// Returns `NothingServing` if the counter is empty.
    pub fn complete_current(&mut self) -> Result<Ticket> {
        let mut ticket = self.serving.take().ok_or_else(|| Error::NothingServing {
            service: self.key.clone(),
        })?;
        ticket.mark_completed();
        self.counters.served += 1;
        Ok(ticket)
    }

    /// Cancel everyone waiting. The ticket at the counter is left alone.
    pub fn clear(&mut self) -> Vec<Ticket> {
        let cleared: Vec<Ticket> = self
            .waiting
            .drain(..)
            .map(|mut t| {
                t.mark_cancelled();
                t
            })
            .collect();
        self.counters.cancelled += cleared.len() as u64;
        cleared
    }

    /// Stop accepting new tickets and calls.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Accept new tickets and calls again.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Statistics for the staff view.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            service: self.key.clone(),
            total_waiting: self.waiting.len(),
            currently_serving: self.serving.as_ref().map(|t| t.number.clone()),
            avg_wait_minutes: self.avg_wait_minutes,
            paused: self.paused,
            counters: self.counters,
        }
    }

    fn index_of(&self, number: &str) -> Option<usize> {
        self.waiting.iter().position(|t| t.number == number)
    }

    fn take(&mut self, number: &str) -> Result<Ticket> {
        self.index_of(number)
            .and_then(|i| self.waiting.remove(i))
            .ok_or_else(|| Error::ticket_not_found(&self.key, number))
    }

    fn ensure_running(&self) -> Result<()> {
        if self.paused {
            Err(Error::QueuePaused {
                service: self.key.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn seat(&mut self, mut ticket: Ticket) -> CallOutcome {
        debug_assert_eq!(ticket.status, TicketStatus::Active);
        let finished = self.complete_current().ok();
        ticket.mark_serving();
        self.serving = Some(ticket.clone());
        CallOutcome {
            called: ticket,
            finished,
        }
    }
}

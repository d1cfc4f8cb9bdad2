//! Queue manager.
//!
//! Owns every service queue plus the closed tickets of signed-in customers,
//! and turns queue operations into [`Notice`]s for the views to display.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::queue::{CallOutcome, ServiceQueue};
use crate::ticket::Ticket;

/// A user-facing message produced by a queue operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "notice")]
pub enum Notice {
    /// A customer joined a queue.
    Joined {
        /// Service key.
        service: String,
        /// Issued ticket number.
        number: String,
    },
    /// A customer left a queue.
    Left {
        /// Service key.
        service: String,
        /// Cancelled ticket number.
        number: String,
    },
    /// A ticket was called to the counter.
    Called {
        /// Service key.
        service: String,
        /// Called ticket number.
        number: String,
    },
    /// A customer's own ticket was called.
    YourTurn {
        /// Account email.
        owner: String,
        /// Called ticket number.
        number: String,
    },
    /// A ticket was completed at the counter.
    Completed {
        /// Service key.
        service: String,
        /// Completed ticket number.
        number: String,
    },
    /// Staff removed a ticket from the line.
    Removed {
        /// Service key.
        service: String,
        /// Removed ticket number.
        number: String,
    },
    /// Staff cleared the line.
    Cleared {
        /// Service key.
        service: String,
        /// How many tickets were cancelled.
        count: usize,
    },
    /// The queue stopped accepting tickets.
    Paused {
        /// Service key.
        service: String,
    },
    /// The queue accepts tickets again.
    Resumed {
        /// Service key.
        service: String,
    },
    /// An anonymous walk-in joined.
    WalkIn {
        /// Service key.
        service: String,
        /// Issued ticket number.
        number: String,
    },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Joined { number, .. } => write!(f, "Joined queue! Your token: {number}"),
            Self::Left { .. } => write!(f, "Left the queue"),
            Self::Called { number, .. } => write!(f, "Called {number}"),
            Self::YourTurn { .. } => write!(f, "Your turn! Please proceed to the counter."),
            Self::Completed { number, .. } => write!(f, "{number} marked as completed"),
            Self::Removed { number, .. } => write!(f, "Removed {number} from queue"),
            Self::Cleared { count, .. } => write!(f, "Cleared {count} from queue"),
            Self::Paused { .. } => write!(f, "Queue paused"),
            Self::Resumed { .. } => write!(f, "Queue resumed"),
            Self::WalkIn { service, number } => write!(f, "{number} joined {service}"),
        }
    }
}

/// Owns all service queues.
#[derive(Debug, Clone)]
pub struct QueueManager {
    queues: Vec<ServiceQueue>,
    history: Vec<Ticket>,
}

impl QueueManager {
    /// Create empty queues for the configured services, in configuration order.
    #[must_use]
    pub fn from_services(services: &[ServiceConfig]) -> Self {
        Self {
            queues: services.iter().map(ServiceQueue::new).collect(),
            history: Vec::new(),
        }
    }

    /// Rebuild from persisted queues and closed tickets.
    #[must_use]
    pub fn restore(queues: Vec<ServiceQueue>, history: Vec<Ticket>) -> Self {
        Self { queues, history }
    }

    /// Populate untouched queues with the demo line.
    pub fn seed_demo(&mut self, services: &[ServiceConfig]) {
        for config in services {
            if let Ok(queue) = self.service_mut(&config.key) {
                queue.seed_demo(config.starting_number, config.demo_waiting);
            }
        }
    }

    /// All queues in configuration order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceQueue> {
        self.queues.iter()
    }

    /// Look up a queue.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService` if no queue has this key.
    pub fn service(&self, key: &str) -> Result<&ServiceQueue> {
        self.queues
            .iter()
            .find(|q| q.key() == key)
            .ok_or_else(|| Error::unknown_service(key))
    }

    /// Look up a queue for mutation.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService` if no queue has this key.
    pub fn service_mut(&mut self, key: &str) -> Result<&mut ServiceQueue> {
        self.queues
            .iter_mut()
            .find(|q| q.key() == key)
            .ok_or_else(|| Error::unknown_service(key))
    }

    /// Closed tickets that belong to accounts.
    #[must_use]
    pub fn closed_tickets(&self) -> &[Ticket] {
        &self.history
    }

    /// The customer's open ticket (waiting or at the counter), if any.
    #[must_use]
    pub fn active_ticket(&self, owner: &str) -> Option<&Ticket> {
        self.queues.iter().find_map(|q| {
            q.serving()
                .filter(|t| t.is_owned_by(owner))
                .or_else(|| q.waiting().find(|t| t.is_owned_by(owner)))
        })
    }

    /// Every ticket the customer has held, newest first.
    #[must_use]
    pub fn history(&self, owner: &str) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self
            .history
            .iter()
            .filter(|t| t.is_owned_by(owner))
            .cloned()
            .collect();
        if let Some(open) = self.active_ticket(owner) {
            tickets.push(open.clone());
        }
        tickets.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        tickets
    }

    /// Join a queue on behalf of a customer.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInQueue` if the customer holds an open ticket anywhere,
    /// `UnknownService`, or `QueuePaused`.
    pub fn join(&mut self, key: &str, owner: &str) -> Result<(Ticket, Notice)> {
        if let Some(open) = self.active_ticket(owner) {
            return Err(Error::AlreadyInQueue {
                number: open.number.clone(),
            });
        }

        let ticket = self.service_mut(key)?.issue(Some(owner.to_string()))?;
        info!("{} joined {} as {}", owner, key, ticket.number);
        let notice = Notice::Joined {
            service: key.to_string(),
            number: ticket.number.clone(),
        };
        Ok((ticket, notice))
    }

    /// Leave whichever queue the customer is waiting in.
    ///
    /// # Errors
    ///
    /// Returns `NotInQueue` if the customer has no waiting ticket. A ticket
    /// already at the counter cannot be left.
    pub fn leave(&mut self, owner: &str) -> Result<Notice> {
        let (key, number) = self
            .queues
            .iter()
            .find_map(|q| {
                q.waiting()
                    .find(|t| t.is_owned_by(owner))
                    .map(|t| (q.key().to_string(), t.number.clone()))
            })
            .ok_or(Error::NotInQueue)?;

        let ticket = self.service_mut(&key)?.leave(&number)?;
        self.archive(ticket);
        info!("{} left {} ({})", owner, key, number);
        Ok(Notice::Left {
            service: key,
            number,
        })
    }

    /// Issue an anonymous walk-in ticket.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService` or `QueuePaused`.
    pub fn walk_in(&mut self, key: &str) -> Result<Notice> {
        let ticket = self.service_mut(key)?.issue(None)?;
        debug!("Walk-in {} joined {}", ticket.number, key);
        Ok(Notice::WalkIn {
            service: key.to_string(),
            number: ticket.number,
        })
    }

    /// Call the next ticket at a service.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService`, `QueuePaused` or `QueueEmpty`.
    pub fn call_next(&mut self, key: &str) -> Result<Vec<Notice>> {
        let outcome = self.service_mut(key)?.call_next()?;
        Ok(self.settle_call(key, outcome))
    }

    /// Call a specific waiting ticket at a service.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService`, `QueuePaused` or `TicketNotFound`.
    pub fn call_specific(&mut self, key: &str, number: &str) -> Result<Vec<Notice>> {
        let outcome = self.service_mut(key)?.call_specific(number)?;
        Ok(self.settle_call(key, outcome))
    }

    /// Remove a waiting ticket from a service's line.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService` or `TicketNotFound`.
    pub fn remove(&mut self, key: &str, number: &str) -> Result<Notice> {
        let ticket = self.service_mut(key)?.remove(number)?;
        info!("Removed {} from {}", number, key);
        self.archive(ticket);
        Ok(Notice::Removed {
            service: key.to_string(),
            number: number.to_string(),
        })
    }

    /// Complete the ticket at a service's counter.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService` or `NothingServing`.
    pub fn complete_current(&mut self, key: &str) -> Result<Notice> {
        let ticket = self.service_mut(key)?.complete_current()?;
        info!("Completed {} at {}", ticket.number, key);
        let notice = Notice::Completed {
            service: key.to_string(),
            number: ticket.number.clone(),
        };
        self.archive(ticket);
        Ok(notice)
    }

    /// Cancel everyone waiting at a service.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService`.
    pub fn clear(&mut self, key: &str) -> Result<Notice> {
        let cleared = self.service_mut(key)?.clear();
        let count = cleared.len();
        info!("Cleared {} tickets from {}", count, key);
        for ticket in cleared {
            self.archive(ticket);
        }
        Ok(Notice::Cleared {
            service: key.to_string(),
            count,
        })
    }

    /// Pause a service's queue.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService`.
    pub fn pause(&mut self, key: &str) -> Result<Notice> {
        self.service_mut(key)?.pause();
        info!("Paused {}", key);
        Ok(Notice::Paused {
            service: key.to_string(),
        })
    }

    /// Resume a service's queue.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService`.
    pub fn resume(&mut self, key: &str) -> Result<Notice> {
        self.service_mut(key)?.resume();
        info!("Resumed {}", key);
        Ok(Notice::Resumed {
            service: key.to_string(),
        })
    }

    fn settle_call(&mut self, key: &str, outcome: CallOutcome) -> Vec<Notice> {
        let mut notices = Vec::new();
        if let Some(finished) = outcome.finished {
            notices.push(Notice::Completed {
                service: key.to_string(),
                number: finished.number.clone(),
            });
            self.archive(finished);
        }

        info!("Called {} at {}", outcome.called.number, key);
        notices.push(Notice::Called {
            service: key.to_string(),
            number: outcome.called.number.clone(),
        });
        if let Some(owner) = &outcome.called.owner {
            notices.push(Notice::YourTurn {
                owner: owner.clone(),
                number: outcome.called.number.clone(),
            });
        }
        notices
    }

    /// Keep closed tickets that belong to accounts; walk-ins are dropped.
    fn archive(&mut self, ticket: Ticket) {
        if ticket.owner.is_some() {
            self.history.push(ticket);
        }
    }
}

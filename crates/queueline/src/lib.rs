//! `queueline` - A multi-service virtual queue
//!
//! This library provides ticketed FIFO queues for several services, customer
//! and staff accounts with time-limited sessions, and a local `SQLite` mirror
//! of all state.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod account;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod queue;
pub mod session;
pub mod simulator;
pub mod storage;
pub mod ticket;
pub mod view;

pub use account::{Account, AccountBook, Role};
pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use manager::{Notice, QueueManager};
pub use queue::{QueueStats, ServiceQueue, WaitEstimate};
pub use session::{Session, SessionRegistry};
pub use simulator::{SimulationHandle, Simulator};
pub use storage::{Storage, StorageStats};
pub use ticket::{Ticket, TicketStatus};
pub use view::{AdminView, CustomerView, ServiceSummary};

//! Command-line interface for queueline.
//!
//! This module provides the CLI structure for the `qline` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AccountCommand, AdminCommand, ConfigCommand, QueueCommand, ServicesCommand, SimulateCommand,
    StoreCommand,
};

/// qline - Wait in line without standing in it
///
/// Take a ticket for a hospital, bank or government counter, watch your
/// place in the queue, and run the counter as staff.
#[derive(Debug, Parser)]
#[command(name = "qline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register, sign in and out
    #[command(subcommand)]
    Account(AccountCommand),

    /// List services and their queues
    Services(ServicesCommand),

    /// Join, leave and watch a queue
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Run the counter (staff only)
    #[command(subcommand)]
    Admin(AdminCommand),

    /// Simulate walk-in arrivals
    Simulate(SimulateCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Inspect or wipe the local store
    #[command(subcommand)]
    Store(StoreCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

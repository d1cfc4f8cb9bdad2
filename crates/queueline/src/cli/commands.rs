//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Account commands.
#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// Create an account
    Register {
        /// Email address (your login)
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password
        #[arg(short, long)]
        password: String,

        /// Register as staff (needs --admin-code)
        #[arg(long)]
        admin: bool,

        /// Staff registration code
        #[arg(long, requires = "admin", value_name = "CODE")]
        admin_code: Option<String>,
    },

    /// Sign in
    Login {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Services command arguments.
#[derive(Debug, Args)]
pub struct ServicesCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Customer queue commands.
#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Show the live queue for a service
    Status {
        /// Service key (e.g. hospital, bank, government)
        service: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Take a ticket for a service
    Join {
        /// Service key
        service: String,
    },

    /// Give up your waiting ticket
    Leave,

    /// Show where your ticket stands
    Mine {
        /// Service to show instead of the one you are queued for
        #[arg(short, long)]
        service: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List every ticket you have held
    History {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Staff commands.
#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Show the staff view of a service
    View {
        /// Service key
        service: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Call the next ticket in line
    Next {
        /// Service key
        service: String,
    },

    /// Call a specific waiting ticket
    Call {
        /// Service key
        service: String,

        /// Ticket number (e.g. H018)
        number: String,
    },

    /// Remove a waiting ticket
    Remove {
        /// Service key
        service: String,

        /// Ticket number
        number: String,
    },

    /// Complete the ticket at the counter
    Complete {
        /// Service key
        service: String,
    },

    /// Cancel everyone waiting
    Clear {
        /// Service key
        service: String,
    },

    /// Stop issuing tickets and calling
    Pause {
        /// Service key
        service: String,
    },

    /// Resume a paused queue
    Resume {
        /// Service key
        service: String,
    },
}

impl AdminCommand {
    /// The service the command acts on.
    #[must_use]
    pub fn service(&self) -> &str {
        match self {
            Self::View { service, .. }
            | Self::Next { service }
            | Self::Call { service, .. }
            | Self::Remove { service, .. }
            | Self::Complete { service }
            | Self::Clear { service }
            | Self::Pause { service }
            | Self::Resume { service } => service,
        }
    }
}

/// Simulate command arguments.
#[derive(Debug, Args)]
pub struct SimulateCommand {
    /// Stop after this many ticks (runs until Ctrl-C otherwise)
    #[arg(short, long)]
    pub ticks: Option<u64>,

    /// Milliseconds between ticks (overrides the configuration)
    #[arg(short, long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Local store commands.
#[derive(Debug, Subcommand)]
pub enum StoreCommand {
    /// Show database statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete all accounts, sessions and queues
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

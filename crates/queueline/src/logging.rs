//! Logging configuration for queueline.
//!
//! Sets up the tracing subscriber used by the `qline` binary. Events are
//! filtered by target, which is the module path of the code that emits them:
//! library code logs under `queueline::*`, while `main.rs` is compiled as its
//! own crate and logs under `qline`. The default filter names both so that
//! `-v` and `-q` reach the binary's own messages too.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Filter directives used when `RUST_LOG` is unset: the library crate and the binary.
#[must_use]
pub fn default_filter(verbosity: Verbosity) -> String {
    let level = verbosity.to_level_filter();
    format!("queueline={level},qline={level}")
}

/// Initialize the logging system.
///
/// The level comes from `verbosity` unless `RUST_LOG` is set, in which case
/// the environment wins. Log lines go to stderr so that command output on
/// stdout stays clean for piping JSON.
///
/// # Examples
///
/// ```no_run
/// use queueline::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Already set (tests, repeated calls) is fine
    let _ = subscriber.try_init();
}

/// Initialize logging for tests.
///
/// Only warnings and errors, routed through the test writer.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

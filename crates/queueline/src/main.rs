//! `qline` - CLI for queueline
//!
//! This binary provides the command-line interface for joining queues,
//! running the counter, and managing the local store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::debug;

use queueline::cli::{
    AccountCommand, AdminCommand, Cli, Command, ConfigCommand, QueueCommand, SimulateCommand,
    StoreCommand,
};
use queueline::{init_logging, App, Config, Notice, Simulator, Storage, Ticket};

/// Exit status when a queue refused the request (empty, paused, already joined).
const QUEUE_GUARD_EXIT: u8 = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;
    debug!("Using store {}", config.database_path().display());

    let outcome = match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        Command::Store(store_cmd) => handle_store(&config, store_cmd),
        Command::Account(account_cmd) => handle_account(&mut open_app(&config)?, account_cmd),
        Command::Services(services_cmd) => handle_services(&open_app(&config)?, services_cmd.json),
        Command::Queue(queue_cmd) => handle_queue(&mut open_app(&config)?, queue_cmd),
        Command::Admin(admin_cmd) => handle_admin(&mut open_app(&config)?, admin_cmd),
        Command::Simulate(simulate_cmd) => handle_simulate(open_app(&config)?, &simulate_cmd),
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => match queue_guard(&err) {
            Some(guard) => {
                debug!("Queue refused the command: {guard:?}");
                println!("{guard}");
                Ok(ExitCode::from(QUEUE_GUARD_EXIT))
            }
            None => Err(err),
        },
    }
}

/// The queue state that refused a command, if that is why it failed.
fn queue_guard(err: &anyhow::Error) -> Option<&queueline::Error> {
    err.downcast_ref::<queueline::Error>()
        .filter(|e| e.is_queue_guard())
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("opening store at {}", path.display()))
}

fn open_app(config: &Config) -> Result<App> {
    Ok(App::open(config.clone(), open_storage(config)?)?)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::YourTurn { owner, .. } => println!("  -> {owner}: {notice}"),
            _ => println!("{notice}"),
        }
    }
}

fn handle_account(app: &mut App, cmd: AccountCommand) -> Result<()> {
    match cmd {
        AccountCommand::Register {
            email,
            name,
            password,
            admin,
            admin_code,
        } => {
            let code = admin.then(|| admin_code.unwrap_or_default());
            let account = app.register(&email, &name, &password, code.as_deref())?;
            println!("Registered {} ({})", account.email, account.role);
            println!("Sign in with: qline account login -e {}", account.email);
        }
        AccountCommand::Login { email, password } => {
            let session = app.login(&email, &password)?;
            println!(
                "Signed in as {} until {}",
                session.email,
                session.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        AccountCommand::Logout => match app.logout()? {
            Some(email) => println!("Signed out {email}"),
            None => println!("Not signed in"),
        },
        AccountCommand::Whoami { json } => {
            let (account, session) = app.whoami()?;
            if json {
                print_json(&serde_json::json!({
                    "account": account,
                    "expires_at": session.expires_at,
                }))?;
            } else {
                let remaining = session.remaining(chrono::Utc::now());
                println!("{} <{}>", account.name, account.email);
                println!("Role:     {}", account.role);
                println!("Session:  {} min left", remaining.num_minutes());
            }
        }
    }
    Ok(())
}

fn handle_services(app: &App, json: bool) -> Result<()> {
    let services = app.services();
    if json {
        return print_json(&services);
    }
    for service in &services {
        println!("{service}");
    }
    Ok(())
}

fn handle_queue(app: &mut App, cmd: QueueCommand) -> Result<()> {
    match cmd {
        QueueCommand::Status { service, json } => {
            let view = app.service_view(&service)?;
            if json {
                print_json(&view)?;
            } else {
                print!("{view}");
            }
        }
        QueueCommand::Join { service } => {
            let (ticket, notice) = app.join(&service)?;
            println!("{notice}");
            let view = app.service_view(&ticket.service)?;
            println!(
                "People ahead: {}   Estimated wait: {}",
                view.people_ahead.unwrap_or(0),
                view.estimated_wait
            );
        }
        QueueCommand::Leave => {
            println!("{}", app.leave()?);
        }
        QueueCommand::Mine { service, json } => {
            let view = app.my_status(service.as_deref())?;
            if json {
                print_json(&view)?;
            } else {
                print!("{view}");
            }
        }
        QueueCommand::History { json } => {
            let tickets = app.history()?;
            if json {
                print_json(&tickets)?;
            } else {
                print_history(&tickets);
            }
        }
    }
    Ok(())
}

fn print_history(tickets: &[Ticket]) {
    if tickets.is_empty() {
        println!("No tickets yet.");
        return;
    }
    println!("{:<8} {:<12} {:<10} Joined", "Ticket", "Service", "Status");
    for ticket in tickets {
        println!(
            "{:<8} {:<12} {:<10} {}",
            ticket.number,
            ticket.service,
            ticket.status,
            ticket.joined_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn handle_admin(app: &mut App, cmd: AdminCommand) -> Result<()> {
    match cmd {
        AdminCommand::View { service, json } => {
            let view = app.admin_view(&service)?;
            if json {
                print_json(&view)?;
            } else {
                print!("{view}");
            }
        }
        AdminCommand::Next { service } => print_notices(&app.call_next(&service)?),
        AdminCommand::Call { service, number } => {
            print_notices(&app.call_specific(&service, &number)?);
        }
        AdminCommand::Remove { service, number } => println!("{}", app.remove(&service, &number)?),
        AdminCommand::Complete { service } => println!("{}", app.complete(&service)?),
        AdminCommand::Clear { service } => println!("{}", app.clear(&service)?),
        AdminCommand::Pause { service } => println!("{}", app.pause(&service)?),
        AdminCommand::Resume { service } => println!("{}", app.resume(&service)?),
    }
    Ok(())
}

fn handle_simulate(mut app: App, cmd: &SimulateCommand) -> Result<()> {
    let interval = cmd
        .interval_ms
        .map_or_else(|| app.config().simulation_interval(), Duration::from_millis);
    if interval.is_zero() {
        bail!("--interval-ms must be greater than 0");
    }

    let simulator = Simulator::new(interval).with_tick_limit(cmd.ticks);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    println!("Simulating arrivals (Ctrl-C to stop)...");
    let mut rng = rand::thread_rng();
    let summary = runtime.block_on(simulator.run(&mut app, &mut rng, |_, notices| {
        print_notices(notices);
    }))?;

    println!(
        "{} ticks, {} walk-ins",
        summary.ticks, summary.arrivals
    );
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                print_json(config)?;
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Auth]");
                println!("  Session TTL (min):  {}", config.auth.session_ttl_minutes);
                println!("  Min password:       {}", config.auth.min_password_length);
                println!(
                    "  Admin sign-up:      {}",
                    if config.auth.admin_code.is_some() {
                        "with code"
                    } else {
                        "disabled"
                    }
                );
                println!("  Seed admin:         {}", config.auth.seed_admin);
                println!();
                println!("[Queue]");
                println!("  Demo data:          {}", config.queue.seed_demo_data);
                for service in &config.queue.services {
                    println!(
                        "  {:<18}  {} ({}, ~{} min)",
                        service.key, service.name, service.prefix, service.avg_wait_minutes
                    );
                }
                println!();
                println!("[Simulation]");
                println!("  Interval (ms):      {}", config.simulation.interval_ms);
                println!(
                    "  Arrival chance:     {}",
                    config.simulation.arrival_probability
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

fn handle_store(config: &Config, cmd: StoreCommand) -> Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        StoreCommand::Stats { json } => {
            let stats = storage.stats()?;
            if json {
                print_json(&stats)?;
            } else {
                println!("Database:       {}", storage.path().display());
                println!("Schema version: {}", stats.schema_version);
                println!("Accounts:       {}", stats.accounts);
                println!("Sessions:       {}", stats.sessions);
                println!("Tickets:        {}", stats.tickets);
                println!("Open tickets:   {}", stats.open_tickets);
                println!("Size:           {} bytes", stats.db_size_bytes);
            }
        }
        StoreCommand::Reset { yes } => {
            if yes {
                storage.reset()?;
                println!("Store reset. Demo data is restored on the next command.");
            } else {
                println!("This deletes all accounts, sessions and queues.");
                println!("Use --yes to confirm.");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_guard_is_reported_as_notice() {
        let err = anyhow::Error::from(queueline::Error::QueueEmpty {
            service: "bank".to_string(),
        });
        let guard = queue_guard(&err).unwrap();
        assert_eq!(guard.to_string(), "no one in queue for bank");

        let err = anyhow::Error::from(queueline::Error::NotAuthenticated);
        assert!(queue_guard(&err).is_none());

        let err = anyhow::anyhow!("opening store");
        assert!(queue_guard(&err).is_none());
    }

    #[test]
    fn test_config_validate_fails_on_invalid_file() {
        let path = std::env::temp_dir().join(format!(
            "qline_validate_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[simulation]\ninterval_ms = 0\n").unwrap();

        let result = handle_config(
            &Config::default(),
            ConfigCommand::Validate {
                file: Some(path.clone()),
            },
        );
        let _ = std::fs::remove_file(&path);

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("interval_ms"));
    }

    #[test]
    fn test_config_validate_accepts_valid_file() {
        let path = std::env::temp_dir().join(format!(
            "qline_validate_ok_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[simulation]\ninterval_ms = 500\n").unwrap();

        let result = handle_config(
            &Config::default(),
            ConfigCommand::Validate {
                file: Some(path.clone()),
            },
        );
        let _ = std::fs::remove_file(&path);

        assert!(result.is_ok());
    }
}

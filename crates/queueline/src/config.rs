//! Configuration management for queueline.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "queueline";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "queueline.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `QUEUELINE_`, sections split on `__`)
/// 2. TOML config file at `~/.config/queueline/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Account and session configuration.
    pub auth: AuthConfig,
    /// Service queue configuration.
    pub queue: QueueConfig,
    /// Arrival simulation configuration.
    pub simulation: SimulationConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/queueline/queueline.db`
    pub database_path: Option<PathBuf>,
}

/// Account and session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long a sign-in stays valid, in minutes.
    pub session_ttl_minutes: u32,
    /// Minimum accepted password length.
    pub min_password_length: usize,
    /// Regex an email address must match.
    pub email_pattern: String,
    /// Code required to self-register as an admin. When unset, admin
    /// self-registration is refused.
    pub admin_code: Option<String>,
    /// Create a default admin account when no accounts exist.
    pub seed_admin: bool,
    /// Email of the seeded admin.
    pub admin_email: String,
    /// Password of the seeded admin.
    pub admin_password: String,
}

/// Service queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Fill fresh queues with demo tickets on first run.
    pub seed_demo_data: bool,
    /// The services customers can queue for.
    pub services: Vec<ServiceConfig>,
}

/// A single service offering a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Short key used on the command line (e.g. `hospital`).
    pub key: String,
    /// Display name.
    pub name: String,
    /// Ticket number prefix.
    pub prefix: char,
    /// Average minutes spent per customer.
    pub avg_wait_minutes: u32,
    /// Number of the ticket being served when demo data is seeded.
    #[serde(default = "default_starting_number")]
    pub starting_number: u32,
    /// Walk-ins waiting behind it when demo data is seeded.
    #[serde(default)]
    pub demo_waiting: u32,
}

/// Arrival simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Tick interval in milliseconds.
    pub interval_ms: u64,
    /// Per-service chance of a walk-in arriving on each tick.
    pub arrival_probability: f64,
}

fn default_starting_number() -> u32 {
    1
}

impl ServiceConfig {
    /// Number handed to the first customer after the demo line, if it fits in a `u32`.
    #[must_use]
    pub fn first_free_number(&self) -> Option<u32> {
        self.starting_number
            .checked_add(self.demo_waiting)?
            .checked_add(1)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 8 * 60,
            min_password_length: 6,
            email_pattern: r"^[^@\s]+@[^@\s]+\.[^@\s]+$".to_string(),
            admin_code: None,
            seed_admin: true,
            admin_email: "admin@queueline.local".to_string(),
            admin_password: "admin123".to_string(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            seed_demo_data: true,
            services: default_services(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            arrival_probability: 0.3,
        }
    }
}

/// The three demo services.
fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig {
            key: "hospital".to_string(),
            name: "Hospital - General Consultation".to_string(),
            prefix: 'H',
            avg_wait_minutes: 8,
            starting_number: 15,
            demo_waiting: 5,
        },
        ServiceConfig {
            key: "bank".to_string(),
            name: "Bank - Customer Service".to_string(),
            prefix: 'B',
            avg_wait_minutes: 5,
            starting_number: 32,
            demo_waiting: 3,
        },
        ServiceConfig {
            key: "government".to_string(),
            name: "Government - Document Services".to_string(),
            prefix: 'G',
            avg_wait_minutes: 12,
            starting_number: 8,
            demo_waiting: 6,
        },
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("QUEUELINE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.queue.services.is_empty() {
            return Err(invalid("at least one service must be configured"));
        }

        let mut keys = HashSet::new();
        let mut prefixes = HashSet::new();
        for service in &self.queue.services {
            if service.key.trim().is_empty() {
                return Err(invalid("service key cannot be empty"));
            }
            if !keys.insert(service.key.as_str()) {
                return Err(invalid(format!("duplicate service key: {}", service.key)));
            }
            if !service.prefix.is_ascii_alphabetic() {
                return Err(invalid(format!(
                    "service {} prefix must be a letter, got '{}'",
                    service.key, service.prefix
                )));
            }
            if !prefixes.insert(service.prefix.to_ascii_uppercase()) {
                return Err(invalid(format!(
                    "duplicate ticket prefix '{}' (service {})",
                    service.prefix, service.key
                )));
            }
            if service.avg_wait_minutes == 0 {
                return Err(invalid(format!(
                    "service {} avg_wait_minutes must be greater than 0",
                    service.key
                )));
            }
            if service.first_free_number().is_none() {
                return Err(invalid(format!(
                    "service {} starting_number plus demo_waiting must stay below {}",
                    service.key,
                    u32::MAX
                )));
            }
        }

        if self.simulation.interval_ms == 0 {
            return Err(invalid("simulation interval_ms must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.simulation.arrival_probability) {
            return Err(invalid(format!(
                "arrival_probability must be between 0 and 1, got {}",
                self.simulation.arrival_probability
            )));
        }

        if self.auth.min_password_length == 0 {
            return Err(invalid("min_password_length must be at least 1"));
        }

        if self.auth.session_ttl_minutes == 0 {
            return Err(invalid("session_ttl_minutes must be greater than 0"));
        }

        let Ok(email_pattern) = regex::Regex::new(&self.auth.email_pattern) else {
            return Err(invalid(format!(
                "invalid email regex pattern: {}",
                self.auth.email_pattern
            )));
        };

        // The seeded admin goes through registration and must pass the same rules
        if self.auth.seed_admin {
            let email = self.auth.admin_email.trim().to_lowercase();
            if !email_pattern.is_match(&email) {
                return Err(invalid(format!(
                    "admin_email '{email}' does not match email_pattern"
                )));
            }
            if self.auth.admin_password.chars().count() < self.auth.min_password_length {
                return Err(invalid(format!(
                    "admin_password must be at least {} characters",
                    self.auth.min_password_length
                )));
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the session lifetime.
    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.auth.session_ttl_minutes))
    }

    /// Get the simulation tick interval as a Duration.
    #[must_use]
    pub fn simulation_interval(&self) -> Duration {
        Duration::from_millis(self.simulation.interval_ms)
    }

    /// Look up a configured service by key.
    #[must_use]
    pub fn service(&self, key: &str) -> Option<&ServiceConfig> {
        self.queue.services.iter().find(|s| s.key == key)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.queue.seed_demo_data);
        assert_eq!(config.queue.services.len(), 3);
        assert!(config.auth.seed_admin);
        assert!(config.auth.admin_code.is_none());
    }

    #[test]
    fn test_default_services_match_demo() {
        let config = Config::default();
        let hospital = config.service("hospital").unwrap();
        assert_eq!(hospital.prefix, 'H');
        assert_eq!(hospital.avg_wait_minutes, 8);
        assert_eq!(hospital.starting_number, 15);
        assert_eq!(hospital.demo_waiting, 5);

        let bank = config.service("bank").unwrap();
        assert_eq!(bank.starting_number + bank.demo_waiting + 1, 36);

        let government = config.service("government").unwrap();
        assert_eq!(government.avg_wait_minutes, 12);
        assert_eq!(government.starting_number + government.demo_waiting + 1, 15);
    }

    #[test]
    fn test_default_simulation_config() {
        let sim = SimulationConfig::default();
        assert_eq!(sim.interval_ms, 3000);
        assert!((sim.arrival_probability - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_admin_password_shorter_than_minimum() {
        let mut config = Config::default();
        config.auth.min_password_length = 10;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("admin_password must be at least 10"));

        config.auth.seed_admin = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_admin_email_against_pattern() {
        let mut config = Config::default();
        config.auth.email_pattern = r"^[^@\s]+@example\.com$".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("admin_email"));

        config.auth.admin_email = " Staff@Example.com ".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ticket_numbers_fit() {
        let mut config = Config::default();
        config.queue.services[0].starting_number = u32::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("starting_number plus demo_waiting"));

        config.queue.services[0].starting_number = u32::MAX - 7;
        config.queue.services[0].demo_waiting = 6;
        assert_eq!(config.queue.services[0].first_free_number(), Some(u32::MAX));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_no_services() {
        let mut config = Config::default();
        config.queue.services.clear();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("at least one service"));
    }

    #[test]
    fn test_validate_duplicate_key() {
        let mut config = Config::default();
        let mut dup = config.queue.services[0].clone();
        dup.prefix = 'X';
        config.queue.services.push(dup);

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate service key"));
    }

    #[test]
    fn test_validate_duplicate_prefix() {
        let mut config = Config::default();
        config.queue.services[1].prefix = 'h';

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate ticket prefix"));
    }

    #[test]
    fn test_validate_non_letter_prefix() {
        let mut config = Config::default();
        config.queue.services[0].prefix = '7';

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must be a letter"));
    }

    #[test]
    fn test_validate_zero_avg_wait() {
        let mut config = Config::default();
        config.queue.services[2].avg_wait_minutes = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("avg_wait_minutes"));
    }

    #[test]
    fn test_validate_probability_out_of_range() {
        let mut config = Config::default();
        config.simulation.arrival_probability = 1.5;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("arrival_probability"));
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.simulation.interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("interval_ms"));
    }

    #[test]
    fn test_validate_invalid_email_regex() {
        let mut config = Config::default();
        config.auth.email_pattern = "[invalid".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid email regex"));
    }

    #[test]
    fn test_validate_zero_password_length() {
        let mut config = Config::default();
        config.auth.min_password_length = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config.database_path().to_string_lossy().contains("queueline.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/q.sqlite"));

        assert_eq!(config.database_path(), PathBuf::from("/custom/path/q.sqlite"));
    }

    #[test]
    fn test_session_ttl() {
        let config = Config::default();
        assert_eq!(config.session_ttl(), chrono::Duration::hours(8));
    }

    #[test]
    fn test_simulation_interval() {
        let config = Config::default();
        assert_eq!(config.simulation_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("queueline"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("queueline_cfg_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[auth]
min_password_length = 10

[[queue.services]]
key = "dmv"
name = "DMV - Licensing"
prefix = "D"
avg_wait_minutes = 20
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.auth.min_password_length, 10);
        assert_eq!(config.queue.services.len(), 1);
        let dmv = config.service("dmv").unwrap();
        assert_eq!(dmv.starting_number, 1);
        assert_eq!(dmv.demo_waiting, 0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_service_config_deserialize() {
        let json = r#"{"key": "post", "name": "Post Office", "prefix": "P", "avg_wait_minutes": 4}"#;
        let service: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(service.prefix, 'P');
        assert_eq!(service.starting_number, 1);
    }
}

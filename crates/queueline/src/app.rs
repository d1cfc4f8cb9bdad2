//! Application facade.
//!
//! [`App`] is what the `qline` commands talk to. Each call resolves the
//! signed-in session, checks the caller's role, applies the change to the
//! in-memory state and writes it through to [`Storage`] before returning the
//! notices to show.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::account::{Account, AccountBook, Role};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::manager::{Notice, QueueManager};
use crate::session::{Session, SessionRegistry};
use crate::simulator;
use crate::storage::{Storage, StorageStats};
use crate::ticket::Ticket;
use crate::view::{AdminView, CustomerView, ServiceSummary};

/// The running application state.
#[derive(Debug)]
pub struct App {
    config: Config,
    storage: Storage,
    accounts: AccountBook,
    sessions: SessionRegistry,
    queues: QueueManager,
}

impl App {
    /// Load state from `storage`, seeding demo data and the default admin on
    /// first run and dropping expired sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or storage fails.
    pub fn open(config: Config, storage: Storage) -> Result<Self> {
        config.validate()?;

        let mut accounts = AccountBook::with_accounts(&config.auth, storage.load_accounts()?)?;
        if accounts.seed_admin(&config.auth)? {
            info!("Created default admin {}", config.auth.admin_email);
            storage.save_accounts(&accounts)?;
        }

        let mut sessions = SessionRegistry::with_sessions(storage.load_sessions()?);
        let purged = sessions.purge_expired(Utc::now());
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
            storage.save_sessions(&sessions)?;
        }

        let queues = if let Some(queues) = storage.load_queues(&config.queue.services)? {
            queues
        } else {
            let mut queues = QueueManager::from_services(&config.queue.services);
            if config.queue.seed_demo_data {
                queues.seed_demo(&config.queue.services);
                info!("Seeded demo queues");
            }
            storage.save_queues(&queues)?;
            queues
        };

        Ok(Self {
            config,
            storage,
            accounts,
            sessions,
            queues,
        })
    }

    /// Open an app on a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::open(config, Storage::open_in_memory()?)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backing store.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The queue state.
    #[must_use]
    pub fn queues(&self) -> &QueueManager {
        &self.queues
    }

    // === Accounts and sessions ===

    /// Register an account. Supplying `admin_code` asks for the admin role,
    /// which is granted only if it matches the configured code.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegistration` for bad input or a wrong admin code,
    /// and `AccountExists` for a taken email.
    pub fn register(
        &mut self,
        email: &str,
        name: &str,
        password: &str,
        admin_code: Option<&str>,
    ) -> Result<Account> {
        let role = match (admin_code, self.config.auth.admin_code.as_deref()) {
            (None, _) => Role::Customer,
            (Some(_), None) => {
                return Err(Error::invalid_registration(
                    "admin self-registration is disabled",
                ))
            }
            (Some(given), Some(expected)) if given == expected => Role::Admin,
            (Some(_), Some(_)) => return Err(Error::invalid_registration("invalid admin code")),
        };

        let account = self.accounts.register(email, name, password, role)?.clone();
        self.storage.save_accounts(&self.accounts)?;
        Ok(account)
    }

    /// Sign in and remember the session for later commands.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if the email or password is wrong.
    pub fn login(&mut self, email: &str, password: &str) -> Result<Session> {
        let account = self.accounts.verify(email, password)?;
        let session = self.sessions.issue(&account.email, self.config.session_ttl());
        info!("{} signed in", account.email);

        if let Some(previous) = self.storage.current_session()? {
            self.sessions.revoke(&previous);
        }
        self.storage.save_sessions(&self.sessions)?;
        self.storage.set_current_session(Some(&session.token))?;
        Ok(session)
    }

    /// Sign out. Returns the email that was signed in, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn logout(&mut self) -> Result<Option<String>> {
        let Some(token) = self.storage.current_session()? else {
            return Ok(None);
        };

        let email = self
            .sessions
            .iter()
            .find(|s| s.token == token)
            .map(|s| s.email.clone());
        self.sessions.revoke(&token);
        self.storage.save_sessions(&self.sessions)?;
        self.storage.set_current_session(None)?;
        if let Some(email) = &email {
            info!("{} signed out", email);
        }
        Ok(email)
    }

    /// The signed-in account and its session.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` or `SessionExpired`.
    pub fn whoami(&mut self) -> Result<(Account, Session)> {
        self.authenticate_at(Utc::now())
    }

    fn authenticate_at(&mut self, now: DateTime<Utc>) -> Result<(Account, Session)> {
        let token = self
            .storage
            .current_session()?
            .ok_or(Error::NotAuthenticated)?;

        let resolved = self.sessions.resolve(&token, now).cloned();
        let session = match resolved {
            Ok(session) => session,
            Err(err) => {
                // Forget a token that no longer resolves
                self.storage.save_sessions(&self.sessions)?;
                self.storage.set_current_session(None)?;
                return Err(err);
            }
        };

        let Some(account) = self.accounts.get(&session.email).cloned() else {
            warn!("Session for unknown account {}", session.email);
            return Err(Error::NotAuthenticated);
        };
        Ok((account, session))
    }

    fn require_customer(&mut self) -> Result<Account> {
        self.whoami().map(|(account, _)| account)
    }

    fn require_admin(&mut self, action: &'static str) -> Result<Account> {
        let account = self.require_customer()?;
        if !account.is_admin() {
            return Err(Error::Forbidden {
                action,
                required: "admin",
            });
        }
        Ok(account)
    }

    /// The signed-in email, if any. Sign-in problems are not errors here.
    fn viewer(&mut self) -> Option<String> {
        match self.whoami() {
            Ok((account, _)) => Some(account.email),
            Err(err) => {
                debug!("Viewing anonymously: {}", err);
                None
            }
        }
    }

    // === Public reads ===

    /// All services in configuration order.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceSummary> {
        self.queues.services().map(ServiceSummary::from).collect()
    }

    /// The customer view of a service, personalized if someone is signed in.
    ///
    /// # Errors
    ///
    /// Returns `UnknownService`.
    pub fn service_view(&mut self, key: &str) -> Result<CustomerView> {
        let viewer = self.viewer();
        let queue = self.queues.service(key)?;
        Ok(CustomerView::build(queue, viewer.as_deref()))
    }

    // === Customer operations ===

    /// Join a service's queue.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `AlreadyInQueue`, `UnknownService`
    /// or `QueuePaused`.
    pub fn join(&mut self, key: &str) -> Result<(Ticket, Notice)> {
        let account = self.require_customer()?;
        let joined = self.queues.join(key, &account.email)?;
        self.storage.save_queues(&self.queues)?;
        Ok(joined)
    }

    /// Leave the queue the signed-in customer is waiting in.
    ///
    /// # Errors
    ///
    /// Returns an authentication error or `NotInQueue`.
    pub fn leave(&mut self) -> Result<Notice> {
        let account = self.require_customer()?;
        let notice = self.queues.leave(&account.email)?;
        self.storage.save_queues(&self.queues)?;
        Ok(notice)
    }

    /// The customer view for the signed-in customer. Without a key, the
    /// service of their open ticket is shown.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `UnknownService`, or `NotInQueue`
    /// when no key is given and no ticket is open.
    pub fn my_status(&mut self, key: Option<&str>) -> Result<CustomerView> {
        let account = self.require_customer()?;
        let key = match key {
            Some(key) => key.to_string(),
            None => self
                .queues
                .active_ticket(&account.email)
                .map(|t| t.service.clone())
                .ok_or(Error::NotInQueue)?,
        };
        let queue = self.queues.service(&key)?;
        Ok(CustomerView::build(queue, Some(&account.email)))
    }

    /// Every ticket the signed-in customer has held, newest first.
    ///
    /// # Errors
    ///
    /// Returns an authentication error.
    pub fn history(&mut self) -> Result<Vec<Ticket>> {
        let account = self.require_customer()?;
        Ok(self.queues.history(&account.email))
    }

    // === Staff operations ===

    /// Call the next ticket.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `Forbidden`, or a queue error.
    pub fn call_next(&mut self, key: &str) -> Result<Vec<Notice>> {
        self.require_admin("calling the next ticket")?;
        let notices = self.queues.call_next(key)?;
        self.storage.save_queues(&self.queues)?;
        Ok(notices)
    }

    /// Call a specific waiting ticket.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `Forbidden`, or a queue error.
    pub fn call_specific(&mut self, key: &str, number: &str) -> Result<Vec<Notice>> {
        self.require_admin("calling a ticket")?;
        let notices = self.queues.call_specific(key, &number.to_ascii_uppercase())?;
        self.storage.save_queues(&self.queues)?;
        Ok(notices)
    }

    /// Remove a waiting ticket.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `Forbidden`, or a queue error.
    pub fn remove(&mut self, key: &str, number: &str) -> Result<Notice> {
        self.require_admin("removing a ticket")?;
        let notice = self.queues.remove(key, &number.to_ascii_uppercase())?;
        self.storage.save_queues(&self.queues)?;
        Ok(notice)
    }

    /// Complete the ticket at the counter.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `Forbidden`, or a queue error.
    pub fn complete(&mut self, key: &str) -> Result<Notice> {
        self.require_admin("completing a ticket")?;
        let notice = self.queues.complete_current(key)?;
        self.storage.save_queues(&self.queues)?;
        Ok(notice)
    }

    /// Cancel everyone waiting.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `Forbidden`, or `UnknownService`.
    pub fn clear(&mut self, key: &str) -> Result<Notice> {
        self.require_admin("clearing a queue")?;
        let notice = self.queues.clear(key)?;
        self.storage.save_queues(&self.queues)?;
        Ok(notice)
    }

    /// Pause a queue.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `Forbidden`, or `UnknownService`.
    pub fn pause(&mut self, key: &str) -> Result<Notice> {
        self.require_admin("pausing a queue")?;
        let notice = self.queues.pause(key)?;
        self.storage.save_queues(&self.queues)?;
        Ok(notice)
    }

    /// Resume a queue.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `Forbidden`, or `UnknownService`.
    pub fn resume(&mut self, key: &str) -> Result<Notice> {
        self.require_admin("resuming a queue")?;
        let notice = self.queues.resume(key)?;
        self.storage.save_queues(&self.queues)?;
        Ok(notice)
    }

    /// The staff view of a service.
    ///
    /// # Errors
    ///
    /// Returns an authentication error, `Forbidden`, or `UnknownService`.
    pub fn admin_view(&mut self, key: &str) -> Result<AdminView> {
        self.require_admin("the admin view")?;
        Ok(AdminView::build(self.queues.service(key)?))
    }

    // === Simulation and maintenance ===

    /// Run one round of simulated walk-in arrivals and persist the result.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn simulate_tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<Notice>> {
        let notices = simulator::arrivals(
            &mut self.queues,
            self.config.simulation.arrival_probability,
            rng,
        );
        if !notices.is_empty() {
            self.storage.save_queues(&self.queues)?;
        }
        Ok(notices)
    }

    /// Row counts and file size of the store.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn store_stats(&self) -> Result<StorageStats> {
        self.storage.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn app() -> App {
        crate::logging::init_test_logging();
        App::in_memory(Config::default()).unwrap()
    }

    fn sign_in_customer(app: &mut App) {
        app.register("ada@example.com", "Ada", "secret1", None)
            .unwrap();
        app.login("ada@example.com", "secret1").unwrap();
    }

    fn sign_in_admin(app: &mut App) {
        app.login("admin@queueline.local", "admin123").unwrap();
    }

    #[test]
    fn test_first_run_seeds_demo_and_admin() {
        let app = app();
        let services = app.services();
        assert_eq!(services.len(), 3);
        assert_eq!(services[0].currently_serving.as_deref(), Some("H015"));
        assert_eq!(services[0].waiting, 5);

        let stats = app.store_stats().unwrap();
        assert_eq!(stats.accounts, 1);
        assert_eq!(stats.open_tickets, 17);
    }

    #[test]
    fn test_no_demo_data() {
        let mut config = Config::default();
        config.queue.seed_demo_data = false;
        let app = App::in_memory(config).unwrap();
        assert!(app.services().iter().all(|s| s.waiting == 0));
    }

    #[test]
    fn test_strict_password_rule_rejects_default_admin_up_front() {
        let mut config = Config::default();
        config.auth.min_password_length = 10;
        let err = App::in_memory(config.clone()).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));

        config.auth.admin_password = "a-longer-secret".to_string();
        let mut app = App::in_memory(config).unwrap();
        app.login("admin@queueline.local", "a-longer-secret").unwrap();
    }

    #[test]
    fn test_join_requires_sign_in() {
        let mut app = app();
        let err = app.join("bank").unwrap_err();
        assert!(err.is_auth_error());
    }

    #[test]
    fn test_customer_flow() {
        let mut app = app();
        sign_in_customer(&mut app);

        let (ticket, notice) = app.join("bank").unwrap();
        assert_eq!(ticket.number, "B036");
        assert_eq!(notice.to_string(), "Joined queue! Your token: B036");

        let view = app.my_status(None).unwrap();
        assert_eq!(view.service, "bank");
        assert_eq!(view.people_ahead, Some(3));
        assert_eq!(view.estimated_wait.to_string(), "15 min");

        app.leave().unwrap();
        let history = app.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, TicketStatus::Cancelled);
        assert!(matches!(app.my_status(None), Err(Error::NotInQueue)));
    }

    #[test]
    fn test_customer_cannot_use_admin_operations() {
        let mut app = app();
        sign_in_customer(&mut app);

        let err = app.call_next("bank").unwrap_err();
        assert_eq!(
            err.to_string(),
            "calling the next ticket requires the admin role"
        );
        assert!(app.admin_view("bank").is_err());
    }

    #[test]
    fn test_admin_calls_customer() {
        let mut app = app();
        sign_in_customer(&mut app);
        app.join("government").unwrap();

        sign_in_admin(&mut app);
        let notices = app.call_specific("government", "g015").unwrap();
        assert!(notices
            .iter()
            .any(|n| n.to_string() == "Your turn! Please proceed to the counter."));

        let view = app.admin_view("government").unwrap();
        assert_eq!(view.stats.currently_serving.as_deref(), Some("G015"));
        assert_eq!(view.stats.counters.served, 1);
    }

    #[test]
    fn test_admin_queue_controls() {
        let mut app = app();
        sign_in_admin(&mut app);

        assert_eq!(
            app.remove("hospital", "H016").unwrap().to_string(),
            "Removed H016 from queue"
        );
        assert_eq!(
            app.complete("hospital").unwrap().to_string(),
            "H015 marked as completed"
        );
        app.pause("hospital").unwrap();
        assert!(matches!(
            app.call_next("hospital"),
            Err(Error::QueuePaused { .. })
        ));
        app.resume("hospital").unwrap();
        assert_eq!(
            app.clear("hospital").unwrap().to_string(),
            "Cleared 4 from queue"
        );
        assert!(matches!(
            app.call_next("hospital"),
            Err(Error::QueueEmpty { .. })
        ));
    }

    #[test]
    fn test_register_admin_requires_code() {
        let mut app = app();
        let err = app
            .register("boss@example.com", "Boss", "secret1", Some("x"))
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));

        let mut config = Config::default();
        config.auth.admin_code = Some("letmein".to_string());
        let mut app = App::in_memory(config).unwrap();
        assert!(app
            .register("boss@example.com", "Boss", "secret1", Some("wrong"))
            .is_err());
        let account = app
            .register("boss@example.com", "Boss", "secret1", Some("letmein"))
            .unwrap();
        assert!(account.is_admin());
    }

    #[test]
    fn test_login_replaces_previous_session() {
        let mut app = app();
        sign_in_customer(&mut app);
        sign_in_admin(&mut app);

        let (account, _) = app.whoami().unwrap();
        assert_eq!(account.email, "admin@queueline.local");
        assert_eq!(app.store_stats().unwrap().sessions, 1);
    }

    #[test]
    fn test_logout() {
        let mut app = app();
        sign_in_customer(&mut app);

        assert_eq!(app.logout().unwrap().as_deref(), Some("ada@example.com"));
        assert!(matches!(app.whoami(), Err(Error::NotAuthenticated)));
        assert_eq!(app.logout().unwrap(), None);
    }

    #[test]
    fn test_expired_session_is_forgotten() {
        let mut app = app();
        sign_in_customer(&mut app);

        let later = Utc::now() + app.config().session_ttl() + chrono::Duration::minutes(1);
        assert!(matches!(
            app.authenticate_at(later),
            Err(Error::SessionExpired)
        ));
        assert_eq!(app.storage().current_session().unwrap(), None);
        assert!(matches!(app.whoami(), Err(Error::NotAuthenticated)));
    }

    #[test]
    fn test_service_view_is_public() {
        let mut app = app();
        let view = app.service_view("hospital").unwrap();
        assert_eq!(view.your_ticket, None);
        assert!(app.service_view("dentist").is_err());
    }

    #[test]
    fn test_simulate_tick_always_arrives() {
        let mut config = Config::default();
        config.simulation.arrival_probability = 1.0;
        let mut app = App::in_memory(config).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let notices = app.simulate_tick(&mut rng).unwrap();
        assert_eq!(notices.len(), 3);
        assert_eq!(app.services()[1].waiting, 4);
    }
}

//! End-to-end flows against a database file, reopening the app between
//! steps the way separate `qline` invocations do.

use std::path::{Path, PathBuf};

use queueline::{App, Config, Error, Storage, TicketStatus};

struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "queueline_e2e_{}_{}.db",
            name,
            std::process::id()
        ));
        let db = Self { path };
        db.cleanup();
        db
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.storage.database_path = Some(self.path.clone());
        config
    }

    fn open(&self) -> App {
        let config = self.config();
        let storage = Storage::open(config.database_path()).unwrap();
        App::open(config, storage).unwrap()
    }

    fn cleanup(&self) {
        for p in [
            self.path.clone(),
            with_suffix(&self.path, "-wal"),
            with_suffix(&self.path, "-shm"),
        ] {
            let _ = std::fs::remove_file(p);
        }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

#[test]
fn customer_and_admin_across_invocations() {
    let db = TempDb::new("flow");

    {
        let mut app = db.open();
        app.register("ada@example.com", "Ada", "secret1", None)
            .unwrap();
        app.login("ada@example.com", "secret1").unwrap();
        let (ticket, _) = app.join("hospital").unwrap();
        assert_eq!(ticket.number, "H021");
    }

    {
        // Session and ticket survive a restart
        let mut app = db.open();
        let view = app.my_status(None).unwrap();
        assert_eq!(view.your_ticket.as_deref(), Some("H021"));
        assert_eq!(view.people_ahead, Some(5));
        assert_eq!(view.estimated_wait.to_string(), "40 min");
        app.logout().unwrap();
    }

    {
        let mut app = db.open();
        app.login("admin@queueline.local", "admin123").unwrap();
        for _ in 0..5 {
            app.call_next("hospital").unwrap();
        }
        let notices = app.call_next("hospital").unwrap();
        assert!(notices
            .iter()
            .any(|n| matches!(n, queueline::Notice::YourTurn { owner, .. } if owner == "ada@example.com")));
        app.complete("hospital").unwrap();
        app.logout().unwrap();
    }

    {
        let mut app = db.open();
        app.login("ada@example.com", "secret1").unwrap();
        let history = app.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].number, "H021");
        assert_eq!(history[0].status, TicketStatus::Completed);
        assert!(history[0].called_at.is_some());
        assert!(history[0].finished_at.is_some());

        let admin = app.queues().service("hospital").unwrap().stats();
        assert_eq!(admin.counters.served, 7);
        assert_eq!(admin.total_waiting, 0);
    }
}

#[test]
fn demo_data_is_seeded_once() {
    let db = TempDb::new("seed");

    {
        let mut app = db.open();
        app.login("admin@queueline.local", "admin123").unwrap();
        app.clear("bank").unwrap();
    }

    let app = db.open();
    let bank = app.queues().service("bank").unwrap();
    assert!(bank.is_empty());
    assert_eq!(bank.next_number(), 36);
    assert_eq!(app.store_stats().unwrap().accounts, 1);
}

#[test]
fn reset_restores_demo_state() {
    let db = TempDb::new("reset");

    {
        let mut app = db.open();
        app.register("ada@example.com", "Ada", "secret1", None)
            .unwrap();
        app.login("ada@example.com", "secret1").unwrap();
        app.join("bank").unwrap();
        app.storage().reset().unwrap();
    }

    let mut app = db.open();
    assert!(matches!(app.whoami(), Err(Error::NotAuthenticated)));
    assert!(matches!(
        app.login("ada@example.com", "secret1"),
        Err(Error::InvalidCredentials)
    ));
    assert_eq!(app.queues().service("bank").unwrap().len(), 3);
}

#[test]
fn paused_queue_stays_paused() {
    let db = TempDb::new("pause");

    {
        let mut app = db.open();
        app.login("admin@queueline.local", "admin123").unwrap();
        app.pause("government").unwrap();
        app.register("bob@example.com", "Bob", "secret1", None)
            .unwrap();
        app.login("bob@example.com", "secret1").unwrap();
    }

    let mut app = db.open();
    assert!(matches!(
        app.join("government"),
        Err(Error::QueuePaused { .. })
    ));
    assert!(app.join("bank").is_ok());
}

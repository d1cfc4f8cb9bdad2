//! Simulated walk-in arrivals.
//!
//! Each tick gives every open service one chance to receive an anonymous
//! walk-in. [`Simulator`] drives ticks on a timer against an [`App`] until a
//! tick limit is reached, its [`SimulationHandle`] is stopped, or Ctrl-C.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::App;
use crate::error::Result;
use crate::manager::{Notice, QueueManager};

/// Run one round of arrivals: each unpaused service gets a walk-in with
/// probability `probability`.
pub fn arrivals<R: Rng + ?Sized>(
    manager: &mut QueueManager,
    probability: f64,
    rng: &mut R,
) -> Vec<Notice> {
    let probability = probability.clamp(0.0, 1.0);
    let open: Vec<String> = manager
        .services()
        .filter(|q| !q.is_paused())
        .map(|q| q.key().to_string())
        .collect();

    let mut notices = Vec::new();
    for key in open {
        if !rng.gen_bool(probability) {
            continue;
        }
        match manager.walk_in(&key) {
            Ok(notice) => notices.push(notice),
            Err(e) => warn!("Walk-in for {} failed: {}", key, e),
        }
    }
    notices
}

/// A cloneable signal for stopping a running simulation.
#[derive(Debug, Clone, Default)]
pub struct SimulationHandle {
    stop_signal: Arc<AtomicBool>,
}

impl SimulationHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the simulation to stop before its next tick.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

/// Totals for a finished simulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    /// Ticks run.
    pub ticks: u64,
    /// Walk-ins issued.
    pub arrivals: u64,
}

/// Timer-driven arrival simulation.
#[derive(Debug)]
pub struct Simulator {
    interval: Duration,
    max_ticks: Option<u64>,
    handle: SimulationHandle,
}

impl Simulator {
    /// Create a simulator ticking every `interval`, running until stopped.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
            handle: SimulationHandle::new(),
        }
    }

    /// Stop after `ticks` ticks.
    #[must_use]
    pub fn with_tick_limit(mut self, ticks: Option<u64>) -> Self {
        self.max_ticks = ticks;
        self
    }

    /// A handle that stops this simulator.
    #[must_use]
    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }

    /// Drive ticks until the limit, a stop request, or Ctrl-C.
    ///
    /// `on_tick` sees the tick number (from 1) and that tick's notices.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting a tick fails.
    pub async fn run<R, F>(
        &self,
        app: &mut App,
        rng: &mut R,
        mut on_tick: F,
    ) -> Result<SimulationSummary>
    where
        R: Rng + ?Sized,
        F: FnMut(u64, &[Notice]),
    {
        let mut summary = SimulationSummary::default();
        let mut interval = tokio::time::interval(self.interval);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!(
            "Simulating arrivals every {:?}{}",
            self.interval,
            self.max_ticks
                .map(|n| format!(" for {n} ticks"))
                .unwrap_or_default()
        );

        loop {
            if self.handle.should_stop() {
                debug!("Simulation stop requested");
                break;
            }
            if self.max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
            }

            let notices = app.simulate_tick(rng)?;
            summary.ticks += 1;
            summary.arrivals += notices.len() as u64;
            on_tick(summary.ticks, &notices);
        }

        info!(
            "Simulation finished after {} ticks with {} arrivals",
            summary.ticks, summary.arrivals
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn demo_manager() -> QueueManager {
        let config = Config::default();
        let mut manager = QueueManager::from_services(&config.queue.services);
        manager.seed_demo(&config.queue.services);
        manager
    }

    fn waiting(manager: &QueueManager) -> usize {
        manager.services().map(crate::queue::ServiceQueue::len).sum()
    }

    #[test]
    fn test_certain_arrivals() {
        let mut manager = demo_manager();
        let mut rng = StdRng::seed_from_u64(1);

        let notices = arrivals(&mut manager, 1.0, &mut rng);
        assert_eq!(notices.len(), 3);
        assert_eq!(waiting(&manager), 17);
        assert!(notices.iter().all(|n| matches!(n, Notice::WalkIn { .. })));
    }

    #[test]
    fn test_no_arrivals() {
        let mut manager = demo_manager();
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..20 {
            assert!(arrivals(&mut manager, 0.0, &mut rng).is_empty());
        }
        assert_eq!(waiting(&manager), 14);
    }

    #[test]
    fn test_paused_services_are_skipped() {
        let mut manager = demo_manager();
        manager.pause("bank").unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let notices = arrivals(&mut manager, 1.0, &mut rng);
        assert_eq!(notices.len(), 2);
        assert_eq!(manager.service("bank").unwrap().len(), 3);
    }

    #[test]
    fn test_arrival_rate_is_roughly_probability() {
        let mut manager = demo_manager();
        let mut rng = StdRng::seed_from_u64(42);

        let total: usize = (0..1000)
            .map(|_| arrivals(&mut manager, 0.3, &mut rng).len())
            .sum();
        // 3000 trials at p = 0.3
        assert!((700..1100).contains(&total), "got {total}");
    }

    #[test]
    fn test_handle_shares_signal() {
        let handle = SimulationHandle::new();
        let other = handle.clone();
        assert!(!other.should_stop());
        handle.stop();
        assert!(other.should_stop());
    }

    #[tokio::test]
    async fn test_run_honors_tick_limit() {
        let mut config = Config::default();
        config.simulation.arrival_probability = 1.0;
        let mut app = App::in_memory(config).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let mut seen = Vec::new();
        let simulator = Simulator::new(Duration::from_millis(1)).with_tick_limit(Some(3));
        let summary = simulator
            .run(&mut app, &mut rng, |tick, notices| seen.push((tick, notices.len())))
            .await
            .unwrap();

        assert_eq!(summary, SimulationSummary { ticks: 3, arrivals: 9 });
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(app.services()[0].waiting, 8);
    }

    #[tokio::test]
    async fn test_run_stops_on_handle() {
        let mut app = App::in_memory(Config::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let simulator = Simulator::new(Duration::from_millis(1));
        let handle = simulator.handle();
        let summary = simulator
            .run(&mut app, &mut rng, |tick, _| {
                if tick == 2 {
                    handle.stop();
                }
            })
            .await
            .unwrap();

        assert_eq!(summary.ticks, 2);
    }
}

//! `Vigil` — single entry point over the aggregator and the HA role reader.
//!
//! Owns the lifecycle of the background runner. `start()` and `stop()` are
//! idempotent; each `start()` after a `stop()` spawns a fresh task with its
//! own cancellation token.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_core::{AppState, Clock, Facet, HaState, PushFacet, SystemClock, VigilConfig};

use crate::aggregator::AppStateAggregator;
use crate::ha::{HaMode, HaRoleReader};
use crate::runner::PeriodicRunner;
use crate::status::StatusSnapshot;

/// The running background loop.
struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Vigil {
    aggregator: Arc<AppStateAggregator>,
    ha: Arc<HaRoleReader>,
    runner: PeriodicRunner,
    running: Mutex<Option<RunningLoop>>,
}

impl Vigil {
    /// Wire an aggregator and role reader together; the runner is not started.
    pub fn new(
        aggregator: Arc<AppStateAggregator>,
        ha: Arc<HaRoleReader>,
        pause: Duration,
    ) -> Self {
        let runner = PeriodicRunner::new(aggregator.clone(), ha.clone(), pause);
        Self {
            aggregator,
            ha,
            runner,
            running: Mutex::new(None),
        }
    }

    /// Build from configuration using the system clock.
    pub fn from_config(config: &VigilConfig) -> Self {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(config: &VigilConfig, clock: Arc<dyn Clock>) -> Self {
        let paths = config.paths();
        let mode = if config.ha.dynamic {
            HaMode::Dynamic
        } else {
            HaMode::Static
        };
        let ha = Arc::new(HaRoleReader::new(mode, paths.ha_state()));
        let aggregator = Arc::new(AppStateAggregator::new(paths, clock));
        Self::new(aggregator, ha, config.pause())
    }

    pub fn aggregator(&self) -> &Arc<AppStateAggregator> {
        &self.aggregator
    }

    pub fn ha_reader(&self) -> &Arc<HaRoleReader> {
        &self.ha
    }

    pub fn runner(&self) -> &PeriodicRunner {
        &self.runner
    }

    // ── State accessors ────────────────────────────────────────────

    /// Current aggregate application state.
    pub fn app_state(&self) -> AppState {
        self.aggregator.app_state()
    }

    pub fn is_app_usable(&self) -> bool {
        self.aggregator.is_app_usable()
    }

    /// Last HA role read by the runner.
    pub fn ha_state(&self) -> HaState {
        self.ha.get()
    }

    /// Whether this instance currently holds the `MASTER` role.
    pub fn is_master(&self) -> bool {
        self.ha.get() == HaState::Master
    }

    pub fn set_main_app_state(&self, state: impl Into<Option<AppState>>) {
        self.aggregator.set_main_app_state(state);
    }

    pub fn register_facet(&self, name: &str, facet: Arc<dyn Facet>) -> bool {
        self.aggregator.register_facet(name, facet)
    }

    pub fn create_push_facet(&self, name: &str) -> Option<Arc<PushFacet>> {
        self.aggregator.create_push_facet(name)
    }

    /// Snapshot of aggregate, HA role and every facet.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::new(
            self.aggregator.app_state(),
            self.ha.get(),
            self.aggregator.is_override_active(),
            self.aggregator.facet_reports(),
        )
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Start the background runner if it is not already running.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                debug!("state runner already running");
                return;
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.runner.clone().run(cancel.clone()));
        *running = Some(RunningLoop { cancel, handle });
        info!(pause_ms = self.runner.pause().as_millis() as u64, "state runner spawned");
    }

    /// Signal the background runner to stop. Does not wait for it.
    pub fn stop(&self) {
        let stopped = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = stopped {
            running.cancel.cancel();
            info!("state runner stop requested");
        }
    }

    /// Stop the runner and wait for its in-flight cycle to finish.
    pub async fn shutdown(&self) {
        let stopped = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = stopped {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!(error = %e, "state runner ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

impl Drop for Vigil {
    fn drop(&mut self) {
        self.stop();
    }
}

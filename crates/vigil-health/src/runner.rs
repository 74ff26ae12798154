//! Periodic task runner.
//!
//! One background task drives all file I/O: operator files are read,
//! the aggregate is persisted, then the HA role is refreshed, followed by
//! a pause. Cancellation is cooperative; a cycle in flight always finishes
//! its disk operations before the loop exits.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_core::AppState;

use crate::aggregator::AppStateAggregator;
use crate::ha::HaRoleReader;

#[derive(Clone)]
pub struct PeriodicRunner {
    aggregator: Arc<AppStateAggregator>,
    ha: Arc<HaRoleReader>,
    pause: Duration,
}

impl PeriodicRunner {
    /// Create a runner over `aggregator` and `ha`, sleeping `pause` between cycles.
    pub fn new(
        aggregator: Arc<AppStateAggregator>,
        ha: Arc<HaRoleReader>,
        pause: Duration,
    ) -> Self {
        Self {
            aggregator,
            ha,
            pause,
        }
    }

    /// Delay between the end of one cycle and the start of the next.
    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Run a single cycle synchronously. Returns the persisted state.
    pub fn run_cycle(&self) -> AppState {
        self.aggregator.read_drain_state();
        self.aggregator.read_override_state();
        let state = self.aggregator.persist_state();
        self.ha.read();
        state
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(pause_ms = self.pause.as_millis() as u64, "state runner started");

        while !cancel.is_cancelled() {
            let runner = self.clone();
            match tokio::task::spawn_blocking(move || runner.run_cycle()).await {
                Ok(state) => debug!(%state, ha = %self.ha.get(), "state cycle complete"),
                Err(e) => warn!(error = %e, "state cycle panicked"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.pause) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("state runner stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use vigil_core::{HaState, StatePaths, SystemClock};

    use super::*;
    use crate::ha::HaMode;

    fn test_runner(
        dir: &std::path::Path,
        pause: Duration,
    ) -> (Arc<AppStateAggregator>, Arc<HaRoleReader>, PeriodicRunner) {
        let paths = StatePaths::new(dir);
        let ha = Arc::new(HaRoleReader::new(HaMode::Dynamic, paths.ha_state()));
        let aggregator = Arc::new(AppStateAggregator::new(paths, Arc::new(SystemClock)));
        let runner = PeriodicRunner::new(aggregator.clone(), ha.clone(), pause);
        (aggregator, ha, runner)
    }

    #[test]
    fn cycle_reads_operator_files_persists_and_reads_role() {
        let dir = tempfile::tempdir().unwrap();
        let (aggregator, ha, runner) = test_runner(dir.path(), Duration::from_secs(1));
        aggregator.set_main_app_state(AppState::Ready);
        fs::write(dir.path().join("app-state.drain"), "").unwrap();
        fs::write(dir.path().join("ha-state"), "BACKUP\n").unwrap();

        assert_eq!(runner.run_cycle(), AppState::Faulty);
        let report = fs::read_to_string(dir.path().join("app-state")).unwrap();
        assert!(report.starts_with("FAULTY\n"));
        assert!(!dir.path().join("app-state.usable").exists());
        assert_eq!(ha.get(), HaState::Backup);

        fs::remove_file(dir.path().join("app-state.drain")).unwrap();
        assert_eq!(runner.run_cycle(), AppState::Ready);
        assert!(dir.path().join("app-state.usable").exists());
    }

    #[tokio::test]
    async fn loop_exits_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (_aggregator, _ha, runner) = test_runner(dir.path(), Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(runner.run(cancel.clone()));

        // The first cycle runs before the first pause.
        for _ in 0..100 {
            if dir.path().join("app-state").exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(dir.path().join("app-state").exists());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runner did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_token_runs_no_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let (_aggregator, _ha, runner) = test_runner(dir.path(), Duration::from_millis(10));
        let cancel = CancellationToken::new();
        cancel.cancel();

        runner.run(cancel).await;
        assert!(!dir.path().join("app-state").exists());
    }
}

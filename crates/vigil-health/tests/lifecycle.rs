//! End-to-end tests through the `Vigil` facade.
//!
//! Exercises facet combination, the operator file protocol and the
//! background runner against a temporary state directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use vigil_core::{AppState, HaState, ManualClock, VigilConfig};
use vigil_health::{Vigil, render_prometheus};

fn test_config(dir: &Path) -> VigilConfig {
    let mut config = VigilConfig::for_state_dir(dir);
    config.runner.pause = "10ms".to_string();
    config
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn first_line(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| content.lines().next().map(str::to_string))
}

#[test]
fn combination_covers_all_facets_not_just_main() {
    let dir = tempfile::tempdir().unwrap();
    let vigil = Vigil::from_config(&test_config(dir.path()));

    let foo = vigil.create_push_facet("foo").unwrap();
    assert_eq!(vigil.app_state(), AppState::Initializing);

    vigil.set_main_app_state(AppState::Ready);
    assert_eq!(vigil.app_state(), AppState::Initializing);

    foo.set(AppState::Warning);
    assert_eq!(vigil.app_state(), AppState::Warning);

    vigil.set_main_app_state(AppState::Faulty);
    assert_eq!(vigil.app_state(), AppState::Faulty);
}

#[test]
fn manual_cycles_follow_operator_files() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_750_000_000),
    ));
    let vigil = Vigil::from_config_with_clock(&test_config(dir.path()), clock.clone());
    let runner = vigil.runner();
    let usable = dir.path().join("app-state.usable");
    vigil.set_main_app_state(AppState::Ready);

    assert_eq!(runner.run_cycle(), AppState::Ready);
    assert!(usable.exists());

    // Heartbeat: the marker's mtime follows the clock on later cycles.
    clock.advance(Duration::from_secs(5));
    runner.run_cycle();
    assert_eq!(
        fs::metadata(&usable).unwrap().modified().unwrap(),
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_750_000_005)
    );

    // Drain forces FAULTY and withdraws the usable marker.
    fs::write(dir.path().join("app-state.drain"), "").unwrap();
    assert_eq!(runner.run_cycle(), AppState::Faulty);
    assert!(!usable.exists());
    fs::remove_file(dir.path().join("app-state.drain")).unwrap();
    assert_eq!(runner.run_cycle(), AppState::Ready);

    // Override wins over facets, an empty file clears it.
    let override_file = dir.path().join("app-state.override");
    fs::write(&override_file, "WARNING\n").unwrap();
    assert_eq!(runner.run_cycle(), AppState::Warning);
    vigil.set_main_app_state(AppState::Faulty);
    assert_eq!(runner.run_cycle(), AppState::Warning);
    assert!(vigil.status().override_active);

    fs::write(&override_file, "").unwrap();
    assert_eq!(runner.run_cycle(), AppState::Faulty);
    assert!(!vigil.status().override_active);

    let report = fs::read_to_string(dir.path().join("app-state")).unwrap();
    assert!(report.starts_with("FAULTY\n"));
    assert!(report.contains("Application state: FAULTY"));
    assert!(report.contains("Report time: 2025-06-15T"));
}

#[tokio::test]
async fn background_loop_persists_and_tracks_role() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.ha.dynamic = true;
    let vigil = Vigil::from_config(&config);
    let app_state = dir.path().join("app-state");

    fs::write(dir.path().join("ha-state"), "BACKUP\n").unwrap();
    vigil.start();
    vigil.start();

    assert!(wait_for(|| first_line(&app_state).as_deref() == Some("INITIALIZING")).await);
    assert!(wait_for(|| vigil.ha_state() == HaState::Backup).await);

    vigil.set_main_app_state(AppState::Ready);
    assert!(wait_for(|| first_line(&app_state).as_deref() == Some("READY")).await);
    assert!(wait_for(|| dir.path().join("app-state.usable").exists()).await);

    fs::write(dir.path().join("ha-state"), "MASTER\n").unwrap();
    assert!(wait_for(|| vigil.is_master()).await);

    vigil.shutdown().await;
    assert!(!vigil.is_running());

    // Nothing is written after shutdown.
    vigil.set_main_app_state(AppState::Warning);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(first_line(&app_state).as_deref(), Some("READY"));

    // A fresh start picks up where the old loop left off.
    vigil.start();
    assert!(wait_for(|| first_line(&app_state).as_deref() == Some("WARNING")).await);
    vigil.shutdown().await;
}

#[test]
fn static_role_ignores_file() {
    let dir = tempfile::tempdir().unwrap();
    let vigil = Vigil::from_config(&test_config(dir.path()));
    fs::write(dir.path().join("ha-state"), "FAULT\n").unwrap();

    vigil.runner().run_cycle();
    assert_eq!(vigil.ha_state(), HaState::Master);
}

#[test]
fn telemetry_reflects_status() {
    let dir = tempfile::tempdir().unwrap();
    let vigil = Vigil::from_config(&test_config(dir.path()));
    vigil.set_main_app_state(AppState::Warning);

    let output = render_prometheus(&vigil.status());
    assert!(output.contains("\nvigil_app_state_weight 2\n"));
    assert!(output.contains("vigil_app_usable 1"));
    assert!(output.contains("vigil_facet_state_weight{facet=\"main\"} 2"));
}

//! Operator side of the state-directory protocol.
//!
//! These commands only touch files; the running engine picks the changes
//! up on its next cycle.

use std::fs;
use std::io;
use std::time::SystemTime;

use anyhow::{Context, Result};
use vigil_core::{AppState, StatePaths, VigilConfig};
use vigil_health::{HaMode, HaRoleReader};

/// Print the persisted report and how long ago the heartbeat was touched.
pub fn status(config: &VigilConfig) -> Result<()> {
    println!("{}", status_text(&config.paths(), SystemTime::now())?);
    Ok(())
}

fn status_text(paths: &StatePaths, now: SystemTime) -> Result<String> {
    let report = fs::read_to_string(paths.app_state())
        .with_context(|| format!("reading {}", paths.app_state().display()))?;

    let heartbeat = match fs::metadata(paths.usable_marker()) {
        Ok(meta) => {
            let age = now
                .duration_since(meta.modified()?)
                .unwrap_or_default()
                .as_secs();
            format!("usable marker: present, touched {age}s ago")
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => "usable marker: absent".to_string(),
        Err(e) => return Err(e).context("reading usable marker"),
    };

    Ok(format!("{}\n{heartbeat}", report.trim_end()))
}

/// Force `state`, or clear the override when `None`.
///
/// Clearing writes an empty file, which the engine treats as "no override".
pub fn set_override(config: &VigilConfig, state: Option<AppState>) -> Result<()> {
    let path = config.paths().override_marker();
    let content = state.map(|s| format!("{s}\n")).unwrap_or_default();
    fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    match state {
        Some(state) => println!("override set to {state}"),
        None => println!("override cleared"),
    }
    Ok(())
}

/// Create or remove the drain marker.
pub fn drain(config: &VigilConfig, enable: bool) -> Result<()> {
    let path = config.paths().drain_marker();
    if enable {
        fs::write(&path, "").with_context(|| format!("creating {}", path.display()))?;
        println!("drain requested");
    } else {
        match fs::remove_file(&path) {
            Ok(()) => println!("drain withdrawn"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => println!("not draining"),
            Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
    Ok(())
}

/// Read the role file and print the resolved role.
pub fn role(config: &VigilConfig) -> Result<()> {
    let mode = if config.ha.dynamic {
        HaMode::Dynamic
    } else {
        HaMode::Static
    };
    let reader = HaRoleReader::new(mode, config.paths().ha_state());
    let on_disk = reader.read_forced();
    println!("file: {on_disk}");
    println!("reported: {}", reader.get());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn test_config(dir: &std::path::Path) -> VigilConfig {
        VigilConfig::for_state_dir(dir)
    }

    #[test]
    fn override_set_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = config.paths().override_marker();

        set_override(&config, Some(AppState::Warning)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "WARNING\n");

        set_override(&config, None).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn drain_and_undrain() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = config.paths().drain_marker();

        drain(&config, true).unwrap();
        assert!(path.exists());
        drain(&config, false).unwrap();
        assert!(!path.exists());
        // Undraining twice is fine.
        drain(&config, false).unwrap();
    }

    #[test]
    fn status_reports_heartbeat_age() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StatePaths::new(dir.path());
        fs::write(paths.app_state(), "READY\n\nApplication state: READY\n").unwrap();
        fs::write(paths.usable_marker(), "").unwrap();
        let modified = fs::metadata(paths.usable_marker()).unwrap().modified().unwrap();

        let text = status_text(&paths, modified + Duration::from_secs(7)).unwrap();
        assert!(text.starts_with("READY\n"));
        assert!(text.ends_with("usable marker: present, touched 7s ago"));

        fs::remove_file(paths.usable_marker()).unwrap();
        let text = status_text(&paths, SystemTime::now()).unwrap();
        assert!(text.ends_with("usable marker: absent"));
    }

    #[test]
    fn status_without_report_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(status_text(&StatePaths::new(dir.path()), SystemTime::now()).is_err());
    }
}

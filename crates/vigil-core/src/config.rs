//! vigil.toml configuration and state-directory layout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Pause between runner cycles when none is configured.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub state: StateConfig,
    pub ha: HaConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Directory holding the files shared with external tooling.
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/var/lib/vigil"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HaConfig {
    /// Read the HA role from disk every cycle. When false the role is
    /// always `MASTER`.
    pub dynamic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Pause between cycles, e.g. "500ms", "3s", "1m".
    pub pause: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pause: "3s".to_string(),
        }
    }
}

impl VigilConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VigilConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A default config rooted at `dir`.
    pub fn for_state_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            state: StateConfig { dir: dir.into() },
            ..Self::default()
        }
    }

    pub fn paths(&self) -> StatePaths {
        StatePaths::new(&self.state.dir)
    }

    /// Runner pause, falling back to [`DEFAULT_PAUSE`] when unparsable.
    pub fn pause(&self) -> Duration {
        parse_duration(&self.runner.pause).unwrap_or_else(|| {
            warn!(pause = %self.runner.pause, "invalid runner pause, using default");
            DEFAULT_PAUSE
        })
    }

    /// Create the state directory if it does not exist yet.
    pub fn ensure_state_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.state.dir)
    }
}

/// Locations of the files exchanged with external tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    dir: PathBuf,
}

impl StatePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Human-readable status report.
    pub fn app_state(&self) -> PathBuf {
        self.dir.join("app-state")
    }

    /// Staging file renamed over [`StatePaths::app_state`].
    pub fn app_state_tmp(&self) -> PathBuf {
        self.dir.join("app-state.tmp")
    }

    /// Present and touched every cycle while the application is usable.
    pub fn usable_marker(&self) -> PathBuf {
        self.dir.join("app-state.usable")
    }

    pub fn drain_marker(&self) -> PathBuf {
        self.dir.join("app-state.drain")
    }

    pub fn override_marker(&self) -> PathBuf {
        self.dir.join("app-state.override")
    }

    /// Role written by the HA fencer.
    pub fn ha_state(&self) -> PathBuf {
        self.dir.join("ha-state")
    }
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

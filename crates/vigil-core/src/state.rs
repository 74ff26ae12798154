//! Severity scale and HA role.
//!
//! `AppState` is ordered by severity weight, not by declaration order:
//! `READY(1) < WARNING(2) < INITIALIZING(3) < FAULTY(4)`. Combining two
//! states keeps the more severe one, which makes `FAULTY` absorbing and
//! `READY` the identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a state or role name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} name: {value:?}")]
pub struct ParseStateError {
    kind: &'static str,
    value: String,
}

impl ParseStateError {
    /// The rejected input.
    pub fn value(&self) -> &str {
        &self.value
    }
}

// ── AppState ───────────────────────────────────────────────────────

/// Health level of a facet or of the whole application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    Initializing,
    Ready,
    Warning,
    Faulty,
}

impl AppState {
    /// Every state, in declaration order.
    pub const ALL: [AppState; 4] = [
        AppState::Initializing,
        AppState::Ready,
        AppState::Warning,
        AppState::Faulty,
    ];

    /// Severity weight. Higher is worse.
    pub const fn weight(self) -> u8 {
        match self {
            AppState::Ready => 1,
            AppState::Warning => 2,
            AppState::Initializing => 3,
            AppState::Faulty => 4,
        }
    }

    /// Whether an application in this state may serve traffic.
    pub const fn is_usable(self) -> bool {
        matches!(self, AppState::Ready | AppState::Warning)
    }

    /// Return the more severe of `self` and `other`. Ties return `self`.
    pub const fn combine(self, other: AppState) -> AppState {
        if other.weight() > self.weight() {
            other
        } else {
            self
        }
    }

    /// Inverse of [`AppState::weight`].
    pub const fn from_weight(weight: u8) -> Option<AppState> {
        match weight {
            1 => Some(AppState::Ready),
            2 => Some(AppState::Warning),
            3 => Some(AppState::Initializing),
            4 => Some(AppState::Faulty),
            _ => None,
        }
    }

    /// Canonical upper-case name, as written to and read from state files.
    pub const fn name(self) -> &'static str {
        match self {
            AppState::Initializing => "INITIALIZING",
            AppState::Ready => "READY",
            AppState::Warning => "WARNING",
            AppState::Faulty => "FAULTY",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for AppState {
    type Err = ParseStateError;

    /// Names are matched case-insensitively after trimming.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AppState::ALL
            .into_iter()
            .find(|state| state.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStateError {
                kind: "app state",
                value: s.to_string(),
            })
    }
}

// ── HaState ────────────────────────────────────────────────────────

/// Failover role assigned to this instance by an external HA fencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HaState {
    Master,
    Backup,
    Fault,
}

impl HaState {
    pub const ALL: [HaState; 3] = [HaState::Master, HaState::Backup, HaState::Fault];

    /// Numeric code exposed to telemetry.
    pub const fn code(self) -> u8 {
        match self {
            HaState::Master => 1,
            HaState::Backup => 2,
            HaState::Fault => 3,
        }
    }

    /// Inverse of [`HaState::code`]; `None` for an unknown code.
    pub const fn from_code(code: u8) -> Option<HaState> {
        match code {
            1 => Some(HaState::Master),
            2 => Some(HaState::Backup),
            3 => Some(HaState::Fault),
            _ => None,
        }
    }

    /// Canonical upper-case name, as found in the role file.
    pub const fn name(self) -> &'static str {
        match self {
            HaState::Master => "MASTER",
            HaState::Backup => "BACKUP",
            HaState::Fault => "FAULT",
        }
    }
}

impl fmt::Display for HaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for HaState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        HaState::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStateError {
                kind: "HA state",
                value: s.to_string(),
            })
    }
}

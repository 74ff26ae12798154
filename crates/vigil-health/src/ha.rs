//! HA role reader.
//!
//! The role is decided by an external fencer and written to `ha-state`.
//! In static mode the instance is always `MASTER` and the file is never
//! consulted by the periodic loop.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, info, warn};
use vigil_core::HaState;

use crate::files;

/// How the HA role is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaMode {
    /// Always `MASTER`.
    Static,
    /// Read from the role file every cycle.
    Dynamic,
}

/// Tracks the role the HA fencer assigned to this instance.
#[derive(Debug)]
pub struct HaRoleReader {
    mode: HaMode,
    path: PathBuf,
    role: AtomicU8,
}

impl HaRoleReader {
    pub fn new(mode: HaMode, path: impl Into<PathBuf>) -> Self {
        let initial = match mode {
            HaMode::Static => HaState::Master,
            HaMode::Dynamic => HaState::Fault,
        };
        Self {
            mode,
            path: path.into(),
            role: AtomicU8::new(initial.code()),
        }
    }

    /// Whether the role file is consulted at all.
    pub fn mode(&self) -> HaMode {
        self.mode
    }

    /// Last role read.
    pub fn get(&self) -> HaState {
        HaState::from_code(self.role.load(Ordering::Acquire)).unwrap_or(HaState::Fault)
    }

    /// Periodic read. Does nothing in static mode.
    pub fn read(&self) {
        if self.mode == HaMode::Dynamic {
            self.read_forced();
        }
    }

    /// Read the role file regardless of mode and return what it says.
    ///
    /// Missing, empty or unparsable files resolve to `FAULT`. In static mode
    /// the result is returned for inspection but the reported role stays
    /// `MASTER`.
    pub fn read_forced(&self) -> HaState {
        let role = self.resolve();
        match self.mode {
            HaMode::Dynamic => {
                let previous = self.role.swap(role.code(), Ordering::AcqRel);
                if previous != role.code() {
                    let from = HaState::from_code(previous).unwrap_or(HaState::Fault);
                    info!(%from, to = %role, "HA state changed");
                }
            }
            HaMode::Static => debug!(%role, "static HA mode, role file ignored"),
        }
        role
    }

    fn resolve(&self) -> HaState {
        match files::read_first_line(&self.path) {
            Ok(Some(line)) => line.parse().unwrap_or_else(|e| {
                warn!(error = %e, path = ?self.path, "unparsable HA state");
                HaState::Fault
            }),
            Ok(None) => {
                warn!(path = ?self.path, "empty HA state file");
                HaState::Fault
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no HA state file");
                HaState::Fault
            }
            Err(e) => {
                warn!(error = %e, path = ?self.path, "failed to read HA state");
                HaState::Fault
            }
        }
    }
}

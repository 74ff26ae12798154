//! Status snapshot served by status endpoints and telemetry.

use serde::Serialize;
use vigil_core::{AppState, HaState};

use crate::report::FacetReport;

/// Point-in-time view of the application and HA state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub app_state: AppState,
    /// Severity weight of `app_state`.
    pub weight: u8,
    pub usable: bool,
    pub ha_state: HaState,
    pub override_active: bool,
    pub facets: Vec<FacetReport>,
}

impl StatusSnapshot {
    pub fn new(
        app_state: AppState,
        ha_state: HaState,
        override_active: bool,
        facets: Vec<FacetReport>,
    ) -> Self {
        Self {
            app_state,
            weight: app_state.weight(),
            usable: app_state.is_usable(),
            ha_state,
            override_active,
            facets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_upper_case_states() {
        let snapshot = StatusSnapshot::new(
            AppState::Warning,
            HaState::Backup,
            false,
            vec![FacetReport {
                name: "main".to_string(),
                state: AppState::Warning,
                annotation: Some("slow disk".to_string()),
            }],
        );
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["app_state"], "WARNING");
        assert_eq!(json["weight"], 2);
        assert_eq!(json["usable"], true);
        assert_eq!(json["ha_state"], "BACKUP");
        assert_eq!(json["facets"][0]["name"], "main");
        assert_eq!(json["facets"][0]["annotation"], "slow disk");
    }
}

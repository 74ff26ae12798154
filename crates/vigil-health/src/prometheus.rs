//! Prometheus text exposition format.
//!
//! Exposes the aggregate severity weight and usability as numeric gauges
//! so management tooling can alert on them without parsing the report.

use crate::status::StatusSnapshot;

/// Render a status snapshot into Prometheus text format.
pub fn render_prometheus(status: &StatusSnapshot) -> String {
    let mut out = String::new();

    out.push_str("# HELP vigil_app_state_weight Severity weight of the application state (1=READY, 2=WARNING, 3=INITIALIZING, 4=FAULTY).\n");
    out.push_str("# TYPE vigil_app_state_weight gauge\n");
    out.push_str(&format!("vigil_app_state_weight {}\n", status.weight));

    out.push_str("# HELP vigil_app_usable Whether the application may serve traffic.\n");
    out.push_str("# TYPE vigil_app_usable gauge\n");
    out.push_str(&format!("vigil_app_usable {}\n", u8::from(status.usable)));

    out.push_str("# HELP vigil_ha_state HA role (1=MASTER, 2=BACKUP, 3=FAULT).\n");
    out.push_str("# TYPE vigil_ha_state gauge\n");
    out.push_str(&format!("vigil_ha_state {}\n", status.ha_state.code()));

    out.push_str("# HELP vigil_override_active Whether an operator override is in force.\n");
    out.push_str("# TYPE vigil_override_active gauge\n");
    out.push_str(&format!(
        "vigil_override_active {}\n",
        u8::from(status.override_active)
    ));

    out.push_str("# HELP vigil_facet_state_weight Severity weight per facet.\n");
    out.push_str("# TYPE vigil_facet_state_weight gauge\n");
    for facet in &status.facets {
        out.push_str(&format!(
            "vigil_facet_state_weight{{facet=\"{}\"}} {}\n",
            facet.name,
            facet.state.weight()
        ));
    }

    out
}

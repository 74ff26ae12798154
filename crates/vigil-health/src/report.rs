//! Status report rendering.
//!
//! The report written to `app-state` starts with the bare state name so
//! probes can `head -1` it, followed by a human-readable facet table.

use std::fmt::Write;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use vigil_core::AppState;

const STATE_WIDTH: usize = 13;
const NAME_WIDTH: usize = 23;

/// One facet's line in the status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetReport {
    pub name: String,
    pub state: AppState,
    pub annotation: Option<String>,
}

/// Render the multi-line status report.
pub fn render_report(aggregate: AppState, at: SystemTime, facets: &[FacetReport]) -> String {
    let timestamp = DateTime::<Utc>::from(at).to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut out = String::new();
    let _ = writeln!(out, "{aggregate}");
    out.push('\n');
    let _ = writeln!(out, "Application state: {aggregate}");
    let _ = writeln!(out, "Report time: {timestamp}");
    out.push('\n');
    push_row(&mut out, "STATE", "FACET", "ANNOTATION");
    for facet in facets {
        push_row(
            &mut out,
            facet.state.name(),
            &facet.name,
            facet.annotation.as_deref().unwrap_or(""),
        );
    }
    out
}

fn push_row(out: &mut String, state: &str, name: &str, annotation: &str) {
    let line = format!(
        "{state:<sw$} {name:<nw$} {annotation}",
        sw = STATE_WIDTH,
        nw = NAME_WIDTH
    );
    out.push_str(line.trim_end());
    out.push('\n');
}

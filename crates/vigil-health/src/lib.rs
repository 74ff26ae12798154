//! vigil-health — health-state aggregation and HA coordination.
//!
//! Subsystems report their health through facets; the aggregator combines
//! them into one application state and persists it to a state directory
//! where external tooling (health probes, HA fencers, drain scripts) can
//! observe and influence it.
//!
//! # Architecture
//!
//! ```text
//! Vigil (facade)
//!   ├── AppStateAggregator
//!   │   ├── facet registry (main, draining, _override, user facets)
//!   │   ├── read_drain_state() ← app-state.drain
//!   │   ├── read_override_state() ← app-state.override
//!   │   └── persist_state() → app-state, app-state.usable
//!   ├── HaRoleReader ← ha-state
//!   └── PeriodicRunner (background task)
//!       └── every pause: drain/override → persist → HA role
//! ```
//!
//! # Files
//!
//! | File | Direction | Content |
//! |---|---|---|
//! | `app-state` | written | status report, first line is the state name |
//! | `app-state.usable` | written | empty; existence and mtime are the heartbeat |
//! | `app-state.drain` | read | existence forces `FAULTY` |
//! | `app-state.override` | read | state name to force, empty to clear |
//! | `ha-state` | read | `MASTER`, `BACKUP` or `FAULT` |

pub mod aggregator;
pub mod facade;
mod files;
pub mod ha;
pub mod prometheus;
pub mod report;
pub mod runner;
pub mod status;

pub use aggregator::AppStateAggregator;
pub use facade::Vigil;
pub use ha::{HaMode, HaRoleReader};
pub use prometheus::render_prometheus;
pub use report::{FacetReport, render_report};
pub use runner::PeriodicRunner;
pub use status::StatusSnapshot;

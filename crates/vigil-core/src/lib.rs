//! vigil-core — shared types for the Vigil health engine.
//!
//! Defines the severity scale ([`AppState`]), the externally assigned HA
//! role ([`HaState`]), the [`Facet`] capability every subsystem implements
//! to report its health, and the configuration/path layout of the state
//! directory that external tooling reads and writes.

pub mod clock;
pub mod config;
pub mod facet;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{StatePaths, VigilConfig};
pub use facet::{Facet, FacetError, FacetResult, OverrideFacet, PushFacet, sanitize_name};
pub use state::{AppState, HaState, ParseStateError};

//! Facets — independently owned health reporters.
//!
//! A facet is anything that can answer "what is my current health level?".
//! Polls must be fast, free of side effects and safe to call from several
//! threads at once: the aggregator polls every registered facet each time
//! the aggregate state is computed.
//!
//! Three kinds of reporter are provided:
//! - any `Fn() -> AppState` closure (plain reporter),
//! - [`PushFacet`], set explicitly by its owner (annotated reporter),
//! - [`OverrideFacet`], a push facet that can supersede all other facets.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{LazyLock, PoisonError, RwLock};

use regex::Regex;
use thiserror::Error;

use crate::state::AppState;

/// Result type alias for facet polls.
pub type FacetResult<T> = Result<T, FacetError>;

/// A facet could not report its state or annotation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("facet poll failed: {0}")]
pub struct FacetError(pub String);

impl FacetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Health reporter capability.
pub trait Facet: Send + Sync {
    /// Current health level of this facet.
    fn state(&self) -> FacetResult<AppState>;

    /// Free-text explanation of the current level, if any.
    fn annotation(&self) -> FacetResult<Option<String>> {
        Ok(None)
    }
}

impl<F> Facet for F
where
    F: Fn() -> AppState + Send + Sync,
{
    fn state(&self) -> FacetResult<AppState> {
        Ok((self)())
    }
}

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-zA-Z0-9-]").expect("static regex"));

/// Normalise a facet name to `[a-zA-Z0-9-]`, replacing anything else with `-`.
pub fn sanitize_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "-").into_owned()
}

// ── PushFacet ──────────────────────────────────────────────────────

/// A facet whose state is pushed by its owner.
///
/// Every update stores the annotation before the state. A concurrent reader
/// may briefly see the old state with the new annotation, but never a new
/// state with an annotation describing the previous one.
#[derive(Debug)]
pub struct PushFacet {
    state: AtomicU8,
    annotation: RwLock<Option<String>>,
}

impl PushFacet {
    /// A new facet in `INITIALIZING` with no annotation.
    pub fn new() -> Self {
        Self::with_state(AppState::Initializing)
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            state: AtomicU8::new(state.weight()),
            annotation: RwLock::new(None),
        }
    }

    /// Set the state and clear the annotation.
    pub fn set(&self, state: AppState) {
        self.set_annotated(state, None::<String>);
    }

    /// Set the state together with an explanatory annotation.
    pub fn set_annotated(&self, state: AppState, annotation: Option<impl Into<String>>) {
        *self
            .annotation
            .write()
            .unwrap_or_else(PoisonError::into_inner) = annotation.map(Into::into);
        self.state.store(state.weight(), Ordering::Release);
    }

    /// Last pushed state.
    pub fn get(&self) -> AppState {
        AppState::from_weight(self.state.load(Ordering::Acquire)).unwrap_or(AppState::Faulty)
    }

    /// Last pushed annotation.
    pub fn get_annotation(&self) -> Option<String> {
        self.annotation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for PushFacet {
    fn default() -> Self {
        Self::new()
    }
}

impl Facet for PushFacet {
    fn state(&self) -> FacetResult<AppState> {
        Ok(self.get())
    }

    fn annotation(&self) -> FacetResult<Option<String>> {
        Ok(self.get_annotation())
    }
}

// ── OverrideFacet ──────────────────────────────────────────────────

/// Operator override. While active its value replaces the combination of
/// all other facets; while inactive it reports `READY` and so never affects
/// the aggregate.
#[derive(Debug)]
pub struct OverrideFacet {
    value: PushFacet,
    active: AtomicBool,
}

impl OverrideFacet {
    /// An inactive override.
    pub fn new() -> Self {
        Self {
            value: PushFacet::with_state(AppState::Ready),
            active: AtomicBool::new(false),
        }
    }

    /// Force `state` until [`OverrideFacet::deactivate`] is called.
    pub fn activate(&self, state: AppState, annotation: Option<impl Into<String>>) {
        self.value.set_annotated(state, annotation);
        self.active.store(true, Ordering::Release);
    }

    /// Return to normal facet combination.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        self.value.set(AppState::Ready);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The forced state while active, `None` otherwise.
    pub fn forced_state(&self) -> Option<AppState> {
        self.is_active().then(|| self.value.get())
    }
}

impl Default for OverrideFacet {
    fn default() -> Self {
        Self::new()
    }
}

impl Facet for OverrideFacet {
    fn state(&self) -> FacetResult<AppState> {
        Ok(self.forced_state().unwrap_or(AppState::Ready))
    }

    fn annotation(&self) -> FacetResult<Option<String>> {
        if self.is_active() {
            Ok(self.value.get_annotation())
        } else {
            Ok(Some("override inactive".to_string()))
        }
    }
}

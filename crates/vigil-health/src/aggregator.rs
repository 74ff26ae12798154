//! App state aggregator — facet registry, combination and persistence.
//!
//! The aggregate state is the most severe state reported by any registered
//! facet, unless the operator override is active, in which case the
//! override value is returned as-is. Three facets are always registered:
//! `main` for direct state setting, `draining` fed by the drain marker and
//! the override itself under the reserved name `_override`.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, warn};
use vigil_core::{
    AppState, Clock, Facet, FacetError, FacetResult, OverrideFacet, PushFacet, StatePaths,
    sanitize_name,
};

use crate::files;
use crate::report::{FacetReport, render_report};

/// Name of the built-in facet set by [`AppStateAggregator::set_main_app_state`].
pub const MAIN_FACET: &str = "main";
/// Name of the built-in facet fed by the drain marker.
pub const DRAINING_FACET: &str = "draining";
/// Reserved name of the override facet. Sanitised names never contain `_`.
pub const OVERRIDE_FACET: &str = "_override";

/// No state observed yet.
const UNSEEN: u8 = 0;

/// A registered facet plus the last state it was seen in.
struct Registered {
    facet: Arc<dyn Facet>,
    last: AtomicU8,
}

impl Registered {
    fn new(facet: Arc<dyn Facet>) -> Self {
        Self {
            facet,
            last: AtomicU8::new(UNSEEN),
        }
    }

    /// Poll the facet, coercing a failed or panicking poll to `FAULTY`, and
    /// log transitions.
    fn poll(&self, name: &str) -> AppState {
        let state = match guarded(|| self.facet.state()) {
            Ok(state) => state,
            Err(e) => {
                warn!(facet = %name, error = %e, "facet poll failed, treating as FAULTY");
                AppState::Faulty
            }
        };
        let previous = self.last.swap(state.weight(), Ordering::AcqRel);
        match AppState::from_weight(previous) {
            Some(previous) if previous != state => {
                log_transition(Some(name), previous, state);
            }
            Some(_) => {}
            None => debug!(facet = %name, %state, "facet first polled"),
        }
        state
    }

    fn report(&self, name: &str) -> FacetReport {
        let (state, poll_error) = match guarded(|| self.facet.state()) {
            Ok(state) => (state, None),
            Err(e) => (AppState::Faulty, Some(e.to_string())),
        };
        let annotation = match poll_error {
            Some(poll_error) => Some(poll_error),
            None => match guarded(|| self.facet.annotation()) {
                Ok(annotation) => annotation,
                Err(e) => Some(format!("annotation unavailable: {e}")),
            },
        };
        FacetReport {
            name: name.to_string(),
            state,
            annotation,
        }
    }
}

/// Call into facet code, turning a panic into a `FacetError`.
///
/// Facets are caller code; one that panics must not take down the runner
/// cycle or leave the usable marker from the previous cycle behind.
fn guarded<T>(call: impl FnOnce() -> FacetResult<T>) -> FacetResult<T> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Err(FacetError::new(format!("facet panicked: {message}")))
    })
}

fn same_facet(a: &Arc<dyn Facet>, b: &Arc<dyn Facet>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn log_transition(facet: Option<&str>, from: AppState, to: AppState) {
    let scope = facet.unwrap_or("application");
    if from.is_usable() && !to.is_usable() {
        error!(scope, %from, %to, "state changed, no longer usable");
    } else {
        info!(scope, %from, %to, "state changed");
    }
}

/// Combines facet states into the application state and persists it.
pub struct AppStateAggregator {
    paths: StatePaths,
    clock: Arc<dyn Clock>,
    facets: RwLock<BTreeMap<String, Arc<Registered>>>,
    main: Arc<PushFacet>,
    draining: Arc<PushFacet>,
    override_facet: Arc<OverrideFacet>,
    last_state: AtomicU8,
}

impl AppStateAggregator {
    /// Create an aggregator with its built-in facets registered.
    pub fn new(paths: StatePaths, clock: Arc<dyn Clock>) -> Self {
        let main = Arc::new(PushFacet::new());
        let draining = Arc::new(PushFacet::with_state(AppState::Ready));
        let override_facet = Arc::new(OverrideFacet::new());

        let mut facets = BTreeMap::new();
        let builtins: [(&str, Arc<dyn Facet>); 3] = [
            (MAIN_FACET, main.clone()),
            (DRAINING_FACET, draining.clone()),
            (OVERRIDE_FACET, override_facet.clone()),
        ];
        for (name, facet) in builtins {
            facets.insert(name.to_string(), Arc::new(Registered::new(facet)));
        }

        debug!(dir = ?paths.dir(), "app state aggregator created");
        Self {
            paths,
            clock,
            facets: RwLock::new(facets),
            main,
            draining,
            override_facet,
            last_state: AtomicU8::new(UNSEEN),
        }
    }

    /// File layout of the state directory this aggregator writes to.
    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Register `facet` under `name` (sanitised).
    ///
    /// Registering the same facet under the same name again succeeds and
    /// changes nothing. A different facet under a taken name is rejected and
    /// the first registration is kept.
    pub fn register_facet(&self, name: &str, facet: Arc<dyn Facet>) -> bool {
        let name = sanitize_name(name);
        let mut facets = self.facets.write().unwrap_or_else(PoisonError::into_inner);
        match facets.entry(name) {
            Entry::Vacant(slot) => {
                debug!(facet = %slot.key(), "facet registered");
                slot.insert(Arc::new(Registered::new(facet)));
                true
            }
            Entry::Occupied(existing) => {
                if same_facet(&existing.get().facet, &facet) {
                    true
                } else {
                    error!(
                        facet = %existing.key(),
                        "facet name already registered to a different facet"
                    );
                    false
                }
            }
        }
    }

    /// Create a [`PushFacet`] and register it under `name`.
    ///
    /// Returns `None` only if the name is already taken.
    pub fn create_push_facet(&self, name: &str) -> Option<Arc<PushFacet>> {
        let facet = Arc::new(PushFacet::new());
        self.register_facet(name, facet.clone()).then_some(facet)
    }

    /// Names of all registered facets, sorted.
    pub fn facet_names(&self) -> Vec<String> {
        self.facets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Point-in-time copy of the registry, so polls run without the lock.
    fn registered(&self) -> Vec<(String, Arc<Registered>)> {
        self.facets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect()
    }

    // ── Aggregate ──────────────────────────────────────────────────

    /// Current application state.
    pub fn app_state(&self) -> AppState {
        let facets = self.registered();
        let state = if facets.is_empty() {
            error!("no facets registered, reporting FAULTY");
            AppState::Faulty
        } else if let Some(forced) = self.override_facet.forced_state() {
            forced
        } else {
            facets
                .iter()
                .fold(AppState::Ready, |acc, (name, entry)| acc.combine(entry.poll(name)))
        };

        let previous = self.last_state.swap(state.weight(), Ordering::AcqRel);
        match AppState::from_weight(previous) {
            Some(previous) if previous != state => log_transition(None, previous, state),
            Some(_) => {}
            None => info!(%state, "initial application state"),
        }
        state
    }

    pub fn is_app_usable(&self) -> bool {
        self.app_state().is_usable()
    }

    /// Whether the operator override currently supersedes all facets.
    pub fn is_override_active(&self) -> bool {
        self.override_facet.is_active()
    }

    /// Set the built-in `main` facet. `None` is treated as `FAULTY`.
    pub fn set_main_app_state(&self, state: impl Into<Option<AppState>>) {
        self.main.set(state.into().unwrap_or(AppState::Faulty));
    }

    /// State and annotation of every facet, each read in isolation.
    pub fn facet_reports(&self) -> Vec<FacetReport> {
        self.registered()
            .iter()
            .map(|(name, entry)| entry.report(name))
            .collect()
    }

    /// Render the status report for an already computed aggregate.
    pub fn render_status_report(&self, aggregate: AppState) -> String {
        render_report(aggregate, self.clock.now(), &self.facet_reports())
    }

    // ── Operator files ─────────────────────────────────────────────

    /// Refresh the `draining` facet from the drain marker.
    pub fn read_drain_state(&self) {
        let marker = self.paths.drain_marker();
        if marker.exists() {
            if self.draining.get() != AppState::Faulty {
                info!(path = ?marker, "drain marker present, draining");
            }
            self.draining.set_annotated(
                AppState::Faulty,
                Some(format!("drain requested via {}", marker.display())),
            );
        } else {
            self.draining.set(AppState::Ready);
        }
    }

    /// Refresh the override facet from the override file.
    ///
    /// A valid state name activates the override with that state, anything
    /// unparsable forces `FAULTY`. An empty file, a missing file or one that
    /// disappears while being read clears the override.
    pub fn read_override_state(&self) {
        let path = self.paths.override_marker();
        if !path.exists() {
            self.clear_override();
            return;
        }

        self.apply_override_read(&path, files::read_first_line(&path), || path.exists());
    }

    /// Apply the outcome of reading the override file at `path`.
    ///
    /// `still_exists` is consulted only when the read failed: a file that is
    /// gone by then was removed mid-read and clears the override.
    fn apply_override_read(
        &self,
        path: &Path,
        read: io::Result<Option<String>>,
        still_exists: impl FnOnce() -> bool,
    ) {
        match read {
            Ok(None) => self.clear_override(),
            Ok(Some(line)) => match line.parse::<AppState>() {
                Ok(state) => {
                    if self.override_facet.forced_state() != Some(state) {
                        warn!(%state, path = ?path, "override activated");
                    }
                    self.override_facet
                        .activate(state, Some(format!("forced via {}", path.display())));
                }
                Err(e) => {
                    warn!(error = %e, path = ?path, "unparsable override, forcing FAULTY");
                    self.override_facet.activate(
                        AppState::Faulty,
                        Some(format!("invalid override content {line:?}")),
                    );
                }
            },
            Err(e) => {
                if !still_exists() {
                    debug!(error = %e, path = ?path, "override file vanished during read");
                    self.clear_override();
                    return;
                }
                warn!(error = %e, path = ?path, "cannot read override, forcing FAULTY");
                self.override_facet.activate(
                    AppState::Faulty,
                    Some(format!("cannot read override file: {e}")),
                );
            }
        }
    }

    fn clear_override(&self) {
        if self.override_facet.is_active() {
            info!("override cleared");
        }
        self.override_facet.deactivate();
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Write the status report and maintain the usable marker.
    ///
    /// Returns the aggregate state that was persisted.
    pub fn persist_state(&self) -> AppState {
        let state = self.app_state();

        let report = self.render_status_report(state);
        if let Err(e) = files::write_atomic(
            &self.paths.app_state_tmp(),
            &self.paths.app_state(),
            &report,
        ) {
            warn!(error = %e, path = ?self.paths.app_state(), "failed to write app state");
        }

        self.update_usable_marker(state.is_usable());
        state
    }

    /// Persist a final `FAULTY` state when the process shuts down.
    ///
    /// Main is set `FAULTY` and any active override is dropped first, so the
    /// usable marker is withdrawn even while an operator forces a usable
    /// state. The override file itself is left in place.
    pub fn persist_shutdown(&self) -> AppState {
        self.clear_override();
        self.set_main_app_state(AppState::Faulty);
        self.persist_state()
    }

    fn update_usable_marker(&self, usable: bool) {
        let marker = self.paths.usable_marker();
        if usable {
            match files::create_new(&marker) {
                Ok(created) => {
                    if created {
                        info!(path = ?marker, "usable marker created");
                    }
                    // The mtime is the heartbeat, so it follows the injected clock from the start.
                    if let Err(e) = files::touch(&marker, self.clock.now()) {
                        warn!(error = %e, path = ?marker, "failed to touch usable marker");
                    }
                }
                Err(e) => warn!(error = %e, path = ?marker, "failed to create usable marker"),
            }
        } else {
            match files::remove_if_present(&marker) {
                Ok(true) => info!(path = ?marker, "usable marker removed"),
                Ok(false) => {}
                Err(e) => error!(
                    error = %e,
                    path = ?marker,
                    "failed to remove usable marker, instance may still look healthy"
                ),
            }
        }
    }
}

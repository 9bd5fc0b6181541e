//! Visibility tracking over a host viewport-intersection primitive.
//!
//! A [`VisibilityTracker`] holds two observations of one target:
//!
//! - the *main* observation at the tier's visibility margin, which drives
//!   `is_in_view` and `intersection_ratio`;
//! - the *boundary* observation at the larger preload margin, which fires
//!   [`VisibilityUpdate::PreloadBoundaryReached`] once and then disconnects.
//!
//! When the host has no observer, or the observer refuses the target, the
//! tracker fails open: it reports the target as in view immediately.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::signal::HostSignal;
use crate::strategy::LoadingDecision;

/// Host-assigned handle for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservationId(pub u64);

/// Options passed to the host observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserveOptions {
    pub root_margin_px: u32,
    pub threshold: f32,
}

/// One intersection callback from the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionEntry {
    pub is_intersecting: bool,
    pub intersection_ratio: f32,
}

impl IntersectionEntry {
    pub fn new(is_intersecting: bool, intersection_ratio: f32) -> Self {
        Self {
            is_intersecting,
            intersection_ratio,
        }
    }
}

/// Host viewport-intersection primitive.
pub trait ViewportObserver {
    fn observe(&mut self, target: &str, options: ObserveOptions) -> Result<ObservationId, ObserverError>;

    fn disconnect(&mut self, observation: ObservationId);
}

impl<O: ViewportObserver + ?Sized> ViewportObserver for Box<O> {
    fn observe(&mut self, target: &str, options: ObserveOptions) -> Result<ObservationId, ObserverError> {
        (**self).observe(target, options)
    }

    fn disconnect(&mut self, observation: ObservationId) {
        (**self).disconnect(observation)
    }
}

/// Margins a tracker observes with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerOptions {
    pub margin_px: u32,
    pub threshold: f32,
    pub preload_distance_px: u32,
}

impl TrackerOptions {
    fn main(&self) -> ObserveOptions {
        ObserveOptions {
            root_margin_px: self.margin_px,
            threshold: self.threshold,
        }
    }

    fn boundary(&self) -> ObserveOptions {
        ObserveOptions {
            root_margin_px: self.preload_distance_px.max(self.margin_px.saturating_add(1)),
            threshold: 0.0,
        }
    }
}

impl From<&LoadingDecision> for TrackerOptions {
    fn from(decision: &LoadingDecision) -> Self {
        Self {
            margin_px: decision.visibility_margin_px,
            threshold: decision.visibility_threshold,
            preload_distance_px: decision.preload_distance_px,
        }
    }
}

/// Current main-observation state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisibilityState {
    pub is_in_view: bool,
    pub intersection_ratio: f32,
}

impl VisibilityState {
    fn fully_visible() -> Self {
        Self {
            is_in_view: true,
            intersection_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisibilityUpdate {
    Changed(VisibilityState),
    PreloadBoundaryReached,
}

#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    target: Option<String>,
    options: TrackerOptions,
    main: Option<ObservationId>,
    boundary: Option<ObservationId>,
    state: VisibilityState,
    reached_preload_boundary: bool,
    fail_open: bool,
}

impl VisibilityTracker {
    pub fn new(options: TrackerOptions) -> Self {
        Self {
            target: None,
            options,
            main: None,
            boundary: None,
            state: VisibilityState::default(),
            reached_preload_boundary: false,
            fail_open: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> VisibilityState {
        self.state
    }

    pub fn is_in_view(&self) -> bool {
        self.state.is_in_view
    }

    pub fn intersection_ratio(&self) -> f32 {
        self.state.intersection_ratio
    }

    pub fn reached_preload_boundary(&self) -> bool {
        self.reached_preload_boundary
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn options(&self) -> TrackerOptions {
        self.options
    }

    /// Whether the tracker gave up on the host observer and reports eager.
    pub fn is_fail_open(&self) -> bool {
        self.fail_open
    }

    /// Live observations, for routing host callbacks.
    pub fn observations(&self) -> impl Iterator<Item = ObservationId> + '_ {
        self.main.iter().chain(self.boundary.iter()).copied()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start observing `target`. Any previous target is detached first.
    pub fn attach<O: ViewportObserver + ?Sized>(
        &mut self,
        mut observer: HostSignal<&mut O>,
        target: impl Into<String>,
    ) -> Vec<VisibilityUpdate> {
        self.detach(observer.reborrow());
        let target = target.into();
        self.state = VisibilityState::default();
        self.reached_preload_boundary = false;
        self.fail_open = false;

        let result = match observer {
            HostSignal::Available(obs) => self.observe_all(obs, &target),
            HostSignal::Unavailable => Err(ObserverError("no viewport observer".into())),
        };
        self.target = Some(target);

        match result {
            Ok(()) => Vec::new(),
            Err(err) => self.open(err),
        }
    }

    /// Tear down both observations synchronously. A tracker with no target
    /// ignores this.
    pub fn detach<O: ViewportObserver + ?Sized>(&mut self, observer: HostSignal<&mut O>) {
        if self.target.take().is_none() {
            return;
        }
        let main = self.main.take();
        let boundary = self.boundary.take();
        if let HostSignal::Available(obs) = observer {
            for id in main.into_iter().chain(boundary) {
                obs.disconnect(id);
            }
        }
    }

    /// Reset the one-shot boundary signal and observe the boundary again.
    pub fn rearm<O: ViewportObserver + ?Sized>(&mut self, observer: HostSignal<&mut O>) -> Vec<VisibilityUpdate> {
        let Some(target) = self.target.clone() else {
            return Vec::new();
        };
        self.reached_preload_boundary = false;
        if self.fail_open {
            self.reached_preload_boundary = true;
            return vec![VisibilityUpdate::PreloadBoundaryReached];
        }

        let HostSignal::Available(obs) = observer else {
            return self.open(ObserverError("no viewport observer".into()));
        };
        if let Some(id) = self.boundary.take() {
            obs.disconnect(id);
        }
        match obs.observe(&target, self.options.boundary()) {
            Ok(id) => {
                self.boundary = Some(id);
                Vec::new()
            }
            Err(err) => self.open(err),
        }
    }

    /// Apply new margins. Live observations are replaced when they change.
    pub fn reconfigure<O: ViewportObserver + ?Sized>(
        &mut self,
        observer: HostSignal<&mut O>,
        options: TrackerOptions,
    ) -> Vec<VisibilityUpdate> {
        if options == self.options {
            return Vec::new();
        }
        self.options = options;
        let Some(target) = self.target.clone() else {
            return Vec::new();
        };
        if self.fail_open {
            return Vec::new();
        }
        let HostSignal::Available(obs) = observer else {
            return self.open(ObserverError("no viewport observer".into()));
        };

        if let Some(id) = self.main.take() {
            obs.disconnect(id);
        }
        let boundary_pending = match self.boundary.take() {
            Some(id) => {
                obs.disconnect(id);
                true
            }
            None => false,
        };

        let result = obs.observe(&target, options.main()).and_then(|main| {
            self.main = Some(main);
            if boundary_pending {
                self.boundary = Some(obs.observe(&target, options.boundary())?);
            }
            Ok(())
        });
        match result {
            Ok(()) => Vec::new(),
            Err(err) => self.open(err),
        }
    }

    /// Route one host callback. Entries for observations this tracker does
    /// not own (or no longer owns) are ignored.
    pub fn handle_entry<O: ViewportObserver + ?Sized>(
        &mut self,
        observer: HostSignal<&mut O>,
        observation: ObservationId,
        entry: IntersectionEntry,
    ) -> Option<VisibilityUpdate> {
        if self.target.is_none() {
            return None;
        }

        if self.main == Some(observation) {
            let ratio = if entry.intersection_ratio.is_finite() {
                entry.intersection_ratio.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let next = VisibilityState {
                is_in_view: entry.is_intersecting,
                intersection_ratio: ratio,
            };
            if next == self.state {
                return None;
            }
            self.state = next;
            return Some(VisibilityUpdate::Changed(next));
        }

        if self.boundary == Some(observation) {
            if !entry.is_intersecting || self.reached_preload_boundary {
                return None;
            }
            self.reached_preload_boundary = true;
            if let (Some(id), HostSignal::Available(obs)) = (self.boundary.take(), observer) {
                obs.disconnect(id);
            }
            return Some(VisibilityUpdate::PreloadBoundaryReached);
        }

        None
    }

    fn observe_all<O: ViewportObserver + ?Sized>(&mut self, obs: &mut O, target: &str) -> Result<(), ObserverError> {
        let main = obs.observe(target, self.options.main())?;
        self.main = Some(main);
        match obs.observe(target, self.options.boundary()) {
            Ok(boundary) => {
                self.boundary = Some(boundary);
                Ok(())
            }
            Err(err) => {
                obs.disconnect(main);
                self.main = None;
                Err(err)
            }
        }
    }

    fn open(&mut self, err: ObserverError) -> Vec<VisibilityUpdate> {
        warn!(target = ?self.target, error = %err, "visibility unavailable; treating target as in view");
        self.main = None;
        self.boundary = None;
        self.fail_open = true;

        let mut updates = Vec::new();
        if self.state != VisibilityState::fully_visible() {
            self.state = VisibilityState::fully_visible();
            updates.push(VisibilityUpdate::Changed(self.state));
        }
        if !self.reached_preload_boundary {
            self.reached_preload_boundary = true;
            updates.push(VisibilityUpdate::PreloadBoundaryReached);
        }
        debug!(updates = updates.len(), "fail-open updates");
        updates
    }
}

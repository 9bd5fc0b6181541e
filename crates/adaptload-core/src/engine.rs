//! The delivery engine: one logical owner for every tracked resource.
//!
//! The engine does not use internal threads. The host calls one handler per
//! callback (intersection entry, network change, load progress/completion)
//! and each handler runs to completion before the next. All shared state
//! (prefetch dedup set, budget samples, per-resource progress) lives here
//! and is only reachable through `&mut self`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = DeliveryEngine::new(options, host, HostSignal::Unavailable);
//! let id = engine.track(descriptor, "hero-image");
//! // From host callbacks:
//! engine.handle_intersection(observation, entry);
//! // `request` is the `FetchRequest` the fetcher was handed.
//! engine.handle_load_complete(request.fetch)?;
//! for event in engine.drain_events() { /* render */ }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::budget::{BudgetReport, Metric, MonitorConfig, PerformanceMonitor};
use crate::config::Config;
use crate::delivery::delivery_url;
use crate::error::{CoreError, Result, TransitionError};
use crate::events::Event;
use crate::network::{ConnectionInfo, ConnectionProfile, NetworkSampler};
use crate::prefetch::{HintSink, PrefetchOutcome, Prefetcher};
use crate::progress::{LoadingProgress, ProgressTracker};
use crate::resource::{PriorityTier, ResourceDescriptor, ResourceId, ResourceKind};
use crate::signal::HostSignal;
use crate::strategy::{resolve_with, LoadingDecision, ProximitySignal, ResolveOptions};
use crate::visibility::{
    IntersectionEntry, ObservationId, TrackerOptions, ViewportObserver, VisibilityTracker, VisibilityUpdate,
};

/// One fetch of one resource. Each fetch the engine begins gets a new
/// generation; load callbacks carrying a superseded generation are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchId {
    pub resource: ResourceId,
    pub generation: u32,
}

/// The real fetch for one resource, at the decided fidelity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub fetch: FetchId,
    pub url: String,
    pub kind: ResourceKind,
    pub quality: u8,
}

/// Host resource-fetch primitive. Completion is reported back through
/// [`DeliveryEngine::handle_load_complete`] / [`DeliveryEngine::handle_load_failed`].
pub trait ResourceFetcher {
    fn begin(&mut self, request: FetchRequest);
}

impl<F: ResourceFetcher + ?Sized> ResourceFetcher for Box<F> {
    fn begin(&mut self, request: FetchRequest) {
        (**self).begin(request)
    }
}

/// Host primitives the engine drives.
pub struct HostBindings {
    pub observer: HostSignal<Box<dyn ViewportObserver>>,
    pub fetcher: Box<dyn ResourceFetcher>,
    pub hints: Box<dyn HintSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub default_priority: PriorityTier,
    pub connection_aware: bool,
    pub preload_distance_px: Option<u32>,
    pub monitor: MonitorConfig,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_priority: PriorityTier::default(),
            connection_aware: true,
            preload_distance_px: None,
            monitor: MonitorConfig::default(),
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            default_priority: config.loading.priority,
            connection_aware: config.loading.connection_aware,
            preload_distance_px: config.loading.preload_distance_px,
            monitor: config.monitor_config(),
        }
    }
}

/// Per-descriptor output consumed by the display layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub id: ResourceId,
    pub url: String,
    pub is_in_view: bool,
    pub should_preload: bool,
    pub is_loaded: bool,
    pub loading_progress_percent: u8,
    pub loading_decision: LoadingDecision,
    pub progress: LoadingProgress,
}

struct TrackedResource {
    descriptor: ResourceDescriptor,
    options: ResolveOptions,
    tracker: VisibilityTracker,
    progress: ProgressTracker,
    decision: LoadingDecision,
    load_started_at: Option<DateTime<Utc>>,
    generation: u32,
    /// Generation of the fetch whose callbacks are accepted.
    active_fetch: Option<u32>,
}

impl TrackedResource {
    fn resolve(&self, profile: &ConnectionProfile) -> LoadingDecision {
        let proximity = ProximitySignal::new(
            self.tracker.is_in_view(),
            self.tracker.reached_preload_boundary(),
        );
        resolve_with(
            self.descriptor.priority_tier(),
            self.descriptor.kind(),
            profile,
            proximity,
            &self.options,
        )
    }

    fn advance(
        &mut self,
        id: ResourceId,
        to: LoadingProgress,
        events: &mut Vec<Event>,
    ) -> std::result::Result<(), TransitionError> {
        let from = self.progress.state();
        self.progress.transition(to)?;
        events.push(Event::ProgressChanged {
            id,
            from,
            to,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Whether load callbacks for `fetch` still apply to this resource.
    fn accepts(&self, fetch: FetchId) -> bool {
        self.active_fetch == Some(fetch.generation)
    }

    fn status(&self, id: ResourceId) -> ResourceStatus {
        ResourceStatus {
            id,
            url: self.descriptor.url().to_string(),
            is_in_view: self.tracker.is_in_view(),
            should_preload: self.decision.should_preload,
            is_loaded: self.progress.state() == LoadingProgress::Loaded,
            loading_progress_percent: self.progress.percent(),
            loading_decision: self.decision,
            progress: self.progress.state(),
        }
    }
}

pub struct DeliveryEngine {
    options: EngineOptions,
    sampler: NetworkSampler,
    observer: HostSignal<Box<dyn ViewportObserver>>,
    fetcher: Box<dyn ResourceFetcher>,
    prefetcher: Prefetcher<Box<dyn HintSink>>,
    monitor: PerformanceMonitor,
    resources: HashMap<ResourceId, TrackedResource>,
    routes: HashMap<ObservationId, ResourceId>,
    events: Vec<Event>,
}

impl DeliveryEngine {
    /// Create an engine and take the startup connection sample.
    pub fn new(options: EngineOptions, host: HostBindings, connection: HostSignal<&ConnectionInfo>) -> Self {
        let mut sampler = NetworkSampler::new(options.connection_aware);
        let profile = sampler.sample(connection);
        info!(
            connection_aware = sampler.is_connection_aware(),
            observer = host.observer.is_available(),
            class = ?profile.effective_class,
            "delivery engine started"
        );
        Self {
            options,
            sampler,
            observer: host.observer,
            fetcher: host.fetcher,
            prefetcher: Prefetcher::new(host.hints),
            monitor: PerformanceMonitor::new(options.monitor),
            resources: HashMap::new(),
            routes: HashMap::new(),
            events: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn connection(&self) -> ConnectionProfile {
        self.sampler.current()
    }

    pub fn status(&self, id: ResourceId) -> Option<ResourceStatus> {
        self.resources.get(&id).map(|res| res.status(id))
    }

    pub fn statuses(&self) -> Vec<ResourceStatus> {
        self.resources.iter().map(|(id, res)| res.status(*id)).collect()
    }

    pub fn tracked(&self) -> usize {
        self.resources.len()
    }

    pub fn is_hinted(&self, url: &str) -> bool {
        self.prefetcher.is_hinted(url)
    }

    pub fn budget_report(&self) -> Vec<BudgetReport> {
        self.monitor.report()
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Take every event queued since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Descriptor using the configured default tier.
    pub fn describe(&self, url: impl Into<String>, kind: ResourceKind) -> ResourceDescriptor {
        ResourceDescriptor::new(url, kind, self.options.default_priority)
    }

    // ── Tracking ─────────────────────────────────────────────────────

    pub fn track(&mut self, descriptor: ResourceDescriptor, target: impl Into<String>) -> ResourceId {
        self.track_with(descriptor, target, ResolveOptions::default())
    }

    /// Track with per-resource overrides. A per-resource preload distance
    /// wins over the engine-wide one.
    pub fn track_with(
        &mut self,
        descriptor: ResourceDescriptor,
        target: impl Into<String>,
        options: ResolveOptions,
    ) -> ResourceId {
        let id = ResourceId::new();
        let options = ResolveOptions {
            preload_distance_px: options.preload_distance_px.or(self.options.preload_distance_px),
        };
        let decision = resolve_with(
            descriptor.priority_tier(),
            descriptor.kind(),
            &self.sampler.current(),
            ProximitySignal::default(),
            &options,
        );

        info!(%id, url = descriptor.url(), tier = %descriptor.priority_tier(), "tracking resource");
        self.events.push(Event::Tracked {
            id,
            url: descriptor.url().to_string(),
            tier: descriptor.priority_tier(),
            at: Utc::now(),
        });

        let mut tracker = VisibilityTracker::new(TrackerOptions::from(&decision));
        let updates = tracker.attach(self.observer.as_mut(), target);
        push_visibility_events(&mut self.events, id, &updates);
        sync_routes(&mut self.routes, id, &tracker);

        self.resources.insert(
            id,
            TrackedResource {
                descriptor,
                options,
                tracker,
                progress: ProgressTracker::new(),
                decision,
                load_started_at: None,
                generation: 0,
                active_fetch: None,
            },
        );
        self.reevaluate(id);
        id
    }

    /// Dispose of a resource. Its observations are torn down before this
    /// returns, so no later callback can reach it.
    pub fn untrack(&mut self, id: ResourceId) -> Result<()> {
        let mut res = self.resources.remove(&id).ok_or(CoreError::UnknownResource(id))?;
        res.tracker.detach(self.observer.as_mut());
        self.routes.retain(|_, owner| *owner != id);
        info!(%id, "untracked resource");
        self.events.push(Event::Untracked { id, at: Utc::now() });
        Ok(())
    }

    /// Swap in a new descriptor. A URL change resets progress and re-arms the
    /// preload boundary; anything else only re-resolves the decision.
    pub fn replace_descriptor(&mut self, id: ResourceId, descriptor: ResourceDescriptor) -> Result<()> {
        let res = self.resources.get_mut(&id).ok_or(CoreError::UnknownResource(id))?;
        let url_changed = res.descriptor.url() != descriptor.url();
        res.descriptor = descriptor;

        if url_changed {
            res.progress.reset();
            res.load_started_at = None;
            res.active_fetch = None;
            debug!(%id, url = res.descriptor.url(), "descriptor url changed; resetting");
            self.events.push(Event::Reset {
                id,
                url: res.descriptor.url().to_string(),
                at: Utc::now(),
            });
            let updates = res.tracker.rearm(self.observer.as_mut());
            push_visibility_events(&mut self.events, id, &updates);
            sync_routes(&mut self.routes, id, &res.tracker);
        }

        self.reevaluate(id);
        Ok(())
    }

    // ── Host callbacks ───────────────────────────────────────────────

    /// Route one intersection callback. Callbacks for observations no
    /// tracked resource owns are dropped.
    pub fn handle_intersection(&mut self, observation: ObservationId, entry: IntersectionEntry) {
        let Some(&id) = self.routes.get(&observation) else {
            debug!(?observation, "intersection for unknown observation; ignoring");
            return;
        };
        let Some(res) = self.resources.get_mut(&id) else {
            return;
        };
        let Some(update) = res.tracker.handle_entry(self.observer.as_mut(), observation, entry) else {
            return;
        };
        push_visibility_events(&mut self.events, id, &[update]);
        sync_routes(&mut self.routes, id, &res.tracker);
        self.reevaluate(id);
    }

    /// Re-sample the connection and re-resolve every resource.
    pub fn handle_network_change(&mut self, connection: HostSignal<&ConnectionInfo>) {
        let before = self.sampler.current();
        let profile = self.sampler.sample(connection);
        if profile != before {
            info!(class = ?profile.effective_class, downlink = profile.downlink_mbps, "network changed");
            self.events.push(Event::NetworkChanged { profile, at: Utc::now() });
        }
        let ids: Vec<ResourceId> = self.resources.keys().copied().collect();
        for id in ids {
            self.reevaluate(id);
        }
    }

    // Load callbacks carry the `FetchId` of the request they answer. A
    // callback for a superseded fetch (the URL changed since) is dropped.

    pub fn handle_load_progress(&mut self, fetch: FetchId, percent: u8) -> Result<()> {
        let id = fetch.resource;
        let res = self.resources.get_mut(&id).ok_or(CoreError::UnknownResource(id))?;
        if !res.accepts(fetch) {
            debug!(%id, generation = fetch.generation, "progress for superseded fetch; ignoring");
            return Ok(());
        }
        if res.progress.report(percent)? {
            self.events.push(Event::LoadProgress {
                id,
                percent: res.progress.percent(),
                at: Utc::now(),
            });
        }
        Ok(())
    }

    pub fn handle_load_complete(&mut self, fetch: FetchId) -> Result<()> {
        let id = fetch.resource;
        let res = self.resources.get_mut(&id).ok_or(CoreError::UnknownResource(id))?;
        if !res.accepts(fetch) {
            debug!(%id, generation = fetch.generation, "completion for superseded fetch; ignoring");
            return Ok(());
        }
        res.advance(id, LoadingProgress::Loaded, &mut self.events)?;
        if let Some(started) = res.load_started_at.take() {
            let elapsed_ms = (Utc::now() - started).num_milliseconds().max(0) as f64;
            self.monitor.record(Metric::ResourceLoad, elapsed_ms);
            debug!(%id, elapsed_ms, "resource loaded");
        }
        Ok(())
    }

    /// Record a failed load. The resource stays `Errored`; retrying is the
    /// caller's decision.
    pub fn handle_load_failed(&mut self, fetch: FetchId, reason: impl Into<String>) -> Result<()> {
        let id = fetch.resource;
        let res = self.resources.get_mut(&id).ok_or(CoreError::UnknownResource(id))?;
        if !res.accepts(fetch) {
            debug!(%id, generation = fetch.generation, "failure for superseded fetch; ignoring");
            return Ok(());
        }
        res.advance(id, LoadingProgress::Errored, &mut self.events)?;
        res.load_started_at = None;
        let reason = reason.into();
        warn!(%id, url = res.descriptor.url(), %reason, "resource failed to load");
        self.events.push(Event::LoadFailed {
            id,
            reason,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Page-level vitals reported by the host.
    pub fn record_metric(&mut self, metric: Metric, value_ms: f64) {
        self.monitor.record(metric, value_ms);
    }

    // ── Internals ────────────────────────────────────────────────────

    fn reevaluate(&mut self, id: ResourceId) {
        let Self {
            sampler,
            observer,
            fetcher,
            prefetcher,
            resources,
            routes,
            events,
            ..
        } = self;
        let Some(res) = resources.get_mut(&id) else {
            return;
        };
        let profile = sampler.current();

        // A tracker that fails open while reconfiguring changes the proximity
        // inputs; resolve again until it settles.
        loop {
            let decision = res.resolve(&profile);
            if decision != res.decision {
                debug!(%id, ?decision, "decision changed");
                res.decision = decision;
                events.push(Event::DecisionChanged {
                    id,
                    decision,
                    at: Utc::now(),
                });
            }
            let updates = res
                .tracker
                .reconfigure(observer.as_mut(), TrackerOptions::from(&decision));
            if updates.is_empty() {
                break;
            }
            push_visibility_events(events, id, &updates);
        }
        sync_routes(routes, id, &res.tracker);

        if res.progress.state() == LoadingProgress::Unseen && res.decision.should_preload {
            let outcome = prefetcher.prefetch(res.descriptor.url(), res.descriptor.kind(), &res.decision);
            if outcome == PrefetchOutcome::Issued {
                events.push(Event::HintIssued {
                    id,
                    url: res.descriptor.url().to_string(),
                    at: Utc::now(),
                });
                if let Err(err) = res.advance(id, LoadingProgress::Preloading, events) {
                    warn!(%id, error = %err, "hint issued but progress rejected preloading");
                }
            }
        }

        if res.progress.state().awaiting_fetch()
            && res.decision.should_load_now
            && res.advance(id, LoadingProgress::Loading, events).is_ok()
        {
            res.load_started_at = Some(Utc::now());
            res.generation = res.generation.wrapping_add(1);
            res.active_fetch = Some(res.generation);
            let request = FetchRequest {
                fetch: FetchId {
                    resource: id,
                    generation: res.generation,
                },
                url: delivery_url(&res.descriptor, &res.decision),
                kind: res.descriptor.kind(),
                quality: res.decision.target_quality,
            };
            events.push(Event::LoadStarted {
                id,
                generation: res.generation,
                url: request.url.clone(),
                quality: request.quality,
                at: Utc::now(),
            });
            fetcher.begin(request);
        }
    }
}

fn push_visibility_events(events: &mut Vec<Event>, id: ResourceId, updates: &[VisibilityUpdate]) {
    for update in updates {
        let at = Utc::now();
        events.push(match *update {
            VisibilityUpdate::Changed(state) => Event::VisibilityChanged {
                id,
                is_in_view: state.is_in_view,
                intersection_ratio: state.intersection_ratio,
                at,
            },
            VisibilityUpdate::PreloadBoundaryReached => Event::PreloadBoundaryReached { id, at },
        });
    }
}

fn sync_routes(routes: &mut HashMap<ObservationId, ResourceId>, id: ResourceId, tracker: &VisibilityTracker) {
    routes.retain(|_, owner| *owner != id);
    for observation in tracker.observations() {
        routes.insert(observation, id);
    }
}

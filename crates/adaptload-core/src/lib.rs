//! # Adaptload Core Library
//!
//! Adaptive resource delivery: decides, per resource, whether to preload, when
//! to fetch, at what fidelity, and under which cache contract, from three
//! inputs: the caller's priority tier, the resource's proximity to the
//! viewport, and the current network conditions.
//!
//! ## Architecture
//!
//! - **Engine**: a single-owner, callback-driven state machine. The host feeds
//!   it intersection entries, network changes and load completions; it drives
//!   the host's observer, fetcher and hint sink and queues [`Event`]s.
//! - **Strategy**: pure, table-driven resolution of a [`LoadingDecision`].
//! - **Cache**: pure assignment of a [`CacheStrategy`] per resource class.
//! - **Budget**: open-loop performance budget reporting.
//!
//! Every optional host signal is a [`HostSignal`]; its absence resolves to a
//! fail-open default and never surfaces as an error.
//!
//! ## Key Components
//!
//! - [`DeliveryEngine`]: per-page owner of all tracked resources
//! - [`resolve`]: the loading strategy resolver
//! - [`cache::assign`]: the cache policy assigner
//! - [`PerformanceMonitor`]: budget samples and reports
//! - [`Config`]: TOML configuration

pub mod budget;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod events;
pub mod network;
pub mod prefetch;
pub mod progress;
pub mod resource;
pub mod signal;
pub mod strategy;
pub mod visibility;

pub use budget::{BudgetReport, Metric, MonitorConfig, PerformanceMonitor, PerformanceSample};
pub use cache::{CacheStrategy, ResourceClass};
pub use config::Config;
pub use engine::{DeliveryEngine, EngineOptions, FetchId, FetchRequest, HostBindings, ResourceFetcher, ResourceStatus};
pub use error::{ConfigError, CoreError, HintError, ObserverError, TransitionError};
pub use events::Event;
pub use network::{ConnectionInfo, ConnectionProfile, EffectiveClass, NetworkSampler};
pub use prefetch::{Hint, HintSink, HttpHintSink, LinkHeaderSink, PrefetchOutcome, Prefetcher};
pub use progress::{LoadingProgress, ProgressTracker};
pub use resource::{PriorityTier, ResourceDescriptor, ResourceId, ResourceKind};
pub use signal::HostSignal;
pub use strategy::{resolve, resolve_with, ConnectionClass, LoadingDecision, ProximitySignal, ResolveOptions};
pub use visibility::{IntersectionEntry, ObservationId, ObserveOptions, ViewportObserver, VisibilityTracker};

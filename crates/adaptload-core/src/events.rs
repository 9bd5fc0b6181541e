use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::network::ConnectionProfile;
use crate::progress::LoadingProgress;
use crate::resource::{PriorityTier, ResourceId};
use crate::strategy::LoadingDecision;

/// Every state change in the engine produces an Event.
/// The display layer polls them with `DeliveryEngine::drain_events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Tracked {
        id: ResourceId,
        url: String,
        tier: PriorityTier,
        at: DateTime<Utc>,
    },
    VisibilityChanged {
        id: ResourceId,
        is_in_view: bool,
        intersection_ratio: f32,
        at: DateTime<Utc>,
    },
    PreloadBoundaryReached {
        id: ResourceId,
        at: DateTime<Utc>,
    },
    DecisionChanged {
        id: ResourceId,
        decision: LoadingDecision,
        at: DateTime<Utc>,
    },
    HintIssued {
        id: ResourceId,
        url: String,
        at: DateTime<Utc>,
    },
    ProgressChanged {
        id: ResourceId,
        from: LoadingProgress,
        to: LoadingProgress,
        at: DateTime<Utc>,
    },
    LoadStarted {
        id: ResourceId,
        generation: u32,
        url: String,
        quality: u8,
        at: DateTime<Utc>,
    },
    LoadProgress {
        id: ResourceId,
        percent: u8,
        at: DateTime<Utc>,
    },
    /// Load failed; the consumer renders a fallback. Never retried here.
    LoadFailed {
        id: ResourceId,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Descriptor URL changed; progress went back to `Unseen`.
    Reset {
        id: ResourceId,
        url: String,
        at: DateTime<Utc>,
    },
    NetworkChanged {
        profile: ConnectionProfile,
        at: DateTime<Utc>,
    },
    Untracked {
        id: ResourceId,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Resource the event concerns, if any.
    pub fn resource(&self) -> Option<ResourceId> {
        match self {
            Event::Tracked { id, .. }
            | Event::VisibilityChanged { id, .. }
            | Event::PreloadBoundaryReached { id, .. }
            | Event::DecisionChanged { id, .. }
            | Event::HintIssued { id, .. }
            | Event::ProgressChanged { id, .. }
            | Event::LoadStarted { id, .. }
            | Event::LoadProgress { id, .. }
            | Event::LoadFailed { id, .. }
            | Event::Reset { id, .. }
            | Event::Untracked { id, .. } => Some(*id),
            Event::NetworkChanged { .. } => None,
        }
    }
}

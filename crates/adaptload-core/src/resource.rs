//! Resource descriptors: what is being loaded and how urgently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a tracked descriptor inside one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Media/script kinds the engine makes decisions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
    Script,
    Style,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Image,
        ResourceKind::Video,
        ResourceKind::Script,
        ResourceKind::Style,
    ];

    /// Value of the `as` attribute for preload hints.
    pub fn as_destination(self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Video => "video",
            ResourceKind::Script => "script",
            ResourceKind::Style => "style",
        }
    }

    /// Whether the delivery layer can re-encode this kind at a lower quality.
    pub fn is_media(self) -> bool {
        matches!(self, ResourceKind::Image | ResourceKind::Video)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" | "img" => Ok(ResourceKind::Image),
            "video" => Ok(ResourceKind::Video),
            "script" | "js" => Ok(ResourceKind::Script),
            "style" | "css" => Ok(ResourceKind::Style),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Caller-declared urgency, independent of viewport position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 3] = [PriorityTier::High, PriorityTier::Medium, PriorityTier::Low];
}

impl Default for PriorityTier {
    fn default() -> Self {
        PriorityTier::Medium
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        };
        f.write_str(s)
    }
}

impl FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(PriorityTier::High),
            "medium" => Ok(PriorityTier::Medium),
            "low" => Ok(PriorityTier::Low),
            other => Err(format!("unknown priority tier: {other}")),
        }
    }
}

/// What is being loaded and how urgently. Immutable once created; a URL
/// change is modelled as a new descriptor handed to
/// [`DeliveryEngine::replace_descriptor`](crate::engine::DeliveryEngine::replace_descriptor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    url: String,
    kind: ResourceKind,
    priority_tier: PriorityTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    declared_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    declared_height: Option<u32>,
}

impl ResourceDescriptor {
    pub fn new(url: impl Into<String>, kind: ResourceKind, priority_tier: PriorityTier) -> Self {
        Self {
            url: url.into(),
            kind,
            priority_tier,
            declared_width: None,
            declared_height: None,
        }
    }

    /// Attach intrinsic dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.declared_width = Some(width);
        self.declared_height = Some(height);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn priority_tier(&self) -> PriorityTier {
        self.priority_tier
    }

    pub fn declared_width(&self) -> Option<u32> {
        self.declared_width
    }

    pub fn declared_height(&self) -> Option<u32> {
        self.declared_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tier_and_kind() {
        assert_eq!("HIGH".parse::<PriorityTier>(), Ok(PriorityTier::High));
        assert_eq!("css".parse::<ResourceKind>(), Ok(ResourceKind::Style));
        assert!("urgent".parse::<PriorityTier>().is_err());
    }

    #[test]
    fn descriptor_serializes_snake_case() {
        let d = ResourceDescriptor::new("/hero.avif", ResourceKind::Image, PriorityTier::High)
            .with_dimensions(1200, 630);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["priority_tier"], "high");
        assert_eq!(json["declared_width"], 1200);
        assert_eq!(json["kind"], "image");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ResourceId::new(), ResourceId::new());
    }
}

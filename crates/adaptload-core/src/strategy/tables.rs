//! Static policy tables for the loading strategy.

use super::ConnectionClass;
use crate::resource::{PriorityTier, ResourceKind};

/// Viewport margins for one priority tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPolicy {
    pub tier: PriorityTier,
    pub visibility_margin_px: u32,
    pub visibility_threshold: f32,
    /// Default outer margin for the preload boundary. Always larger than
    /// `visibility_margin_px`.
    pub preload_distance_px: u32,
}

/// Quality targets for one connection class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityRow {
    pub class: ConnectionClass,
    pub image: u8,
    pub video: u8,
}

/// Scripts and styles are served as-is. `QUALITY_TABLE` grades media only;
/// non-media kinds always get this value.
pub const LOSSLESS_QUALITY: u8 = 100;

pub const TIER_TABLE: [TierPolicy; 3] = [
    TierPolicy {
        tier: PriorityTier::High,
        visibility_margin_px: 400,
        visibility_threshold: 0.01,
        preload_distance_px: 1200,
    },
    TierPolicy {
        tier: PriorityTier::Medium,
        visibility_margin_px: 200,
        visibility_threshold: 0.1,
        preload_distance_px: 800,
    },
    TierPolicy {
        tier: PriorityTier::Low,
        visibility_margin_px: 50,
        visibility_threshold: 0.25,
        preload_distance_px: 400,
    },
];

pub const QUALITY_TABLE: [QualityRow; 3] = [
    QualityRow {
        class: ConnectionClass::Fast,
        image: 90,
        video: 90,
    },
    QualityRow {
        class: ConnectionClass::Medium,
        image: 85,
        video: 75,
    },
    QualityRow {
        class: ConnectionClass::Slow,
        image: 65,
        video: 45,
    },
];

pub fn tier_policy(tier: PriorityTier) -> &'static TierPolicy {
    match tier {
        PriorityTier::High => &TIER_TABLE[0],
        PriorityTier::Medium => &TIER_TABLE[1],
        PriorityTier::Low => &TIER_TABLE[2],
    }
}

/// Divisor applied to every tier's margin for a connection class.
pub fn margin_divisor(class: ConnectionClass) -> u32 {
    match class {
        ConnectionClass::Fast | ConnectionClass::Medium => 1,
        ConnectionClass::Slow => 2,
    }
}

pub fn target_quality(class: ConnectionClass, kind: ResourceKind) -> u8 {
    if !kind.is_media() {
        return LOSSLESS_QUALITY;
    }
    let row = match class {
        ConnectionClass::Fast => &QUALITY_TABLE[0],
        ConnectionClass::Medium => &QUALITY_TABLE[1],
        ConnectionClass::Slow => &QUALITY_TABLE[2],
    };
    match kind {
        ResourceKind::Video => row.video,
        _ => row.image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_match_their_keys() {
        for tier in PriorityTier::ALL {
            assert_eq!(tier_policy(tier).tier, tier);
        }
        for class in ConnectionClass::ALL {
            let idx = QUALITY_TABLE.iter().position(|r| r.class == class).unwrap();
            assert_eq!(target_quality(class, ResourceKind::Image), QUALITY_TABLE[idx].image);
        }
    }

    #[test]
    fn preload_boundary_outside_visibility_margin() {
        for policy in TIER_TABLE {
            assert!(policy.preload_distance_px > policy.visibility_margin_px);
        }
    }

    #[test]
    fn high_tier_triggers_earliest() {
        let high = tier_policy(PriorityTier::High);
        let low = tier_policy(PriorityTier::Low);
        assert!(high.visibility_margin_px > low.visibility_margin_px);
        assert!(high.visibility_threshold < low.visibility_threshold);
    }

    #[test]
    fn only_media_follows_the_class() {
        for class in ConnectionClass::ALL {
            for kind in [ResourceKind::Script, ResourceKind::Style] {
                assert!(!kind.is_media());
                assert_eq!(target_quality(class, kind), LOSSLESS_QUALITY);
            }
            assert!(target_quality(class, ResourceKind::Video) < LOSSLESS_QUALITY);
        }
    }

    #[test]
    fn video_floor_below_image_floor() {
        for row in QUALITY_TABLE {
            assert!(row.video <= row.image);
        }
    }
}

//! Loading strategy resolution.
//!
//! [`resolve`] is a pure function that fuses a resource's priority tier, the
//! latest [`ConnectionProfile`] and the visibility/proximity signals into a
//! [`LoadingDecision`]. All policy lives in [`tables`].
//!
//! ## Rules
//!
//! ```text
//! class        = slow   if effective=slow or data saver
//!                fast   if effective=fast and downlink > 5 Mbps
//!                medium otherwise (unknown included)
//! preload      = fast && tier=high && reached preload boundary
//! load now     = in view || preload     (slow && tier=low: in view only)
//! ```

pub mod tables;

use serde::{Deserialize, Serialize};

use crate::network::{ConnectionProfile, EffectiveClass, FAST_DOWNLINK_THRESHOLD_MBPS};
use crate::resource::{PriorityTier, ResourceKind};

/// Connection class used by the policy tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    Fast,
    Medium,
    Slow,
}

impl ConnectionClass {
    pub const ALL: [ConnectionClass; 3] =
        [ConnectionClass::Fast, ConnectionClass::Medium, ConnectionClass::Slow];

    /// Classify a profile. A data-saver request always wins over bandwidth.
    pub fn classify(profile: &ConnectionProfile) -> Self {
        if profile.effective_class == EffectiveClass::Slow || profile.data_saver_requested {
            return ConnectionClass::Slow;
        }
        // Both conditions are required; a fast effective type alone is not enough.
        if profile.effective_class == EffectiveClass::Fast
            && profile.downlink_mbps > FAST_DOWNLINK_THRESHOLD_MBPS
        {
            return ConnectionClass::Fast;
        }
        ConnectionClass::Medium
    }
}

/// Visibility-side inputs for one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProximitySignal {
    pub is_in_view: bool,
    pub reached_preload_boundary: bool,
}

impl ProximitySignal {
    pub fn new(is_in_view: bool, reached_preload_boundary: bool) -> Self {
        Self {
            is_in_view,
            reached_preload_boundary,
        }
    }
}

/// Per-resource overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Replaces the tier's default preload boundary.
    pub preload_distance_px: Option<u32>,
}

/// Derived loading decision. Recomputed whenever an input changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadingDecision {
    pub should_preload: bool,
    pub should_load_now: bool,
    pub target_quality: u8,
    pub visibility_margin_px: u32,
    pub visibility_threshold: f32,
    pub preload_distance_px: u32,
    pub connection_class: ConnectionClass,
}

pub fn resolve(
    tier: PriorityTier,
    kind: ResourceKind,
    connection: &ConnectionProfile,
    proximity: ProximitySignal,
) -> LoadingDecision {
    resolve_with(tier, kind, connection, proximity, &ResolveOptions::default())
}

pub fn resolve_with(
    tier: PriorityTier,
    kind: ResourceKind,
    connection: &ConnectionProfile,
    proximity: ProximitySignal,
    options: &ResolveOptions,
) -> LoadingDecision {
    let policy = tables::tier_policy(tier);
    let class = ConnectionClass::classify(connection);

    let visibility_margin_px = policy.visibility_margin_px / tables::margin_divisor(class);
    let preload_distance_px = options
        .preload_distance_px
        .unwrap_or(policy.preload_distance_px)
        .max(visibility_margin_px.saturating_add(1));

    let should_preload = class == ConnectionClass::Fast
        && tier == PriorityTier::High
        && proximity.reached_preload_boundary;

    let should_load_now = if class == ConnectionClass::Slow && tier == PriorityTier::Low {
        proximity.is_in_view
    } else {
        proximity.is_in_view || should_preload
    };

    LoadingDecision {
        should_preload,
        should_load_now,
        target_quality: tables::target_quality(class, kind),
        visibility_margin_px,
        visibility_threshold: policy.visibility_threshold,
        preload_distance_px,
        connection_class: class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ConnectionInfo;
    use proptest::prelude::*;

    fn profile(effective: &str, downlink: f64, save_data: bool) -> ConnectionProfile {
        ConnectionProfile::from_info(&ConnectionInfo::new(effective, downlink, save_data))
    }

    fn fast() -> ConnectionProfile {
        profile("4g", 10.0, false)
    }

    fn slow_save_data() -> ConnectionProfile {
        profile("4g", 10.0, true)
    }

    #[test]
    fn scenario_high_fast_at_boundary_preloads() {
        let d = resolve(
            PriorityTier::High,
            ResourceKind::Image,
            &fast(),
            ProximitySignal::new(false, true),
        );
        assert!(d.should_preload);
        assert!(d.should_load_now);
        assert!(d.target_quality >= 90);
    }

    #[test]
    fn scenario_low_slow_waits_for_view() {
        let conn = slow_save_data();
        for reached in [false, true] {
            let out = resolve(
                PriorityTier::Low,
                ResourceKind::Image,
                &conn,
                ProximitySignal::new(false, reached),
            );
            assert!(!out.should_preload);
            assert!(!out.should_load_now);
        }
        let inside = resolve(
            PriorityTier::Low,
            ResourceKind::Image,
            &conn,
            ProximitySignal::new(true, true),
        );
        assert!(inside.should_load_now);
        assert!(!inside.should_preload);
    }

    #[test]
    fn default_profile_matches_explicit_fast() {
        for tier in PriorityTier::ALL {
            for kind in ResourceKind::ALL {
                for (in_view, reached) in [(false, false), (false, true), (true, true)] {
                    let p = ProximitySignal::new(in_view, reached);
                    assert_eq!(
                        resolve(tier, kind, &ConnectionProfile::fast_default(), p),
                        resolve(tier, kind, &fast(), p)
                    );
                }
            }
        }
    }

    #[test]
    fn fast_requires_downlink_strictly_above_threshold() {
        let at = profile("4g", FAST_DOWNLINK_THRESHOLD_MBPS, false);
        let above = profile("4g", FAST_DOWNLINK_THRESHOLD_MBPS + 0.1, false);
        assert_eq!(ConnectionClass::classify(&at), ConnectionClass::Medium);
        assert_eq!(ConnectionClass::classify(&above), ConnectionClass::Fast);
    }

    #[test]
    fn fast_requires_fast_effective_type() {
        assert_eq!(
            ConnectionClass::classify(&profile("3g", 50.0, false)),
            ConnectionClass::Medium
        );
    }

    #[test]
    fn unknown_is_medium_not_slow() {
        let unknown = profile("satellite", 0.5, false);
        assert_eq!(unknown.effective_class, EffectiveClass::Unknown);
        assert_eq!(ConnectionClass::classify(&unknown), ConnectionClass::Medium);
    }

    #[test]
    fn data_saver_wins_over_fast() {
        assert_eq!(ConnectionClass::classify(&slow_save_data()), ConnectionClass::Slow);
    }

    #[test]
    fn medium_tier_never_preloads_on_fast() {
        let d = resolve(
            PriorityTier::Medium,
            ResourceKind::Image,
            &fast(),
            ProximitySignal::new(false, true),
        );
        assert!(!d.should_preload);
        assert!(!d.should_load_now);
    }

    #[test]
    fn slow_medium_tier_still_loads_in_view() {
        let d = resolve(
            PriorityTier::Medium,
            ResourceKind::Video,
            &profile("2g", 0.2, false),
            ProximitySignal::new(true, false),
        );
        assert!(d.should_load_now);
        assert_eq!(d.target_quality, 45);
    }

    #[test]
    fn preload_distance_override_stays_outside_margin() {
        let opts = ResolveOptions {
            preload_distance_px: Some(10),
        };
        let d = resolve_with(
            PriorityTier::High,
            ResourceKind::Image,
            &fast(),
            ProximitySignal::default(),
            &opts,
        );
        assert_eq!(d.visibility_margin_px, 400);
        assert_eq!(d.preload_distance_px, 401);

        let opts = ResolveOptions {
            preload_distance_px: Some(2500),
        };
        let d = resolve_with(
            PriorityTier::High,
            ResourceKind::Image,
            &fast(),
            ProximitySignal::default(),
            &opts,
        );
        assert_eq!(d.preload_distance_px, 2500);

        let opts = ResolveOptions {
            preload_distance_px: Some(u32::MAX),
        };
        let d = resolve_with(
            PriorityTier::High,
            ResourceKind::Image,
            &fast(),
            ProximitySignal::default(),
            &opts,
        );
        assert_eq!(d.preload_distance_px, u32::MAX);
    }

    #[test]
    fn scripts_are_lossless() {
        for class_profile in [fast(), profile("3g", 1.0, false), slow_save_data()] {
            let d = resolve(
                PriorityTier::High,
                ResourceKind::Script,
                &class_profile,
                ProximitySignal::default(),
            );
            assert_eq!(d.target_quality, tables::LOSSLESS_QUALITY);
        }
    }

    fn arb_profile() -> impl Strategy<Value = ConnectionProfile> {
        (
            prop::sample::select(vec!["4g", "3g", "2g", "slow-2g", "", "wifi"]),
            0.0f64..100.0,
            any::<bool>(),
        )
            .prop_map(|(t, d, s)| profile(t, d, s))
    }

    fn arb_tier() -> impl Strategy<Value = PriorityTier> {
        prop::sample::select(PriorityTier::ALL.to_vec())
    }

    fn arb_kind() -> impl Strategy<Value = ResourceKind> {
        prop::sample::select(ResourceKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn margins_ordered_by_tier(conn in arb_profile(), kind in arb_kind(), in_view in any::<bool>(), reached in any::<bool>()) {
            let p = ProximitySignal::new(in_view, reached);
            let high = resolve(PriorityTier::High, kind, &conn, p).visibility_margin_px;
            let medium = resolve(PriorityTier::Medium, kind, &conn, p).visibility_margin_px;
            let low = resolve(PriorityTier::Low, kind, &conn, p).visibility_margin_px;
            prop_assert!(high >= medium);
            prop_assert!(medium >= low);
        }

        #[test]
        fn quality_ordered_by_class(kind in arb_kind()) {
            let fast = tables::target_quality(ConnectionClass::Fast, kind);
            let medium = tables::target_quality(ConnectionClass::Medium, kind);
            let slow = tables::target_quality(ConnectionClass::Slow, kind);
            prop_assert!(slow <= medium);
            prop_assert!(medium <= fast);
            prop_assert!(fast <= 100);
        }

        #[test]
        fn low_tier_never_preloads(conn in arb_profile(), kind in arb_kind(), in_view in any::<bool>(), reached in any::<bool>()) {
            let d = resolve(PriorityTier::Low, kind, &conn, ProximitySignal::new(in_view, reached));
            prop_assert!(!d.should_preload);
        }

        #[test]
        fn in_view_always_loads(conn in arb_profile(), tier in arb_tier(), kind in arb_kind(), reached in any::<bool>()) {
            let d = resolve(tier, kind, &conn, ProximitySignal::new(true, reached));
            prop_assert!(d.should_load_now);
        }

        #[test]
        fn preload_implies_load_now(conn in arb_profile(), tier in arb_tier(), kind in arb_kind(), in_view in any::<bool>(), reached in any::<bool>()) {
            let d = resolve(tier, kind, &conn, ProximitySignal::new(in_view, reached));
            if d.should_preload {
                prop_assert!(d.should_load_now);
            }
            prop_assert!(d.preload_distance_px > d.visibility_margin_px);
        }
    }
}

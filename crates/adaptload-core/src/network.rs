//! Network condition sampling.
//!
//! Turns the host's raw connection-quality signal into a [`ConnectionProfile`].
//! When the host exposes nothing, the profile is the optimistic
//! [`ConnectionProfile::fast_default`]: most hosts without the signal are
//! desktop browsers on adequate links.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signal::HostSignal;

/// Downlink (Mbps) that a `fast` effective class must exceed to count as fast.
pub const FAST_DOWNLINK_THRESHOLD_MBPS: f64 = 5.0;

/// Downlink reported by the optimistic default profile.
pub const DEFAULT_DOWNLINK_MBPS: f64 = 10.0;

/// Coarse bandwidth class reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveClass {
    Fast,
    Medium,
    Slow,
    Unknown,
}

impl EffectiveClass {
    /// Map a Network Information API `effectiveType` string.
    pub fn from_effective_type(effective_type: &str) -> Self {
        match effective_type.trim().to_ascii_lowercase().as_str() {
            "4g" | "5g" => EffectiveClass::Fast,
            "3g" => EffectiveClass::Medium,
            "2g" | "slow-2g" => EffectiveClass::Slow,
            _ => EffectiveClass::Unknown,
        }
    }
}

/// Raw connection signal as the host exposes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub effective_type: String,
    pub downlink: f64,
    #[serde(default)]
    pub save_data: bool,
}

impl ConnectionInfo {
    pub fn new(effective_type: impl Into<String>, downlink: f64, save_data: bool) -> Self {
        Self {
            effective_type: effective_type.into(),
            downlink,
            save_data,
        }
    }
}

/// Classified connection. Always the latest sample; no identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub effective_class: EffectiveClass,
    pub downlink_mbps: f64,
    pub data_saver_requested: bool,
}

impl ConnectionProfile {
    pub fn fast_default() -> Self {
        Self {
            effective_class: EffectiveClass::Fast,
            downlink_mbps: DEFAULT_DOWNLINK_MBPS,
            data_saver_requested: false,
        }
    }

    pub fn from_info(info: &ConnectionInfo) -> Self {
        let downlink_mbps = if info.downlink.is_finite() && info.downlink > 0.0 {
            info.downlink
        } else {
            0.0
        };
        Self {
            effective_class: EffectiveClass::from_effective_type(&info.effective_type),
            downlink_mbps,
            data_saver_requested: info.save_data,
        }
    }
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self::fast_default()
    }
}

/// Holds the latest [`ConnectionProfile`].
///
/// The host calls [`NetworkSampler::sample`] once at startup and again on
/// every change notification.
#[derive(Debug, Clone)]
pub struct NetworkSampler {
    connection_aware: bool,
    current: ConnectionProfile,
}

impl NetworkSampler {
    pub fn new(connection_aware: bool) -> Self {
        Self {
            connection_aware,
            current: ConnectionProfile::fast_default(),
        }
    }

    /// Recompute the profile from the host signal. Returns the new profile.
    pub fn sample(&mut self, signal: HostSignal<&ConnectionInfo>) -> ConnectionProfile {
        self.current = if !self.connection_aware {
            ConnectionProfile::fast_default()
        } else {
            match signal {
                HostSignal::Available(info) => ConnectionProfile::from_info(info),
                HostSignal::Unavailable => {
                    debug!("no connection signal exposed; using fast default");
                    ConnectionProfile::fast_default()
                }
            }
        };
        self.current
    }

    pub fn current(&self) -> ConnectionProfile {
        self.current
    }

    pub fn is_connection_aware(&self) -> bool {
        self.connection_aware
    }
}

impl Default for NetworkSampler {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_type_mapping() {
        assert_eq!(EffectiveClass::from_effective_type("4g"), EffectiveClass::Fast);
        assert_eq!(EffectiveClass::from_effective_type("3g"), EffectiveClass::Medium);
        assert_eq!(EffectiveClass::from_effective_type("2g"), EffectiveClass::Slow);
        assert_eq!(EffectiveClass::from_effective_type("slow-2g"), EffectiveClass::Slow);
        assert_eq!(EffectiveClass::from_effective_type("wifi"), EffectiveClass::Unknown);
    }

    #[test]
    fn unavailable_signal_is_fast_default() {
        let mut sampler = NetworkSampler::new(true);
        let profile = sampler.sample(HostSignal::Unavailable);
        assert_eq!(profile.effective_class, EffectiveClass::Fast);
        assert_eq!(profile.downlink_mbps, 10.0);
        assert!(!profile.data_saver_requested);
    }

    #[test]
    fn available_signal_is_classified() {
        let mut sampler = NetworkSampler::new(true);
        let info = ConnectionInfo::new("2g", 0.3, true);
        let profile = sampler.sample(HostSignal::Available(&info));
        assert_eq!(profile.effective_class, EffectiveClass::Slow);
        assert!(profile.data_saver_requested);
        assert_eq!(sampler.current(), profile);
    }

    #[test]
    fn not_connection_aware_ignores_signal() {
        let mut sampler = NetworkSampler::new(false);
        assert!(!sampler.is_connection_aware());
        let info = ConnectionInfo::new("2g", 0.3, true);
        assert_eq!(
            sampler.sample(HostSignal::Available(&info)),
            ConnectionProfile::fast_default()
        );
    }

    #[test]
    fn bogus_downlink_is_clamped() {
        let profile = ConnectionProfile::from_info(&ConnectionInfo::new("4g", f64::NAN, false));
        assert_eq!(profile.downlink_mbps, 0.0);
        let profile = ConnectionProfile::from_info(&ConnectionInfo::new("4g", -3.0, false));
        assert_eq!(profile.downlink_mbps, 0.0);
    }
}

//! Per-resource loading progress.
//!
//! ## State Transitions
//!
//! ```text
//! Unseen -> Preloading? -> Loading -> (Loaded | Errored)
//! ```
//!
//! Transitions are monotonic. The only way back to `Unseen` is
//! [`ProgressTracker::reset`], used when a descriptor's URL changes.

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingProgress {
    Unseen,
    Preloading,
    Loading,
    Loaded,
    Errored,
}

impl LoadingProgress {
    pub fn can_transition_to(self, next: LoadingProgress) -> bool {
        use LoadingProgress::*;
        matches!(
            (self, next),
            (Unseen, Preloading)
                | (Unseen, Loading)
                | (Preloading, Loading)
                | (Loading, Loaded)
                | (Loading, Errored)
        )
    }

    /// Whether the real fetch has not been issued yet.
    pub fn awaiting_fetch(self) -> bool {
        matches!(self, LoadingProgress::Unseen | LoadingProgress::Preloading)
    }
}

/// Progress state plus the transport's byte progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTracker {
    state: LoadingProgress,
    percent: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: LoadingProgress::Unseen,
            percent: 0,
        }
    }

    pub fn state(&self) -> LoadingProgress {
        self.state
    }

    /// 0..=100. Reaches 100 only on `Loaded`.
    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn transition(&mut self, next: LoadingProgress) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if next == LoadingProgress::Loaded {
            self.percent = 100;
        }
        Ok(())
    }

    /// Record transport progress while loading. Never moves backwards and
    /// caps at 99 until the load completes. Returns whether the value changed.
    pub fn report(&mut self, percent: u8) -> Result<bool, TransitionError> {
        if self.state != LoadingProgress::Loading {
            return Err(TransitionError {
                from: self.state,
                to: LoadingProgress::Loading,
            });
        }
        let next = percent.min(99).max(self.percent);
        let changed = next != self.percent;
        self.percent = next;
        Ok(changed)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoadingProgress::*;

    const ALL: [LoadingProgress; 5] = [Unseen, Preloading, Loading, Loaded, Errored];

    #[test]
    fn happy_path_with_preload() {
        let mut p = ProgressTracker::new();
        p.transition(Preloading).unwrap();
        p.transition(Loading).unwrap();
        assert_eq!(p.report(40), Ok(true));
        p.transition(Loaded).unwrap();
        assert_eq!(p.state(), Loaded);
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn loaded_never_reenters_loading() {
        let mut p = ProgressTracker::new();
        p.transition(Loading).unwrap();
        p.transition(Loaded).unwrap();
        assert!(p.transition(Loading).is_err());
        assert!(p.transition(Preloading).is_err());
        assert_eq!(p.state(), Loaded);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [Loaded, Errored] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn no_transition_moves_backwards() {
        let rank = |s: LoadingProgress| match s {
            Unseen => 0,
            Preloading => 1,
            Loading => 2,
            Loaded | Errored => 3,
        };
        for from in ALL {
            for to in ALL {
                if from.can_transition_to(to) {
                    assert!(rank(to) > rank(from));
                }
            }
        }
    }

    #[test]
    fn report_is_monotonic_and_capped() {
        let mut p = ProgressTracker::new();
        assert!(p.report(10).is_err());
        p.transition(Loading).unwrap();
        p.report(60).unwrap();
        assert_eq!(p.report(30), Ok(false));
        assert_eq!(p.percent(), 60);
        p.report(250).unwrap();
        assert_eq!(p.percent(), 99);
    }

    #[test]
    fn reset_returns_to_unseen() {
        let mut p = ProgressTracker::new();
        p.transition(Loading).unwrap();
        p.transition(Errored).unwrap();
        p.reset();
        assert_eq!(p.state(), Unseen);
        assert_eq!(p.percent(), 0);
        p.transition(Loading).unwrap();
    }
}

//! Optional host signals.

use serde::{Deserialize, Serialize};

/// A value the host may or may not expose.
///
/// Every consumer matches both arms; the `Unavailable` arm is where the
/// fail-open default lives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum HostSignal<T> {
    Available(T),
    Unavailable,
}

impl<T> HostSignal<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, HostSignal::Available(_))
    }

    pub fn as_ref(&self) -> HostSignal<&T> {
        match self {
            HostSignal::Available(value) => HostSignal::Available(value),
            HostSignal::Unavailable => HostSignal::Unavailable,
        }
    }

    pub fn as_mut(&mut self) -> HostSignal<&mut T> {
        match self {
            HostSignal::Available(value) => HostSignal::Available(value),
            HostSignal::Unavailable => HostSignal::Unavailable,
        }
    }
}

impl<'a, T: ?Sized> HostSignal<&'a mut T> {
    /// Borrow the signal again without giving it up.
    pub fn reborrow(&mut self) -> HostSignal<&mut T> {
        match self {
            HostSignal::Available(value) => HostSignal::Available(&mut **value),
            HostSignal::Unavailable => HostSignal::Unavailable,
        }
    }
}

impl<T> From<Option<T>> for HostSignal<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => HostSignal::Available(v),
            None => HostSignal::Unavailable,
        }
    }
}

//! Physical safety interlocks.
//!
//! Pure predicates over the [`ParameterStore`] that the actuator
//! controllers consult before every guarded transition.  A failed check
//! is not an error: the controller stays where it is and publishes the
//! interlock's corrective request so a human can clear the condition.
//!
//! | Transition     | Allowed when                                  | Otherwise publish              |
//! |----------------|-----------------------------------------------|--------------------------------|
//! | Lock           | lid closed                                    | `Lock/RequestCloseLid`         |
//! | Unlock         | completion < full threshold, or crusher on    | `Lock/RequestEmptyComposter`   |
//! | Crusher on     | lid locked                                    | `Lock/ManualOnRequested`       |
//!
//! A lid that is physically opened overrides all of the above: the lock
//! releases and the crusher stops unconditionally.

use core::fmt;

use crate::events::{EventKind, LockEvent};
use crate::params::ParameterStore;

/// Why a guarded transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interlock {
    /// Cannot lock: the lid is open.
    LidOpen,
    /// Cannot unlock: the bin is full and nothing is reducing it.
    ComposterFull,
    /// Cannot crush: the chute is accessible.
    Unlocked,
}

impl Interlock {
    /// The request event that tells a human (or another controller) how
    /// to clear this interlock.
    pub const fn corrective_event(self) -> EventKind {
        match self {
            Self::LidOpen => EventKind::Lock(LockEvent::RequestCloseLid),
            Self::ComposterFull => EventKind::Lock(LockEvent::RequestEmptyComposter),
            Self::Unlocked => EventKind::Lock(LockEvent::ManualOnRequested),
        }
    }
}

impl fmt::Display for Interlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LidOpen => write!(f, "lid open"),
            Self::ComposterFull => write!(f, "composter full"),
            Self::Unlocked => write!(f, "lid not locked"),
        }
    }
}

pub fn check_lock(store: &ParameterStore) -> Result<(), Interlock> {
    if store.get_lid_open() {
        return Err(Interlock::LidOpen);
    }
    Ok(())
}

pub fn check_unlock(store: &ParameterStore, full_threshold_percent: f32) -> Result<(), Interlock> {
    // Grinding reduces volume, so an active crusher may release a near-full bin.
    if store.get_completion() < full_threshold_percent || store.get_crusher_on() {
        return Ok(());
    }
    Err(Interlock::ComposterFull)
}

pub fn check_crush(store: &ParameterStore) -> Result<(), Interlock> {
    if store.get_locked() {
        return Ok(());
    }
    Err(Interlock::Unlocked)
}

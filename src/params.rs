//! Parameter store: the single source of truth for composter state.
//!
//! Every field is read and written through an accessor that takes the
//! store's one lock for exactly one field copy, so no caller ever sees a
//! torn value.  There is no cross-field atomicity: controllers that act on
//! several fields re-read them after each event, which is safe because all
//! interlock decisions are idempotent under re-evaluation.
//!
//! ```text
//!  classifiers ──set_*──▶ ┌──────────────────┐ ◀──get_*── cloud engine
//!  controllers ──set_*──▶ │  ParameterStore  │ ──get_*──▶ controllers
//!                         └──────────────────┘
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::Serialize;

/// Snapshot of everything the composter knows about itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ComposterParameters {
    /// Fill level, 0–100 %.
    pub completion: f32,
    /// Days since composting started.
    pub days: u32,
    pub humidity: f32,
    pub humidity_stable: bool,
    pub temperature: f32,
    pub temperature_stable: bool,
    pub mixer_on: bool,
    pub crusher_on: bool,
    pub fan_on: bool,
    pub locked: bool,
    pub lid_open: bool,
}

/// Mutex-guarded [`ComposterParameters`] with per-field accessors.
pub struct ParameterStore {
    inner: Mutex<CriticalSectionRawMutex, RefCell<ComposterParameters>>,
}

macro_rules! field_accessors {
    ($($field:ident: $ty:ty => $get:ident, $set:ident;)*) => {
        $(
            pub fn $get(&self) -> $ty {
                self.inner.lock(|p| p.borrow().$field)
            }

            pub fn $set(&self, value: $ty) {
                self.inner.lock(|p| p.borrow_mut().$field = value);
            }
        )*
    };
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::with(ComposterParameters::default())
    }

    /// Start from a known state (restored counters, test fixtures).
    pub fn with(initial: ComposterParameters) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(initial)),
        }
    }

    field_accessors! {
        completion: f32 => get_completion, set_completion;
        days: u32 => get_days, set_days;
        humidity: f32 => get_humidity, set_humidity;
        humidity_stable: bool => get_humidity_stable, set_humidity_stable;
        temperature: f32 => get_temperature, set_temperature;
        temperature_stable: bool => get_temperature_stable, set_temperature_stable;
        mixer_on: bool => get_mixer_on, set_mixer_on;
        crusher_on: bool => get_crusher_on, set_crusher_on;
        fan_on: bool => get_fan_on, set_fan_on;
        locked: bool => get_locked, set_locked;
        lid_open: bool => get_lid_open, set_lid_open;
    }

    /// Increment the day counter, returning the new value.
    pub fn increment_days(&self) -> u32 {
        self.inner.lock(|p| {
            let mut p = p.borrow_mut();
            p.days = p.days.saturating_add(1);
            p.days
        })
    }

    /// Copy of every field.  Fields are mutually consistent only with
    /// respect to this one lock acquisition.
    pub fn snapshot(&self) -> ComposterParameters {
        self.inner.lock(|p| *p.borrow())
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

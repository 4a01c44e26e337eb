//! Actuator controllers: four interlocked two-state machines.
//!
//! | Controller | States            | Turns on / locks on                          | Turns off / unlocks on                      |
//! |------------|-------------------|----------------------------------------------|---------------------------------------------|
//! | `Lock`     | Unlocked, Locked  | Capacity Full, crusher request (lid closed)  | Capacity not full, Crusher Off (if allowed) |
//! | `Crusher`  | Off, On           | ManualOn while locked                        | ManualOff, safety timer, lid opened, unlock |
//! | `Mixer`    | Off, On           | ManualOn, Crusher On, routine, unstable      | stable, stability check, run cap, ManualOff |
//! | `Fan`      | Off, On           | ManualOn, unstable                           | stable, stability check, run cap, ManualOff |
//!
//! Controllers react only to bus events (and their own timers).  Every
//! transition drives the output, mirrors the new state into the
//! [`ParameterStore`], and publishes an `On`/`Off` event.  Requests that
//! would not change anything are no-ops, so duplicated events never
//! double-toggle hardware or double-publish.
//!
//! Events produced while a controller holds its state lock are queued in
//! an [`Outbox`] and published after the lock is released.

pub mod crusher;
pub mod fan;
pub mod lock;
pub mod mixer;
pub mod motor;

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::bus::EventBus;
use crate::error::ActuatorError;
use crate::events::{ActuatorEvent, Event, EventKind, LockEvent};
use crate::params::ParameterStore;
use crate::safety::Interlock;

pub use crusher::Crusher;
pub use fan::Fan;
pub use lock::Lock;
pub use mixer::Mixer;

/// Outcome of a guarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The output moved and an `On`/`Off` event was published.
    Changed,
    /// Already in the requested state; nothing happened.
    Unchanged,
    /// An interlock refused the request; its corrective event was published.
    Declined(Interlock),
    /// The output could not be driven; state left as it was.
    Faulted(ActuatorError),
}

/// The three motor actuators mirrored in the cloud document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actuator {
    Mixer,
    Crusher,
    Fan,
}

impl Actuator {
    pub const ALL: [Actuator; 3] = [Actuator::Mixer, Actuator::Crusher, Actuator::Fan];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Mixer => "Mixer",
            Self::Crusher => "Crusher",
            Self::Fan => "Fan",
        }
    }

    pub fn is_on(self, store: &ParameterStore) -> bool {
        match self {
            Self::Mixer => store.get_mixer_on(),
            Self::Crusher => store.get_crusher_on(),
            Self::Fan => store.get_fan_on(),
        }
    }

    pub const fn event(self, discriminant: ActuatorEvent) -> EventKind {
        match self {
            Self::Mixer => EventKind::Mixer(discriminant),
            Self::Crusher => EventKind::Crusher(discriminant),
            Self::Fan => EventKind::Fan(discriminant),
        }
    }

    /// Split an event into actuator + discriminant, if it is one.
    pub const fn from_event(kind: EventKind) -> Option<(Actuator, ActuatorEvent)> {
        match kind {
            EventKind::Mixer(d) => Some((Self::Mixer, d)),
            EventKind::Crusher(d) => Some((Self::Crusher, d)),
            EventKind::Fan(d) => Some((Self::Fan, d)),
            _ => None,
        }
    }
}

/// Which store field and event pair a [`Switch`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line {
    Motor(Actuator),
    Lock,
}

impl Line {
    fn name(self) -> &'static str {
        match self {
            Self::Motor(a) => a.name(),
            Self::Lock => "Lock",
        }
    }

    fn is_active(self, store: &ParameterStore) -> bool {
        match self {
            Self::Motor(a) => a.is_on(store),
            Self::Lock => store.get_locked(),
        }
    }

    fn set_active(self, store: &ParameterStore, active: bool) {
        match self {
            Self::Motor(Actuator::Mixer) => store.set_mixer_on(active),
            Self::Motor(Actuator::Crusher) => store.set_crusher_on(active),
            Self::Motor(Actuator::Fan) => store.set_fan_on(active),
            Self::Lock => store.set_locked(active),
        }
    }

    fn event(self, active: bool) -> EventKind {
        match (self, active) {
            (Self::Motor(a), true) => a.event(ActuatorEvent::On),
            (Self::Motor(a), false) => a.event(ActuatorEvent::Off),
            (Self::Lock, true) => EventKind::Lock(LockEvent::On),
            (Self::Lock, false) => EventKind::Lock(LockEvent::Off),
        }
    }
}

/// A digital output whose level is mirrored into one store field.
pub(crate) struct Switch<P> {
    line: Line,
    pin: P,
}

impl<P: OutputPin> Switch<P> {
    pub(crate) fn new(line: Line, mut pin: P) -> Self {
        // Outputs start de-energised; the store defaults agree.
        if pin.set_low().is_err() {
            error!("{}: initial set_low failed", line.name());
        }
        Self { line, pin }
    }

    pub(crate) fn is_active(&self, store: &ParameterStore) -> bool {
        self.line.is_active(store)
    }

    /// Move to `active` unless already there.
    pub(crate) fn set(&mut self, store: &ParameterStore, active: bool, outbox: &mut Outbox) -> Transition {
        if self.line.is_active(store) == active {
            return Transition::Unchanged;
        }
        let driven = if active {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if driven.is_err() {
            error!("{}: GPIO write failed", self.line.name());
            return Transition::Faulted(ActuatorError::GpioWriteFailed);
        }
        self.line.set_active(store, active);
        outbox.push(self.line.event(active));
        info!("{}: {}", self.line.name(), if active { "on" } else { "off" });
        Transition::Changed
    }
}

/// Events queued while a controller holds its own lock.
#[derive(Default)]
pub(crate) struct Outbox {
    events: heapless::Vec<Event, 4>,
}

impl Outbox {
    pub(crate) fn push(&mut self, kind: EventKind) {
        if self.events.push(Event::new(kind)).is_err() {
            error!("Outbox: dropped {}", kind);
        }
    }

    pub(crate) fn publish(self, bus: &EventBus) {
        for event in self.events {
            bus.publish(event);
        }
    }
}

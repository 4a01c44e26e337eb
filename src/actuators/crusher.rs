//! Crusher motor.
//!
//! Only runs behind a locked lid.  A manual request while unlocked is
//! parked as *pending* and the lock is asked to engage; the crusher then
//! starts on `Lock/On`.  If the lid turns out to be open the lock answers
//! `Lock/RequestCloseLid` and the pending request is dropped.
//!
//! ```text
//!   ManualOn ──locked?──yes──▶ On ──(safety timer | ManualOff | Lock/Off | Lid/Opened)──▶ Off
//!                │
//!                no ──▶ pending, publish Lock/ManualOnRequested
//!                          ├── Lock/On ──────────▶ On
//!                          └── Lock/RequestCloseLid ──▶ pending dropped
//! ```

use core::cell::RefCell;
use std::sync::{Arc, Weak};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use super::{Actuator, Line, Outbox, Switch, Transition};
use crate::bus::{EventBus, EventHandler};
use crate::config::{ComposterConfig, ms};
use crate::error::{CommsError, Error};
use crate::events::{ActuatorEvent, Event, EventKind, LidEvent, LockEvent, Topic};
use crate::params::ParameterStore;
use crate::safety;
use crate::timers::{Timer, TimerService};

struct CrusherState<P> {
    switch: Switch<P>,
    /// A manual request is waiting for the lock.
    pending_manual: bool,
}

pub struct Crusher<P> {
    store: Arc<ParameterStore>,
    state: Mutex<CriticalSectionRawMutex, RefCell<CrusherState<P>>>,
    safety: Timer,
}

impl<P: OutputPin + Send + 'static> Crusher<P> {
    pub fn new(
        pin: P,
        store: Arc<ParameterStore>,
        bus: &Arc<EventBus>,
        timers: &Arc<TimerService>,
        config: &ComposterConfig,
    ) -> Result<Arc<Self>, Error> {
        let safety = timers
            .create("crusher-safety", ms(config.crusher_safety_ms), true)
            .ok_or(Error::Init("crusher: no free timer slot"))?;

        let crusher = Arc::new(Self {
            store,
            state: Mutex::new(RefCell::new(CrusherState {
                switch: Switch::new(Line::Motor(Actuator::Crusher), pin),
                pending_manual: false,
            })),
            safety,
        });

        let weak: Weak<Self> = Arc::downgrade(&crusher);
        let b = bus.clone();
        crusher.safety.on_fire(move || {
            if let Some(crusher) = weak.upgrade() {
                crusher.safety_expired(&b);
            }
        });
        Ok(crusher)
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), CommsError> {
        bus.subscribe(Topic::Crusher, self.clone())?;
        bus.subscribe(Topic::Lock, self.clone())?;
        bus.subscribe_exact(EventKind::Lid(LidEvent::Opened), self.clone())
    }

    pub fn is_on(&self) -> bool {
        self.store.get_crusher_on()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock(|s| s.borrow().pending_manual)
    }

    /// Start crushing if the lid is locked, otherwise park the request and
    /// ask the lock to engage.
    pub fn request_on(&self, bus: &EventBus) -> Transition {
        let mut outbox = Outbox::default();
        let t = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if let Err(interlock) = safety::check_crush(&self.store) {
                s.pending_manual = true;
                outbox.push(interlock.corrective_event());
                return Transition::Declined(interlock);
            }
            s.pending_manual = false;
            s.switch.set(&self.store, true, &mut outbox)
        });
        match t {
            Transition::Changed => self.safety.start(),
            Transition::Declined(_) => info!("Crusher: waiting for the lid to lock"),
            _ => {}
        }
        outbox.publish(bus);
        t
    }

    /// Stop and forget any pending request.
    pub fn turn_off(&self, bus: &EventBus) -> Transition {
        let mut outbox = Outbox::default();
        let t = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.pending_manual = false;
            s.switch.set(&self.store, false, &mut outbox)
        });
        if !matches!(t, Transition::Faulted(_)) {
            self.safety.stop();
        }
        outbox.publish(bus);
        t
    }

    fn force_stop(&self, bus: &EventBus, reason: &str) {
        if self.turn_off(bus) == Transition::Changed {
            warn!("Crusher: stopped ({})", reason);
        }
    }

    fn on_locked(&self, bus: &EventBus) {
        let pending = self
            .state
            .lock(|s| core::mem::take(&mut s.borrow_mut().pending_manual));
        if pending {
            self.request_on(bus);
        }
    }

    fn cancel_pending(&self) {
        let was = self
            .state
            .lock(|s| core::mem::take(&mut s.borrow_mut().pending_manual));
        if was {
            info!("Crusher: request dropped, lid must be closed first");
        }
    }

    fn safety_expired(&self, bus: &EventBus) {
        self.force_stop(bus, "safety timeout");
    }
}

impl<P: OutputPin + Send + 'static> EventHandler for Crusher<P> {
    fn handle(&self, event: &Event, bus: &EventBus) {
        match event.kind {
            EventKind::Crusher(ActuatorEvent::ManualOn) => {
                self.request_on(bus);
            }
            EventKind::Crusher(ActuatorEvent::ManualOff) => {
                self.turn_off(bus);
            }
            EventKind::Lock(LockEvent::On) => self.on_locked(bus),
            EventKind::Lock(LockEvent::Off) => self.force_stop(bus, "lock released"),
            EventKind::Lock(LockEvent::RequestCloseLid) => self.cancel_pending(),
            EventKind::Lid(LidEvent::Opened) => self.force_stop(bus, "lid opened"),
            _ => {}
        }
    }
}

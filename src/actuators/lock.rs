//! Lid lock solenoid.
//!
//! Locks when the bin fills or the crusher asks for it, unlocks when there
//! is room again or crushing finishes.  Both directions are guarded by
//! [`safety`](crate::safety); a physically opened lid releases the lock
//! unconditionally.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use super::{Line, Outbox, Switch, Transition};
use crate::bus::{EventBus, EventHandler};
use crate::config::ComposterConfig;
use crate::error::CommsError;
use crate::events::{ActuatorEvent, CapacityEvent, Event, EventKind, LidEvent, LockEvent, Topic};
use crate::params::ParameterStore;
use crate::safety;

pub struct Lock<P> {
    store: Arc<ParameterStore>,
    switch: Mutex<CriticalSectionRawMutex, RefCell<Switch<P>>>,
    full_threshold_percent: f32,
}

impl<P: OutputPin + Send + 'static> Lock<P> {
    pub fn new(pin: P, store: Arc<ParameterStore>, config: &ComposterConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            switch: Mutex::new(RefCell::new(Switch::new(Line::Lock, pin))),
            full_threshold_percent: config.full_threshold_percent,
        })
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), CommsError> {
        bus.subscribe(Topic::Lock, self.clone())?;
        bus.subscribe_exact(EventKind::Crusher(ActuatorEvent::Off), self.clone())?;
        bus.subscribe(Topic::Capacity, self.clone())?;
        bus.subscribe_exact(EventKind::Lid(LidEvent::Opened), self.clone())
    }

    pub fn is_locked(&self) -> bool {
        self.store.get_locked()
    }

    pub fn lock(&self, bus: &EventBus) -> Transition {
        self.guarded(bus, true, || safety::check_lock(&self.store))
    }

    pub fn unlock(&self, bus: &EventBus) -> Transition {
        self.guarded(bus, false, || {
            safety::check_unlock(&self.store, self.full_threshold_percent)
        })
    }

    /// Release regardless of interlocks.  Used when the lid is forced open.
    pub fn force_unlock(&self, bus: &EventBus) -> Transition {
        let mut outbox = Outbox::default();
        let t = self
            .switch
            .lock(|s| s.borrow_mut().set(&self.store, false, &mut outbox));
        if t == Transition::Changed {
            warn!("Lock: released because the lid was opened");
        }
        outbox.publish(bus);
        t
    }

    fn guarded(
        &self,
        bus: &EventBus,
        target: bool,
        check: impl FnOnce() -> Result<(), safety::Interlock>,
    ) -> Transition {
        let mut outbox = Outbox::default();
        let t = self.switch.lock(|s| {
            let mut s = s.borrow_mut();
            if s.is_active(&self.store) == target {
                return Transition::Unchanged;
            }
            if let Err(interlock) = check() {
                outbox.push(interlock.corrective_event());
                return Transition::Declined(interlock);
            }
            s.set(&self.store, target, &mut outbox)
        });
        if let Transition::Declined(interlock) = t {
            info!(
                "Lock: {} refused ({})",
                if target { "lock" } else { "unlock" },
                interlock
            );
        }
        outbox.publish(bus);
        t
    }
}

impl<P: OutputPin + Send + 'static> EventHandler for Lock<P> {
    fn handle(&self, event: &Event, bus: &EventBus) {
        match event.kind {
            EventKind::Lock(LockEvent::ManualOnRequested) => {
                self.lock(bus);
            }
            EventKind::Crusher(ActuatorEvent::Off) => {
                self.unlock(bus);
            }
            EventKind::Capacity(CapacityEvent::Full) => {
                self.lock(bus);
            }
            EventKind::Capacity(CapacityEvent::NotFull | CapacityEvent::Partial | CapacityEvent::Empty) => {
                self.unlock(bus);
            }
            EventKind::Lid(LidEvent::Opened) => {
                self.force_unlock(bus);
            }
            _ => {}
        }
    }
}

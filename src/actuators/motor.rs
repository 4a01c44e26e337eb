//! Self-limiting motor shared by the mixer and the fan.
//!
//! While running, a repeating check timer looks at the stability flags in
//! the store: once humidity and temperature are both back in range the
//! motor stops.  If they never settle, the motor stops anyway after
//! `max_run` so a failed sensor cannot keep it running forever.

use core::cell::RefCell;
use core::time::Duration;
use std::sync::{Arc, Weak};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

use super::{Actuator, Line, Outbox, Switch, Transition};
use crate::bus::EventBus;
use crate::error::Error;
use crate::params::ParameterStore;
use crate::timers::{Timer, TimerService};

struct MotorState<P> {
    switch: Switch<P>,
    /// Check-timer firings since the motor last turned on.
    checks: u32,
}

pub struct Motor<P> {
    actuator: Actuator,
    store: Arc<ParameterStore>,
    state: Mutex<CriticalSectionRawMutex, RefCell<MotorState<P>>>,
    check: Timer,
    max_checks: u32,
}

impl<P: OutputPin + Send + 'static> Motor<P> {
    pub(crate) fn new(
        actuator: Actuator,
        pin: P,
        store: Arc<ParameterStore>,
        bus: &Arc<EventBus>,
        timers: &Arc<TimerService>,
        check_period: Duration,
        max_run: Duration,
    ) -> Result<Arc<Self>, Error> {
        let check = timers
            .create(check_timer_name(actuator), check_period, true)
            .ok_or(Error::Init("motor: no free timer slot"))?;
        let max_checks = max_checks(check_period, max_run);

        let motor = Arc::new(Self {
            actuator,
            store,
            state: Mutex::new(RefCell::new(MotorState {
                switch: Switch::new(Line::Motor(actuator), pin),
                checks: 0,
            })),
            check,
            max_checks,
        });

        let weak: Weak<Self> = Arc::downgrade(&motor);
        let bus = bus.clone();
        motor.check.on_fire(move || {
            if let Some(motor) = weak.upgrade() {
                motor.stability_check(&bus);
            }
        });
        Ok(motor)
    }

    pub fn is_on(&self) -> bool {
        self.actuator.is_on(&self.store)
    }

    pub fn is_checking(&self) -> bool {
        self.check.is_running()
    }

    /// Start the motor and its check timer.  A running motor keeps its
    /// current check schedule.
    pub fn turn_on(&self, bus: &EventBus) -> Transition {
        let mut outbox = Outbox::default();
        let t = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let t = s.switch.set(&self.store, true, &mut outbox);
            if t == Transition::Changed {
                s.checks = 0;
            }
            t
        });
        if t == Transition::Changed || (t == Transition::Unchanged && !self.check.is_running()) {
            self.check.start();
        }
        outbox.publish(bus);
        t
    }

    pub fn turn_off(&self, bus: &EventBus) -> Transition {
        let mut outbox = Outbox::default();
        let t = self
            .state
            .lock(|s| s.borrow_mut().switch.set(&self.store, false, &mut outbox));
        if !matches!(t, Transition::Faulted(_)) {
            self.check.stop();
        }
        outbox.publish(bus);
        t
    }

    fn stability_check(&self, bus: &EventBus) {
        if !self.is_on() {
            self.check.stop();
            return;
        }
        let checks = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.checks = s.checks.saturating_add(1);
            s.checks
        });

        let stable = self.store.get_humidity_stable() && self.store.get_temperature_stable();
        if stable {
            info!("{}: parameters stable, stopping", self.actuator.name());
            self.turn_off(bus);
        } else if checks >= self.max_checks {
            warn!(
                "{}: still unstable after {} checks, stopping",
                self.actuator.name(),
                checks
            );
            self.turn_off(bus);
        } else {
            debug!("{}: check {}/{} unstable", self.actuator.name(), checks, self.max_checks);
        }
    }
}

fn check_timer_name(actuator: Actuator) -> &'static str {
    match actuator {
        Actuator::Mixer => "mixer-check",
        Actuator::Crusher => "crusher-check",
        Actuator::Fan => "fan-check",
    }
}

/// Number of check firings that add up to `max_run` (at least one).
fn max_checks(check_period: Duration, max_run: Duration) -> u32 {
    let period = check_period.as_millis().max(1);
    let n = max_run.as_millis().div_ceil(period);
    u32::try_from(n).unwrap_or(u32::MAX).max(1)
}

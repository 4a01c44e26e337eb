//! Mixing drum motor.
//!
//! Runs on request, whenever the crusher runs (fresh material needs
//! turning), when the parameters go unstable, and on a fixed routine
//! (every six hours by default).  Each run stops through the shared
//! stability check in [`motor`](super::motor).

use std::sync::Arc;

use embedded_hal::digital::OutputPin;
use log::info;

use super::motor::Motor;
use super::{Actuator, Transition};
use crate::bus::{EventBus, EventHandler};
use crate::config::{ComposterConfig, ms};
use crate::error::{CommsError, Error};
use crate::events::{ActuatorEvent, Event, EventKind, StabilityEvent, Topic};
use crate::params::ParameterStore;
use crate::timers::{Timer, TimerService};

pub struct Mixer<P> {
    motor: Arc<Motor<P>>,
    routine: Timer,
}

impl<P: OutputPin + Send + 'static> Mixer<P> {
    pub fn new(
        pin: P,
        store: Arc<ParameterStore>,
        bus: &Arc<EventBus>,
        timers: &Arc<TimerService>,
        config: &ComposterConfig,
    ) -> Result<Arc<Self>, Error> {
        let motor = Motor::new(
            Actuator::Mixer,
            pin,
            store,
            bus,
            timers,
            ms(config.mixer_check_ms),
            ms(config.mixer_max_run_ms),
        )?;
        let routine = timers
            .create("mixer-routine", ms(config.mixer_routine_ms), true)
            .ok_or(Error::Init("mixer: no free timer slot"))?;

        let weak = Arc::downgrade(&motor);
        let b = bus.clone();
        routine.on_fire(move || {
            if let Some(motor) = weak.upgrade() {
                info!("Mixer: routine run");
                motor.turn_on(&b);
            }
        });

        Ok(Arc::new(Self { motor, routine }))
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), CommsError> {
        bus.subscribe(Topic::Mixer, self.clone())?;
        bus.subscribe_exact(EventKind::Crusher(ActuatorEvent::On), self.clone())?;
        bus.subscribe(Topic::Parameters, self.clone())
    }

    /// Arm the periodic mixing routine.
    pub fn start_routine(&self) {
        self.routine.start();
    }

    pub fn is_on(&self) -> bool {
        self.motor.is_on()
    }

    pub fn turn_on(&self, bus: &EventBus) -> Transition {
        self.motor.turn_on(bus)
    }

    pub fn turn_off(&self, bus: &EventBus) -> Transition {
        self.motor.turn_off(bus)
    }
}

impl<P: OutputPin + Send + 'static> EventHandler for Mixer<P> {
    fn handle(&self, event: &Event, bus: &EventBus) {
        match event.kind {
            EventKind::Mixer(ActuatorEvent::ManualOn)
            | EventKind::Crusher(ActuatorEvent::On)
            | EventKind::Parameters(StabilityEvent::Unstable) => {
                self.turn_on(bus);
            }
            EventKind::Mixer(ActuatorEvent::ManualOff) | EventKind::Parameters(StabilityEvent::Stable) => {
                self.turn_off(bus);
            }
            _ => {}
        }
    }
}

//! Ventilation fan.
//!
//! Same lifecycle as the mixer without the routine: on request or when
//! the parameters go unstable, off once they settle, after the run cap,
//! or on request.

use std::sync::Arc;

use embedded_hal::digital::OutputPin;

use super::motor::Motor;
use super::{Actuator, Transition};
use crate::bus::{EventBus, EventHandler};
use crate::config::{ComposterConfig, ms};
use crate::error::{CommsError, Error};
use crate::events::{ActuatorEvent, Event, EventKind, StabilityEvent, Topic};
use crate::params::ParameterStore;
use crate::timers::TimerService;

pub struct Fan<P> {
    motor: Arc<Motor<P>>,
}

impl<P: OutputPin + Send + 'static> Fan<P> {
    pub fn new(
        pin: P,
        store: Arc<ParameterStore>,
        bus: &Arc<EventBus>,
        timers: &Arc<TimerService>,
        config: &ComposterConfig,
    ) -> Result<Arc<Self>, Error> {
        let motor = Motor::new(
            Actuator::Fan,
            pin,
            store,
            bus,
            timers,
            ms(config.fan_check_ms),
            ms(config.fan_max_run_ms),
        )?;
        Ok(Arc::new(Self { motor }))
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), CommsError> {
        bus.subscribe(Topic::Fan, self.clone())?;
        bus.subscribe(Topic::Parameters, self.clone())
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

impl<P: OutputPin + Send + 'static> EventHandler for Fan<P> {
    fn handle(&self, event: &Event, bus: &EventBus) {
        match event.kind {
            EventKind::Fan(ActuatorEvent::ManualOn) | EventKind::Parameters(StabilityEvent::Unstable) => {
                self.turn_on(bus);
            }
            EventKind::Fan(ActuatorEvent::ManualOff) | EventKind::Parameters(StabilityEvent::Stable) => {
                self.turn_off(bus);
            }
            _ => {}
        }
    }
}

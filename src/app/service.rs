//! Composter core: builds and wires the event-driven control plane.
//!
//! [`ComposterCore`] owns the shared infrastructure (parameter store,
//! event bus, timer service) and the four interlocked controllers.  It
//! decides the subscription order, which is also the delivery order for
//! an event with several subscribers:
//!
//! ```text
//!  ParametersMonitor → Crusher → Lock → Mixer → Fan → CloudLink → EventLogger
//! ```
//!
//! Crusher before Lock means a `Lid.Opened` stops the crusher before the
//! Lock sees the event.  Sensors, buttons and connectivity are not owned
//! here: they only need the bus and the store, and run on their own tasks.

use core::time::Duration;
use std::sync::Arc;

use embedded_hal::digital::OutputPin;
use log::info;

use crate::actuators::{Crusher, Fan, Lock, Mixer};
use crate::adapters::log_sink::EventLogger;
use crate::bus::EventBus;
use crate::cloud::CloudLink;
use crate::config::ComposterConfig;
use crate::error::Error;
use crate::params::ParameterStore;
use crate::sensors::ParametersMonitor;
use crate::timers::{Timer, TimerService};

/// Length of one composting day.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// The four actuator outputs.
pub struct OutputPins<P> {
    pub mixer: P,
    pub crusher: P,
    pub fan: P,
    pub lock: P,
}

pub struct ComposterCore<P> {
    store: Arc<ParameterStore>,
    bus: Arc<EventBus>,
    timers: Arc<TimerService>,
    lock: Arc<Lock<P>>,
    crusher: Arc<Crusher<P>>,
    mixer: Arc<Mixer<P>>,
    fan: Arc<Fan<P>>,
    parameters: Arc<ParametersMonitor>,
    cloud: Arc<CloudLink>,
    days: Timer,
}

impl<P: OutputPin + Send + 'static> ComposterCore<P> {
    pub fn new(pins: OutputPins<P>, store: Arc<ParameterStore>, config: &ComposterConfig) -> Result<Self, Error> {
        let bus = Arc::new(EventBus::new());
        let timers = TimerService::new();

        let lock = Lock::new(pins.lock, store.clone(), config);
        let crusher = Crusher::new(pins.crusher, store.clone(), &bus, &timers, config)?;
        let mixer = Mixer::new(pins.mixer, store.clone(), &bus, &timers, config)?;
        let fan = Fan::new(pins.fan, store.clone(), &bus, &timers, config)?;
        let parameters = ParametersMonitor::new();
        let cloud = CloudLink::new();

        parameters.subscribe(&bus)?;
        crusher.subscribe(&bus)?;
        lock.subscribe(&bus)?;
        mixer.subscribe(&bus)?;
        fan.subscribe(&bus)?;
        cloud.subscribe(&bus)?;
        EventLogger::new().subscribe(&bus)?;

        let days = timers
            .create("days", DAY, true)
            .ok_or(Error::Init("core: no free timer slot"))?;
        let s = store.clone();
        days.on_fire(move || {
            let day = s.increment_days();
            info!("Core: composting day {}", day);
        });

        info!("Core: {} subscriptions wired", bus.subscriber_count());
        Ok(Self {
            store,
            bus,
            timers,
            lock,
            crusher,
            mixer,
            fan,
            parameters,
            cloud,
            days,
        })
    }

    /// Arm the periodic timers (mixing routine, day counter).
    pub fn start(&self) {
        self.mixer.start_routine();
        self.days.start();
        info!("Core: started");
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn timers(&self) -> &Arc<TimerService> {
        &self.timers
    }

    pub fn lock(&self) -> &Arc<Lock<P>> {
        &self.lock
    }

    pub fn crusher(&self) -> &Arc<Crusher<P>> {
        &self.crusher
    }

    pub fn mixer(&self) -> &Arc<Mixer<P>> {
        &self.mixer
    }

    pub fn fan(&self) -> &Arc<Fan<P>> {
        &self.fan
    }

    pub fn parameters(&self) -> &Arc<ParametersMonitor> {
        &self.parameters
    }

    /// Bus-side of the cloud engine; hand `cloud_link().commands()` to the
    /// cloud task.
    pub fn cloud_link(&self) -> &Arc<CloudLink> {
        &self.cloud
    }
}

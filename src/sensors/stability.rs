//! Humidity and temperature stability classifiers.
//!
//! Each reading is compared against its maximum (`value > max` means
//! unstable).  The reading and verdict go into the [`ParameterStore`] on
//! every sample; a `Stable`/`Unstable` event carrying the reading is
//! published only when the verdict changes.
//!
//! ## Polling
//!
//! | Situation                        | Next poll           |
//! |----------------------------------|---------------------|
//! | stable reading                   | `stable_poll`       |
//! | unstable reading                 | `unstable_poll`     |
//! | read failed                      | `sensor_retry`      |
//! | `failure_threshold` consecutive  | reset, `backoff`    |

use core::time::Duration;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::app::ports::SensorPort;
use crate::bus::EventBus;
use crate::config::ComposterConfig;
use crate::drivers::task_pin::{self, Core};
use crate::error::{CommsError, SensorError};
use crate::events::{Event, EventKind, StabilityEvent};
use crate::params::ParameterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Humidity,
    Temperature,
}

impl Quantity {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Humidity => "Humidity",
            Self::Temperature => "Temperature",
        }
    }

    pub const fn event(self, verdict: StabilityEvent) -> EventKind {
        match self {
            Self::Humidity => EventKind::Humidity(verdict),
            Self::Temperature => EventKind::Temperature(verdict),
        }
    }

    fn record(self, store: &ParameterStore, value: f32, stable: bool) {
        match self {
            Self::Humidity => {
                store.set_humidity(value);
                store.set_humidity_stable(stable);
            }
            Self::Temperature => {
                store.set_temperature(value);
                store.set_temperature_stable(stable);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Polling {
    stable: Duration,
    unstable: Duration,
    retry: Duration,
    backoff: Duration,
}

pub struct StabilityClassifier<S> {
    quantity: Quantity,
    sensor: S,
    store: Arc<ParameterStore>,
    max: f32,
    /// Last verdict; `None` until the first good reading.
    stable: Option<bool>,
    failures: u8,
    failure_threshold: u8,
    polling: Polling,
}

impl<S: SensorPort + 'static> StabilityClassifier<S> {
    pub fn new(quantity: Quantity, sensor: S, store: Arc<ParameterStore>, config: &ComposterConfig) -> Self {
        let max = match quantity {
            Quantity::Humidity => config.max_humidity_percent,
            Quantity::Temperature => config.max_temperature_c,
        };
        Self {
            quantity,
            sensor,
            store,
            max,
            stable: None,
            failures: 0,
            failure_threshold: config.sensor_failure_threshold.max(1),
            polling: Polling {
                stable: config.stable_poll(),
                unstable: config.unstable_poll(),
                retry: config.sensor_retry(),
                backoff: config.sensor_backoff(),
            },
        }
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn is_stable(&self) -> Option<bool> {
        self.stable
    }

    pub fn consecutive_failures(&self) -> u8 {
        self.failures
    }

    /// Record one good reading.  Returns the event published, if the
    /// verdict changed.
    pub fn classify(&mut self, value: f32, bus: &EventBus) -> Option<StabilityEvent> {
        let stable = value <= self.max;
        self.quantity.record(&self.store, value, stable);

        if self.stable == Some(stable) {
            debug!("{}: {:.1} (unchanged)", self.quantity.name(), value);
            return None;
        }
        self.stable = Some(stable);
        let verdict = StabilityEvent::from_stable(stable);
        info!("{}: {:.1} -> {:?}", self.quantity.name(), value, verdict);
        bus.publish(Event::with_reading(self.quantity.event(verdict), value));
        Some(verdict)
    }

    /// Read once and classify.  Returns how long to wait before the next
    /// read.
    pub fn step(&mut self, bus: &EventBus) -> Duration {
        match self.sensor.read() {
            Ok(value) => {
                self.failures = 0;
                self.classify(value, bus);
                if self.stable == Some(false) {
                    self.polling.unstable
                } else {
                    self.polling.stable
                }
            }
            Err(e) => self.on_failure(e),
        }
    }

    fn on_failure(&mut self, e: SensorError) -> Duration {
        self.failures = self.failures.saturating_add(1);
        if self.failures < self.failure_threshold {
            warn!(
                "{}: read failed ({}), attempt {}/{}",
                self.quantity.name(),
                e,
                self.failures,
                self.failure_threshold
            );
            return self.polling.retry;
        }

        error!(
            "{}: {} consecutive failures, resetting sensor",
            self.quantity.name(),
            self.failures
        );
        if let Err(e) = self.sensor.reset() {
            error!("{}: reset failed: {}", self.quantity.name(), e);
        }
        self.failures = 0;
        self.polling.backoff
    }

    /// Run the classifier on its own thread.
    pub fn spawn(
        mut self,
        bus: Arc<EventBus>,
        name: &'static str,
    ) -> Result<std::thread::JoinHandle<()>, CommsError> {
        task_pin::spawn_on_core(Core::App, 5, 4, name, move || {
            info!("{}: classifier running (max {:.1})", self.quantity.name(), self.max);
            loop {
                let wait = self.step(&bus);
                std::thread::sleep(wait);
            }
        })
    }
}

//! Fill-level classifier.
//!
//! An ultrasonic sensor in the lid measures the distance down to the
//! compost surface.  The distance maps linearly onto a completion
//! percentage:
//!
//! ```text
//!   distance:  empty_cm (30) ─────────────── full_cm (10)
//!   percent:         0 %     ───────────────     100 %
//! ```
//!
//! The percentage goes into the store on every good sample; the level
//! event is published only when the level changes.  While Full, a timer
//! re-publishes `Capacity/Full` so the lock keeps asking to be emptied.

use core::time::Duration;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::app::ports::SensorPort;
use crate::bus::EventBus;
use crate::config::{CapacityLevels, ComposterConfig, ms};
use crate::drivers::task_pin::{self, Core};
use crate::error::{CommsError, Error, SensorError};
use crate::events::{CapacityEvent, Event, EventKind};
use crate::params::ParameterStore;
use crate::timers::{Timer, TimerService};

/// Echo pulses longer than this are treated as no echo.
pub const MAX_ECHO_US: u32 = 35_000;
/// Round-trip microseconds per centimetre at room temperature.
pub const US_PER_CM: f32 = 58.0;
/// Farthest distance the sensor can report.
pub const MAX_RANGE_CM: f32 = MAX_ECHO_US as f32 / US_PER_CM;

/// Echo pulse width to distance.  `None` when there was no echo.
pub fn distance_from_echo_us(us: u32) -> Option<f32> {
    if us == 0 || us > MAX_ECHO_US {
        return None;
    }
    Some(us as f32 / US_PER_CM)
}

/// Distance to completion percentage, clamped to `[0, 100]`.
pub fn completion_percent(distance_cm: f32, full_cm: f32, empty_cm: f32) -> f32 {
    let span = empty_cm - full_cm;
    if span <= 0.0 {
        return 0.0;
    }
    ((empty_cm - distance_cm) / span * 100.0).clamp(0.0, 100.0)
}

pub struct CapacityClassifier<S> {
    sensor: S,
    store: Arc<ParameterStore>,
    full_cm: f32,
    empty_cm: f32,
    levels: CapacityLevels,
    level: Option<CapacityEvent>,
    reassert: Timer,
    failures: u8,
    failure_threshold: u8,
    poll: Duration,
    retry: Duration,
    backoff: Duration,
}

impl<S: SensorPort + 'static> CapacityClassifier<S> {
    pub fn new(
        sensor: S,
        store: Arc<ParameterStore>,
        bus: &Arc<EventBus>,
        timers: &Arc<TimerService>,
        config: &ComposterConfig,
    ) -> Result<Self, Error> {
        let reassert = timers
            .create("capacity-full", ms(config.full_reassert_ms), true)
            .ok_or(Error::Init("capacity: no free timer slot"))?;
        let b = bus.clone();
        reassert.on_fire(move || {
            info!("Capacity: still full");
            b.publish(EventKind::Capacity(CapacityEvent::Full));
        });

        Ok(Self {
            sensor,
            store,
            full_cm: config.full_distance_cm,
            empty_cm: config.empty_distance_cm,
            levels: config.capacity_levels,
            level: None,
            reassert,
            failures: 0,
            failure_threshold: config.sensor_failure_threshold.max(1),
            poll: ms(config.capacity_poll_ms),
            retry: config.sensor_retry(),
            backoff: config.sensor_backoff(),
        })
    }

    pub fn level(&self) -> Option<CapacityEvent> {
        self.level
    }

    pub fn is_reasserting(&self) -> bool {
        self.reassert.is_running()
    }

    fn classify_level(&self, distance_cm: f32) -> CapacityEvent {
        if distance_cm <= self.full_cm {
            return CapacityEvent::Full;
        }
        match self.levels {
            CapacityLevels::Two => CapacityEvent::NotFull,
            CapacityLevels::Three if distance_cm >= self.empty_cm => CapacityEvent::Empty,
            CapacityLevels::Three => CapacityEvent::Partial,
        }
    }

    /// Record one distance sample.  Returns the level published, if it
    /// changed.
    pub fn classify(&mut self, distance_cm: f32, bus: &EventBus) -> Option<CapacityEvent> {
        let percent = completion_percent(distance_cm, self.full_cm, self.empty_cm);
        self.store.set_completion(percent);

        let level = self.classify_level(distance_cm);
        if self.level == Some(level) {
            debug!("Capacity: {:.1} cm, {:.0} % (unchanged)", distance_cm, percent);
            return None;
        }
        self.level = Some(level);
        if level == CapacityEvent::Full {
            self.reassert.start();
        } else {
            self.reassert.stop();
        }
        info!("Capacity: {:.1} cm, {:.0} % -> {:?}", distance_cm, percent, level);
        bus.publish(Event::with_reading(EventKind::Capacity(level), percent));
        Some(level)
    }

    pub fn step(&mut self, bus: &EventBus) -> Duration {
        let sample = self.sensor.read().and_then(|d| {
            if d.is_nan() || d < 0.0 || d > MAX_RANGE_CM {
                Err(SensorError::OutOfRange)
            } else {
                Ok(d)
            }
        });

        match sample {
            Ok(d) => {
                self.failures = 0;
                self.classify(d, bus);
                self.poll
            }
            Err(e) => {
                self.failures = self.failures.saturating_add(1);
                if self.failures < self.failure_threshold {
                    warn!("Capacity: sample rejected ({})", e);
                    return self.retry;
                }
                error!("Capacity: {} consecutive failures, resetting sensor", self.failures);
                if let Err(e) = self.sensor.reset() {
                    error!("Capacity: reset failed: {}", e);
                }
                self.failures = 0;
                self.backoff
            }
        }
    }

    pub fn spawn(mut self, bus: Arc<EventBus>) -> Result<std::thread::JoinHandle<()>, CommsError> {
        task_pin::spawn_on_core(Core::App, 5, 4, "capacity\0", move || {
            info!(
                "Capacity: classifier running (full {:.0} cm, empty {:.0} cm)",
                self.full_cm, self.empty_cm
            );
            loop {
                let wait = self.step(&bus);
                std::thread::sleep(wait);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Recorder;
    use std::collections::VecDeque;

    struct Distances(VecDeque<f32>);

    impl SensorPort for Distances {
        fn read(&mut self) -> Result<f32, SensorError> {
            self.0.pop_front().ok_or(SensorError::NotReady)
        }
    }

    fn setup(levels: CapacityLevels, samples: &[f32]) -> (CapacityClassifier<Distances>, Arc<EventBus>, Arc<TimerService>, Arc<ParameterStore>) {
        let bus = Arc::new(EventBus::new());
        let timers = TimerService::new();
        let store = Arc::new(ParameterStore::new());
        let config = ComposterConfig {
            capacity_levels: levels,
            ..Default::default()
        };
        let c = CapacityClassifier::new(
            Distances(samples.iter().copied().collect()),
            store.clone(),
            &bus,
            &timers,
            &config,
        )
        .unwrap();
        (c, bus, timers, store)
    }

    #[test]
    fn percent_mapping() {
        assert_eq!(completion_percent(30.0, 10.0, 30.0), 0.0);
        assert_eq!(completion_percent(20.0, 10.0, 30.0), 50.0);
        assert_eq!(completion_percent(10.0, 10.0, 30.0), 100.0);
        assert_eq!(completion_percent(5.0, 10.0, 30.0), 100.0);
        assert_eq!(completion_percent(80.0, 10.0, 30.0), 0.0);
    }

    #[test]
    fn echo_conversion() {
        assert_eq!(distance_from_echo_us(580), Some(10.0));
        assert_eq!(distance_from_echo_us(0), None);
        assert_eq!(distance_from_echo_us(35_001), None);
    }

    #[test]
    fn two_level_edges() {
        let (mut c, bus, _timers, store) = setup(CapacityLevels::Two, &[25.0, 20.0, 9.0, 8.0, 15.0]);
        let rec = Recorder::attach(&bus);
        for _ in 0..5 {
            c.step(&bus);
        }
        assert_eq!(
            rec.kinds(),
            vec![
                EventKind::Capacity(CapacityEvent::NotFull),
                EventKind::Capacity(CapacityEvent::Full),
                EventKind::Capacity(CapacityEvent::NotFull),
            ]
        );
        assert!((store.get_completion() - 75.0).abs() < 0.01);
    }

    #[test]
    fn three_levels() {
        let (mut c, bus, _timers, _store) = setup(CapacityLevels::Three, &[]);
        assert_eq!(c.classify(35.0, &bus), Some(CapacityEvent::Empty));
        assert_eq!(c.classify(20.0, &bus), Some(CapacityEvent::Partial));
        assert_eq!(c.classify(10.0, &bus), Some(CapacityEvent::Full));
    }

    #[test]
    fn full_is_reasserted_until_it_clears() {
        let (mut c, bus, timers, _store) = setup(CapacityLevels::Two, &[]);
        let rec = Recorder::attach(&bus);
        c.classify(5.0, &bus);
        assert!(c.is_reasserting());
        timers.tick(Duration::from_secs(30 * 60));
        timers.tick(Duration::from_secs(30 * 60));
        assert_eq!(rec.count(EventKind::Capacity(CapacityEvent::Full)), 3);

        c.classify(25.0, &bus);
        assert!(!c.is_reasserting());
        timers.tick(Duration::from_secs(30 * 60));
        assert_eq!(rec.count(EventKind::Capacity(CapacityEvent::Full)), 3);
    }

    #[test]
    fn implausible_samples_are_failures() {
        let (mut c, bus, _timers, store) = setup(CapacityLevels::Two, &[f32::NAN, -1.0, 900.0]);
        let rec = Recorder::attach(&bus);
        let cfg = ComposterConfig::default();
        for _ in 0..3 {
            assert_eq!(c.step(&bus), cfg.sensor_retry());
        }
        assert!(rec.kinds().is_empty());
        assert_eq!(store.get_completion(), 0.0);
    }
}

//! Sensor classifiers, lid monitor and buttons driving the wired core.

use std::time::Duration;

use autocompost::config::{CapacityLevels, ComposterConfig};
use autocompost::drivers::button::ButtonPanel;
use autocompost::error::SensorError;
use autocompost::events::{ActuatorEvent, CapacityEvent, EventKind, LidEvent, StabilityEvent, Topic};
use autocompost::actuators::Actuator;
use autocompost::sensors::{CapacityClassifier, LidMonitor, Quantity, StabilityClassifier};

use crate::mock_hw::{LevelPin, Rig, ScriptedSensor};

fn classifier(rig: &Rig, quantity: Quantity, sensor: &ScriptedSensor) -> StabilityClassifier<ScriptedSensor> {
    StabilityClassifier::new(
        quantity,
        sensor.clone(),
        rig.core.store().clone(),
        &ComposterConfig::default(),
    )
}

fn topic_events(rig: &Rig, topic: Topic) -> Vec<EventKind> {
    rig.recorder
        .kinds()
        .into_iter()
        .filter(|k| k.topic() == topic)
        .collect()
}

#[test]
fn humidity_events_only_on_verdict_change() {
    let rig = Rig::new();
    let sensor = ScriptedSensor::default();
    let mut humidity = classifier(&rig, Quantity::Humidity, &sensor);

    sensor.push_values(&[50.0, 55.0, 70.0, 72.0, 61.0, 40.0, 45.0]);
    for _ in 0..7 {
        humidity.step(rig.bus());
    }

    assert_eq!(
        topic_events(&rig, Topic::Humidity),
        vec![
            EventKind::Humidity(StabilityEvent::Stable),
            EventKind::Humidity(StabilityEvent::Unstable),
            EventKind::Humidity(StabilityEvent::Stable),
        ]
    );
    assert!((rig.store().get_humidity() - 45.0).abs() < f32::EPSILON);
    assert!(rig.store().get_humidity_stable());
}

#[test]
fn unstable_pile_runs_fan_and_mixer_until_stable() {
    let rig = Rig::new();
    let hs = ScriptedSensor::default();
    let ts = ScriptedSensor::default();
    let mut humidity = classifier(&rig, Quantity::Humidity, &hs);
    let mut temperature = classifier(&rig, Quantity::Temperature, &ts);

    hs.push(Ok(40.0));
    ts.push(Ok(25.0));
    humidity.step(rig.bus());
    temperature.step(rig.bus());
    assert_eq!(
        topic_events(&rig, Topic::Parameters),
        vec![EventKind::Parameters(StabilityEvent::Stable)]
    );
    assert!(!rig.store().get_fan_on());

    ts.push(Ok(35.0));
    temperature.step(rig.bus());
    assert!(rig.store().get_fan_on());
    assert!(rig.store().get_mixer_on());

    // Humidity going unstable too is not a new Parameters edge.
    hs.push(Ok(80.0));
    humidity.step(rig.bus());
    assert_eq!(topic_events(&rig, Topic::Parameters).len(), 2);

    hs.push(Ok(50.0));
    ts.push(Ok(28.0));
    humidity.step(rig.bus());
    temperature.step(rig.bus());
    assert!(!rig.store().get_fan_on());
    assert!(!rig.store().get_mixer_on());
    assert_eq!(
        topic_events(&rig, Topic::Parameters).last(),
        Some(&EventKind::Parameters(StabilityEvent::Stable))
    );
}

#[test]
fn unstable_poll_is_faster() {
    let rig = Rig::new();
    let config = ComposterConfig::default();
    let sensor = ScriptedSensor::default();
    let mut temperature = classifier(&rig, Quantity::Temperature, &sensor);

    sensor.push_values(&[20.0, 40.0]);
    assert_eq!(temperature.step(rig.bus()), config.stable_poll());
    assert_eq!(temperature.step(rig.bus()), config.unstable_poll());
}

#[test]
fn failing_sensor_is_reset_and_backed_off() {
    let rig = Rig::new();
    let config = ComposterConfig::default();
    let sensor = ScriptedSensor::default();
    let mut humidity = classifier(&rig, Quantity::Humidity, &sensor);

    for _ in 0..config.sensor_failure_threshold - 1 {
        sensor.push(Err(SensorError::ReadFailed));
        assert_eq!(humidity.step(rig.bus()), config.sensor_retry());
    }
    assert_eq!(sensor.resets(), 0);

    sensor.push(Err(SensorError::ReadFailed));
    assert_eq!(humidity.step(rig.bus()), config.sensor_backoff());
    assert_eq!(sensor.resets(), 1);
    assert_eq!(humidity.consecutive_failures(), 0);
    assert!(topic_events(&rig, Topic::Humidity).is_empty());
}

#[test]
fn three_level_capacity() {
    let config = ComposterConfig {
        capacity_levels: CapacityLevels::Three,
        ..Default::default()
    };
    let rig = Rig::with_config(&config);
    let sensor = ScriptedSensor::default();
    let mut capacity = CapacityClassifier::new(
        sensor.clone(),
        rig.core.store().clone(),
        rig.bus(),
        rig.core.timers(),
        &config,
    )
    .unwrap();

    sensor.push_values(&[35.0, 20.0, 9.0, 20.0]);
    for _ in 0..4 {
        capacity.step(rig.bus());
    }
    assert_eq!(
        topic_events(&rig, Topic::Capacity),
        vec![
            EventKind::Capacity(CapacityEvent::Empty),
            EventKind::Capacity(CapacityEvent::Partial),
            EventKind::Capacity(CapacityEvent::Full),
            EventKind::Capacity(CapacityEvent::Partial),
        ]
    );
    assert!((rig.store().get_completion() - 50.0).abs() < 0.01);
    assert!(!rig.store().get_locked());
}

#[test]
fn implausible_distances_are_skipped() {
    let rig = Rig::new();
    let sensor = ScriptedSensor::default();
    let config = ComposterConfig::default();
    let mut capacity = CapacityClassifier::new(
        sensor.clone(),
        rig.core.store().clone(),
        rig.bus(),
        rig.core.timers(),
        &config,
    )
    .unwrap();

    sensor.push_values(&[f32::NAN, -3.0, 9_999.0]);
    for _ in 0..3 {
        assert_eq!(capacity.step(rig.bus()), config.sensor_retry());
    }
    assert!(topic_events(&rig, Topic::Capacity).is_empty());
    assert_eq!(rig.store().get_completion(), 0.0);
}

#[test]
fn lid_switch_edges_reach_the_lock() {
    let rig = Rig::new();
    let pin = LevelPin::default();
    let mut lid = LidMonitor::new(pin.clone(), true, rig.core.store().clone());

    rig.publish(EventKind::Capacity(CapacityEvent::Full));
    assert!(rig.store().get_locked());

    assert_eq!(lid.poll(rig.bus()), None);
    pin.set(true);
    assert_eq!(lid.poll(rig.bus()), Some(LidEvent::Opened));
    assert_eq!(lid.poll(rig.bus()), None);
    assert!(rig.store().get_lid_open());
    assert!(!rig.store().get_locked());

    pin.set(false);
    assert_eq!(lid.poll(rig.bus()), Some(LidEvent::Closed));
    assert!(!rig.store().get_lid_open());
}

#[test]
fn buttons_request_on_and_off() {
    let rig = Rig::new();
    let mixer = LevelPin::default();
    mixer.set(true);
    let mut panel = ButtonPanel::new().with(mixer.clone(), Actuator::Mixer);

    // Short press.
    mixer.set(false);
    panel.poll(0, rig.bus());
    panel.poll(60, rig.bus());
    mixer.set(true);
    panel.poll(200, rig.bus());
    assert!(rig.store().get_mixer_on());

    // Long hold.
    mixer.set(false);
    panel.poll(1_000, rig.bus());
    panel.poll(1_060, rig.bus());
    panel.poll(3_100, rig.bus());
    assert!(!rig.store().get_mixer_on());
    mixer.set(true);
    panel.poll(3_200, rig.bus());

    assert_eq!(rig.recorder.count(EventKind::Mixer(ActuatorEvent::ManualOn)), 1);
    assert_eq!(rig.recorder.count(EventKind::Mixer(ActuatorEvent::ManualOff)), 1);
}

#[test]
fn mixer_routine_runs_periodically() {
    let config = ComposterConfig::default();
    let rig = Rig::with_config(&config);
    rig.core.start();

    rig.core
        .timers()
        .tick(Duration::from_millis(config.mixer_routine_ms as u64));
    assert!(rig.store().get_mixer_on());

    // Parameters never reported stable: the run cap stops it.
    let check = Duration::from_millis(config.mixer_check_ms as u64);
    for _ in 0..(config.mixer_max_run_ms / config.mixer_check_ms) {
        rig.core.timers().tick(check);
    }
    assert!(!rig.store().get_mixer_on());
}

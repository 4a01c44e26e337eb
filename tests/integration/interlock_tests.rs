//! Interlock scenarios run against the fully wired core.

use std::time::Duration;

use autocompost::actuators::Transition;
use autocompost::config::ComposterConfig;
use autocompost::events::{ActuatorEvent, CapacityEvent, EventKind, LidEvent, LockEvent};
use autocompost::safety::Interlock;
use autocompost::sensors::CapacityClassifier;

use crate::mock_hw::{Rig, ScriptedSensor};

fn capacity(rig: &Rig, sensor: &ScriptedSensor) -> CapacityClassifier<ScriptedSensor> {
    CapacityClassifier::new(
        sensor.clone(),
        rig.core.store().clone(),
        rig.bus(),
        rig.core.timers(),
        &ComposterConfig::default(),
    )
    .unwrap()
}

#[test]
fn full_bin_locks_and_crusher_waits_for_manual_on() {
    let rig = Rig::new();
    let sensor = ScriptedSensor::default();
    let mut classifier = capacity(&rig, &sensor);

    sensor.push(Ok(8.0));
    classifier.step(rig.bus());

    assert!(rig.store().get_locked());
    assert_eq!(rig.recorder.count(EventKind::Capacity(CapacityEvent::Full)), 1);
    assert_eq!(rig.recorder.count(EventKind::Lock(LockEvent::On)), 1);
    assert!(!rig.store().get_crusher_on(), "locking alone never starts the crusher");

    rig.publish(EventKind::Crusher(ActuatorEvent::ManualOn));
    assert!(rig.store().get_crusher_on());
    assert!(rig.pins.crusher.level());
}

#[test]
fn full_bin_with_open_lid_asks_to_close_it() {
    let rig = Rig::new();
    rig.store().set_lid_open(true);
    rig.publish(EventKind::Capacity(CapacityEvent::Full));

    assert!(!rig.store().get_locked());
    assert_eq!(rig.recorder.count(EventKind::Lock(LockEvent::RequestCloseLid)), 1);
    assert!(rig.pins.lock.writes().is_empty());
}

#[test]
fn lid_open_while_crushing_stops_then_unlocks() {
    let rig = Rig::new();
    rig.publish(EventKind::Crusher(ActuatorEvent::ManualOn));
    assert!(rig.store().get_crusher_on());
    assert!(rig.store().get_locked());
    rig.wiring.lock().unwrap().clear();

    rig.store().set_lid_open(true);
    rig.publish(EventKind::Lid(LidEvent::Opened));

    assert!(!rig.store().get_crusher_on());
    assert!(!rig.store().get_locked());
    let wiring = rig.wiring();
    let crusher_off = wiring.iter().position(|w| *w == ("crusher", false)).unwrap();
    let unlocked = wiring.iter().position(|w| *w == ("lock", false)).unwrap();
    assert!(crusher_off < unlocked, "crusher must stop before the latch releases: {:?}", wiring);
}

#[test]
fn lid_open_force_unlocks_a_full_bin() {
    let rig = Rig::new();
    rig.store().set_completion(100.0);
    rig.publish(EventKind::Capacity(CapacityEvent::Full));
    assert!(rig.store().get_locked());

    rig.store().set_lid_open(true);
    rig.publish(EventKind::Lid(LidEvent::Opened));
    assert!(!rig.store().get_locked());
}

#[test]
fn unlock_refused_while_full() {
    let rig = Rig::new();
    rig.store().set_completion(95.0);
    rig.publish(EventKind::Capacity(CapacityEvent::Full));
    rig.recorder.clear();

    assert_eq!(rig.core.lock().unlock(rig.bus()), Transition::Declined(Interlock::ComposterFull));
    assert!(rig.store().get_locked());
    assert_eq!(
        rig.recorder.kinds(),
        vec![EventKind::Lock(LockEvent::RequestEmptyComposter)]
    );
}

#[test]
fn crusher_stop_on_full_bin_keeps_lid_locked() {
    let rig = Rig::new();
    rig.store().set_completion(95.0);
    rig.publish(EventKind::Crusher(ActuatorEvent::ManualOn));
    assert!(rig.store().get_crusher_on());

    rig.publish(EventKind::Crusher(ActuatorEvent::ManualOff));
    assert!(!rig.store().get_crusher_on());
    assert!(rig.store().get_locked());
    assert_eq!(rig.recorder.count(EventKind::Lock(LockEvent::RequestEmptyComposter)), 1);
}

#[test]
fn crusher_stop_unlocks_when_room_left() {
    let rig = Rig::new();
    rig.store().set_completion(20.0);
    rig.publish(EventKind::Crusher(ActuatorEvent::ManualOn));
    rig.publish(EventKind::Crusher(ActuatorEvent::ManualOff));
    assert!(!rig.store().get_locked());
}

#[test]
fn repeated_on_requests_write_once() {
    let rig = Rig::new();
    for _ in 0..3 {
        rig.publish(EventKind::Fan(ActuatorEvent::ManualOn));
    }
    assert_eq!(rig.pins.fan.writes(), vec![true]);
    assert_eq!(rig.recorder.count(EventKind::Fan(ActuatorEvent::On)), 1);

    assert_eq!(rig.core.fan().turn_on(rig.bus()), Transition::Unchanged);
    assert_eq!(rig.pins.fan.writes(), vec![true]);
}

#[test]
fn crusher_safety_timer_stops_it() {
    let config = ComposterConfig::default();
    let rig = Rig::with_config(&config);
    rig.publish(EventKind::Crusher(ActuatorEvent::ManualOn));
    assert!(rig.store().get_crusher_on());

    rig.core.timers().tick(Duration::from_millis(config.crusher_safety_ms as u64));
    assert!(!rig.store().get_crusher_on());
    assert!(!rig.pins.crusher.level());
}

#[test]
fn full_is_reasserted_while_bin_stays_full() {
    let config = ComposterConfig::default();
    let rig = Rig::with_config(&config);
    let sensor = ScriptedSensor::default();
    let mut classifier = capacity(&rig, &sensor);

    sensor.push(Ok(5.0));
    classifier.step(rig.bus());
    assert!(classifier.is_reasserting());

    let reassert = Duration::from_millis(config.full_reassert_ms as u64);
    rig.core.timers().tick(reassert);
    rig.core.timers().tick(reassert);
    assert_eq!(rig.recorder.count(EventKind::Capacity(CapacityEvent::Full)), 3);

    sensor.push(Ok(25.0));
    classifier.step(rig.bus());
    assert!(!classifier.is_reasserting());
    assert_eq!(rig.recorder.count(EventKind::Capacity(CapacityEvent::NotFull)), 1);
}

#[test]
fn closed_lid_request_cancels_pending_crush() {
    let rig = Rig::new();
    rig.store().set_lid_open(true);
    rig.publish(EventKind::Crusher(ActuatorEvent::ManualOn));

    assert!(!rig.store().get_crusher_on());
    assert!(!rig.core.crusher().is_pending());
    assert_eq!(rig.recorder.count(EventKind::Lock(LockEvent::RequestCloseLid)), 1);

    // Closing the lid later does not start the crusher on its own.
    rig.store().set_lid_open(false);
    rig.publish(EventKind::Lid(LidEvent::Closed));
    rig.publish(EventKind::Capacity(CapacityEvent::Full));
    assert!(rig.store().get_locked());
    assert!(!rig.store().get_crusher_on());
}

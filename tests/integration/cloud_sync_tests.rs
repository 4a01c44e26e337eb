//! Cloud engine against a fake database, fed from the core's bus.

use std::time::Duration;

use autocompost::actuators::Actuator;
use autocompost::app::ports::Method;
use autocompost::cloud::link::SyncQueue;
use autocompost::cloud::tasks::apply;
use autocompost::cloud::{CloudClient, CloudSync, ComposterDocument, SessionState};
use autocompost::events::{ActuatorEvent, ConnectivityEvent, EventKind, Topic};

use crate::mock_hw::{FakeCloud, Rig};

const REAUTH: Duration = Duration::from_secs(30);

struct Harness {
    rig: Rig,
    cloud: FakeCloud,
    sync: CloudSync<FakeCloud>,
    queue: std::sync::Arc<SyncQueue>,
}

impl Harness {
    fn new() -> Self {
        let rig = Rig::new();
        let cloud = FakeCloud::new();
        let client = CloudClient::new(cloud.clone(), FakeCloud::config());
        let sync = CloudSync::new(client, rig.core.store().clone(), REAUTH);
        let queue = rig.core.cloud_link().commands();
        Self {
            rig,
            cloud,
            sync,
            queue,
        }
    }

    /// What the cloud task's command loop would do.
    fn drain(&mut self, now: Duration) {
        while let Ok(command) = self.queue.try_receive() {
            apply(&mut self.sync, command, now);
        }
    }

    fn connect(&mut self) {
        self.rig.publish(EventKind::Connectivity(ConnectivityEvent::On));
        self.drain(Duration::ZERO);
        assert_eq!(self.sync.state(), SessionState::Active);
    }
}

#[test]
fn local_mixer_on_patches_only_mixer() {
    let mut h = Harness::new();
    h.connect();
    h.cloud.set_document(ComposterDocument {
        days: 3,
        humidity: 55.0,
        ..Default::default()
    });
    h.cloud.clear_requests();

    h.rig.publish(EventKind::Mixer(ActuatorEvent::ManualOn));
    assert!(h.rig.store().get_mixer_on());
    h.drain(Duration::from_secs(1));

    let patches = h.cloud.data_requests(Method::Patch);
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].body, r#"{"mixer":true}"#);
    let doc = h.cloud.document().unwrap();
    assert!(doc.mixer);
    assert_eq!(doc.days, 3);
    assert!((doc.humidity - 55.0).abs() < 0.01);
}

#[test]
fn remote_flip_to_true_turns_actuator_on_once() {
    let mut h = Harness::new();
    h.connect();

    h.cloud.set_document(ComposterDocument {
        fan: true,
        ..Default::default()
    });
    assert_eq!(h.sync.poll_overrides(h.rig.bus()), Ok(1));
    assert!(h.rig.store().get_fan_on());
    assert_eq!(h.rig.recorder.count(EventKind::Fan(ActuatorEvent::ManualOn)), 1);

    // The Fan On write-back agrees with the remote value: nothing more.
    h.drain(Duration::from_secs(1));
    assert_eq!(h.sync.poll_overrides(h.rig.bus()), Ok(0));
    assert_eq!(h.rig.recorder.count(EventKind::Fan(ActuatorEvent::ManualOn)), 1);
}

#[test]
fn remote_request_waiting_at_sign_in_is_honoured() {
    let mut h = Harness::new();
    h.cloud.set_document(ComposterDocument {
        mixer: true,
        ..Default::default()
    });
    assert!(!h.rig.store().get_mixer_on());

    h.connect();
    assert_eq!(h.sync.poll_overrides(h.rig.bus()), Ok(1));
    assert!(h.rig.store().get_mixer_on());
    assert_eq!(h.rig.recorder.count(EventKind::Mixer(ActuatorEvent::ManualOn)), 1);

    h.drain(Duration::from_secs(1));
    assert_eq!(h.sync.poll_overrides(h.rig.bus()), Ok(0));
    assert_eq!(h.rig.recorder.count(EventKind::Mixer(ActuatorEvent::ManualOn)), 1);
}

#[test]
fn agreeing_document_produces_no_events() {
    let mut h = Harness::new();
    h.connect();
    h.rig.recorder.clear();

    assert_eq!(h.sync.poll_overrides(h.rig.bus()), Ok(0));
    assert!(
        h.rig
            .recorder
            .kinds()
            .iter()
            .all(|k| !matches!(k.topic(), Topic::Mixer | Topic::Crusher | Topic::Fan))
    );
}

#[test]
fn remote_crusher_request_goes_through_the_lock() {
    let mut h = Harness::new();
    h.connect();

    h.cloud.set_document(ComposterDocument {
        crusher: true,
        ..Default::default()
    });
    h.sync.poll_overrides(h.rig.bus()).unwrap();
    assert!(h.rig.store().get_locked());
    assert!(h.rig.store().get_crusher_on());

    h.drain(Duration::from_secs(1));
    let doc = h.cloud.document().unwrap();
    assert!(doc.crusher);
    assert!(doc.mixer, "the mixer runs with the crusher and is mirrored too");
    assert_eq!(h.sync.poll_overrides(h.rig.bus()), Ok(0));
    assert_eq!(h.rig.recorder.count(EventKind::Crusher(ActuatorEvent::On)), 1);
}

#[test]
fn push_carries_days_and_readings() {
    let mut h = Harness::new();
    h.connect();
    h.rig.store().set_humidity(48.5);
    h.rig.store().set_temperature(26.0);
    h.rig.store().set_completion(37.0);
    h.rig.core.start();
    h.rig.core.timers().tick(autocompost::app::service::DAY);

    h.sync.push_readings().unwrap();
    let doc = h.cloud.document().unwrap();
    assert_eq!(doc.days, 1);
    assert!((doc.temperature - 26.0).abs() < 0.01);
    assert!((doc.complete - 37.0).abs() < 0.01);
}

#[test]
fn rejected_token_is_refreshed_once() {
    let mut h = Harness::new();
    h.connect();
    h.cloud.clear_requests();

    h.cloud.fail_next(1, 401);
    h.rig.publish(EventKind::Fan(ActuatorEvent::ManualOn));
    h.drain(Duration::from_secs(1));

    assert!(h.cloud.document().unwrap().fan);
    let token_calls = h.cloud.requests().iter().filter(|r| r.url.contains("/token?")).count();
    assert_eq!(token_calls, 1);
    assert!(h.sync.is_active());
}

#[test]
fn local_control_continues_while_degraded() {
    let mut h = Harness::new();
    h.cloud.reject_sign_in(true);
    h.rig.publish(EventKind::Connectivity(ConnectivityEvent::On));
    h.drain(Duration::ZERO);
    assert_eq!(h.sync.state(), SessionState::Degraded);

    h.rig.publish(EventKind::Mixer(ActuatorEvent::ManualOn));
    assert!(h.rig.store().get_mixer_on());
    h.drain(Duration::from_secs(1));
    assert!(h.cloud.data_requests(Method::Patch).is_empty());

    h.cloud.reject_sign_in(false);
    assert!(h.sync.ensure_session(REAUTH));
    assert_eq!(h.sync.state(), SessionState::Active);
}

#[test]
fn connectivity_loss_pauses_sync() {
    let mut h = Harness::new();
    h.connect();
    h.rig.publish(EventKind::Connectivity(ConnectivityEvent::Off));
    h.drain(Duration::from_secs(1));
    assert_eq!(h.sync.state(), SessionState::Disconnected);

    h.cloud.clear_requests();
    h.rig.publish(EventKind::Crusher(ActuatorEvent::ManualOn));
    h.drain(Duration::from_secs(2));
    assert!(h.cloud.requests().is_empty());
    assert!(h.sync.last_known(Actuator::Crusher));
}

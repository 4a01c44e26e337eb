//! Mock hardware for integration tests.
//!
//! Output pins share one wiring log so tests can assert on the order in
//! which physical outputs moved, across all actuators.  Sensors replay a
//! script.  `FakeCloud` stands in for the auth endpoints and the
//! realtime database.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};

use autocompost::app::ports::{HttpResponse, HttpTransport, Method, SensorPort};
use autocompost::app::{ComposterCore, OutputPins};
use autocompost::bus::{EventBus, EventHandler};
use autocompost::cloud::ComposterDocument;
use autocompost::config::{CloudConfig, ComposterConfig};
use autocompost::error::{SensorError, TransportError};
use autocompost::events::{Event, EventKind, Topic};
use autocompost::params::ParameterStore;

// ── Output pins ───────────────────────────────────────────────

pub type WiringLog = Arc<Mutex<Vec<(&'static str, bool)>>>;

#[derive(Clone)]
pub struct RecordingPin {
    name: &'static str,
    log: WiringLog,
}

impl RecordingPin {
    pub fn new(name: &'static str, log: &WiringLog) -> Self {
        Self {
            name,
            log: log.clone(),
        }
    }

    /// Writes to this pin, in order.
    pub fn writes(&self) -> Vec<bool> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| *n == self.name)
            .map(|(_, level)| *level)
            .collect()
    }

    pub fn level(&self) -> bool {
        self.writes().last().copied().unwrap_or(false)
    }
}

impl ErrorType for RecordingPin {
    type Error = ErrorKind;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.log.lock().unwrap().push((self.name, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.log.lock().unwrap().push((self.name, true));
        Ok(())
    }
}

// ── Input pins ────────────────────────────────────────────────

/// Input whose level the test sets.
#[derive(Clone, Default)]
pub struct LevelPin {
    high: Arc<AtomicBool>,
}

impl LevelPin {
    pub fn set(&self, high: bool) {
        self.high.store(high, Ordering::SeqCst);
    }
}

impl ErrorType for LevelPin {
    type Error = ErrorKind;
}

impl InputPin for LevelPin {
    fn is_high(&mut self) -> Result<bool, ErrorKind> {
        Ok(self.high.load(Ordering::SeqCst))
    }

    fn is_low(&mut self) -> Result<bool, ErrorKind> {
        Ok(!self.high.load(Ordering::SeqCst))
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// Replays queued readings; an empty script reads as `NotReady`.
#[derive(Clone, Default)]
pub struct ScriptedSensor {
    script: Arc<Mutex<VecDeque<Result<f32, SensorError>>>>,
    resets: Arc<Mutex<u32>>,
}

impl ScriptedSensor {
    pub fn push(&self, reading: Result<f32, SensorError>) {
        self.script.lock().unwrap().push_back(reading);
    }

    pub fn push_values(&self, values: &[f32]) {
        for v in values {
            self.push(Ok(*v));
        }
    }

    pub fn resets(&self) -> u32 {
        *self.resets.lock().unwrap()
    }
}

impl SensorPort for ScriptedSensor {
    fn read(&mut self) -> Result<f32, SensorError> {
        self.script.lock().unwrap().pop_front().unwrap_or(Err(SensorError::NotReady))
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        *self.resets.lock().unwrap() += 1;
        Ok(())
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn attach(bus: &EventBus) -> Arc<Self> {
        let rec = Arc::new(Self::default());
        for topic in Topic::ALL {
            bus.subscribe(topic, rec.clone()).unwrap();
        }
        rec
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.seen.lock().unwrap().iter().map(|e| e.kind).collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().iter().filter(|k| **k == kind).count()
    }

    pub fn clear(&self) {
        self.seen.lock().unwrap().clear();
    }
}

impl EventHandler for Recorder {
    fn handle(&self, event: &Event, _bus: &EventBus) {
        self.seen.lock().unwrap().push(event.clone());
    }
}

// ── Assembled composter ───────────────────────────────────────

pub struct Rig {
    pub core: ComposterCore<RecordingPin>,
    pub pins: OutputPins<RecordingPin>,
    pub wiring: WiringLog,
    pub recorder: Arc<Recorder>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(&ComposterConfig::default())
    }

    pub fn with_config(config: &ComposterConfig) -> Self {
        let wiring: WiringLog = Arc::default();
        let pins = OutputPins {
            mixer: RecordingPin::new("mixer", &wiring),
            crusher: RecordingPin::new("crusher", &wiring),
            fan: RecordingPin::new("fan", &wiring),
            lock: RecordingPin::new("lock", &wiring),
        };
        let probes = OutputPins {
            mixer: pins.mixer.clone(),
            crusher: pins.crusher.clone(),
            fan: pins.fan.clone(),
            lock: pins.lock.clone(),
        };
        let core = ComposterCore::new(pins, Arc::new(ParameterStore::new()), config).unwrap();
        // Drop the initial "drive low" writes made at construction.
        wiring.lock().unwrap().clear();
        let recorder = Recorder::attach(core.bus());
        Self {
            core,
            pins: probes,
            wiring,
            recorder,
        }
    }

    pub fn store(&self) -> &ParameterStore {
        self.core.store()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        self.core.bus()
    }

    pub fn publish(&self, kind: EventKind) {
        self.core.bus().publish(kind);
    }

    /// Physical writes, in order, since construction.
    pub fn wiring(&self) -> Vec<(&'static str, bool)> {
        self.wiring.lock().unwrap().clone()
    }
}

// ── Fake cloud ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub url: String,
    pub body: String,
}

#[derive(Default)]
struct CloudState {
    document: Option<ComposterDocument>,
    requests: Vec<SeenRequest>,
    refreshes: u32,
    reject_sign_in: bool,
    fail_budget: u32,
    fail_status: u16,
}

#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config() -> CloudConfig {
        CloudConfig {
            api_key: "it-key".into(),
            database_url: "https://rtdb.example.com".into(),
            composter_id: "000002".into(),
            sign_in_url: "https://auth.example.com/v1/accounts:signInWithPassword".into(),
            token_url: "https://token.example.com/v1/token".into(),
            user_email: "ops@example.com".into(),
            user_password: "pw".into(),
        }
    }

    pub fn document(&self) -> Option<ComposterDocument> {
        self.state.lock().unwrap().document
    }

    pub fn set_document(&self, doc: ComposterDocument) {
        self.state.lock().unwrap().document = Some(doc);
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn data_requests(&self, method: Method) -> Vec<SeenRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url.contains(".json"))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn reject_sign_in(&self, reject: bool) {
        self.state.lock().unwrap().reject_sign_in = reject;
    }

    pub fn fail_next(&self, n: u32, status: u16) {
        let mut s = self.state.lock().unwrap();
        s.fail_budget = n;
        s.fail_status = status;
    }
}

fn reply(status: u16, body: impl Into<Vec<u8>>) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status,
        body: body.into(),
    })
}

impl HttpTransport for FakeCloud {
    fn request(&mut self, method: Method, url: &str, body: Option<&[u8]>) -> Result<HttpResponse, TransportError> {
        let mut s = self.state.lock().unwrap();
        let raw = body.unwrap_or_default();
        s.requests.push(SeenRequest {
            method,
            url: url.into(),
            body: String::from_utf8_lossy(raw).into_owned(),
        });

        if url.contains("signInWithPassword") {
            if s.reject_sign_in {
                return reply(400, r#"{"error":{"message":"INVALID_PASSWORD"}}"#);
            }
            return reply(200, r#"{"refreshToken":"refresh-1"}"#);
        }
        if url.contains("/token?") {
            s.refreshes += 1;
            return reply(200, format!(r#"{{"access_token":"access-{}"}}"#, s.refreshes));
        }
        if s.fail_budget > 0 {
            s.fail_budget -= 1;
            let status = s.fail_status;
            return reply(status, "{}");
        }

        match method {
            Method::Get => reply(200, serde_json::to_vec(&s.document).unwrap()),
            Method::Put => {
                s.document = Some(serde_json::from_slice(raw).unwrap());
                reply(200, raw.to_vec())
            }
            Method::Patch => {
                let mut merged = serde_json::to_value(s.document.unwrap_or_default()).unwrap();
                let patch: serde_json::Value = serde_json::from_slice(raw).unwrap();
                for (k, v) in patch.as_object().unwrap() {
                    merged.as_object_mut().unwrap().insert(k.clone(), v.clone());
                }
                s.document = Some(serde_json::from_value(merged).unwrap());
                reply(200, raw.to_vec())
            }
            Method::Post => reply(404, "null"),
        }
    }
}

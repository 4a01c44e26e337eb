//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use crate::app::ports::{HttpResponse, HttpTransport, Method};
use crate::bus::{EventBus, EventHandler};
use crate::cloud::document::ComposterDocument;
use crate::config::CloudConfig;
use crate::error::TransportError;
use crate::events::{Event, EventKind, Topic};

/// Output pin that records every level written to it.
#[derive(Clone, Default)]
pub struct MockPin {
    pub writes: Arc<Mutex<Vec<bool>>>,
    pub fail: Arc<Mutex<bool>>,
}

impl MockPin {
    pub fn writes(&self) -> Vec<bool> {
        self.writes.lock().unwrap().clone()
    }

    pub fn level(&self) -> Option<bool> {
        self.writes.lock().unwrap().last().copied()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

impl ErrorType for MockPin {
    type Error = ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.write(true)
    }
}

impl MockPin {
    fn write(&mut self, level: bool) -> Result<(), ErrorKind> {
        if *self.fail.lock().unwrap() {
            return Err(ErrorKind::Other);
        }
        self.writes.lock().unwrap().push(level);
        Ok(())
    }
}

/// Subscribes to every topic and keeps what it saw.
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

/// One request seen by [`FakeCloud`].
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
    offline: bool,
}

/// In-memory stand-in for the auth endpoints and the realtime database.
///
/// Access tokens are numbered `access-1`, `access-2`, … per refresh.
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
            api_key: "test-key".into(),
            database_url: "https://db.example.com/".into(),
            composter_id: "000002".into(),
            sign_in_url: "https://auth.example.com/v1/accounts:signInWithPassword".into(),
            token_url: "https://token.example.com/v1/token".into(),
            user_email: "user@example.com".into(),
            user_password: "secret".into(),
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

    pub fn count(&self, method: Method) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.url.contains(".json"))
            .count()
    }

    pub fn token_refreshes(&self) -> u32 {
        self.state.lock().unwrap().refreshes
    }

    pub fn reject_sign_in(&self, reject: bool) {
        self.state.lock().unwrap().reject_sign_in = reject;
    }

    /// Fail the next `n` document requests with `status`.
    pub fn fail_next(&self, n: u32, status: u16) {
        let mut s = self.state.lock().unwrap();
        s.fail_budget = n;
        s.fail_status = status;
    }

    /// Every request fails at the transport level while offline.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
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
        let text = body.map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
        s.requests.push(SeenRequest {
            method,
            url: url.into(),
            body: text,
        });
        if s.offline {
            return Err(TransportError::Connect);
        }

        if url.contains("signInWithPassword") {
            if s.reject_sign_in {
                return reply(400, r#"{"error":{"message":"INVALID_PASSWORD"}}"#);
            }
            return reply(200, r#"{"refreshToken":"refresh-1","idToken":"id"}"#);
        }
        if url.contains("/token?") {
            s.refreshes += 1;
            return reply(200, format!(r#"{{"access_token":"access-{}","expires_in":"3600"}}"#, s.refreshes));
        }

        if s.fail_budget > 0 {
            s.fail_budget -= 1;
            let status = s.fail_status;
            return reply(status, r#"{"error":"denied"}"#);
        }
        match method {
            Method::Get => {
                let doc = serde_json::to_vec(&s.document).map_err(|_| TransportError::Io)?;
                reply(200, doc)
            }
            Method::Put => {
                let doc = serde_json::from_slice(body.unwrap_or_default()).map_err(|_| TransportError::Io)?;
                s.document = Some(doc);
                reply(200, body.unwrap_or_default().to_vec())
            }
            Method::Patch => {
                let mut merged = serde_json::to_value(s.document.unwrap_or_default()).map_err(|_| TransportError::Io)?;
                let patch: serde_json::Value =
                    serde_json::from_slice(body.unwrap_or_default()).map_err(|_| TransportError::Io)?;
                if let (Some(target), Some(fields)) = (merged.as_object_mut(), patch.as_object()) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
                s.document = Some(serde_json::from_value(merged).map_err(|_| TransportError::Io)?);
                reply(200, body.unwrap_or_default().to_vec())
            }
            Method::Post => reply(404, "null"),
        }
    }
}

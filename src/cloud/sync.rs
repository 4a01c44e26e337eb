//! Cloud synchronization engine.
//!
//! ```text
//!            Connectivity.On              login ok
//!  Disconnected ──────────────▶ (login) ───────────▶ Active
//!       ▲                          │ login failed       │ auth lost
//!       │ Connectivity.Off         ▼                    ▼
//!       └──────────────────────  Degraded ◀─────────────┘
//!                                   │ ensure_session() every reauth_interval
//!                                   └──────────────▶ Active
//! ```
//!
//! Three jobs run against the session: the periodic push of measured
//! values, the write-back of local actuator changes, and the poll that
//! turns remote rising edges into local `ManualOn` events.  Each job is
//! skipped unless the session is active; none of them retries on its own
//! beyond the client's single refresh-and-retry.

use core::time::Duration;
use std::sync::Arc;

use log::{info, warn};

use super::client::CloudClient;
use super::document::DocumentPatch;
use crate::actuators::Actuator;
use crate::app::ports::HttpTransport;
use crate::bus::EventBus;
use crate::error::CloudError;
use crate::events::ActuatorEvent;
use crate::params::ParameterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No network; all jobs idle.
    Disconnected,
    /// Network up but not signed in.  Local control is unaffected.
    Degraded,
    Active,
}

pub struct CloudSync<T> {
    client: CloudClient<T>,
    store: Arc<ParameterStore>,
    state: SessionState,
    /// Actuator flags the override poll compares the remote document
    /// against: local state at sign-in, then whatever was last seen or
    /// written.
    last_known: [bool; 3],
    reauth_interval: Duration,
    last_attempt: Option<Duration>,
}

fn slot(actuator: Actuator) -> usize {
    match actuator {
        Actuator::Mixer => 0,
        Actuator::Crusher => 1,
        Actuator::Fan => 2,
    }
}

impl<T: HttpTransport> CloudSync<T> {
    pub fn new(client: CloudClient<T>, store: Arc<ParameterStore>, reauth_interval: Duration) -> Self {
        let last_known = Actuator::ALL.map(|a| a.is_on(&store));
        Self {
            client,
            store,
            state: SessionState::Disconnected,
            last_known,
            reauth_interval,
            last_attempt: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn last_known(&self, actuator: Actuator) -> bool {
        self.last_known[slot(actuator)]
    }

    pub fn client(&self) -> &CloudClient<T> {
        &self.client
    }

    /// Network came up: sign in again and make sure the document exists.
    pub fn on_connected(&mut self, now: Duration) {
        info!("Cloud: connectivity up, signing in");
        self.client.logout();
        self.state = SessionState::Degraded;
        self.try_login(now);
    }

    pub fn on_disconnected(&mut self) {
        if self.state != SessionState::Disconnected {
            info!("Cloud: connectivity lost, sync paused");
        }
        self.client.logout();
        self.state = SessionState::Disconnected;
        self.last_attempt = None;
    }

    /// Retry sign-in while degraded, at most once per `reauth_interval`.
    /// Returns whether the session is active afterwards.
    pub fn ensure_session(&mut self, now: Duration) -> bool {
        match self.state {
            SessionState::Active => true,
            SessionState::Disconnected => false,
            SessionState::Degraded => {
                let due = self
                    .last_attempt
                    .is_none_or(|at| now.saturating_sub(at) >= self.reauth_interval);
                if due {
                    self.try_login(now);
                }
                self.is_active()
            }
        }
    }

    fn try_login(&mut self, now: Duration) {
        self.last_attempt = Some(now);
        let result = self.client.login().and_then(|()| self.client.read_or_create());
        match result {
            Ok(_) => {
                // A remote `true` the device is not running is a request.
                self.last_known = Actuator::ALL.map(|a| a.is_on(&self.store));
                info!("Cloud: session active");
                self.state = SessionState::Active;
            }
            Err(e) => {
                warn!("Cloud: sign-in failed ({}), running degraded", e);
                self.state = SessionState::Degraded;
            }
        }
    }

    fn settle<R>(&mut self, result: Result<R, CloudError>) -> Result<R, CloudError> {
        match &result {
            Err(e) if e.is_auth() => {
                warn!("Cloud: session lost ({})", e);
                self.client.logout();
                self.state = SessionState::Degraded;
            }
            _ => {}
        }
        result
    }

    /// Overwrite the remote measurements with local values.
    pub fn push_readings(&mut self) -> Result<(), CloudError> {
        if !self.is_active() {
            return Err(CloudError::NotAuthenticated);
        }
        let params = self.store.snapshot();
        let result = self.client.read_or_create().and_then(|mut doc| {
            doc.apply_readings(&params);
            self.client.put(&doc)
        });
        if result.is_ok() {
            info!(
                "Cloud: pushed complete={:.0}% days={} humidity={:.1} temperature={:.1}",
                params.completion, params.days, params.humidity, params.temperature
            );
        }
        self.settle(result)
    }

    /// Mirror one local actuator change into the remote document.
    ///
    /// The cached value is updated first so the override poll does not
    /// echo our own write back as a manual request.
    pub fn write_back(&mut self, actuator: Actuator, on: bool) -> Result<(), CloudError> {
        self.last_known[slot(actuator)] = on;
        if !self.is_active() {
            return Err(CloudError::NotAuthenticated);
        }
        let result = self
            .client
            .read_or_create()
            .and_then(|_| self.client.patch(&DocumentPatch::actuator(actuator, on)));
        self.settle(result)
    }

    /// Compare the remote actuator flags with the cached ones and publish
    /// `ManualOn` for every remote false→true flip.  Returns how many
    /// events were published.
    pub fn poll_overrides(&mut self, bus: &EventBus) -> Result<usize, CloudError> {
        if !self.is_active() {
            return Err(CloudError::NotAuthenticated);
        }
        let result = self.client.read_or_create();
        let doc = self.settle(result)?;

        let mut published = 0;
        for actuator in Actuator::ALL {
            let remote = doc.actuator(actuator);
            let known = &mut self.last_known[slot(actuator)];
            if remote && !*known {
                info!("Cloud: manual override {} on", actuator.name());
                bus.publish(actuator.event(ActuatorEvent::ManualOn));
                published += 1;
            }
            *known = remote;
        }
        Ok(published)
    }
}

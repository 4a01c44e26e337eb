//! The composter's remote document.
//!
//! ```json
//! {"complete": 0, "days": 0, "humidity": 0, "temperature": 0,
//!  "mixer": false, "crusher": false, "fan": false}
//! ```
//!
//! Missing fields decode to their defaults, so a partially written
//! document never fails to parse.

use serde::{Deserialize, Serialize};

use crate::actuators::Actuator;
use crate::params::ComposterParameters;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposterDocument {
    /// Fill level, 0–100 %.
    pub complete: f32,
    pub days: u32,
    pub humidity: f32,
    pub temperature: f32,
    pub mixer: bool,
    pub crusher: bool,
    pub fan: bool,
}

impl ComposterDocument {
    pub fn actuator(&self, actuator: Actuator) -> bool {
        match actuator {
            Actuator::Mixer => self.mixer,
            Actuator::Crusher => self.crusher,
            Actuator::Fan => self.fan,
        }
    }

    /// Overwrite the measured fields with local values.  Actuator flags
    /// are left as the remote side has them.
    pub fn apply_readings(&mut self, params: &ComposterParameters) {
        self.complete = params.completion;
        self.days = params.days;
        self.humidity = params.humidity;
        self.temperature = params.temperature;
    }
}

/// Partial update: only `Some` fields are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DocumentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crusher: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan: Option<bool>,
}

impl DocumentPatch {
    /// A patch touching one actuator flag.
    pub fn actuator(actuator: Actuator, on: bool) -> Self {
        let mut patch = Self::default();
        match actuator {
            Actuator::Mixer => patch.mixer = Some(on),
            Actuator::Crusher => patch.crusher = Some(on),
            Actuator::Fan => patch.fan = Some(on),
        }
        patch
    }
}

//! Log-based event sink.
//!
//! Subscribes to every topic and writes one structured line per event to
//! the ESP-IDF logger (UART / USB-CDC in production).  A display or
//! telemetry sink would hang off the bus the same way.

use std::sync::Arc;

use log::info;

use crate::bus::{EventBus, EventHandler};
use crate::error::CommsError;
use crate::events::{Event, Topic};

/// Bus subscriber that logs every [`Event`] to the serial console.
pub struct EventLogger;

impl EventLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), CommsError> {
        for topic in Topic::ALL {
            bus.subscribe(topic, self.clone())?;
        }
        Ok(())
    }
}

impl EventHandler for EventLogger {
    fn handle(&self, event: &Event, _bus: &EventBus) {
        info!("EVENT | {}", event);
    }
}

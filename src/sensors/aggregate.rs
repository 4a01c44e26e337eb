//! Combined parameter stability.
//!
//! Listens to the humidity and temperature verdicts and publishes one
//! derived `Parameters/Stable` or `Parameters/Unstable` on edges only.
//! Either quantity unstable makes the whole unstable; stable requires both.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::info;

use crate::bus::{EventBus, EventHandler};
use crate::error::CommsError;
use crate::events::{Event, EventKind, StabilityEvent, Topic};

#[derive(Debug, Default, Clone, Copy)]
struct Verdicts {
    humidity: Option<bool>,
    temperature: Option<bool>,
    combined: Option<bool>,
}

impl Verdicts {
    fn derive(&self) -> Option<bool> {
        match (self.humidity, self.temperature) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        }
    }
}

pub struct ParametersMonitor {
    verdicts: Mutex<CriticalSectionRawMutex, RefCell<Verdicts>>,
}

impl ParametersMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            verdicts: Mutex::new(RefCell::new(Verdicts::default())),
        })
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), CommsError> {
        bus.subscribe(Topic::Humidity, self.clone())?;
        bus.subscribe(Topic::Temperature, self.clone())
    }

    /// Current combined verdict, `None` until both quantities reported.
    pub fn is_stable(&self) -> Option<bool> {
        self.verdicts.lock(|v| v.borrow().combined)
    }
}

impl EventHandler for ParametersMonitor {
    fn handle(&self, event: &Event, bus: &EventBus) {
        let edge = self.verdicts.lock(|v| {
            let mut v = v.borrow_mut();
            match event.kind {
                EventKind::Humidity(s) => v.humidity = Some(s.is_stable()),
                EventKind::Temperature(s) => v.temperature = Some(s.is_stable()),
                _ => return None,
            }
            let next = v.derive()?;
            if v.combined == Some(next) {
                return None;
            }
            v.combined = Some(next);
            Some(StabilityEvent::from_stable(next))
        });

        if let Some(verdict) = edge {
            info!("Parameters: {:?}", verdict);
            bus.publish(EventKind::Parameters(verdict));
        }
    }
}

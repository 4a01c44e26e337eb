//! Lid switch monitor.
//!
//! Polls the lid reed switch and turns level changes into `Lid/Opened`
//! and `Lid/Closed`.  The store is updated before the event goes out so
//! handlers reacting to it see the new `lid_open`.

use core::time::Duration;
use std::sync::Arc;

use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::bus::EventBus;
use crate::drivers::task_pin::{self, Core};
use crate::error::CommsError;
use crate::events::{EventKind, LidEvent};
use crate::params::ParameterStore;

pub struct LidMonitor<I> {
    pin: I,
    /// Pin level that means "open".
    open_level: bool,
    store: Arc<ParameterStore>,
    open: bool,
}

impl<I: InputPin + Send + 'static> LidMonitor<I> {
    pub fn new(pin: I, open_level: bool, store: Arc<ParameterStore>) -> Self {
        let open = store.get_lid_open();
        Self {
            pin,
            open_level,
            store,
            open,
        }
    }

    /// Sample the switch once.  Returns the event published, if any.
    pub fn poll(&mut self, bus: &EventBus) -> Option<LidEvent> {
        let level = match self.pin.is_high() {
            Ok(level) => level,
            Err(_) => {
                warn!("Lid: switch read failed");
                return None;
            }
        };
        let open = level == self.open_level;
        if open == self.open {
            return None;
        }
        self.open = open;
        self.store.set_lid_open(open);

        let event = if open { LidEvent::Opened } else { LidEvent::Closed };
        info!("Lid: {:?}", event);
        bus.publish(EventKind::Lid(event));
        Some(event)
    }

    pub fn spawn(mut self, bus: Arc<EventBus>, period: Duration) -> Result<std::thread::JoinHandle<()>, CommsError> {
        task_pin::spawn_on_core(Core::App, 6, 3, "lid\0", move || {
            loop {
                self.poll(&bus);
                std::thread::sleep(period);
            }
        })
    }
}

//! Polled, debounced front-panel buttons.
//!
//! ## Hardware
//!
//! Active-low momentary switches with external pull-ups on the mixer,
//! crusher and fan inputs.  A panel task samples every button at a fixed
//! period and runs the debounce + gesture state machine per button.
//!
//! ## Gesture detection
//!
//! | Gesture      | Condition                         | Event published     |
//! |--------------|-----------------------------------|---------------------|
//! | Short press  | Released before `LONG_PRESS_MS`   | `<Actuator>/ManualOn`  |
//! | Long press   | Held for `LONG_PRESS_MS`          | `<Actuator>/ManualOff` |

use core::time::Duration;
use std::sync::Arc;

use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::actuators::Actuator;
use crate::bus::EventBus;
use crate::drivers::task_pin::{self, Core};
use crate::error::CommsError;
use crate::events::ActuatorEvent;

const DEBOUNCE_MS: u32 = 50;
const LONG_PRESS_MS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    DebounceWait { since_ms: u32 },
    Pressed { since_ms: u32 },
    /// Long press already reported; wait for release.
    Held,
}

pub struct Button<I> {
    pin: I,
    actuator: Actuator,
    state: GestureState,
}

impl<I: InputPin> Button<I> {
    pub fn new(pin: I, actuator: Actuator) -> Self {
        Self {
            pin,
            actuator,
            state: GestureState::Idle,
        }
    }

    pub fn actuator(&self) -> Actuator {
        self.actuator
    }

    fn is_pressed(&mut self) -> bool {
        // Active low; a failed read counts as released.
        self.pin.is_low().unwrap_or(false)
    }

    /// Sample the pin and advance the gesture machine.
    /// `now_ms` is the current monotonic time in milliseconds.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonEvent> {
        let pressed = self.is_pressed();

        match self.state {
            GestureState::Idle => {
                if pressed {
                    self.state = GestureState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            GestureState::DebounceWait { since_ms } => {
                if !pressed {
                    self.state = GestureState::Idle;
                } else if now_ms.wrapping_sub(since_ms) >= DEBOUNCE_MS {
                    self.state = GestureState::Pressed { since_ms };
                }
                None
            }

            GestureState::Pressed { since_ms } => {
                let held_ms = now_ms.wrapping_sub(since_ms);
                if !pressed {
                    self.state = GestureState::Idle;
                    return Some(ButtonEvent::ShortPress);
                }
                if held_ms >= LONG_PRESS_MS {
                    self.state = GestureState::Held;
                    return Some(ButtonEvent::LongPress);
                }
                None
            }

            GestureState::Held => {
                if !pressed {
                    self.state = GestureState::Idle;
                }
                None
            }
        }
    }

    /// Tick and publish the actuator request for a recognised gesture.
    pub fn poll(&mut self, now_ms: u32, bus: &EventBus) -> Option<ButtonEvent> {
        let gesture = self.tick(now_ms)?;
        let request = match gesture {
            ButtonEvent::ShortPress => ActuatorEvent::ManualOn,
            ButtonEvent::LongPress => ActuatorEvent::ManualOff,
        };
        info!("Button: {} {:?}", self.actuator.name(), gesture);
        bus.publish(self.actuator.event(request));
        Some(gesture)
    }
}

/// The three front-panel buttons sampled together.
pub struct ButtonPanel<I> {
    buttons: heapless::Vec<Button<I>, 3>,
}

impl<I: InputPin + Send + 'static> ButtonPanel<I> {
    pub fn new() -> Self {
        Self {
            buttons: heapless::Vec::new(),
        }
    }

    pub fn with(mut self, pin: I, actuator: Actuator) -> Self {
        if self.buttons.push(Button::new(pin, actuator)).is_err() {
            warn!("Button: panel full, {} ignored", actuator.name());
        }
        self
    }

    pub fn poll(&mut self, now_ms: u32, bus: &EventBus) {
        for button in &mut self.buttons {
            button.poll(now_ms, bus);
        }
    }

    pub fn spawn(mut self, bus: Arc<EventBus>, period: Duration) -> Result<std::thread::JoinHandle<()>, CommsError> {
        task_pin::spawn_on_core(Core::App, 4, 3, "buttons\0", move || {
            let start = std::time::Instant::now();
            loop {
                let now_ms = start.elapsed().as_millis() as u32;
                self.poll(now_ms, &bus);
                std::thread::sleep(period);
            }
        })
    }
}

impl<I: InputPin + Send + 'static> Default for ButtonPanel<I> {
    fn default() -> Self {
        Self::new()
    }
}

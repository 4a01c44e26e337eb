//! Software timer service.
//!
//! Controllers own [`Timer`] handles created here; the service owns the
//! callbacks and fires them from its own context, never inline on the
//! caller of `start()`.
//!
//! ```text
//!  ┌────────────┐ create()  ┌──────────────┐  tick(elapsed)  ┌─────────────┐
//!  │ Controller │──────────▶│ TimerService │◀────────────────│ timer-svc   │
//!  │  (Timer)   │ start/stop│  slot table  │  due callbacks  │  thread     │
//!  └────────────┘──────────▶└──────────────┘────────────────▶└─────────────┘
//! ```
//!
//! Due callbacks are collected under the lock and invoked after it is
//! released, so a callback may freely start or stop timers (including its
//! own).  Tests drive [`TimerService::tick`] directly for deterministic
//! timing.

use core::cell::RefCell;
use core::time::Duration;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, info, warn};

use crate::drivers::task_pin::{self, Core};
use crate::error::CommsError;

/// Maximum number of live timers.
pub const MAX_TIMERS: usize = 16;

pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

struct TimerSlot {
    name: &'static str,
    period: Duration,
    repeating: bool,
    /// Time left until the next fire; `None` while stopped.
    remaining: Option<Duration>,
    callback: Option<TimerCallback>,
}

pub struct TimerService {
    slots: Mutex<CriticalSectionRawMutex, RefCell<[Option<TimerSlot>; MAX_TIMERS]>>,
}

/// Owned handle to one timer.  Dropping the handle frees the slot.
pub struct Timer {
    id: usize,
    name: &'static str,
    service: Arc<TimerService>,
}

impl TimerService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(RefCell::new(core::array::from_fn(|_| None))),
        })
    }

    /// Register a stopped timer with no callback yet (see
    /// [`Timer::on_fire`]).  Returns `None` if every slot is taken.
    pub fn create(self: &Arc<Self>, name: &'static str, period: Duration, repeating: bool) -> Option<Timer> {
        let id = self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let id = slots.iter().position(Option::is_none)?;
            slots[id] = Some(TimerSlot {
                name,
                period,
                repeating,
                remaining: None,
                callback: None,
            });
            Some(id)
        });

        match id {
            Some(id) => {
                debug!("Timers: '{}' created in slot {} ({:?})", name, id, period);
                Some(Timer {
                    id,
                    name,
                    service: self.clone(),
                })
            }
            None => {
                warn!("Timers: no free slot for '{}'", name);
                None
            }
        }
    }

    /// Advance every armed timer by `elapsed` and fire those that came due.
    /// Returns how many callbacks ran.
    pub fn tick(&self, elapsed: Duration) -> usize {
        let due: heapless::Vec<TimerCallback, MAX_TIMERS> = self.slots.lock(|slots| {
            let mut due = heapless::Vec::new();
            for slot in slots.borrow_mut().iter_mut().flatten() {
                let Some(remaining) = slot.remaining else {
                    continue;
                };
                let remaining = remaining.saturating_sub(elapsed);
                if remaining.is_zero() {
                    slot.remaining = slot.repeating.then_some(slot.period);
                    if let Some(cb) = &slot.callback {
                        // One entry per slot; capacity always suffices.
                        let _ = due.push(cb.clone());
                    }
                } else {
                    slot.remaining = Some(remaining);
                }
            }
            due
        });

        for callback in &due {
            callback();
        }
        due.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.lock(|slots| {
            slots
                .borrow()
                .iter()
                .flatten()
                .filter(|s| s.remaining.is_some())
                .count()
        })
    }

    /// Names of the currently armed timers, in slot order.
    pub fn armed(&self) -> heapless::Vec<&'static str, MAX_TIMERS> {
        self.slots.lock(|slots| {
            slots
                .borrow()
                .iter()
                .flatten()
                .filter(|s| s.remaining.is_some())
                .map(|s| s.name)
                .collect()
        })
    }

    /// Run the service on a dedicated thread, ticking every `resolution`.
    pub fn spawn(self: &Arc<Self>, resolution: Duration) -> Result<std::thread::JoinHandle<()>, CommsError> {
        let service = self.clone();
        task_pin::spawn_on_core(Core::App, 10, 4, "timer-svc\0", move || {
            info!("Timers: service running ({:?} resolution)", resolution);
            let mut last = std::time::Instant::now();
            loop {
                std::thread::sleep(resolution);
                let now = std::time::Instant::now();
                service.tick(now.duration_since(last));
                last = now;
            }
        })
    }

    fn with_slot<R>(&self, id: usize, f: impl FnOnce(&mut TimerSlot) -> R) -> Option<R> {
        self.slots
            .lock(|slots| slots.borrow_mut().get_mut(id)?.as_mut().map(f))
    }
}

impl Timer {
    /// Install the callback run each time the timer fires.
    pub fn on_fire(&self, callback: impl Fn() + Send + Sync + 'static) {
        let callback: TimerCallback = Arc::new(callback);
        let previous = self
            .service
            .with_slot(self.id, |s| s.callback.replace(callback))
            .flatten();
        drop(previous);
    }

    /// Arm (or re-arm) the timer for a full period.
    pub fn start(&self) {
        self.service.with_slot(self.id, |s| s.remaining = Some(s.period));
    }

    /// Disarm.  A callback already collected for this tick still runs.
    pub fn stop(&self) {
        self.service.with_slot(self.id, |s| s.remaining = None);
    }

    pub fn is_running(&self) -> bool {
        self.service
            .with_slot(self.id, |s| s.remaining.is_some())
            .unwrap_or(false)
    }

    /// Change the period and re-arm from now.
    pub fn set_period(&self, period: Duration) {
        self.service.with_slot(self.id, |s| {
            s.period = period;
            s.remaining = Some(period);
        });
    }

    pub fn period(&self) -> Duration {
        self.service
            .with_slot(self.id, |s| s.period)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        // The callback is dropped outside the lock.
        let released = self
            .service
            .slots
            .lock(|slots| slots.borrow_mut().get_mut(self.id).and_then(Option::take));
        drop(released);
        debug!("Timers: '{}' released", self.name);
    }
}

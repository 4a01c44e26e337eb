//! In-process publish/subscribe event bus.
//!
//! ```text
//!  publisher ──publish(event)──▶ ┌──────────┐ ──handle()──▶ subscriber 1
//!                                │ EventBus │ ──handle()──▶ subscriber 2
//!                                └──────────┘ ──handle()──▶ ...
//! ```
//!
//! Dispatch is synchronous: [`EventBus::publish`] runs every matching
//! handler, in subscription order, on the caller's thread before it
//! returns.  Matching handlers are copied out of the subscriber table
//! under the lock and invoked after it is released, so a handler may
//! publish follow-up events.  Handlers must not block and must only move
//! state forward, which is what keeps chains of follow-up events finite.
//!
//! Subscriptions are made once during start-up.  The table is bounded
//! (`MAX_SUBSCRIBERS`) and never allocates on the publish path.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::warn;

use crate::error::CommsError;
use crate::events::{Event, EventKind, Topic};

/// Subscriber table capacity.
pub const MAX_SUBSCRIBERS: usize = 48;

/// Receives events from the bus.
///
/// `bus` is the bus that delivered the event, so handlers can publish
/// follow-ups without holding their own reference to it.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event, bus: &EventBus);
}

impl<F> EventHandler for F
where
    F: Fn(&Event, &EventBus) + Send + Sync,
{
    fn handle(&self, event: &Event, bus: &EventBus) {
        self(event, bus);
    }
}

#[derive(Clone, Copy)]
enum Filter {
    Topic(Topic),
    Exact(EventKind),
}

impl Filter {
    fn matches(self, kind: EventKind) -> bool {
        match self {
            Self::Topic(t) => kind.topic() == t,
            Self::Exact(k) => kind == k,
        }
    }
}

struct Subscription {
    filter: Filter,
    handler: Arc<dyn EventHandler>,
}

pub struct EventBus {
    subscribers: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<Subscription, MAX_SUBSCRIBERS>>>,
    delivered: AtomicU32,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(RefCell::new(heapless::Vec::new())),
            delivered: AtomicU32::new(0),
        }
    }

    /// Receive every event on `topic`.
    pub fn subscribe(&self, topic: Topic, handler: Arc<dyn EventHandler>) -> Result<(), CommsError> {
        self.add(Filter::Topic(topic), handler)
    }

    /// Receive only events whose topic *and* discriminant equal `kind`.
    pub fn subscribe_exact(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Result<(), CommsError> {
        self.add(Filter::Exact(kind), handler)
    }

    fn add(&self, filter: Filter, handler: Arc<dyn EventHandler>) -> Result<(), CommsError> {
        self.subscribers.lock(|subs| {
            subs.borrow_mut()
                .push(Subscription { filter, handler })
                .map_err(|_| CommsError::BusFull)
        })
    }

    /// Deliver `event` to every matching handler before returning.
    pub fn publish(&self, event: impl Into<Event>) {
        let event = event.into();
        let matching: heapless::Vec<Arc<dyn EventHandler>, MAX_SUBSCRIBERS> = self.subscribers.lock(|subs| {
            subs.borrow()
                .iter()
                .filter(|s| s.filter.matches(event.kind))
                .map(|s| s.handler.clone())
                .collect()
        });

        if matching.is_empty() {
            warn!("Bus: no subscriber for {}", event.kind);
        }
        for handler in &matching {
            handler.handle(&event, self);
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of `publish` calls completed so far.
    pub fn delivered(&self) -> u32 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock(|subs| subs.borrow().len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

//! Bus side of the cloud engine.
//!
//! Event handlers must not block, so [`CloudLink`] only translates bus
//! events into [`SyncCommand`]s and queues them.  The cloud task drains
//! the queue and does the network work.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::actuators::Actuator;
use crate::bus::{EventBus, EventHandler};
use crate::error::CommsError;
use crate::events::{ActuatorEvent, ConnectivityEvent, Event, EventKind, Topic};

/// Queue depth between the bus and the cloud task.
pub const SYNC_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    Connected,
    Disconnected,
    /// A local actuator changed state and the remote flag should follow.
    ActuatorChanged(Actuator, bool),
}

pub type SyncQueue = Channel<CriticalSectionRawMutex, SyncCommand, SYNC_QUEUE_DEPTH>;

pub struct CloudLink {
    commands: Arc<SyncQueue>,
}

impl CloudLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            commands: Arc::new(Channel::new()),
        })
    }

    /// Receiving end, handed to the cloud task.
    pub fn commands(&self) -> Arc<SyncQueue> {
        self.commands.clone()
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), CommsError> {
        for topic in [Topic::Connectivity, Topic::Mixer, Topic::Crusher, Topic::Fan] {
            bus.subscribe(topic, self.clone())?;
        }
        Ok(())
    }

    fn translate(kind: EventKind) -> Option<SyncCommand> {
        match kind {
            EventKind::Connectivity(ConnectivityEvent::On) => Some(SyncCommand::Connected),
            EventKind::Connectivity(ConnectivityEvent::Off) => Some(SyncCommand::Disconnected),
            _ => match Actuator::from_event(kind)? {
                (a, ActuatorEvent::On) => Some(SyncCommand::ActuatorChanged(a, true)),
                (a, ActuatorEvent::Off) => Some(SyncCommand::ActuatorChanged(a, false)),
                _ => None,
            },
        }
    }
}

impl EventHandler for CloudLink {
    fn handle(&self, event: &Event, _bus: &EventBus) {
        let Some(command) = Self::translate(event.kind) else {
            return;
        };
        if self.commands.try_send(command).is_err() {
            warn!("Cloud: command queue full, dropping {:?}", command);
        }
    }
}

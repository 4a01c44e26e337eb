//! Cloud task: one thread, three cooperative loops.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  cloud-sync thread (Core 0)                              │
//!  │  edge_executor::LocalExecutor                            │
//!  │   ┌──────────────┐  ┌──────────────┐  ┌───────────────┐  │
//!  │   │ commands     │  │ push         │  │ override poll │  │
//!  │   │ wake-on-send │  │ cloud_push ⏱ │  │ 1 s ⏱         │  │
//!  │   └──────────────┘  └──────────────┘  └───────────────┘  │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All three share one [`CloudSync`] behind `Rc<RefCell<_>>`; the
//! executor is single-threaded and no borrow is held across an `.await`,
//! so the borrows never overlap.  HTTP calls block the thread, which is
//! fine because nothing else runs on it.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use super::link::{SyncCommand, SyncQueue};
use super::sync::CloudSync;
use crate::app::ports::HttpTransport;
use crate::bus::EventBus;
use crate::config::{ComposterConfig, ms};
use crate::drivers::task_pin::{self, Core};
use crate::error::{CloudError, CommsError};

type Shared<T> = Rc<RefCell<CloudSync<T>>>;

/// Loop periods, taken from [`ComposterConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SyncSchedule {
    pub push: Duration,
    pub override_poll: Duration,
}

impl SyncSchedule {
    pub fn from_config(config: &ComposterConfig) -> Self {
        Self {
            push: ms(config.cloud_push_ms),
            override_poll: ms(config.override_poll_ms),
        }
    }
}

/// Apply one queued command.
pub fn apply<T: HttpTransport>(sync: &mut CloudSync<T>, command: SyncCommand, now: Duration) {
    match command {
        SyncCommand::Connected => sync.on_connected(now),
        SyncCommand::Disconnected => sync.on_disconnected(),
        SyncCommand::ActuatorChanged(actuator, on) => {
            match sync.write_back(actuator, on) {
                Ok(()) => {}
                Err(CloudError::NotAuthenticated) => {
                    debug!("Cloud: offline, {}={} not mirrored", actuator.name(), on);
                }
                Err(e) => warn!("Cloud: write-back {}={} failed ({})", actuator.name(), on, e),
            }
        }
    }
}

async fn command_loop<T: HttpTransport>(sync: Shared<T>, queue: Arc<SyncQueue>, boot: Instant) {
    loop {
        let command = queue.receive().await;
        debug!("Cloud: {:?}", command);
        apply(&mut sync.borrow_mut(), command, boot.elapsed());
    }
}

async fn push_loop<T: HttpTransport>(sync: Shared<T>, period: Duration, boot: Instant) {
    loop {
        async_io_mini::Timer::after(period).await;
        let mut s = sync.borrow_mut();
        if !s.ensure_session(boot.elapsed()) {
            continue;
        }
        if let Err(e) = s.push_readings() {
            warn!("Cloud: periodic push failed ({})", e);
        }
    }
}

async fn poll_loop<T: HttpTransport>(sync: Shared<T>, bus: Arc<EventBus>, period: Duration, boot: Instant) {
    loop {
        async_io_mini::Timer::after(period).await;
        let mut s = sync.borrow_mut();
        if !s.ensure_session(boot.elapsed()) {
            continue;
        }
        if let Err(e) = s.poll_overrides(&bus) {
            debug!("Cloud: override poll failed ({})", e);
        }
    }
}

fn run<T: HttpTransport>(sync: CloudSync<T>, bus: Arc<EventBus>, queue: Arc<SyncQueue>, schedule: SyncSchedule) {
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let boot = Instant::now();
    let sync: Shared<T> = Rc::new(RefCell::new(sync));

    executor.spawn(command_loop(sync.clone(), queue, boot)).detach();
    executor.spawn(push_loop(sync.clone(), schedule.push, boot)).detach();
    executor
        .spawn(poll_loop(sync, bus, schedule.override_poll, boot))
        .detach();

    info!(
        "Cloud task started (push every {:?}, override poll every {:?})",
        schedule.push, schedule.override_poll
    );
    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

/// Spawn the cloud task pinned to Core 0 next to the network stack.
pub fn spawn<T: HttpTransport + 'static>(
    sync: CloudSync<T>,
    bus: Arc<EventBus>,
    queue: Arc<SyncQueue>,
    schedule: SyncSchedule,
) -> Result<std::thread::JoinHandle<()>, CommsError> {
    task_pin::spawn_on_core(Core::Pro, 12, 16, "cloud-sync\0", move || run(sync, bus, queue, schedule))
}

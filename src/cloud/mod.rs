//! Cloud synchronization with the realtime database.
//!
//! ```text
//!   EventBus ──▶ CloudLink ──SyncQueue──▶ cloud task ──▶ CloudSync ──▶ CloudClient ──▶ HttpTransport
//!      ▲                                                     │
//!      └──────────────── Mixer/Crusher/Fan ManualOn ◀────────┘
//! ```

pub mod client;
pub mod document;
pub mod link;
pub mod sync;
pub mod tasks;

pub use client::CloudClient;
pub use document::{ComposterDocument, DocumentPatch};
pub use link::{CloudLink, SyncCommand};
pub use sync::{CloudSync, SessionState};

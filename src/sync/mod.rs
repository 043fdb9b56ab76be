//! Scroll synchronization between the source view and the preview.
//!
//! - [`SyncController`]: mode gating, debouncing and echo suppression
//! - [`Debouncer`]: the coalescing timer both directions share
//! - [`SyncCommand`]: what the host must do in response

mod controller;
mod debounce;
mod types;

pub use controller::{SyncController, SyncSettings};
pub use debounce::Debouncer;
pub use types::{Origin, ScrollOutcome, SyncCommand, SyncEvent, SyncMode, View};

// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. mapping::MappingTable)
    clippy::module_name_repetitions
)]

//! # Marksync
//!
//! Scroll synchronization between a markdown source view and its rendered
//! preview.
//!
//! Marksync keeps the two views of a document aligned:
//! - Maps source lines to preview offsets and back through a block table
//! - Debounces scroll bursts and never bounces a command back to its sender
//! - Tracks the preview panel lifecycle, including loads, errors and renames
//! - Persists panel width, zoom, sync mode and the last file
//!
//! ## Architecture
//!
//! Marksync uses The Elm Architecture (TEA) pattern:
//! - **Model**: [`preview::Preview`]
//! - **Message**: [`preview::Message`]
//! - **Update**: [`preview::Preview::update`], returning scroll commands
//!
//! Time is injected through [`clock::Clock`] and file reads through
//! [`loader::Loader`], so every timer and race can be driven from tests.
//!
//! ## Modules
//!
//! - [`mapping`]: Block table and source/preview position conversion
//! - [`sync`]: Sync modes, debouncing and echo suppression
//! - [`panel`]: Preview panel state machine
//! - [`session`]: Persisted per-user session state
//! - [`preview`]: The facade tying the above together
//! - [`config`]: Layered configuration
//! - [`layout`]: Block height estimation for hosts without a renderer
//! - [`watcher`]: File watching

pub mod clock;
pub mod config;
pub mod error;
pub mod layout;
pub mod loader;
pub mod mapping;
pub mod panel;
pub mod preview;
pub mod session;
pub mod sync;
pub mod watcher;

pub use error::PreviewError;

/// Common imports for hosts embedding the preview.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::PreviewConfig;
    pub use crate::error::PreviewError;
    pub use crate::loader::{Loader, ThreadLoader};
    pub use crate::mapping::{Block, BlockId, BlockKind, MappingStore, MappingTable};
    pub use crate::panel::PanelState;
    pub use crate::preview::{Message, Preview};
    pub use crate::session::{Session, SessionState, SessionStore};
    pub use crate::sync::{Origin, SyncCommand, SyncEvent, SyncMode, View};
    pub use crate::watcher::WatchEvent;
}

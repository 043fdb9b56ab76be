//! The preview panel as seen by the UI shell.
//!
//! [`Preview`] ties the pieces together:
//! - [`PanelMachine`]: lifecycle
//! - [`SyncController`]: scroll propagation
//! - [`MappingStore`]: current layout mapping
//! - [`Session`]: persisted width, zoom, mode and last file
//!
//! Input arrives as a [`Message`] through [`Preview::update`] (or the
//! convenience wrappers below); output is a list of [`SyncCommand`]s for the
//! host to apply to its views.

mod effects;
mod update;

pub use update::Message;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::PreviewConfig;
use crate::error::PreviewError;
use crate::loader::{LoadHandle, Loader};
use crate::mapping::{Block, MappingStore, MappingTable};
use crate::panel::{PanelMachine, PanelState};
use crate::session::Session;
use crate::sync::{Origin, SyncCommand, SyncController, SyncMode, SyncSettings};
use crate::watcher::WatchEvent;

/// Preview panel state and its collaborators.
pub struct Preview {
    clock: Arc<dyn Clock>,
    loader: Box<dyn Loader>,
    panel: PanelMachine,
    sync: SyncController,
    mapping: Arc<MappingStore>,
    session: Session,
    config: PreviewConfig,
    /// Text of the file currently shown.
    source: Option<String>,
    active_load: Option<LoadHandle>,
}

impl Preview {
    /// Create a closed panel. The sync mode comes from the session.
    pub fn new(
        config: PreviewConfig,
        session: Session,
        clock: Arc<dyn Clock>,
        loader: Box<dyn Loader>,
    ) -> Self {
        let settings = SyncSettings {
            debounce_ms: config.debounce_ms,
            ..SyncSettings::default()
        };
        Self {
            clock,
            loader,
            panel: PanelMachine::new(config.settle_ms),
            sync: SyncController::new(session.sync_mode(), settings),
            mapping: Arc::new(MappingStore::new()),
            session,
            config,
            source: None,
            active_load: None,
        }
    }

    pub const fn current_state(&self) -> PanelState {
        self.panel.state()
    }

    /// Failure shown while in `FileError`.
    pub const fn error(&self) -> Option<&PreviewError> {
        self.panel.error()
    }

    /// File being loaded or shown.
    pub fn file_path(&self) -> Option<&Path> {
        self.panel.path()
    }

    /// Text of the loaded file.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub const fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub const fn sync_mode(&self) -> SyncMode {
        self.sync.mode()
    }

    /// Current mapping snapshot.
    pub fn mapping(&self) -> Arc<MappingTable> {
        self.mapping.snapshot()
    }

    /// Store for hosts that rebuild mappings on their own worker.
    pub fn mapping_store(&self) -> Arc<MappingStore> {
        Arc::clone(&self.mapping)
    }

    /// Earliest time [`Self::poll`] has timer work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        match (self.sync.next_deadline(), self.panel.settle_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Open the panel on the last file, or close it.
    pub fn toggle(&mut self) {
        self.update(Message::Toggle);
    }

    /// Open the panel on a specific file (or none) if it is closed.
    pub fn open(&mut self, path: Option<PathBuf>) {
        self.update(Message::OpenPanel(path));
    }

    pub fn open_file(&mut self, path: impl Into<PathBuf>) {
        self.update(Message::OpenFile(path.into()));
    }

    pub fn retry(&mut self) {
        self.update(Message::Retry);
    }

    pub fn set_sync_mode(&mut self, mode: SyncMode) {
        self.update(Message::SetSyncMode(mode));
    }

    /// Set zoom percentage; returns the clamped value.
    pub fn set_zoom(&mut self, percent: u16) -> u16 {
        self.update(Message::SetZoom(percent));
        self.session.zoom()
    }

    pub fn zoom_in(&mut self) -> u16 {
        self.update(Message::ZoomIn);
        self.session.zoom()
    }

    pub fn zoom_out(&mut self) -> u16 {
        self.update(Message::ZoomOut);
        self.session.zoom()
    }

    /// Set panel width; returns the clamped value.
    pub fn resize(&mut self, width: u16) -> u16 {
        self.update(Message::Resize(width));
        self.session.load_width()
    }

    /// Explicit navigation of the source view; ignores mode and debounce.
    pub fn jump_to_source(&mut self, line: usize) -> Option<SyncCommand> {
        find_jump(self.update(Message::JumpToSource(line)))
    }

    /// Explicit navigation of the preview; ignores mode and debounce.
    pub fn jump_to_preview(&mut self, offset: usize) -> Option<SyncCommand> {
        find_jump(self.update(Message::JumpToPreview(offset)))
    }

    pub fn on_source_scroll(&mut self, line: usize) -> Vec<SyncCommand> {
        self.update(Message::SourceScrolled(line))
    }

    pub fn on_preview_scroll(&mut self, offset: usize) -> Vec<SyncCommand> {
        self.update(Message::PreviewScrolled(offset))
    }

    /// New block layout from the renderer.
    pub fn on_layout(&mut self, blocks: Vec<Block>) {
        self.update(Message::Layout(blocks));
    }

    pub fn on_watch_event(&mut self, event: WatchEvent) -> Vec<SyncCommand> {
        self.update(Message::Watch(event))
    }

    /// Collect finished loads and fire due timers.
    pub fn poll(&mut self) -> Vec<SyncCommand> {
        self.update(Message::Tick)
    }
}

fn find_jump(commands: Vec<SyncCommand>) -> Option<SyncCommand> {
    commands
        .into_iter()
        .find(|cmd| cmd.event.origin == Origin::UserJump)
}

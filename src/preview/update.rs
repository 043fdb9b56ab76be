use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::mapping::Block;
use crate::panel::PanelEvent;
use crate::preview::Preview;
use crate::sync::{ScrollOutcome, SyncCommand, SyncMode};
use crate::watcher::WatchEvent;

/// Everything the UI shell, renderer and file watcher can tell the preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Panel
    /// Open on the session's last file, or close
    Toggle,
    /// Open with an explicit file (or none); ignored when already open
    OpenPanel(Option<PathBuf>),
    /// Show another file
    OpenFile(PathBuf),
    /// Re-issue the failed load
    Retry,

    // Session
    SetSyncMode(SyncMode),
    /// Zoom percentage
    SetZoom(u16),
    ZoomIn,
    ZoomOut,
    /// Panel width
    Resize(u16),

    // Sync
    /// The source view scrolled to a line
    SourceScrolled(usize),
    /// The preview scrolled to an offset
    PreviewScrolled(usize),
    /// User navigation to a source line
    JumpToSource(usize),
    /// User navigation to a preview offset
    JumpToPreview(usize),

    // Collaborators
    /// Renderer finished a layout pass
    Layout(Vec<Block>),
    /// File watcher report
    Watch(WatchEvent),
    /// Timer and load polling
    Tick,
}

impl Preview {
    /// Apply one message and return the scroll commands it produced.
    ///
    /// Every message also polls finished loads and due timers, so a host
    /// that only calls `update` still makes progress.
    pub fn update(&mut self, msg: Message) -> Vec<SyncCommand> {
        let now = self.clock.now_ms();
        let mut commands = Vec::new();

        match msg {
            Message::Toggle => {
                if self.panel.state().is_open() {
                    self.close(now);
                } else {
                    let path = self.session.last_file_path().map(Path::to_path_buf);
                    self.panel.apply(PanelEvent::ToggleOpen { path }, now);
                }
            }
            Message::OpenPanel(path) => {
                self.panel.apply(PanelEvent::ToggleOpen { path }, now);
            }
            Message::OpenFile(path) => {
                self.panel.apply(PanelEvent::OpenFile(path), now);
            }
            Message::Retry => {
                self.panel.apply(PanelEvent::Retry, now);
            }

            Message::SetSyncMode(mode) => {
                self.sync.set_mode(mode);
                self.session.set_sync_mode(mode);
            }
            Message::SetZoom(percent) => {
                self.session.set_zoom(percent);
            }
            Message::ZoomIn => {
                self.session.zoom_in();
            }
            Message::ZoomOut => {
                self.session.zoom_out();
            }
            Message::Resize(width) => {
                self.session.save_width(width);
            }

            Message::SourceScrolled(line) => {
                if self.panel.state().is_live() {
                    let outcome = self.sync.on_source_scroll(line, now);
                    self.note_scroll(outcome, now);
                }
            }
            Message::PreviewScrolled(offset) => {
                if self.panel.state().is_live() {
                    let outcome = self.sync.on_preview_scroll(offset, now);
                    self.note_scroll(outcome, now);
                }
            }
            Message::JumpToSource(line) => {
                if self.panel.state().is_live() {
                    commands.push(self.sync.jump_to_source(line, now));
                    self.panel.apply(PanelEvent::Activity, now);
                }
            }
            Message::JumpToPreview(offset) => {
                if self.panel.state().is_live() {
                    commands.push(self.sync.jump_to_preview(offset, now));
                    self.panel.apply(PanelEvent::Activity, now);
                }
            }

            Message::Layout(blocks) => {
                let table = self.mapping.rebuild(blocks);
                for err in table.render_errors() {
                    warn!(%err, "block rendered as placeholder");
                }
            }
            Message::Watch(event) => self.handle_watch_event(event, now),
            Message::Tick => {}
        }

        self.sync_load_requests();
        commands.extend(self.poll_at(now));
        commands
    }

    fn close(&mut self, now: u64) {
        self.panel.apply(PanelEvent::ToggleClose, now);
        self.sync.cancel_pending();
        self.source = None;
    }

    fn note_scroll(&mut self, outcome: ScrollOutcome, now: u64) {
        if outcome == ScrollOutcome::Scheduled {
            self.panel.apply(PanelEvent::Activity, now);
        }
    }

    fn handle_watch_event(&mut self, event: WatchEvent, now: u64) {
        match event {
            WatchEvent::Changed => {
                if let Some(path) = self.panel.path().map(Path::to_path_buf) {
                    debug!(path = %path.display(), "reloading changed file");
                    self.panel.apply(PanelEvent::OpenFile(path), now);
                }
            }
            WatchEvent::Deleted => {
                self.panel.apply(PanelEvent::FileDeleted, now);
            }
            WatchEvent::Moved(to) => {
                if !self.panel.apply(PanelEvent::FileMoved(to.clone()), now).is_ignored() {
                    self.session.set_last_file_path(to);
                }
            }
        }
    }
}

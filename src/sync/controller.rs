use tracing::{debug, trace};

use crate::mapping::MappingTable;
use crate::sync::debounce::Debouncer;
use crate::sync::types::{Origin, ScrollOutcome, SyncCommand, SyncEvent, SyncMode, View};

/// Timing and matching knobs for [`SyncController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Quiet period before a burst of scroll reports produces a command.
    pub debounce_ms: u64,
    /// How far a source-view arrival report may land from the commanded line.
    pub line_tolerance: usize,
    /// How far a preview arrival report may land from the commanded offset.
    pub offset_tolerance: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            line_tolerance: 1,
            offset_tolerance: 2,
        }
    }
}

/// Last command issued, kept to recognize the target view reporting arrival.
#[derive(Debug, Clone, Copy)]
struct Issued {
    target: View,
    position: usize,
    generation: u64,
    at_ms: u64,
}

/// Translates scroll reports from one view into scroll commands for the other.
///
/// Reports are debounced per direction, gated by [`SyncMode`], and the
/// target view's arrival report for a command we issued is dropped instead of
/// being treated as fresh input. Without that last rule `Bidirectional` would
/// bounce forever.
#[derive(Debug, Clone)]
pub struct SyncController {
    mode: SyncMode,
    settings: SyncSettings,
    generation: u64,
    /// Source line waiting to move the preview.
    to_preview: Debouncer<usize>,
    /// Preview offset waiting to move the source view.
    to_source: Debouncer<usize>,
    issued: Option<Issued>,
}

impl SyncController {
    pub const fn new(mode: SyncMode, settings: SyncSettings) -> Self {
        Self {
            mode,
            settings,
            generation: 0,
            to_preview: Debouncer::new(settings.debounce_ms),
            to_source: Debouncer::new(settings.debounce_ms),
            issued: None,
        }
    }

    pub const fn mode(&self) -> SyncMode {
        self.mode
    }

    pub const fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Generation of the most recent command (0 before any).
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Switch policy. Any pending debounced work is discarded unfired, even
    /// in a direction the new mode still propagates.
    pub fn set_mode(&mut self, mode: SyncMode) {
        if mode == self.mode {
            return;
        }
        debug!(from = %self.mode, to = %mode, "sync mode changed");
        self.mode = mode;
        if self.to_preview.cancel().is_some() {
            debug!("cancelled pending preview scroll");
        }
        if self.to_source.cancel().is_some() {
            debug!("cancelled pending source scroll");
        }
    }

    /// Drop all pending debounced work.
    pub fn cancel_pending(&mut self) {
        self.to_preview.cancel();
        self.to_source.cancel();
        self.issued = None;
    }

    pub const fn has_pending(&self) -> bool {
        self.to_preview.is_pending() || self.to_source.is_pending()
    }

    /// Earliest time [`Self::poll`] could produce a command.
    pub fn next_deadline(&self) -> Option<u64> {
        match (self.to_preview.deadline(), self.to_source.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// The source view scrolled to `line`.
    pub fn on_source_scroll(&mut self, line: usize, now_ms: u64) -> ScrollOutcome {
        if self.is_echo(View::Source, line, now_ms) {
            return ScrollOutcome::Echo;
        }
        if !self.mode.drives_preview() {
            return ScrollOutcome::Ignored;
        }
        self.to_source.cancel();
        self.to_preview.queue(line, now_ms);
        ScrollOutcome::Scheduled
    }

    /// The preview scrolled to `offset`.
    pub fn on_preview_scroll(&mut self, offset: usize, now_ms: u64) -> ScrollOutcome {
        if self.is_echo(View::Preview, offset, now_ms) {
            return ScrollOutcome::Echo;
        }
        if !self.mode.drives_source() {
            return ScrollOutcome::Ignored;
        }
        self.to_preview.cancel();
        self.to_source.queue(offset, now_ms);
        ScrollOutcome::Scheduled
    }

    /// Fire whichever debounced command is due, mapped through `table`.
    pub fn poll(&mut self, now_ms: u64, table: &MappingTable) -> Option<SyncCommand> {
        if let Some(line) = self.to_preview.take_ready(now_ms) {
            let offset = table.source_line_to_offset(line);
            return Some(self.issue(View::Preview, offset, Origin::Source, now_ms, true));
        }
        if let Some(offset) = self.to_source.take_ready(now_ms) {
            let line = table.offset_to_source_line(offset);
            return Some(self.issue(View::Source, line, Origin::Preview, now_ms, true));
        }
        None
    }

    /// Move the source view to `line` now, whatever the mode.
    pub fn jump_to_source(&mut self, line: usize, now_ms: u64) -> SyncCommand {
        self.to_source.cancel();
        self.issue(View::Source, line, Origin::UserJump, now_ms, false)
    }

    /// Move the preview to `offset` now, whatever the mode.
    pub fn jump_to_preview(&mut self, offset: usize, now_ms: u64) -> SyncCommand {
        self.to_preview.cancel();
        self.issue(View::Preview, offset, Origin::UserJump, now_ms, false)
    }

    fn issue(
        &mut self,
        target: View,
        position: usize,
        origin: Origin,
        now_ms: u64,
        track_echo: bool,
    ) -> SyncCommand {
        self.generation += 1;
        let generation = self.generation;
        if track_echo {
            self.issued = Some(Issued {
                target,
                position,
                generation,
                at_ms: now_ms,
            });
        }
        debug!(?target, position, generation, ?origin, "issued sync command");
        SyncCommand {
            target,
            event: SyncEvent {
                origin,
                position,
                generation,
                timestamp_ms: now_ms,
            },
        }
    }

    /// Whether a report from `view` is the arrival of our last command.
    ///
    /// A mismatching report from the target view means the user took over,
    /// so the pending match is forgotten.
    fn is_echo(&mut self, view: View, position: usize, now_ms: u64) -> bool {
        let Some(issued) = self.issued else {
            return false;
        };
        if issued.target != view {
            return false;
        }
        if now_ms.saturating_sub(issued.at_ms) > self.settings.debounce_ms {
            self.issued = None;
            return false;
        }
        let tolerance = match view {
            View::Source => self.settings.line_tolerance,
            View::Preview => self.settings.offset_tolerance,
        };
        if position.abs_diff(issued.position) <= tolerance {
            trace!(?view, position, generation = issued.generation, "dropped echo");
            true
        } else {
            self.issued = None;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Block, BlockKind};

    /// One source line per block, 20 offset units each: line n <-> offset 20n.
    fn table() -> MappingTable {
        MappingTable::build(
            (0..100)
                .map(|i| {
                    Block::new(i as u64, BlockKind::Paragraph)
                        .lines(i, i)
                        .offsets(i * 20, (i + 1) * 20)
                })
                .collect::<Vec<_>>(),
        )
    }

    fn controller(mode: SyncMode) -> SyncController {
        SyncController::new(mode, SyncSettings::default())
    }

    #[test]
    fn test_burst_of_source_scrolls_yields_one_command_with_last_position() {
        let table = table();
        let mut sync = controller(SyncMode::SourceDriven);
        let mut commands = Vec::new();
        for i in 0..10 {
            let now = i * 5;
            assert_eq!(
                sync.on_source_scroll(10 + i as usize, now),
                ScrollOutcome::Scheduled
            );
            commands.extend(sync.poll(now, &table));
        }
        for now in 46..200 {
            commands.extend(sync.poll(now, &table));
        }
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].target, View::Preview);
        assert_eq!(commands[0].position(), 19 * 20);
        assert_eq!(commands[0].event.timestamp_ms, 95);
    }

    #[test]
    fn test_command_waits_for_full_debounce_window() {
        let table = table();
        let mut sync = controller(SyncMode::SourceDriven);
        sync.on_source_scroll(3, 100);
        assert_eq!(sync.next_deadline(), Some(150));
        assert!(sync.poll(149, &table).is_none());
        assert!(sync.poll(150, &table).is_some());
        assert!(sync.poll(500, &table).is_none());
    }

    #[test]
    fn test_independent_mode_never_emits() {
        let table = table();
        let mut sync = controller(SyncMode::Independent);
        for i in 0..1_000u64 {
            let pos = usize::try_from(i % 90).unwrap();
            assert_eq!(sync.on_source_scroll(pos, i), ScrollOutcome::Ignored);
            assert_eq!(sync.on_preview_scroll(pos * 7, i), ScrollOutcome::Ignored);
            assert!(sync.poll(i, &table).is_none());
        }
        assert!(sync.poll(10_000, &table).is_none());
        assert_eq!(sync.generation(), 0);
    }

    #[test]
    fn test_mode_gates_each_direction() {
        let table = table();
        let mut sync = controller(SyncMode::PreviewDriven);
        assert_eq!(sync.on_source_scroll(5, 0), ScrollOutcome::Ignored);
        assert_eq!(sync.on_preview_scroll(100, 0), ScrollOutcome::Scheduled);
        let cmd = sync.poll(50, &table).unwrap();
        assert_eq!(cmd.target, View::Source);
        assert_eq!(cmd.position(), 5);
        assert_eq!(cmd.event.origin, Origin::Preview);

        let mut sync = controller(SyncMode::SourceDriven);
        assert_eq!(sync.on_preview_scroll(100, 0), ScrollOutcome::Ignored);
    }

    #[test]
    fn test_bidirectional_arrival_report_is_not_reprocessed() {
        let table = table();
        let mut sync = controller(SyncMode::Bidirectional);
        sync.on_source_scroll(10, 0);
        let cmd = sync.poll(50, &table).unwrap();
        assert_eq!(cmd.target, View::Preview);
        assert_eq!(cmd.position(), 200);
        assert_eq!(cmd.generation(), 1);

        assert_eq!(sync.on_preview_scroll(200, 60), ScrollOutcome::Echo);
        assert_eq!(sync.on_preview_scroll(201, 65), ScrollOutcome::Echo);
        for now in 60..500 {
            assert!(sync.poll(now, &table).is_none());
        }
        assert_eq!(sync.generation(), 1);
    }

    #[test]
    fn test_report_after_echo_window_counts_as_user_input() {
        let table = table();
        let mut sync = controller(SyncMode::Bidirectional);
        sync.on_source_scroll(10, 0);
        sync.poll(50, &table).unwrap();
        assert_eq!(sync.on_preview_scroll(200, 101), ScrollOutcome::Scheduled);
        let cmd = sync.poll(151, &table).unwrap();
        assert_eq!(cmd.target, View::Source);
        assert_eq!(cmd.position(), 10);
    }

    #[test]
    fn test_mismatching_report_from_target_is_user_input() {
        let table = table();
        let mut sync = controller(SyncMode::Bidirectional);
        sync.on_source_scroll(10, 0);
        sync.poll(50, &table).unwrap();
        assert_eq!(sync.on_preview_scroll(400, 55), ScrollOutcome::Scheduled);
        // The user took over, so an exact match afterwards is no longer an echo.
        assert_eq!(sync.on_preview_scroll(200, 56), ScrollOutcome::Scheduled);
    }

    #[test]
    fn test_switch_to_independent_cancels_pending_without_firing() {
        let table = table();
        let mut sync = controller(SyncMode::Bidirectional);
        sync.on_source_scroll(10, 0);
        sync.set_mode(SyncMode::Independent);
        assert!(!sync.has_pending());
        assert!(sync.poll(1_000, &table).is_none());
        assert_eq!(sync.generation(), 0);
    }

    #[test]
    fn test_any_mode_change_drops_pending_scroll() {
        let table = table();
        let mut sync = controller(SyncMode::Bidirectional);
        sync.on_source_scroll(10, 0);
        assert!(sync.has_pending());
        sync.set_mode(SyncMode::SourceDriven);
        assert!(!sync.has_pending());
        assert!(sync.poll(1_000, &table).is_none());

        sync.on_source_scroll(12, 1_000);
        let cmd = sync.poll(1_050, &table).unwrap();
        assert_eq!(cmd.target, View::Preview);
        assert_eq!(cmd.position(), 240);
    }

    #[test]
    fn test_same_mode_keeps_pending_scroll() {
        let mut sync = controller(SyncMode::SourceDriven);
        sync.on_source_scroll(10, 0);
        sync.set_mode(SyncMode::SourceDriven);
        assert!(sync.has_pending());
    }

    #[test]
    fn test_new_input_in_other_direction_replaces_pending() {
        let table = table();
        let mut sync = controller(SyncMode::Bidirectional);
        sync.on_source_scroll(10, 0);
        sync.on_preview_scroll(600, 10);
        let cmd = sync.poll(60, &table).unwrap();
        assert_eq!(cmd.target, View::Source);
        assert_eq!(cmd.position(), 30);
        assert!(sync.poll(1_000, &table).is_none());
    }

    #[test]
    fn test_jumps_bypass_mode_and_debounce() {
        let mut sync = controller(SyncMode::Independent);
        let cmd = sync.jump_to_source(42, 7);
        assert_eq!(cmd.target, View::Source);
        assert_eq!(cmd.position(), 42);
        assert_eq!(cmd.event.origin, Origin::UserJump);
        assert_eq!(cmd.event.timestamp_ms, 7);

        let cmd = sync.jump_to_preview(300, 8);
        assert_eq!(cmd.target, View::Preview);
        assert_eq!(cmd.generation(), 2);
    }

    #[test]
    fn test_jump_cancels_pending_command_for_same_view() {
        let table = table();
        let mut sync = controller(SyncMode::SourceDriven);
        sync.on_source_scroll(10, 0);
        sync.jump_to_preview(900, 5);
        assert!(sync.poll(1_000, &table).is_none());
    }

    #[test]
    fn test_generation_strictly_increases() {
        let table = table();
        let mut sync = controller(SyncMode::Bidirectional);
        let mut last = 0;
        for i in 0..20u64 {
            let now = i * 100;
            let cmd = if i % 3 == 0 {
                sync.jump_to_source(usize::try_from(i).unwrap(), now)
            } else {
                sync.on_source_scroll(usize::try_from(i).unwrap(), now);
                sync.poll(now + 50, &table).unwrap()
            };
            assert!(cmd.generation() > last);
            last = cmd.generation();
        }
    }
}

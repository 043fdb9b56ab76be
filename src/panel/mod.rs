//! Preview panel lifecycle.
//!
//! The panel is always in exactly one [`PanelState`]. State only changes
//! through [`PanelMachine::apply`], which implements this table:
//!
//! | From                  | Event                      | To            |
//! |-----------------------|----------------------------|---------------|
//! | `Closed`              | open, no file              | `Empty`       |
//! | `Closed`              | open with path             | `FileLoading` |
//! | any open state        | open-file                  | `FileLoading` |
//! | `FileLoading`         | load succeeded             | `Viewing`     |
//! | `FileLoading`         | load failed                | `FileError`   |
//! | `Viewing`             | activity                   | `Syncing`     |
//! | `Syncing`             | settle timeout             | `Viewing`     |
//! | `Viewing`, `Syncing`  | file deleted               | `FileError`   |
//! | `FileError`           | retry                      | `FileLoading` |
//! | any                   | close                      | `Closed`      |
//!
//! Load results carry the [`LoadTicket`] they were started with; results for
//! anything but the load currently awaited are ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::PreviewError;

/// Observable panel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelState {
    Closed,
    Empty,
    FileLoading,
    Viewing,
    /// Transient: a sync just happened. Purely a status indicator.
    Syncing,
    FileError,
}

impl PanelState {
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Whether scroll synchronization is active.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Viewing | Self::Syncing)
    }
}

/// Identifies one file load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

impl fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load-{}", self.0)
    }
}

/// Triggers accepted by [`PanelMachine::apply`].
#[derive(Debug)]
pub enum PanelEvent {
    /// Open the panel, optionally with a file.
    ToggleOpen { path: Option<PathBuf> },
    ToggleClose,
    OpenFile(PathBuf),
    LoadSucceeded(LoadTicket),
    LoadFailed(LoadTicket, PreviewError),
    /// Scroll or edit activity that caused synchronization.
    Activity,
    /// Force the end of `Syncing` without waiting for the settle window.
    SettleTimeout,
    FileDeleted,
    /// The file was renamed; follow it without changing state.
    FileMoved(PathBuf),
    Retry,
}

impl PanelEvent {
    const fn name(&self) -> &'static str {
        match self {
            Self::ToggleOpen { .. } => "toggle-open",
            Self::ToggleClose => "toggle-close",
            Self::OpenFile(_) => "open-file",
            Self::LoadSucceeded(_) => "load-success",
            Self::LoadFailed(..) => "load-failure",
            Self::Activity => "activity",
            Self::SettleTimeout => "settle-timeout",
            Self::FileDeleted => "file-deleted",
            Self::FileMoved(_) => "file-moved",
            Self::Retry => "retry",
        }
    }
}

/// Result of applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: PanelState, to: PanelState },
    /// Accepted without a state change (activity refresh, rename).
    Stayed(PanelState),
    /// Not valid in the current state; nothing changed.
    Ignored(PanelState),
}

impl Transition {
    pub const fn state(self) -> PanelState {
        match self {
            Self::Moved { to, .. } => to,
            Self::Stayed(state) | Self::Ignored(state) => state,
        }
    }

    pub const fn is_ignored(self) -> bool {
        matches!(self, Self::Ignored(_))
    }
}

#[derive(Debug)]
enum Phase {
    Closed,
    Empty,
    FileLoading { path: PathBuf, ticket: LoadTicket },
    Viewing { path: PathBuf },
    Syncing { path: PathBuf, last_activity_ms: u64 },
    FileError { path: PathBuf, error: PreviewError },
}

impl Phase {
    const fn state(&self) -> PanelState {
        match self {
            Self::Closed => PanelState::Closed,
            Self::Empty => PanelState::Empty,
            Self::FileLoading { .. } => PanelState::FileLoading,
            Self::Viewing { .. } => PanelState::Viewing,
            Self::Syncing { .. } => PanelState::Syncing,
            Self::FileError { .. } => PanelState::FileError,
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Self::Closed | Self::Empty => None,
            Self::FileLoading { path, .. }
            | Self::Viewing { path }
            | Self::Syncing { path, .. }
            | Self::FileError { path, .. } => Some(path),
        }
    }
}

/// Owns the panel state and its transition rules.
#[derive(Debug)]
pub struct PanelMachine {
    phase: Phase,
    settle_ms: u64,
    next_ticket: u64,
}

impl PanelMachine {
    /// A closed panel whose `Syncing` state settles after `settle_ms` idle.
    pub const fn new(settle_ms: u64) -> Self {
        Self {
            phase: Phase::Closed,
            settle_ms,
            next_ticket: 1,
        }
    }

    pub const fn state(&self) -> PanelState {
        self.phase.state()
    }

    /// File being loaded, viewed or failed on.
    pub fn path(&self) -> Option<&Path> {
        self.phase.path()
    }

    /// Failure attached to `FileError`.
    pub const fn error(&self) -> Option<&PreviewError> {
        match &self.phase {
            Phase::FileError { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The load the panel is waiting for, if any.
    pub fn pending_load(&self) -> Option<(LoadTicket, &Path)> {
        match &self.phase {
            Phase::FileLoading { path, ticket } => Some((*ticket, path)),
            _ => None,
        }
    }

    /// When `Syncing` will settle back to `Viewing`.
    pub const fn settle_deadline(&self) -> Option<u64> {
        match self.phase {
            Phase::Syncing {
                last_activity_ms, ..
            } => Some(last_activity_ms.saturating_add(self.settle_ms)),
            _ => None,
        }
    }

    /// Settle `Syncing` if it has been idle for the settle window.
    pub fn poll(&mut self, now_ms: u64) -> Transition {
        match self.settle_deadline() {
            Some(deadline) if now_ms >= deadline => self.apply(PanelEvent::SettleTimeout, now_ms),
            _ => Transition::Ignored(self.state()),
        }
    }

    /// Apply `event` at logical time `now_ms`.
    pub fn apply(&mut self, event: PanelEvent, now_ms: u64) -> Transition {
        let from = self.state();
        let name = event.name();
        let phase = std::mem::replace(&mut self.phase, Phase::Closed);
        let (next, accepted) = self.step(phase, event, now_ms);
        self.phase = next;
        let to = self.state();

        if !accepted {
            trace!(event = name, state = ?from, "ignored panel event");
            Transition::Ignored(from)
        } else if from == to {
            Transition::Stayed(to)
        } else {
            debug!(event = name, ?from, ?to, "panel transition");
            Transition::Moved { from, to }
        }
    }

    fn step(&mut self, phase: Phase, event: PanelEvent, now_ms: u64) -> (Phase, bool) {
        use PanelEvent as E;

        match (phase, event) {
            (Phase::Closed, E::ToggleOpen { path: None }) => (Phase::Empty, true),
            (Phase::Closed, E::ToggleOpen { path: Some(path) }) => (self.loading(path), true),
            (Phase::Closed, E::ToggleClose) => (Phase::Closed, false),
            (_, E::ToggleClose) => (Phase::Closed, true),
            (phase, E::OpenFile(path)) if !matches!(phase, Phase::Closed) => {
                (self.loading(path), true)
            }
            (Phase::FileLoading { path, ticket }, E::LoadSucceeded(done)) if done == ticket => {
                (Phase::Viewing { path }, true)
            }
            (Phase::FileLoading { path, ticket }, E::LoadFailed(done, error)) if done == ticket => {
                (Phase::FileError { path, error }, true)
            }
            (Phase::Viewing { path } | Phase::Syncing { path, .. }, E::Activity) => (
                Phase::Syncing {
                    path,
                    last_activity_ms: now_ms,
                },
                true,
            ),
            (Phase::Syncing { path, .. }, E::SettleTimeout) => (Phase::Viewing { path }, true),
            (Phase::Viewing { path } | Phase::Syncing { path, .. }, E::FileDeleted) => {
                let error = PreviewError::FileNotFound { path: path.clone() };
                (Phase::FileError { path, error }, true)
            }
            (Phase::FileError { path, .. }, E::Retry) => (self.loading(path), true),
            (phase, E::FileMoved(to)) => rename(phase, to),
            (phase, _) => (phase, false),
        }
    }

    fn loading(&mut self, path: PathBuf) -> Phase {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        Phase::FileLoading { path, ticket }
    }
}

fn rename(phase: Phase, to: PathBuf) -> (Phase, bool) {
    match phase {
        Phase::FileLoading { ticket, .. } => (Phase::FileLoading { path: to, ticket }, true),
        Phase::Viewing { .. } => (Phase::Viewing { path: to }, true),
        Phase::Syncing {
            last_activity_ms, ..
        } => (
            Phase::Syncing {
                path: to,
                last_activity_ms,
            },
            true,
        ),
        Phase::FileError { error, .. } => (Phase::FileError { path: to, error }, true),
        phase @ (Phase::Closed | Phase::Empty) => (phase, false),
    }
}

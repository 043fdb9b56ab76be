use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which direction(s) of scroll propagation are active.
#[derive(
    clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// The source view drives the preview.
    #[default]
    SourceDriven,
    /// The preview drives the source view.
    PreviewDriven,
    /// Views scroll independently.
    Independent,
    /// Either view drives the other.
    Bidirectional,
}

impl SyncMode {
    pub const ALL: [Self; 4] = [
        Self::SourceDriven,
        Self::PreviewDriven,
        Self::Independent,
        Self::Bidirectional,
    ];

    /// Whether source scrolling moves the preview.
    pub const fn drives_preview(self) -> bool {
        matches!(self, Self::SourceDriven | Self::Bidirectional)
    }

    /// Whether preview scrolling moves the source view.
    pub const fn drives_source(self) -> bool {
        matches!(self, Self::PreviewDriven | Self::Bidirectional)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceDriven => "source-driven",
            Self::PreviewDriven => "preview-driven",
            Self::Independent => "independent",
            Self::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or(())
    }
}

/// One of the two synchronized views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Source,
    Preview,
}

/// What caused a cross-view command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Source,
    Preview,
    UserJump,
}

/// Record of one cross-view command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEvent {
    pub origin: Origin,
    /// Target position: a source line or a rendered offset, per the target view.
    pub position: usize,
    /// Strictly increasing per controller.
    pub generation: u64,
    pub timestamp_ms: u64,
}

/// Instruction for the host to scroll `target` to `event.position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCommand {
    pub target: View,
    pub event: SyncEvent,
}

impl SyncCommand {
    pub const fn position(&self) -> usize {
        self.event.position
    }

    pub const fn generation(&self) -> u64 {
        self.event.generation
    }
}

/// What the controller did with a reported scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// Queued behind the debounce window.
    Scheduled,
    /// The current mode does not propagate this direction.
    Ignored,
    /// Arrival report for a command we issued; dropped.
    Echo,
}

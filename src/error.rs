//! Error types for the preview subsystem.
//!
//! Nothing here is fatal to the host: load failures land in
//! [`PanelState::FileError`](crate::panel::PanelState::FileError) and render
//! failures stay scoped to one block.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::mapping::BlockId;

/// Failures surfaced by the preview panel.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// The file to preview does not exist (or vanished while viewing).
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single block failed to render; it is shown as a placeholder.
    #[error("block {block} failed to render: {reason}")]
    RenderError { block: BlockId, reason: String },
}

impl PreviewError {
    /// Map an IO failure for `path` onto the preview taxonomy.
    pub fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::FileReadError { path, source }
        }
    }
}

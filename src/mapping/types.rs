//! Block layout types shared by the renderer boundary and the mapper.

use std::fmt;

use thiserror::Error;

/// Stable identifier the renderer assigns to a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of rendered block, as far as position mapping cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading,
    /// Fenced or indented code. Interior lines share a single visual anchor.
    Code,
    List,
    Table,
}

/// A contiguous unit of content with both a source range and a rendered range.
///
/// Source lines are inclusive (`source_start..=source_end`); rendered offsets
/// are half-open (`offset_start..offset_end`). A collapsed block keeps its
/// source range but occupies no rendered space.
///
/// # Example
///
/// ```
/// use marksync::mapping::{Block, BlockKind};
///
/// let block = Block::new(1, BlockKind::Paragraph).lines(1, 3).offsets(0, 30);
/// assert_eq!(block.line_count(), 3);
/// assert_eq!(block.height(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub source_start: usize,
    pub source_end: usize,
    pub offset_start: usize,
    pub offset_end: usize,
    pub kind: BlockKind,
    pub collapsed: bool,
    /// Set by the renderer when this block is shown as an error placeholder.
    pub render_error: Option<String>,
}

impl Block {
    /// Create a single-line, zero-height block; chain [`Self::lines`] and
    /// [`Self::offsets`] to place it.
    pub const fn new(id: u64, kind: BlockKind) -> Self {
        Self {
            id: BlockId(id),
            source_start: 0,
            source_end: 0,
            offset_start: 0,
            offset_end: 0,
            kind,
            collapsed: false,
            render_error: None,
        }
    }

    /// Set the inclusive source line range.
    #[must_use]
    pub const fn lines(mut self, start: usize, end: usize) -> Self {
        self.source_start = start;
        self.source_end = end;
        self
    }

    /// Set the half-open rendered offset range.
    #[must_use]
    pub const fn offsets(mut self, start: usize, end: usize) -> Self {
        self.offset_start = start;
        self.offset_end = end;
        self
    }

    /// Mark the block as collapsed.
    #[must_use]
    pub const fn collapsed(mut self) -> Self {
        self.collapsed = true;
        self
    }

    /// Mark the block as a render-error placeholder.
    #[must_use]
    pub fn with_render_error(mut self, reason: impl Into<String>) -> Self {
        self.render_error = Some(reason.into());
        self
    }

    /// Rendered height of the block.
    pub const fn height(&self) -> usize {
        self.offset_end.saturating_sub(self.offset_start)
    }

    /// Number of source lines covered (always at least one).
    pub const fn line_count(&self) -> usize {
        self.source_end.saturating_sub(self.source_start) + 1
    }

    /// Whether the block takes no space on the offset axis.
    pub const fn is_zero_height(&self) -> bool {
        self.collapsed || self.offset_end <= self.offset_start
    }

    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.source_start && line <= self.source_end
    }
}

/// A defect in renderer-supplied layout that the mapper repaired.
///
/// These never fail a build; they are logged and kept on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MappingInconsistency {
    #[error("blocks were not ordered by source line")]
    Unsorted,
    #[error("block {block} had an inverted range")]
    InvertedRange { block: BlockId },
    #[error("collapsed block {block} reported a non-zero height")]
    CollapsedWithHeight { block: BlockId },
    #[error("block {block} overlapped its predecessor and was trimmed")]
    Overlap { block: BlockId },
    #[error("block {block} was entirely covered by its predecessor and dropped")]
    Swallowed { block: BlockId },
    #[error("gap before block {block} was filled")]
    Gap { block: BlockId },
}

//! Immutable source-line <-> rendered-offset mapping.

use tracing::warn;

use crate::error::PreviewError;
use crate::mapping::types::{Block, BlockKind, MappingInconsistency};

/// Immutable snapshot of one layout pass.
///
/// Built wholesale by [`MappingTable::build`], never mutated afterwards.
/// Blocks are sorted, non-overlapping and contiguous on both axes.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    blocks: Vec<Block>,
    source_starts: Vec<usize>,
    offset_starts: Vec<usize>,
    repairs: Vec<MappingInconsistency>,
    epoch: u64,
}

impl MappingTable {
    /// Build a table from renderer output.
    ///
    /// Never fails: unsorted input is sorted, overlaps are trimmed to the
    /// earlier block's boundary and gaps are filled by extending the
    /// preceding block. A layout that starts past offset 0 has its first
    /// block extended down to 0. Each repair is logged and kept in
    /// [`Self::repairs`].
    pub fn build(blocks: impl Into<Vec<Block>>) -> Self {
        let mut blocks = blocks.into();
        let mut repairs = Vec::new();

        if !blocks.is_sorted_by_key(|b| b.source_start) {
            repairs.push(MappingInconsistency::Unsorted);
            blocks.sort_by_key(|b| (b.source_start, b.offset_start));
        }

        let mut out: Vec<Block> = Vec::with_capacity(blocks.len());
        for mut block in blocks {
            normalize_block(&mut block, &mut repairs);
            if let Some(prev) = out.last_mut() {
                if !join_source(prev, &mut block, &mut repairs) {
                    continue;
                }
                join_offsets(prev, &mut block, &mut repairs);
            }
            out.push(block);
        }
        cover_origin(&mut out, &mut repairs);
        repairs.dedup();

        for repair in &repairs {
            warn!(%repair, "repaired block layout");
        }

        let source_starts = out.iter().map(|b| b.source_start).collect();
        let offset_starts = out.iter().map(|b| b.offset_start).collect();
        Self {
            blocks: out,
            source_starts,
            offset_starts,
            repairs,
            epoch: 0,
        }
    }

    /// Tag the table with a layout version.
    #[must_use]
    pub const fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    /// Layout version this table was built for.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub const fn len(&self) -> usize {
        self.blocks.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Repairs applied while building.
    pub fn repairs(&self) -> &[MappingInconsistency] {
        &self.repairs
    }

    /// Last source line covered, or 0 for an empty table.
    pub fn last_line(&self) -> usize {
        self.blocks.last().map_or(0, |b| b.source_end)
    }

    /// Total rendered extent, or 0 for an empty table.
    pub fn total_offset(&self) -> usize {
        self.blocks.last().map_or(0, |b| b.offset_end)
    }

    /// Render failures reported for individual blocks.
    pub fn render_errors(&self) -> Vec<PreviewError> {
        self.blocks
            .iter()
            .filter_map(|b| {
                b.render_error.as_ref().map(|reason| PreviewError::RenderError {
                    block: b.id,
                    reason: reason.clone(),
                })
            })
            .collect()
    }

    /// Block owning `line`, clamped to the first/last block.
    pub fn block_at_line(&self, line: usize) -> Option<&Block> {
        let idx = self.source_starts.partition_point(|&s| s <= line);
        self.blocks.get(idx.saturating_sub(1))
    }

    /// Block a probe at `offset` resolves to, clamped to the first/last block.
    ///
    /// A probe exactly on a collapsed block resolves to that block.
    pub fn block_at_offset(&self, offset: usize) -> Option<&Block> {
        let idx = self.offset_starts.partition_point(|&o| o < offset);
        match self.blocks.get(idx) {
            Some(b) if b.offset_start == offset => Some(b),
            _ => self.blocks.get(idx.saturating_sub(1)),
        }
    }

    /// Rendered offset for a source line.
    ///
    /// Interpolates inside the owning block, except code and zero-height
    /// blocks which anchor every line to their start.
    ///
    /// # Example
    ///
    /// ```
    /// use marksync::mapping::{Block, BlockKind, MappingTable};
    ///
    /// let table = MappingTable::build(vec![
    ///     Block::new(1, BlockKind::Paragraph).lines(1, 1).offsets(0, 20),
    ///     Block::new(2, BlockKind::Code).lines(2, 5).offsets(20, 20).collapsed(),
    /// ]);
    /// assert_eq!(table.source_line_to_offset(3), 20);
    /// assert_eq!(table.offset_to_source_line(20), 2);
    /// ```
    pub fn source_line_to_offset(&self, line: usize) -> usize {
        let (Some(first), Some(last)) = (self.blocks.first(), self.blocks.last()) else {
            return 0;
        };
        if line < first.source_start {
            return first.offset_start;
        }
        if line > last.source_end {
            return last.offset_end;
        }
        let Some(block) = self.block_at_line(line) else {
            return 0;
        };
        if block.kind == BlockKind::Code || block.is_zero_height() {
            return block.offset_start;
        }
        let within = line.min(block.source_end) - block.source_start;
        block.offset_start + within * block.height() / block.line_count()
    }

    /// Source line for a rendered offset.
    ///
    /// Collapsed blocks stay reachable: a probe on their offset returns their
    /// first source line.
    pub fn offset_to_source_line(&self, offset: usize) -> usize {
        let Some(first) = self.blocks.first() else {
            return 0;
        };
        let idx = self.offset_starts.partition_point(|&o| o < offset);
        if let Some(block) = self.blocks.get(idx)
            && block.offset_start == offset
        {
            return block.source_start;
        }
        if idx == 0 {
            return first.source_start;
        }
        let block = &self.blocks[idx - 1];
        if offset >= block.offset_end {
            return block.source_end;
        }
        if block.kind == BlockKind::Code {
            return block.source_start;
        }
        let within = offset - block.offset_start;
        (block.source_start + within * block.line_count() / block.height()).min(block.source_end)
    }
}

fn normalize_block(block: &mut Block, repairs: &mut Vec<MappingInconsistency>) {
    if block.source_end < block.source_start || block.offset_end < block.offset_start {
        block.source_end = block.source_end.max(block.source_start);
        block.offset_end = block.offset_end.max(block.offset_start);
        repairs.push(MappingInconsistency::InvertedRange { block: block.id });
    }
    if block.collapsed && block.offset_end != block.offset_start {
        block.offset_end = block.offset_start;
        repairs.push(MappingInconsistency::CollapsedWithHeight { block: block.id });
    }
}

/// Make `block` start right after `prev` on the source axis.
///
/// Returns false when `block` is entirely covered and must be dropped.
fn join_source(prev: &mut Block, block: &mut Block, repairs: &mut Vec<MappingInconsistency>) -> bool {
    if block.source_start <= prev.source_end {
        if block.source_end <= prev.source_end {
            repairs.push(MappingInconsistency::Swallowed { block: block.id });
            return false;
        }
        block.source_start = prev.source_end + 1;
        repairs.push(MappingInconsistency::Overlap { block: block.id });
    } else if block.source_start > prev.source_end + 1 {
        prev.source_end = block.source_start - 1;
        repairs.push(MappingInconsistency::Gap { block: block.id });
    }
    true
}

/// Make `block` start exactly where `prev` ends on the offset axis.
fn join_offsets(prev: &mut Block, block: &mut Block, repairs: &mut Vec<MappingInconsistency>) {
    if block.offset_start < prev.offset_end {
        block.offset_start = prev.offset_end;
        block.offset_end = if block.collapsed {
            block.offset_start
        } else {
            block.offset_end.max(block.offset_start)
        };
        repairs.push(MappingInconsistency::Overlap { block: block.id });
    } else if block.offset_start > prev.offset_end {
        // A zero-height predecessor must stay zero-height, so pull this
        // block back instead of stretching it.
        if prev.is_zero_height() {
            block.offset_start = prev.offset_end;
            if block.collapsed {
                block.offset_end = block.offset_start;
            }
        } else {
            prev.offset_end = block.offset_start;
        }
        repairs.push(MappingInconsistency::Gap { block: block.id });
    }
}

/// Stretch the leading blocks so the table starts at offset 0.
///
/// Leading zero-height blocks all sit at the first offset; they move to 0
/// and the first block with height absorbs the gap.
fn cover_origin(blocks: &mut [Block], repairs: &mut Vec<MappingInconsistency>) {
    let Some(first) = blocks.first() else {
        return;
    };
    if first.offset_start == 0 {
        return;
    }
    repairs.push(MappingInconsistency::Gap { block: first.id });
    for block in blocks.iter_mut() {
        block.offset_start = 0;
        if !block.is_zero_height() {
            break;
        }
        block.offset_end = 0;
    }
}

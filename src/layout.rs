//! Estimated block layout for hosts without a renderer.
//!
//! Parses markdown with comrak only to find top-level block boundaries, then
//! assigns each block an estimated height in terminal rows at a given width.
//! Good enough for the CLI, benches and tests; a real renderer reports its
//! own [`Block`]s.

use comrak::nodes::NodeValue;
use comrak::{Arena, Options, parse_document};
use unicode_width::UnicodeWidthStr;

use crate::mapping::{Block, BlockKind};

/// Top-level node with its 1-based inclusive source lines.
struct Span {
    start: usize,
    end: usize,
    kind: BlockKind,
}

fn parse_options() -> Options {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options
}

/// Produce a contiguous block list for `markdown` rendered `width` columns wide.
///
/// Source lines are 1-based. Blank lines between blocks belong to the block
/// above them, and every block gets one spacer row.
pub fn estimate_blocks(markdown: &str, width: usize) -> Vec<Block> {
    let spans = top_level_spans(markdown);
    let lines: Vec<&str> = markdown.lines().collect();
    let last_line = lines.len().max(1);
    let width = width.max(1);

    let mut blocks = Vec::with_capacity(spans.len());
    let mut offset = 0;
    for (i, span) in spans.iter().enumerate() {
        let start = if i == 0 { 1 } else { span.start };
        let end = spans
            .get(i + 1)
            .map_or(last_line.max(span.end), |next| next.start - 1);
        let height = estimate_rows(span, &lines, width) + 1;
        blocks.push(
            Block::new(i as u64, span.kind)
                .lines(start, end.max(start))
                .offsets(offset, offset + height),
        );
        offset += height;
    }
    blocks
}

fn top_level_spans(markdown: &str) -> Vec<Span> {
    let arena = Arena::new();
    let options = parse_options();
    let root = parse_document(&arena, markdown, &options);

    let mut spans: Vec<Span> = Vec::new();
    for node in root.children() {
        let data = node.data.borrow();
        let kind = match data.value {
            NodeValue::Heading(_) => BlockKind::Heading,
            NodeValue::CodeBlock(_) => BlockKind::Code,
            NodeValue::List(_) => BlockKind::List,
            NodeValue::Table(_) => BlockKind::Table,
            _ => BlockKind::Paragraph,
        };
        let start = data.sourcepos.start.line.max(1);
        let end = data.sourcepos.end.line.max(start);
        // Spans must be strictly increasing.
        if spans.last().is_some_and(|prev| start <= prev.end) {
            continue;
        }
        spans.push(Span { start, end, kind });
    }
    spans
}

fn estimate_rows(span: &Span, lines: &[&str], width: usize) -> usize {
    let text = lines
        .get(span.start - 1..span.end.min(lines.len()))
        .unwrap_or_default();
    match span.kind {
        BlockKind::Code | BlockKind::Table => text.len().max(1),
        BlockKind::Heading | BlockKind::Paragraph | BlockKind::List => text
            .iter()
            .map(|line| line.trim_end().width().div_ceil(width).max(1))
            .sum::<usize>()
            .max(1),
    }
}

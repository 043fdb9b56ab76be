//! Benchmarks for mapping table builds and position queries.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use marksync::layout::estimate_blocks;
use marksync::mapping::{Block, BlockKind, MappingTable};

fn large_layout(blocks: usize) -> Vec<Block> {
    (0..blocks)
        .map(|i| {
            let kind = if i % 7 == 0 {
                BlockKind::Code
            } else {
                BlockKind::Paragraph
            };
            Block::new(i as u64, kind)
                .lines(i * 4 + 1, i * 4 + 4)
                .offsets(i * 60, (i + 1) * 60)
        })
        .collect()
}

fn large_markdown(sections: usize) -> String {
    let mut md = String::new();
    for i in 0..sections {
        md.push_str(&format!(
            "## Section {i}\n\nSome prose that is long enough to wrap at narrow widths, repeated.\n\n```rust\nfn f{i}() {{}}\n```\n\n- item\n- item\n\n"
        ));
    }
    md
}

fn bench_build(c: &mut Criterion) {
    let layout = large_layout(10_000);
    c.bench_function("build_10k_blocks", |b| {
        b.iter(|| MappingTable::build(black_box(layout.clone())))
    });

    let mut shuffled = layout;
    shuffled.reverse();
    c.bench_function("build_10k_blocks_unsorted", |b| {
        b.iter(|| MappingTable::build(black_box(shuffled.clone())))
    });
}

fn bench_queries(c: &mut Criterion) {
    let table = MappingTable::build(large_layout(10_000));
    c.bench_function("source_line_to_offset", |b| {
        b.iter(|| {
            for line in (1..40_000).step_by(97) {
                black_box(table.source_line_to_offset(black_box(line)));
            }
        })
    });
    c.bench_function("offset_to_source_line", |b| {
        b.iter(|| {
            for offset in (0..600_000).step_by(1_499) {
                black_box(table.offset_to_source_line(black_box(offset)));
            }
        })
    });
}

fn bench_estimate(c: &mut Criterion) {
    let md = large_markdown(500);
    c.bench_function("estimate_blocks_500_sections", |b| {
        b.iter(|| estimate_blocks(black_box(&md), 80))
    });
}

criterion_group!(benches, bench_build, bench_queries, bench_estimate);
criterion_main!(benches);

//! Layout pass benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use folio_core::render::{AtomicRenderNode, BlockRenderNode, DocRenderNode, InlineRenderNode};
use folio_core::types::{NodeId, Padding, PageConfig};
use folio_layout::{BoxRegistry, LayoutEngine, MonoMeasurer};

fn build_doc(blocks: usize, words_per_block: usize) -> DocRenderNode {
    let mut doc = DocRenderNode::new(
        NodeId(1),
        PageConfig::new(816.0, 1056.0, Padding::uniform(96.0)),
    );
    let mut next_id = 2u64;
    for _ in 0..blocks {
        let mut block = BlockRenderNode::new(NodeId(next_id), "paragraph");
        next_id += 1;
        let mut inline = InlineRenderNode::new(NodeId(next_id), "text");
        next_id += 1;
        for word in 0..words_per_block {
            inline
                .children
                .push(AtomicRenderNode::text(NodeId(next_id), format!("word{word} ")));
            next_id += 1;
        }
        block.children.push(inline);
        doc.children.push(block);
    }
    doc
}

fn initial_layout(c: &mut Criterion) {
    let doc = build_doc(20, 200);
    c.bench_function("initial_layout", |b| {
        b.iter(|| {
            LayoutEngine::new(
                BoxRegistry::with_defaults(),
                Box::new(MonoMeasurer::default()),
                black_box(&doc),
            )
        })
    });
}

fn incremental_edit(c: &mut Criterion) {
    let mut doc = build_doc(20, 200);
    let mut engine = LayoutEngine::new(
        BoxRegistry::with_defaults(),
        Box::new(MonoMeasurer::default()),
        &doc,
    )
    .expect("initial layout");
    c.bench_function("incremental_edit", |b| {
        let mut version = doc.version;
        b.iter(|| {
            version += 1;
            doc.version = version;
            doc.children[0].version = version;
            doc.children[0].children[0].version = version;
            doc.children[0].children[0].children[0].version = version;
            engine.sync(black_box(&doc)).expect("sync");
        })
    });
}

criterion_group!(benches, initial_layout, incremental_edit);
criterion_main!(benches);

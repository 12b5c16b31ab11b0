//! End-to-end layout properties.

use folio_core::render::{
    AtomicContent, AtomicRenderNode, BlockRenderNode, DocRenderNode, InlineRenderNode,
};
use folio_core::types::{NodeId, Padding, PageConfig};
use folio_layout::{BoxKind, BoxRegistry, BoxTree, LayoutEngine, MonoMeasurer};
use proptest::prelude::*;

const CHAR_WIDTH: f64 = 10.0;
const LINE_HEIGHT: f64 = 10.0;

fn doc_from_words(words: &[String], width: f64, height: f64) -> DocRenderNode {
    let mut doc = DocRenderNode::new(
        NodeId(1),
        PageConfig::new(width, height, Padding::uniform(0.0)),
    );
    let mut block = BlockRenderNode::new(NodeId(2), "paragraph");
    let mut inline = InlineRenderNode::new(NodeId(3), "text");
    for (index, word) in words.iter().enumerate() {
        inline
            .children
            .push(AtomicRenderNode::text(NodeId(10 + index as u64), word.clone()));
    }
    block.children.push(inline);
    doc.children.push(block);
    doc
}

fn engine_for(doc: &DocRenderNode) -> LayoutEngine {
    LayoutEngine::new(
        BoxRegistry::with_defaults(),
        Box::new(MonoMeasurer::new(CHAR_WIDTH, LINE_HEIGHT)),
        doc,
    )
    .expect("initial layout")
}

/// Every line's content width, trailing whitespace of its last atomic
/// excluded, must fit the line.
fn assert_fit_invariant(tree: &BoxTree) {
    for &page in tree.children(tree.root()) {
        for &block in tree.children(page) {
            for &line in tree.children(block) {
                let inlines = tree.children(line);
                let full: f64 = inlines.iter().map(|&i| tree.inline_width(i)).sum();
                let trailing = inlines
                    .last()
                    .map(|&i| tree.inline_width(i) - tree.inline_width_sans_trailing(i))
                    .unwrap_or(0.0);
                let content = full - trailing;
                assert!(
                    content <= tree.line_width(line) + 1e-6,
                    "line content {content} exceeds width {}",
                    tree.line_width(line)
                );
            }
        }
    }
}

/// Flow containers are deleted the instant they become childless.
fn assert_no_empty_flows(tree: &BoxTree) {
    for &page in tree.children(tree.root()) {
        assert_eq!(tree.kind(page), Some(BoxKind::PageFlow));
        assert!(!tree.children(page).is_empty(), "empty page flow");
        for &block in tree.children(page) {
            for &line in tree.children(block) {
                assert_eq!(tree.kind(line), Some(BoxKind::LineFlow));
                assert!(!tree.children(line).is_empty(), "empty line flow");
            }
        }
    }
}

proptest! {
    /// Laying out any document preserves its atomic content exactly and
    /// leaves every line within its width.
    #[test]
    fn prop_layout_preserves_content(
        words in proptest::collection::vec("[a-z]{1,12} ?", 1..40),
        width in 30.0..300.0f64,
        height in 15.0..200.0f64,
    ) {
        let doc = doc_from_words(&words, width, height);
        let engine = engine_for(&doc);
        let tree = engine.tree();

        prop_assert_eq!(tree.text(), words.concat());
        assert_fit_invariant(tree);
        assert_no_empty_flows(tree);

        // A pass with no intervening change leaves the layout untouched.
        let snapshot = engine.snapshot();
        let mut engine = engine;
        engine.sync(&doc).expect("no-op pass");
        prop_assert_eq!(engine.snapshot(), snapshot);
    }

    /// Editing one word and re-syncing keeps the mirror exact and never
    /// lowers a surviving box's version.
    #[test]
    fn prop_incremental_edit_keeps_mirror(
        words in proptest::collection::vec("[a-z]{1,12} ?", 1..30),
        replacement in "[a-z]{1,12} ?",
        pick in 0usize..1000,
        width in 30.0..300.0f64,
        height in 15.0..200.0f64,
    ) {
        let mut doc = doc_from_words(&words, width, height);
        let mut engine = engine_for(&doc);

        let before: Vec<(folio_layout::BoxId, u64)> = engine
            .tree()
            .atomics()
            .iter()
            .map(|&a| (a, engine.tree().version(a)))
            .collect();

        let index = pick % words.len();
        doc.version = 2;
        doc.children[0].version = 2;
        doc.children[0].children[0].version = 2;
        {
            let atomic = &mut doc.children[0].children[0].children[index];
            atomic.version = 2;
            atomic.content = AtomicContent::Text(replacement.clone());
        }
        engine.sync(&doc).expect("edit pass");

        let mut expected: Vec<String> = words.clone();
        expected[index] = replacement;
        prop_assert_eq!(engine.tree().text(), expected.concat());
        assert_fit_invariant(engine.tree());
        assert_no_empty_flows(engine.tree());
        for (id, old) in before {
            if engine.tree().contains(id) {
                prop_assert!(engine.tree().version(id) >= old);
            }
        }
        prop_assert_eq!(engine.version(), 2);
    }
}

#[test]
fn test_editing_session() {
    // A small editing session: type, wrap, overflow a page, delete.
    let words: Vec<String> = (0..4).map(|i| format!("w{i:02} ")).collect();
    let mut doc = doc_from_words(&words, 120.0, 30.0);
    let mut engine = engine_for(&doc);
    assert_eq!(engine.tree().text(), "w00 w01 w02 w03 ");
    assert_no_empty_flows(engine.tree());

    // Append a second paragraph; the page fills up and splits.
    let mut block = BlockRenderNode::new(NodeId(200), "paragraph");
    block.version = 2;
    let mut inline = InlineRenderNode::new(NodeId(201), "text");
    inline.version = 2;
    for index in 0..6 {
        let mut atomic = AtomicRenderNode::text(NodeId(210 + index as u64), format!("x{index} "));
        atomic.version = 2;
        inline.children.push(atomic);
    }
    block.children.push(inline);
    doc.children.push(block);
    doc.version = 2;
    engine.sync(&doc).unwrap();
    assert!(engine.tree().children(engine.tree().root()).len() >= 2);
    assert_eq!(engine.tree().text(), "w00 w01 w02 w03 x0 x1 x2 x3 x4 x5 ");
    assert_fit_invariant(engine.tree());
    assert_no_empty_flows(engine.tree());

    // Delete the first paragraph; everything shuffles back up.
    doc.children.remove(0);
    doc.version = 3;
    engine.sync(&doc).unwrap();
    assert_eq!(engine.tree().text(), "x0 x1 x2 x3 x4 x5 ");
    assert_fit_invariant(engine.tree());
    assert_no_empty_flows(engine.tree());
    assert_eq!(engine.version(), 3);
}

//! The layout engine: reconcile, reflow, version, notify.
//!
//! One pass runs to completion before the next may start; the box tree is
//! only consistent between passes. Consumers should read it (or take a
//! [`DocSnapshot`](crate::DocSnapshot)) from a layout-updated notification,
//! never mid-pass.

use folio_core::render::DocRenderNode;
use tracing::debug;

use crate::error::{LayoutError, Result};
use crate::measure::Measurer;
use crate::reflow::{reflow_line, reflow_page};
use crate::registry::BoxRegistry;
use crate::snapshot::{self, DocSnapshot};
use crate::sync::reconcile;
use crate::tree::BoxTree;

/// Notification that a pass completed and a new consistent box tree
/// exists. Consumers re-read the tree; the payload carries only the render
/// version the tree now reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutUpdated {
    pub version: u64,
}

type Listener = Box<dyn FnMut(&LayoutUpdated)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Syncing,
}

/// The incremental layout engine.
///
/// Owns the box tree and keeps it mirroring the render tree across passes.
/// A pass reconciles structure, reflows exactly the flow containers whose
/// content changed, adopts the render tree's version and notifies
/// listeners.
///
/// A pass that fails leaves the tree in an unspecified state; the engine
/// then refuses further passes with [`LayoutError::Poisoned`]. Rebuild the
/// engine to recover.
pub struct LayoutEngine {
    tree: BoxTree,
    registry: BoxRegistry,
    measurer: Box<dyn Measurer>,
    version: u64,
    state: EngineState,
    listeners: Vec<Listener>,
}

impl LayoutEngine {
    /// Create an engine and lay out `doc` from scratch. The first pass
    /// starts from an empty box tree, so everything is inserted.
    pub fn new(
        registry: BoxRegistry,
        measurer: Box<dyn Measurer>,
        doc: &DocRenderNode,
    ) -> Result<Self> {
        let mut engine = Self {
            tree: BoxTree::new(doc.id, doc.page_config),
            registry,
            measurer,
            version: 0,
            state: EngineState::Idle,
            listeners: Vec::new(),
        };
        engine.sync(doc)?;
        Ok(engine)
    }

    /// Run one layout pass against the current render tree.
    pub fn sync(&mut self, doc: &DocRenderNode) -> Result<()> {
        if self.state != EngineState::Idle {
            return Err(LayoutError::Poisoned);
        }
        self.state = EngineState::Syncing;
        let updates = reconcile(
            &mut self.tree,
            doc,
            &self.registry,
            self.measurer.as_ref(),
            self.version,
        )?;
        let version = doc.version;
        debug!(
            version,
            lines = updates.lines.len(),
            pages = updates.pages.len(),
            "layout pass"
        );
        for line in updates.lines {
            reflow_line(&mut self.tree, self.measurer.as_ref(), line, version)?;
        }
        for page in updates.pages {
            reflow_page(&mut self.tree, page, version)?;
        }
        self.version = version;
        self.state = EngineState::Idle;
        let event = LayoutUpdated { version };
        for listener in &mut self.listeners {
            listener(&event);
        }
        Ok(())
    }

    /// The box tree. Only read this between passes.
    pub fn tree(&self) -> &BoxTree {
        &self.tree
    }

    /// The render version the box tree currently reflects.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Take an owned snapshot of the current box tree.
    pub fn snapshot(&self) -> DocSnapshot {
        snapshot::snapshot(&self.tree, self.version)
    }

    /// Register a listener for layout-updated notifications.
    pub fn on_layout_updated(&mut self, listener: impl FnMut(&LayoutUpdated) + 'static) {
        self.listeners.push(Box::new(listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::render::{AtomicRenderNode, BlockRenderNode, InlineRenderNode};
    use folio_core::types::{NodeId, Padding, PageConfig};
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::measure::MonoMeasurer;
    use crate::tree::BoxKind;

    // 120 x 30 content box, 10-unit characters and lines.
    fn page_config() -> PageConfig {
        PageConfig::new(140.0, 50.0, Padding::uniform(10.0))
    }

    fn doc_with_words(words: &[&str]) -> DocRenderNode {
        let mut doc = DocRenderNode::new(NodeId(1), page_config());
        let mut block = BlockRenderNode::new(NodeId(2), "paragraph");
        let mut inline = InlineRenderNode::new(NodeId(3), "text");
        for (index, word) in words.iter().enumerate() {
            inline
                .children
                .push(AtomicRenderNode::text(NodeId(10 + index as u64), *word));
        }
        block.children.push(inline);
        doc.children.push(block);
        doc
    }

    fn engine(doc: &DocRenderNode) -> LayoutEngine {
        LayoutEngine::new(
            BoxRegistry::with_defaults(),
            Box::new(MonoMeasurer::new(10.0, 10.0)),
            doc,
        )
        .unwrap()
    }

    fn bump_all(doc: &mut DocRenderNode, version: u64) {
        doc.version = version;
        for block in &mut doc.children {
            block.version = version;
            for inline in &mut block.children {
                inline.version = version;
                for atomic in &mut inline.children {
                    atomic.version = version;
                }
            }
        }
    }

    #[test]
    fn test_initial_layout_wraps_paragraph() {
        let doc = doc_with_words(&["Hello ", "world, ", "this ", "is ", "a ", "long ", "para "]);
        let engine = engine(&doc);
        let tree = engine.tree();

        // Wrapped into several lines, each under the limit, order intact.
        let page = tree.children(tree.root())[0];
        let block = tree.children(page)[0];
        assert!(tree.children(block).len() > 1);
        assert_eq!(tree.text(), "Hello world, this is a long para ");
        for &line in tree.children(block) {
            let total: f64 = tree
                .children(line)
                .iter()
                .map(|&inline| tree.inline_width_sans_trailing(inline))
                .sum();
            assert!(total <= 120.0);
        }
        assert_eq!(engine.version(), doc.version);
    }

    #[test]
    fn test_noop_pass_changes_nothing() {
        let doc = doc_with_words(&["one ", "two ", "six ", "ten "]);
        let mut engine = engine(&doc);
        let before = engine.snapshot();

        engine.sync(&doc).unwrap();
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_versions_are_monotonic() {
        let mut doc = doc_with_words(&["one ", "two ", "six ", "ten "]);
        let mut engine = engine(&doc);
        let before: Vec<(crate::tree::BoxId, u64)> = engine
            .tree()
            .atomics()
            .iter()
            .map(|&a| (a, engine.tree().version(a)))
            .collect();

        bump_all(&mut doc, 5);
        engine.sync(&doc).unwrap();
        for (id, old) in before {
            if engine.tree().contains(id) {
                assert!(engine.tree().version(id) >= old);
            }
        }
        assert_eq!(engine.version(), 5);
    }

    #[test]
    fn test_grow_overflows_then_shrink_rejoins() {
        let mut doc = doc_with_words(&["w00 ", "w01 ", "w02 "]);
        let mut engine = engine(&doc);
        assert_eq!(engine.tree().children(engine.tree().root()).len(), 1);

        // Grow the paragraph until it overflows the page.
        for index in 3..10 {
            doc.children[0].children[0]
                .children
                .push(AtomicRenderNode::text(
                    NodeId(10 + index as u64),
                    format!("w{index:02} "),
                ));
        }
        bump_all(&mut doc, 2);
        engine.sync(&doc).unwrap();
        {
            let tree = engine.tree();
            let pages = tree.children(tree.root());
            assert_eq!(pages.len(), 2);
            // The tail fragment shares the source block's identity.
            let first = tree.children(pages[0])[0];
            let second = tree.children(pages[1])[0];
            assert_eq!(tree.render_id(first), Some(NodeId(2)));
            assert_eq!(tree.render_id(second), Some(NodeId(2)));
        }

        // Shrink back: the fragment is rejoined and the page disappears.
        doc.children[0].children[0].children.truncate(3);
        bump_all(&mut doc, 3);
        engine.sync(&doc).unwrap();
        let tree = engine.tree();
        let pages = tree.children(tree.root());
        assert_eq!(pages.len(), 1);
        assert_eq!(tree.children(pages[0]).len(), 1);
        assert_eq!(tree.text(), "w00 w01 w02 ");
    }

    #[test]
    fn test_no_empty_flow_containers() {
        let mut doc = doc_with_words(&["w00 ", "w01 ", "w02 ", "w03 ", "w04 ", "w05 "]);
        let mut engine = engine(&doc);

        doc.children[0].children[0].children.truncate(1);
        bump_all(&mut doc, 2);
        engine.sync(&doc).unwrap();

        let tree = engine.tree();
        for &page in tree.children(tree.root()) {
            assert!(!tree.children(page).is_empty());
            for &block in tree.children(page) {
                for &line in tree.children(block) {
                    assert_eq!(tree.kind(line), Some(BoxKind::LineFlow));
                    assert!(!tree.children(line).is_empty());
                }
            }
        }
    }

    #[test]
    fn test_listener_notified_with_version() {
        let doc = doc_with_words(&["one "]);
        let mut engine = engine(&doc);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.on_layout_updated(move |event| sink.borrow_mut().push(event.version));

        let mut doc = doc;
        bump_all(&mut doc, 7);
        engine.sync(&doc).unwrap();
        assert_eq!(*seen.borrow(), vec![7]);
    }

    #[test]
    fn test_failed_pass_poisons_engine() {
        let mut doc = doc_with_words(&["one "]);
        let mut engine = engine(&doc);

        // Introduce a block type with no registered constructor.
        doc.children
            .push(BlockRenderNode::new(NodeId(90), "sidebar"));
        bump_all(&mut doc, 2);
        doc.children[1].version = 2;
        assert!(engine.sync(&doc).is_err());

        // The engine refuses to run again.
        assert!(matches!(engine.sync(&doc), Err(LayoutError::Poisoned)));
    }

    #[test]
    fn test_page_setup_change_reflows_everything() {
        let mut doc = doc_with_words(&["w00 ", "w01 ", "w02 ", "w03 "]);
        let mut engine = engine(&doc);
        {
            let tree = engine.tree();
            let block = tree.children(tree.children(tree.root())[0])[0];
            assert_eq!(tree.children(block).len(), 2);
        }

        // Widen the page so everything fits on one line. Only the doc node
        // changes.
        doc.page_config = PageConfig::new(300.0, 50.0, Padding::uniform(10.0));
        doc.version = 2;
        engine.sync(&doc).unwrap();
        let tree = engine.tree();
        assert_eq!(tree.doc_config().width, 300.0);
    }
}

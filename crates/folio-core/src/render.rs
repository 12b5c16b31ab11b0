//! The render tree: the logical document structure consumed by layout.
//!
//! The render tree is owned and mutated by the upstream edit pipeline; the
//! layout engine only reads it. Three structural levels hang off the
//! document root: blocks (paragraphs, headings), inlines (styled runs) and
//! atomics (words, embedded objects — the indivisible flow units).
//!
//! # Version contract
//!
//! Every node carries a `version` that the edit pipeline must strictly
//! increase whenever the node's own content *or any descendant's* content
//! changes. Versions start at 1; the layout engine uses 0 as its
//! "never synced" floor. Node identities are stable: a node keeps its
//! [`NodeId`] for its whole life and ids are never reused. Children are
//! inserted and deleted in place but never reordered with preserved
//! identity.

use crate::types::{NodeId, PageConfig};

/// The document root of the render tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocRenderNode {
    pub id: NodeId,
    pub version: u64,
    /// Page geometry shared by every page of this document.
    pub page_config: PageConfig,
    pub children: Vec<BlockRenderNode>,
}

impl DocRenderNode {
    /// Create an empty document.
    pub fn new(id: NodeId, page_config: PageConfig) -> Self {
        Self {
            id,
            version: 1,
            page_config,
            children: Vec::new(),
        }
    }
}

/// A block-level node (paragraph, heading, ...).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockRenderNode {
    pub id: NodeId,
    pub version: u64,
    /// Declared element type, used to select the box constructor.
    pub element_type: String,
    pub children: Vec<InlineRenderNode>,
}

impl BlockRenderNode {
    /// Create an empty block of the given element type.
    pub fn new(id: NodeId, element_type: impl Into<String>) -> Self {
        Self {
            id,
            version: 1,
            element_type: element_type.into(),
            children: Vec::new(),
        }
    }
}

/// An inline-level node (a styled run of content).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InlineRenderNode {
    pub id: NodeId,
    pub version: u64,
    pub element_type: String,
    pub children: Vec<AtomicRenderNode>,
}

impl InlineRenderNode {
    /// Create an empty inline of the given element type.
    pub fn new(id: NodeId, element_type: impl Into<String>) -> Self {
        Self {
            id,
            version: 1,
            element_type: element_type.into(),
            children: Vec::new(),
        }
    }
}

/// An atomic node: the smallest unit the line breaker will not look inside,
/// except to width-slice text that is wider than a whole line.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomicRenderNode {
    pub id: NodeId,
    pub version: u64,
    pub element_type: String,
    pub content: AtomicContent,
}

impl AtomicRenderNode {
    /// Create an atomic node.
    pub fn new(id: NodeId, element_type: impl Into<String>, content: AtomicContent) -> Self {
        Self {
            id,
            version: 1,
            element_type: element_type.into(),
            content,
        }
    }

    /// Create a text atomic with the `"text"` element type.
    pub fn text(id: NodeId, text: impl Into<String>) -> Self {
        Self::new(id, "text", AtomicContent::Text(text.into()))
    }
}

/// Content of an atomic node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AtomicContent {
    /// A run of text, usually one word plus its trailing whitespace.
    /// Sliceable at character granularity.
    Text(String),
    /// An embedded object with an intrinsic size (image, formula, ...).
    /// Never sliced.
    Object { width: f64, height: f64 },
}

impl AtomicContent {
    /// Selectable size of this content: characters for text, 1 for an
    /// object.
    pub fn len(&self) -> usize {
        match self {
            AtomicContent::Text(text) => text.chars().count(),
            AtomicContent::Object { .. } => 1,
        }
    }

    /// Whether the content is empty. Objects are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            AtomicContent::Text(text) => text.is_empty(),
            AtomicContent::Object { .. } => false,
        }
    }

    /// Length of the trailing whitespace run, in characters.
    pub fn trailing_whitespace_len(&self) -> usize {
        match self {
            AtomicContent::Text(text) => text.chars().rev().take_while(|c| *c == ' ').count(),
            AtomicContent::Object { .. } => 0,
        }
    }

    /// Split text content after `n` characters, returning the tail.
    /// Splitting an object returns an empty text tail (objects are
    /// indivisible).
    pub fn split_off(&mut self, n: usize) -> AtomicContent {
        match self {
            AtomicContent::Text(text) => {
                let byte = text
                    .char_indices()
                    .nth(n)
                    .map(|(i, _)| i)
                    .unwrap_or(text.len());
                AtomicContent::Text(text.split_off(byte))
            }
            AtomicContent::Object { .. } => AtomicContent::Text(String::new()),
        }
    }

    /// Concatenate another fragment onto this one. Only text joins text;
    /// objects are never fragmented so there is nothing to rejoin.
    pub fn join(&mut self, other: &AtomicContent) {
        if let (AtomicContent::Text(text), AtomicContent::Text(tail)) = (&mut *self, other) {
            text.push_str(tail);
        }
    }
}

/// A borrowed reference to a render node of any level.
///
/// Gives the tree reconciler one uniform view over the four node types:
/// identity, version, declared element type and ordered children.
#[derive(Debug, Clone, Copy)]
pub enum RenderRef<'a> {
    Doc(&'a DocRenderNode),
    Block(&'a BlockRenderNode),
    Inline(&'a InlineRenderNode),
    Atomic(&'a AtomicRenderNode),
}

impl<'a> RenderRef<'a> {
    /// Stable identity of the referenced node.
    pub fn id(self) -> NodeId {
        match self {
            RenderRef::Doc(node) => node.id,
            RenderRef::Block(node) => node.id,
            RenderRef::Inline(node) => node.id,
            RenderRef::Atomic(node) => node.id,
        }
    }

    /// Version of the referenced node.
    pub fn version(self) -> u64 {
        match self {
            RenderRef::Doc(node) => node.version,
            RenderRef::Block(node) => node.version,
            RenderRef::Inline(node) => node.version,
            RenderRef::Atomic(node) => node.version,
        }
    }

    /// Declared element type. The document root has no declared type.
    pub fn element_type(self) -> &'a str {
        match self {
            RenderRef::Doc(_) => "doc",
            RenderRef::Block(node) => &node.element_type,
            RenderRef::Inline(node) => &node.element_type,
            RenderRef::Atomic(node) => &node.element_type,
        }
    }

    /// Ordered children, one level down.
    pub fn children(self) -> Vec<RenderRef<'a>> {
        match self {
            RenderRef::Doc(node) => node.children.iter().map(RenderRef::Block).collect(),
            RenderRef::Block(node) => node.children.iter().map(RenderRef::Inline).collect(),
            RenderRef::Inline(node) => node.children.iter().map(RenderRef::Atomic).collect(),
            RenderRef::Atomic(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_content_len() {
        assert_eq!(AtomicContent::Text("hello ".into()).len(), 6);
        assert_eq!(
            AtomicContent::Object {
                width: 40.0,
                height: 30.0
            }
            .len(),
            1
        );
    }

    #[test]
    fn test_trailing_whitespace_len() {
        assert_eq!(
            AtomicContent::Text("word  ".into()).trailing_whitespace_len(),
            2
        );
        assert_eq!(AtomicContent::Text("word".into()).trailing_whitespace_len(), 0);
        assert_eq!(AtomicContent::Text("   ".into()).trailing_whitespace_len(), 3);
    }

    #[test]
    fn test_split_off_preserves_order() {
        let mut content = AtomicContent::Text("abcdef".into());
        let tail = content.split_off(2);
        assert_eq!(content, AtomicContent::Text("ab".into()));
        assert_eq!(tail, AtomicContent::Text("cdef".into()));
    }

    #[test]
    fn test_join_concatenates_text() {
        let mut head = AtomicContent::Text("ab".into());
        head.join(&AtomicContent::Text("cd".into()));
        assert_eq!(head, AtomicContent::Text("abcd".into()));
    }

    #[test]
    fn test_render_ref_children() {
        let mut doc = DocRenderNode::new(NodeId(1), PageConfig::default());
        let mut block = BlockRenderNode::new(NodeId(2), "paragraph");
        let mut inline = InlineRenderNode::new(NodeId(3), "text");
        inline.children.push(AtomicRenderNode::text(NodeId(4), "hi"));
        block.children.push(inline);
        doc.children.push(block);

        let root = RenderRef::Doc(&doc);
        let blocks = root.children();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id(), NodeId(2));
        let inlines = blocks[0].children();
        assert_eq!(inlines[0].element_type(), "text");
        let atomics = inlines[0].children();
        assert_eq!(atomics[0].id(), NodeId(4));
        assert!(atomics[0].children().is_empty());
    }
}

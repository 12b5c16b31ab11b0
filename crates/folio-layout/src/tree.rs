//! The box tree: the physical layout structure.
//!
//! Six kinds of box form a fixed hierarchy:
//!
//! ```text
//! Doc → PageFlow → Block → LineFlow → Inline → Atomic
//! ```
//!
//! Doc, Block, Inline and Atomic boxes mirror render nodes and carry the
//! render node's id; PageFlow and LineFlow are flow containers invented by
//! the engine to host page and line breaks, with no render counterpart.
//! A render node normally maps to exactly one box, but reflow may split a
//! Block, Inline or Atomic across flow boundaries, in which case the
//! fragments share the render id and sit adjacent in document order.
//!
//! Boxes live in an id-indexed arena. A deleted box simply disappears from
//! the arena, so liveness is a [`BoxTree::contains`] check — which is how
//! reflow recognises boxes that an earlier step of the same pass already
//! consumed.

use std::collections::HashMap;

use folio_core::render::AtomicContent;
use folio_core::types::{NodeId, PageConfig};
use glam::Vec2;

use crate::error::{LayoutError, Result};
use crate::measure::AtomicMetrics;

/// Unique identifier for a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxId(pub u64);

/// Structural kind of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxKind {
    Doc,
    PageFlow,
    Block,
    LineFlow,
    Inline,
    Atomic,
}

impl BoxKind {
    /// Lower-case name, used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            BoxKind::Doc => "doc",
            BoxKind::PageFlow => "page flow",
            BoxKind::Block => "block",
            BoxKind::LineFlow => "line flow",
            BoxKind::Inline => "inline",
            BoxKind::Atomic => "atomic",
        }
    }
}

/// Axis-aligned rectangle, used by the query and snapshot surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    /// Position relative to the containing page (or document for pages).
    pub x: f64,
    pub y: f64,
    /// Size of the region.
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Create bounds with position and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create bounds from position and size vectors.
    pub fn from_vecs(position: Vec2, size: Vec2) -> Self {
        Self {
            x: position.x as f64,
            y: position.y as f64,
            width: size.x as f64,
            height: size.y as f64,
        }
    }

    /// Get position as Vec2.
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Get size as Vec2.
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Get the right edge (x + width).
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Get the bottom edge (y + height).
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Payload of the document root box.
#[derive(Debug, Clone, PartialEq)]
pub struct DocBox {
    pub render_id: NodeId,
    /// Geometry shared by every page.
    pub page_config: PageConfig,
}

/// Payload of a page flow box: one printable page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFlowBox {
    pub config: PageConfig,
}

impl PageFlowBox {
    /// Usable content height after margins.
    pub fn inner_height(&self) -> f64 {
        self.config.inner_height()
    }
}

/// Payload of a block box.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockBox {
    pub render_id: NodeId,
    pub element_type: String,
    /// Content width, inherited from the page's inner width.
    pub width: f64,
}

impl BlockBox {
    /// Create a block box shell; content arrives through the update step.
    pub fn new(render_id: NodeId, element_type: impl Into<String>) -> Self {
        Self {
            render_id,
            element_type: element_type.into(),
            width: 0.0,
        }
    }
}

/// Payload of a line flow box: one line of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFlowBox {
    /// Fixed line width, equal to the owning block's content width.
    pub width: f64,
}

/// Payload of an inline box.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineBox {
    pub render_id: NodeId,
    pub element_type: String,
}

impl InlineBox {
    /// Create an inline box shell.
    pub fn new(render_id: NodeId, element_type: impl Into<String>) -> Self {
        Self {
            render_id,
            element_type: element_type.into(),
        }
    }
}

/// Payload of an atomic box, or of a width-sliced fragment of one.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicBox {
    pub render_id: NodeId,
    pub element_type: String,
    pub content: AtomicContent,
    /// Extents as measured by the measurement collaborator.
    pub metrics: AtomicMetrics,
}

impl AtomicBox {
    /// Create an atomic box shell; content and metrics arrive through the
    /// update step.
    pub fn new(render_id: NodeId, element_type: impl Into<String>, content: AtomicContent) -> Self {
        Self {
            render_id,
            element_type: element_type.into(),
            content,
            metrics: AtomicMetrics::default(),
        }
    }
}

/// Kind-specific payload of a box.
#[derive(Debug, Clone, PartialEq)]
pub enum BoxData {
    Doc(DocBox),
    PageFlow(PageFlowBox),
    Block(BlockBox),
    LineFlow(LineFlowBox),
    Inline(InlineBox),
    Atomic(AtomicBox),
}

impl BoxData {
    /// Structural kind of this payload.
    pub fn kind(&self) -> BoxKind {
        match self {
            BoxData::Doc(_) => BoxKind::Doc,
            BoxData::PageFlow(_) => BoxKind::PageFlow,
            BoxData::Block(_) => BoxKind::Block,
            BoxData::LineFlow(_) => BoxKind::LineFlow,
            BoxData::Inline(_) => BoxKind::Inline,
            BoxData::Atomic(_) => BoxKind::Atomic,
        }
    }

    /// Render node this box mirrors, if any. Flow containers have none.
    pub fn render_id(&self) -> Option<NodeId> {
        match self {
            BoxData::Doc(doc) => Some(doc.render_id),
            BoxData::Block(block) => Some(block.render_id),
            BoxData::Inline(inline) => Some(inline.render_id),
            BoxData::Atomic(atomic) => Some(atomic.render_id),
            BoxData::PageFlow(_) | BoxData::LineFlow(_) => None,
        }
    }

    /// Payload for the right-hand fragment of a split. Flow containers get
    /// a fresh container with the same geometry; Block and Inline fragments
    /// share the render id. Doc and Atomic boxes cannot be split this way.
    fn split_payload(&self) -> Option<BoxData> {
        match self {
            BoxData::PageFlow(page) => Some(BoxData::PageFlow(page.clone())),
            BoxData::LineFlow(line) => Some(BoxData::LineFlow(line.clone())),
            BoxData::Block(block) => Some(BoxData::Block(block.clone())),
            BoxData::Inline(inline) => Some(BoxData::Inline(inline.clone())),
            BoxData::Doc(_) | BoxData::Atomic(_) => None,
        }
    }
}

/// A node in the box tree.
#[derive(Debug, Clone)]
pub struct BoxNode {
    pub id: BoxId,
    pub parent: Option<BoxId>,
    pub children: Vec<BoxId>,
    /// Version of the most recent render update that affected this box or
    /// any descendant. Never decreases.
    pub version: u64,
    pub data: BoxData,
}

/// The box tree for one document.
#[derive(Debug, Clone)]
pub struct BoxTree {
    nodes: HashMap<BoxId, BoxNode>,
    root: BoxId,
    next_id: u64,
}

impl BoxTree {
    /// Create a tree holding only the document root box.
    pub fn new(render_id: NodeId, page_config: PageConfig) -> Self {
        let root = BoxId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            BoxNode {
                id: root,
                parent: None,
                children: Vec::new(),
                version: 0,
                data: BoxData::Doc(DocBox {
                    render_id,
                    page_config,
                }),
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    /// The document root box.
    pub fn root(&self) -> BoxId {
        self.root
    }

    /// Number of live boxes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no boxes (never true: the root is permanent).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a box by id.
    pub fn get(&self, id: BoxId) -> Option<&BoxNode> {
        self.nodes.get(&id)
    }

    /// Get a mutable box by id.
    pub fn get_mut(&mut self, id: BoxId) -> Option<&mut BoxNode> {
        self.nodes.get_mut(&id)
    }

    /// Whether `id` refers to a live box.
    pub fn contains(&self, id: BoxId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Structural kind of a box.
    pub fn kind(&self, id: BoxId) -> Option<BoxKind> {
        self.nodes.get(&id).map(|node| node.data.kind())
    }

    /// Render node mirrored by a box, if any.
    pub fn render_id(&self, id: BoxId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.data.render_id())
    }

    /// Version of a box (0 if the box is gone).
    pub fn version(&self, id: BoxId) -> u64 {
        self.nodes.get(&id).map(|node| node.version).unwrap_or(0)
    }

    /// Raise a box's version to `version`. Versions never decrease.
    pub fn set_version(&mut self, id: BoxId, version: u64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.version = node.version.max(version);
        }
    }

    /// Raise the versions of a box and all its descendants.
    pub fn touch_subtree(&mut self, id: BoxId, version: u64) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&current) {
                node.version = node.version.max(version);
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Parent of a box.
    pub fn parent(&self, id: BoxId) -> Option<BoxId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Ordered children of a box.
    pub fn children(&self, id: BoxId) -> &[BoxId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Offset of `child` among `parent`'s children.
    pub fn child_offset(&self, parent: BoxId, child: BoxId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Allocate a detached box with the given payload.
    pub fn alloc(&mut self, data: BoxData) -> BoxId {
        let id = BoxId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            BoxNode {
                id,
                parent: None,
                children: Vec::new(),
                version: 0,
                data,
            },
        );
        id
    }

    /// Attach a detached box under `parent` at `offset`.
    pub fn insert_child(&mut self, parent: BoxId, offset: usize, child: BoxId) -> Result<()> {
        if !self.nodes.contains_key(&child) {
            return Err(LayoutError::MissingBox(child));
        }
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(LayoutError::MissingBox(parent))?;
        let offset = offset.min(parent_node.children.len());
        parent_node.children.insert(offset, child);
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
        Ok(())
    }

    /// Allocate a box for `data` and attach it under `parent` at `offset`.
    pub fn insert_data(&mut self, parent: BoxId, offset: usize, data: BoxData) -> Result<BoxId> {
        let id = self.alloc(data);
        self.insert_child(parent, offset, id)?;
        Ok(id)
    }

    /// Move a box from its current parent to `new_parent` at `offset`.
    pub fn reparent(&mut self, child: BoxId, new_parent: BoxId, offset: usize) -> Result<()> {
        self.detach(child)?;
        self.insert_child(new_parent, offset, child)
    }

    /// Detach a box from its parent, leaving it (and its subtree) live.
    fn detach(&mut self, id: BoxId) -> Result<()> {
        let parent = self
            .nodes
            .get(&id)
            .ok_or(LayoutError::MissingBox(id))?
            .parent;
        if let Some(parent) = parent {
            let parent_node = self
                .nodes
                .get_mut(&parent)
                .ok_or(LayoutError::MissingBox(parent))?;
            let offset = parent_node
                .children
                .iter()
                .position(|&c| c == id)
                .ok_or(LayoutError::MissingChild)?;
            parent_node.children.remove(offset);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        Ok(())
    }

    /// Delete a box and its whole subtree.
    pub fn delete(&mut self, id: BoxId) -> Result<()> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Split a box's children after `offset`: children `[offset..]` move
    /// into a fresh fragment attached under `dest_parent` at `dest_offset`.
    ///
    /// Flow containers yield a fresh container with the same geometry;
    /// Block and Inline boxes yield a fragment sharing the render id.
    /// The fragment may be empty (when `offset` equals the child count).
    pub fn split_at(
        &mut self,
        id: BoxId,
        offset: usize,
        dest_parent: BoxId,
        dest_offset: usize,
    ) -> Result<BoxId> {
        let node = self.nodes.get(&id).ok_or(LayoutError::MissingBox(id))?;
        let payload = node.data.split_payload().ok_or(LayoutError::KindMismatch {
            expected: "splittable",
            found: node.data.kind().as_str(),
        })?;
        let moved: Vec<BoxId> = {
            let node = self
                .nodes
                .get_mut(&id)
                .ok_or(LayoutError::MissingBox(id))?;
            let offset = offset.min(node.children.len());
            node.children.split_off(offset)
        };
        let fragment = self.alloc(payload);
        self.insert_child(dest_parent, dest_offset, fragment)?;
        for (index, child) in moved.iter().enumerate() {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = Some(fragment);
            }
            if let Some(fragment_node) = self.nodes.get_mut(&fragment) {
                fragment_node.children.insert(index, *child);
            }
        }
        Ok(fragment)
    }

    /// Join two fragments of the same render node: `right`'s content is
    /// appended to `left` and `right` is deleted. Returns `right`'s former
    /// parent so the caller can clean up an emptied flow container.
    pub fn join(&mut self, left: BoxId, right: BoxId) -> Result<BoxId> {
        let left_kind = self.kind(left).ok_or(LayoutError::MissingBox(left))?;
        let right_kind = self.kind(right).ok_or(LayoutError::MissingBox(right))?;
        if left_kind != right_kind {
            return Err(LayoutError::KindMismatch {
                expected: left_kind.as_str(),
                found: right_kind.as_str(),
            });
        }
        let former_parent = self
            .parent(right)
            .ok_or(LayoutError::MissingChild)?;
        match left_kind {
            BoxKind::Block | BoxKind::Inline => {
                let moved = self.children(right).to_vec();
                for child in moved {
                    let end = self.children(left).len();
                    self.reparent(child, left, end)?;
                }
                self.delete(right)?;
            }
            BoxKind::Atomic => {
                let (content, metrics) = match self.nodes.get(&right).map(|node| &node.data) {
                    Some(BoxData::Atomic(atomic)) => (atomic.content.clone(), atomic.metrics),
                    _ => {
                        return Err(LayoutError::KindMismatch {
                            expected: "atomic",
                            found: right_kind.as_str(),
                        })
                    }
                };
                if let Some(BoxData::Atomic(atomic)) =
                    self.nodes.get_mut(&left).map(|node| &mut node.data)
                {
                    atomic.content.join(&content);
                    atomic.metrics.width += metrics.width;
                    atomic.metrics.height = atomic.metrics.height.max(metrics.height);
                    atomic.metrics.trailing_whitespace_width = metrics.trailing_whitespace_width;
                }
                self.delete(right)?;
            }
            _ => {
                return Err(LayoutError::KindMismatch {
                    expected: "joinable",
                    found: left_kind.as_str(),
                })
            }
        }
        Ok(former_parent)
    }

    /// Page geometry of the document root.
    pub fn doc_config(&self) -> PageConfig {
        match self.nodes.get(&self.root).map(|node| &node.data) {
            Some(BoxData::Doc(doc)) => doc.page_config,
            _ => PageConfig::default(),
        }
    }

    /// Page geometry of a page flow box.
    pub fn page_config(&self, id: BoxId) -> Option<PageConfig> {
        match self.nodes.get(&id).map(|node| &node.data) {
            Some(BoxData::PageFlow(page)) => Some(page.config),
            _ => None,
        }
    }

    /// Usable content height of a page flow box.
    pub fn page_inner_height(&self, id: BoxId) -> f64 {
        self.page_config(id)
            .map(|config| config.inner_height())
            .unwrap_or(0.0)
    }

    /// Fixed width of a line flow box.
    pub fn line_width(&self, id: BoxId) -> f64 {
        match self.nodes.get(&id).map(|node| &node.data) {
            Some(BoxData::LineFlow(line)) => line.width,
            _ => 0.0,
        }
    }

    /// Content width of a block box.
    pub fn block_width(&self, id: BoxId) -> f64 {
        match self.nodes.get(&id).map(|node| &node.data) {
            Some(BoxData::Block(block)) => block.width,
            _ => 0.0,
        }
    }

    /// Measured metrics of an atomic box.
    pub fn atomic_metrics(&self, id: BoxId) -> AtomicMetrics {
        match self.nodes.get(&id).map(|node| &node.data) {
            Some(BoxData::Atomic(atomic)) => atomic.metrics,
            _ => AtomicMetrics::default(),
        }
    }

    /// Content of an atomic box.
    pub fn atomic_content(&self, id: BoxId) -> Option<&AtomicContent> {
        match self.nodes.get(&id).map(|node| &node.data) {
            Some(BoxData::Atomic(atomic)) => Some(&atomic.content),
            _ => None,
        }
    }

    /// Full advance width of an atomic box.
    pub fn atomic_width(&self, id: BoxId) -> f64 {
        self.atomic_metrics(id).width
    }

    /// Atomic width with trailing whitespace excluded.
    pub fn atomic_width_sans_trailing(&self, id: BoxId) -> f64 {
        self.atomic_metrics(id).width_sans_trailing_whitespace()
    }

    /// Full advance width of an inline box: the sum of its atomics.
    pub fn inline_width(&self, id: BoxId) -> f64 {
        self.children(id)
            .iter()
            .map(|&atomic| self.atomic_width(atomic))
            .sum()
    }

    /// Inline width with the last atomic's trailing whitespace excluded.
    pub fn inline_width_sans_trailing(&self, id: BoxId) -> f64 {
        let children = self.children(id);
        let trailing = children
            .last()
            .map(|&atomic| self.atomic_metrics(atomic).trailing_whitespace_width)
            .unwrap_or(0.0);
        self.inline_width(id) - trailing
    }

    /// Height of a box.
    ///
    /// Atomics report their measured height; inlines and line flows the max
    /// of their children; blocks the sum of their lines; pages their full
    /// page height; the document the sum of its pages.
    pub fn height(&self, id: BoxId) -> f64 {
        match self.nodes.get(&id).map(|node| &node.data) {
            Some(BoxData::Atomic(atomic)) => atomic.metrics.height,
            Some(BoxData::Inline(_)) | Some(BoxData::LineFlow(_)) => self
                .children(id)
                .iter()
                .map(|&child| self.height(child))
                .fold(0.0, f64::max),
            Some(BoxData::Block(_)) => self
                .children(id)
                .iter()
                .map(|&child| self.height(child))
                .sum(),
            Some(BoxData::PageFlow(page)) => page.config.height,
            Some(BoxData::Doc(_)) => self
                .children(id)
                .iter()
                .map(|&child| self.height(child))
                .sum(),
            None => 0.0,
        }
    }

    /// All atomic boxes in document order.
    pub fn atomics(&self) -> Vec<BoxId> {
        let mut out = Vec::new();
        self.collect_atomics(self.root, &mut out);
        out
    }

    fn collect_atomics(&self, id: BoxId, out: &mut Vec<BoxId>) {
        match self.kind(id) {
            Some(BoxKind::Atomic) => out.push(id),
            Some(_) => {
                for &child in self.children(id) {
                    self.collect_atomics(child, out);
                }
            }
            None => {}
        }
    }

    /// Concatenated text content of the whole document, in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for atomic in self.atomics() {
            if let Some(AtomicContent::Text(text)) = self.atomic_content(atomic) {
                out.push_str(text);
            }
        }
        out
    }
}

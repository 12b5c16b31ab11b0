//! Order-preserving reconciliation between the render tree and the box
//! tree.
//!
//! The diff walks both trees in lock-step, one structural level at a time
//! (doc → block, block → inline, inline → atomic), matching children by
//! render id. Children are only ever inserted, updated or deleted at their
//! current position — the upstream edit pipeline never reorders children
//! with preserved identity, so there is no move detection.
//!
//! Flow containers (pages, lines) are invisible to the diff: a box's
//! *logical* children flatten through them, and the insert/delete steps
//! translate logical offsets back into the right flow container, creating
//! and deleting containers as they fill and empty.

use std::collections::HashSet;

use folio_core::render::{DocRenderNode, RenderRef};
use tracing::trace;

use crate::error::{LayoutError, Result};
use crate::measure::Measurer;
use crate::registry::BoxRegistry;
use crate::tree::{BoxData, BoxId, BoxKind, BoxTree, LineFlowBox, PageFlowBox};

/// Level adapter for [`sync_nodes`].
///
/// The driver is generic over the two trees; an adapter supplies the
/// per-level operations. `update` doubles as the change gate: returning
/// `false` (no change) prunes the whole subtree from the walk.
pub trait SyncAdapter {
    /// Borrowed source node.
    type Src: Copy;
    /// Destination node handle.
    type DstId: Copy + PartialEq;
    /// Fatal error type.
    type Error;

    /// Ordered source children of `src`.
    fn src_children(&self, src: Self::Src) -> Vec<Self::Src>;

    /// Ordered *logical* destination children of `dst`, flattened through
    /// any interposed flow containers.
    fn dst_children(&self, dst: Self::DstId) -> Vec<Self::DstId>;

    /// Whether `dst` mirrors `src`.
    fn matches(&self, src: Self::Src, dst: Self::DstId) -> bool;

    /// Insert a destination node for `src` at logical offset `offset`
    /// under `dst`, returning the new node.
    fn insert(
        &mut self,
        dst: Self::DstId,
        src: Self::Src,
        offset: usize,
    ) -> std::result::Result<Self::DstId, Self::Error>;

    /// Update `dst` from `src`. Returns `false` when the source has not
    /// changed since the last pass (the no-op fast path).
    fn update(
        &mut self,
        dst: Self::DstId,
        src: Self::Src,
    ) -> std::result::Result<bool, Self::Error>;

    /// Delete `dst` from under `parent`.
    fn delete(
        &mut self,
        parent: Self::DstId,
        dst: Self::DstId,
    ) -> std::result::Result<(), Self::Error>;
}

/// Reconcile the pair `(src, dst)` and, where changed, their subtrees.
///
/// `dst` is updated first; if the source version shows no change the whole
/// subtree is skipped. Otherwise each source child is located among the
/// destination's logical children by identity — inserted if absent, synced
/// recursively if present — and destination children whose source is gone
/// are deleted.
pub fn sync_nodes<A: SyncAdapter>(
    adapter: &mut A,
    src: A::Src,
    dst: A::DstId,
) -> std::result::Result<(), A::Error> {
    if !adapter.update(dst, src)? {
        return Ok(());
    }
    let src_children = adapter.src_children(src);
    for (offset, &src_child) in src_children.iter().enumerate() {
        let existing = adapter
            .dst_children(dst)
            .into_iter()
            .find(|&d| adapter.matches(src_child, d));
        match existing {
            Some(dst_child) => sync_nodes(adapter, src_child, dst_child)?,
            None => {
                let inserted = adapter.insert(dst, src_child, offset)?;
                sync_nodes(adapter, src_child, inserted)?;
            }
        }
    }
    for dst_child in adapter.dst_children(dst) {
        if !src_children.iter().any(|&s| adapter.matches(s, dst_child)) {
            adapter.delete(dst, dst_child)?;
        }
    }
    Ok(())
}

/// Flow containers whose content changed during a pass, deduplicated, in
/// document order. These are exactly the boxes reflow must visit.
#[derive(Debug, Default)]
pub struct SyncUpdates {
    pub lines: Vec<BoxId>,
    pub pages: Vec<BoxId>,
}

/// Reconcile the box tree against the render tree.
pub(crate) fn reconcile(
    tree: &mut BoxTree,
    doc: &DocRenderNode,
    registry: &BoxRegistry,
    measurer: &dyn Measurer,
    last_version: u64,
) -> Result<SyncUpdates> {
    let root = tree.root();
    let mut syncer = LayoutSyncer {
        tree,
        registry,
        measurer,
        last_version,
        updated_lines: Vec::new(),
        updated_pages: Vec::new(),
    };
    sync_nodes(&mut syncer, RenderRef::Doc(doc), root)?;
    Ok(syncer.into_updates())
}

/// [`SyncAdapter`] over the render tree and the box tree.
struct LayoutSyncer<'a> {
    tree: &'a mut BoxTree,
    registry: &'a BoxRegistry,
    measurer: &'a dyn Measurer,
    last_version: u64,
    updated_lines: Vec<BoxId>,
    updated_pages: Vec<BoxId>,
}

impl LayoutSyncer<'_> {
    fn into_updates(self) -> SyncUpdates {
        SyncUpdates {
            lines: dedup(self.updated_lines),
            pages: dedup(self.updated_pages),
        }
    }

    /// Rejoin block fragments left behind by an earlier page reflow.
    /// Adjacent blocks sharing a render id (always adjacent, reflow never
    /// reorders) are concatenated; the join erases page boundaries inside
    /// the block, so the whole joined subtree is touched. Pages emptied by
    /// joins are deleted; every surviving page is marked for reflow.
    fn join_block_fragments(&mut self, doc: BoxId, version: u64) -> Result<()> {
        let pages = self.tree.children(doc).to_vec();
        let mut last: Option<BoxId> = None;
        for page in pages {
            let mut offset = 0;
            while offset < self.tree.children(page).len() {
                let block = self.tree.children(page)[offset];
                match last {
                    Some(prev)
                        if prev != block
                            && self.tree.render_id(prev) == self.tree.render_id(block) =>
                    {
                        trace!(?prev, ?block, "joining block fragments");
                        self.tree.join(prev, block)?;
                        self.tree.touch_subtree(prev, version);
                    }
                    _ => {
                        last = Some(block);
                        offset += 1;
                    }
                }
            }
            if self.tree.children(page).is_empty() {
                self.tree.delete(page)?;
            } else {
                self.updated_pages.push(page);
            }
        }
        Ok(())
    }

    /// Rejoin inline fragments left behind by an earlier line reflow.
    fn join_inline_fragments(&mut self, block: BoxId, version: u64) -> Result<()> {
        let lines = self.tree.children(block).to_vec();
        let mut last: Option<BoxId> = None;
        for line in lines {
            let mut offset = 0;
            while offset < self.tree.children(line).len() {
                let inline = self.tree.children(line)[offset];
                match last {
                    Some(prev)
                        if prev != inline
                            && self.tree.render_id(prev) == self.tree.render_id(inline) =>
                    {
                        self.tree.join(prev, inline)?;
                        self.tree.set_version(prev, version);
                    }
                    _ => {
                        last = Some(inline);
                        offset += 1;
                    }
                }
            }
            if self.tree.children(line).is_empty() {
                self.tree.delete(line)?;
            } else {
                self.updated_lines.push(line);
            }
        }
        Ok(())
    }

    /// Rejoin atomic fragments left behind by width slicing.
    fn join_atomic_fragments(&mut self, inline: BoxId, version: u64) -> Result<()> {
        let mut offset = 0;
        let mut last: Option<BoxId> = None;
        while offset < self.tree.children(inline).len() {
            let atomic = self.tree.children(inline)[offset];
            match last {
                Some(prev)
                    if prev != atomic
                        && self.tree.render_id(prev) == self.tree.render_id(atomic) =>
                {
                    self.tree.join(prev, atomic)?;
                    self.tree.set_version(prev, version);
                }
                _ => {
                    last = Some(atomic);
                    offset += 1;
                }
            }
        }
        Ok(())
    }
}

impl<'a> SyncAdapter for LayoutSyncer<'a> {
    type Src = RenderRef<'a>;
    type DstId = BoxId;
    type Error = LayoutError;

    fn src_children(&self, src: RenderRef<'a>) -> Vec<RenderRef<'a>> {
        src.children()
    }

    fn dst_children(&self, dst: BoxId) -> Vec<BoxId> {
        match self.tree.kind(dst) {
            // Doc and Block interpose a flow level; flatten through it.
            Some(BoxKind::Doc) | Some(BoxKind::Block) => self
                .tree
                .children(dst)
                .iter()
                .flat_map(|&flow| self.tree.children(flow).iter().copied())
                .collect(),
            Some(BoxKind::Inline) => self.tree.children(dst).to_vec(),
            _ => Vec::new(),
        }
    }

    fn matches(&self, src: RenderRef<'a>, dst: BoxId) -> bool {
        self.tree.render_id(dst) == Some(src.id())
    }

    fn insert(&mut self, dst: BoxId, src: RenderRef<'a>, offset: usize) -> Result<BoxId> {
        let parent_kind = self.tree.kind(dst).ok_or(LayoutError::MissingBox(dst))?;
        match (parent_kind, src) {
            (BoxKind::Doc, RenderRef::Block(node)) => {
                let factory = self.registry.block_factory(&node.element_type).ok_or_else(|| {
                    LayoutError::UnknownElement {
                        slot: "block",
                        element_type: node.element_type.clone(),
                    }
                })?;
                let mut data = factory(node);
                if data.kind() != BoxKind::Block {
                    return Err(LayoutError::KindMismatch {
                        expected: "block",
                        found: data.kind().as_str(),
                    });
                }
                let config = self.tree.doc_config();
                if let BoxData::Block(block) = &mut data {
                    block.width = config.inner_width();
                }
                let id = self.tree.alloc(data);
                self.tree.set_version(id, src.version());
                trace!(render_id = ?node.id, offset, "inserting block box");

                // Translate the logical offset into a page and a physical
                // index within it.
                let pages = self.tree.children(dst).to_vec();
                let mut cumulated = 0;
                for page in pages {
                    let len = self.tree.children(page).len();
                    if cumulated + len >= offset {
                        self.tree.insert_child(page, offset - cumulated, id)?;
                        self.updated_pages.push(page);
                        return Ok(id);
                    }
                    cumulated += len;
                }
                // No page had room: grow a trailing page.
                let end = self.tree.children(dst).len();
                let page = self
                    .tree
                    .insert_data(dst, end, BoxData::PageFlow(PageFlowBox { config }))?;
                self.tree.insert_child(page, 0, id)?;
                self.updated_pages.push(page);
                Ok(id)
            }
            (BoxKind::Block, RenderRef::Inline(node)) => {
                let factory = self.registry.inline_factory(&node.element_type).ok_or_else(|| {
                    LayoutError::UnknownElement {
                        slot: "inline",
                        element_type: node.element_type.clone(),
                    }
                })?;
                let data = factory(node);
                if data.kind() != BoxKind::Inline {
                    return Err(LayoutError::KindMismatch {
                        expected: "inline",
                        found: data.kind().as_str(),
                    });
                }
                let width = self.tree.block_width(dst);
                let id = self.tree.alloc(data);
                self.tree.set_version(id, src.version());
                trace!(render_id = ?node.id, offset, "inserting inline box");

                let lines = self.tree.children(dst).to_vec();
                let mut cumulated = 0;
                for line in lines {
                    let len = self.tree.children(line).len();
                    if cumulated + len >= offset {
                        self.tree.insert_child(line, offset - cumulated, id)?;
                        self.updated_lines.push(line);
                        return Ok(id);
                    }
                    cumulated += len;
                }
                let end = self.tree.children(dst).len();
                let line = self
                    .tree
                    .insert_data(dst, end, BoxData::LineFlow(LineFlowBox { width }))?;
                self.tree.insert_child(line, 0, id)?;
                self.updated_lines.push(line);
                Ok(id)
            }
            (BoxKind::Inline, RenderRef::Atomic(node)) => {
                let factory = self.registry.atomic_factory(&node.element_type).ok_or_else(|| {
                    LayoutError::UnknownElement {
                        slot: "atomic",
                        element_type: node.element_type.clone(),
                    }
                })?;
                let data = factory(node);
                if data.kind() != BoxKind::Atomic {
                    return Err(LayoutError::KindMismatch {
                        expected: "atomic",
                        found: data.kind().as_str(),
                    });
                }
                let id = self.tree.insert_data(dst, offset, data)?;
                self.tree.set_version(id, src.version());
                Ok(id)
            }
            (found, _) => Err(LayoutError::KindMismatch {
                expected: expected_child(src),
                found: found.as_str(),
            }),
        }
    }

    fn update(&mut self, dst: BoxId, src: RenderRef<'a>) -> Result<bool> {
        let kind = self.tree.kind(dst).ok_or(LayoutError::MissingBox(dst))?;
        match (kind, src) {
            (BoxKind::Doc, RenderRef::Doc(node)) => {
                if node.version <= self.last_version {
                    return Ok(false);
                }
                self.join_block_fragments(dst, node.version)?;
                if let Some(BoxData::Doc(doc)) = self.tree.get_mut(dst).map(|n| &mut n.data) {
                    doc.page_config = node.page_config;
                }
                let pages = self.tree.children(dst).to_vec();
                for page in pages {
                    if let Some(BoxData::PageFlow(flow)) =
                        self.tree.get_mut(page).map(|n| &mut n.data)
                    {
                        flow.config = node.page_config;
                    }
                }
                self.tree.set_version(dst, node.version);
                Ok(true)
            }
            (BoxKind::Block, RenderRef::Block(node)) => {
                if node.version <= self.last_version {
                    return Ok(false);
                }
                self.join_inline_fragments(dst, node.version)?;
                let width = self.tree.doc_config().inner_width();
                if let Some(BoxData::Block(block)) = self.tree.get_mut(dst).map(|n| &mut n.data) {
                    block.width = width;
                }
                self.tree.set_version(dst, node.version);
                if let Some(page) = self.tree.parent(dst) {
                    self.tree.set_version(page, node.version);
                    self.updated_pages.push(page);
                }
                Ok(true)
            }
            (BoxKind::Inline, RenderRef::Inline(node)) => {
                if node.version <= self.last_version {
                    return Ok(false);
                }
                self.join_atomic_fragments(dst, node.version)?;
                self.tree.set_version(dst, node.version);
                if let Some(line) = self.tree.parent(dst) {
                    self.tree.set_version(line, node.version);
                    self.updated_lines.push(line);
                }
                Ok(true)
            }
            (BoxKind::Atomic, RenderRef::Atomic(node)) => {
                if node.version <= self.last_version {
                    return Ok(false);
                }
                let metrics = self.measurer.measure(&node.content);
                if let Some(BoxData::Atomic(atomic)) = self.tree.get_mut(dst).map(|n| &mut n.data)
                {
                    atomic.content = node.content.clone();
                    atomic.metrics = metrics;
                }
                self.tree.set_version(dst, node.version);
                Ok(true)
            }
            (found, _) => Err(LayoutError::KindMismatch {
                expected: expected_child(src),
                found: found.as_str(),
            }),
        }
    }

    fn delete(&mut self, parent: BoxId, dst: BoxId) -> Result<()> {
        let parent_kind = self.tree.kind(parent).ok_or(LayoutError::MissingBox(parent))?;
        let child_kind = self.tree.kind(dst).ok_or(LayoutError::MissingBox(dst))?;
        trace!(?dst, "deleting box");
        match (parent_kind, child_kind) {
            (BoxKind::Doc, BoxKind::Block) => {
                let page = self.tree.parent(dst).ok_or(LayoutError::MissingChild)?;
                self.tree.delete(dst)?;
                if self.tree.children(page).is_empty() {
                    self.tree.delete(page)?;
                } else {
                    self.updated_pages.push(page);
                }
                Ok(())
            }
            (BoxKind::Block, BoxKind::Inline) => {
                let line = self.tree.parent(dst).ok_or(LayoutError::MissingChild)?;
                self.tree.delete(dst)?;
                if self.tree.children(line).is_empty() {
                    self.tree.delete(line)?;
                } else {
                    self.updated_lines.push(line);
                }
                Ok(())
            }
            (BoxKind::Inline, BoxKind::Atomic) => self.tree.delete(dst),
            (_, found) => Err(LayoutError::KindMismatch {
                expected: "block, inline or atomic",
                found: found.as_str(),
            }),
        }
    }
}

fn expected_child(src: RenderRef<'_>) -> &'static str {
    match src {
        RenderRef::Doc(_) => "doc",
        RenderRef::Block(_) => "block",
        RenderRef::Inline(_) => "inline",
        RenderRef::Atomic(_) => "atomic",
    }
}

fn dedup(ids: Vec<BoxId>) -> Vec<BoxId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

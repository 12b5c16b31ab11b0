//! Owned snapshots of the box tree.
//!
//! The live box tree is only consistent between passes, so consumers that
//! hold layout results across passes (renderers, selection overlays) take
//! a snapshot when a pass completes. Snapshots are plain owned data and
//! serialize with serde.
//!
//! All geometry is page-local except page bounds, which stack the pages
//! vertically in document coordinates.

use folio_core::render::AtomicContent;
use folio_core::types::{NodeId, PageConfig};
use serde::{Deserialize, Serialize};

use crate::tree::{Bounds, BoxTree};

/// Snapshot of the whole document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnapshot {
    /// The render version this layout reflects.
    pub version: u64,
    pub page_config: PageConfig,
    pub pages: Vec<PageSnapshot>,
}

/// Snapshot of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub version: u64,
    /// Page rectangle in document coordinates.
    pub bounds: Bounds,
    pub blocks: Vec<BlockSnapshot>,
}

/// Snapshot of one block (or block fragment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub render_id: NodeId,
    pub version: u64,
    pub bounds: Bounds,
    pub lines: Vec<LineSnapshot>,
}

/// Snapshot of one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub version: u64,
    pub bounds: Bounds,
    pub inlines: Vec<InlineSnapshot>,
}

/// Snapshot of one inline (or inline fragment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineSnapshot {
    pub render_id: NodeId,
    pub version: u64,
    pub bounds: Bounds,
    pub atomics: Vec<AtomicSnapshot>,
}

/// Snapshot of one atomic (or width-sliced fragment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicSnapshot {
    pub render_id: NodeId,
    pub version: u64,
    pub bounds: Bounds,
    pub content: AtomicContent,
}

/// Capture the current box tree as an owned snapshot.
pub fn snapshot(tree: &BoxTree, version: u64) -> DocSnapshot {
    let config = tree.doc_config();
    let mut pages = Vec::new();
    for (index, &page) in tree.children(tree.root()).iter().enumerate() {
        let page_config = tree.page_config(page).unwrap_or(config);
        let mut blocks = Vec::new();
        let mut y = page_config.padding.top;
        for &block in tree.children(page) {
            let Some(block_render_id) = tree.render_id(block) else {
                continue;
            };
            let block_y = y;
            let mut lines = Vec::new();
            for &line in tree.children(block) {
                let line_height = tree.height(line);
                let mut inlines = Vec::new();
                let mut x = page_config.padding.left;
                for &inline in tree.children(line) {
                    let Some(inline_render_id) = tree.render_id(inline) else {
                        continue;
                    };
                    let inline_width = tree.inline_width(inline);
                    let mut atomics = Vec::new();
                    let mut atomic_x = x;
                    for &atomic in tree.children(inline) {
                        let Some(atomic_render_id) = tree.render_id(atomic) else {
                            continue;
                        };
                        let metrics = tree.atomic_metrics(atomic);
                        atomics.push(AtomicSnapshot {
                            render_id: atomic_render_id,
                            version: tree.version(atomic),
                            bounds: Bounds::new(atomic_x, y, metrics.width, metrics.height),
                            content: tree
                                .atomic_content(atomic)
                                .cloned()
                                .unwrap_or(AtomicContent::Text(String::new())),
                        });
                        atomic_x += metrics.width;
                    }
                    inlines.push(InlineSnapshot {
                        render_id: inline_render_id,
                        version: tree.version(inline),
                        bounds: Bounds::new(x, y, inline_width, tree.height(inline)),
                        atomics,
                    });
                    x += inline_width;
                }
                lines.push(LineSnapshot {
                    version: tree.version(line),
                    bounds: Bounds::new(
                        page_config.padding.left,
                        y,
                        tree.line_width(line),
                        line_height,
                    ),
                    inlines,
                });
                y += line_height;
            }
            blocks.push(BlockSnapshot {
                render_id: block_render_id,
                version: tree.version(block),
                bounds: Bounds::new(
                    page_config.padding.left,
                    block_y,
                    tree.block_width(block),
                    y - block_y,
                ),
                lines,
            });
        }
        pages.push(PageSnapshot {
            version: tree.version(page),
            bounds: Bounds::new(
                0.0,
                index as f64 * page_config.height,
                page_config.width,
                page_config.height,
            ),
            blocks,
        });
    }
    DocSnapshot {
        version,
        page_config: config,
        pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::render::{AtomicRenderNode, BlockRenderNode, DocRenderNode, InlineRenderNode};
    use folio_core::types::{NodeId, Padding};
    use crate::engine::LayoutEngine;
    use crate::measure::MonoMeasurer;
    use crate::registry::BoxRegistry;

    fn laid_out(words: &[&str]) -> LayoutEngine {
        let mut doc = DocRenderNode::new(
            NodeId(1),
            PageConfig::new(140.0, 50.0, Padding::uniform(10.0)),
        );
        let mut block = BlockRenderNode::new(NodeId(2), "paragraph");
        let mut inline = InlineRenderNode::new(NodeId(3), "text");
        for (index, word) in words.iter().enumerate() {
            inline
                .children
                .push(AtomicRenderNode::text(NodeId(10 + index as u64), *word));
        }
        block.children.push(inline);
        doc.children.push(block);
        LayoutEngine::new(
            BoxRegistry::with_defaults(),
            Box::new(MonoMeasurer::new(10.0, 10.0)),
            &doc,
        )
        .unwrap()
    }

    #[test]
    fn test_snapshot_mirrors_structure() {
        let engine = laid_out(&["one ", "two ", "six ", "ten "]);
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.pages.len(), 1);
        let block = &snapshot.pages[0].blocks[0];
        assert_eq!(block.render_id, NodeId(2));
        assert_eq!(block.lines.len(), 2);
        // First line: three words starting at the page margin.
        let line = &block.lines[0];
        assert_eq!(line.bounds.x, 10.0);
        assert_eq!(line.bounds.y, 10.0);
        let atomics = &line.inlines[0].atomics;
        assert_eq!(atomics.len(), 3);
        assert_eq!(atomics[0].bounds.x, 10.0);
        assert_eq!(atomics[1].bounds.x, 50.0);
        assert_eq!(atomics[2].bounds.x, 90.0);
        // Second line starts one line height down.
        assert_eq!(block.lines[1].bounds.y, 20.0);
    }

    #[test]
    fn test_snapshot_outlives_later_passes() {
        let engine = laid_out(&["one "]);
        let before = engine.snapshot();
        let again = engine.snapshot();
        assert_eq!(before, again);
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let engine = laid_out(&["one ", "two "]);
        let snapshot = engine.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: DocSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_pages_stack_vertically() {
        let words: Vec<String> = (0..10).map(|i| format!("w{i:02} ")).collect();
        let refs: Vec<&str> = words.iter().map(|w| w.as_str()).collect();
        let engine = laid_out(&refs);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.pages.len(), 2);
        assert_eq!(snapshot.pages[0].bounds.y, 0.0);
        assert_eq!(snapshot.pages[1].bounds.y, 50.0);
    }
}

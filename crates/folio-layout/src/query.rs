//! Consumer queries over the box tree.
//!
//! Selectable offsets address the flattened atomic content in document
//! order: one unit per character of text, one unit per embedded object.
//! Cursor and selection rendering map offset ranges to bounding regions
//! with [`range_to_regions`].

use crate::tree::{Bounds, BoxTree};

/// Bounding regions on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRegions {
    /// Index of the page within the document.
    pub page: usize,
    /// One region per line touched by the range, top to bottom, in
    /// page-local coordinates.
    pub regions: Vec<Bounds>,
}

/// Total selectable size of the document.
pub fn selectable_size(tree: &BoxTree) -> usize {
    tree.atomics()
        .iter()
        .filter_map(|&atomic| tree.atomic_content(atomic))
        .map(|content| content.len())
        .sum()
}

/// Map the selectable-offset range `[from, to)` to bounding regions
/// grouped by page.
///
/// Each touched line yields one region spanning from the first to the last
/// selected position on it. Positions inside an atomic are interpolated
/// linearly across its measured width. An empty range yields no regions.
pub fn range_to_regions(tree: &BoxTree, from: usize, to: usize) -> Vec<PageRegions> {
    let mut out = Vec::new();
    if from >= to {
        return out;
    }
    let mut offset = 0usize;
    for (page_index, &page) in tree.children(tree.root()).iter().enumerate() {
        let config = tree.page_config(page).unwrap_or_else(|| tree.doc_config());
        let mut regions = Vec::new();
        let mut y = config.padding.top;
        for &block in tree.children(page) {
            for &line in tree.children(block) {
                let line_height = tree.height(line);
                let mut x = config.padding.left;
                let mut start_x: Option<f64> = None;
                let mut end_x = 0.0f64;
                for &inline in tree.children(line) {
                    for &atomic in tree.children(inline) {
                        let len = tree
                            .atomic_content(atomic)
                            .map(|content| content.len())
                            .unwrap_or(0);
                        let width = tree.atomic_width(atomic);
                        let begin = offset;
                        let end = offset + len;
                        if len > 0 && end > from && begin < to {
                            let lo = from.saturating_sub(begin).min(len);
                            let hi = (to - begin).min(len);
                            let unit = width / len as f64;
                            let selected_from = x + lo as f64 * unit;
                            let selected_to = x + hi as f64 * unit;
                            if start_x.is_none() {
                                start_x = Some(selected_from);
                            }
                            end_x = selected_to;
                        }
                        offset = end;
                        x += width;
                    }
                }
                if let Some(start_x) = start_x {
                    regions.push(Bounds::new(start_x, y, end_x - start_x, line_height));
                }
                y += line_height;
            }
        }
        if !regions.is_empty() {
            out.push(PageRegions {
                page: page_index,
                regions,
            });
        }
    }
    out
}

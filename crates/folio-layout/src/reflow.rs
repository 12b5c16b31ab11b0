//! Reflow: re-deriving line breaks within a block and page breaks within
//! the document.
//!
//! Both passes share one shape: walk a flow container's children
//! accumulating extent, split the container (and the straddling child)
//! where the extent runs out, and pull the next container's content
//! forward when room opens up. Line reflow fits widths and may width-slice
//! an atomic that is wider than a whole line; page reflow fits heights and
//! only ever splits a block at a line boundary.
//!
//! A box that an earlier step of the same pass already deleted or detached
//! is skipped — reflowing one line can consume its successors.

use tracing::trace;

use crate::error::{LayoutError, Result};
use crate::measure::Measurer;
use crate::tree::{AtomicBox, BoxData, BoxId, BoxTree};

/// Repair line breaks around `line` within its block.
pub(crate) fn reflow_line(
    tree: &mut BoxTree,
    measurer: &dyn Measurer,
    line: BoxId,
    version: u64,
) -> Result<()> {
    if !tree.contains(line) {
        // Already consumed while reflowing an earlier line.
        return Ok(());
    }
    tree.set_version(line, version);
    let Some(block) = tree.parent(line) else {
        return Ok(());
    };
    let line_width = tree.line_width(line);
    let mut cur = line;
    let mut cumulated = 0.0_f64;
    let mut n = 0_usize;

    loop {
        if n >= tree.children(cur).len() {
            // End of this line's content: pull the next line forward if its
            // leading atomic fits, otherwise the breaks are stable from
            // here on.
            if !merge_next_line(tree, cur, block, cumulated, version)? {
                break;
            }
            continue;
        }
        let mut inline = tree.children(cur)[n];
        if cumulated + tree.inline_width_sans_trailing(inline) <= line_width {
            cumulated += tree.inline_width(inline);
            n += 1;
            continue;
        }

        // The line overflows inside this inline: walk its atomics to the
        // exact break point.
        let mut m = 0_usize;
        let mut placed = true;
        while m < tree.children(inline).len() {
            let mut atomic = tree.children(inline)[m];

            // An atomic wider than the whole line is sliced into fragments
            // that each fit, every fragment landing on its own line.
            while tree.atomic_width_sans_trailing(atomic) > line_width {
                let (fit, len) = match tree.atomic_content(atomic) {
                    Some(content) => (measurer.fit_prefix(content, line_width), content.len()),
                    None => (0, 0),
                };
                if fit == 0 || fit >= len {
                    // Unbreakable content: it stays, overflowing.
                    break;
                }
                // Slice the content before touching any structure, so a
                // non-sliceable payload leaves the tree untouched.
                trace!(?atomic, fit, "slicing oversize atomic");
                let mut sliced = None;
                if let Some(BoxData::Atomic(payload)) = tree.get_mut(atomic).map(|b| &mut b.data) {
                    let tail = payload.content.split_off(fit);
                    payload.metrics = measurer.measure(&payload.content);
                    sliced = Some((payload.render_id, payload.element_type.clone(), tail));
                }
                let Some((render_id, element_type, tail)) = sliced else {
                    break;
                };
                if cumulated > 0.0 {
                    // Flush everything before the oversize atomic to its
                    // own line first.
                    let after = tree
                        .child_offset(block, cur)
                        .map(|p| p + 1)
                        .ok_or(LayoutError::MissingBox(cur))?;
                    let new_line = tree.split_at(cur, n + 1, block, after)?;
                    tree.set_version(cur, version);
                    tree.set_version(new_line, version);
                    cur = new_line;
                    n = 0;
                    let pos = tree.child_offset(cur, inline).map(|p| p + 1).unwrap_or(0);
                    let fragment = tree.split_at(inline, m, cur, pos)?;
                    if tree.children(inline).is_empty() {
                        tree.delete(inline)?;
                    } else {
                        tree.set_version(inline, version);
                    }
                    tree.set_version(fragment, version);
                    inline = fragment;
                    m = 0;
                }
                // Give the prefix its own line and carry the rest over.
                let after = tree
                    .child_offset(block, cur)
                    .map(|p| p + 1)
                    .ok_or(LayoutError::MissingBox(cur))?;
                let new_line = tree.split_at(cur, n + 1, block, after)?;
                tree.set_version(cur, version);
                tree.set_version(new_line, version);
                cur = new_line;
                n = 0;
                let pos = tree.child_offset(cur, inline).map(|p| p + 1).unwrap_or(0);
                let fragment = tree.split_at(inline, m + 1, cur, pos)?;
                tree.set_version(inline, version);
                tree.set_version(fragment, version);

                let metrics = measurer.measure(&tail);
                let pos = tree.child_offset(fragment, atomic).map(|p| p + 1).unwrap_or(0);
                let remainder = tree.insert_data(
                    fragment,
                    pos,
                    BoxData::Atomic(AtomicBox {
                        render_id,
                        element_type,
                        content: tail,
                        metrics,
                    }),
                )?;
                tree.set_version(atomic, version);
                tree.set_version(remainder, version);
                atomic = remainder;
                inline = fragment;
                m = 0;
                cumulated = 0.0;
            }

            if cumulated + tree.atomic_width_sans_trailing(atomic) > line_width {
                if cumulated == 0.0 && m == 0 {
                    // Nothing earlier on the line to move away: the atomic
                    // stays, overflowing.
                    cumulated += tree.atomic_width(atomic);
                    m += 1;
                    continue;
                }
                // Split the line after the current inline, then the inline
                // before the overflowing atomic, and rescan the new line.
                trace!(line = ?cur, at = m, "breaking line");
                let after = tree
                    .child_offset(block, cur)
                    .map(|p| p + 1)
                    .ok_or(LayoutError::MissingBox(cur))?;
                let new_line = tree.split_at(cur, n + 1, block, after)?;
                tree.set_version(cur, version);
                tree.set_version(new_line, version);
                cur = new_line;
                n = 0;
                let pos = tree.child_offset(cur, inline).map(|p| p + 1).unwrap_or(0);
                let fragment = tree.split_at(inline, m, cur, pos)?;
                if tree.children(inline).is_empty() {
                    tree.delete(inline)?;
                } else {
                    tree.set_version(inline, version);
                }
                tree.set_version(fragment, version);
                cumulated = 0.0;
                placed = false;
                break;
            }
            cumulated += tree.atomic_width(atomic);
            m += 1;
        }
        if placed {
            n += 1;
        }
    }
    Ok(())
}

/// Merge the next line of `block` into `cur` if its leading atomic fits in
/// the remaining width. The whole line moves — content pulled back this way
/// is rescanned and may overflow again further on.
fn merge_next_line(
    tree: &mut BoxTree,
    cur: BoxId,
    block: BoxId,
    cumulated: f64,
    version: u64,
) -> Result<bool> {
    let Some(offset) = tree.child_offset(block, cur) else {
        return Ok(false);
    };
    let Some(&next) = tree.children(block).get(offset + 1) else {
        return Ok(false);
    };
    let lead = tree
        .children(next)
        .first()
        .and_then(|&inline| tree.children(inline).first())
        .copied();
    let Some(lead) = lead else {
        return Ok(false);
    };
    if cumulated + tree.atomic_width(lead) > tree.line_width(cur) {
        return Ok(false);
    }
    trace!(from = ?next, into = ?cur, "pulling next line forward");
    let inlines = tree.children(next).to_vec();
    for inline in inlines {
        let end = tree.children(cur).len();
        tree.reparent(inline, cur, end)?;
        tree.set_version(inline, version);
    }
    tree.delete(next)?;
    Ok(true)
}

/// Repair page breaks around `page` within the document.
///
/// Structurally the same walk as [`reflow_line`] one level up: heights
/// instead of widths, blocks instead of inlines, lines instead of atomics.
/// A block taller than a page splits at a line boundary only; there is no
/// sub-line slicing. A block fragment pushed onto a new page is a distinct
/// printable unit, so its entire subtree is re-versioned.
pub(crate) fn reflow_page(tree: &mut BoxTree, page: BoxId, version: u64) -> Result<()> {
    if !tree.contains(page) {
        // Already consumed while reflowing an earlier page.
        return Ok(());
    }
    tree.set_version(page, version);
    let Some(doc) = tree.parent(page) else {
        return Ok(());
    };
    let page_height = tree.page_inner_height(page);
    let mut cur = page;
    let mut cumulated = 0.0_f64;
    let mut n = 0_usize;

    loop {
        if n >= tree.children(cur).len() {
            if !merge_next_page(tree, cur, doc, cumulated, version)? {
                break;
            }
            continue;
        }
        let block = tree.children(cur)[n];
        if cumulated + tree.height(block) <= page_height {
            cumulated += tree.height(block);
            n += 1;
            continue;
        }

        // The page overflows inside this block: find the line where it
        // happens.
        let mut m = 0_usize;
        let mut placed = true;
        while m < tree.children(block).len() {
            let line = tree.children(block)[m];
            let line_height = tree.height(line);
            if cumulated + line_height > page_height {
                if cumulated == 0.0 && m == 0 {
                    // A lone line taller than the page: it stays,
                    // overflowing.
                    cumulated += line_height;
                    m += 1;
                    continue;
                }
                trace!(page = ?cur, at = m, "breaking page");
                let after = tree
                    .child_offset(doc, cur)
                    .map(|p| p + 1)
                    .ok_or(LayoutError::MissingBox(cur))?;
                let new_page = tree.split_at(cur, n + 1, doc, after)?;
                tree.set_version(cur, version);
                tree.set_version(new_page, version);
                cur = new_page;
                n = 0;
                let pos = tree.child_offset(cur, block).map(|p| p + 1).unwrap_or(0);
                let fragment = tree.split_at(block, m, cur, pos)?;
                if tree.children(block).is_empty() {
                    tree.delete(block)?;
                } else {
                    tree.set_version(block, version);
                }
                // The fragment is a new printable unit: every box inside
                // it re-lays out.
                tree.touch_subtree(fragment, version);
                cumulated = 0.0;
                placed = false;
                break;
            }
            cumulated += line_height;
            m += 1;
        }
        if placed {
            n += 1;
        }
    }
    Ok(())
}

/// Merge the next page into `cur` if its leading line fits in the
/// remaining height.
fn merge_next_page(
    tree: &mut BoxTree,
    cur: BoxId,
    doc: BoxId,
    cumulated: f64,
    version: u64,
) -> Result<bool> {
    let Some(offset) = tree.child_offset(doc, cur) else {
        return Ok(false);
    };
    let Some(&next) = tree.children(doc).get(offset + 1) else {
        return Ok(false);
    };
    let lead = tree
        .children(next)
        .first()
        .and_then(|&block| tree.children(block).first())
        .copied();
    let Some(lead) = lead else {
        return Ok(false);
    };
    if cumulated + tree.height(lead) > tree.page_inner_height(cur) {
        return Ok(false);
    }
    trace!(from = ?next, into = ?cur, "pulling next page forward");
    let blocks = tree.children(next).to_vec();
    for block in blocks {
        let end = tree.children(cur).len();
        tree.reparent(block, cur, end)?;
        tree.touch_subtree(block, version);
    }
    tree.delete(next)?;
    Ok(true)
}

//! Measurement of atomic content.
//!
//! Layout never measures text itself; it asks a [`Measurer`] supplied by
//! the host. [`MonoMeasurer`] is a fixed-advance implementation good enough
//! for tests and plain-terminal hosts.

use folio_core::render::AtomicContent;

/// Measured extents of one atomic's content.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AtomicMetrics {
    /// Full advance width, trailing whitespace included.
    pub width: f64,
    /// Height of the content.
    pub height: f64,
    /// Width of the trailing whitespace run. Excluded from fit tests so
    /// trailing whitespace may hang past the line edge without forcing a
    /// break.
    pub trailing_whitespace_width: f64,
}

impl AtomicMetrics {
    /// Width with the trailing whitespace run excluded.
    pub fn width_sans_trailing_whitespace(&self) -> f64 {
        self.width - self.trailing_whitespace_width
    }
}

/// Measures atomic content for line breaking.
pub trait Measurer {
    /// Measure the full extents of the content.
    fn measure(&self, content: &AtomicContent) -> AtomicMetrics;

    /// Largest prefix, in content units (characters for text), whose width
    /// does not exceed `max_width`.
    ///
    /// Must return at least 1 for non-empty sliceable content so width
    /// slicing always makes progress, and the full length for content that
    /// cannot be sliced (embedded objects).
    fn fit_prefix(&self, content: &AtomicContent, max_width: f64) -> usize;
}

/// Fixed-advance measurer: every character is `char_width` wide and every
/// run of text is `line_height` tall.
#[derive(Debug, Clone, Copy)]
pub struct MonoMeasurer {
    pub char_width: f64,
    pub line_height: f64,
}

impl MonoMeasurer {
    /// Create a measurer with the given character advance and line height.
    pub fn new(char_width: f64, line_height: f64) -> Self {
        Self {
            char_width,
            line_height,
        }
    }
}

impl Default for MonoMeasurer {
    fn default() -> Self {
        Self::new(8.0, 16.0)
    }
}

impl Measurer for MonoMeasurer {
    fn measure(&self, content: &AtomicContent) -> AtomicMetrics {
        match content {
            AtomicContent::Text(_) => AtomicMetrics {
                width: content.len() as f64 * self.char_width,
                height: self.line_height,
                trailing_whitespace_width: content.trailing_whitespace_len() as f64
                    * self.char_width,
            },
            AtomicContent::Object { width, height } => AtomicMetrics {
                width: *width,
                height: *height,
                trailing_whitespace_width: 0.0,
            },
        }
    }

    fn fit_prefix(&self, content: &AtomicContent, max_width: f64) -> usize {
        match content {
            AtomicContent::Text(_) => {
                let len = content.len();
                let fit = (max_width / self.char_width).floor() as usize;
                fit.clamp(1, len.max(1))
            }
            AtomicContent::Object { .. } => content.len(),
        }
    }
}

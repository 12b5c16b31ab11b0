//! Error types for folio-layout.

use thiserror::Error;

use crate::tree::BoxId;

/// Result type for layout operations.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors raised during a layout pass.
///
/// All of these are contract violations: a malformed render tree, a
/// misregistered box constructor or an internally inconsistent box tree.
/// A pass that fails leaves the box tree in an unspecified state and the
/// engine refuses further passes (see [`LayoutError::Poisoned`]).
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A box of the wrong structural kind was constructed or encountered.
    #[error("expected {expected} box, found {found}")]
    KindMismatch {
        /// The structural slot being filled.
        expected: &'static str,
        /// The kind actually found.
        found: &'static str,
    },

    /// No box constructor is registered for a declared element type.
    #[error("no {slot} box constructor registered for element type `{element_type}`")]
    UnknownElement {
        /// The structural slot being filled.
        slot: &'static str,
        /// The declared element type without a constructor.
        element_type: String,
    },

    /// Cannot delete child, child not found in its parent.
    #[error("cannot delete child, child not found in parent")]
    MissingChild,

    /// A box id did not resolve to a live box.
    #[error("box {0:?} is not in the tree")]
    MissingBox(BoxId),

    /// The engine was reused after a failed pass.
    #[error("layout engine poisoned by an earlier failed pass")]
    Poisoned,
}

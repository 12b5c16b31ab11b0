//! Core document types for the Folio layout engine.
//!
//! This crate defines the data the layout engine consumes:
//!
//! - Stable node identities and page geometry ([`types`])
//! - The render tree ([`render`]): the logical document structure
//!   (doc → block → inline → atomic) maintained by the upstream edit
//!   pipeline and read by layout
//!
//! The layout engine itself lives in `folio-layout`.

pub mod render;
pub mod types;

pub use render::{
    AtomicContent, AtomicRenderNode, BlockRenderNode, DocRenderNode, InlineRenderNode, RenderRef,
};
pub use types::{NodeId, Padding, PageConfig};

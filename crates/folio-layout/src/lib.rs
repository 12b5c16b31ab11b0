//! Incremental box-tree layout for Folio documents.
//!
//! This crate turns a render tree (doc → block → inline → atomic, see
//! `folio-core`) into a box tree organised into pages and lines, and keeps
//! that box tree correct and minimal as the render tree changes.
//!
//! # Architecture
//!
//! 1. **Reconciliation**: a generic order-preserving diff ([`sync_nodes`])
//!    mirrors render-tree structure into the box tree, matching nodes by
//!    stable id and pruning unchanged subtrees by version
//! 2. **Reflow**: greedy flow breaking repairs line breaks (in width) and
//!    page breaks (in height) around exactly the flow containers the diff
//!    touched, splitting and merging containers as needed
//! 3. **Versioning**: every box carries the version of the last render
//!    update that affected it, so consumers know precisely which subtrees
//!    changed
//!
//! # Example
//!
//! ```ignore
//! use folio_layout::{BoxRegistry, LayoutEngine, MonoMeasurer};
//!
//! let mut engine = LayoutEngine::new(
//!     BoxRegistry::with_defaults(),
//!     Box::new(MonoMeasurer::default()),
//!     &doc,
//! )?;
//!
//! // After each edit the render pipeline bumps versions and notifies us.
//! engine.sync(&doc)?;
//! let snapshot = engine.snapshot();
//! ```

mod engine;
mod error;
mod measure;
mod query;
mod reflow;
mod registry;
mod snapshot;
mod sync;
mod tree;

pub use engine::{LayoutEngine, LayoutUpdated};
pub use error::{LayoutError, Result};
pub use measure::{AtomicMetrics, Measurer, MonoMeasurer};
pub use query::{range_to_regions, selectable_size, PageRegions};
pub use registry::{AtomicFactory, BlockFactory, BoxRegistry, InlineFactory};
pub use snapshot::{
    snapshot, AtomicSnapshot, BlockSnapshot, DocSnapshot, InlineSnapshot, LineSnapshot,
    PageSnapshot,
};
pub use sync::{sync_nodes, SyncAdapter};
pub use tree::{
    AtomicBox, BlockBox, Bounds, BoxData, BoxId, BoxKind, BoxNode, BoxTree, DocBox, InlineBox,
    LineFlowBox, PageFlowBox,
};

//! Box constructors for declared element types.
//!
//! The render tree declares an element type per node ("paragraph",
//! "text", "image", ...); the registry maps each type to the constructor
//! that builds its box. Constructors produce empty shells — content and
//! measurements arrive through the reconciler's update step. A constructor
//! that yields a payload of the wrong structural kind is a fatal contract
//! violation, detected at insertion time.

use folio_core::render::{AtomicRenderNode, BlockRenderNode, InlineRenderNode};
use indexmap::IndexMap;

use crate::tree::{AtomicBox, BlockBox, BoxData, InlineBox};

/// Constructor for a block-level box.
pub type BlockFactory = Box<dyn Fn(&BlockRenderNode) -> BoxData + Send + Sync>;
/// Constructor for an inline-level box.
pub type InlineFactory = Box<dyn Fn(&InlineRenderNode) -> BoxData + Send + Sync>;
/// Constructor for an atomic box.
pub type AtomicFactory = Box<dyn Fn(&AtomicRenderNode) -> BoxData + Send + Sync>;

/// A registry of box constructors keyed by element type.
#[derive(Default)]
pub struct BoxRegistry {
    blocks: IndexMap<String, BlockFactory>,
    inlines: IndexMap<String, InlineFactory>,
    atomics: IndexMap<String, AtomicFactory>,
}

impl BoxRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in element types registered:
    /// `paragraph` blocks, `text` inlines, `text` and `image` atomics.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_block("paragraph", |node| {
            BoxData::Block(BlockBox::new(node.id, &node.element_type))
        });
        registry.register_inline("text", |node| {
            BoxData::Inline(InlineBox::new(node.id, &node.element_type))
        });
        registry.register_atomic("text", |node| {
            BoxData::Atomic(AtomicBox::new(node.id, &node.element_type, node.content.clone()))
        });
        registry.register_atomic("image", |node| {
            BoxData::Atomic(AtomicBox::new(node.id, &node.element_type, node.content.clone()))
        });
        registry
    }

    /// Register a block box constructor.
    pub fn register_block(
        &mut self,
        element_type: impl Into<String>,
        factory: impl Fn(&BlockRenderNode) -> BoxData + Send + Sync + 'static,
    ) {
        self.blocks.insert(element_type.into(), Box::new(factory));
    }

    /// Register an inline box constructor.
    pub fn register_inline(
        &mut self,
        element_type: impl Into<String>,
        factory: impl Fn(&InlineRenderNode) -> BoxData + Send + Sync + 'static,
    ) {
        self.inlines.insert(element_type.into(), Box::new(factory));
    }

    /// Register an atomic box constructor.
    pub fn register_atomic(
        &mut self,
        element_type: impl Into<String>,
        factory: impl Fn(&AtomicRenderNode) -> BoxData + Send + Sync + 'static,
    ) {
        self.atomics.insert(element_type.into(), Box::new(factory));
    }

    /// Get the block constructor for an element type.
    pub fn block_factory(&self, element_type: &str) -> Option<&BlockFactory> {
        self.blocks.get(element_type)
    }

    /// Get the inline constructor for an element type.
    pub fn inline_factory(&self, element_type: &str) -> Option<&InlineFactory> {
        self.inlines.get(element_type)
    }

    /// Get the atomic constructor for an element type.
    pub fn atomic_factory(&self, element_type: &str) -> Option<&AtomicFactory> {
        self.atomics.get(element_type)
    }

    /// Registered block element types, in registration order.
    pub fn block_types(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(|s| s.as_str())
    }
}

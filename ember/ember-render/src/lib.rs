//! Ember render dependency graph.
//!
//! A per-frame DAG of GPU resources and passes. Client code declares passes
//! and the resources they touch through [`RdgBuilder`]; execution resolves
//! transient resources from shared pools, infers state-transition barriers
//! from the declared usages, and drives a [`CommandList`](ember_rhi::CommandList)
//! in declaration order.

mod builder;
mod edge;
mod graph;
mod graphviz;
mod handle;
mod node;
mod pool;

pub use builder::*;
pub use edge::*;
pub use graph::{DependencyGraph, EdgeId, NodeId, INVALID_ID};
pub use handle::*;
pub use node::*;
pub use pool::*;

use std::sync::atomic::{AtomicU32, Ordering};

/// Number of frames that may be in flight simultaneously; sizes the
/// per-frame descriptor-set pools.
pub const FRAMES_IN_FLIGHT: usize = 3;

static FRAME_INDEX: AtomicU32 = AtomicU32::new(0);

/// Index of the frame currently being built. Per-frame pools are selected by
/// this value modulo [`FRAMES_IN_FLIGHT`].
pub fn current_frame_index() -> u32 {
    FRAME_INDEX.load(Ordering::Relaxed)
}

pub fn set_frame_index(index: u32) {
    FRAME_INDEX.store(index, Ordering::Relaxed);
}

/// Advances to the next frame and returns its index.
pub fn advance_frame() -> u32 {
    FRAME_INDEX.fetch_add(1, Ordering::Relaxed) + 1
}

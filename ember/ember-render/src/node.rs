//! Node payloads: resource nodes carrying their realized RHI object, and
//! pass nodes carrying the executor plus per-frame bookkeeping.

use ember_rhi::{
    BufferInfo, BufferRef, CommandList, DescriptorSetRef, ResourceState, RootSignatureRef,
    TextureInfo, TextureRef, TextureViewRef, MAX_DESCRIPTOR_SETS,
};

use crate::edge::RdgEdge;
use crate::graph::DependencyGraph;
use crate::handle::{BufferHandle, TextureHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Render,
    Compute,
    RayTracing,
    Present,
    Copy,
}

pub struct TextureNode {
    pub name: String,
    pub info: TextureInfo,
    /// Imported resources are owned by the caller; the graph never returns
    /// them to the pool.
    pub imported: bool,
    /// State the texture was in before its first use in this graph. For
    /// pooled textures this is the state recorded at the previous release.
    pub initial_state: ResourceState,
    /// The actual RHI object, realized on first resolve.
    pub texture: Option<TextureRef>,
}

impl TextureNode {
    pub fn new(name: String) -> Self {
        Self {
            name,
            info: TextureInfo::default(),
            imported: false,
            initial_state: ResourceState::Undefined,
            texture: None,
        }
    }
}

pub struct BufferNode {
    pub name: String,
    pub info: BufferInfo,
    pub imported: bool,
    pub initial_state: ResourceState,
    pub buffer: Option<BufferRef>,
}

impl BufferNode {
    pub fn new(name: String) -> Self {
        Self {
            name,
            info: BufferInfo::default(),
            imported: false,
            initial_state: ResourceState::Undefined,
            buffer: None,
        }
    }
}

/// Context handed to a pass executor.
pub struct PassContext<'a> {
    pub command: &'a mut CommandList,
    /// Resolve lookups against the graph that is currently executing.
    pub resources: PassResources<'a>,
    pub descriptors: [Option<DescriptorSetRef>; MAX_DESCRIPTOR_SETS],
    pub pass_index: [u32; 3],
}

/// Read-only view used by executors to fetch the realized RHI objects behind
/// their handles.
pub struct PassResources<'a> {
    graph: &'a DependencyGraph<RdgNode, RdgEdge>,
}

impl<'a> PassResources<'a> {
    pub(crate) fn new(graph: &'a DependencyGraph<RdgNode, RdgEdge>) -> Self {
        Self { graph }
    }

    /// The RHI texture behind `handle`, if the node exists and has been
    /// realized for this execution.
    pub fn texture(&self, handle: TextureHandle) -> Option<TextureRef> {
        match self.graph.node(handle.id())? {
            RdgNode::Texture(node) => node.texture.clone(),
            _ => None,
        }
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<BufferRef> {
        match self.graph.node(handle.id())? {
            RdgNode::Buffer(node) => node.buffer.clone(),
            _ => None,
        }
    }
}

pub type PassExecuteFn = Box<dyn FnMut(&mut PassContext<'_>)>;

pub struct PassNode {
    pub name: String,
    pub kind: PassKind,
    /// Reserved: no culling algorithm runs yet, executed passes are exactly
    /// the declared ones.
    pub culled: bool,
    pub root_signature: Option<RootSignatureRef>,
    pub descriptor_sets: [Option<DescriptorSetRef>; MAX_DESCRIPTOR_SETS],
    pub pass_index: [u32; 3],
    pub executor: Option<PassExecuteFn>,
    /// Copy passes only: regenerate the destination mip chain after the copy.
    pub generate_mips: bool,

    // Pooled objects checked out for the duration of this pass.
    pub pooled_views: Vec<TextureViewRef>,
    pub pooled_descriptor_sets: Vec<(DescriptorSetRef, u32)>,
}

impl PassNode {
    pub fn new(name: String, kind: PassKind) -> Self {
        Self {
            name,
            kind,
            culled: false,
            root_signature: None,
            descriptor_sets: Default::default(),
            pass_index: [0, 0, 0],
            executor: None,
            generate_mips: false,
            pooled_views: Vec::new(),
            pooled_descriptor_sets: Vec::new(),
        }
    }
}

pub enum RdgNode {
    Texture(TextureNode),
    Buffer(BufferNode),
    Pass(PassNode),
}

impl RdgNode {
    pub fn name(&self) -> &str {
        match self {
            RdgNode::Texture(node) => &node.name,
            RdgNode::Buffer(node) => &node.name,
            RdgNode::Pass(node) => &node.name,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureNode> {
        match self {
            RdgNode::Texture(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_texture_mut(&mut self) -> Option<&mut TextureNode> {
        match self {
            RdgNode::Texture(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&BufferNode> {
        match self {
            RdgNode::Buffer(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_buffer_mut(&mut self) -> Option<&mut BufferNode> {
        match self {
            RdgNode::Buffer(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_pass(&self) -> Option<&PassNode> {
        match self {
            RdgNode::Pass(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_pass_mut(&mut self) -> Option<&mut PassNode> {
        match self {
            RdgNode::Pass(node) => Some(node),
            _ => None,
        }
    }
}

//! Edge payloads: the usage a pass declares on a resource. The edge carries
//! the state the resource must be in for that usage, the binding coordinates,
//! and role flags describing how the pass touches it.
//!
//! Direction convention: edges with an OUTPUT_* role run pass -> resource;
//! plain reads run resource -> pass.

use bitflags::bitflags;

use ember_rhi::{
    AttachmentLoadOp, AttachmentStoreOp, Color4, ResourceState, ResourceTypeFlags,
    TextureSubresourceLayers, TextureSubresourceRange, TextureViewType,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureRole: u32 {
        const AS_COLOR             = 1 << 0;
        const AS_DEPTH_STENCIL     = 1 << 1;
        const AS_SHADER_READ       = 1 << 2;
        const AS_SHADER_READ_WRITE = 1 << 3;
        const AS_OUTPUT_READ       = 1 << 4;
        const AS_OUTPUT_READ_WRITE = 1 << 5;
        const AS_PRESENT           = 1 << 6;
        const AS_TRANSFER_SRC      = 1 << 7;
        const AS_TRANSFER_DST      = 1 << 8;
        const READ_ONLY_DEPTH      = 1 << 9;

        const OUTPUT = Self::AS_OUTPUT_READ.bits() | Self::AS_OUTPUT_READ_WRITE.bits();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferRole: u32 {
        const AS_SHADER_READ        = 1 << 0;
        const AS_SHADER_READ_WRITE  = 1 << 1;
        const AS_OUTPUT_READ        = 1 << 2;
        const AS_OUTPUT_READ_WRITE  = 1 << 3;
        const AS_OUTPUT_INDIRECT_DRAW = 1 << 4;

        const OUTPUT = Self::AS_OUTPUT_READ.bits()
            | Self::AS_OUTPUT_READ_WRITE.bits()
            | Self::AS_OUTPUT_INDIRECT_DRAW.bits();
    }
}

#[derive(Debug, Clone)]
pub struct TextureEdge {
    /// State the texture must be in while the pass runs.
    pub state: ResourceState,
    pub roles: TextureRole,

    pub set: u32,
    pub binding: u32,
    pub index: u32,
    pub resource_type: ResourceTypeFlags,
    pub view_type: TextureViewType,

    pub subresource: TextureSubresourceRange,
    pub subresource_layers: TextureSubresourceLayers,

    pub load_op: AttachmentLoadOp,
    pub store_op: AttachmentStoreOp,
    pub clear_color: Color4,
    pub clear_depth: f32,
    pub clear_stencil: u32,
}

impl Default for TextureEdge {
    fn default() -> Self {
        Self {
            state: ResourceState::Undefined,
            roles: TextureRole::empty(),
            set: 0,
            binding: 0,
            index: 0,
            resource_type: ResourceTypeFlags::TEXTURE,
            view_type: TextureViewType::D2,
            subresource: TextureSubresourceRange::default(),
            subresource_layers: TextureSubresourceLayers::default(),
            load_op: AttachmentLoadOp::DontCare,
            store_op: AttachmentStoreOp::DontCare,
            clear_color: Color4::default(),
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

impl TextureEdge {
    pub fn is_output(&self) -> bool {
        self.roles.intersects(TextureRole::OUTPUT)
    }
}

#[derive(Debug, Clone)]
pub struct BufferEdge {
    pub state: ResourceState,
    pub roles: BufferRole,

    pub set: u32,
    pub binding: u32,
    pub index: u32,
    pub resource_type: ResourceTypeFlags,

    pub offset: u64,
    pub size: u64,
}

impl Default for BufferEdge {
    fn default() -> Self {
        Self {
            state: ResourceState::Undefined,
            roles: BufferRole::empty(),
            set: 0,
            binding: 0,
            index: 0,
            resource_type: ResourceTypeFlags::UNIFORM_BUFFER,
            offset: 0,
            size: 0,
        }
    }
}

impl BufferEdge {
    pub fn is_output(&self) -> bool {
        self.roles.intersects(BufferRole::OUTPUT)
    }
}

#[derive(Debug, Clone)]
pub enum RdgEdge {
    Texture(TextureEdge),
    Buffer(BufferEdge),
}

impl RdgEdge {
    pub fn as_texture(&self) -> Option<&TextureEdge> {
        match self {
            RdgEdge::Texture(edge) => Some(edge),
            RdgEdge::Buffer(_) => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&BufferEdge> {
        match self {
            RdgEdge::Buffer(edge) => Some(edge),
            RdgEdge::Texture(_) => None,
        }
    }

    pub fn is_output(&self) -> bool {
        match self {
            RdgEdge::Texture(edge) => edge.is_output(),
            RdgEdge::Buffer(edge) => edge.is_output(),
        }
    }

    pub fn state(&self) -> ResourceState {
        match self {
            RdgEdge::Texture(edge) => edge.state,
            RdgEdge::Buffer(edge) => edge.state,
        }
    }
}

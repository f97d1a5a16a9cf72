//! The trait-object surface every backend implements. Client code only ever
//! sees `Arc<dyn …>` handles; concrete types are reached through `as_any`
//! downcasts inside the owning backend.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use crate::info::*;
use crate::types::*;

pub type ResourceId = u64;

pub type BufferRef = Arc<dyn Buffer>;
pub type TextureRef = Arc<dyn Texture>;
pub type TextureViewRef = Arc<dyn TextureView>;
pub type SamplerRef = Arc<dyn Sampler>;
pub type ShaderRef = Arc<dyn Shader>;
pub type ShaderBindingTableRef = Arc<dyn ShaderBindingTable>;
pub type RootSignatureRef = Arc<dyn RootSignature>;
pub type DescriptorSetRef = Arc<dyn DescriptorSet>;
pub type RenderPassRef = Arc<dyn RenderPass>;
pub type GraphicsPipelineRef = Arc<dyn GraphicsPipeline>;
pub type ComputePipelineRef = Arc<dyn ComputePipeline>;
pub type RayTracingPipelineRef = Arc<dyn RayTracingPipeline>;
pub type QueueRef = Arc<dyn Queue>;
pub type SurfaceRef = Arc<dyn Surface>;
pub type SwapchainRef = Arc<dyn Swapchain>;
pub type FenceRef = Arc<dyn Fence>;
pub type SemaphoreRef = Arc<dyn Semaphore>;

/// Discriminant used by the backend's live-resource table; destruction order
/// at teardown is the reverse of this listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    TextureView,
    Sampler,
    Shader,
    ShaderBindingTable,
    RootSignature,
    DescriptorSet,
    RenderPass,
    GraphicsPipeline,
    ComputePipeline,
    RayTracingPipeline,
    Queue,
    Surface,
    Swapchain,
    Fence,
    Semaphore,
}

pub const RESOURCE_KIND_COUNT: usize = 17;

impl ResourceKind {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Common behavior of every tracked GPU object.
pub trait Resource: Send + Sync + Debug {
    fn kind(&self) -> ResourceKind;
    fn id(&self) -> ResourceId;
    fn name(&self) -> String;
    fn set_name(&self, name: &str);

    /// Releases the underlying API object. Called by the backend when the
    /// tracking table decides the resource is dead, and again (idempotently)
    /// at teardown.
    fn destroy(&self) {}

    fn as_any(&self) -> &dyn Any;
}

pub trait Buffer: Resource {
    fn info(&self) -> &BufferInfo;
}

pub trait Texture: Resource {
    fn info(&self) -> &TextureInfo;

    /// Concrete full range of this texture, substituted for wildcard
    /// subresources.
    fn default_subresource_range(&self) -> TextureSubresourceRange;
    fn default_subresource_layers(&self) -> TextureSubresourceLayers;

    fn mip_extent(&self, mip_level: u32) -> Extent3D {
        let mut size = self.info().extent;
        for _ in 0..mip_level {
            size.width = (size.width / 2).max(1);
            size.height = (size.height / 2).max(1);
            size.depth = (size.depth / 2).max(1);
        }
        size
    }
}

pub trait TextureView: Resource {
    fn info(&self) -> &TextureViewInfo;
}

pub trait Sampler: Resource {
    fn info(&self) -> &SamplerInfo;
}

pub trait Shader: Resource {
    fn info(&self) -> &ShaderInfo;
    fn frequency(&self) -> ShaderFrequency {
        self.info().frequency
    }
    fn reflect_info(&self) -> &ShaderReflectInfo;
}

pub trait ShaderBindingTable: Resource {
    fn info(&self) -> &ShaderBindingTableInfo;
}

pub trait RootSignature: Resource {
    fn info(&self) -> &RootSignatureInfo;

    /// Allocates a fresh descriptor set laid out like slot `set` of this
    /// signature.
    fn create_descriptor_set(&self, set: u32) -> Option<DescriptorSetRef>;
}

pub trait DescriptorSet: Resource {
    fn update_descriptor(&self, update: &DescriptorUpdateInfo);

    fn update_descriptors(&self, updates: &[DescriptorUpdateInfo]) {
        for update in updates {
            self.update_descriptor(update);
        }
    }
}

pub trait RenderPass: Resource {
    fn info(&self) -> &RenderPassInfo;
}

pub trait GraphicsPipeline: Resource {
    fn info(&self) -> &GraphicsPipelineInfo;
}

pub trait ComputePipeline: Resource {
    fn info(&self) -> &ComputePipelineInfo;
}

pub trait RayTracingPipeline: Resource {
    fn info(&self) -> &RayTracingPipelineInfo;
}

pub trait Queue: Resource {
    fn info(&self) -> &QueueInfo;

    /// Blocks until all work submitted to this queue has completed.
    fn wait_idle(&self);
}

pub trait Surface: Resource {
    fn extent(&self) -> Extent2D;
}

pub trait Swapchain: Resource {
    fn info(&self) -> &SwapchainInfo;

    fn extent(&self) -> Extent2D {
        self.info().extent
    }

    /// Index of the image currently being rendered, in `[0, image_count)`.
    fn current_frame_index(&self) -> u32;

    fn texture(&self, index: u32) -> Option<TextureRef>;

    /// Advances the internal image ring and returns the backbuffer for the
    /// new current frame. `fence` / `signal_semaphore` are signalled once the
    /// image is available.
    fn get_new_frame(
        &self,
        fence: Option<&FenceRef>,
        signal_semaphore: Option<&SemaphoreRef>,
    ) -> Option<TextureRef>;

    fn present(&self, wait_semaphore: Option<&SemaphoreRef>);
}

pub trait Fence: Resource {
    /// Blocks the CPU until all GPU work submitted before the fence's signal
    /// has completed.
    fn wait(&self);
    fn reset(&self);
    fn is_signaled(&self) -> bool;
}

pub trait Semaphore: Resource {}

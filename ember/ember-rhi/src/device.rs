//! The device trait all backends implement, and the process-wide backend
//! singleton.

use std::sync::{Arc, OnceLock};

use raw_window_handle::RawWindowHandle;

use crate::command::{CommandContext, ImmediateContextRef};
use crate::info::*;
use crate::resource::*;
use crate::types::*;

/// Factory and lifecycle surface of one GPU (or the software stand-in).
///
/// Every `create_*` returns `None` on failure; callers treat a `None`
/// resource as inert. Created objects are registered in the device's
/// live-resource table so they can be destroyed a few ticks after the last
/// external reference drops.
pub trait Device: Send + Sync {
    fn backend_type(&self) -> BackendType;

    /// Ages the live-resource table: a resource whose only remaining
    /// reference is the table's own, for more than [`RESOURCE_GRACE_TICKS`]
    /// consecutive ticks, is destroyed. Call once per frame.
    fn tick(&self);

    /// Destroys every tracked resource in reverse creation order.
    /// Idempotent.
    fn destroy(&self);

    fn get_queue(&self, info: &QueueInfo) -> Option<QueueRef>;
    fn create_surface(&self, window: Option<RawWindowHandle>) -> Option<SurfaceRef>;
    fn create_swapchain(&self, info: SwapchainInfo) -> Option<SwapchainRef>;

    /// Fresh recording context; typically reached through
    /// [`CommandPool::create_command_list`](crate::command::CommandPool::create_command_list).
    fn create_command_context(&self) -> Option<Box<dyn CommandContext>>;

    /// Shared context for blocking uploads, created lazily and reused.
    fn get_immediate_command(&self) -> Option<ImmediateContextRef>;

    fn create_buffer(&self, info: BufferInfo) -> Option<BufferRef>;
    fn create_texture(&self, info: TextureInfo) -> Option<TextureRef>;
    fn create_texture_view(&self, info: TextureViewInfo) -> Option<TextureViewRef>;
    fn create_sampler(&self, info: SamplerInfo) -> Option<SamplerRef>;
    fn create_shader(&self, info: ShaderInfo) -> Option<ShaderRef>;
    fn create_shader_binding_table(&self, info: ShaderBindingTableInfo) -> Option<ShaderBindingTableRef>;
    fn create_root_signature(&self, info: RootSignatureInfo) -> Option<RootSignatureRef>;
    fn create_render_pass(&self, info: RenderPassInfo) -> Option<RenderPassRef>;
    fn create_graphics_pipeline(&self, info: GraphicsPipelineInfo) -> Option<GraphicsPipelineRef>;
    fn create_compute_pipeline(&self, info: ComputePipelineInfo) -> Option<ComputePipelineRef>;
    fn create_ray_tracing_pipeline(&self, info: RayTracingPipelineInfo) -> Option<RayTracingPipelineRef>;
    fn create_fence(&self, signaled: bool) -> Option<FenceRef>;
    fn create_semaphore(&self) -> Option<SemaphoreRef>;

    /// Source to bytecode. Empty output signals compilation failure.
    fn compile_shader(&self, source: &str, entry: &str, profile: &str) -> Vec<u8>;

    /// Blocking CPU-to-GPU upload into a host-visible buffer.
    fn write_buffer(&self, buffer: &BufferRef, offset: u64, data: &[u8]) -> Result<(), String>;

    /// Concrete-type access for backend-aware tooling.
    fn as_any(&self) -> &dyn std::any::Any;
}

pub type DeviceRef = Arc<dyn Device>;

static BACKEND: OnceLock<DeviceRef> = OnceLock::new();

/// Entry point for backend selection. One device per process.
pub struct Backend;

impl Backend {
    /// Creates the device on first call; later calls return the same
    /// instance regardless of `info`.
    pub fn init(info: BackendInfo) -> DeviceRef {
        BACKEND
            .get_or_init(|| -> DeviceRef {
                if info.backend_type != BackendType::Soft {
                    log::warn!(
                        "backend {:?} is not linked into this build, falling back to the software device",
                        info.backend_type
                    );
                }
                crate::soft::SoftDevice::create(info)
            })
            .clone()
    }

    pub fn get() -> Option<DeviceRef> {
        BACKEND.get().cloned()
    }
}

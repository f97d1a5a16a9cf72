//! Software backend: a deterministic, in-process implementation of the RHI
//! contract. Commands are applied to tracked resource state and appended to
//! a journal instead of being handed to a GPU, which makes the whole
//! rendering core observable from tests and tools.

mod context;
mod resource;
mod swapchain;

pub use context::SoftCommandContext;
pub use resource::*;
pub use swapchain::SoftSwapchain;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use raw_window_handle::RawWindowHandle;

use crate::command::{CommandContext, ImmediateContextRef};
use crate::device::Device;
use crate::info::*;
use crate::resource::*;
use crate::types::*;

/// One entry of the journal: the plain-data mirror of a command call.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandRecord {
    BeginCommand,
    EndCommand,
    Execute,
    TextureBarrier { texture: ResourceId, src: ResourceState, dst: ResourceState },
    BufferBarrier { buffer: ResourceId, src: ResourceState, dst: ResourceState },
    CopyBuffer { src: ResourceId, dst: ResourceId, size: u64 },
    CopyTexture { src: ResourceId, dst: ResourceId },
    CopyBufferToTexture { src: ResourceId, dst: ResourceId },
    CopyTextureToBuffer { src: ResourceId, dst: ResourceId },
    GenerateMips { texture: ResourceId },
    PushEvent { name: String },
    PopEvent,
    BeginRenderPass {
        extent: Extent2D,
        layers: u32,
        colors: Vec<(AttachmentLoadOp, AttachmentStoreOp, Color4)>,
        depth: Option<(AttachmentLoadOp, AttachmentStoreOp, f32, u32)>,
    },
    EndRenderPass,
    SetViewport { min: Offset2D, max: Offset2D },
    SetScissor { min: Offset2D, max: Offset2D },
    SetDepthBias { constant_bias: f32, slope_bias: f32, clamp_bias: f32 },
    SetLineWidth { width: f32 },
    SetGraphicsPipeline { pipeline: ResourceId },
    SetComputePipeline { pipeline: ResourceId },
    SetRayTracingPipeline { pipeline: ResourceId },
    PushConstants { size: u32, frequency: ShaderFrequency },
    BindDescriptorSet { descriptor: ResourceId, set: u32 },
    BindConstantBuffer { buffer: ResourceId, slot: u32, frequency: ShaderFrequency },
    BindTexture { texture: ResourceId, slot: u32, frequency: ShaderFrequency },
    BindSampler { sampler: ResourceId, slot: u32, frequency: ShaderFrequency },
    BindVertexBuffer { buffer: ResourceId, stream_index: u32, offset: u64 },
    BindIndexBuffer { buffer: ResourceId, offset: u64 },
    Dispatch { x: u32, y: u32, z: u32 },
    DispatchIndirect { buffer: ResourceId, offset: u64 },
    TraceRays { x: u32, y: u32, z: u32 },
    Draw { vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32 },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    DrawIndirect { buffer: ResourceId, offset: u64, draw_count: u32 },
    DrawIndexedIndirect { buffer: ResourceId, offset: u64, draw_count: u32 },
    Present { image_index: u32 },
}

pub(crate) type Journal = Arc<Mutex<Vec<CommandRecord>>>;

struct TrackedResource {
    resource: Arc<dyn Resource>,
    idle_ticks: u32,
}

/// The software device. All contexts created from it share one journal, so
/// the recorded stream reflects submission order across the whole frame.
pub struct SoftDevice {
    info: BackendInfo,
    this: Weak<SoftDevice>,
    next_id: AtomicU64,
    journal: Journal,
    tracked: Mutex<Vec<Vec<TrackedResource>>>,
    queues: Mutex<Vec<(QueueInfo, QueueRef)>>,
    immediate: Mutex<Option<ImmediateContextRef>>,
}

impl SoftDevice {
    pub fn create(info: BackendInfo) -> Arc<SoftDevice> {
        Arc::new_cyclic(|this| SoftDevice {
            info,
            this: this.clone(),
            next_id: AtomicU64::new(1),
            journal: Arc::new(Mutex::new(Vec::new())),
            tracked: Mutex::new((0..RESOURCE_KIND_COUNT).map(|_| Vec::new()).collect()),
            queues: Mutex::new(Vec::new()),
            immediate: Mutex::new(None),
        })
    }

    fn alloc_id(&self) -> ResourceId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn track(&self, resource: Arc<dyn Resource>) {
        let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
        tracked[resource.kind().index()].push(TrackedResource { resource, idle_ticks: 0 });
    }

    /// Snapshot of everything recorded so far.
    pub fn journal(&self) -> Vec<CommandRecord> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drains the journal, returning the recorded stream.
    pub fn take_journal(&self) -> Vec<CommandRecord> {
        std::mem::take(&mut *self.journal.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn clear_journal(&self) {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of resources currently held by the tracking table.
    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().unwrap_or_else(|e| e.into_inner()).iter().map(Vec::len).sum()
    }

    pub(crate) fn create_descriptor_set_for(
        &self,
        info: &RootSignatureInfo,
        set: u32,
    ) -> Option<DescriptorSetRef> {
        let entries: Vec<ShaderResourceEntry> =
            info.entries().iter().filter(|e| e.set == set).copied().collect();
        let descriptor = Arc::new(SoftDescriptorSet::new(self.alloc_id(), set, entries));
        self.track(descriptor.clone());
        Some(descriptor)
    }
}

impl Device for SoftDevice {
    fn backend_type(&self) -> BackendType {
        BackendType::Soft
    }

    fn tick(&self) {
        let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
        for resources in tracked.iter_mut() {
            for entry in resources.iter_mut() {
                if Arc::strong_count(&entry.resource) == 1 {
                    entry.idle_ticks += 1;
                } else {
                    entry.idle_ticks = 0;
                }
            }
            resources.retain(|entry| {
                if entry.idle_ticks > RESOURCE_GRACE_TICKS {
                    entry.resource.destroy();
                    false
                } else {
                    true
                }
            });
        }
    }

    fn destroy(&self) {
        let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
        for resources in tracked.iter_mut().rev() {
            for entry in resources.iter().rev() {
                entry.resource.destroy();
            }
            resources.clear();
        }
    }

    fn get_queue(&self, info: &QueueInfo) -> Option<QueueRef> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, queue)) = queues.iter().find(|(i, _)| i == info) {
            return Some(queue.clone());
        }
        let queue: QueueRef = Arc::new(SoftQueue::new(self.alloc_id(), *info));
        self.track(queue.clone());
        queues.push((*info, queue.clone()));
        Some(queue)
    }

    fn create_surface(&self, _window: Option<RawWindowHandle>) -> Option<SurfaceRef> {
        let surface = Arc::new(SoftSurface::new(self.alloc_id(), Extent2D::default()));
        self.track(surface.clone());
        Some(surface)
    }

    fn create_swapchain(&self, info: SwapchainInfo) -> Option<SwapchainRef> {
        if info.image_count == 0 {
            log::warn!("swapchain with zero images requested");
            return None;
        }
        let mut images = Vec::with_capacity(info.image_count as usize);
        for i in 0..info.image_count {
            let image = Arc::new(SoftTexture::new(
                self.alloc_id(),
                TextureInfo {
                    format: info.format,
                    extent: Extent3D::new(info.extent.width, info.extent.height, 1),
                    resource_type: ResourceTypeFlags::TEXTURE | ResourceTypeFlags::RENDER_TARGET,
                    ..Default::default()
                },
            ));
            image.set_name(&format!("backbuffer_{i}"));
            image.set_state(ResourceState::Present);
            self.track(image.clone());
            let image: TextureRef = image;
            images.push(image);
        }
        let swapchain = Arc::new(SoftSwapchain::new(
            self.alloc_id(),
            info,
            images,
            self.journal.clone(),
        ));
        self.track(swapchain.clone());
        Some(swapchain)
    }

    fn create_command_context(&self) -> Option<Box<dyn CommandContext>> {
        Some(Box::new(SoftCommandContext::new(self.journal.clone(), self.info.enable_debug)))
    }

    fn get_immediate_command(&self) -> Option<ImmediateContextRef> {
        let mut immediate = self.immediate.lock().unwrap_or_else(|e| e.into_inner());
        if immediate.is_none() {
            let context: ImmediateContextRef = Arc::new(Mutex::new(SoftCommandContext::new(
                self.journal.clone(),
                self.info.enable_debug,
            )));
            *immediate = Some(context);
        }
        immediate.clone()
    }

    fn create_buffer(&self, info: BufferInfo) -> Option<BufferRef> {
        if info.size == 0 {
            log::warn!("buffer with zero size requested");
            return None;
        }
        let buffer = Arc::new(SoftBuffer::new(self.alloc_id(), info));
        self.track(buffer.clone());
        Some(buffer)
    }

    fn create_texture(&self, info: TextureInfo) -> Option<TextureRef> {
        if info.extent.width == 0 || info.extent.height == 0 {
            log::warn!("texture with zero extent requested");
            return None;
        }
        let mut info = info;
        if info.mip_levels == 0 {
            info.mip_levels = info.extent.mip_size();
        }
        let texture = Arc::new(SoftTexture::new(self.alloc_id(), info));
        self.track(texture.clone());
        Some(texture)
    }

    fn create_texture_view(&self, info: TextureViewInfo) -> Option<TextureViewRef> {
        let mut info = info;
        if info.format == Format::Unknown {
            info.format = info.texture.info().format;
        }
        if info.subresource.is_default() {
            info.subresource = info.texture.default_subresource_range();
        }
        let view = Arc::new(SoftTextureView::new(self.alloc_id(), info));
        self.track(view.clone());
        Some(view)
    }

    fn create_sampler(&self, info: SamplerInfo) -> Option<SamplerRef> {
        let sampler = Arc::new(SoftSampler::new(self.alloc_id(), info));
        self.track(sampler.clone());
        Some(sampler)
    }

    fn create_shader(&self, info: ShaderInfo) -> Option<ShaderRef> {
        if info.code.is_empty() {
            log::warn!("shader '{}' has empty bytecode", info.entry);
            return None;
        }
        let shader = Arc::new(SoftShader::new(self.alloc_id(), info));
        self.track(shader.clone());
        Some(shader)
    }

    fn create_shader_binding_table(&self, info: ShaderBindingTableInfo) -> Option<ShaderBindingTableRef> {
        let table = Arc::new(SoftShaderBindingTable::new(self.alloc_id(), info));
        self.track(table.clone());
        Some(table)
    }

    fn create_root_signature(&self, info: RootSignatureInfo) -> Option<RootSignatureRef> {
        let root_signature = Arc::new(SoftRootSignature {
            id: self.alloc_id(),
            name: Mutex::new(String::new()),
            info,
            device: self.this.clone(),
        });
        self.track(root_signature.clone());
        Some(root_signature)
    }

    fn create_render_pass(&self, info: RenderPassInfo) -> Option<RenderPassRef> {
        let render_pass = Arc::new(SoftRenderPass::new(self.alloc_id(), info));
        self.track(render_pass.clone());
        Some(render_pass)
    }

    fn create_graphics_pipeline(&self, info: GraphicsPipelineInfo) -> Option<GraphicsPipelineRef> {
        let pipeline = Arc::new(SoftGraphicsPipeline::new(self.alloc_id(), info));
        self.track(pipeline.clone());
        Some(pipeline)
    }

    fn create_compute_pipeline(&self, info: ComputePipelineInfo) -> Option<ComputePipelineRef> {
        let pipeline = Arc::new(SoftComputePipeline::new(self.alloc_id(), info));
        self.track(pipeline.clone());
        Some(pipeline)
    }

    fn create_ray_tracing_pipeline(&self, info: RayTracingPipelineInfo) -> Option<RayTracingPipelineRef> {
        let pipeline = Arc::new(SoftRayTracingPipeline::new(self.alloc_id(), info));
        self.track(pipeline.clone());
        Some(pipeline)
    }

    fn create_fence(&self, signaled: bool) -> Option<FenceRef> {
        let fence = Arc::new(SoftFence::new(self.alloc_id(), signaled));
        self.track(fence.clone());
        Some(fence)
    }

    fn create_semaphore(&self) -> Option<SemaphoreRef> {
        let semaphore = Arc::new(SoftSemaphore::new(self.alloc_id()));
        self.track(semaphore.clone());
        Some(semaphore)
    }

    fn compile_shader(&self, source: &str, entry: &str, _profile: &str) -> Vec<u8> {
        if source.is_empty() {
            log::warn!("empty shader source for entry '{entry}'");
            return Vec::new();
        }
        // Bytecode is the source itself; nothing here executes it.
        source.as_bytes().to_vec()
    }

    fn write_buffer(&self, buffer: &BufferRef, offset: u64, data: &[u8]) -> Result<(), String> {
        let soft = buffer
            .as_any()
            .downcast_ref::<SoftBuffer>()
            .ok_or_else(|| "buffer was not created by the software device".to_owned())?;
        if soft.info.memory_usage == MemoryUsage::GpuOnly {
            return Err(format!("buffer '{}' is not host-visible", soft.name()));
        }
        soft.write_data(offset, data)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandList;
    use crate::device::Backend;

    fn device() -> Arc<SoftDevice> {
        SoftDevice::create(BackendInfo { backend_type: BackendType::Soft, enable_debug: true })
    }

    fn small_texture_info() -> TextureInfo {
        TextureInfo {
            format: Format::Rgba8Unorm,
            extent: Extent3D::new(16, 16, 1),
            ..Default::default()
        }
    }

    #[test]
    fn backend_init_is_idempotent() {
        let first = Backend::init(BackendInfo::default());
        let second = Backend::init(BackendInfo {
            backend_type: BackendType::Vulkan,
            enable_debug: true,
        });
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Backend::get().is_some());
    }

    #[test]
    fn destroy_is_idempotent() {
        let device = device();
        device.create_buffer(BufferInfo { size: 64, ..Default::default() }).unwrap();
        device.create_texture(small_texture_info()).unwrap();
        assert!(device.tracked_count() >= 2);
        device.destroy();
        assert_eq!(device.tracked_count(), 0);
        device.destroy();
        assert_eq!(device.tracked_count(), 0);
    }

    #[test]
    fn tick_destroys_unreferenced_resources_after_grace() {
        let device = device();
        let buffer = device.create_buffer(BufferInfo { size: 64, ..Default::default() }).unwrap();
        for _ in 0..RESOURCE_GRACE_TICKS * 2 {
            device.tick();
        }
        // Still alive: we hold a reference.
        assert_eq!(device.tracked_count(), 1);
        drop(buffer);
        for _ in 0..RESOURCE_GRACE_TICKS {
            device.tick();
        }
        assert_eq!(device.tracked_count(), 1);
        device.tick();
        assert_eq!(device.tracked_count(), 0);
    }

    #[test]
    fn tick_age_restarts_after_external_reference_drops() {
        let device = device();
        let buffer = device.create_buffer(BufferInfo { size: 64, ..Default::default() }).unwrap();
        // Held externally: ages never accumulate.
        for _ in 0..RESOURCE_GRACE_TICKS * 3 {
            device.tick();
        }
        assert_eq!(device.tracked_count(), 1);
        drop(buffer);
        // The full grace period applies from the drop, not from creation.
        for _ in 0..RESOURCE_GRACE_TICKS {
            device.tick();
        }
        assert_eq!(device.tracked_count(), 1);
        device.tick();
        assert_eq!(device.tracked_count(), 0);
    }

    #[test]
    fn mip_levels_zero_derives_full_chain() {
        let device = device();
        let texture = device
            .create_texture(TextureInfo {
                format: Format::Rgba8Unorm,
                extent: Extent3D::new(256, 128, 1),
                mip_levels: 0,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(texture.info().mip_levels, 9);
        assert_eq!(texture.default_subresource_range().level_count, 9);
    }

    #[test]
    fn texture_view_inherits_format_and_range() {
        let device = device();
        let texture = device.create_texture(small_texture_info()).unwrap();
        let view = device
            .create_texture_view(TextureViewInfo {
                texture: texture.clone(),
                format: Format::Unknown,
                view_type: TextureViewType::D2,
                subresource: TextureSubresourceRange::default(),
            })
            .unwrap();
        assert_eq!(view.info().format, Format::Rgba8Unorm);
        assert_eq!(view.info().subresource, texture.default_subresource_range());
    }

    #[test]
    fn barrier_updates_tracked_state() {
        let device = device();
        let texture = device.create_texture(small_texture_info()).unwrap();
        let mut list = CommandList::from_context(device.create_command_context().unwrap(), true);
        list.texture_barrier(&TextureBarrier {
            texture: texture.clone(),
            src_state: ResourceState::Undefined,
            dst_state: ResourceState::ColorAttachment,
            subresource: TextureSubresourceRange::default(),
        });
        let soft = texture.as_any().downcast_ref::<SoftTexture>().unwrap();
        assert_eq!(soft.current_state(), ResourceState::ColorAttachment);
    }

    #[test]
    fn bypass_and_queued_lists_record_the_same_stream() {
        let run = |bypass: bool| -> Vec<CommandRecord> {
            let device = device();
            let buffer = device.create_buffer(BufferInfo { size: 16, ..Default::default() }).unwrap();
            let mut list = CommandList::from_context(device.create_command_context().unwrap(), bypass);
            list.begin_command();
            list.push_event("pass", Color3::default());
            list.bind_vertex_buffer(&buffer, 0, 0);
            list.draw(3, 1, 0, 0);
            list.pop_event();
            list.end_command();
            list.execute(None, None, None);
            // Resource ids are deterministic per device, so streams from two
            // devices compare equal.
            device.take_journal()
        };
        assert_eq!(run(true), run(false));
    }

    #[test]
    fn queued_list_defers_until_execute() {
        let device = device();
        let mut list = CommandList::from_context(device.create_command_context().unwrap(), false);
        list.draw(3, 1, 0, 0);
        assert!(device.journal().is_empty());
        list.execute(None, None, None);
        let journal = device.take_journal();
        assert_eq!(
            journal,
            vec![
                CommandRecord::Draw { vertex_count: 3, instance_count: 1, first_vertex: 0, first_instance: 0 },
                CommandRecord::Execute,
            ]
        );
    }

    #[test]
    fn execute_signals_fence() {
        let device = device();
        let fence = device.create_fence(false).unwrap();
        assert!(!fence.is_signaled());
        let mut list = CommandList::from_context(device.create_command_context().unwrap(), true);
        list.execute(Some(&fence), None, None);
        assert!(fence.is_signaled());
        fence.wait();
    }

    #[test]
    fn swapchain_ring_wraps_and_starts_at_zero() {
        let device = device();
        let swapchain = device
            .create_swapchain(SwapchainInfo {
                image_count: 3,
                extent: Extent2D::new(64, 64),
                ..Default::default()
            })
            .unwrap();
        let first = swapchain.get_new_frame(None, None).unwrap();
        assert_eq!(swapchain.current_frame_index(), 0);
        assert!(Arc::ptr_eq(&first, &swapchain.texture(0).unwrap()));
        swapchain.get_new_frame(None, None).unwrap();
        swapchain.get_new_frame(None, None).unwrap();
        assert_eq!(swapchain.current_frame_index(), 2);
        let wrapped = swapchain.get_new_frame(None, None).unwrap();
        assert_eq!(swapchain.current_frame_index(), 0);
        assert!(Arc::ptr_eq(&wrapped, &first));
        let soft = first.as_any().downcast_ref::<SoftTexture>().unwrap();
        assert_eq!(soft.current_state(), ResourceState::Present);
    }

    #[test]
    fn compile_shader_passes_source_through() {
        let device = device();
        assert!(device.compile_shader("", "main", "ps_5_0").is_empty());
        let code = device.compile_shader("float4 main() : SV_Target { return 0; }", "main", "ps_5_0");
        assert!(!code.is_empty());
    }

    #[test]
    fn write_buffer_requires_host_visible_memory() {
        let device = device();
        let gpu_only = device.create_buffer(BufferInfo { size: 16, ..Default::default() }).unwrap();
        assert!(device.write_buffer(&gpu_only, 0, &[1, 2, 3]).is_err());
        let upload = device
            .create_buffer(BufferInfo {
                size: 16,
                memory_usage: MemoryUsage::CpuToGpu,
                ..Default::default()
            })
            .unwrap();
        device.write_buffer(&upload, 4, &[1, 2, 3]).unwrap();
        let soft = upload.as_any().downcast_ref::<SoftBuffer>().unwrap();
        assert_eq!(&soft.read_data()[4..7], &[1, 2, 3]);
        assert!(device.write_buffer(&upload, 15, &[1, 2]).is_err());
    }

    #[test]
    fn immediate_context_is_created_once() {
        let device = device();
        let first = device.get_immediate_command().unwrap();
        let second = device.get_immediate_command().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn immediate_list_defers_until_flush() {
        let device = device();
        let texture = device.create_texture(small_texture_info()).unwrap();
        let mut list =
            crate::command::ImmediateCommandList::new(device.get_immediate_command().unwrap());
        list.generate_mips(&texture);
        assert!(device.journal().is_empty());
        list.flush();
        assert_eq!(
            device.take_journal(),
            vec![CommandRecord::GenerateMips { texture: texture.id() }, CommandRecord::Execute]
        );
    }
}

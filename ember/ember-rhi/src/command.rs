//! Command recording: the backend context trait, the deferred command list
//! wrapper over it, and the pool that lends contexts out.

use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::device::{Device as _, DeviceRef};
use crate::info::*;
use crate::resource::*;
use crate::types::*;

/// Uniform recording surface of a backend command context. An immediate-mode
/// backend applies each call on the spot; an explicit backend records into an
/// API command buffer. `execute` submits whatever was recorded.
pub trait CommandContext: Send {
    fn begin_command(&mut self);
    fn end_command(&mut self);
    fn execute(
        &mut self,
        fence: Option<&FenceRef>,
        wait_semaphore: Option<&SemaphoreRef>,
        signal_semaphore: Option<&SemaphoreRef>,
    );

    fn texture_barrier(&mut self, barrier: &TextureBarrier);
    fn buffer_barrier(&mut self, barrier: &BufferBarrier);

    fn copy_buffer(&mut self, src: &BufferRef, src_offset: u64, dst: &BufferRef, dst_offset: u64, size: u64);
    fn copy_texture(
        &mut self,
        src: &TextureRef,
        src_subresource: TextureSubresourceLayers,
        dst: &TextureRef,
        dst_subresource: TextureSubresourceLayers,
    );
    fn copy_buffer_to_texture(
        &mut self,
        src: &BufferRef,
        src_offset: u64,
        dst: &TextureRef,
        dst_subresource: TextureSubresourceLayers,
    );
    fn copy_texture_to_buffer(
        &mut self,
        src: &TextureRef,
        src_subresource: TextureSubresourceLayers,
        dst: &BufferRef,
        dst_offset: u64,
    );
    fn generate_mips(&mut self, texture: &TextureRef);

    fn push_event(&mut self, name: &str, color: Color3);
    fn pop_event(&mut self);

    fn begin_render_pass(&mut self, render_pass: &RenderPassRef);
    fn end_render_pass(&mut self);

    fn set_viewport(&mut self, min: Offset2D, max: Offset2D);
    fn set_scissor(&mut self, min: Offset2D, max: Offset2D);
    fn set_depth_bias(&mut self, constant_bias: f32, slope_bias: f32, clamp_bias: f32);
    fn set_line_width(&mut self, width: f32);

    fn set_graphics_pipeline(&mut self, pipeline: &GraphicsPipelineRef);
    fn set_compute_pipeline(&mut self, pipeline: &ComputePipelineRef);
    fn set_ray_tracing_pipeline(&mut self, pipeline: &RayTracingPipelineRef);

    fn push_constants(&mut self, data: &[u8], frequency: ShaderFrequency);
    fn bind_descriptor_set(&mut self, descriptor: &DescriptorSetRef, set: u32);
    fn bind_constant_buffer(&mut self, buffer: &BufferRef, slot: u32, frequency: ShaderFrequency);
    fn bind_texture(&mut self, texture: &TextureRef, slot: u32, frequency: ShaderFrequency);
    fn bind_sampler(&mut self, sampler: &SamplerRef, slot: u32, frequency: ShaderFrequency);
    fn bind_vertex_buffer(&mut self, buffer: &BufferRef, stream_index: u32, offset: u64);
    fn bind_index_buffer(&mut self, buffer: &BufferRef, offset: u64);

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32);
    fn dispatch_indirect(&mut self, argument_buffer: &BufferRef, argument_offset: u64);
    fn trace_rays(&mut self, width: u32, height: u32, depth: u32);

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn draw_indirect(&mut self, argument_buffer: &BufferRef, offset: u64, draw_count: u32);
    fn draw_indexed_indirect(&mut self, argument_buffer: &BufferRef, offset: u64, draw_count: u32);

    fn as_any(&self) -> &dyn Any;
}

/// A context shared for blocking one-off work (uploads, mip generation).
pub type ImmediateContextRef = Arc<Mutex<dyn CommandContext>>;

/// A deferred command, replayed onto a context at `CommandList::execute`
/// time.
#[derive(Clone)]
pub enum RhiCommand {
    BeginCommand,
    EndCommand,
    TextureBarrier(TextureBarrier),
    BufferBarrier(BufferBarrier),
    CopyBuffer { src: BufferRef, src_offset: u64, dst: BufferRef, dst_offset: u64, size: u64 },
    CopyTexture {
        src: TextureRef,
        src_subresource: TextureSubresourceLayers,
        dst: TextureRef,
        dst_subresource: TextureSubresourceLayers,
    },
    CopyBufferToTexture {
        src: BufferRef,
        src_offset: u64,
        dst: TextureRef,
        dst_subresource: TextureSubresourceLayers,
    },
    CopyTextureToBuffer {
        src: TextureRef,
        src_subresource: TextureSubresourceLayers,
        dst: BufferRef,
        dst_offset: u64,
    },
    GenerateMips(TextureRef),
    PushEvent { name: String, color: Color3 },
    PopEvent,
    BeginRenderPass(RenderPassRef),
    EndRenderPass,
    SetViewport { min: Offset2D, max: Offset2D },
    SetScissor { min: Offset2D, max: Offset2D },
    SetDepthBias { constant_bias: f32, slope_bias: f32, clamp_bias: f32 },
    SetLineWidth(f32),
    SetGraphicsPipeline(GraphicsPipelineRef),
    SetComputePipeline(ComputePipelineRef),
    SetRayTracingPipeline(RayTracingPipelineRef),
    PushConstants { data: Vec<u8>, frequency: ShaderFrequency },
    BindDescriptorSet { descriptor: DescriptorSetRef, set: u32 },
    BindConstantBuffer { buffer: BufferRef, slot: u32, frequency: ShaderFrequency },
    BindTexture { texture: TextureRef, slot: u32, frequency: ShaderFrequency },
    BindSampler { sampler: SamplerRef, slot: u32, frequency: ShaderFrequency },
    BindVertexBuffer { buffer: BufferRef, stream_index: u32, offset: u64 },
    BindIndexBuffer { buffer: BufferRef, offset: u64 },
    Dispatch { x: u32, y: u32, z: u32 },
    DispatchIndirect { buffer: BufferRef, offset: u64 },
    TraceRays { x: u32, y: u32, z: u32 },
    Draw { vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32 },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    DrawIndirect { buffer: BufferRef, offset: u64, draw_count: u32 },
    DrawIndexedIndirect { buffer: BufferRef, offset: u64, draw_count: u32 },
}

impl RhiCommand {
    fn execute(self, context: &mut dyn CommandContext) {
        match self {
            RhiCommand::BeginCommand => context.begin_command(),
            RhiCommand::EndCommand => context.end_command(),
            RhiCommand::TextureBarrier(barrier) => context.texture_barrier(&barrier),
            RhiCommand::BufferBarrier(barrier) => context.buffer_barrier(&barrier),
            RhiCommand::CopyBuffer { src, src_offset, dst, dst_offset, size } => {
                context.copy_buffer(&src, src_offset, &dst, dst_offset, size);
            }
            RhiCommand::CopyTexture { src, src_subresource, dst, dst_subresource } => {
                context.copy_texture(&src, src_subresource, &dst, dst_subresource);
            }
            RhiCommand::CopyBufferToTexture { src, src_offset, dst, dst_subresource } => {
                context.copy_buffer_to_texture(&src, src_offset, &dst, dst_subresource);
            }
            RhiCommand::CopyTextureToBuffer { src, src_subresource, dst, dst_offset } => {
                context.copy_texture_to_buffer(&src, src_subresource, &dst, dst_offset);
            }
            RhiCommand::GenerateMips(texture) => context.generate_mips(&texture),
            RhiCommand::PushEvent { name, color } => context.push_event(&name, color),
            RhiCommand::PopEvent => context.pop_event(),
            RhiCommand::BeginRenderPass(render_pass) => context.begin_render_pass(&render_pass),
            RhiCommand::EndRenderPass => context.end_render_pass(),
            RhiCommand::SetViewport { min, max } => context.set_viewport(min, max),
            RhiCommand::SetScissor { min, max } => context.set_scissor(min, max),
            RhiCommand::SetDepthBias { constant_bias, slope_bias, clamp_bias } => {
                context.set_depth_bias(constant_bias, slope_bias, clamp_bias);
            }
            RhiCommand::SetLineWidth(width) => context.set_line_width(width),
            RhiCommand::SetGraphicsPipeline(pipeline) => context.set_graphics_pipeline(&pipeline),
            RhiCommand::SetComputePipeline(pipeline) => context.set_compute_pipeline(&pipeline),
            RhiCommand::SetRayTracingPipeline(pipeline) => {
                context.set_ray_tracing_pipeline(&pipeline);
            }
            RhiCommand::PushConstants { data, frequency } => {
                context.push_constants(&data, frequency);
            }
            RhiCommand::BindDescriptorSet { descriptor, set } => {
                context.bind_descriptor_set(&descriptor, set);
            }
            RhiCommand::BindConstantBuffer { buffer, slot, frequency } => {
                context.bind_constant_buffer(&buffer, slot, frequency);
            }
            RhiCommand::BindTexture { texture, slot, frequency } => {
                context.bind_texture(&texture, slot, frequency);
            }
            RhiCommand::BindSampler { sampler, slot, frequency } => {
                context.bind_sampler(&sampler, slot, frequency);
            }
            RhiCommand::BindVertexBuffer { buffer, stream_index, offset } => {
                context.bind_vertex_buffer(&buffer, stream_index, offset);
            }
            RhiCommand::BindIndexBuffer { buffer, offset } => {
                context.bind_index_buffer(&buffer, offset);
            }
            RhiCommand::Dispatch { x, y, z } => context.dispatch(x, y, z),
            RhiCommand::DispatchIndirect { buffer, offset } => {
                context.dispatch_indirect(&buffer, offset);
            }
            RhiCommand::TraceRays { x, y, z } => context.trace_rays(x, y, z),
            RhiCommand::Draw { vertex_count, instance_count, first_vertex, first_instance } => {
                context.draw(vertex_count, instance_count, first_vertex, first_instance);
            }
            RhiCommand::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            } => {
                context.draw_indexed(index_count, instance_count, first_index, vertex_offset, first_instance);
            }
            RhiCommand::DrawIndirect { buffer, offset, draw_count } => {
                context.draw_indirect(&buffer, offset, draw_count);
            }
            RhiCommand::DrawIndexedIndirect { buffer, offset, draw_count } => {
                context.draw_indexed_indirect(&buffer, offset, draw_count);
            }
        }
    }
}

/// Lends command contexts out and takes them back when the owning
/// `CommandList` drops. Checkout is mutex-guarded; recording itself is
/// single-threaded.
pub struct CommandPool {
    info: CommandPoolInfo,
    device: DeviceRef,
    idle_contexts: Mutex<Vec<Box<dyn CommandContext>>>,
}

pub type CommandPoolRef = Arc<CommandPool>;

impl CommandPool {
    pub fn new(device: DeviceRef, info: CommandPoolInfo) -> CommandPoolRef {
        Arc::new(Self { info, device, idle_contexts: Mutex::new(Vec::new()) })
    }

    pub fn info(&self) -> &CommandPoolInfo {
        &self.info
    }

    pub fn create_command_list(self: &Arc<Self>, bypass: bool) -> Option<CommandList> {
        let context = {
            let mut idle = self.idle_contexts.lock().unwrap_or_else(|e| e.into_inner());
            idle.pop()
        };
        let context = match context {
            Some(context) => context,
            None => self.device.create_command_context()?,
        };
        Some(CommandList {
            pool: Some(self.clone()),
            context: Some(context),
            bypass,
            commands: Vec::new(),
        })
    }

    fn return_context(&self, context: Box<dyn CommandContext>) {
        let mut idle = self.idle_contexts.lock().unwrap_or_else(|e| e.into_inner());
        idle.push(context);
    }
}

macro_rules! record {
    ($self:ident, $call:ident ( $($arg:expr),* ), $cmd:expr) => {
        if $self.bypass {
            if let Some(context) = $self.context.as_deref_mut() {
                context.$call($($arg),*);
            }
        } else {
            $self.commands.push($cmd);
        }
    };
}

/// A recordable queue of deferred context calls, or a thin passthrough when
/// `bypass` is set. Both modes produce the same GPU effect; bypass just skips
/// the intermediate command objects.
pub struct CommandList {
    pool: Option<CommandPoolRef>,
    context: Option<Box<dyn CommandContext>>,
    bypass: bool,
    commands: Vec<RhiCommand>,
}

impl CommandList {
    /// Wraps a free-standing context, without pool bookkeeping. The usual way
    /// to obtain a list is [`CommandPool::create_command_list`].
    pub fn from_context(context: Box<dyn CommandContext>, bypass: bool) -> Self {
        Self { pool: None, context: Some(context), bypass, commands: Vec::new() }
    }

    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    pub fn context(&self) -> Option<&dyn CommandContext> {
        self.context.as_deref()
    }

    pub fn begin_command(&mut self) {
        record!(self, begin_command(), RhiCommand::BeginCommand);
    }

    pub fn end_command(&mut self) {
        record!(self, end_command(), RhiCommand::EndCommand);
    }

    /// Replays any recorded commands in order, then submits through the
    /// context.
    pub fn execute(
        &mut self,
        fence: Option<&FenceRef>,
        wait_semaphore: Option<&SemaphoreRef>,
        signal_semaphore: Option<&SemaphoreRef>,
    ) {
        let Some(context) = self.context.as_deref_mut() else { return };
        if !self.bypass {
            for command in self.commands.drain(..) {
                command.execute(context);
            }
        }
        context.execute(fence, wait_semaphore, signal_semaphore);
    }

    pub fn texture_barrier(&mut self, barrier: &TextureBarrier) {
        record!(self, texture_barrier(barrier), RhiCommand::TextureBarrier(barrier.clone()));
    }

    pub fn buffer_barrier(&mut self, barrier: &BufferBarrier) {
        record!(self, buffer_barrier(barrier), RhiCommand::BufferBarrier(barrier.clone()));
    }

    pub fn copy_buffer(&mut self, src: &BufferRef, src_offset: u64, dst: &BufferRef, dst_offset: u64, size: u64) {
        record!(
            self,
            copy_buffer(src, src_offset, dst, dst_offset, size),
            RhiCommand::CopyBuffer {
                src: src.clone(),
                src_offset,
                dst: dst.clone(),
                dst_offset,
                size
            }
        );
    }

    pub fn copy_texture(
        &mut self,
        src: &TextureRef,
        src_subresource: TextureSubresourceLayers,
        dst: &TextureRef,
        dst_subresource: TextureSubresourceLayers,
    ) {
        record!(
            self,
            copy_texture(src, src_subresource, dst, dst_subresource),
            RhiCommand::CopyTexture {
                src: src.clone(),
                src_subresource,
                dst: dst.clone(),
                dst_subresource
            }
        );
    }

    pub fn copy_buffer_to_texture(
        &mut self,
        src: &BufferRef,
        src_offset: u64,
        dst: &TextureRef,
        dst_subresource: TextureSubresourceLayers,
    ) {
        record!(
            self,
            copy_buffer_to_texture(src, src_offset, dst, dst_subresource),
            RhiCommand::CopyBufferToTexture {
                src: src.clone(),
                src_offset,
                dst: dst.clone(),
                dst_subresource
            }
        );
    }

    pub fn copy_texture_to_buffer(
        &mut self,
        src: &TextureRef,
        src_subresource: TextureSubresourceLayers,
        dst: &BufferRef,
        dst_offset: u64,
    ) {
        record!(
            self,
            copy_texture_to_buffer(src, src_subresource, dst, dst_offset),
            RhiCommand::CopyTextureToBuffer {
                src: src.clone(),
                src_subresource,
                dst: dst.clone(),
                dst_offset
            }
        );
    }

    pub fn generate_mips(&mut self, texture: &TextureRef) {
        record!(self, generate_mips(texture), RhiCommand::GenerateMips(texture.clone()));
    }

    pub fn push_event(&mut self, name: &str, color: Color3) {
        record!(
            self,
            push_event(name, color),
            RhiCommand::PushEvent { name: name.to_owned(), color }
        );
    }

    pub fn pop_event(&mut self) {
        record!(self, pop_event(), RhiCommand::PopEvent);
    }

    pub fn begin_render_pass(&mut self, render_pass: &RenderPassRef) {
        record!(
            self,
            begin_render_pass(render_pass),
            RhiCommand::BeginRenderPass(render_pass.clone())
        );
    }

    pub fn end_render_pass(&mut self) {
        record!(self, end_render_pass(), RhiCommand::EndRenderPass);
    }

    pub fn set_viewport(&mut self, min: Offset2D, max: Offset2D) {
        record!(self, set_viewport(min, max), RhiCommand::SetViewport { min, max });
    }

    pub fn set_scissor(&mut self, min: Offset2D, max: Offset2D) {
        record!(self, set_scissor(min, max), RhiCommand::SetScissor { min, max });
    }

    pub fn set_depth_bias(&mut self, constant_bias: f32, slope_bias: f32, clamp_bias: f32) {
        record!(
            self,
            set_depth_bias(constant_bias, slope_bias, clamp_bias),
            RhiCommand::SetDepthBias { constant_bias, slope_bias, clamp_bias }
        );
    }

    pub fn set_line_width(&mut self, width: f32) {
        record!(self, set_line_width(width), RhiCommand::SetLineWidth(width));
    }

    pub fn set_graphics_pipeline(&mut self, pipeline: &GraphicsPipelineRef) {
        record!(
            self,
            set_graphics_pipeline(pipeline),
            RhiCommand::SetGraphicsPipeline(pipeline.clone())
        );
    }

    pub fn set_compute_pipeline(&mut self, pipeline: &ComputePipelineRef) {
        record!(
            self,
            set_compute_pipeline(pipeline),
            RhiCommand::SetComputePipeline(pipeline.clone())
        );
    }

    pub fn set_ray_tracing_pipeline(&mut self, pipeline: &RayTracingPipelineRef) {
        record!(
            self,
            set_ray_tracing_pipeline(pipeline),
            RhiCommand::SetRayTracingPipeline(pipeline.clone())
        );
    }

    pub fn push_constants(&mut self, data: &[u8], frequency: ShaderFrequency) {
        record!(
            self,
            push_constants(data, frequency),
            RhiCommand::PushConstants { data: data.to_vec(), frequency }
        );
    }

    pub fn bind_descriptor_set(&mut self, descriptor: &DescriptorSetRef, set: u32) {
        record!(
            self,
            bind_descriptor_set(descriptor, set),
            RhiCommand::BindDescriptorSet { descriptor: descriptor.clone(), set }
        );
    }

    pub fn bind_constant_buffer(&mut self, buffer: &BufferRef, slot: u32, frequency: ShaderFrequency) {
        record!(
            self,
            bind_constant_buffer(buffer, slot, frequency),
            RhiCommand::BindConstantBuffer { buffer: buffer.clone(), slot, frequency }
        );
    }

    pub fn bind_texture(&mut self, texture: &TextureRef, slot: u32, frequency: ShaderFrequency) {
        record!(
            self,
            bind_texture(texture, slot, frequency),
            RhiCommand::BindTexture { texture: texture.clone(), slot, frequency }
        );
    }

    pub fn bind_sampler(&mut self, sampler: &SamplerRef, slot: u32, frequency: ShaderFrequency) {
        record!(
            self,
            bind_sampler(sampler, slot, frequency),
            RhiCommand::BindSampler { sampler: sampler.clone(), slot, frequency }
        );
    }

    pub fn bind_vertex_buffer(&mut self, buffer: &BufferRef, stream_index: u32, offset: u64) {
        record!(
            self,
            bind_vertex_buffer(buffer, stream_index, offset),
            RhiCommand::BindVertexBuffer { buffer: buffer.clone(), stream_index, offset }
        );
    }

    pub fn bind_index_buffer(&mut self, buffer: &BufferRef, offset: u64) {
        record!(
            self,
            bind_index_buffer(buffer, offset),
            RhiCommand::BindIndexBuffer { buffer: buffer.clone(), offset }
        );
    }

    pub fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        record!(
            self,
            dispatch(group_count_x, group_count_y, group_count_z),
            RhiCommand::Dispatch { x: group_count_x, y: group_count_y, z: group_count_z }
        );
    }

    pub fn dispatch_indirect(&mut self, argument_buffer: &BufferRef, argument_offset: u64) {
        record!(
            self,
            dispatch_indirect(argument_buffer, argument_offset),
            RhiCommand::DispatchIndirect { buffer: argument_buffer.clone(), offset: argument_offset }
        );
    }

    pub fn trace_rays(&mut self, width: u32, height: u32, depth: u32) {
        record!(
            self,
            trace_rays(width, height, depth),
            RhiCommand::TraceRays { x: width, y: height, z: depth }
        );
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        record!(
            self,
            draw(vertex_count, instance_count, first_vertex, first_instance),
            RhiCommand::Draw { vertex_count, instance_count, first_vertex, first_instance }
        );
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        record!(
            self,
            draw_indexed(index_count, instance_count, first_index, vertex_offset, first_instance),
            RhiCommand::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance
            }
        );
    }

    pub fn draw_indirect(&mut self, argument_buffer: &BufferRef, offset: u64, draw_count: u32) {
        record!(
            self,
            draw_indirect(argument_buffer, offset, draw_count),
            RhiCommand::DrawIndirect { buffer: argument_buffer.clone(), offset, draw_count }
        );
    }

    pub fn draw_indexed_indirect(&mut self, argument_buffer: &BufferRef, offset: u64, draw_count: u32) {
        record!(
            self,
            draw_indexed_indirect(argument_buffer, offset, draw_count),
            RhiCommand::DrawIndexedIndirect { buffer: argument_buffer.clone(), offset, draw_count }
        );
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        if let (Some(pool), Some(context)) = (self.pool.take(), self.context.take()) {
            pool.return_context(context);
        }
    }
}

/// Deferred queue over the shared immediate context; barriers, copies and mip
/// generation only. `flush` replays and blocks until the work completed.
pub struct ImmediateCommandList {
    context: ImmediateContextRef,
    commands: Vec<RhiCommand>,
}

impl ImmediateCommandList {
    pub fn new(context: ImmediateContextRef) -> Self {
        Self { context, commands: Vec::new() }
    }

    pub fn texture_barrier(&mut self, barrier: &TextureBarrier) {
        self.commands.push(RhiCommand::TextureBarrier(barrier.clone()));
    }

    pub fn buffer_barrier(&mut self, barrier: &BufferBarrier) {
        self.commands.push(RhiCommand::BufferBarrier(barrier.clone()));
    }

    pub fn copy_buffer(&mut self, src: &BufferRef, src_offset: u64, dst: &BufferRef, dst_offset: u64, size: u64) {
        self.commands.push(RhiCommand::CopyBuffer {
            src: src.clone(),
            src_offset,
            dst: dst.clone(),
            dst_offset,
            size,
        });
    }

    pub fn copy_texture(
        &mut self,
        src: &TextureRef,
        src_subresource: TextureSubresourceLayers,
        dst: &TextureRef,
        dst_subresource: TextureSubresourceLayers,
    ) {
        self.commands.push(RhiCommand::CopyTexture {
            src: src.clone(),
            src_subresource,
            dst: dst.clone(),
            dst_subresource,
        });
    }

    pub fn copy_buffer_to_texture(
        &mut self,
        src: &BufferRef,
        src_offset: u64,
        dst: &TextureRef,
        dst_subresource: TextureSubresourceLayers,
    ) {
        self.commands.push(RhiCommand::CopyBufferToTexture {
            src: src.clone(),
            src_offset,
            dst: dst.clone(),
            dst_subresource,
        });
    }

    pub fn copy_texture_to_buffer(
        &mut self,
        src: &TextureRef,
        src_subresource: TextureSubresourceLayers,
        dst: &BufferRef,
        dst_offset: u64,
    ) {
        self.commands.push(RhiCommand::CopyTextureToBuffer {
            src: src.clone(),
            src_subresource,
            dst: dst.clone(),
            dst_offset,
        });
    }

    pub fn generate_mips(&mut self, texture: &TextureRef) {
        self.commands.push(RhiCommand::GenerateMips(texture.clone()));
    }

    pub fn flush(&mut self) {
        let mut context = self.context.lock().unwrap_or_else(|e| e.into_inner());
        for command in self.commands.drain(..) {
            command.execute(&mut *context);
        }
        context.execute(None, None, None);
    }
}

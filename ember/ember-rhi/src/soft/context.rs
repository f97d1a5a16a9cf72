//! Journaling command context. Each call is applied to the tracked resource
//! state (barriers) and appended to the device-wide journal, which is the
//! software stand-in for a GPU command stream.

use std::any::Any;

use crate::command::CommandContext;
use crate::info::*;
use crate::resource::*;
use crate::types::*;

use super::resource::{SoftBuffer, SoftFence, SoftTexture};
use super::{CommandRecord, Journal};

pub struct SoftCommandContext {
    journal: Journal,
    debug: bool,
    event_depth: u32,
}

impl SoftCommandContext {
    pub(super) fn new(journal: Journal, debug: bool) -> Self {
        Self { journal, debug, event_depth: 0 }
    }

    fn push(&self, record: CommandRecord) {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).push(record);
    }

    fn apply_texture_barrier(&self, barrier: &TextureBarrier) {
        let Some(texture) = barrier.texture.as_any().downcast_ref::<SoftTexture>() else {
            return;
        };
        let tracked = texture.current_state();
        if self.debug
            && barrier.src_state != ResourceState::Undefined
            && tracked != barrier.src_state
        {
            log::warn!(
                "texture barrier on '{}': tracked state {:?} but barrier source is {:?}",
                texture.name(),
                tracked,
                barrier.src_state
            );
        }
        texture.set_state(barrier.dst_state);
    }

    fn apply_buffer_barrier(&self, barrier: &BufferBarrier) {
        let Some(buffer) = barrier.buffer.as_any().downcast_ref::<SoftBuffer>() else {
            return;
        };
        let tracked = buffer.current_state();
        if self.debug
            && barrier.src_state != ResourceState::Undefined
            && tracked != barrier.src_state
        {
            log::warn!(
                "buffer barrier on '{}': tracked state {:?} but barrier source is {:?}",
                buffer.name(),
                tracked,
                barrier.src_state
            );
        }
        buffer.set_state(barrier.dst_state);
    }
}

impl CommandContext for SoftCommandContext {
    fn begin_command(&mut self) {
        self.push(CommandRecord::BeginCommand);
    }

    fn end_command(&mut self) {
        self.push(CommandRecord::EndCommand);
    }

    fn execute(
        &mut self,
        fence: Option<&FenceRef>,
        _wait_semaphore: Option<&SemaphoreRef>,
        _signal_semaphore: Option<&SemaphoreRef>,
    ) {
        if self.event_depth != 0 {
            log::warn!("command context submitted with {} unpopped debug events", self.event_depth);
        }
        self.push(CommandRecord::Execute);
        if let Some(fence) = fence {
            if let Some(fence) = fence.as_any().downcast_ref::<SoftFence>() {
                fence.signal();
            }
        }
    }

    fn texture_barrier(&mut self, barrier: &TextureBarrier) {
        self.apply_texture_barrier(barrier);
        self.push(CommandRecord::TextureBarrier {
            texture: barrier.texture.id(),
            src: barrier.src_state,
            dst: barrier.dst_state,
        });
    }

    fn buffer_barrier(&mut self, barrier: &BufferBarrier) {
        self.apply_buffer_barrier(barrier);
        self.push(CommandRecord::BufferBarrier {
            buffer: barrier.buffer.id(),
            src: barrier.src_state,
            dst: barrier.dst_state,
        });
    }

    fn copy_buffer(&mut self, src: &BufferRef, _src_offset: u64, dst: &BufferRef, _dst_offset: u64, size: u64) {
        self.push(CommandRecord::CopyBuffer { src: src.id(), dst: dst.id(), size });
    }

    fn copy_texture(
        &mut self,
        src: &TextureRef,
        _src_subresource: TextureSubresourceLayers,
        dst: &TextureRef,
        _dst_subresource: TextureSubresourceLayers,
    ) {
        self.push(CommandRecord::CopyTexture { src: src.id(), dst: dst.id() });
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &BufferRef,
        _src_offset: u64,
        dst: &TextureRef,
        _dst_subresource: TextureSubresourceLayers,
    ) {
        self.push(CommandRecord::CopyBufferToTexture { src: src.id(), dst: dst.id() });
    }

    fn copy_texture_to_buffer(
        &mut self,
        src: &TextureRef,
        _src_subresource: TextureSubresourceLayers,
        dst: &BufferRef,
        _dst_offset: u64,
    ) {
        self.push(CommandRecord::CopyTextureToBuffer { src: src.id(), dst: dst.id() });
    }

    fn generate_mips(&mut self, texture: &TextureRef) {
        if texture.info().mip_levels <= 1 {
            log::debug!("generate_mips on single-mip texture '{}' is a no-op", texture.name());
        }
        self.push(CommandRecord::GenerateMips { texture: texture.id() });
    }

    fn push_event(&mut self, name: &str, _color: Color3) {
        self.event_depth += 1;
        self.push(CommandRecord::PushEvent { name: name.to_owned() });
    }

    fn pop_event(&mut self) {
        if self.event_depth == 0 {
            log::warn!("pop_event without matching push_event");
        } else {
            self.event_depth -= 1;
        }
        self.push(CommandRecord::PopEvent);
    }

    fn begin_render_pass(&mut self, render_pass: &RenderPassRef) {
        let info = render_pass.info();
        let colors = info
            .color_attachments
            .iter()
            .flatten()
            .map(|a| (a.load_op, a.store_op, a.clear_color))
            .collect();
        let depth = info
            .depth_stencil_attachment
            .as_ref()
            .map(|a| (a.load_op, a.store_op, a.clear_depth, a.clear_stencil));
        self.push(CommandRecord::BeginRenderPass {
            extent: info.extent,
            layers: info.layers,
            colors,
            depth,
        });
    }

    fn end_render_pass(&mut self) {
        self.push(CommandRecord::EndRenderPass);
    }

    fn set_viewport(&mut self, min: Offset2D, max: Offset2D) {
        self.push(CommandRecord::SetViewport { min, max });
    }

    fn set_scissor(&mut self, min: Offset2D, max: Offset2D) {
        self.push(CommandRecord::SetScissor { min, max });
    }

    fn set_depth_bias(&mut self, constant_bias: f32, slope_bias: f32, clamp_bias: f32) {
        self.push(CommandRecord::SetDepthBias { constant_bias, slope_bias, clamp_bias });
    }

    fn set_line_width(&mut self, width: f32) {
        self.push(CommandRecord::SetLineWidth { width });
    }

    fn set_graphics_pipeline(&mut self, pipeline: &GraphicsPipelineRef) {
        self.push(CommandRecord::SetGraphicsPipeline { pipeline: pipeline.id() });
    }

    fn set_compute_pipeline(&mut self, pipeline: &ComputePipelineRef) {
        self.push(CommandRecord::SetComputePipeline { pipeline: pipeline.id() });
    }

    fn set_ray_tracing_pipeline(&mut self, pipeline: &RayTracingPipelineRef) {
        self.push(CommandRecord::SetRayTracingPipeline { pipeline: pipeline.id() });
    }

    fn push_constants(&mut self, data: &[u8], frequency: ShaderFrequency) {
        self.push(CommandRecord::PushConstants { size: data.len() as u32, frequency });
    }

    fn bind_descriptor_set(&mut self, descriptor: &DescriptorSetRef, set: u32) {
        self.push(CommandRecord::BindDescriptorSet { descriptor: descriptor.id(), set });
    }

    fn bind_constant_buffer(&mut self, buffer: &BufferRef, slot: u32, frequency: ShaderFrequency) {
        self.push(CommandRecord::BindConstantBuffer { buffer: buffer.id(), slot, frequency });
    }

    fn bind_texture(&mut self, texture: &TextureRef, slot: u32, frequency: ShaderFrequency) {
        self.push(CommandRecord::BindTexture { texture: texture.id(), slot, frequency });
    }

    fn bind_sampler(&mut self, sampler: &SamplerRef, slot: u32, frequency: ShaderFrequency) {
        self.push(CommandRecord::BindSampler { sampler: sampler.id(), slot, frequency });
    }

    fn bind_vertex_buffer(&mut self, buffer: &BufferRef, stream_index: u32, offset: u64) {
        self.push(CommandRecord::BindVertexBuffer { buffer: buffer.id(), stream_index, offset });
    }

    fn bind_index_buffer(&mut self, buffer: &BufferRef, offset: u64) {
        self.push(CommandRecord::BindIndexBuffer { buffer: buffer.id(), offset });
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        self.push(CommandRecord::Dispatch { x: group_count_x, y: group_count_y, z: group_count_z });
    }

    fn dispatch_indirect(&mut self, argument_buffer: &BufferRef, argument_offset: u64) {
        self.push(CommandRecord::DispatchIndirect {
            buffer: argument_buffer.id(),
            offset: argument_offset,
        });
    }

    fn trace_rays(&mut self, width: u32, height: u32, depth: u32) {
        self.push(CommandRecord::TraceRays { x: width, y: height, z: depth });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.push(CommandRecord::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.push(CommandRecord::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
    }

    fn draw_indirect(&mut self, argument_buffer: &BufferRef, offset: u64, draw_count: u32) {
        self.push(CommandRecord::DrawIndirect { buffer: argument_buffer.id(), offset, draw_count });
    }

    fn draw_indexed_indirect(&mut self, argument_buffer: &BufferRef, offset: u64, draw_count: u32) {
        self.push(CommandRecord::DrawIndexedIndirect {
            buffer: argument_buffer.id(),
            offset,
            draw_count,
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

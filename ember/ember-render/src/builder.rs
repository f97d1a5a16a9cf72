//! Graph construction and execution.
//!
//! `RdgBuilder` owns the frame's dependency graph. Declaration happens
//! through per-kind fluent builders; `execute` walks the passes in
//! declaration order, realizes transient resources from the pools, infers
//! state-transition barriers from the edges, invokes the pass executors, and
//! releases everything whose last use has passed.

use std::collections::HashMap;
use std::sync::Mutex;

use ember_rhi::{
    AttachmentInfo, AttachmentLoadOp, AttachmentStoreOp, Buffer as _, BufferBarrier, BufferRef,
    Color3, Color4, CommandList, DescriptorSet as _, DescriptorSetRef, DescriptorUpdateInfo,
    Device as _, DeviceRef, Extent3D, MemoryUsage, RenderPassInfo, Resource as _, ResourceState,
    ResourceTypeFlags, RootSignatureRef, Texture as _, TextureBarrier, TextureRef,
    TextureSubresourceLayers, TextureSubresourceRange, TextureViewInfo, TextureViewType,
    MAX_DESCRIPTOR_SETS, MAX_RENDER_TARGETS,
};

use crate::edge::{BufferEdge, BufferRole, RdgEdge, TextureEdge, TextureRole};
use crate::graph::{DependencyGraph, NodeId, INVALID_ID};
use crate::handle::*;
use crate::node::{
    BufferNode, PassContext, PassKind, PassNode, PassResources, RdgNode, TextureNode,
};
use crate::pool::{
    PooledBuffer, PooledTexture, PooledTextureView, RdgBufferPool, RdgDescriptorSetPool,
    RdgTexturePool, RdgTextureViewPool,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Name lookup scoped to one graph instance.
#[derive(Default)]
pub struct Blackboard {
    pub(crate) passes: HashMap<String, NodeId>,
    pub(crate) buffers: HashMap<String, NodeId>,
    pub(crate) textures: HashMap<String, NodeId>,
}

impl Blackboard {
    pub fn pass(&self, name: &str) -> Option<NodeId> {
        self.passes.get(name).copied()
    }

    pub fn buffer(&self, name: &str) -> Option<NodeId> {
        self.buffers.get(name).copied()
    }

    pub fn texture(&self, name: &str) -> Option<NodeId> {
        self.textures.get(name).copied()
    }

    pub fn clear(&mut self) {
        self.passes.clear();
        self.buffers.clear();
        self.textures.clear();
    }
}

pub struct RdgBuilder {
    device: DeviceRef,
    command: CommandList,
    graph: DependencyGraph<RdgNode, RdgEdge>,
    blackboard: Blackboard,
    /// Pass node ids in declaration order; this *is* the execution order.
    passes: Vec<NodeId>,
}

impl RdgBuilder {
    pub fn new(device: DeviceRef, command: CommandList) -> Self {
        Self {
            device,
            command,
            graph: DependencyGraph::new(),
            blackboard: Blackboard::default(),
            passes: Vec::new(),
        }
    }

    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    pub fn command(&mut self) -> &mut CommandList {
        &mut self.command
    }

    pub fn graph(&self) -> &DependencyGraph<RdgNode, RdgEdge> {
        &self.graph
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    // --- Declaration ---

    pub fn create_texture(&mut self, name: &str) -> RdgTextureBuilder<'_> {
        let node = self.graph.create_node(RdgNode::Texture(TextureNode::new(name.to_owned())));
        self.blackboard.textures.insert(name.to_owned(), node);
        RdgTextureBuilder { builder: self, node }
    }

    pub fn create_buffer(&mut self, name: &str) -> RdgBufferBuilder<'_> {
        let node = self.graph.create_node(RdgNode::Buffer(BufferNode::new(name.to_owned())));
        self.blackboard.buffers.insert(name.to_owned(), node);
        RdgBufferBuilder { builder: self, node }
    }

    fn create_pass(&mut self, name: &str, kind: PassKind) -> NodeId {
        let node = self.graph.create_node(RdgNode::Pass(PassNode::new(name.to_owned(), kind)));
        self.blackboard.passes.insert(name.to_owned(), node);
        self.passes.push(node);
        node
    }

    pub fn create_render_pass(&mut self, name: &str) -> RdgRenderPassBuilder<'_> {
        let pass = self.create_pass(name, PassKind::Render);
        RdgRenderPassBuilder { builder: self, pass }
    }

    pub fn create_compute_pass(&mut self, name: &str) -> RdgComputePassBuilder<'_> {
        let pass = self.create_pass(name, PassKind::Compute);
        RdgComputePassBuilder { builder: self, pass }
    }

    pub fn create_ray_tracing_pass(&mut self, name: &str) -> RdgRayTracingPassBuilder<'_> {
        let pass = self.create_pass(name, PassKind::RayTracing);
        RdgRayTracingPassBuilder { builder: self, pass }
    }

    pub fn create_present_pass(&mut self, name: &str) -> RdgPresentPassBuilder<'_> {
        let pass = self.create_pass(name, PassKind::Present);
        RdgPresentPassBuilder { builder: self, pass }
    }

    pub fn create_copy_pass(&mut self, name: &str) -> RdgCopyPassBuilder<'_> {
        let pass = self.create_pass(name, PassKind::Copy);
        RdgCopyPassBuilder { builder: self, pass }
    }

    // --- Retrieval ---

    pub fn get_texture(&self, name: &str) -> TextureHandle {
        match self.blackboard.texture(name) {
            Some(id) => TextureHandle::new(id),
            None => {
                log::warn!("unable to find RDG resource [{name}], check the name");
                TextureHandle::INVALID
            }
        }
    }

    pub fn get_buffer(&self, name: &str) -> BufferHandle {
        match self.blackboard.buffer(name) {
            Some(id) => BufferHandle::new(id),
            None => {
                log::warn!("unable to find RDG resource [{name}], check the name");
                BufferHandle::INVALID
            }
        }
    }

    fn pass_of_kind(&self, name: &str, kind: PassKind) -> NodeId {
        let id = self
            .blackboard
            .pass(name)
            .filter(|&id| {
                self.graph.node(id).and_then(RdgNode::as_pass).is_some_and(|p| p.kind == kind)
            })
            .unwrap_or(INVALID_ID);
        if id == INVALID_ID {
            log::warn!("unable to find RDG pass [{name}], check the name");
        }
        id
    }

    pub fn get_render_pass(&self, name: &str) -> RenderPassHandle {
        RenderPassHandle::new(self.pass_of_kind(name, PassKind::Render))
    }

    pub fn get_compute_pass(&self, name: &str) -> ComputePassHandle {
        ComputePassHandle::new(self.pass_of_kind(name, PassKind::Compute))
    }

    pub fn get_ray_tracing_pass(&self, name: &str) -> RayTracingPassHandle {
        RayTracingPassHandle::new(self.pass_of_kind(name, PassKind::RayTracing))
    }

    pub fn get_present_pass(&self, name: &str) -> PresentPassHandle {
        PresentPassHandle::new(self.pass_of_kind(name, PassKind::Present))
    }

    pub fn get_copy_pass(&self, name: &str) -> CopyPassHandle {
        CopyPassHandle::new(self.pass_of_kind(name, PassKind::Copy))
    }

    // --- Edge wiring ---

    fn link_edge(&mut self, from: NodeId, to: NodeId, edge: RdgEdge) {
        if self.graph.node(from).is_none() || self.graph.node(to).is_none() {
            log::warn!("dropping graph edge with an unknown endpoint, check resource handles");
            return;
        }
        let id = self.graph.create_edge(edge);
        self.graph.link(from, to, id);
    }

    // --- Execution ---

    /// Runs every declared pass in order, then resets the builder for the
    /// next frame. An empty graph is a no-op.
    pub fn execute(&mut self) {
        let passes = self.passes.clone();
        for &pass_id in &passes {
            let kind = match self.graph.node(pass_id).and_then(RdgNode::as_pass) {
                Some(pass) if !pass.culled => pass.kind,
                _ => continue,
            };
            match kind {
                PassKind::Render => self.execute_render_pass(pass_id),
                PassKind::Compute => self.execute_dispatch_pass(pass_id, Color3::new(1.0, 0.0, 0.0)),
                PassKind::RayTracing => {
                    self.execute_dispatch_pass(pass_id, Color3::new(0.0, 1.0, 0.0));
                }
                PassKind::Present => self.execute_present_pass(pass_id),
                PassKind::Copy => self.execute_copy_pass(pass_id),
            }
        }

        // Every descriptor set checked out during the frame goes back to the
        // frame slot it came from.
        let frame_pool = RdgDescriptorSetPool::get(crate::current_frame_index());
        for &pass_id in &passes {
            let Some(pass) = self.graph.node_mut(pass_id).and_then(RdgNode::as_pass_mut) else {
                continue;
            };
            let pooled = std::mem::take(&mut pass.pooled_descriptor_sets);
            let root_signature = pass.root_signature.clone();
            if let Some(root_signature) = root_signature {
                let mut pool = lock(frame_pool);
                for (descriptor, set) in pooled {
                    pool.release(crate::pool::PooledDescriptor { descriptor }, &root_signature, set);
                }
            }
        }

        self.passes.clear();
        self.graph = DependencyGraph::new();
        self.blackboard.clear();
    }

    fn pass_name(&self, pass_id: NodeId) -> String {
        self.graph.node(pass_id).map(|n| n.name().to_owned()).unwrap_or_default()
    }

    fn execute_render_pass(&mut self, pass_id: NodeId) {
        self.prepare_descriptor_set(pass_id);

        let mut render_pass_info = RenderPassInfo { layers: 1, ..Default::default() };
        self.prepare_render_target(pass_id, &mut render_pass_info);
        let render_pass = self.device.create_render_pass(render_pass_info);

        let name = self.pass_name(pass_id);
        self.command.push_event(&name, Color3::new(0.0, 0.0, 0.0));

        self.create_input_barriers(pass_id);

        if let Some(render_pass) = &render_pass {
            self.command.begin_render_pass(render_pass);
        }

        self.invoke_executor(pass_id);

        if render_pass.is_some() {
            self.command.end_render_pass();
        }

        self.create_output_barriers(pass_id);
        self.release_resources(pass_id);

        self.command.pop_event();

        if let Some(render_pass) = render_pass {
            render_pass.destroy();
        }
    }

    fn execute_dispatch_pass(&mut self, pass_id: NodeId, event_color: Color3) {
        self.prepare_descriptor_set(pass_id);

        let name = self.pass_name(pass_id);
        self.command.push_event(&name, event_color);

        self.create_input_barriers(pass_id);
        self.invoke_executor(pass_id);
        self.create_output_barriers(pass_id);
        self.release_resources(pass_id);

        self.command.pop_event();
    }

    fn execute_present_pass(&mut self, pass_id: NodeId) {
        let mut present_edge: Option<(TextureEdge, NodeId)> = None;
        let mut source_edge: Option<(TextureEdge, NodeId)> = None;
        for (edge, texture_id) in input_texture_edges(&self.graph, pass_id) {
            if edge.roles.contains(TextureRole::AS_PRESENT) {
                present_edge = Some((edge, texture_id));
            } else {
                source_edge = Some((edge, texture_id));
            }
        }

        let name = self.pass_name(pass_id);
        self.command.push_event(&name, Color3::new(0.0, 0.0, 1.0));

        self.create_input_barriers(pass_id);

        if let (Some((_, present_id)), Some((source_edge, source_id))) = (present_edge, source_edge)
        {
            let backbuffer = self.resolve_texture(present_id);
            let source = self.resolve_texture(source_id);
            if let (Some(backbuffer), Some(source)) = (backbuffer, source) {
                let source_layers = if source_edge.subresource_layers.is_default() {
                    source.default_subresource_layers()
                } else {
                    source_edge.subresource_layers
                };
                self.command.texture_barrier(&TextureBarrier {
                    texture: backbuffer.clone(),
                    src_state: ResourceState::Present,
                    dst_state: ResourceState::TransferDst,
                    subresource: TextureSubresourceRange::default(),
                });
                self.command.copy_texture(
                    &source,
                    source_layers,
                    &backbuffer,
                    backbuffer.default_subresource_layers(),
                );
                self.command.texture_barrier(&TextureBarrier {
                    texture: backbuffer,
                    src_state: ResourceState::TransferDst,
                    dst_state: ResourceState::Present,
                    subresource: TextureSubresourceRange::default(),
                });
            }
        }

        self.create_output_barriers(pass_id);
        self.release_resources(pass_id);

        self.command.pop_event();
    }

    fn execute_copy_pass(&mut self, pass_id: NodeId) {
        let mut from: Option<(TextureEdge, NodeId)> = None;
        let mut to: Option<(TextureEdge, NodeId)> = None;
        for (edge, texture_id) in texture_edges_of_pass(&self.graph, pass_id) {
            if edge.roles.contains(TextureRole::AS_TRANSFER_SRC) {
                from = Some((edge, texture_id));
            } else if edge.roles.contains(TextureRole::AS_TRANSFER_DST) {
                to = Some((edge, texture_id));
            }
        }
        let generate_mips = self
            .graph
            .node(pass_id)
            .and_then(RdgNode::as_pass)
            .is_some_and(|pass| pass.generate_mips);

        let name = self.pass_name(pass_id);
        self.command.push_event(&name, Color3::new(1.0, 1.0, 0.0));

        self.create_input_barriers(pass_id);

        if let (Some((from_edge, from_id)), Some((to_edge, to_id))) = (from, to) {
            let from_texture = self.resolve_texture(from_id);
            let to_texture = self.resolve_texture(to_id);
            if let (Some(from_texture), Some(to_texture)) = (from_texture, to_texture) {
                self.command.copy_texture(
                    &from_texture,
                    from_edge.subresource_layers,
                    &to_texture,
                    to_edge.subresource_layers,
                );

                if generate_mips {
                    self.command.texture_barrier(&TextureBarrier {
                        texture: to_texture.clone(),
                        src_state: ResourceState::TransferDst,
                        dst_state: ResourceState::TransferSrc,
                        subresource: TextureSubresourceRange::default(),
                    });
                    self.command.generate_mips(&to_texture);
                    self.command.texture_barrier(&TextureBarrier {
                        texture: to_texture,
                        src_state: ResourceState::TransferSrc,
                        dst_state: ResourceState::TransferDst,
                        subresource: TextureSubresourceRange::default(),
                    });
                }
            }
        }

        self.create_output_barriers(pass_id);
        self.release_resources(pass_id);

        self.command.pop_event();
    }

    fn invoke_executor(&mut self, pass_id: NodeId) {
        let mut executor = match self.graph.node_mut(pass_id).and_then(RdgNode::as_pass_mut) {
            Some(pass) => pass.executor.take(),
            None => None,
        };
        let (descriptors, pass_index) = match self.graph.node(pass_id).and_then(RdgNode::as_pass) {
            Some(pass) => (pass.descriptor_sets.clone(), pass.pass_index),
            None => return,
        };
        if let Some(executor) = executor.as_mut() {
            let mut context = PassContext {
                command: &mut self.command,
                resources: PassResources::new(&self.graph),
                descriptors,
                pass_index,
            };
            executor(&mut context);
        }
    }

    /// Realizes every non-output texture edge as a pooled view, and fills
    /// descriptor-set slots from the per-frame pool when the pass carries a
    /// root signature.
    fn prepare_descriptor_set(&mut self, pass_id: NodeId) {
        let frame_pool = RdgDescriptorSetPool::get(crate::current_frame_index());

        for (edge, texture_id) in texture_edges_of_pass(&self.graph, pass_id) {
            if edge.is_output() {
                continue;
            }
            let Some(texture) = self.resolve_texture(texture_id) else { continue };
            let format = match self.graph.node(texture_id).and_then(RdgNode::as_texture) {
                Some(node) => node.info.format,
                None => continue,
            };
            let Some(view) = lock(RdgTextureViewPool::get()).allocate(
                &self.device,
                &TextureViewInfo {
                    texture: texture.clone(),
                    format,
                    view_type: edge.view_type,
                    subresource: edge.subresource,
                },
            ) else {
                continue;
            };

            if edge.set as usize >= MAX_DESCRIPTOR_SETS {
                log::warn!("descriptor set slot {} is out of range", edge.set);
                continue;
            }
            let allocated = self.allocate_descriptor_if_missing(pass_id, edge.set, frame_pool);

            let Some(pass) = self.graph.node_mut(pass_id).and_then(RdgNode::as_pass_mut) else {
                continue;
            };
            pass.pooled_views.push(view.texture_view.clone());
            if let Some(descriptor) = allocated {
                pass.descriptor_sets[edge.set as usize] = Some(descriptor.clone());
                pass.pooled_descriptor_sets.push((descriptor, edge.set));
            }
            if edge
                .roles
                .intersects(TextureRole::AS_SHADER_READ | TextureRole::AS_SHADER_READ_WRITE)
            {
                if let Some(descriptor) = &pass.descriptor_sets[edge.set as usize] {
                    descriptor.update_descriptor(&DescriptorUpdateInfo {
                        binding: edge.binding,
                        index: edge.index,
                        resource_type: edge.resource_type,
                        texture_view: Some(view.texture_view.clone()),
                        ..Default::default()
                    });
                }
            }
        }

        for (edge, buffer_id) in buffer_edges_of_pass(&self.graph, pass_id) {
            if edge.set as usize >= MAX_DESCRIPTOR_SETS {
                log::warn!("descriptor set slot {} is out of range", edge.set);
                continue;
            }
            let allocated = self.allocate_descriptor_if_missing(pass_id, edge.set, frame_pool);
            if let Some(descriptor) = allocated {
                if let Some(pass) = self.graph.node_mut(pass_id).and_then(RdgNode::as_pass_mut) {
                    pass.descriptor_sets[edge.set as usize] = Some(descriptor.clone());
                    pass.pooled_descriptor_sets.push((descriptor, edge.set));
                }
            }
            if edge.roles.intersects(BufferRole::AS_SHADER_READ | BufferRole::AS_SHADER_READ_WRITE)
            {
                let Some(buffer) = self.resolve_buffer(buffer_id) else { continue };
                let descriptor = self
                    .graph
                    .node(pass_id)
                    .and_then(RdgNode::as_pass)
                    .and_then(|pass| pass.descriptor_sets[edge.set as usize].clone());
                if let Some(descriptor) = descriptor {
                    descriptor.update_descriptor(&DescriptorUpdateInfo {
                        binding: edge.binding,
                        index: edge.index,
                        resource_type: edge.resource_type,
                        buffer: Some(buffer),
                        buffer_offset: edge.offset,
                        buffer_range: edge.size,
                        ..Default::default()
                    });
                }
            }
        }
    }

    fn allocate_descriptor_if_missing(
        &mut self,
        pass_id: NodeId,
        set: u32,
        frame_pool: &'static Mutex<RdgDescriptorSetPool>,
    ) -> Option<DescriptorSetRef> {
        let (needs_set, root_signature) =
            match self.graph.node(pass_id).and_then(RdgNode::as_pass) {
                Some(pass) => (
                    pass.descriptor_sets[set as usize].is_none(),
                    pass.root_signature.clone(),
                ),
                None => return None,
            };
        if !needs_set {
            return None;
        }
        let root_signature = root_signature?;
        lock(frame_pool).allocate(&root_signature, set).map(|pooled| pooled.descriptor)
    }

    /// Fills attachment slots from color/depth edges; the pass extent comes
    /// from the attached texture, the layer count from the edge subresource.
    fn prepare_render_target(&mut self, pass_id: NodeId, info: &mut RenderPassInfo) {
        for (edge, texture_id) in texture_edges_of_pass(&self.graph, pass_id) {
            if edge.is_output() {
                continue;
            }
            if !edge.roles.intersects(TextureRole::AS_COLOR | TextureRole::AS_DEPTH_STENCIL) {
                continue;
            }
            let Some(texture) = self.resolve_texture(texture_id) else { continue };
            let (format, extent) = match self.graph.node(texture_id).and_then(RdgNode::as_texture) {
                Some(node) => (node.info.format, node.info.extent),
                None => continue,
            };
            let Some(view) = lock(RdgTextureViewPool::get()).allocate(
                &self.device,
                &TextureViewInfo {
                    texture: texture.clone(),
                    format,
                    view_type: edge.view_type,
                    subresource: edge.subresource,
                },
            ) else {
                continue;
            };
            if let Some(pass) = self.graph.node_mut(pass_id).and_then(RdgNode::as_pass_mut) {
                pass.pooled_views.push(view.texture_view.clone());
            }

            info.extent = extent.wh();
            info.layers = edge.subresource.layer_count.max(1);

            if edge.roles.contains(TextureRole::AS_COLOR) {
                if edge.binding as usize >= MAX_RENDER_TARGETS {
                    log::warn!("color attachment binding {} is out of range", edge.binding);
                    continue;
                }
                info.color_attachments[edge.binding as usize] = Some(AttachmentInfo {
                    texture_view: view.texture_view,
                    load_op: edge.load_op,
                    store_op: edge.store_op,
                    clear_color: edge.clear_color,
                    clear_depth: 1.0,
                    clear_stencil: 0,
                    read_only: false,
                });
            } else {
                info.depth_stencil_attachment = Some(AttachmentInfo {
                    texture_view: view.texture_view,
                    load_op: edge.load_op,
                    store_op: edge.store_op,
                    clear_color: Color4::default(),
                    clear_depth: edge.clear_depth,
                    clear_stencil: edge.clear_stencil,
                    read_only: edge.roles.contains(TextureRole::READ_ONLY_DEPTH),
                });
            }
        }
    }

    fn create_input_barriers(&mut self, pass_id: NodeId) {
        for (edge, texture_id) in texture_edges_of_pass(&self.graph, pass_id) {
            if edge.is_output() {
                continue;
            }
            let Some(texture) = self.resolve_texture(texture_id) else { continue };
            let previous =
                previous_state_texture(&self.graph, texture_id, pass_id, edge.subresource, false);
            self.command.texture_barrier(&TextureBarrier {
                texture,
                src_state: previous,
                dst_state: edge.state,
                subresource: edge.subresource,
            });
        }
        for (edge, buffer_id) in buffer_edges_of_pass(&self.graph, pass_id) {
            if edge.is_output() {
                continue;
            }
            let Some(buffer) = self.resolve_buffer(buffer_id) else { continue };
            let previous = previous_state_buffer(&self.graph, buffer_id, pass_id, 0, 0, false);
            self.command.buffer_barrier(&BufferBarrier {
                buffer,
                src_state: previous,
                dst_state: edge.state,
                offset: edge.offset,
                size: edge.size,
            });
        }
    }

    fn create_output_barriers(&mut self, pass_id: NodeId) {
        for (edge, texture_id) in texture_edges_of_pass(&self.graph, pass_id) {
            if !edge.is_output() {
                continue;
            }
            let Some(texture) = self.resolve_texture(texture_id) else { continue };
            let previous =
                previous_state_texture(&self.graph, texture_id, pass_id, edge.subresource, true);
            self.command.texture_barrier(&TextureBarrier {
                texture,
                src_state: previous,
                dst_state: edge.state,
                subresource: edge.subresource,
            });
        }
        for (edge, buffer_id) in buffer_edges_of_pass(&self.graph, pass_id) {
            if !edge.is_output() {
                continue;
            }
            let Some(buffer) = self.resolve_buffer(buffer_id) else { continue };
            let previous = previous_state_buffer(&self.graph, buffer_id, pass_id, 0, 0, true);
            self.command.buffer_barrier(&BufferBarrier {
                buffer,
                src_state: previous,
                dst_state: edge.state,
                offset: edge.offset,
                size: edge.size,
            });
        }
    }

    /// Returns pool resources whose last use in the graph is this pass, and
    /// the views checked out for the pass itself.
    fn release_resources(&mut self, pass_id: NodeId) {
        for (edge, texture_id) in texture_edges_of_pass(&self.graph, pass_id) {
            if is_last_used_texture(&self.graph, texture_id, pass_id, edge.is_output()) {
                self.release_texture(texture_id, edge.state);
            }
        }
        for (edge, buffer_id) in buffer_edges_of_pass(&self.graph, pass_id) {
            if is_last_used_buffer(&self.graph, buffer_id, pass_id, edge.is_output()) {
                self.release_buffer(buffer_id, edge.state);
            }
        }

        let views = self
            .graph
            .node_mut(pass_id)
            .and_then(RdgNode::as_pass_mut)
            .map(|pass| std::mem::take(&mut pass.pooled_views))
            .unwrap_or_default();
        if !views.is_empty() {
            let mut pool = lock(RdgTextureViewPool::get());
            for texture_view in views {
                pool.release(PooledTextureView { texture_view });
            }
        }
    }

    /// Realizes a texture node from the pool on first touch. The pool entry's
    /// recorded state becomes the node's initial state for barrier inference.
    fn resolve_texture(&mut self, texture_id: NodeId) -> Option<TextureRef> {
        let node = self.graph.node_mut(texture_id).and_then(RdgNode::as_texture_mut)?;
        if node.texture.is_none() {
            let pooled = lock(RdgTexturePool::get()).allocate(&self.device, &node.info)?;
            pooled.texture.set_name(&node.name);
            node.initial_state = pooled.state;
            node.texture = Some(pooled.texture);
        }
        node.texture.clone()
    }

    fn resolve_buffer(&mut self, buffer_id: NodeId) -> Option<BufferRef> {
        let node = self.graph.node_mut(buffer_id).and_then(RdgNode::as_buffer_mut)?;
        if node.buffer.is_none() {
            let pooled = lock(RdgBufferPool::get()).allocate(&self.device, &node.info)?;
            pooled.buffer.set_name(&node.name);
            node.initial_state = pooled.state;
            node.buffer = Some(pooled.buffer);
        }
        node.buffer.clone()
    }

    fn release_texture(&mut self, texture_id: NodeId, state: ResourceState) {
        let Some(node) = self.graph.node_mut(texture_id).and_then(RdgNode::as_texture_mut) else {
            return;
        };
        if node.imported {
            return;
        }
        if let Some(texture) = node.texture.take() {
            lock(RdgTexturePool::get()).release(PooledTexture { texture, state });
            node.initial_state = ResourceState::Undefined;
        }
    }

    fn release_buffer(&mut self, buffer_id: NodeId, state: ResourceState) {
        let Some(node) = self.graph.node_mut(buffer_id).and_then(RdgNode::as_buffer_mut) else {
            return;
        };
        if node.imported {
            return;
        }
        if let Some(buffer) = node.buffer.take() {
            lock(RdgBufferPool::get()).release(PooledBuffer { buffer, state });
            node.initial_state = ResourceState::Undefined;
        }
    }
}

// --- Graph scans ---

/// Every texture edge touching `pass_id`, paired with the texture node at the
/// other end. In-edges first, then out-edges, both in insertion order.
fn texture_edges_of_pass(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    pass_id: NodeId,
) -> Vec<(TextureEdge, NodeId)> {
    let mut edges = Vec::new();
    for &edge_id in graph.in_edges(pass_id) {
        if let Some(RdgEdge::Texture(edge)) = graph.edge(edge_id) {
            let texture_id = graph.edge_from(edge_id);
            if graph.node(texture_id).and_then(RdgNode::as_texture).is_some() {
                edges.push((edge.clone(), texture_id));
            }
        }
    }
    for &edge_id in graph.out_edges(pass_id) {
        if let Some(RdgEdge::Texture(edge)) = graph.edge(edge_id) {
            let texture_id = graph.edge_to(edge_id);
            if graph.node(texture_id).and_then(RdgNode::as_texture).is_some() {
                edges.push((edge.clone(), texture_id));
            }
        }
    }
    edges
}

fn input_texture_edges(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    pass_id: NodeId,
) -> Vec<(TextureEdge, NodeId)> {
    let mut edges = Vec::new();
    for &edge_id in graph.in_edges(pass_id) {
        if let Some(RdgEdge::Texture(edge)) = graph.edge(edge_id) {
            let texture_id = graph.edge_from(edge_id);
            if graph.node(texture_id).and_then(RdgNode::as_texture).is_some() {
                edges.push((edge.clone(), texture_id));
            }
        }
    }
    edges
}

fn buffer_edges_of_pass(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    pass_id: NodeId,
) -> Vec<(BufferEdge, NodeId)> {
    let mut edges = Vec::new();
    for &edge_id in graph.in_edges(pass_id) {
        if let Some(RdgEdge::Buffer(edge)) = graph.edge(edge_id) {
            let buffer_id = graph.edge_from(edge_id);
            if graph.node(buffer_id).and_then(RdgNode::as_buffer).is_some() {
                edges.push((edge.clone(), buffer_id));
            }
        }
    }
    for &edge_id in graph.out_edges(pass_id) {
        if let Some(RdgEdge::Buffer(edge)) = graph.edge(edge_id) {
            let buffer_id = graph.edge_to(edge_id);
            if graph.node(buffer_id).and_then(RdgNode::as_buffer).is_some() {
                edges.push((edge.clone(), buffer_id));
            }
        }
    }
    edges
}

/// Every edge touching texture `texture_id`, paired with the pass node at
/// the other end.
fn texture_edges_on_resource(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    texture_id: NodeId,
) -> Vec<(TextureEdge, NodeId)> {
    let mut edges = Vec::new();
    for &edge_id in graph.in_edges(texture_id) {
        if let Some(RdgEdge::Texture(edge)) = graph.edge(edge_id) {
            let pass_id = graph.edge_from(edge_id);
            if graph.node(pass_id).and_then(RdgNode::as_pass).is_some() {
                edges.push((edge.clone(), pass_id));
            }
        }
    }
    for &edge_id in graph.out_edges(texture_id) {
        if let Some(RdgEdge::Texture(edge)) = graph.edge(edge_id) {
            let pass_id = graph.edge_to(edge_id);
            if graph.node(pass_id).and_then(RdgNode::as_pass).is_some() {
                edges.push((edge.clone(), pass_id));
            }
        }
    }
    edges
}

fn buffer_edges_on_resource(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    buffer_id: NodeId,
) -> Vec<(BufferEdge, NodeId)> {
    let mut edges = Vec::new();
    for &edge_id in graph.in_edges(buffer_id) {
        if let Some(RdgEdge::Buffer(edge)) = graph.edge(edge_id) {
            let pass_id = graph.edge_from(edge_id);
            if graph.node(pass_id).and_then(RdgNode::as_pass).is_some() {
                edges.push((edge.clone(), pass_id));
            }
        }
    }
    for &edge_id in graph.out_edges(buffer_id) {
        if let Some(RdgEdge::Buffer(edge)) = graph.edge(edge_id) {
            let pass_id = graph.edge_to(edge_id);
            if graph.node(pass_id).and_then(RdgNode::as_pass).is_some() {
                edges.push((edge.clone(), pass_id));
            }
        }
    }
    edges
}

// --- State inference ---

/// State the texture holds when `pass_id` runs, looking only at edges whose
/// pass precedes it (inclusive for output barriers). Among candidates the
/// largest pass id wins; on a tie, input edges win for output barriers and
/// output edges win for input barriers. With no candidate, the node's
/// initial state applies.
fn previous_state_texture(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    texture_id: NodeId,
    pass_id: NodeId,
    subresource: TextureSubresourceRange,
    output: bool,
) -> ResourceState {
    let Some(node) = graph.node(texture_id).and_then(RdgNode::as_texture) else {
        return ResourceState::Undefined;
    };
    let mut previous_id = INVALID_ID;
    let mut previous = node.initial_state;

    for (edge, edge_pass) in texture_edges_on_resource(graph, texture_id) {
        let output_first = if output { !edge.is_output() } else { edge.is_output() };
        let is_previous_pass = if output { edge_pass <= pass_id } else { edge_pass < pass_id };
        // Coverage is coarse: the wildcard covers everything, otherwise only
        // exact equality counts. Partial overlaps never match.
        let covered = subresource.is_default()
            || edge.subresource.is_default()
            || subresource == edge.subresource;

        if !(is_previous_pass && covered) {
            continue;
        }
        if previous_id == INVALID_ID || edge_pass > previous_id {
            previous = edge.state;
            previous_id = edge_pass;
        } else if edge_pass == previous_id && output_first {
            previous = edge.state;
        }
    }

    previous
}

fn previous_state_buffer(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    buffer_id: NodeId,
    pass_id: NodeId,
    offset: u64,
    size: u64,
    output: bool,
) -> ResourceState {
    let Some(node) = graph.node(buffer_id).and_then(RdgNode::as_buffer) else {
        return ResourceState::Undefined;
    };
    let mut previous_id = INVALID_ID;
    let mut previous = node.initial_state;

    for (edge, edge_pass) in buffer_edges_on_resource(graph, buffer_id) {
        let output_first = if output { !edge.is_output() } else { edge.is_output() };
        let is_previous_pass = if output { edge_pass <= pass_id } else { edge_pass < pass_id };
        let covered = (offset == 0 && size == 0)
            || (edge.offset == 0 && edge.size == 0)
            || (offset == edge.offset && size == edge.size);

        if !(is_previous_pass && covered) {
            continue;
        }
        if previous_id == INVALID_ID || edge_pass > previous_id {
            previous = edge.state;
            previous_id = edge_pass;
        } else if edge_pass == previous_id && output_first {
            previous = edge.state;
        }
    }

    previous
}

/// True when no later pass touches the texture. For input queries, an output
/// edge of the same resource on this very pass disqualifies it.
fn is_last_used_texture(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    texture_id: NodeId,
    pass_id: NodeId,
    output: bool,
) -> bool {
    for (edge, edge_pass) in texture_edges_on_resource(graph, texture_id) {
        if edge_pass > pass_id {
            return false;
        }
        if !output && edge_pass == pass_id && edge.is_output() {
            return false;
        }
    }
    true
}

fn is_last_used_buffer(
    graph: &DependencyGraph<RdgNode, RdgEdge>,
    buffer_id: NodeId,
    pass_id: NodeId,
    output: bool,
) -> bool {
    for (edge, edge_pass) in buffer_edges_on_resource(graph, buffer_id) {
        if edge_pass > pass_id {
            return false;
        }
        if !output && edge_pass == pass_id && edge.is_output() {
            return false;
        }
    }
    true
}

// --- Node builders ---

pub struct RdgTextureBuilder<'a> {
    builder: &'a mut RdgBuilder,
    node: NodeId,
}

impl<'a> RdgTextureBuilder<'a> {
    fn node_mut(&mut self) -> Option<&mut TextureNode> {
        self.builder.graph.node_mut(self.node).and_then(RdgNode::as_texture_mut)
    }

    /// Registers an externally owned texture. Imported resources are never
    /// pooled or destroyed by the graph.
    pub fn import(mut self, texture: TextureRef, initial_state: ResourceState) -> Self {
        let info = *texture.info();
        if let Some(node) = self.node_mut() {
            node.imported = true;
            node.info = info;
            node.initial_state = initial_state;
            node.texture = Some(texture);
        }
        self
    }

    pub fn extent(mut self, extent: Extent3D) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.extent = extent;
        }
        self
    }

    pub fn format(mut self, format: ember_rhi::Format) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.format = format;
        }
        self
    }

    pub fn memory_usage(mut self, memory_usage: MemoryUsage) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.memory_usage = memory_usage;
        }
        self
    }

    pub fn allow_read_write(mut self) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.resource_type |= ResourceTypeFlags::RW_TEXTURE;
        }
        self
    }

    pub fn allow_render_target(mut self) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.resource_type |= ResourceTypeFlags::RENDER_TARGET;
        }
        self
    }

    pub fn allow_depth_stencil(mut self) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.resource_type |= ResourceTypeFlags::DEPTH_STENCIL;
        }
        self
    }

    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.mip_levels = mip_levels;
        }
        self
    }

    pub fn array_layers(mut self, array_layers: u32) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.array_layers = array_layers;
        }
        self
    }

    pub fn finish(self) -> TextureHandle {
        TextureHandle::new(self.node)
    }
}

pub struct RdgBufferBuilder<'a> {
    builder: &'a mut RdgBuilder,
    node: NodeId,
}

impl<'a> RdgBufferBuilder<'a> {
    fn node_mut(&mut self) -> Option<&mut BufferNode> {
        self.builder.graph.node_mut(self.node).and_then(RdgNode::as_buffer_mut)
    }

    pub fn import(mut self, buffer: BufferRef, initial_state: ResourceState) -> Self {
        let info = *buffer.info();
        if let Some(node) = self.node_mut() {
            node.imported = true;
            node.info = info;
            node.initial_state = initial_state;
            node.buffer = Some(buffer);
        }
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.size = size;
        }
        self
    }

    pub fn memory_usage(mut self, memory_usage: MemoryUsage) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.memory_usage = memory_usage;
        }
        self
    }

    pub fn allow_vertex_buffer(mut self) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.resource_type |= ResourceTypeFlags::VERTEX_BUFFER;
        }
        self
    }

    pub fn allow_index_buffer(mut self) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.resource_type |= ResourceTypeFlags::INDEX_BUFFER;
        }
        self
    }

    pub fn allow_read_write(mut self) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.resource_type |= ResourceTypeFlags::RW_BUFFER;
        }
        self
    }

    pub fn allow_read(mut self) -> Self {
        if let Some(node) = self.node_mut() {
            node.info.resource_type |= ResourceTypeFlags::UNIFORM_BUFFER;
        }
        self
    }

    pub fn finish(self) -> BufferHandle {
        BufferHandle::new(self.node)
    }
}

/// The binding surface shared by render, compute, and ray-tracing pass
/// builders. Each call creates one typed edge and links it in the direction
/// its role dictates.
macro_rules! impl_pass_binding {
    ($builder:ident, $handle:ident) => {
        impl<'a> $builder<'a> {
            fn pass_mut(&mut self) -> Option<&mut PassNode> {
                self.builder.graph.node_mut(self.pass).and_then(RdgNode::as_pass_mut)
            }

            /// A caller-defined 3-component index, available to the executor
            /// for pipeline keying.
            pub fn pass_index(mut self, x: u32, y: u32, z: u32) -> Self {
                if let Some(pass) = self.pass_mut() {
                    pass.pass_index = [x, y, z];
                }
                self
            }

            pub fn root_signature(mut self, root_signature: RootSignatureRef) -> Self {
                if let Some(pass) = self.pass_mut() {
                    pass.root_signature = Some(root_signature);
                }
                self
            }

            /// Pre-binds an externally managed descriptor set; the slot is
            /// then skipped by automatic allocation.
            pub fn descriptor_set(mut self, set: u32, descriptor: DescriptorSetRef) -> Self {
                if (set as usize) < MAX_DESCRIPTOR_SETS {
                    if let Some(pass) = self.pass_mut() {
                        pass.descriptor_sets[set as usize] = Some(descriptor);
                    }
                }
                self
            }

            pub fn read_buffer(
                self,
                set: u32,
                binding: u32,
                index: u32,
                buffer: BufferHandle,
                offset: u64,
                size: u64,
            ) -> Self {
                let edge = BufferEdge {
                    state: ResourceState::ShaderResource,
                    roles: BufferRole::AS_SHADER_READ,
                    set,
                    binding,
                    index,
                    resource_type: ResourceTypeFlags::UNIFORM_BUFFER,
                    offset,
                    size,
                };
                let pass = self.pass;
                self.builder.link_edge(buffer.id(), pass, RdgEdge::Buffer(edge));
                self
            }

            pub fn read_texture(
                self,
                set: u32,
                binding: u32,
                index: u32,
                texture: TextureHandle,
                view_type: TextureViewType,
                subresource: TextureSubresourceRange,
            ) -> Self {
                let edge = TextureEdge {
                    state: ResourceState::ShaderResource,
                    roles: TextureRole::AS_SHADER_READ,
                    set,
                    binding,
                    index,
                    resource_type: ResourceTypeFlags::TEXTURE,
                    view_type,
                    subresource,
                    ..Default::default()
                };
                let pass = self.pass;
                self.builder.link_edge(texture.id(), pass, RdgEdge::Texture(edge));
                self
            }

            pub fn read_write_buffer(
                self,
                set: u32,
                binding: u32,
                index: u32,
                buffer: BufferHandle,
                offset: u64,
                size: u64,
            ) -> Self {
                let edge = BufferEdge {
                    state: ResourceState::UnorderedAccess,
                    roles: BufferRole::AS_SHADER_READ_WRITE,
                    set,
                    binding,
                    index,
                    resource_type: ResourceTypeFlags::RW_BUFFER,
                    offset,
                    size,
                };
                let pass = self.pass;
                self.builder.link_edge(pass, buffer.id(), RdgEdge::Buffer(edge));
                self
            }

            pub fn read_write_texture(
                self,
                set: u32,
                binding: u32,
                index: u32,
                texture: TextureHandle,
                view_type: TextureViewType,
                subresource: TextureSubresourceRange,
            ) -> Self {
                let edge = TextureEdge {
                    state: ResourceState::UnorderedAccess,
                    roles: TextureRole::AS_SHADER_READ_WRITE,
                    set,
                    binding,
                    index,
                    resource_type: ResourceTypeFlags::RW_TEXTURE,
                    view_type,
                    subresource,
                    ..Default::default()
                };
                let pass = self.pass;
                self.builder.link_edge(pass, texture.id(), RdgEdge::Texture(edge));
                self
            }

            /// Declares the buffer as produced by this pass, to be read
            /// downstream.
            pub fn output_read_buffer(self, buffer: BufferHandle, offset: u64, size: u64) -> Self {
                let edge = BufferEdge {
                    state: ResourceState::ShaderResource,
                    roles: BufferRole::AS_OUTPUT_READ,
                    resource_type: ResourceTypeFlags::BUFFER,
                    offset,
                    size,
                    ..Default::default()
                };
                let pass = self.pass;
                self.builder.link_edge(pass, buffer.id(), RdgEdge::Buffer(edge));
                self
            }

            pub fn output_read_texture(
                self,
                texture: TextureHandle,
                subresource: TextureSubresourceRange,
            ) -> Self {
                let edge = TextureEdge {
                    state: ResourceState::ShaderResource,
                    roles: TextureRole::AS_OUTPUT_READ,
                    resource_type: ResourceTypeFlags::TEXTURE,
                    subresource,
                    ..Default::default()
                };
                let pass = self.pass;
                self.builder.link_edge(pass, texture.id(), RdgEdge::Texture(edge));
                self
            }

            pub fn output_read_write_buffer(
                self,
                buffer: BufferHandle,
                offset: u64,
                size: u64,
            ) -> Self {
                let edge = BufferEdge {
                    state: ResourceState::UnorderedAccess,
                    roles: BufferRole::AS_OUTPUT_READ_WRITE,
                    resource_type: ResourceTypeFlags::RW_BUFFER,
                    offset,
                    size,
                    ..Default::default()
                };
                let pass = self.pass;
                self.builder.link_edge(pass, buffer.id(), RdgEdge::Buffer(edge));
                self
            }

            pub fn output_read_write_texture(
                self,
                texture: TextureHandle,
                subresource: TextureSubresourceRange,
            ) -> Self {
                let edge = TextureEdge {
                    state: ResourceState::UnorderedAccess,
                    roles: TextureRole::AS_OUTPUT_READ_WRITE,
                    resource_type: ResourceTypeFlags::RW_TEXTURE,
                    subresource,
                    ..Default::default()
                };
                let pass = self.pass;
                self.builder.link_edge(pass, texture.id(), RdgEdge::Texture(edge));
                self
            }

            /// The recording callback, invoked between the input and output
            /// barriers of this pass.
            pub fn execute(
                mut self,
                executor: impl FnMut(&mut PassContext<'_>) + 'static,
            ) -> Self {
                if let Some(pass) = self.pass_mut() {
                    pass.executor = Some(Box::new(executor));
                }
                self
            }

            pub fn finish(self) -> $handle {
                $handle::new(self.pass)
            }
        }
    };
}

pub struct RdgRenderPassBuilder<'a> {
    builder: &'a mut RdgBuilder,
    pass: NodeId,
}

impl_pass_binding!(RdgRenderPassBuilder, RenderPassHandle);

impl<'a> RdgRenderPassBuilder<'a> {
    /// Binds a color attachment slot. The attachment's view is 2D, or a 2D
    /// array when the subresource spans multiple layers.
    pub fn color(
        self,
        binding: u32,
        texture: TextureHandle,
        load: AttachmentLoadOp,
        store: AttachmentStoreOp,
        clear_color: Color4,
        subresource: TextureSubresourceRange,
    ) -> Self {
        let edge = TextureEdge {
            state: ResourceState::ColorAttachment,
            roles: TextureRole::AS_COLOR,
            binding,
            view_type: if subresource.layer_count > 1 {
                TextureViewType::D2Array
            } else {
                TextureViewType::D2
            },
            subresource,
            load_op: load,
            store_op: store,
            clear_color,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(pass, texture.id(), RdgEdge::Texture(edge));
        self
    }

    pub fn depth_stencil(
        self,
        texture: TextureHandle,
        load: AttachmentLoadOp,
        store: AttachmentStoreOp,
        clear_depth: f32,
        clear_stencil: u32,
        subresource: TextureSubresourceRange,
        read_only_depth: bool,
    ) -> Self {
        let mut roles = TextureRole::AS_DEPTH_STENCIL;
        if read_only_depth {
            roles |= TextureRole::READ_ONLY_DEPTH;
        }
        let edge = TextureEdge {
            state: if read_only_depth {
                ResourceState::ShaderResource
            } else {
                ResourceState::DepthStencilAttachment
            },
            roles,
            view_type: if subresource.layer_count > 1 {
                TextureViewType::D2Array
            } else {
                TextureViewType::D2
            },
            subresource,
            load_op: load,
            store_op: store,
            clear_depth,
            clear_stencil,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(pass, texture.id(), RdgEdge::Texture(edge));
        self
    }
}

pub struct RdgComputePassBuilder<'a> {
    builder: &'a mut RdgBuilder,
    pass: NodeId,
}

impl_pass_binding!(RdgComputePassBuilder, ComputePassHandle);

impl<'a> RdgComputePassBuilder<'a> {
    /// Declares the buffer as indirect-draw arguments produced by this pass.
    pub fn output_indirect_draw(self, buffer: BufferHandle, offset: u64, size: u64) -> Self {
        let edge = BufferEdge {
            state: ResourceState::IndirectArgument,
            roles: BufferRole::AS_OUTPUT_INDIRECT_DRAW,
            resource_type: ResourceTypeFlags::INDIRECT_BUFFER,
            offset,
            size,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(pass, buffer.id(), RdgEdge::Buffer(edge));
        self
    }
}

pub struct RdgRayTracingPassBuilder<'a> {
    builder: &'a mut RdgBuilder,
    pass: NodeId,
}

impl_pass_binding!(RdgRayTracingPassBuilder, RayTracingPassHandle);

pub struct RdgPresentPassBuilder<'a> {
    builder: &'a mut RdgBuilder,
    pass: NodeId,
}

impl<'a> RdgPresentPassBuilder<'a> {
    /// The texture to be shown; blitted onto the backbuffer at execution.
    pub fn texture(self, texture: TextureHandle, subresource: TextureSubresourceLayers) -> Self {
        let edge = TextureEdge {
            state: ResourceState::TransferSrc,
            subresource_layers: subresource,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(texture.id(), pass, RdgEdge::Texture(edge));
        self
    }

    /// The swapchain backbuffer receiving the blit.
    pub fn present_texture(self, texture: TextureHandle) -> Self {
        let edge = TextureEdge {
            state: ResourceState::Present,
            roles: TextureRole::AS_PRESENT,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(texture.id(), pass, RdgEdge::Texture(edge));
        self
    }

    pub fn finish(self) -> PresentPassHandle {
        PresentPassHandle::new(self.pass)
    }
}

pub struct RdgCopyPassBuilder<'a> {
    builder: &'a mut RdgBuilder,
    pass: NodeId,
}

impl<'a> RdgCopyPassBuilder<'a> {
    pub fn from(self, texture: TextureHandle, subresource: TextureSubresourceLayers) -> Self {
        let edge = TextureEdge {
            state: ResourceState::TransferSrc,
            roles: TextureRole::AS_TRANSFER_SRC,
            subresource_layers: subresource,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(texture.id(), pass, RdgEdge::Texture(edge));
        self
    }

    pub fn to(self, texture: TextureHandle, subresource: TextureSubresourceLayers) -> Self {
        let edge = TextureEdge {
            state: ResourceState::TransferDst,
            roles: TextureRole::AS_TRANSFER_DST,
            subresource_layers: subresource,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(pass, texture.id(), RdgEdge::Texture(edge));
        self
    }

    /// Rebuilds the destination's mip chain after the copy. On a single-mip
    /// destination the surrounding transfer barriers are still emitted and
    /// the generation itself degenerates to nothing.
    pub fn generate_mips(mut self) -> Self {
        if let Some(pass) = self.builder.graph.node_mut(self.pass).and_then(RdgNode::as_pass_mut)
        {
            pass.generate_mips = true;
        }
        self
    }

    pub fn output_read(self, texture: TextureHandle, subresource: TextureSubresourceLayers) -> Self {
        let edge = TextureEdge {
            state: ResourceState::ShaderResource,
            roles: TextureRole::AS_OUTPUT_READ,
            resource_type: ResourceTypeFlags::TEXTURE,
            subresource_layers: subresource,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(pass, texture.id(), RdgEdge::Texture(edge));
        self
    }

    pub fn output_read_write(
        self,
        texture: TextureHandle,
        subresource: TextureSubresourceLayers,
    ) -> Self {
        let edge = TextureEdge {
            state: ResourceState::UnorderedAccess,
            roles: TextureRole::AS_OUTPUT_READ_WRITE,
            resource_type: ResourceTypeFlags::RW_TEXTURE,
            subresource_layers: subresource,
            ..Default::default()
        };
        let pass = self.pass;
        self.builder.link_edge(pass, texture.id(), RdgEdge::Texture(edge));
        self
    }

    pub fn finish(self) -> CopyPassHandle {
        CopyPassHandle::new(self.pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::Arc;

    use ember_rhi::soft::{CommandRecord, SoftDescriptorSet, SoftDevice};
    use ember_rhi::{
        BackendInfo, BufferInfo, CommandList, Device as _, Extent2D, Format, Resource as _,
        ResourceId, RootSignatureInfo, ShaderFrequency, ShaderResourceEntry, Swapchain as _,
        SwapchainInfo,
    };

    fn test_builder() -> (Arc<SoftDevice>, RdgBuilder) {
        let soft = SoftDevice::create(BackendInfo { enable_debug: false, ..Default::default() });
        let device: DeviceRef = soft.clone();
        let command = CommandList::from_context(device.create_command_context().unwrap(), true);
        (soft, RdgBuilder::new(device, command))
    }

    /// Checks that `expected` appears in `journal` in order, allowing other
    /// records in between.
    fn assert_subsequence(journal: &[CommandRecord], expected: &[CommandRecord]) {
        let mut pos = 0;
        for want in expected {
            match journal[pos..].iter().position(|record| record == want) {
                Some(offset) => pos += offset + 1,
                None => panic!("missing {want:?} after position {pos} in journal:\n{journal:#?}"),
            }
        }
    }

    #[test]
    fn execute_on_empty_graph_is_a_no_op() {
        let (soft, mut builder) = test_builder();
        builder.execute();
        assert!(soft.take_journal().is_empty());
    }

    #[test]
    fn triangle_pass_emits_barrier_clear_draw_sequence() {
        let (soft, mut builder) = test_builder();
        let device = builder.device().clone();
        let backbuffer = device
            .create_texture(ember_rhi::TextureInfo {
                format: Format::Bgra8Unorm,
                extent: Extent3D::new(800, 600, 1),
                resource_type: ResourceTypeFlags::TEXTURE | ResourceTypeFlags::RENDER_TARGET,
                ..Default::default()
            })
            .unwrap();

        let color = builder
            .create_texture("ColorTex")
            .import(backbuffer.clone(), ResourceState::Present)
            .finish();
        builder
            .create_render_pass("ForwardPass")
            .color(
                0,
                color,
                AttachmentLoadOp::Clear,
                AttachmentStoreOp::Store,
                Color4::new(0.1, 0.2, 0.4, 1.0),
                TextureSubresourceRange::default(),
            )
            .execute(|ctx| ctx.command.draw(3, 1, 0, 0))
            .finish();
        builder.execute();

        let journal = soft.take_journal();
        assert_subsequence(
            &journal,
            &[
                CommandRecord::PushEvent { name: "ForwardPass".to_owned() },
                CommandRecord::TextureBarrier {
                    texture: backbuffer.id(),
                    src: ResourceState::Present,
                    dst: ResourceState::ColorAttachment,
                },
                CommandRecord::BeginRenderPass {
                    extent: Extent2D::new(800, 600),
                    layers: 1,
                    colors: vec![(
                        AttachmentLoadOp::Clear,
                        AttachmentStoreOp::Store,
                        Color4::new(0.1, 0.2, 0.4, 1.0),
                    )],
                    depth: None,
                },
                CommandRecord::Draw {
                    vertex_count: 3,
                    instance_count: 1,
                    first_vertex: 0,
                    first_instance: 0,
                },
                CommandRecord::EndRenderPass,
                CommandRecord::PopEvent,
            ],
        );
    }

    #[test]
    fn compute_to_render_inserts_uav_to_srv_barrier() {
        let (soft, mut builder) = test_builder();
        let output = builder
            .create_texture("OutputTex")
            .format(Format::Rgba16Sfloat)
            .extent(Extent3D::new(64, 64, 1))
            .allow_read_write()
            .finish();
        let target = builder
            .create_texture("LitTarget")
            .format(Format::Rgba8Unorm)
            .extent(Extent3D::new(64, 64, 1))
            .allow_render_target()
            .finish();

        let output_id = Rc::new(Cell::new(0 as ResourceId));
        let capture = output_id.clone();
        builder
            .create_compute_pass("Simulate")
            .read_write_texture(0, 0, 0, output, TextureViewType::D2, TextureSubresourceRange::default())
            .execute(move |ctx| {
                if let Some(texture) = ctx.resources.texture(output) {
                    capture.set(texture.id());
                }
                ctx.command.dispatch(8, 8, 1);
            })
            .finish();
        builder
            .create_render_pass("Composite")
            .read_texture(0, 0, 0, output, TextureViewType::D2, TextureSubresourceRange::default())
            .color(
                0,
                target,
                AttachmentLoadOp::Clear,
                AttachmentStoreOp::Store,
                Color4::default(),
                TextureSubresourceRange::default(),
            )
            .execute(|ctx| ctx.command.draw(3, 1, 0, 0))
            .finish();
        builder.execute();

        let journal = soft.take_journal();
        let output_id = output_id.get();
        assert_ne!(output_id, 0);
        assert_subsequence(
            &journal,
            &[
                CommandRecord::TextureBarrier {
                    texture: output_id,
                    src: ResourceState::Undefined,
                    dst: ResourceState::UnorderedAccess,
                },
                CommandRecord::Dispatch { x: 8, y: 8, z: 1 },
                CommandRecord::TextureBarrier {
                    texture: output_id,
                    src: ResourceState::UnorderedAccess,
                    dst: ResourceState::ShaderResource,
                },
                CommandRecord::Draw {
                    vertex_count: 3,
                    instance_count: 1,
                    first_vertex: 0,
                    first_instance: 0,
                },
            ],
        );
    }

    #[test]
    fn missing_blackboard_name_returns_sentinel_and_binding_is_skipped() {
        let (soft, mut builder) = test_builder();
        let missing = builder.get_buffer("not_there");
        assert_eq!(missing, BufferHandle::INVALID);

        let target = builder
            .create_texture("SentinelTarget")
            .format(Format::Rgba8Unorm)
            .extent(Extent3D::new(31, 17, 1))
            .allow_render_target()
            .finish();
        builder
            .create_render_pass("DrawAnyway")
            .read_buffer(0, 0, 0, missing, 0, 0)
            .color(
                0,
                target,
                AttachmentLoadOp::Clear,
                AttachmentStoreOp::Store,
                Color4::default(),
                TextureSubresourceRange::default(),
            )
            .execute(|ctx| ctx.command.draw(3, 1, 0, 0))
            .finish();
        builder.execute();

        let journal = soft.take_journal();
        assert!(journal.iter().all(|r| !matches!(r, CommandRecord::BufferBarrier { .. })));
        assert_subsequence(
            &journal,
            &[CommandRecord::Draw {
                vertex_count: 3,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            }],
        );
    }

    #[test]
    fn imported_resources_never_enter_the_pool() {
        let (_soft, mut builder) = test_builder();
        let device = builder.device().clone();
        let uniform = device
            .create_buffer(BufferInfo {
                size: 256,
                resource_type: ResourceTypeFlags::UNIFORM_BUFFER,
                ..Default::default()
            })
            .unwrap();

        let camera = builder
            .create_buffer("Camera")
            .import(uniform.clone(), ResourceState::ShaderResource)
            .finish();
        builder
            .create_render_pass("DrawScene")
            .read_buffer(0, 0, 0, camera, 0, 0)
            .execute(|_| {})
            .finish();
        builder.execute();

        // Only the importer and the device's tracking table hold the buffer;
        // a pooled release would have added a third reference.
        assert_eq!(Arc::strong_count(&uniform), 2);
    }

    #[test]
    fn transient_texture_returns_to_pool_and_carries_state() {
        let (soft, mut builder) = test_builder();
        let mut frame = |builder: &mut RdgBuilder| {
            let scratch = builder
                .create_texture("Scratch")
                .format(Format::Rgba8Unorm)
                .extent(Extent3D::new(333, 97, 1))
                .allow_render_target()
                .finish();
            builder
                .create_render_pass("Scribble")
                .color(
                    0,
                    scratch,
                    AttachmentLoadOp::Clear,
                    AttachmentStoreOp::Store,
                    Color4::default(),
                    TextureSubresourceRange::default(),
                )
                .execute(|_| {})
                .finish();
            builder.execute();
        };

        let barrier_of = |journal: &[CommandRecord]| {
            journal
                .iter()
                .find_map(|record| match record {
                    CommandRecord::TextureBarrier { texture, src, dst } => {
                        Some((*texture, *src, *dst))
                    }
                    _ => None,
                })
                .unwrap()
        };

        frame(&mut builder);
        let first = barrier_of(&soft.take_journal());
        frame(&mut builder);
        let second = barrier_of(&soft.take_journal());

        assert_eq!(first.1, ResourceState::Undefined);
        assert_eq!(first.2, ResourceState::ColorAttachment);
        // The same RHI texture comes back out of the pool, starting in the
        // state it was released with.
        assert_eq!(second.0, first.0);
        assert_eq!(second.1, ResourceState::ColorAttachment);
    }

    #[test]
    fn descriptor_sets_round_trip_through_the_frame_pool() {
        let (_soft, mut builder) = test_builder();
        let device = builder.device().clone();
        let root_signature = device
            .create_root_signature(RootSignatureInfo::new().add_entry(ShaderResourceEntry {
                set: 0,
                binding: 7,
                resource_type: ResourceTypeFlags::TEXTURE,
                frequency: ShaderFrequency::FRAGMENT,
                ..Default::default()
            }))
            .unwrap();

        let seen: Rc<RefCell<Vec<(ResourceId, bool)>>> = Rc::new(RefCell::new(Vec::new()));
        let mut frame = |builder: &mut RdgBuilder| {
            let lookup = builder
                .create_texture("Lookup")
                .format(Format::Rgba8Unorm)
                .extent(Extent3D::new(32, 32, 1))
                .finish();
            let seen = seen.clone();
            builder
                .create_render_pass("Sample")
                .root_signature(root_signature.clone())
                .read_texture(0, 7, 0, lookup, TextureViewType::D2, TextureSubresourceRange::default())
                .execute(move |ctx| {
                    if let Some(descriptor) = &ctx.descriptors[0] {
                        let written = descriptor
                            .as_any()
                            .downcast_ref::<SoftDescriptorSet>()
                            .is_some_and(|set| set.bound(7, 0).is_some());
                        seen.borrow_mut().push((descriptor.id(), written));
                    }
                })
                .finish();
            builder.execute();
        };

        frame(&mut builder);
        frame(&mut builder);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        // The set released at the end of frame one is the one handed out in
        // frame two, and the view write actually landed.
        assert_eq!(seen[0].0, seen[1].0);
        assert!(seen[0].1 && seen[1].1);
    }

    #[test]
    fn copy_pass_with_mip_generation_brackets_the_blit() {
        let (soft, mut builder) = test_builder();
        let source = builder
            .create_texture("EnvSource")
            .format(Format::Rgba16Sfloat)
            .extent(Extent3D::new(128, 64, 1))
            .finish();
        let cube = builder
            .create_texture("EnvFiltered")
            .format(Format::Rgba16Sfloat)
            .extent(Extent3D::new(128, 64, 1))
            .mip_levels(0)
            .finish();
        builder
            .create_copy_pass("EnvCopy")
            .from(source, TextureSubresourceLayers::default())
            .to(cube, TextureSubresourceLayers::default())
            .generate_mips()
            .finish();
        builder.execute();

        let journal = soft.take_journal();
        let (src_id, dst_id) = journal
            .iter()
            .find_map(|record| match record {
                CommandRecord::CopyTexture { src, dst } => Some((*src, *dst)),
                _ => None,
            })
            .unwrap();
        assert_subsequence(
            &journal,
            &[
                CommandRecord::PushEvent { name: "EnvCopy".to_owned() },
                CommandRecord::TextureBarrier {
                    texture: src_id,
                    src: ResourceState::Undefined,
                    dst: ResourceState::TransferSrc,
                },
                CommandRecord::TextureBarrier {
                    texture: dst_id,
                    src: ResourceState::Undefined,
                    dst: ResourceState::TransferDst,
                },
                CommandRecord::CopyTexture { src: src_id, dst: dst_id },
                CommandRecord::TextureBarrier {
                    texture: dst_id,
                    src: ResourceState::TransferDst,
                    dst: ResourceState::TransferSrc,
                },
                CommandRecord::GenerateMips { texture: dst_id },
                CommandRecord::TextureBarrier {
                    texture: dst_id,
                    src: ResourceState::TransferSrc,
                    dst: ResourceState::TransferDst,
                },
                CommandRecord::PopEvent,
            ],
        );
    }

    #[test]
    fn copy_pass_mip_bracket_survives_single_mip_destination() {
        let (soft, mut builder) = test_builder();
        let source = builder
            .create_texture("FlatSource")
            .format(Format::Rg8Unorm)
            .extent(Extent3D::new(48, 48, 1))
            .finish();
        let destination = builder
            .create_texture("FlatDest")
            .format(Format::Rg8Unorm)
            .extent(Extent3D::new(48, 48, 1))
            .finish();
        builder
            .create_copy_pass("FlatCopy")
            .from(source, TextureSubresourceLayers::default())
            .to(destination, TextureSubresourceLayers::default())
            .generate_mips()
            .finish();
        builder.execute();

        let journal = soft.take_journal();
        let (_, dst_id) = journal
            .iter()
            .find_map(|record| match record {
                CommandRecord::CopyTexture { src, dst } => Some((*src, *dst)),
                _ => None,
            })
            .unwrap();
        // Single-mip destination: the generation is a no-op, the transfer
        // barrier pair is still emitted.
        assert_subsequence(
            &journal,
            &[
                CommandRecord::TextureBarrier {
                    texture: dst_id,
                    src: ResourceState::TransferDst,
                    dst: ResourceState::TransferSrc,
                },
                CommandRecord::GenerateMips { texture: dst_id },
                CommandRecord::TextureBarrier {
                    texture: dst_id,
                    src: ResourceState::TransferSrc,
                    dst: ResourceState::TransferDst,
                },
            ],
        );
    }

    #[test]
    fn present_pass_blits_source_to_backbuffer() {
        let (soft, mut builder) = test_builder();
        let device = builder.device().clone();
        let swapchain = device
            .create_swapchain(SwapchainInfo {
                image_count: 3,
                extent: Extent2D::new(256, 256),
                ..Default::default()
            })
            .unwrap();
        let backbuffer_texture = swapchain.get_new_frame(None, None).unwrap();

        let lit = builder
            .create_texture("LitScene")
            .format(Format::Bgra8Unorm)
            .extent(Extent3D::new(256, 144, 1))
            .allow_render_target()
            .finish();
        let backbuffer = builder
            .create_texture("Backbuffer")
            .import(backbuffer_texture.clone(), ResourceState::Present)
            .finish();
        builder
            .create_render_pass("Forward")
            .color(
                0,
                lit,
                AttachmentLoadOp::Clear,
                AttachmentStoreOp::Store,
                Color4::default(),
                TextureSubresourceRange::default(),
            )
            .execute(|ctx| ctx.command.draw(3, 1, 0, 0))
            .finish();
        builder
            .create_present_pass("PresentPass")
            .texture(lit, TextureSubresourceLayers::default())
            .present_texture(backbuffer)
            .finish();
        builder.execute();
        swapchain.present(None);

        let journal = soft.take_journal();
        let backbuffer_id = backbuffer_texture.id();
        let lit_id = journal
            .iter()
            .find_map(|record| match record {
                CommandRecord::CopyTexture { src, .. } => Some(*src),
                _ => None,
            })
            .unwrap();
        assert_subsequence(
            &journal,
            &[
                CommandRecord::PushEvent { name: "PresentPass".to_owned() },
                CommandRecord::TextureBarrier {
                    texture: lit_id,
                    src: ResourceState::ColorAttachment,
                    dst: ResourceState::TransferSrc,
                },
                CommandRecord::TextureBarrier {
                    texture: backbuffer_id,
                    src: ResourceState::Present,
                    dst: ResourceState::TransferDst,
                },
                CommandRecord::CopyTexture { src: lit_id, dst: backbuffer_id },
                CommandRecord::TextureBarrier {
                    texture: backbuffer_id,
                    src: ResourceState::TransferDst,
                    dst: ResourceState::Present,
                },
                CommandRecord::PopEvent,
                CommandRecord::Present { image_index: 0 },
            ],
        );
    }

    #[test]
    fn output_declaration_transitions_after_the_pass() {
        let (soft, mut builder) = test_builder();
        let shadow = builder
            .create_texture("ShadowMask")
            .format(Format::Rgba8Unorm)
            .extent(Extent3D::new(77, 55, 1))
            .allow_render_target()
            .finish();
        let target = builder
            .create_texture("FinalTarget")
            .format(Format::Rgba8Unorm)
            .extent(Extent3D::new(77, 55, 1))
            .allow_render_target()
            .finish();

        let shadow_id = Rc::new(Cell::new(0 as ResourceId));
        let capture = shadow_id.clone();
        builder
            .create_render_pass("MaskPass")
            .color(
                0,
                shadow,
                AttachmentLoadOp::Clear,
                AttachmentStoreOp::Store,
                Color4::default(),
                TextureSubresourceRange::default(),
            )
            .output_read_texture(shadow, TextureSubresourceRange::default())
            .execute(move |ctx| {
                if let Some(texture) = ctx.resources.texture(shadow) {
                    capture.set(texture.id());
                }
            })
            .finish();
        builder
            .create_render_pass("ApplyPass")
            .read_texture(0, 0, 0, shadow, TextureViewType::D2, TextureSubresourceRange::default())
            .color(
                0,
                target,
                AttachmentLoadOp::Clear,
                AttachmentStoreOp::Store,
                Color4::default(),
                TextureSubresourceRange::default(),
            )
            .execute(|ctx| ctx.command.draw(3, 1, 0, 0))
            .finish();
        builder.execute();

        let journal = soft.take_journal();
        let shadow_id = shadow_id.get();
        // The output declaration transitions the mask to its consumable state
        // right after the producing pass; the consumer's own input barrier is
        // then idempotent.
        assert_subsequence(
            &journal,
            &[
                CommandRecord::EndRenderPass,
                CommandRecord::TextureBarrier {
                    texture: shadow_id,
                    src: ResourceState::ColorAttachment,
                    dst: ResourceState::ShaderResource,
                },
                CommandRecord::TextureBarrier {
                    texture: shadow_id,
                    src: ResourceState::ShaderResource,
                    dst: ResourceState::ShaderResource,
                },
                CommandRecord::Draw {
                    vertex_count: 3,
                    instance_count: 1,
                    first_vertex: 0,
                    first_instance: 0,
                },
            ],
        );
    }

    #[test]
    fn pass_lookup_checks_kind() {
        let (_soft, mut builder) = test_builder();
        builder.create_compute_pass("Cull").execute(|_| {}).finish();
        assert!(builder.get_compute_pass("Cull").is_valid());
        assert!(!builder.get_render_pass("Cull").is_valid());
        assert!(!builder.get_render_pass("nope").is_valid());
        builder.execute();
        // The blackboard resets with the graph.
        assert!(!builder.get_compute_pass("Cull").is_valid());
    }

    #[test]
    fn graphviz_export_colors_nodes_by_kind() {
        let (_soft, mut builder) = test_builder();
        let color = builder
            .create_texture("ColorTex")
            .format(Format::Rgba8Unorm)
            .extent(Extent3D::new(8, 8, 1))
            .allow_render_target()
            .finish();
        builder
            .create_render_pass("ForwardPass")
            .color(
                0,
                color,
                AttachmentLoadOp::Clear,
                AttachmentStoreOp::Store,
                Color4::default(),
                TextureSubresourceRange::default(),
            )
            .execute(|_| {})
            .finish();

        let path = std::env::temp_dir().join("ember_rdg_export_test.dot");
        builder.export_graphviz(&path);
        let dot = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(dot.contains("\"ForwardPass\" [shape=rectangle, style=filled, fillcolor=orange"));
        assert!(dot.contains("\"ColorTex\" [shape=box, style=filled, fillcolor=lightgreen"));
        assert!(dot.contains("\"ForwardPass\" -> \"ColorTex\" [label=\"Color\", color=red];"));
    }
}

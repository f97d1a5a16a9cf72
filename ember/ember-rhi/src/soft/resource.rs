//! Resource objects of the software device. All state lives behind mutexes
//! so handles stay shareable; the command context reaches the concrete types
//! through `as_any`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Weak};

use crate::info::*;
use crate::resource::*;
use crate::types::*;

use super::SoftDevice;

macro_rules! impl_resource {
    ($ty:ident, $kind:ident) => {
        impl Resource for $ty {
            fn kind(&self) -> ResourceKind {
                ResourceKind::$kind
            }

            fn id(&self) -> ResourceId {
                self.id
            }

            fn name(&self) -> String {
                self.name.lock().unwrap_or_else(|e| e.into_inner()).clone()
            }

            fn set_name(&self, name: &str) {
                *self.name.lock().unwrap_or_else(|e| e.into_inner()) = name.to_owned();
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

#[derive(Debug)]
pub struct SoftBuffer {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: BufferInfo,
    pub(super) state: Mutex<ResourceState>,
    pub(super) data: Mutex<Vec<u8>>,
}

impl SoftBuffer {
    pub(super) fn new(id: ResourceId, info: BufferInfo) -> Self {
        Self {
            id,
            name: Mutex::new(String::new()),
            info,
            state: Mutex::new(ResourceState::Undefined),
            data: Mutex::new(vec![0; info.size as usize]),
        }
    }

    pub fn current_state(&self) -> ResourceState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, state: ResourceState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn read_data(&self) -> Vec<u8> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(super) fn write_data(&self, offset: u64, bytes: &[u8]) -> Result<(), String> {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let end = offset as usize + bytes.len();
        if end > data.len() {
            return Err(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                bytes.len(),
                offset,
                data.len()
            ));
        }
        data[offset as usize..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl_resource!(SoftBuffer, Buffer);

impl Buffer for SoftBuffer {
    fn info(&self) -> &BufferInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct SoftTexture {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: TextureInfo,
    pub(super) state: Mutex<ResourceState>,
    default_range: TextureSubresourceRange,
    default_layers: TextureSubresourceLayers,
}

impl SoftTexture {
    pub(super) fn new(id: ResourceId, info: TextureInfo) -> Self {
        let aspect = info.format.aspect();
        Self {
            id,
            name: Mutex::new(String::new()),
            info,
            state: Mutex::new(ResourceState::Undefined),
            default_range: TextureSubresourceRange {
                aspect,
                base_mip_level: 0,
                level_count: info.mip_levels,
                base_array_layer: 0,
                layer_count: info.array_layers,
            },
            default_layers: TextureSubresourceLayers {
                aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: info.array_layers,
            },
        }
    }

    pub fn current_state(&self) -> ResourceState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, state: ResourceState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

impl_resource!(SoftTexture, Texture);

impl Texture for SoftTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn default_subresource_range(&self) -> TextureSubresourceRange {
        self.default_range
    }

    fn default_subresource_layers(&self) -> TextureSubresourceLayers {
        self.default_layers
    }
}

#[derive(Debug)]
pub struct SoftTextureView {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: TextureViewInfo,
}

impl SoftTextureView {
    pub(super) fn new(id: ResourceId, info: TextureViewInfo) -> Self {
        Self { id, name: Mutex::new(String::new()), info }
    }
}

impl_resource!(SoftTextureView, TextureView);

impl TextureView for SoftTextureView {
    fn info(&self) -> &TextureViewInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct SoftSampler {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: SamplerInfo,
}

impl SoftSampler {
    pub(super) fn new(id: ResourceId, info: SamplerInfo) -> Self {
        Self { id, name: Mutex::new(String::new()), info }
    }
}

impl_resource!(SoftSampler, Sampler);

impl Sampler for SoftSampler {
    fn info(&self) -> &SamplerInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct SoftShader {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: ShaderInfo,
    pub(super) reflect_info: ShaderReflectInfo,
}

impl SoftShader {
    pub(super) fn new(id: ResourceId, info: ShaderInfo) -> Self {
        let reflect_info = ShaderReflectInfo { frequency: info.frequency, ..Default::default() };
        Self { id, name: Mutex::new(String::new()), info, reflect_info }
    }
}

impl_resource!(SoftShader, Shader);

impl Shader for SoftShader {
    fn info(&self) -> &ShaderInfo {
        &self.info
    }

    fn reflect_info(&self) -> &ShaderReflectInfo {
        &self.reflect_info
    }
}

#[derive(Debug)]
pub struct SoftShaderBindingTable {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: ShaderBindingTableInfo,
}

impl SoftShaderBindingTable {
    pub(super) fn new(id: ResourceId, info: ShaderBindingTableInfo) -> Self {
        Self { id, name: Mutex::new(String::new()), info }
    }
}

impl_resource!(SoftShaderBindingTable, ShaderBindingTable);

impl ShaderBindingTable for SoftShaderBindingTable {
    fn info(&self) -> &ShaderBindingTableInfo {
        &self.info
    }
}

pub struct SoftRootSignature {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: RootSignatureInfo,
    pub(super) device: Weak<SoftDevice>,
}

impl std::fmt::Debug for SoftRootSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftRootSignature").field("id", &self.id).finish()
    }
}

impl_resource!(SoftRootSignature, RootSignature);

impl RootSignature for SoftRootSignature {
    fn info(&self) -> &RootSignatureInfo {
        &self.info
    }

    fn create_descriptor_set(&self, set: u32) -> Option<DescriptorSetRef> {
        let device = self.device.upgrade()?;
        device.create_descriptor_set_for(&self.info, set)
    }
}

/// Descriptor writes are retained so tests and tooling can inspect what a
/// pass actually bound.
#[derive(Debug)]
pub struct SoftDescriptorSet {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    set_index: u32,
    entries: Vec<ShaderResourceEntry>,
    bindings: Mutex<HashMap<(u32, u32), DescriptorUpdateInfo>>,
}

impl SoftDescriptorSet {
    pub(super) fn new(id: ResourceId, set_index: u32, entries: Vec<ShaderResourceEntry>) -> Self {
        Self {
            id,
            name: Mutex::new(String::new()),
            set_index,
            entries,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_index(&self) -> u32 {
        self.set_index
    }

    pub fn entries(&self) -> &[ShaderResourceEntry] {
        &self.entries
    }

    pub fn bound(&self, binding: u32, index: u32) -> Option<DescriptorUpdateInfo> {
        self.bindings.lock().unwrap_or_else(|e| e.into_inner()).get(&(binding, index)).cloned()
    }
}

impl_resource!(SoftDescriptorSet, DescriptorSet);

impl DescriptorSet for SoftDescriptorSet {
    fn update_descriptor(&self, update: &DescriptorUpdateInfo) {
        self.bindings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((update.binding, update.index), update.clone());
    }
}

#[derive(Debug)]
pub struct SoftRenderPass {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: RenderPassInfo,
}

impl SoftRenderPass {
    pub(super) fn new(id: ResourceId, info: RenderPassInfo) -> Self {
        Self { id, name: Mutex::new(String::new()), info }
    }
}

impl_resource!(SoftRenderPass, RenderPass);

impl RenderPass for SoftRenderPass {
    fn info(&self) -> &RenderPassInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct SoftGraphicsPipeline {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: GraphicsPipelineInfo,
}

impl SoftGraphicsPipeline {
    pub(super) fn new(id: ResourceId, info: GraphicsPipelineInfo) -> Self {
        Self { id, name: Mutex::new(String::new()), info }
    }
}

impl_resource!(SoftGraphicsPipeline, GraphicsPipeline);

impl GraphicsPipeline for SoftGraphicsPipeline {
    fn info(&self) -> &GraphicsPipelineInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct SoftComputePipeline {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: ComputePipelineInfo,
}

impl SoftComputePipeline {
    pub(super) fn new(id: ResourceId, info: ComputePipelineInfo) -> Self {
        Self { id, name: Mutex::new(String::new()), info }
    }
}

impl_resource!(SoftComputePipeline, ComputePipeline);

impl ComputePipeline for SoftComputePipeline {
    fn info(&self) -> &ComputePipelineInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct SoftRayTracingPipeline {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: RayTracingPipelineInfo,
}

impl SoftRayTracingPipeline {
    pub(super) fn new(id: ResourceId, info: RayTracingPipelineInfo) -> Self {
        Self { id, name: Mutex::new(String::new()), info }
    }
}

impl_resource!(SoftRayTracingPipeline, RayTracingPipeline);

impl RayTracingPipeline for SoftRayTracingPipeline {
    fn info(&self) -> &RayTracingPipelineInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct SoftQueue {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) info: QueueInfo,
}

impl SoftQueue {
    pub(super) fn new(id: ResourceId, info: QueueInfo) -> Self {
        Self { id, name: Mutex::new(String::new()), info }
    }
}

impl_resource!(SoftQueue, Queue);

impl Queue for SoftQueue {
    fn info(&self) -> &QueueInfo {
        &self.info
    }

    fn wait_idle(&self) {
        // Submission is synchronous on the software device.
    }
}

#[derive(Debug)]
pub struct SoftSurface {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    pub(super) extent: Extent2D,
}

impl SoftSurface {
    pub(super) fn new(id: ResourceId, extent: Extent2D) -> Self {
        Self { id, name: Mutex::new(String::new()), extent }
    }
}

impl_resource!(SoftSurface, Surface);

impl Surface for SoftSurface {
    fn extent(&self) -> Extent2D {
        self.extent
    }
}

#[derive(Debug)]
pub struct SoftFence {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    signaled: AtomicBool,
}

impl SoftFence {
    pub(super) fn new(id: ResourceId, signaled: bool) -> Self {
        Self { id, name: Mutex::new(String::new()), signaled: AtomicBool::new(signaled) }
    }

    pub(crate) fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }
}

impl_resource!(SoftFence, Fence);

impl Fence for SoftFence {
    fn wait(&self) {
        // All submitted work has already completed by the time a fence is
        // signalled here, so there is nothing to block on.
        if !self.is_signaled() {
            log::trace!("fence {} waited on before any submission signalled it", self.id);
        }
    }

    fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SoftSemaphore {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
}

impl SoftSemaphore {
    pub(super) fn new(id: ResourceId) -> Self {
        Self { id, name: Mutex::new(String::new()) }
    }
}

impl_resource!(SoftSemaphore, Semaphore);

impl Semaphore for SoftSemaphore {}

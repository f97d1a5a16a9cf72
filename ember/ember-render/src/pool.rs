//! Transient resource pools. Each pool maps a structural key to a list of
//! free entries; entries remember the resource state they were released in so
//! the next user starts barrier inference from the truth.
//!
//! The process-wide `get()` singletons are what the graph executes against;
//! the pools themselves are plain structs so they can also be instantiated
//! locally (sizing experiments, tests).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};

use ember_rhi::{
    Buffer as _, BufferCreationFlags, BufferInfo, BufferRef, DescriptorSetRef, Device as _,
    DeviceRef, Format, MemoryUsage, ResourceState, ResourceTypeFlags, RootSignature as _,
    RootSignatureRef, ShaderResourceEntry, Texture as _, TextureInfo, TextureRef,
    TextureSubresourceRange, TextureView as _, TextureViewInfo, TextureViewRef, TextureViewType,
};

use crate::FRAMES_IN_FLIGHT;

// --- Buffer pool ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferPoolKey {
    pub memory_usage: MemoryUsage,
    pub resource_type: ResourceTypeFlags,
    pub creation_flags: BufferCreationFlags,
}

impl From<&BufferInfo> for BufferPoolKey {
    fn from(info: &BufferInfo) -> Self {
        Self {
            memory_usage: info.memory_usage,
            resource_type: info.resource_type,
            creation_flags: info.creation_flags,
        }
    }
}

#[derive(Clone)]
pub struct PooledBuffer {
    pub buffer: BufferRef,
    /// State the buffer was left in by its previous user.
    pub state: ResourceState,
}

#[derive(Default)]
pub struct RdgBufferPool {
    pooled_buffers: HashMap<BufferPoolKey, VecDeque<PooledBuffer>>,
    pooled_size: u32,
    allocated_size: u32,
}

impl RdgBufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// First free entry with capacity >= the requested size wins; otherwise a
    /// new buffer is created through the device.
    pub fn allocate(&mut self, device: &DeviceRef, info: &BufferInfo) -> Option<PooledBuffer> {
        let key = BufferPoolKey::from(info);
        if let Some(bucket) = self.pooled_buffers.get_mut(&key) {
            if let Some(pos) = bucket.iter().position(|p| p.buffer.info().size >= info.size) {
                let pooled = bucket.remove(pos);
                self.pooled_size -= 1;
                return pooled;
            }
        }
        let buffer = device.create_buffer(*info)?;
        self.allocated_size += 1;
        Some(PooledBuffer { buffer, state: ResourceState::Undefined })
    }

    pub fn release(&mut self, pooled: PooledBuffer) {
        let key = BufferPoolKey::from(pooled.buffer.info());
        self.pooled_buffers.entry(key).or_default().push_back(pooled);
        self.pooled_size += 1;
    }

    pub fn pooled_size(&self) -> u32 {
        self.pooled_size
    }

    pub fn allocated_size(&self) -> u32 {
        self.allocated_size
    }

    pub fn clear(&mut self) {
        self.pooled_buffers.clear();
        self.pooled_size = 0;
    }

    pub fn get() -> &'static Mutex<RdgBufferPool> {
        static POOL: OnceLock<Mutex<RdgBufferPool>> = OnceLock::new();
        POOL.get_or_init(|| Mutex::new(RdgBufferPool::new()))
    }
}

// --- Texture pool ---

#[derive(Clone)]
pub struct PooledTexture {
    pub texture: TextureRef,
    pub state: ResourceState,
}

#[derive(Default)]
pub struct RdgTexturePool {
    pooled_textures: HashMap<TextureInfo, VecDeque<PooledTexture>>,
    pooled_size: u32,
    allocated_size: u32,
}

impl RdgTexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `mip_levels == 0` to the full chain before keying, so the
    /// shorthand and the explicit form alias the same bucket.
    pub fn allocate(&mut self, device: &DeviceRef, info: &TextureInfo) -> Option<PooledTexture> {
        let mut key = *info;
        if key.mip_levels == 0 {
            key.mip_levels = key.extent.mip_size();
        }
        if let Some(bucket) = self.pooled_textures.get_mut(&key) {
            if let Some(pooled) = bucket.pop_front() {
                self.pooled_size -= 1;
                return Some(pooled);
            }
        }
        let texture = device.create_texture(key)?;
        self.allocated_size += 1;
        Some(PooledTexture { texture, state: ResourceState::Undefined })
    }

    pub fn release(&mut self, pooled: PooledTexture) {
        let key = *pooled.texture.info();
        self.pooled_textures.entry(key).or_default().push_back(pooled);
        self.pooled_size += 1;
    }

    pub fn pooled_size(&self) -> u32 {
        self.pooled_size
    }

    pub fn allocated_size(&self) -> u32 {
        self.allocated_size
    }

    pub fn clear(&mut self) {
        self.pooled_textures.clear();
        self.pooled_size = 0;
    }

    pub fn get() -> &'static Mutex<RdgTexturePool> {
        static POOL: OnceLock<Mutex<RdgTexturePool>> = OnceLock::new();
        POOL.get_or_init(|| Mutex::new(RdgTexturePool::new()))
    }
}

// --- Texture view pool ---

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextureViewPoolKey {
    /// Texture identity, not contents: views are only shareable against the
    /// same underlying object.
    texture: usize,
    format: Format,
    view_type: TextureViewType,
    subresource: TextureSubresourceRange,
}

impl TextureViewPoolKey {
    fn from_info(info: &TextureViewInfo) -> Self {
        Self {
            texture: Arc::as_ptr(&info.texture) as *const () as usize,
            format: info.format,
            view_type: info.view_type,
            subresource: info.subresource,
        }
    }
}

#[derive(Clone)]
pub struct PooledTextureView {
    pub texture_view: TextureViewRef,
}

#[derive(Default)]
pub struct RdgTextureViewPool {
    pooled_views: HashMap<TextureViewPoolKey, VecDeque<PooledTextureView>>,
    pooled_size: u32,
    allocated_size: u32,
}

impl RdgTextureViewPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Unknown` format and the wildcard subresource are normalized from the
    /// texture before keying.
    pub fn allocate(&mut self, device: &DeviceRef, info: &TextureViewInfo) -> Option<PooledTextureView> {
        let mut normalized = info.clone();
        if normalized.format == Format::Unknown {
            normalized.format = normalized.texture.info().format;
        }
        if normalized.subresource.is_default() {
            normalized.subresource = normalized.texture.default_subresource_range();
        }
        let key = TextureViewPoolKey::from_info(&normalized);
        if let Some(bucket) = self.pooled_views.get_mut(&key) {
            if let Some(pooled) = bucket.pop_front() {
                self.pooled_size -= 1;
                return Some(pooled);
            }
        }
        let texture_view = device.create_texture_view(normalized)?;
        self.allocated_size += 1;
        Some(PooledTextureView { texture_view })
    }

    pub fn release(&mut self, pooled: PooledTextureView) {
        let key = TextureViewPoolKey::from_info(pooled.texture_view.info());
        self.pooled_views.entry(key).or_default().push_back(pooled);
        self.pooled_size += 1;
    }

    pub fn pooled_size(&self) -> u32 {
        self.pooled_size
    }

    pub fn allocated_size(&self) -> u32 {
        self.allocated_size
    }

    pub fn clear(&mut self) {
        self.pooled_views.clear();
        self.pooled_size = 0;
    }

    pub fn get() -> &'static Mutex<RdgTextureViewPool> {
        static POOL: OnceLock<Mutex<RdgTextureViewPool>> = OnceLock::new();
        POOL.get_or_init(|| Mutex::new(RdgTextureViewPool::new()))
    }
}

// --- Descriptor set pool ---

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DescriptorSetPoolKey {
    entries: Vec<ShaderResourceEntry>,
    set: u32,
}

impl DescriptorSetPoolKey {
    fn from_signature(root_signature: &RootSignatureRef, set: u32) -> Self {
        Self { entries: root_signature.info().entries().to_vec(), set }
    }
}

#[derive(Clone)]
pub struct PooledDescriptor {
    pub descriptor: DescriptorSetRef,
}

/// Descriptor sets are keyed by the full root-signature entry list plus the
/// set index, one pool per frame-in-flight slot: a set can only be rewritten
/// once the frame that used it has retired.
#[derive(Default)]
pub struct RdgDescriptorSetPool {
    pooled_descriptors: HashMap<DescriptorSetPoolKey, VecDeque<PooledDescriptor>>,
    pooled_size: u32,
    allocated_size: u32,
}

impl RdgDescriptorSetPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, root_signature: &RootSignatureRef, set: u32) -> Option<PooledDescriptor> {
        let key = DescriptorSetPoolKey::from_signature(root_signature, set);
        if let Some(bucket) = self.pooled_descriptors.get_mut(&key) {
            if let Some(pooled) = bucket.pop_front() {
                self.pooled_size -= 1;
                return Some(pooled);
            }
        }
        let descriptor = root_signature.create_descriptor_set(set)?;
        self.allocated_size += 1;
        Some(PooledDescriptor { descriptor })
    }

    pub fn release(&mut self, pooled: PooledDescriptor, root_signature: &RootSignatureRef, set: u32) {
        let key = DescriptorSetPoolKey::from_signature(root_signature, set);
        self.pooled_descriptors.entry(key).or_default().push_back(pooled);
        self.pooled_size += 1;
    }

    pub fn pooled_size(&self) -> u32 {
        self.pooled_size
    }

    pub fn allocated_size(&self) -> u32 {
        self.allocated_size
    }

    pub fn clear(&mut self) {
        self.pooled_descriptors.clear();
        self.pooled_size = 0;
    }

    /// Pool for one frame-in-flight slot; `frame_index` is taken modulo
    /// [`FRAMES_IN_FLIGHT`].
    pub fn get(frame_index: u32) -> &'static Mutex<RdgDescriptorSetPool> {
        static POOLS: OnceLock<Vec<Mutex<RdgDescriptorSetPool>>> = OnceLock::new();
        let pools = POOLS.get_or_init(|| {
            (0..FRAMES_IN_FLIGHT).map(|_| Mutex::new(RdgDescriptorSetPool::new())).collect()
        });
        &pools[frame_index as usize % FRAMES_IN_FLIGHT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ember_rhi::soft::SoftDevice;
    use ember_rhi::{
        BackendInfo, Buffer as _, Device as _, Extent3D, Resource as _, RootSignatureInfo,
        ShaderFrequency, Texture as _,
    };

    fn device() -> DeviceRef {
        SoftDevice::create(BackendInfo::default())
    }

    fn texture_info(width: u32) -> TextureInfo {
        TextureInfo {
            format: Format::Rgba16Sfloat,
            extent: Extent3D::new(width, width, 1),
            ..Default::default()
        }
    }

    #[test]
    fn buffer_pool_round_trip_returns_same_handle_and_state() {
        let device = device();
        let mut pool = RdgBufferPool::new();
        let info = BufferInfo { size: 256, ..Default::default() };
        let first = pool.allocate(&device, &info).unwrap();
        assert_eq!(first.state, ResourceState::Undefined);
        assert_eq!(pool.allocated_size(), 1);
        let id = first.buffer.id();
        pool.release(PooledBuffer { buffer: first.buffer, state: ResourceState::ShaderResource });
        assert_eq!(pool.pooled_size(), 1);
        let second = pool.allocate(&device, &info).unwrap();
        assert_eq!(second.buffer.id(), id);
        assert_eq!(second.state, ResourceState::ShaderResource);
        assert_eq!(pool.pooled_size(), 0);
        assert_eq!(pool.allocated_size(), 1);
    }

    #[test]
    fn buffer_pool_never_returns_a_smaller_buffer() {
        let device = device();
        let mut pool = RdgBufferPool::new();
        let small = pool.allocate(&device, &BufferInfo { size: 64, ..Default::default() }).unwrap();
        pool.release(PooledBuffer { buffer: small.buffer, state: ResourceState::Undefined });
        let big = pool.allocate(&device, &BufferInfo { size: 1024, ..Default::default() }).unwrap();
        assert!(big.buffer.info().size >= 1024);
        // The undersized entry stays pooled.
        assert_eq!(pool.pooled_size(), 1);
        assert_eq!(pool.allocated_size(), 2);
    }

    #[test]
    fn buffer_pool_keys_on_usage_and_type() {
        let device = device();
        let mut pool = RdgBufferPool::new();
        let uniform = BufferInfo {
            size: 64,
            resource_type: ResourceTypeFlags::UNIFORM_BUFFER,
            ..Default::default()
        };
        let vertex = BufferInfo {
            size: 64,
            resource_type: ResourceTypeFlags::VERTEX_BUFFER,
            ..Default::default()
        };
        let pooled = pool.allocate(&device, &uniform).unwrap();
        pool.release(pooled);
        let other = pool.allocate(&device, &vertex).unwrap();
        assert_eq!(other.buffer.info().resource_type, ResourceTypeFlags::VERTEX_BUFFER);
        assert_eq!(pool.allocated_size(), 2);
    }

    #[test]
    fn texture_pool_reuses_on_identical_info() {
        let device = device();
        let mut pool = RdgTexturePool::new();
        let info = texture_info(128);
        let a = pool.allocate(&device, &info).unwrap();
        let b = pool.allocate(&device, &info).unwrap();
        assert_ne!(a.texture.id(), b.texture.id());
        let a_id = a.texture.id();
        pool.release(PooledTexture { texture: a.texture, state: ResourceState::ColorAttachment });
        assert_eq!(pool.pooled_size(), 1);
        let again = pool.allocate(&device, &info).unwrap();
        assert_eq!(again.texture.id(), a_id);
        assert_eq!(again.state, ResourceState::ColorAttachment);
        assert_eq!(pool.pooled_size(), 0);
        pool.clear();
        assert_eq!(pool.pooled_size(), 0);
    }

    #[test]
    fn texture_pool_normalizes_zero_mip_levels() {
        let device = device();
        let mut pool = RdgTexturePool::new();
        let mut info = texture_info(256);
        info.mip_levels = 0;
        let full = pool.allocate(&device, &info).unwrap();
        assert_eq!(full.texture.info().mip_levels, 9);
        pool.release(PooledTexture { texture: full.texture, state: ResourceState::Undefined });
        // The explicit full chain hits the same bucket.
        info.mip_levels = 9;
        let again = pool.allocate(&device, &info).unwrap();
        assert_eq!(pool.allocated_size(), 1);
        assert_eq!(again.texture.info().mip_levels, 9);
    }

    #[test]
    fn view_pool_normalizes_format_and_subresource() {
        let device = device();
        let mut pool = RdgTextureViewPool::new();
        let texture = device.create_texture(texture_info(64)).unwrap();
        let wildcard = TextureViewInfo {
            texture: texture.clone(),
            format: Format::Unknown,
            view_type: TextureViewType::D2,
            subresource: TextureSubresourceRange::default(),
        };
        let explicit = TextureViewInfo {
            texture: texture.clone(),
            format: Format::Rgba16Sfloat,
            view_type: TextureViewType::D2,
            subresource: texture.default_subresource_range(),
        };
        let view = pool.allocate(&device, &wildcard).unwrap();
        pool.release(view.clone());
        let again = pool.allocate(&device, &explicit).unwrap();
        assert_eq!(pool.allocated_size(), 1);
        assert!(Arc::ptr_eq(&view.texture_view, &again.texture_view));
    }

    #[test]
    fn descriptor_pool_keys_on_layout_and_set() {
        let device = device();
        let root_signature = device
            .create_root_signature(
                RootSignatureInfo::new()
                    .add_entry(ShaderResourceEntry {
                        set: 0,
                        binding: 0,
                        resource_type: ResourceTypeFlags::UNIFORM_BUFFER,
                        frequency: ShaderFrequency::ALL,
                        ..Default::default()
                    })
                    .add_entry(ShaderResourceEntry {
                        set: 1,
                        binding: 0,
                        resource_type: ResourceTypeFlags::TEXTURE,
                        frequency: ShaderFrequency::FRAGMENT,
                        ..Default::default()
                    }),
            )
            .unwrap();
        let mut pool = RdgDescriptorSetPool::new();
        let set0 = pool.allocate(&root_signature, 0).unwrap();
        let set1 = pool.allocate(&root_signature, 1).unwrap();
        assert_ne!(set0.descriptor.id(), set1.descriptor.id());
        let set0_id = set0.descriptor.id();
        pool.release(set0, &root_signature, 0);
        // Same layout, same set: reuse. Different set: fresh allocation.
        let again = pool.allocate(&root_signature, 0).unwrap();
        assert_eq!(again.descriptor.id(), set0_id);
        assert_eq!(pool.allocated_size(), 2);
    }

    #[test]
    fn descriptor_pool_frame_ring_reuses_per_slot() {
        let device = device();
        let root_signature = device
            .create_root_signature(RootSignatureInfo::new().add_entry(ShaderResourceEntry {
                set: 0,
                binding: 0,
                resource_type: ResourceTypeFlags::UNIFORM_BUFFER,
                ..Default::default()
            }))
            .unwrap();
        // Emulate the per-frame ring with local slots.
        let mut slots: Vec<RdgDescriptorSetPool> =
            (0..FRAMES_IN_FLIGHT).map(|_| RdgDescriptorSetPool::new()).collect();
        let mut first_ids = Vec::new();
        for frame in 0..FRAMES_IN_FLIGHT {
            let pooled = slots[frame].allocate(&root_signature, 0).unwrap();
            first_ids.push(pooled.descriptor.id());
            slots[frame].release(pooled, &root_signature, 0);
        }
        // Wrapping back to slot 0 hands out slot 0's descriptor again.
        let reused = slots[0].allocate(&root_signature, 0).unwrap();
        assert_eq!(reused.descriptor.id(), first_ids[0]);
        assert_ne!(first_ids[0], first_ids[1]);
    }
}

//! Parameter bundles consumed by the device factory methods. Structural
//! equality is deliberate: pipeline and pool caches key on these.

use std::sync::Arc;

use crate::resource::{
    BufferRef, QueueRef, RootSignatureRef, SamplerRef, ShaderBindingTableRef, ShaderRef,
    SurfaceRef, TextureRef, TextureViewRef,
};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueInfo {
    pub queue_type: QueueType,
    pub index: u32,
}

impl Default for QueueInfo {
    fn default() -> Self {
        Self { queue_type: QueueType::Graphics, index: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct SwapchainInfo {
    /// Absent on headless devices; the software backend synthesizes
    /// backbuffers either way.
    pub surface: Option<SurfaceRef>,
    pub present_queue: Option<QueueRef>,
    pub image_count: u32,
    pub extent: Extent2D,
    pub format: Format,
}

impl Default for SwapchainInfo {
    fn default() -> Self {
        Self {
            surface: None,
            present_queue: None,
            image_count: 3,
            extent: Extent2D::default(),
            format: Format::Bgra8Unorm,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandPoolInfo {
    pub queue: Option<QueueRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferInfo {
    pub size: u64,
    pub stride: u32,
    pub memory_usage: MemoryUsage,
    pub resource_type: ResourceTypeFlags,
    pub creation_flags: BufferCreationFlags,
}

impl Default for BufferInfo {
    fn default() -> Self {
        Self {
            size: 0,
            stride: 0,
            memory_usage: MemoryUsage::GpuOnly,
            resource_type: ResourceTypeFlags::BUFFER,
            creation_flags: BufferCreationFlags::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureInfo {
    pub format: Format,
    pub extent: Extent3D,
    pub array_layers: u32,
    /// 0 means "full chain": normalized to `extent.mip_size()` when the
    /// texture is created or pooled.
    pub mip_levels: u32,
    pub memory_usage: MemoryUsage,
    pub resource_type: ResourceTypeFlags,
    pub creation_flags: TextureCreationFlags,
}

impl Default for TextureInfo {
    fn default() -> Self {
        Self {
            format: Format::Unknown,
            extent: Extent3D::default(),
            array_layers: 1,
            mip_levels: 1,
            memory_usage: MemoryUsage::GpuOnly,
            resource_type: ResourceTypeFlags::TEXTURE,
            creation_flags: TextureCreationFlags::empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureViewInfo {
    pub texture: TextureRef,
    /// `Unknown` inherits the texture's format.
    pub format: Format,
    pub view_type: TextureViewType,
    /// The default range inherits the texture's full range.
    pub subresource: TextureSubresourceRange,
}

impl PartialEq for TextureViewInfo {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.texture, &other.texture)
            && self.format == other.format
            && self.view_type == other.view_type
            && self.subresource == other.subresource
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerInfo {
    pub min_filter: FilterType,
    pub mag_filter: FilterType,
    pub mipmap_mode: MipMapMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub compare_function: CompareFunction,
    pub reduction_mode: SamplerReductionMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: f32,
}

impl Default for SamplerInfo {
    fn default() -> Self {
        Self {
            min_filter: FilterType::Linear,
            mag_filter: FilterType::Linear,
            mipmap_mode: MipMapMode::Linear,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            compare_function: CompareFunction::Never,
            reduction_mode: SamplerReductionMode::WeightedAverage,
            mip_lod_bias: 0.0,
            max_anisotropy: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShaderInfo {
    pub entry: String,
    pub frequency: ShaderFrequency,
    pub code: Vec<u8>,
}

impl Default for ShaderInfo {
    fn default() -> Self {
        Self { entry: "main".to_owned(), frequency: ShaderFrequency::empty(), code: Vec::new() }
    }
}

/// One shader-visible resource slot of a root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderResourceEntry {
    pub set: u32,
    pub binding: u32,
    pub size: u32,
    pub frequency: ShaderFrequency,
    pub resource_type: ResourceTypeFlags,
}

impl Default for ShaderResourceEntry {
    fn default() -> Self {
        Self {
            set: 0,
            binding: 0,
            size: 1,
            frequency: ShaderFrequency::ALL,
            resource_type: ResourceTypeFlags::empty(),
        }
    }
}

/// Interface data recovered from compiled shader code. The software backend
/// reports an empty reflection; API backends fill it from their compilers.
#[derive(Debug, Clone, Default)]
pub struct ShaderReflectInfo {
    pub name: String,
    pub frequency: ShaderFrequency,
    pub resources: Vec<ShaderResourceEntry>,
    pub input_variables: [Format; MAX_SHADER_IN_OUT_VARIABLES],
    pub output_variables: [Format; MAX_SHADER_IN_OUT_VARIABLES],
    pub local_size: [u32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantInfo {
    pub size: u32,
    pub frequency: ShaderFrequency,
}

impl Default for PushConstantInfo {
    fn default() -> Self {
        Self { size: 128, frequency: ShaderFrequency::ALL }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootSignatureInfo {
    entries: Vec<ShaderResourceEntry>,
    push_constants: Vec<PushConstantInfo>,
}

impl RootSignatureInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(mut self, entry: ShaderResourceEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn add_entries(mut self, other: &RootSignatureInfo) -> Self {
        self.entries.extend_from_slice(&other.entries);
        self
    }

    pub fn add_entries_from_reflect(mut self, shader: &ShaderRef) -> Self {
        self.entries.extend_from_slice(&shader.reflect_info().resources);
        self
    }

    pub fn add_push_constant(mut self, push_constant: PushConstantInfo) -> Self {
        self.push_constants.push(push_constant);
        self
    }

    pub fn entries(&self) -> &[ShaderResourceEntry] {
        &self.entries
    }

    pub fn push_constants(&self) -> &[PushConstantInfo] {
        &self.push_constants
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderBindingTableInfo {
    pub ray_gen_groups: Vec<ShaderRef>,
    pub hit_groups: Vec<HitGroup>,
    pub miss_groups: Vec<ShaderRef>,
}

#[derive(Debug, Clone)]
pub struct HitGroup {
    pub closest_hit: Option<ShaderRef>,
    pub any_hit: Option<ShaderRef>,
    pub intersection: Option<ShaderRef>,
}

impl ShaderBindingTableInfo {
    pub fn add_ray_gen_group(mut self, ray_gen: ShaderRef) -> Self {
        self.ray_gen_groups.push(ray_gen);
        self
    }

    pub fn add_hit_group(
        mut self,
        closest_hit: Option<ShaderRef>,
        any_hit: Option<ShaderRef>,
        intersection: Option<ShaderRef>,
    ) -> Self {
        self.hit_groups.push(HitGroup { closest_hit, any_hit, intersection });
        self
    }

    pub fn add_miss_group(mut self, miss: ShaderRef) -> Self {
        self.miss_groups.push(miss);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentInfo {
    pub texture_view: TextureViewRef,
    pub load_op: AttachmentLoadOp,
    pub store_op: AttachmentStoreOp,
    pub clear_color: Color4,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Depth attachment bound for reading only.
    pub read_only: bool,
}

impl AttachmentInfo {
    pub fn new(texture_view: TextureViewRef) -> Self {
        Self {
            texture_view,
            load_op: AttachmentLoadOp::DontCare,
            store_op: AttachmentStoreOp::DontCare,
            clear_color: Color4::default(),
            clear_depth: 1.0,
            clear_stencil: 0,
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderPassInfo {
    pub color_attachments: [Option<AttachmentInfo>; MAX_RENDER_TARGETS],
    pub depth_stencil_attachment: Option<AttachmentInfo>,
    pub extent: Extent2D,
    pub layers: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerStateInfo {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub depth_clip_mode: DepthClipMode,
    pub depth_bias: f32,
    pub slope_scale_depth_bias: f32,
}

impl Default for RasterizerStateInfo {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            depth_clip_mode: DepthClipMode::Clip,
            depth_bias: 0.0,
            slope_scale_depth_bias: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilStateInfo {
    pub depth_test: CompareFunction,
    pub enable_depth_test: bool,
    pub enable_depth_write: bool,
}

impl Default for DepthStencilStateInfo {
    fn default() -> Self {
        Self {
            depth_test: CompareFunction::LessEqual,
            enable_depth_test: true,
            enable_depth_write: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendRenderTarget {
    pub color_blend_op: BlendOp,
    pub color_src_blend: BlendFactor,
    pub color_dst_blend: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub alpha_src_blend: BlendFactor,
    pub alpha_dst_blend: BlendFactor,
    pub color_write_mask: ColorWriteMask,
    pub enable: bool,
}

impl Default for BlendRenderTarget {
    fn default() -> Self {
        Self {
            color_blend_op: BlendOp::Add,
            color_src_blend: BlendFactor::One,
            color_dst_blend: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
            alpha_src_blend: BlendFactor::One,
            alpha_dst_blend: BlendFactor::Zero,
            color_write_mask: ColorWriteMask::RGBA,
            enable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendStateInfo {
    pub render_targets: [BlendRenderTarget; MAX_RENDER_TARGETS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexElement {
    pub stream_index: u32,
    pub attribute_index: u32,
    pub format: Format,
    pub offset: u32,
    pub stride: u32,
    pub use_instance_index: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexInputStateInfo {
    pub vertex_elements: Vec<VertexElement>,
}

#[derive(Debug, Clone, Default)]
pub struct GraphicsPipelineInfo {
    pub vertex_shader: Option<ShaderRef>,
    pub geometry_shader: Option<ShaderRef>,
    pub fragment_shader: Option<ShaderRef>,
    pub root_signature: Option<RootSignatureRef>,
    pub vertex_input_state: VertexInputStateInfo,
    pub primitive_type: PrimitiveType,
    pub rasterizer_state: RasterizerStateInfo,
    pub blend_state: BlendStateInfo,
    pub depth_stencil_state: DepthStencilStateInfo,
    pub color_attachment_formats: [Format; MAX_RENDER_TARGETS],
    pub depth_stencil_attachment_format: Format,
}

impl PartialEq for GraphicsPipelineInfo {
    fn eq(&self, other: &Self) -> bool {
        opt_ptr_eq(&self.vertex_shader, &other.vertex_shader)
            && opt_ptr_eq(&self.geometry_shader, &other.geometry_shader)
            && opt_ptr_eq(&self.fragment_shader, &other.fragment_shader)
            && opt_ptr_eq(&self.root_signature, &other.root_signature)
            && self.vertex_input_state == other.vertex_input_state
            && self.primitive_type == other.primitive_type
            && self.rasterizer_state == other.rasterizer_state
            && self.blend_state == other.blend_state
            && self.depth_stencil_state == other.depth_stencil_state
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComputePipelineInfo {
    pub compute_shader: Option<ShaderRef>,
    pub root_signature: Option<RootSignatureRef>,
}

impl PartialEq for ComputePipelineInfo {
    fn eq(&self, other: &Self) -> bool {
        opt_ptr_eq(&self.compute_shader, &other.compute_shader)
            && opt_ptr_eq(&self.root_signature, &other.root_signature)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RayTracingPipelineInfo {
    pub shader_binding_table: Option<ShaderBindingTableRef>,
    pub root_signature: Option<RootSignatureRef>,
}

impl PartialEq for RayTracingPipelineInfo {
    fn eq(&self, other: &Self) -> bool {
        opt_ptr_eq(&self.shader_binding_table, &other.shader_binding_table)
            && opt_ptr_eq(&self.root_signature, &other.root_signature)
    }
}

fn opt_ptr_eq<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// A single descriptor write. Exactly one of the resource fields should be
/// set, matching `resource_type`.
#[derive(Debug, Clone, Default)]
pub struct DescriptorUpdateInfo {
    pub binding: u32,
    pub index: u32,
    pub resource_type: ResourceTypeFlags,
    pub buffer: Option<BufferRef>,
    pub texture_view: Option<TextureViewRef>,
    pub sampler: Option<SamplerRef>,
    pub buffer_offset: u64,
    pub buffer_range: u64,
}

#[derive(Debug, Clone)]
pub struct BufferBarrier {
    pub buffer: BufferRef,
    pub src_state: ResourceState,
    pub dst_state: ResourceState,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct TextureBarrier {
    pub texture: TextureRef,
    pub src_state: ResourceState,
    pub dst_state: ResourceState,
    pub subresource: TextureSubresourceRange,
}

//! Plain-data types shared by every backend: enumerations, bit masks,
//! integer geometry and subresource addressing.

use bitflags::bitflags;

pub const MAX_QUEUE_COUNT: usize = 2;
pub const MAX_RENDER_TARGETS: usize = 8;
pub const MAX_SHADER_IN_OUT_VARIABLES: usize = 8;
pub const MAX_DESCRIPTOR_SETS: usize = 8;

/// Number of consecutive `tick()`s a resource may sit unreferenced in the
/// backend's tracking table before it is destroyed.
pub const RESOURCE_GRACE_TICKS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Deterministic in-process device. Records every command instead of
    /// touching a GPU.
    #[default]
    Soft,
    Vulkan,
    Dx11,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BackendInfo {
    pub backend_type: BackendType,
    pub enable_debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueType {
    #[default]
    Graphics,
    Compute,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryUsage {
    Unknown,
    #[default]
    GpuOnly,
    CpuOnly,
    CpuToGpu,
    GpuToCpu,
}

/// The state a resource must be in for a given GPU access. Transitions
/// between states are expressed as barriers; `Undefined -> X` never preserves
/// contents, every other transition does, and `X -> X` is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    #[default]
    Undefined,
    Common,
    TransferSrc,
    TransferDst,
    VertexBuffer,
    IndexBuffer,
    ColorAttachment,
    DepthStencilAttachment,
    UnorderedAccess,
    ShaderResource,
    IndirectArgument,
    Present,
    AccelerationStructure,
}

bitflags! {
    /// How a resource may be bound. Doubles as the descriptor type when a
    /// single bit is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ResourceTypeFlags: u32 {
        const SAMPLER                = 1 << 0;
        const TEXTURE                = 1 << 1;
        const RW_TEXTURE             = 1 << 2;
        const TEXTURE_CUBE           = 1 << 3;
        const RENDER_TARGET          = 1 << 4;
        const COMBINED_IMAGE_SAMPLER = 1 << 5;
        const BUFFER                 = 1 << 6;
        const RW_BUFFER              = 1 << 7;
        const UNIFORM_BUFFER         = 1 << 8;
        const VERTEX_BUFFER          = 1 << 9;
        const INDEX_BUFFER           = 1 << 10;
        const INDIRECT_BUFFER        = 1 << 11;
        const TEXEL_BUFFER           = 1 << 12;
        const RW_TEXEL_BUFFER        = 1 << 13;
        const RAY_TRACING            = 1 << 14;
        const DEPTH_STENCIL          = 1 << 15;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct BufferCreationFlags: u32 {
        const PERSISTENT_MAP  = 1 << 0;
        const FORCE_ALIGNMENT = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct TextureCreationFlags: u32 {
        const FORCE_2D = 1 << 0;
        const FORCE_3D = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ShaderFrequency: u32 {
        const COMPUTE      = 1 << 0;
        const VERTEX       = 1 << 1;
        const FRAGMENT     = 1 << 2;
        const GEOMETRY     = 1 << 3;
        const RAY_GEN      = 1 << 4;
        const CLOSEST_HIT  = 1 << 5;
        const RAY_MISS     = 1 << 6;
        const INTERSECTION = 1 << 7;
        const ANY_HIT      = 1 << 8;
        const MESH         = 1 << 9;

        const GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits()
            | Self::GEOMETRY.bits() | Self::MESH.bits();
        const RAY_TRACING = Self::RAY_GEN.bits() | Self::CLOSEST_HIT.bits()
            | Self::RAY_MISS.bits() | Self::INTERSECTION.bits() | Self::ANY_HIT.bits();
        const ALL = Self::GRAPHICS.bits() | Self::COMPUTE.bits() | Self::RAY_TRACING.bits();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct TextureAspectFlags: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;

        const DEPTH_STENCIL = Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ColorWriteMask: u32 {
        const RED   = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE  = 1 << 2;
        const ALPHA = 1 << 3;

        const RG   = Self::RED.bits() | Self::GREEN.bits();
        const BA   = Self::BLUE.bits() | Self::ALPHA.bits();
        const RGB  = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
        const RGBA = Self::RGB.bits() | Self::ALPHA.bits();
    }
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        ColorWriteMask::RGBA
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Unknown,

    R8Srgb,
    Rg8Srgb,
    Rgb8Srgb,
    Rgba8Srgb,
    Bgra8Srgb,
    Bgra8Unorm,

    R16Sfloat,
    Rg16Sfloat,
    Rgb16Sfloat,
    Rgba16Sfloat,
    R32Sfloat,
    Rg32Sfloat,
    Rgb32Sfloat,
    Rgba32Sfloat,

    R8Unorm,
    Rg8Unorm,
    Rgb8Unorm,
    Rgba8Unorm,
    R16Unorm,
    Rg16Unorm,
    Rgb16Unorm,
    Rgba16Unorm,

    R8Snorm,
    Rg8Snorm,
    Rgb8Snorm,
    Rgba8Snorm,
    R16Snorm,
    Rg16Snorm,
    Rgb16Snorm,
    Rgba16Snorm,

    R8Uint,
    Rg8Uint,
    Rgb8Uint,
    Rgba8Uint,
    R16Uint,
    Rg16Uint,
    Rgb16Uint,
    Rgba16Uint,
    R32Uint,
    Rg32Uint,
    Rgb32Uint,
    Rgba32Uint,

    R8Sint,
    Rg8Sint,
    Rgb8Sint,
    Rgba8Sint,
    R16Sint,
    Rg16Sint,
    Rgb16Sint,
    Rgba16Sint,
    R32Sint,
    Rg32Sint,
    Rgb32Sint,
    Rgba32Sint,

    D32Sfloat,
    D32SfloatS8Uint,
    D24UnormS8Uint,
}

impl Format {
    pub fn channel_count(self) -> u32 {
        use Format::*;
        match self {
            R8Srgb | R16Sfloat | R32Sfloat | R8Unorm | R16Unorm | R8Snorm | R16Snorm
            | R8Uint | R16Uint | R32Uint | R8Sint | R16Sint | R32Sint | D32Sfloat => 1,
            Rg8Srgb | Rg16Sfloat | Rg32Sfloat | Rg8Unorm | Rg16Unorm | Rg8Snorm | Rg16Snorm
            | Rg8Uint | Rg16Uint | Rg32Uint | Rg8Sint | Rg16Sint | Rg32Sint
            | D32SfloatS8Uint | D24UnormS8Uint => 2,
            Rgb8Srgb | Rgb16Sfloat | Rgb32Sfloat | Rgb8Unorm | Rgb16Unorm | Rgb8Snorm
            | Rgb16Snorm | Rgb8Uint | Rgb16Uint | Rgb32Uint | Rgb8Sint | Rgb16Sint
            | Rgb32Sint => 3,
            Rgba8Srgb | Bgra8Srgb | Bgra8Unorm | Rgba16Sfloat | Rgba32Sfloat | Rgba8Unorm
            | Rgba16Unorm | Rgba8Snorm | Rgba16Snorm | Rgba8Uint | Rgba16Uint | Rgba32Uint
            | Rgba8Sint | Rgba16Sint | Rgba32Sint => 4,
            Unknown => 0,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Format::D32Sfloat | Format::D32SfloatS8Uint | Format::D24UnormS8Uint)
    }

    pub fn is_stencil(self) -> bool {
        matches!(self, Format::D32SfloatS8Uint | Format::D24UnormS8Uint)
    }

    pub fn is_depth_stencil(self) -> bool {
        self.is_depth() && self.is_stencil()
    }

    pub fn is_color(self) -> bool {
        !self.is_depth() && !self.is_stencil()
    }

    /// sRGB and depth formats cannot back unordered-access views.
    pub fn allows_unordered_access(self) -> bool {
        use Format::*;
        !matches!(
            self,
            D32Sfloat | D32SfloatS8Uint | D24UnormS8Uint | R8Srgb | Rg8Srgb | Rgb8Srgb
                | Rgba8Srgb | Bgra8Srgb
        )
    }

    /// Aspect mask a texture of this format exposes by default.
    pub fn aspect(self) -> TextureAspectFlags {
        if self.is_depth_stencil() {
            TextureAspectFlags::DEPTH_STENCIL
        } else if self.is_depth() {
            TextureAspectFlags::DEPTH
        } else {
            TextureAspectFlags::COLOR
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterType {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipMapMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    Mirror,
    #[default]
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureViewType {
    Undefined,
    D1,
    #[default]
    D2,
    D3,
    Cube,
    D1Array,
    D2Array,
    CubeArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentLoadOp {
    Load,
    Clear,
    #[default]
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentStoreOp {
    Store,
    #[default]
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    Point,
    Wireframe,
    #[default]
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthClipMode {
    #[default]
    Clip,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Less,
    #[default]
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Never,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerReductionMode {
    #[default]
    WeightedAverage,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    SaturatedIncrement,
    SaturatedDecrement,
    Invert,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    Uint16,
    #[default]
    Uint32,
}

// Integer geometry.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Full mip chain length for this extent.
    pub fn mip_size(&self) -> u32 {
        self.width.max(self.height).max(1).ilog2() + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    pub fn mip_size(&self) -> u32 {
        self.width.max(self.height).max(self.depth).max(1).ilog2() + 1
    }

    pub fn wh(&self) -> Extent2D {
        Extent2D { width: self.width, height: self.height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset2D {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset3D {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2D {
    pub offset: Offset2D,
    pub extent: Extent2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color4 {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// A (mip range, layer range) window into a texture. The all-zero value is
/// the wildcard: it stands for the whole texture during state tracking and is
/// substituted with the texture's concrete default range when a view is
/// created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureSubresourceRange {
    pub aspect: TextureAspectFlags,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl TextureSubresourceRange {
    pub fn is_default(&self) -> bool {
        self.aspect.is_empty()
            && self.base_mip_level == 0
            && self.level_count == 0
            && self.base_array_layer == 0
            && self.layer_count == 0
    }
}

/// Single-mip slice of layers, the unit of copy operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureSubresourceLayers {
    pub aspect: TextureAspectFlags,
    pub mip_level: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl TextureSubresourceLayers {
    pub fn is_default(&self) -> bool {
        self.aspect.is_empty()
            && self.mip_level == 0
            && self.base_array_layer == 0
            && self.layer_count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndirectCommand {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexedIndirectCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_size_matches_log2_floor_plus_one() {
        assert_eq!(Extent2D::new(1, 1).mip_size(), 1);
        assert_eq!(Extent2D::new(2, 2).mip_size(), 2);
        assert_eq!(Extent2D::new(256, 256).mip_size(), 9);
        assert_eq!(Extent2D::new(800, 600).mip_size(), 10);
        assert_eq!(Extent3D::new(4, 1, 64).mip_size(), 7);
        assert_eq!(Extent3D::new(1920, 1080, 1).mip_size(), 11);
    }

    #[test]
    fn subresource_default_is_wildcard() {
        assert!(TextureSubresourceRange::default().is_default());
        let explicit = TextureSubresourceRange {
            aspect: TextureAspectFlags::COLOR,
            level_count: 1,
            layer_count: 1,
            ..Default::default()
        };
        assert!(!explicit.is_default());
    }

    #[test]
    fn format_classification() {
        assert!(Format::D32Sfloat.is_depth());
        assert!(!Format::D32Sfloat.is_stencil());
        assert!(Format::D24UnormS8Uint.is_depth_stencil());
        assert!(Format::Rgba8Unorm.is_color());
        assert!(!Format::Rgba8Srgb.allows_unordered_access());
        assert!(Format::Rgba16Sfloat.allows_unordered_access());
        assert_eq!(Format::Rgb32Sfloat.channel_count(), 3);
        assert_eq!(Format::D24UnormS8Uint.aspect(), TextureAspectFlags::DEPTH_STENCIL);
    }
}

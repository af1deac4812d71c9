/// Runtime configuration and the small value types shared by every stage
/// of the culling pipeline.
///
/// The culler's behavioral switches (merge heuristic, screen convention,
/// coverage rules, clip ordering) live in `CullingConfig` and are fixed
/// for the lifetime of one `MaskedOcclusionCulling` instance.
use bitflags::bitflags;

/// Screen-space orientation of the Y axis after projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScreenConvention {
    /// Y axis points down, vertex order is reversed during projection.
    #[default]
    Direct3D,
    /// Y axis points up.
    OpenGl,
}

/// Behavioral switches of the culler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullingConfig {
    /// Use the two-layer quick merge heuristic when updating tiles.
    /// `false` selects the slower, less lossy accurate merge.
    pub quick_mask: bool,
    /// Projection convention of the incoming clip-space vertices.
    pub screen_convention: ScreenConvention,
    /// Snap vertices to 8 sub-pixel bits and sample at pixel centers,
    /// matching GPU coverage rules more closely.
    pub precise_coverage: bool,
    /// Emit clipped triangles in their original submission order.
    pub clipping_preserves_order: bool,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            quick_mask: true,
            screen_convention: ScreenConvention::Direct3D,
            precise_coverage: true,
            clipping_preserves_order: true,
        }
    }
}

bitflags! {
    /// Frustum planes to clip against. `ClipPlanes::empty()` disables
    /// clipping entirely; the caller then guarantees all geometry is in view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClipPlanes: u32 {
        const NEAR = 1;
        const LEFT = 1 << 1;
        const RIGHT = 1 << 2;
        const BOTTOM = 1 << 3;
        const TOP = 1 << 4;
        const SIDES = Self::LEFT.bits() | Self::RIGHT.bits() | Self::BOTTOM.bits() | Self::TOP.bits();
        const ALL = Self::NEAR.bits() | Self::SIDES.bits();
    }
}

impl Default for ClipPlanes {
    fn default() -> Self {
        ClipPlanes::ALL
    }
}

/// Which screen-space winding is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackfaceWinding {
    /// Double sided: nothing is culled.
    None,
    /// Clockwise triangles are back faces.
    #[default]
    Cw,
    /// Counter-clockwise triangles are back faces.
    Ccw,
}

impl BackfaceWinding {
    #[inline]
    pub(crate) fn culls_cw(self) -> bool {
        self == BackfaceWinding::Cw
    }

    #[inline]
    pub(crate) fn culls_ccw(self) -> bool {
        self == BackfaceWinding::Ccw
    }
}

/// Result of a render or occlusion query.
///
/// Ordered so that combining partial results is a `min`: a single visible
/// piece makes the whole query visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CullingResult {
    Visible,
    Occluded,
    ViewCulled,
}

impl CullingResult {
    #[inline]
    pub fn combine(self, other: CullingResult) -> CullingResult {
        self.min(other)
    }
}

/// Location of the position components inside an interleaved vertex
/// stream, measured in `f32` elements.
///
/// `offset_zw` points at `w` for clip-space input, or at model-space `z`
/// when a model-to-clip matrix is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: usize,
    pub offset_y: usize,
    pub offset_zw: usize,
}

impl VertexLayout {
    /// Packed `(x, y, z, w)` vertices.
    pub const XYZW: VertexLayout = VertexLayout { stride: 4, offset_y: 1, offset_zw: 3 };
    /// Packed `(x, y, z)` vertices, used together with a model-to-clip matrix.
    pub const XYZ: VertexLayout = VertexLayout { stride: 3, offset_y: 1, offset_zw: 2 };

    pub const fn new(stride: usize, offset_y: usize, offset_zw: usize) -> Self {
        Self { stride, offset_y, offset_zw }
    }

    /// Packed four-float layout that can use the contiguous gather path.
    #[inline]
    pub(crate) fn is_packed_xyzw(&self) -> bool {
        *self == Self::XYZW
    }
}

impl Default for VertexLayout {
    fn default() -> Self {
        Self::XYZW
    }
}

/// Screen-aligned pixel rectangle `[min, max)` restricting rasterization.
/// Bin scissors must be aligned to the 32xN tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl ScissorRect {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    #[inline]
    pub fn overlaps(&self, other: &ScissorRect) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

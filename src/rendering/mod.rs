/// Software occlusion rasterization pipeline
/// Gather and clip, triangle setup, tile rasterization into the masked
/// hierarchical depth buffer, and screen-space binning for parallel rendering
pub mod binning;
pub mod clipping;
pub mod hiz_buffer;
pub mod rasterizer;
pub mod simd_vertex;
pub mod triangle_setup;

pub use binning::{BinTarget, TriList};
pub use hiz_buffer::{HiZBuffer, TileStore, ZTile, TILE_WIDTH};
pub use rasterizer::{OccludeeTester, OccluderWriter, TileTarget};
pub use simd_vertex::transform_vertices;
pub use triangle_setup::{ScreenTriangle, Viewport};

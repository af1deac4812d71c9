pub mod config;
pub mod cpu;
/// Masked Occlusion Culling - conservative software rasterization of occluders
/// into a hierarchical masked depth buffer, with visibility queries against it
pub mod culler;
pub mod error;
pub mod perf;
pub mod rendering;

pub use config::{
    BackfaceWinding, ClipPlanes, CullingConfig, CullingResult, ScissorRect, ScreenConvention, VertexLayout,
};
pub use cpu::Implementation;
pub use culler::{MaskedOcclusionCulling, OcclusionCuller};
pub use error::OcclusionError;
pub use perf::{CullingCounters, OccludeeStatistics, OccluderStatistics, OcclusionCullingStatistics};
pub use rendering::{transform_vertices, HiZBuffer, TriList};

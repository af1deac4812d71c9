/// Errors reported by the setup and multi-buffer APIs.
///
/// The per-triangle paths never fail: degenerate or off-screen geometry is
/// culled and reported through `CullingResult`.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcclusionError {
    #[error("resolution {width}x{height} is invalid: width must be a non-zero multiple of 8 and height a non-zero multiple of 4")]
    InvalidResolution { width: u32, height: u32 },

    #[error("cannot merge a {other_width}x{other_height} buffer into a {width}x{height} buffer")]
    ResolutionMismatch {
        width: u32,
        height: u32,
        other_width: u32,
        other_height: u32,
    },

    #[error("cannot merge buffers built with different lane widths or configurations")]
    ImplementationMismatch,

    #[error("scissor {min_x},{min_y}..{max_x},{max_y} is not aligned to the tile grid or exceeds the screen")]
    UnalignedScissor { min_x: i32, min_y: i32, max_x: i32, max_y: i32 },

    #[error("bin scissors {first} and {second} overlap")]
    OverlappingBins { first: usize, second: usize },

    #[error("{trilists} triangle lists supplied for {scissors} scissor rectangles")]
    BinCountMismatch { trilists: usize, scissors: usize },
}

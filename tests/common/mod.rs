// Shared helpers for the integration tests
#![allow(dead_code)]

use masked_occlusion::{BackfaceWinding, ClipPlanes, CullingConfig, CullingResult, OcclusionCuller, VertexLayout};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Packed `(x, y, z, w)` vertices and indices of a counter-clockwise clip-space
/// quad covering NDC `[x0, x1] x [y0, y1]` at clip depth `w`.
pub fn ndc_quad(x0: f32, y0: f32, x1: f32, y1: f32, w: f32) -> (Vec<f32>, Vec<u32>) {
    let vertices = vec![
        x0 * w, y0 * w, 0.0, w, //
        x1 * w, y0 * w, 0.0, w, //
        x1 * w, y1 * w, 0.0, w, //
        x0 * w, y1 * w, 0.0, w,
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

/// Append a quad to an existing vertex/index list.
pub fn push_quad(vertices: &mut Vec<f32>, indices: &mut Vec<u32>, quad: (Vec<f32>, Vec<u32>)) {
    let base = (vertices.len() / 4) as u32;
    vertices.extend_from_slice(&quad.0);
    indices.extend(quad.1.iter().map(|i| i + base));
}

/// Quad covering pixels `[px0, px1) x [py0, py1)` (row 0 at the top) of a
/// `width` x `height` Direct3D screen.
pub fn pixel_quad(width: u32, height: u32, px0: u32, py0: u32, px1: u32, py1: u32, w: f32) -> (Vec<f32>, Vec<u32>) {
    let hw = width as f32 * 0.5;
    let hh = height as f32 * 0.5;
    let x0 = px0 as f32 / hw - 1.0;
    let x1 = px1 as f32 / hw - 1.0;
    let y_top = 1.0 - py0 as f32 / hh;
    let y_bottom = 1.0 - py1 as f32 / hh;
    ndc_quad(x0, y_bottom, x1, y_top, w)
}

pub fn culler<const L: usize>(width: u32, height: u32, config: CullingConfig) -> OcclusionCuller<L> {
    let mut culler = OcclusionCuller::<L>::new(config);
    culler.set_resolution(width, height).expect("valid resolution");
    culler
}

pub fn render<const L: usize>(culler: &mut OcclusionCuller<L>, vertices: &[f32], indices: &[u32]) -> CullingResult {
    culler.render_triangles(vertices, indices, None, BackfaceWinding::Cw, ClipPlanes::ALL, VertexLayout::XYZW)
}

pub fn test<const L: usize>(culler: &OcclusionCuller<L>, vertices: &[f32], indices: &[u32]) -> CullingResult {
    culler.test_triangles(vertices, indices, None, BackfaceWinding::Cw, ClipPlanes::ALL, VertexLayout::XYZW)
}

/// SIMD-accelerated vertex transformation and per-batch triangle gather
/// Transforms strided f32 vertex streams to clip space in batches of 8 using AVX2
/// and gathers one triangle per lane for the setup stage
use crate::config::VertexLayout;
use glam::{Mat4, Vec4};

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

/// Batch size for SIMD processing (8 vertices per iteration)
/// Chosen to match AVX2 register width (8x f32)
const SIMD_BATCH_SIZE: usize = 8;

/// Number of vertices described by `input` under `layout`.
#[inline]
pub fn vertex_count(input: &[f32], layout: &VertexLayout) -> usize {
    let last = layout.offset_y.max(layout.offset_zw);
    if input.len() <= last {
        0
    } else {
        (input.len() - last - 1) / layout.stride + 1
    }
}

/// Read the `(x, y, zw)` position of vertex `index`.
#[inline]
fn read_position(input: &[f32], index: usize, layout: &VertexLayout) -> (f32, f32, f32) {
    if layout.is_packed_xyzw() {
        let v = &input[index * 4..index * 4 + 4];
        (v[0], v[1], v[3])
    } else {
        let base = index * layout.stride;
        (input[base], input[base + layout.offset_y], input[base + layout.offset_zw])
    }
}

/// Transform model-space vertices to clip space: `out = mtx * (x, y, z, 1)`
///
/// `output` receives one clip-space vertex per input vertex, capped at its length.
/// The AVX2 path processes 8 vertices per iteration; the remainder and
/// non-AVX2 CPUs use the scalar path.
#[inline]
pub fn transform_vertices(mtx: &Mat4, input: &[f32], output: &mut [Vec4], layout: VertexLayout) {
    let count = vertex_count(input, &layout).min(output.len());
    let output = &mut output[..count];

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe {
                transform_vertices_avx2(mtx, input, output, &layout);
            }
            return;
        }
    }

    transform_vertices_scalar(mtx, input, output, &layout, 0);
}

/// Scalar fallback implementation (used when AVX2 is not available)
#[inline]
fn transform_vertices_scalar(mtx: &Mat4, input: &[f32], output: &mut [Vec4], layout: &VertexLayout, start: usize) {
    for (i, out) in output.iter_mut().enumerate().skip(start) {
        let (x, y, z) = read_position(input, i, layout);
        *out = *mtx * Vec4::new(x, y, z, 1.0);
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn transform_vertices_avx2(mtx: &Mat4, input: &[f32], output: &mut [Vec4], layout: &VertexLayout) {
    let len = output.len();
    let batch_count = len / SIMD_BATCH_SIZE;

    // Broadcast matrix columns to SIMD registers (reused for all vertices)
    let m0 = mtx.x_axis;
    let m1 = mtx.y_axis;
    let m2 = mtx.z_axis;
    let m3 = mtx.w_axis;
    let m0_v = [_mm256_set1_ps(m0.x), _mm256_set1_ps(m0.y), _mm256_set1_ps(m0.z), _mm256_set1_ps(m0.w)];
    let m1_v = [_mm256_set1_ps(m1.x), _mm256_set1_ps(m1.y), _mm256_set1_ps(m1.z), _mm256_set1_ps(m1.w)];
    let m2_v = [_mm256_set1_ps(m2.x), _mm256_set1_ps(m2.y), _mm256_set1_ps(m2.z), _mm256_set1_ps(m2.w)];
    let m3_v = [_mm256_set1_ps(m3.x), _mm256_set1_ps(m3.y), _mm256_set1_ps(m3.z), _mm256_set1_ps(m3.w)];

    for batch_idx in 0..batch_count {
        let base_idx = batch_idx * SIMD_BATCH_SIZE;

        // Strided gather into SoA arrays
        let mut x_values = [0.0f32; SIMD_BATCH_SIZE];
        let mut y_values = [0.0f32; SIMD_BATCH_SIZE];
        let mut z_values = [0.0f32; SIMD_BATCH_SIZE];
        for i in 0..SIMD_BATCH_SIZE {
            let (x, y, z) = read_position(input, base_idx + i, layout);
            x_values[i] = x;
            y_values[i] = y;
            z_values[i] = z;
        }

        let px = _mm256_loadu_ps(x_values.as_ptr());
        let py = _mm256_loadu_ps(y_values.as_ptr());
        let pz = _mm256_loadu_ps(z_values.as_ptr());

        // out.c = m0.c * x + m1.c * y + m2.c * z + m3.c
        let mut lanes = [[0.0f32; SIMD_BATCH_SIZE]; 4];
        for c in 0..4 {
            let out_c = _mm256_add_ps(
                _mm256_add_ps(_mm256_mul_ps(m0_v[c], px), _mm256_mul_ps(m1_v[c], py)),
                _mm256_add_ps(_mm256_mul_ps(m2_v[c], pz), m3_v[c]),
            );
            _mm256_storeu_ps(lanes[c].as_mut_ptr(), out_c);
        }

        for i in 0..SIMD_BATCH_SIZE {
            output[base_idx + i] = Vec4::new(lanes[0][i], lanes[1][i], lanes[2][i], lanes[3][i]);
        }
    }

    // Handle remainder with scalar code
    transform_vertices_scalar(mtx, input, output, layout, batch_count * SIMD_BATCH_SIZE);
}

/// Clip-space vertices of one triangle per lane. Only `x`, `y` and `w` are
/// meaningful; `z` is carried along but never read by the rasterizer.
pub(crate) type TriangleBatch<const L: usize> = [[Vec4; 3]; L];

/// Vertex used for lanes without a triangle: on the near plane side, finite.
pub(crate) const IDLE_VERTEX: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Gather `num_lanes` consecutive triangles starting at triangle `first_tri`
/// into lanes `[0, num_lanes)` of `batch`, transforming them to clip space
/// when a model-to-clip matrix is given.
pub(crate) fn gather_triangles<const L: usize>(
    vertices: &[f32],
    indices: &[u32],
    first_tri: usize,
    num_lanes: usize,
    model_to_clip: Option<&Mat4>,
    layout: &VertexLayout,
    batch: &mut TriangleBatch<L>,
) {
    debug_assert!(num_lanes <= L);
    for (lane, tri) in batch.iter_mut().enumerate().take(num_lanes) {
        let base = (first_tri + lane) * 3;
        for (v, out) in tri.iter_mut().enumerate() {
            let (x, y, zw) = read_position(vertices, indices[base + v] as usize, layout);
            *out = match model_to_clip {
                Some(mtx) => *mtx * Vec4::new(x, y, zw, 1.0),
                None => Vec4::new(x, y, 0.0, zw),
            };
        }
    }
    for tri in batch.iter_mut().skip(num_lanes) {
        *tri = [IDLE_VERTEX; 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_matrix() -> Mat4 {
        Mat4::perspective_rh(1.2, 1.5, 0.1, 100.0) * Mat4::from_translation(glam::Vec3::new(0.5, -1.0, -4.0))
    }

    #[test]
    fn test_simd_matches_scalar() {
        let layout = VertexLayout::XYZ;
        let input: Vec<f32> = (0..48).map(|i| (i as f32 * 0.37).sin() * 3.0).collect();
        let mtx = test_matrix();

        let mut output_simd = vec![Vec4::ZERO; 16];
        let mut output_scalar = vec![Vec4::ZERO; 16];
        transform_vertices(&mtx, &input, &mut output_simd, layout);
        transform_vertices_scalar(&mtx, &input, &mut output_scalar, &layout, 0);

        for i in 0..16 {
            let diff = (output_simd[i] - output_scalar[i]).abs();
            assert!(
                diff.max_element() < 1e-4,
                "Mismatch at vertex {}: SIMD {:?} vs Scalar {:?}",
                i, output_simd[i], output_scalar[i]
            );
        }
    }

    #[test]
    fn test_transform_with_various_batch_sizes() {
        let mtx = test_matrix();
        for count in [1, 7, 8, 9, 15, 16, 17, 100] {
            let input: Vec<f32> = (0..count * 3).map(|i| i as f32 * 0.01).collect();
            let mut output = vec![Vec4::ZERO; count];
            transform_vertices(&mtx, &input, &mut output, VertexLayout::XYZ);

            for (i, v) in output.iter().enumerate() {
                let p = Vec4::new(input[i * 3], input[i * 3 + 1], input[i * 3 + 2], 1.0);
                let expected = mtx * p;
                assert!(v.is_finite(), "Invalid output at vertex {} with count {}: {:?}", i, count, v);
                assert!(
                    (*v - expected).abs().max_element() < 1e-3,
                    "vertex {i} with count {count}: {v:?} vs {expected:?}"
                );
            }
        }
    }

    #[test]
    fn test_strided_layout_reads_offsets() {
        // (pad, x, pad, y, z) per vertex
        let layout = VertexLayout { stride: 5, offset_y: 2, offset_zw: 3 };
        let input = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(vertex_count(&input, &layout), 2);
        assert_eq!(read_position(&input, 0, &layout), (1.0, 3.0, 4.0));
        assert_eq!(read_position(&input, 1, &layout), (6.0, 8.0, 9.0));
    }

    #[test]
    fn test_gather_fills_idle_lanes() {
        let vertices = [
            -1.0, -1.0, 0.0, 1.0, //
            1.0, -1.0, 0.0, 2.0, //
            0.0, 1.0, 0.0, 3.0,
        ];
        let indices = [0u32, 1, 2];
        let mut batch: TriangleBatch<4> = [[Vec4::ZERO; 3]; 4];
        gather_triangles(&vertices, &indices, 0, 1, None, &VertexLayout::XYZW, &mut batch);

        assert_eq!(batch[0][0], Vec4::new(-1.0, -1.0, 0.0, 1.0));
        assert_eq!(batch[0][2], Vec4::new(0.0, 1.0, 0.0, 3.0));
        for lane in 1..4 {
            assert_eq!(batch[lane], [IDLE_VERTEX; 3], "lane {lane} must hold the idle vertex");
        }
    }
}

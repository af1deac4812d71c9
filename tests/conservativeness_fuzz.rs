//! Seeded fuzzing of the culler's two guarantees:
//! - an occludee nearer than every occluder is always reported visible
//! - an occludee behind a fullscreen occluder is never reported visible

mod common;

use common::*;
use masked_occlusion::{BackfaceWinding, ClipPlanes, CullingConfig, CullingResult, OcclusionCuller, VertexLayout};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const WIDTH: u32 = 256;
const HEIGHT: u32 = 128;
const ITERATIONS: u64 = 24;

/// Random triangles with per-vertex clip depth in `w_range`, some of them
/// reaching past the screen edges.
fn random_occluders(rng: &mut ChaCha8Rng, count: usize, w_range: std::ops::Range<f32>) -> (Vec<f32>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(count * 12);
    for _ in 0..count * 3 {
        let w = rng.gen_range(w_range.clone());
        let x = rng.gen_range(-1.5f32..1.5);
        let y = rng.gen_range(-1.5f32..1.5);
        vertices.extend_from_slice(&[x * w, y * w, 0.0, w]);
    }
    let indices = (0..count as u32 * 3).collect();
    (vertices, indices)
}

fn render_double_sided<const L: usize>(culler: &mut OcclusionCuller<L>, (vertices, indices): &(Vec<f32>, Vec<u32>)) {
    culler.render_triangles(vertices, indices, None, BackfaceWinding::None, ClipPlanes::ALL, VertexLayout::XYZW);
}

/// NDC rectangle of at least 8x8 pixels, fully on screen.
fn random_rect(rng: &mut ChaCha8Rng) -> (f32, f32, f32, f32) {
    let min_w = 16.0 / WIDTH as f32;
    let min_h = 16.0 / HEIGHT as f32;
    let x0 = rng.gen_range(-1.0f32..0.6);
    let y0 = rng.gen_range(-1.0f32..0.6);
    let x1 = (x0 + rng.gen_range(min_w..0.4)).min(1.0);
    let y1 = (y0 + rng.gen_range(min_h..0.4)).min(1.0);
    (x0, y0, x1, y1)
}

fn configs() -> Vec<CullingConfig> {
    let mut configs = Vec::new();
    for quick_mask in [true, false] {
        for precise_coverage in [true, false] {
            configs.push(CullingConfig { quick_mask, precise_coverage, ..CullingConfig::default() });
        }
    }
    configs
}

fn check_nearer_occludees_are_visible<const L: usize>(config: CullingConfig, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut culler = culler::<L>(WIDTH, HEIGHT, config);
    render_double_sided(&mut culler, &random_occluders(&mut rng, 48, 2.0..8.0));

    for _ in 0..32 {
        let (x0, y0, x1, y1) = random_rect(&mut rng);
        let w = rng.gen_range(0.5f32..1.9);
        assert_eq!(
            culler.test_rect(x0, y0, x1, y1, w),
            CullingResult::Visible,
            "seed {} lanes {} {:?}: rect {:?} at w={} hidden by farther occluders",
            seed,
            L,
            config,
            (x0, y0, x1, y1),
            w
        );

        let (vertices, indices) = ndc_quad(x0, y0, x1, y1, w);
        assert_eq!(
            test(&culler, &vertices, &indices),
            CullingResult::Visible,
            "seed {} lanes {} {:?}: quad {:?} at w={} hidden by farther occluders",
            seed,
            L,
            config,
            (x0, y0, x1, y1),
            w
        );
    }
}

fn check_farther_occludees_are_hidden<const L: usize>(config: CullingConfig, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut culler = culler::<L>(WIDTH, HEIGHT, config);
    render_double_sided(&mut culler, &ndc_quad(-1.0, -1.0, 1.0, 1.0, 1.0));
    render_double_sided(&mut culler, &random_occluders(&mut rng, 32, 0.5..10.0));

    for _ in 0..32 {
        let x0 = rng.gen_range(-1.5f32..1.2);
        let y0 = rng.gen_range(-1.5f32..1.2);
        let (x1, y1) = (x0 + rng.gen_range(0.05f32..1.0), y0 + rng.gen_range(0.05f32..1.0));
        let w = rng.gen_range(1.1f32..10.0);
        assert_ne!(
            culler.test_rect(x0, y0, x1, y1, w),
            CullingResult::Visible,
            "seed {} lanes {} {:?}: rect {:?} at w={} leaks through the fullscreen occluder",
            seed,
            L,
            config,
            (x0, y0, x1, y1),
            w
        );

        let (vertices, indices) = ndc_quad(x0, y0, x1, y1, w);
        assert_ne!(
            test(&culler, &vertices, &indices),
            CullingResult::Visible,
            "seed {} lanes {} {:?}: quad {:?} at w={} leaks through the fullscreen occluder",
            seed,
            L,
            config,
            (x0, y0, x1, y1),
            w
        );
    }
}

#[test]
fn fuzz_nearer_occludees_are_visible() {
    init_logging();
    for config in configs() {
        for seed in 0..ITERATIONS {
            check_nearer_occludees_are_visible::<4>(config, seed);
            check_nearer_occludees_are_visible::<8>(config, seed);
            check_nearer_occludees_are_visible::<16>(config, seed);
        }
    }
}

#[test]
fn fuzz_farther_occludees_are_hidden() {
    init_logging();
    // Fast coverage samples pixel corners and can miss the screen border, so
    // only precise coverage closes the buffer with a single fullscreen quad
    for quick_mask in [true, false] {
        let config = CullingConfig { quick_mask, ..CullingConfig::default() };
        for seed in 0..ITERATIONS {
            check_farther_occludees_are_hidden::<4>(config, 100 + seed);
            check_farther_occludees_are_hidden::<8>(config, 100 + seed);
            check_farther_occludees_are_hidden::<16>(config, 100 + seed);
        }
    }
}

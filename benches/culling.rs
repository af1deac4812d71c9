/// Benchmark suite for the occlusion culler
/// Occluder rendering, occludee queries and binned parallel rendering.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use masked_occlusion::{
    BackfaceWinding, ClipPlanes, CullingConfig, Implementation, MaskedOcclusionCulling, TriList, VertexLayout,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;

/// Random occluder triangles at perspective depths, roughly a city block worth.
fn occluder_scene(count: usize) -> (Vec<f32>, Vec<u32>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut vertices = Vec::with_capacity(count * 12);
    for _ in 0..count {
        let cx = rng.gen_range(-1.2f32..1.2);
        let cy = rng.gen_range(-1.2f32..1.2);
        let size = rng.gen_range(0.02f32..0.3);
        for (dx, dy) in [(0.0, 0.0), (size, 0.0), (0.0, size)] {
            let w = rng.gen_range(1.0f32..50.0);
            vertices.extend_from_slice(&[(cx + dx) * w, (cy + dy) * w, 0.0, w]);
        }
    }
    let indices = (0..count as u32 * 3).collect();
    (vertices, indices)
}

fn new_culler(config: CullingConfig) -> MaskedOcclusionCulling {
    let mut moc = MaskedOcclusionCulling::with_config(Implementation::default(), config);
    moc.set_resolution(WIDTH, HEIGHT).expect("valid resolution");
    moc
}

fn bench_render_triangles(c: &mut Criterion) {
    let (vertices, indices) = occluder_scene(10_000);
    let mut group = c.benchmark_group("render_triangles");
    for (name, quick_mask) in [("quick", true), ("accurate", false)] {
        let mut moc = new_culler(CullingConfig { quick_mask, ..CullingConfig::default() });
        group.bench_function(name, |b| {
            b.iter(|| {
                moc.clear_buffer();
                moc.render_triangles(
                    black_box(&vertices),
                    black_box(&indices),
                    None,
                    BackfaceWinding::None,
                    ClipPlanes::ALL,
                    VertexLayout::XYZW,
                )
            });
        });
    }
    group.finish();
}

fn bench_test_rect(c: &mut Criterion) {
    let (vertices, indices) = occluder_scene(10_000);
    let mut moc = new_culler(CullingConfig::default());
    moc.render_triangles(&vertices, &indices, None, BackfaceWinding::None, ClipPlanes::ALL, VertexLayout::XYZW);

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let rects: Vec<_> = (0..1024)
        .map(|_| {
            let x = rng.gen_range(-1.0f32..0.9);
            let y = rng.gen_range(-1.0f32..0.9);
            (x, y, x + 0.1, y + 0.1, rng.gen_range(1.0f32..60.0))
        })
        .collect();

    c.bench_function("test_rect_1024", |b| {
        b.iter(|| {
            for &(x0, y0, x1, y1, w) in &rects {
                black_box(moc.test_rect(x0, y0, x1, y1, w));
            }
        });
    });
}

fn bench_binned_rendering(c: &mut Criterion) {
    let (vertices, indices) = occluder_scene(10_000);
    let mut group = c.benchmark_group("binned_rendering");
    for bins in [2u32, 4, 8] {
        let mut moc = new_culler(CullingConfig::default());
        let scissors = moc.bin_scissors(bins, bins);
        let mut lists = vec![TriList::with_capacity(indices.len() / 3); (bins * bins) as usize];

        group.bench_with_input(BenchmarkId::from_parameter(bins * bins), &bins, |b, &bins| {
            b.iter(|| {
                lists.iter_mut().for_each(TriList::clear);
                moc.clear_buffer();
                moc.bin_triangles(
                    black_box(&vertices),
                    black_box(&indices),
                    &mut lists,
                    bins,
                    bins,
                    None,
                    BackfaceWinding::None,
                    ClipPlanes::ALL,
                    VertexLayout::XYZW,
                );
                moc.render_trilists(&lists, &scissors).expect("scissors tile the screen");
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_render_triangles, bench_test_rect, bench_binned_rendering);
criterion_main!(benches);

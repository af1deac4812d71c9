/// Masked occlusion culler: renders occluders into the masked hierarchical
/// depth buffer and answers visibility queries against it.
///
/// Key Design Principles:
/// 1. One generic engine per lane width. `OcclusionCuller<L>` is written once
///    and instantiated for 4, 8 and 16 lanes; `MaskedOcclusionCulling` picks an
///    instantiation at runtime from the detected CPU features.
/// 2. Shared front end: occluders, occludees and binning all run the same
///    gather, clip, project and backface stages and differ only in what they
///    do with the surviving screen-space triangles.
/// 3. Queries are read-only: testing borrows the engine immutably, so the
///    depth buffer can never change while it is being queried.
use std::ops::ControlFlow;

use glam::Mat4;
use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::config::{
    BackfaceWinding, ClipPlanes, CullingConfig, CullingResult, ScissorRect, ScreenConvention, VertexLayout,
};
use crate::count_add;
use crate::cpu::Implementation;
use crate::error::OcclusionError;
use crate::perf::{CullingCounters, OcclusionCullingStatistics};
use crate::perf_scope;
use crate::rendering::binning::{self, split_into_bins, TriList};
use crate::rendering::clipping::{lane_mask, BatchAssembler, FrustumPlanes};
use crate::rendering::hiz_buffer::{tile_height_shift, HiZBuffer, TileStore, SUB_TILE_HEIGHT, SUB_TILE_WIDTH, TILE_WIDTH};
use crate::rendering::rasterizer::{rasterize_batch, test_rect_tiles, OccludeeTester, OccluderWriter};
use crate::rendering::simd_vertex::{TriangleBatch, IDLE_VERTEX};
use crate::rendering::triangle_setup::{bounding_box, fast_fp_bits, ScreenTriangle, Viewport};

/// Indexed triangle input shared by the render, test and bin paths.
#[derive(Clone, Copy)]
struct Geometry<'a> {
    vertices: &'a [f32],
    indices: &'a [u32],
    model_to_clip: Option<&'a Mat4>,
    winding: BackfaceWinding,
    clip_planes: ClipPlanes,
    layout: VertexLayout,
}

/// Resolution dependent state.
#[derive(Debug, Clone, Copy)]
struct ScreenState {
    width: u32,
    height: u32,
    tiles_width: i32,
    viewport: Viewport,
    planes: FrustumPlanes,
    full_scissor: ScissorRect,
}

impl ScreenState {
    fn new(width: u32, height: u32, lanes: usize, convention: ScreenConvention, near: f32) -> Self {
        let tile_height = 1i32 << tile_height_shift(lanes);
        let tiles_width = (width as i32 + TILE_WIDTH - 1) / TILE_WIDTH;
        let tiles_height = (height as i32 + tile_height - 1) / tile_height;
        let mut planes = FrustumPlanes::new(near);
        planes.set_resolution(width, height);
        Self {
            width,
            height,
            tiles_width,
            viewport: Viewport::new(width, height, convention),
            planes,
            full_scissor: ScissorRect::new(0, 0, tiles_width * TILE_WIDTH, tiles_height * tile_height),
        }
    }
}

/// Project the live lanes of `batch` and drop back faces. Returns the mask of
/// lanes that survived, with their triangles written to `out`.
fn project_batch<const L: usize>(
    batch: &TriangleBatch<L>,
    mut tri_mask: u32,
    viewport: &Viewport,
    precise: bool,
    winding: BackfaceWinding,
    out: &mut [ScreenTriangle; L],
) -> u32 {
    let mut survivors = 0u32;
    while tri_mask != 0 {
        let lane = tri_mask.trailing_zeros() as usize;
        tri_mask &= tri_mask - 1;

        let mut tri = ScreenTriangle::project(&batch[lane], viewport, precise);
        if tri.cull_backface(winding) {
            out[lane] = tri;
            survivors |= 1 << lane;
        }
    }
    survivors
}

/// Run the front end over `geometry`, handing every batch with at least one
/// front-facing triangle to `emit`. `emit` may stop the walk early.
fn for_each_batch<const L: usize>(
    screen: &ScreenState,
    config: &CullingConfig,
    geometry: &Geometry<'_>,
    mut emit: impl FnMut(&[ScreenTriangle; L], u32) -> ControlFlow<()>,
) {
    let mut assembler = BatchAssembler::<L>::new(
        geometry.vertices,
        geometry.indices,
        geometry.model_to_clip,
        geometry.layout,
        geometry.clip_planes,
        screen.planes,
        config.clipping_preserves_order,
    );
    let mut batch: TriangleBatch<L> = [[IDLE_VERTEX; 3]; L];
    let mut screen_tris = [ScreenTriangle::default(); L];

    while let Some(tri_mask) = assembler.next_batch(&mut batch) {
        if tri_mask == 0 {
            continue;
        }
        let tri_mask = project_batch(
            &batch,
            tri_mask,
            &screen.viewport,
            config.precise_coverage,
            geometry.winding,
            &mut screen_tris,
        );
        if tri_mask == 0 {
            continue;
        }
        if emit(&screen_tris, tri_mask).is_break() {
            return;
        }
    }
}

/// Rasterize one bin's triangle list into `store`, restricted to `scissor`.
fn rasterize_trilist<const L: usize, S: TileStore<L>>(
    store: &mut S,
    trilist: &TriList,
    scissor: &ScissorRect,
    screen: &ScreenState,
    config: &CullingConfig,
    counters: &CullingCounters,
) {
    let precise = config.precise_coverage;
    let mut writer = OccluderWriter::<S, L>::new(store, config.quick_mask, counters);
    let mut tris = [ScreenTriangle::default(); L];
    for chunk in trilist.triangles().chunks(L) {
        for (dst, src) in tris.iter_mut().zip(chunk) {
            *dst = ScreenTriangle::from_binned(src, precise);
        }
        rasterize_batch(
            &mut writer,
            &tris,
            lane_mask(chunk.len()),
            scissor,
            screen.tiles_width,
            screen.width,
            precise,
        );
    }
}

/// Occlusion culling engine for `L` lanes: `L` triangles per batch and
/// 32x`L` pixel tiles.
#[derive(Debug)]
pub struct OcclusionCuller<const L: usize> {
    config: CullingConfig,
    buffer: HiZBuffer<L>,
    screen: ScreenState,
    counters: CullingCounters,
}

impl<const L: usize> OcclusionCuller<L> {
    const SUPPORTED_LANES: () = assert!(L == 4 || L == 8 || L == 16, "lane width must be 4, 8 or 16");

    /// Create an engine with no resolution; call `set_resolution` before rendering.
    pub fn new(config: CullingConfig) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SUPPORTED_LANES;
        Self {
            config,
            buffer: HiZBuffer::new(0, 0, config.quick_mask),
            screen: ScreenState::new(0, 0, L, config.screen_convention, 0.0),
            counters: CullingCounters::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    /// Resize the depth buffer. The width must be a multiple of 8 and the
    /// height a multiple of 4; the buffer is left cleared.
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), OcclusionError> {
        let valid = width > 0
            && height > 0
            && width % SUB_TILE_WIDTH as u32 == 0
            && height % SUB_TILE_HEIGHT as u32 == 0;
        if !valid {
            return Err(OcclusionError::InvalidResolution { width, height });
        }

        if !self.config.precise_coverage {
            // Horizontal edge slopes in fixed point must fit in 31 bits
            let limit = ((1u64 << 31) - 1) / ((1u64 << fast_fp_bits(L)) * (L as u64 + 2)) - 4;
            if width as u64 >= limit {
                warn!("width {} may overflow fast coverage edge setup (limit {})", width, limit);
            }
        }

        self.buffer = HiZBuffer::new(width, height, self.config.quick_mask);
        self.screen = ScreenState::new(width, height, L, self.config.screen_convention, self.screen.planes.near());
        debug!(
            "resolution {}x{}: {}x{} tiles of 32x{}",
            width,
            height,
            self.buffer.tiles_width(),
            self.buffer.tiles_height(),
            L
        );
        Ok(())
    }

    #[inline]
    pub fn resolution(&self) -> (u32, u32) {
        (self.screen.width, self.screen.height)
    }

    /// Geometry is clipped to `w >= near`.
    pub fn set_near_clip_plane(&mut self, near: f32) {
        self.screen.planes.set_near(near);
    }

    #[inline]
    pub fn near_clip_plane(&self) -> f32 {
        self.screen.planes.near()
    }

    pub fn compute_bin_width_height(&self, bins_w: u32, bins_h: u32) -> (u32, u32) {
        binning::bin_width_height::<L>(self.screen.width, self.screen.height, bins_w, bins_h)
    }

    pub fn bin_scissors(&self, bins_w: u32, bins_h: u32) -> Vec<ScissorRect> {
        binning::bin_scissors::<L>(self.screen.width, self.screen.height, bins_w, bins_h)
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    #[inline]
    pub fn buffer(&self) -> &HiZBuffer<L> {
        &self.buffer
    }

    /// Render occluder triangles. Returns `Visible` if any triangle reached
    /// rasterization, `ViewCulled` if all were clipped or culled.
    #[allow(clippy::too_many_arguments)]
    pub fn render_triangles(
        &mut self,
        vertices: &[f32],
        indices: &[u32],
        model_to_clip: Option<&Mat4>,
        winding: BackfaceWinding,
        clip_planes: ClipPlanes,
        layout: VertexLayout,
    ) -> CullingResult {
        count_add!(self.counters.occluder_processed_triangles, indices.len() / 3);
        let geometry = Geometry { vertices, indices, model_to_clip, winding, clip_planes, layout };
        let screen = &self.screen;
        let precise = self.config.precise_coverage;
        let mut writer = OccluderWriter::<_, L>::new(&mut self.buffer, self.config.quick_mask, &self.counters);

        let mut result = CullingResult::ViewCulled;
        for_each_batch::<L>(screen, &self.config, &geometry, |tris, tri_mask| {
            let batch_result = rasterize_batch(
                &mut writer,
                tris,
                tri_mask,
                &screen.full_scissor,
                screen.tiles_width,
                screen.width,
                precise,
            );
            result = result.combine(batch_result);
            ControlFlow::Continue(())
        });
        result
    }

    /// Test occludee triangles against the depth buffer without modifying it.
    #[allow(clippy::too_many_arguments)]
    pub fn test_triangles(
        &self,
        vertices: &[f32],
        indices: &[u32],
        model_to_clip: Option<&Mat4>,
        winding: BackfaceWinding,
        clip_planes: ClipPlanes,
        layout: VertexLayout,
    ) -> CullingResult {
        count_add!(self.counters.occludee_processed_triangles, indices.len() / 3);
        let geometry = Geometry { vertices, indices, model_to_clip, winding, clip_planes, layout };
        let screen = &self.screen;
        let precise = self.config.precise_coverage;
        let mut tester = OccludeeTester::new(&self.buffer, &self.counters);

        let mut result = CullingResult::ViewCulled;
        for_each_batch::<L>(screen, &self.config, &geometry, |tris, tri_mask| {
            let batch_result = rasterize_batch(
                &mut tester,
                tris,
                tri_mask,
                &screen.full_scissor,
                screen.tiles_width,
                screen.width,
                precise,
            );
            result = result.combine(batch_result);
            if result == CullingResult::Visible {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        result
    }

    /// Test an NDC rectangle whose nearest point has clip-space depth `w_min`.
    pub fn test_rect(&self, x_min: f32, y_min: f32, x_max: f32, y_max: f32, w_min: f32) -> CullingResult {
        count_add!(self.counters.occludee_processed_rectangles, 1);
        let screen = &self.screen;
        if self.buffer.tiles().is_empty() {
            return CullingResult::ViewCulled;
        }

        let vp = &screen.viewport;
        // Direct3D flips y, so the top of the rectangle maps to the smaller row
        let (y_lo, y_hi) = match vp.convention {
            ScreenConvention::Direct3D => (y_max, y_min),
            ScreenConvention::OpenGl => (y_min, y_max),
        };
        let px_min = x_min.mul_add(vp.half_width, vp.center_x);
        let px_max = x_max.mul_add(vp.half_width, vp.center_x);
        let py_min = y_lo.mul_add(vp.half_height, vp.center_y);
        let py_max = y_hi.mul_add(vp.half_height, vp.center_y);
        if px_max < 0.0 || py_max < 0.0 || px_min >= screen.width as f32 || py_min >= screen.height as f32 {
            return CullingResult::ViewCulled;
        }

        let clamp = |v: f32, size: u32| (v as i32).clamp(0, size as i32 - 1);
        let pixel_bbox = (
            clamp(px_min, screen.width),
            clamp(py_min, screen.height),
            clamp(px_max, screen.width),
            clamp(py_max, screen.height),
        );
        test_rect_tiles(&self.buffer, &self.counters, pixel_bbox, 1.0 / w_min)
    }

    /// Transform, clip and backface cull occluders and append the surviving
    /// screen-space triangles to every bin of the `bins_w` x `bins_h` grid
    /// they overlap. Bin `(x, y)` is `trilists[y * bins_w + x]`.
    #[allow(clippy::too_many_arguments)]
    pub fn bin_triangles(
        &self,
        vertices: &[f32],
        indices: &[u32],
        trilists: &mut [TriList],
        bins_w: u32,
        bins_h: u32,
        model_to_clip: Option<&Mat4>,
        winding: BackfaceWinding,
        clip_planes: ClipPlanes,
        layout: VertexLayout,
    ) {
        perf_scope!("bin_triangles");
        let (bins_w, bins_h) = (bins_w.max(1), bins_h.max(1));
        assert!(
            trilists.len() >= (bins_w * bins_h) as usize,
            "{} triangle lists supplied for {}x{} bins",
            trilists.len(),
            bins_w,
            bins_h
        );
        count_add!(self.counters.occluder_processed_triangles, indices.len() / 3);

        let geometry = Geometry { vertices, indices, model_to_clip, winding, clip_planes, layout };
        let screen = &self.screen;
        let (bin_width, bin_height) = self.compute_bin_width_height(bins_w, bins_h);

        for_each_batch::<L>(screen, &self.config, &geometry, |tris, mut tri_mask| {
            while tri_mask != 0 {
                let lane = tri_mask.trailing_zeros() as usize;
                tri_mask &= tri_mask - 1;

                let tri = &tris[lane];
                let (min_x, min_y, max_x, max_y) = bounding_box::<L>(tri, &screen.full_scissor);
                let (start_x, end_x) = binning::bin_range(min_x, max_x, bin_width, bins_w);
                let (start_y, end_y) = binning::bin_range(min_y, max_y, bin_height, bins_h);
                let binned = [0, 1, 2].map(|i| [tri.x[i], tri.y[i], tri.z[i]]);
                for y in start_y..end_y {
                    for x in start_x..end_x {
                        trilists[(y * bins_w + x) as usize].push(binned);
                    }
                }
            }
            ControlFlow::Continue(())
        });
    }

    /// Render one bin's triangles inside `scissor`, which must be aligned to
    /// the tile grid.
    pub fn render_trilist(&mut self, trilist: &TriList, scissor: &ScissorRect) {
        debug_assert!(
            binning::validate_scissor::<L>(scissor, self.buffer.tiles_width(), self.buffer.tiles_height()).is_ok(),
            "scissor {:?} is not aligned to the tile grid",
            scissor
        );
        let full = &self.screen.full_scissor;
        let scissor = ScissorRect::new(
            scissor.min_x.max(full.min_x),
            scissor.min_y.max(full.min_y),
            scissor.max_x.min(full.max_x),
            scissor.max_y.min(full.max_y),
        );
        rasterize_trilist(&mut self.buffer, trilist, &scissor, &self.screen, &self.config, &self.counters);
    }

    /// Render every bin in parallel. `trilists[i]` is rendered inside
    /// `scissors[i]`; scissors must be tile aligned and must not share tiles.
    pub fn render_trilists(&mut self, trilists: &[TriList], scissors: &[ScissorRect]) -> Result<(), OcclusionError> {
        perf_scope!("render_trilists");
        if trilists.len() != scissors.len() {
            return Err(OcclusionError::BinCountMismatch { trilists: trilists.len(), scissors: scissors.len() });
        }

        let bins = split_into_bins(&mut self.buffer, scissors)?;
        let screen = &self.screen;
        let config = &self.config;
        let counters = &self.counters;

        // Each worker owns a disjoint view, so no tile is written twice
        bins.into_par_iter()
            .zip(trilists.par_iter())
            .zip(scissors.par_iter())
            .for_each(|((mut bin, trilist), scissor)| {
                rasterize_trilist(&mut bin, trilist, scissor, screen, config, counters);
            });

        trace!(
            "rendered {} bins, {} binned triangles",
            trilists.len(),
            trilists.iter().map(TriList::len).sum::<usize>()
        );
        Ok(())
    }

    /// Merge `other`'s depth buffer into this one. Both engines must share a
    /// resolution and merge heuristic.
    pub fn merge_buffer(&mut self, other: &OcclusionCuller<L>) -> Result<(), OcclusionError> {
        if self.resolution() != other.resolution() {
            let ((width, height), (other_width, other_height)) = (self.resolution(), other.resolution());
            return Err(OcclusionError::ResolutionMismatch { width, height, other_width, other_height });
        }
        if self.config.quick_mask != other.config.quick_mask {
            return Err(OcclusionError::ImplementationMismatch);
        }

        let merged = self.buffer.merge_from(&other.buffer);
        count_add!(self.counters.occluder_tiles_merged, merged);
        trace!("merged {} tiles ({} merge steps)", self.buffer.tiles().len(), merged);
        Ok(())
    }

    /// Write one depth per pixel into `out`, row-major. `flip_y` stores row 0 last.
    pub fn compute_pixel_depth_buffer(&self, out: &mut [f32], flip_y: bool) {
        self.buffer.compute_pixel_depth_buffer(out, flip_y);
    }

    pub fn pixel_depth_buffer(&self, flip_y: bool) -> Vec<f32> {
        let (w, h) = self.resolution();
        let mut out = vec![0.0; w as usize * h as usize];
        self.compute_pixel_depth_buffer(&mut out, flip_y);
        out
    }

    pub fn statistics(&self) -> OcclusionCullingStatistics {
        self.counters.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.counters.reset();
    }
}

/// The culler instantiated for the selected lane width.
#[derive(Debug)]
enum Engine {
    Lanes4(OcclusionCuller<4>),
    Lanes8(OcclusionCuller<8>),
    Lanes16(OcclusionCuller<16>),
}

macro_rules! dispatch {
    ($engine:expr, $culler:ident => $body:expr) => {
        match $engine {
            Engine::Lanes4($culler) => $body,
            Engine::Lanes8($culler) => $body,
            Engine::Lanes16($culler) => $body,
        }
    };
}

/// Runtime-dispatched masked occlusion culler.
///
/// Created for the best instruction set the CPU supports, never exceeding
/// the requested one. Dropping the handle releases all storage.
#[derive(Debug)]
pub struct MaskedOcclusionCulling {
    implementation: Implementation,
    engine: Engine,
}

impl MaskedOcclusionCulling {
    pub fn new(requested: Implementation) -> Self {
        Self::with_config(requested, CullingConfig::default())
    }

    pub fn with_config(requested: Implementation, config: CullingConfig) -> Self {
        let implementation = Implementation::select(requested);
        let engine = match implementation.lanes() {
            4 => Engine::Lanes4(OcclusionCuller::new(config)),
            8 => Engine::Lanes8(OcclusionCuller::new(config)),
            _ => Engine::Lanes16(OcclusionCuller::new(config)),
        };
        debug!("masked occlusion culling using {:?} ({} lanes), {:?}", implementation, implementation.lanes(), config);
        Self { implementation, engine }
    }

    /// Instruction set actually selected.
    #[inline]
    pub fn implementation(&self) -> Implementation {
        self.implementation
    }

    /// Triangles per batch, also the tile height in pixels.
    #[inline]
    pub fn lanes(&self) -> usize {
        self.implementation.lanes()
    }

    pub fn config(&self) -> &CullingConfig {
        dispatch!(&self.engine, c => c.config())
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), OcclusionError> {
        dispatch!(&mut self.engine, c => c.set_resolution(width, height))
    }

    pub fn resolution(&self) -> (u32, u32) {
        dispatch!(&self.engine, c => c.resolution())
    }

    pub fn set_near_clip_plane(&mut self, near: f32) {
        dispatch!(&mut self.engine, c => c.set_near_clip_plane(near))
    }

    pub fn near_clip_plane(&self) -> f32 {
        dispatch!(&self.engine, c => c.near_clip_plane())
    }

    pub fn compute_bin_width_height(&self, bins_w: u32, bins_h: u32) -> (u32, u32) {
        dispatch!(&self.engine, c => c.compute_bin_width_height(bins_w, bins_h))
    }

    pub fn bin_scissors(&self, bins_w: u32, bins_h: u32) -> Vec<ScissorRect> {
        dispatch!(&self.engine, c => c.bin_scissors(bins_w, bins_h))
    }

    pub fn clear_buffer(&mut self) {
        dispatch!(&mut self.engine, c => c.clear_buffer())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render_triangles(
        &mut self,
        vertices: &[f32],
        indices: &[u32],
        model_to_clip: Option<&Mat4>,
        winding: BackfaceWinding,
        clip_planes: ClipPlanes,
        layout: VertexLayout,
    ) -> CullingResult {
        dispatch!(&mut self.engine, c => c.render_triangles(vertices, indices, model_to_clip, winding, clip_planes, layout))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn test_triangles(
        &self,
        vertices: &[f32],
        indices: &[u32],
        model_to_clip: Option<&Mat4>,
        winding: BackfaceWinding,
        clip_planes: ClipPlanes,
        layout: VertexLayout,
    ) -> CullingResult {
        dispatch!(&self.engine, c => c.test_triangles(vertices, indices, model_to_clip, winding, clip_planes, layout))
    }

    pub fn test_rect(&self, x_min: f32, y_min: f32, x_max: f32, y_max: f32, w_min: f32) -> CullingResult {
        dispatch!(&self.engine, c => c.test_rect(x_min, y_min, x_max, y_max, w_min))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn bin_triangles(
        &self,
        vertices: &[f32],
        indices: &[u32],
        trilists: &mut [TriList],
        bins_w: u32,
        bins_h: u32,
        model_to_clip: Option<&Mat4>,
        winding: BackfaceWinding,
        clip_planes: ClipPlanes,
        layout: VertexLayout,
    ) {
        dispatch!(&self.engine, c => c.bin_triangles(
            vertices, indices, trilists, bins_w, bins_h, model_to_clip, winding, clip_planes, layout
        ))
    }

    pub fn render_trilist(&mut self, trilist: &TriList, scissor: &ScissorRect) {
        dispatch!(&mut self.engine, c => c.render_trilist(trilist, scissor))
    }

    pub fn render_trilists(&mut self, trilists: &[TriList], scissors: &[ScissorRect]) -> Result<(), OcclusionError> {
        dispatch!(&mut self.engine, c => c.render_trilists(trilists, scissors))
    }

    /// Merge another culler's buffer into this one. Both must use the same
    /// lane width, merge heuristic and resolution.
    pub fn merge_buffer(&mut self, other: &MaskedOcclusionCulling) -> Result<(), OcclusionError> {
        match (&mut self.engine, &other.engine) {
            (Engine::Lanes4(a), Engine::Lanes4(b)) => a.merge_buffer(b),
            (Engine::Lanes8(a), Engine::Lanes8(b)) => a.merge_buffer(b),
            (Engine::Lanes16(a), Engine::Lanes16(b)) => a.merge_buffer(b),
            _ => Err(OcclusionError::ImplementationMismatch),
        }
    }

    pub fn compute_pixel_depth_buffer(&self, out: &mut [f32], flip_y: bool) {
        dispatch!(&self.engine, c => c.compute_pixel_depth_buffer(out, flip_y))
    }

    pub fn pixel_depth_buffer(&self, flip_y: bool) -> Vec<f32> {
        dispatch!(&self.engine, c => c.pixel_depth_buffer(flip_y))
    }

    pub fn statistics(&self) -> OcclusionCullingStatistics {
        dispatch!(&self.engine, c => c.statistics())
    }

    pub fn reset_statistics(&self) {
        dispatch!(&self.engine, c => c.reset_statistics())
    }
}

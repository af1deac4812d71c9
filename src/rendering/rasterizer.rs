/// Tile-based coverage rasterizer for the masked hierarchical depth buffer
/// Walks the bounding box of each triangle one 32xN tile at a time, building
/// a coverage mask per tile from the edge events of its scanlines
use crate::config::{CullingResult, ScissorRect};
use crate::count_add;
use crate::perf::CullingCounters;
use crate::rendering::hiz_buffer::{
    sub_tile_col_offset, sub_tile_row_offset, tile_height_shift, HiZBuffer, TileStore, SUB_TILE_HEIGHT,
    SUB_TILE_WIDTH, TILE_WIDTH, TILE_WIDTH_SHIFT,
};
use crate::rendering::triangle_setup::{
    fp_bits, setup_triangle, TriangleSetup, ScreenTriangle, BIG_TRIANGLE, PRECISE_FP_BITS, PRECISE_FP_HALF_PIXEL,
};

/// Destination of rasterized coverage: either the depth buffer being written
/// by occluders, or a read-only view used by occlusion queries.
pub trait TileTarget<const L: usize> {
    /// Occlusion queries stop at the first visible tile and never write.
    const TEST_Z: bool;

    fn counters(&self) -> &CullingCounters;

    /// Conservative farthest depth of each subtile of tile `tile_idx`.
    fn coarse_z_min(&self, tile_idx: usize) -> [f32; L];

    /// Handle the coverage of one tile. `coverage` holds one 8x4 mask per
    /// subtile and `z_plane` the interpolated triangle depth at each subtile.
    /// Returns `true` when the triangle is proven visible.
    fn visit(
        &mut self,
        tile_idx: usize,
        coverage: &[u32; L],
        z_plane: &[f32; L],
        z_buffer: &[f32; L],
        z_tri_min: f32,
        z_tri_max: f32,
    ) -> bool;
}

/// Writes occluder coverage into any tile store.
pub struct OccluderWriter<'a, S, const L: usize> {
    store: &'a mut S,
    quick_mask: bool,
    counters: &'a CullingCounters,
}

impl<'a, S: TileStore<L>, const L: usize> OccluderWriter<'a, S, L> {
    pub fn new(store: &'a mut S, quick_mask: bool, counters: &'a CullingCounters) -> Self {
        Self { store, quick_mask, counters }
    }
}

impl<'a, S: TileStore<L>, const L: usize> TileTarget<L> for OccluderWriter<'a, S, L> {
    const TEST_Z: bool = false;

    #[inline]
    fn counters(&self) -> &CullingCounters {
        self.counters
    }

    #[inline]
    fn coarse_z_min(&self, tile_idx: usize) -> [f32; L] {
        self.store.tile(tile_idx).coarse_z_min(self.quick_mask)
    }

    #[inline]
    fn visit(
        &mut self,
        tile_idx: usize,
        coverage: &[u32; L],
        z_plane: &[f32; L],
        _z_buffer: &[f32; L],
        z_tri_min: f32,
        _z_tri_max: f32,
    ) -> bool {
        // Farthest depth of the triangle inside each subtile
        let z_sub_tile_min = z_plane.map(|z| z.max(z_tri_min));
        let tile = self.store.tile_mut(tile_idx);
        if self.quick_mask {
            tile.update_quick(coverage, &z_sub_tile_min);
            count_add!(self.counters.occluder_tiles_updated, 1);
        } else if tile.update_accurate(coverage, &z_sub_tile_min) {
            count_add!(self.counters.occluder_tiles_updated, 1);
        }
        false
    }
}

/// Tests occludee coverage against a read-only depth buffer.
pub struct OccludeeTester<'a, const L: usize> {
    buffer: &'a HiZBuffer<L>,
    counters: &'a CullingCounters,
}

impl<'a, const L: usize> OccludeeTester<'a, L> {
    pub fn new(buffer: &'a HiZBuffer<L>, counters: &'a CullingCounters) -> Self {
        Self { buffer, counters }
    }
}

impl<'a, const L: usize> TileTarget<L> for OccludeeTester<'a, L> {
    const TEST_Z: bool = true;

    #[inline]
    fn counters(&self) -> &CullingCounters {
        self.counters
    }

    #[inline]
    fn coarse_z_min(&self, tile_idx: usize) -> [f32; L] {
        self.buffer.tile(tile_idx).coarse_z_min(self.buffer.quick_mask())
    }

    #[inline]
    fn visit(
        &mut self,
        _tile_idx: usize,
        coverage: &[u32; L],
        z_plane: &[f32; L],
        z_buffer: &[f32; L],
        _z_tri_min: f32,
        z_tri_max: f32,
    ) -> bool {
        // Nearest depth of the triangle inside each covered subtile
        (0..L).any(|s| coverage[s] != 0 && z_plane[s].min(z_tri_max) >= z_buffer[s])
    }
}

/// `!0 << shift`, zero once the shift passes the tile width.
#[inline]
fn ones_shl(shift: i32) -> u32 {
    if shift >= 32 {
        0
    } else {
        !0u32 << shift
    }
}

/// Convert one 32-bit coverage row per scanline into one 8x4 mask per subtile,
/// bit `py * 8 + px`.
#[inline]
pub fn transpose_coverage<const L: usize>(rows: &[u32; L]) -> [u32; L] {
    let mut out = [0u32; L];
    for (s, mask) in out.iter_mut().enumerate() {
        let stx = (s % 4) as u32;
        let sty = s / 4;
        for py in 0..4 {
            let byte = (rows[sty * 4 + py] >> (8 * stx)) & 0xff;
            *mask |= byte << (8 * py);
        }
    }
    out
}

/// Per-scanline edge events of the current tile row, one lane per scanline.
struct EdgeWalker<const L: usize> {
    events: [[i32; L]; 3],
    remainders: [[i32; L]; 3],
    setup: TriangleSetup,
    precise: bool,
}

impl<const L: usize> EdgeWalker<L> {
    fn new(setup: &TriangleSetup, precise: bool) -> Self {
        let mut events = [[0i32; L]; 3];
        let mut remainders = [[0i32; L]; 3];
        for (i, edge) in setup.edges.iter().enumerate() {
            for r in 0..L {
                if precise {
                    // Sample at the scanline center
                    let y_coord = ((r as i32) << PRECISE_FP_BITS) + PRECISE_FP_HALF_PIXEL;
                    let scanline_delta = (edge.slope * y_coord as f32) as i32;
                    let scanline_remainder = edge
                        .abs_edge_x
                        .wrapping_mul(y_coord)
                        .wrapping_sub(scanline_delta.wrapping_abs().wrapping_mul(edge.edge_y));
                    let mut remainder = edge.event_start_remainder.wrapping_sub(scanline_remainder);
                    let overflow = remainder >> 31;
                    remainder = remainder.wrapping_add(overflow & edge.edge_y);
                    remainders[i][r] = remainder;
                    events[i][r] = edge
                        .event_start
                        .wrapping_add(scanline_delta)
                        .wrapping_add(overflow & edge.slope_sign);
                } else {
                    events[i][r] = edge.event_start.wrapping_add((r as i32).wrapping_mul(edge.slope_fp));
                }
            }
        }
        Self { events, remainders, setup: *setup, precise }
    }

    /// Advance edge `i` by one tile row.
    #[inline]
    fn step(&mut self, i: usize) {
        let edge = &self.setup.edges[i];
        if self.precise {
            for r in 0..L {
                let mut remainder = self.remainders[i][r].wrapping_sub(edge.slope_tile_remainder);
                let overflow = remainder >> 31;
                remainder = remainder.wrapping_add(overflow & edge.edge_y);
                self.remainders[i][r] = remainder;
                self.events[i][r] = self.events[i][r]
                    .wrapping_add(edge.slope_tile_delta)
                    .wrapping_add(overflow & edge.slope_sign);
            }
        } else {
            for event in self.events[i].iter_mut() {
                *event = event.wrapping_add(edge.slope_tile_delta);
            }
        }
    }
}

/// Which edges bound a scanline of tiles: pixels are covered right of every
/// left edge and left of every right edge.
#[derive(Clone, Copy)]
struct SpanEdges<'e> {
    right: &'e [usize],
    left: &'e [usize],
}

/// Walk tiles `[left_offset, right_offset)` of the tile row starting at
/// `row_idx`. Returns `true` when an occlusion query found a visible tile.
#[allow(clippy::too_many_arguments)]
fn traverse_scanline<const L: usize, T: TileTarget<L>>(
    target: &mut T,
    walker: &EdgeWalker<L>,
    span: SpanEdges<'_>,
    left_offset: i32,
    right_offset: i32,
    row_idx: i32,
    z_row: &[f32; L],
    fp: u32,
) -> bool {
    let setup = &walker.setup;
    let event_offset = left_offset << TILE_WIDTH_SHIFT;

    // Edge events as pixel offsets from the first traversed tile
    let to_pixels = |e: usize| walker.events[e].map(|ev| ((ev >> fp) - event_offset).max(0));
    let mut right = [[0i32; L]; 2];
    let mut left = [[0i32; L]; 2];
    for (k, &e) in span.right.iter().enumerate() {
        right[k] = to_pixels(e);
    }
    for (k, &e) in span.left.iter().enumerate() {
        left[k] = to_pixels(e);
    }
    let (right, left) = (&mut right[..span.right.len()], &mut left[..span.left.len()]);

    let mut z0 = z_row.map(|z| z + setup.z_tile_dx * left_offset as f32);
    let tile_idx_end = row_idx + right_offset;
    let mut tile_idx = row_idx + left_offset;
    loop {
        if T::TEST_Z {
            count_add!(target.counters().occludee_tiles_traversed, 1);
        } else {
            count_add!(target.counters().occluder_tiles_traversed, 1);
        }

        let z_min_buf = target.coarse_z_min(tile_idx as usize);
        // Skip tiles where the whole triangle lies behind the buffer
        let occluded = (0..L).all(|s| (setup.z_max - z_min_buf[s]).is_sign_negative());
        if !occluded {
            let mut rows = [0u32; L];
            for (r, row) in rows.iter_mut().enumerate() {
                let mut mask = !0u32;
                for l in left.iter() {
                    mask &= ones_shl(l[r]);
                }
                for rt in right.iter() {
                    mask &= !ones_shl(rt[r]);
                }
                *row = mask;
            }
            let coverage = transpose_coverage(&rows);
            if target.visit(tile_idx as usize, &coverage, &z0, &z_min_buf, setup.z_min, setup.z_max) {
                return true;
            }
        }

        tile_idx += 1;
        if tile_idx >= tile_idx_end {
            break;
        }
        for z in z0.iter_mut() {
            *z += setup.z_tile_dx;
        }
        for lane in right.iter_mut().chain(left.iter_mut()) {
            for v in lane.iter_mut() {
                *v = (*v - TILE_WIDTH).max(0);
            }
        }
    }
    false
}

/// Rasterize one set-up triangle. Occlusion queries return `Visible` as soon
/// as one subtile passes, otherwise `Occluded`; occluders return `Visible`.
pub fn rasterize_triangle<const L: usize, T: TileTarget<L>>(
    target: &mut T,
    setup: &TriangleSetup,
    tiles_width: i32,
    precise: bool,
) -> CullingResult {
    if T::TEST_Z {
        count_add!(target.counters().occludee_rasterized_triangles, 1);
    } else {
        count_add!(target.counters().occluder_rasterized_triangles, 1);
    }

    let fp = fp_bits(L, precise);
    let (left_bias, right_bias) = if precise { (-1, 1) } else { (0, 0) };
    let mid_right = setup.mid_vtx_right;
    let mid = mid_right as usize;
    let bb_width = setup.bb_width;
    let done = if T::TEST_Z { CullingResult::Occluded } else { CullingResult::Visible };

    let mut walker = EdgeWalker::<L>::new(setup, precise);
    let mut z0 = [0.0f32; L];
    for (s, z) in z0.iter_mut().enumerate() {
        *z = setup.z_pixel_dx.mul_add(
            sub_tile_col_offset(s) as f32,
            setup.z_pixel_dy.mul_add(sub_tile_row_offset(s) as f32, setup.z_plane_offset),
        );
    }
    let advance_z = |z0: &mut [f32; L]| z0.iter_mut().for_each(|z| *z += setup.z_tile_dy);

    // Big triangles track the first and last tile of each row
    let tight = bb_width > BIG_TRIANGLE && setup.bb_height > BIG_TRIANGLE;
    let e = &setup.edges;
    let mut start_delta = e[2].slope_tile_delta.wrapping_add(left_bias);
    let mut end_delta = e[0].slope_tile_delta.wrapping_add(right_bias);
    let top_delta = e[1].slope_tile_delta.wrapping_add(if mid_right { right_bias } else { left_bias });
    let tile_fp_width = TILE_WIDTH << fp;
    let mut start_event = e[2].event_start.wrapping_add(start_delta.min(0));
    let mut end_event = e[0].event_start.wrapping_add(end_delta.max(0)).wrapping_add(tile_fp_width);
    let top_event = if mid_right {
        e[1].event_start.wrapping_add(top_delta.max(0)).wrapping_add(tile_fp_width)
    } else {
        e[1].event_start.wrapping_add(top_delta.min(0))
    };

    let shift = TILE_WIDTH_SHIFT + fp;
    let span_of = |start_event: i32, end_event: i32| -> (i32, i32) {
        if tight {
            ((start_event >> shift).min(bb_width - 1).max(0), bb_width.min(end_event >> shift))
        } else {
            (0, bb_width)
        }
    };

    let bottom = SpanEdges { right: &[0], left: &[2] };
    let top_edges = [mid, mid + 1];
    let top = SpanEdges { right: &top_edges[..1], left: &top_edges[1..] };

    let mut row_idx = setup.tile_row_idx;
    let end_row_idx = setup.tile_end_row_idx;

    if row_idx <= setup.tile_mid_row_idx {
        // Bottom half, bounded by edges 0 and 2
        let stop_idx = end_row_idx.min(setup.tile_mid_row_idx);
        while row_idx < stop_idx {
            let (start, end) = span_of(start_event, end_event);
            start_event = start_event.wrapping_add(start_delta);
            end_event = end_event.wrapping_add(end_delta);

            if traverse_scanline(target, &walker, bottom, start, end, row_idx, &z0, fp) {
                return CullingResult::Visible;
            }

            row_idx += tiles_width;
            advance_z(&mut z0);
            walker.step(0);
            walker.step(2);
        }

        // Middle row, all three edges matter
        if row_idx < end_row_idx {
            let (start, end) = span_of(start_event, end_event);
            if tight {
                if mid_right {
                    end_event = top_event;
                    end_delta = top_delta;
                } else {
                    start_event = top_event;
                    start_delta = top_delta;
                }
                start_event = start_event.wrapping_add(start_delta);
                end_event = end_event.wrapping_add(end_delta);
            }

            let middle = if mid_right {
                SpanEdges { right: &[0, 1], left: &[2] }
            } else {
                SpanEdges { right: &[0], left: &[2, 1] }
            };
            if traverse_scanline(target, &walker, middle, start, end, row_idx, &z0, fp) {
                return CullingResult::Visible;
            }
            row_idx += tiles_width;
        }

        // Top half, bounded by the edge from the middle vertex
        if row_idx < end_row_idx {
            advance_z(&mut z0);
            walker.step(mid);
            walker.step(mid + 1);
        }
    } else if tight {
        if mid_right {
            end_event = top_event;
            end_delta = top_delta;
        } else {
            start_event = top_event;
            start_delta = top_delta;
        }
    }

    if row_idx < end_row_idx {
        loop {
            let (start, end) = span_of(start_event, end_event);
            start_event = start_event.wrapping_add(start_delta);
            end_event = end_event.wrapping_add(end_delta);

            if traverse_scanline(target, &walker, top, start, end, row_idx, &z0, fp) {
                return CullingResult::Visible;
            }

            row_idx += tiles_width;
            if row_idx >= end_row_idx {
                break;
            }
            advance_z(&mut z0);
            walker.step(mid);
            walker.step(mid + 1);
        }
    }

    done
}

/// Rasterize every live lane of a projected batch inside `scissor`.
///
/// Returns `ViewCulled` when no triangle overlaps the scissor. Otherwise
/// occluders report `Visible`, and occlusion queries `Visible` as soon as one
/// triangle passes or `Occluded`.
pub fn rasterize_batch<const L: usize, T: TileTarget<L>>(
    target: &mut T,
    triangles: &[ScreenTriangle; L],
    mut tri_mask: u32,
    scissor: &ScissorRect,
    tiles_width: i32,
    screen_width: u32,
    precise: bool,
) -> CullingResult {
    let mut result = CullingResult::ViewCulled;
    while tri_mask != 0 {
        let lane = tri_mask.trailing_zeros() as usize;
        tri_mask &= tri_mask - 1;

        let Some(setup) = setup_triangle::<L>(&triangles[lane], scissor, tiles_width, screen_width, precise, T::TEST_Z)
        else {
            continue;
        };
        result = result.combine(rasterize_triangle(target, &setup, tiles_width, precise));
        if T::TEST_Z && result == CullingResult::Visible {
            return CullingResult::Visible;
        }
    }
    result
}

/// Test a screen-aligned pixel rectangle `[min_x, max_x] x [min_y, max_y]`
/// (inclusive, already clamped to the screen) at constant depth `z_max`.
///
/// Only the coarse per-subtile depth is consulted: any subtile inside the
/// rectangle's subtile-aligned bounds whose buffer depth is not nearer than
/// `z_max` makes the rectangle visible.
pub fn test_rect_tiles<const L: usize>(
    buffer: &HiZBuffer<L>,
    counters: &CullingCounters,
    (min_x, min_y, max_x, max_y): (i32, i32, i32, i32),
    z_max: f32,
) -> CullingResult {
    let th_shift = tile_height_shift(L);
    let tile_height = 1i32 << th_shift;
    let tiles_width = buffer.tiles_width() as i32;

    // Tile bounds for traversal
    let tile_x0 = (min_x & !(TILE_WIDTH - 1)) >> TILE_WIDTH_SHIFT;
    let tile_x1 = ((max_x + TILE_WIDTH) & !(TILE_WIDTH - 1)) >> TILE_WIDTH_SHIFT;
    let tile_y0 = (min_y & !(tile_height - 1)) >> th_shift;
    let tile_y1 = ((max_y + tile_height) & !(tile_height - 1)) >> th_shift;
    if tile_x0 >= tile_x1 || tile_y0 >= tile_y1 {
        return CullingResult::ViewCulled;
    }

    // Subtile bounds, lanes outside them are ignored
    let st_min_x = min_x & !(SUB_TILE_WIDTH - 1);
    let st_max_x = (max_x + SUB_TILE_WIDTH) & !(SUB_TILE_WIDTH - 1);
    let st_min_y = min_y & !(SUB_TILE_HEIGHT - 1);
    let st_max_y = (max_y + SUB_TILE_HEIGHT) & !(SUB_TILE_HEIGHT - 1);
    let quick_mask = buffer.quick_mask();

    for ty in tile_y0..tile_y1 {
        for tx in tile_x0..tile_x1 {
            count_add!(counters.occludee_tiles_traversed, 1);

            let tile_idx = (ty * tiles_width + tx) as usize;
            let z_buf = buffer.tile(tile_idx).coarse_z_min(quick_mask);
            let visible = (0..L).any(|s| {
                let px = (tx << TILE_WIDTH_SHIFT) + sub_tile_col_offset(s);
                let py = (ty << th_shift) + sub_tile_row_offset(s);
                let inside = px >= st_min_x && px < st_max_x && py >= st_min_y && py < st_max_y;
                inside && z_max >= z_buf[s]
            });
            if visible {
                return CullingResult::Visible;
            }
        }
    }
    CullingResult::Occluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::hiz_buffer::ZTile;

    /// Records visited tiles and the coverage they received.
    struct RecordingTarget<const L: usize> {
        counters: CullingCounters,
        tiles: Vec<ZTile<L>>,
        coverage: Vec<[u32; L]>,
        visits: usize,
    }

    impl<const L: usize> RecordingTarget<L> {
        fn new(tiles: usize) -> Self {
            Self {
                counters: CullingCounters::new(),
                tiles: vec![ZTile::cleared(true); tiles],
                coverage: vec![[0; L]; tiles],
                visits: 0,
            }
        }

        fn covered_pixels(&self) -> u32 {
            self.coverage.iter().flatten().map(|m| m.count_ones()).sum()
        }
    }

    impl<const L: usize> TileTarget<L> for RecordingTarget<L> {
        const TEST_Z: bool = false;

        fn counters(&self) -> &CullingCounters {
            &self.counters
        }

        fn coarse_z_min(&self, tile_idx: usize) -> [f32; L] {
            self.tiles[tile_idx].coarse_z_min(true)
        }

        fn visit(
            &mut self,
            tile_idx: usize,
            coverage: &[u32; L],
            _z_plane: &[f32; L],
            _z_buffer: &[f32; L],
            _z_tri_min: f32,
            _z_tri_max: f32,
        ) -> bool {
            self.visits += 1;
            for s in 0..L {
                self.coverage[tile_idx][s] |= coverage[s];
            }
            false
        }
    }

    fn screen_tri(x: [f32; 3], y: [f32; 3], precise: bool) -> ScreenTriangle {
        let mut tri = ScreenTriangle { x, y, z: [0.5; 3], ..Default::default() };
        if precise {
            tri.ix = x.map(|v| (v * 256.0) as i32);
            tri.iy = y.map(|v| (v * 256.0) as i32);
        }
        tri
    }

    #[test]
    fn test_transpose_coverage_places_bytes() {
        let mut rows = [0u32; 8];
        rows[0] = 0x0000_00ff; // subtile 0, py 0
        rows[3] = 0xff00_0000; // subtile 3, py 3
        rows[5] = 0x0000_ff00; // subtile 5, py 1
        let out = transpose_coverage(&rows);
        assert_eq!(out[0], 0x0000_00ff);
        assert_eq!(out[3], 0xff00_0000);
        assert_eq!(out[5], 0x0000_ff00);
        assert_eq!(out[1] | out[2] | out[4] | out[6] | out[7], 0);
    }

    #[test]
    fn test_ones_shl_saturates() {
        assert_eq!(ones_shl(0), !0);
        assert_eq!(ones_shl(8), 0xffff_ff00);
        assert_eq!(ones_shl(32), 0);
        assert_eq!(ones_shl(100), 0);
    }

    fn check_fullscreen_pair<const L: usize>(precise: bool) {
        let (w, h) = (64i32, 32i32);
        let tiles_width = w / 32;
        let tiles_height = h / L as i32;
        let scissor = ScissorRect::new(0, 0, w, h);
        // Two counter-clockwise triangles covering the screen
        let a = screen_tri([0.0, 64.0, 64.0], [0.0, 0.0, 32.0], precise);
        let b = screen_tri([0.0, 64.0, 0.0], [0.0, 32.0, 32.0], precise);

        let mut target = RecordingTarget::<L>::new((tiles_width * tiles_height) as usize);
        let mut batch = [ScreenTriangle::default(); L];
        batch[0] = a;
        batch[1] = b;
        let result = rasterize_batch(&mut target, &batch, 0b11, &scissor, tiles_width, w as u32, precise);
        assert_eq!(result, CullingResult::Visible);
        // Fast coverage samples on the scanline itself, so a bottom horizontal
        // edge excludes its own scanline
        let expected = if precise { w * h } else { w * (h - 1) };
        assert_eq!(
            target.covered_pixels(),
            expected as u32,
            "Two triangles sharing a diagonal must leave no gap (L={}, precise={})",
            L,
            precise
        );
    }

    #[test]
    fn test_fullscreen_pair_covers_everything() {
        check_fullscreen_pair::<4>(false);
        check_fullscreen_pair::<8>(false);
        check_fullscreen_pair::<16>(false);
        check_fullscreen_pair::<4>(true);
        check_fullscreen_pair::<8>(true);
        check_fullscreen_pair::<16>(true);
    }

    #[test]
    fn test_small_triangle_covers_few_pixels() {
        let scissor = ScissorRect::new(0, 0, 64, 64);
        let mut target = RecordingTarget::<8>::new(2 * 8);
        let mut batch = [ScreenTriangle::default(); 8];
        batch[0] = screen_tri([10.0, 20.0, 10.0], [10.0, 10.0, 20.0], false);
        rasterize_batch(&mut target, &batch, 0b1, &scissor, 2, 64, false);
        let covered = target.covered_pixels();
        assert!(covered > 20 && covered < 100, "covered {} pixels for a 10x10 right triangle", covered);
        assert_eq!(target.visits, 2, "A triangle spanning two tile rows visits two tiles");
    }

    #[test]
    fn test_offscreen_batch_is_view_culled() {
        let scissor = ScissorRect::new(0, 0, 64, 64);
        let mut target = RecordingTarget::<4>::new(2 * 16);
        let mut batch = [ScreenTriangle::default(); 4];
        batch[0] = screen_tri([100.0, 120.0, 100.0], [10.0, 10.0, 20.0], false);
        let result = rasterize_batch(&mut target, &batch, 0b1, &scissor, 2, 64, false);
        assert_eq!(result, CullingResult::ViewCulled);
        assert_eq!(target.visits, 0);
    }

    #[test]
    fn test_occludee_tester_respects_depth() {
        let mut buffer = HiZBuffer::<8>::new(64, 64, true);
        let counters = CullingCounters::new();
        let scissor = ScissorRect::new(0, 0, 64, 64);
        let tiles_width = buffer.tiles_width() as i32;

        // Fill the whole buffer at depth 0.5
        {
            let mut writer = OccluderWriter::<_, 8>::new(&mut buffer, true, &counters);
            let mut batch = [ScreenTriangle::default(); 8];
            batch[0] = screen_tri([0.0, 64.0, 64.0], [0.0, 0.0, 64.0], false);
            batch[1] = screen_tri([0.0, 64.0, 0.0], [0.0, 64.0, 64.0], false);
            rasterize_batch(&mut writer, &batch, 0b11, &scissor, tiles_width, 64, false);
        }

        let probe = |z: f32| {
            let mut tester = OccludeeTester::new(&buffer, &counters);
            let mut batch = [ScreenTriangle::default(); 8];
            batch[0] = ScreenTriangle {
                x: [10.0, 40.0, 10.0],
                y: [10.0, 10.0, 40.0],
                z: [z; 3],
                ..Default::default()
            };
            rasterize_batch(&mut tester, &batch, 0b1, &scissor, tiles_width, 64, false)
        };
        assert_eq!(probe(0.25), CullingResult::Occluded, "Farther occludee is hidden");
        assert_eq!(probe(0.75), CullingResult::Visible, "Nearer occludee is visible");
    }

    #[test]
    fn test_rect_tiles_uses_subtile_bounds() {
        let mut buffer = HiZBuffer::<8>::new(64, 16, true);
        let counters = CullingCounters::new();
        // Only the left column of tiles holds an occluder
        buffer.tiles_mut()[0].update_quick(&[!0; 8], &[0.5; 8]);
        buffer.tiles_mut()[2].update_quick(&[!0; 8], &[0.5; 8]);

        assert_eq!(test_rect_tiles(&buffer, &counters, (4, 2, 20, 12), 0.25), CullingResult::Occluded);
        assert_eq!(test_rect_tiles(&buffer, &counters, (4, 2, 20, 12), 0.75), CullingResult::Visible);
        assert_eq!(
            test_rect_tiles(&buffer, &counters, (4, 2, 40, 12), 0.25),
            CullingResult::Visible,
            "Reaching into the empty tile column makes the rectangle visible"
        );
        assert_eq!(test_rect_tiles(&buffer, &counters, (0, 0, 63, 15), 0.25), CullingResult::Visible);
    }
}

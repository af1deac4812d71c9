/// Per-triangle setup for the tile rasterizer
///
/// Key Design Principles:
/// 1. Screen space: clip-space vertices are projected with `z = 1/w`, so depth
///    is linear in screen space and 0 means infinitely far.
/// 2. Two coverage modes: precise coverage snaps vertices to 8 sub-pixel bits
///    and walks edges with exact integer remainders; fast coverage rounds to
///    whole pixels and walks edges with fixed-point slopes.
/// 3. Edge events: every edge yields, per tile row, the x position (fixed
///    point, relative to the bounding box) where each scanline crosses it.
/// 4. Conservative depth: the plane offset is moved to the nearest (occludee)
///    or farthest (occluder) corner of an 8x4 subtile.
use glam::Vec4;

use crate::config::{BackfaceWinding, ScissorRect, ScreenConvention};
use crate::rendering::clipping::GUARD_BAND_PIXEL_SIZE;
use crate::rendering::hiz_buffer::{tile_height_shift, SUB_TILE_HEIGHT, SUB_TILE_WIDTH, TILE_WIDTH, TILE_WIDTH_SHIFT};

/// Sub-pixel bits used by precise coverage.
pub const PRECISE_FP_BITS: u32 = 8;
pub const PRECISE_FP_HALF_PIXEL: i32 = 1 << (PRECISE_FP_BITS - 1);

/// Triangles wider and taller than this many tiles use tight span traversal.
pub const BIG_TRIANGLE: i32 = 3;

/// Fixed-point bits for fast coverage, chosen so a tile-row step of a
/// horizontal edge's slope still fits in 31 bits.
#[inline]
pub const fn fast_fp_bits(lanes: usize) -> u32 {
    19 - tile_height_shift(lanes)
}

/// Fixed-point bits of edge events for the selected coverage mode.
#[inline]
pub const fn fp_bits(lanes: usize, precise: bool) -> u32 {
    if precise {
        PRECISE_FP_BITS
    } else {
        fast_fp_bits(lanes)
    }
}

/// Clip space to screen space mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub half_width: f32,
    pub half_height: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub convention: ScreenConvention,
}

impl Viewport {
    pub fn new(width: u32, height: u32, convention: ScreenConvention) -> Self {
        let half_height = height as f32 * 0.5;
        Self {
            half_width: width as f32 * 0.5,
            // Direct3D puts row 0 at the top of the screen
            half_height: match convention {
                ScreenConvention::Direct3D => -half_height,
                ScreenConvention::OpenGl => half_height,
            },
            center_x: width as f32 * 0.5,
            center_y: half_height,
            convention,
        }
    }

    /// Slot each input vertex is written to, keeping front faces counter-clockwise.
    #[inline]
    fn vertex_order(&self) -> [usize; 3] {
        match self.convention {
            ScreenConvention::Direct3D => [2, 1, 0],
            ScreenConvention::OpenGl => [0, 1, 2],
        }
    }
}

/// A projected triangle. `ix`/`iy` hold the snapped sub-pixel coordinates in
/// precise mode; `x`/`y` are always valid floats (`ix / 256` in precise mode).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenTriangle {
    pub x: [f32; 3],
    pub y: [f32; 3],
    pub z: [f32; 3],
    pub ix: [i32; 3],
    pub iy: [i32; 3],
}

impl ScreenTriangle {
    /// Project clip-space `(x, y, _, w)` vertices to the screen.
    pub fn project(tri: &[Vec4; 3], viewport: &Viewport, precise: bool) -> Self {
        let mut out = ScreenTriangle::default();
        let order = viewport.vertex_order();
        for (i, v) in tri.iter().enumerate() {
            let idx = order[i];
            let rcp_w = 1.0 / v.w;
            let sx = (v.x * viewport.half_width).mul_add(rcp_w, viewport.center_x);
            let sy = (v.y * viewport.half_height).mul_add(rcp_w, viewport.center_y);
            if precise {
                let scale = (1 << PRECISE_FP_BITS) as f32;
                let ix = (sx * scale).round_ties_even() as i32;
                let iy = (sy * scale).round_ties_even() as i32;
                out.ix[idx] = ix;
                out.iy[idx] = iy;
                out.x[idx] = ix as f32 / scale;
                out.y[idx] = iy as f32 / scale;
            } else {
                // Samples sit in the (1, 0) pixel corner
                out.x[idx] = sx.ceil();
                out.y[idx] = sy.floor();
            }
            out.z[idx] = rcp_w;
        }
        out
    }

    /// Rebuild a triangle from binned screen-space vertices.
    pub fn from_binned(vertices: &[[f32; 3]; 3], precise: bool) -> Self {
        let mut out = ScreenTriangle::default();
        let scale = (1 << PRECISE_FP_BITS) as f32;
        for (i, v) in vertices.iter().enumerate() {
            out.x[i] = v[0];
            out.y[i] = v[1];
            out.z[i] = v[2];
            if precise {
                out.ix[i] = (v[0] * scale) as i32;
                out.iy[i] = (v[1] * scale) as i32;
            }
        }
        out
    }

    /// Twice the signed screen area, positive for counter-clockwise triangles.
    #[inline]
    pub fn area(&self) -> f32 {
        let a1 = (self.x[1] - self.x[0]) * (self.y[2] - self.y[0]);
        let a2 = (self.x[0] - self.x[2]) * (self.y[0] - self.y[1]);
        a1 - a2
    }

    #[inline]
    fn swap_first_last(&mut self) {
        self.x.swap(0, 2);
        self.y.swap(0, 2);
        self.z.swap(0, 2);
        self.ix.swap(0, 2);
        self.iy.swap(0, 2);
    }

    /// Apply backface culling. Returns `false` when the triangle is culled;
    /// surviving triangles are left in counter-clockwise order.
    pub fn cull_backface(&mut self, winding: BackfaceWinding) -> bool {
        let area = self.area();
        // Degenerate triangles cover no samples
        if area == 0.0 || area.is_nan() {
            return false;
        }
        let ccw = area > 0.0;
        if !winding.culls_cw() && !ccw {
            self.swap_first_last();
        }
        (!winding.culls_ccw() && ccw) || (!winding.culls_cw() && !ccw)
    }
}

/// Edge walking state for one triangle edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeSetup {
    /// Event at the first scanline of the edge's first tile row.
    pub event_start: i32,
    /// Event step for one tile row.
    pub slope_tile_delta: i32,
    /// Fixed-point per-scanline slope (fast coverage).
    pub slope_fp: i32,
    /// Float slope, `dx / dy` (precise coverage).
    pub slope: f32,
    pub edge_y: i32,
    pub abs_edge_x: i32,
    pub slope_sign: i32,
    pub event_start_remainder: i32,
    pub slope_tile_remainder: i32,
}

/// Everything the rasterizer needs to walk one triangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TriangleSetup {
    /// Bounding box size in tiles.
    pub bb_width: i32,
    pub bb_height: i32,
    /// Tile indices of the first row, the row holding the middle vertex and
    /// one past the last row.
    pub tile_row_idx: i32,
    pub tile_mid_row_idx: i32,
    pub tile_end_row_idx: i32,
    pub mid_vtx_right: bool,
    pub z_min: f32,
    pub z_max: f32,
    /// Depth at the bounding box corner, biased to be conservative per subtile.
    pub z_plane_offset: f32,
    pub z_pixel_dx: f32,
    pub z_pixel_dy: f32,
    pub z_tile_dx: f32,
    pub z_tile_dy: f32,
    /// Edge 0 runs v0 to v1, edge 1 v1 to v2 and edge 2 v0 to v2.
    pub edges: [EdgeSetup; 3],
}

/// Pixel bounding box snapped to tiles and clipped to `scissor`.
#[inline]
pub fn bounding_box<const L: usize>(tri: &ScreenTriangle, scissor: &ScissorRect) -> (i32, i32, i32, i32) {
    let tile_height = 1i32 << tile_height_shift(L);
    let min_x = tri.x[0].min(tri.x[1]).min(tri.x[2]) as i32;
    let min_y = tri.y[0].min(tri.y[1]).min(tri.y[2]) as i32;
    let max_x = tri.x[0].max(tri.x[1]).max(tri.x[2]) as i32;
    let max_y = tri.y[0].max(tri.y[1]).max(tri.y[2]) as i32;

    let min_x = (min_x & !(TILE_WIDTH - 1)).max(scissor.min_x);
    let max_x = (max_x.saturating_add(TILE_WIDTH) & !(TILE_WIDTH - 1)).min(scissor.max_x);
    let min_y = (min_y & !(tile_height - 1)).max(scissor.min_y);
    let max_y = (max_y.saturating_add(tile_height) & !(tile_height - 1)).min(scissor.max_y);
    (min_x, min_y, max_x, max_y)
}

/// Screen-space depth gradients `(dz/dx, dz/dy)` of the triangle's plane.
#[inline]
fn depth_plane(tri: &ScreenTriangle) -> (f32, f32) {
    let x1 = tri.x[1] - tri.x[0];
    let x2 = tri.x[2] - tri.x[0];
    let y1 = tri.y[1] - tri.y[0];
    let y2 = tri.y[2] - tri.y[0];
    let z1 = tri.z[1] - tri.z[0];
    let z2 = tri.z[2] - tri.z[0];
    let d = 1.0 / x1.mul_add(y2, -(y1 * x2));
    let dx = z1.mul_add(y2, -(y1 * z2)) * d;
    let dy = x1.mul_add(z2, -(z1 * x2)) * d;
    (dx, dy)
}

/// Rotate vertices, keeping the winding, until v0 has the lowest y.
fn sort_vertices<T: Copy>(vx: &mut [T; 3], vy: &mut [T; 3], needs_rotate: impl Fn(T, T, T) -> bool) {
    for _ in 0..2 {
        if needs_rotate(vy[0], vy[1], vy[2]) {
            vx.rotate_left(1);
            vy.rotate_left(1);
        }
    }
}

/// Compute the full setup for a front-facing triangle, or `None` when its
/// bounding box is empty after scissoring.
pub fn setup_triangle<const L: usize>(
    tri: &ScreenTriangle,
    scissor: &ScissorRect,
    tiles_width: i32,
    screen_width: u32,
    precise: bool,
    test_z: bool,
) -> Option<TriangleSetup> {
    let th_shift = tile_height_shift(L);
    let tile_height = 1i32 << th_shift;

    let (bb_min_x, bb_min_y, bb_max_x, bb_max_y) = bounding_box::<L>(tri, scissor);
    let tile_min_x = bb_min_x >> TILE_WIDTH_SHIFT;
    let tile_min_y = bb_min_y >> th_shift;
    let tile_max_x = bb_max_x >> TILE_WIDTH_SHIFT;
    let tile_max_y = bb_max_y >> th_shift;
    let bb_width = tile_max_x - tile_min_x;
    let bb_height = tile_max_y - tile_min_y;
    if bb_width < 1 || bb_height < 1 {
        return None;
    }

    // Depth plane, from the unsorted vertices
    let (z_pixel_dx, z_pixel_dy) = depth_plane(tri);
    let bias = |d: f32| if test_z { d.max(0.0) } else { d.min(0.0) };
    let mut z_plane_offset = z_pixel_dx.mul_add(
        bb_min_x as f32 - tri.x[0],
        z_pixel_dy.mul_add(bb_min_y as f32 - tri.y[0], tri.z[0]),
    );
    z_plane_offset += bias(z_pixel_dx * SUB_TILE_WIDTH as f32);
    z_plane_offset += bias(z_pixel_dy * SUB_TILE_HEIGHT as f32);
    let z_min = tri.z[0].min(tri.z[1]).min(tri.z[2]);
    let z_max = tri.z[0].max(tri.z[1]).max(tri.z[2]);

    let (mid_vtx_right, mid_tile_y, edges) = if precise {
        setup_edges_precise::<L>(tri, bb_min_x, bb_min_y, tile_min_y, tile_max_y, screen_width)
    } else {
        setup_edges_fast::<L>(tri, bb_min_x, bb_min_y, tile_min_y, tile_max_y, screen_width)
    };

    Some(TriangleSetup {
        bb_width,
        bb_height,
        tile_row_idx: tile_min_x + tile_min_y * tiles_width,
        tile_mid_row_idx: tile_min_x + mid_tile_y * tiles_width,
        tile_end_row_idx: tile_min_x + (tile_min_y + bb_height) * tiles_width,
        mid_vtx_right,
        z_min,
        z_max,
        z_plane_offset,
        z_pixel_dx,
        z_pixel_dy,
        z_tile_dx: z_pixel_dx * TILE_WIDTH as f32,
        z_tile_dy: z_pixel_dy * tile_height as f32,
        edges,
    })
}

/// Edge setup on whole-pixel float vertices with fixed-point slopes.
fn setup_edges_fast<const L: usize>(
    tri: &ScreenTriangle,
    bb_min_x: i32,
    bb_min_y: i32,
    tile_min_y: i32,
    tile_max_y: i32,
    screen_width: u32,
) -> (bool, i32, [EdgeSetup; 3]) {
    let th_shift = tile_height_shift(L);
    let fp = fast_fp_bits(L);

    let mut vx = tri.x;
    let mut vy = tri.y;
    sort_vertices(&mut vx, &mut vy, |y0: f32, y1: f32, y2: f32| {
        let ey1 = y1 - y0;
        let ey2 = y2 - y0;
        ey1.is_sign_negative() || ey2.is_sign_negative() || ey2.to_bits() == 0
    });

    let edge_x = [vx[1] - vx[0], vx[2] - vx[1], vx[2] - vx[0]];
    let edge_y = [vy[1] - vy[0], vy[2] - vy[1], vy[2] - vy[0]];

    let mid_vtx_right = !edge_y[1].is_sign_negative();
    let (mid_x, mid_y) = if mid_vtx_right { (vx[1], vy[1]) } else { (vx[2], vy[2]) };
    let mid_tile_y = (mid_y as i32).max(0) >> th_shift;
    let bb_mid_tile_y = mid_tile_y.min(tile_max_y).max(tile_min_y);

    let mut slope = [edge_x[0] / edge_y[0], edge_x[1] / edge_y[1], edge_x[2] / edge_y[2]];
    // Horizontal edges mask out everything above or below them
    let horizontal = screen_width as f32 + 2.0 * (GUARD_BAND_PIXEL_SIZE + 1.0);
    if edge_y[0] == 0.0 {
        slope[0] = horizontal;
    }
    if edge_y[1] == 0.0 {
        slope[1] = -horizontal;
    }

    let scale = (1i32 << fp) as f32;
    let mut slope_fp = slope.map(|s| (s * scale) as i32);
    // Fan right-facing slopes out by one LSB to avoid cracks at vertices
    slope_fp[0] = slope_fp[0].wrapping_add(1);
    slope_fp[1] = slope_fp[1].wrapping_add(mid_vtx_right as i32);

    let x_diff = [
        ((vx[0] as i32).wrapping_sub(bb_min_x)) << fp,
        ((mid_x as i32).wrapping_sub(bb_min_x)) << fp,
    ];
    let y_diff = [
        (vy[0] as i32).wrapping_sub(bb_min_y),
        (mid_y as i32).wrapping_sub(bb_mid_tile_y << th_shift),
    ];

    let mut edges = [EdgeSetup::default(); 3];
    for (i, edge) in edges.iter_mut().enumerate() {
        let d = if i == 1 { 1 } else { 0 };
        edge.slope_fp = slope_fp[i];
        edge.slope = slope[i];
        edge.slope_tile_delta = slope_fp[i] << th_shift;
        edge.event_start = x_diff[d].wrapping_sub(slope_fp[i].wrapping_mul(y_diff[d]));
    }
    (mid_vtx_right, mid_tile_y, edges)
}

/// Edge setup on sub-pixel integer vertices with exact remainders, so edge
/// events never drift from the true edge.
fn setup_edges_precise<const L: usize>(
    tri: &ScreenTriangle,
    bb_min_x: i32,
    bb_min_y: i32,
    tile_min_y: i32,
    tile_max_y: i32,
    screen_width: u32,
) -> (bool, i32, [EdgeSetup; 3]) {
    let th_shift = tile_height_shift(L);
    let fp = PRECISE_FP_BITS;
    let fp_tile_shift = fp + th_shift;

    let mut vx = tri.ix;
    let mut vy = tri.iy;
    sort_vertices(&mut vx, &mut vy, |y0: i32, y1: i32, y2: i32| {
        let ey1 = y1.wrapping_sub(y0);
        let ey2 = y2.wrapping_sub(y0);
        ey1 < 0 || ey2 < 0 || ey2 == 0
    });

    let mut edge_x = [vx[1].wrapping_sub(vx[0]), vx[2].wrapping_sub(vx[1]), vx[2].wrapping_sub(vx[0])];
    let mut edge_y = [vy[1].wrapping_sub(vy[0]), vy[2].wrapping_sub(vy[1]), vy[2].wrapping_sub(vy[0])];

    let mid_vtx_right = edge_y[1] >= 0;
    let (mid_x, mid_y) = if mid_vtx_right { (vx[1], vy[1]) } else { (vx[2], vy[2]) };
    let mid_tile_y = mid_y.max(0) >> fp_tile_shift;
    let bb_mid_tile_y = mid_tile_y.min(tile_max_y).max(tile_min_y);

    let x_diff = [
        vx[0].wrapping_sub(bb_min_x << fp),
        mid_x.wrapping_sub(bb_min_x << fp),
    ];
    let y_diff = [
        vy[0].wrapping_sub(bb_min_y << fp),
        mid_y.wrapping_sub(bb_mid_tile_y << fp_tile_shift),
    ];

    // Every edge points up the screen
    if edge_y[1] < 0 {
        edge_x[1] = edge_x[1].wrapping_neg();
    }
    edge_y[1] = edge_y[1].wrapping_abs();

    let mut slope = [0.0f32; 3];
    for i in 0..3 {
        slope[i] = edge_x[i] as f32 / edge_y[i] as f32;
    }
    let horizontal = 2.0 * (screen_width as f32 + 2.0 * (GUARD_BAND_PIXEL_SIZE + 1.0));
    let horizontal0 = edge_y[0] == 0;
    let horizontal1 = edge_y[1] == 0;
    if horizontal0 {
        slope[0] = horizontal;
    }
    if horizontal1 {
        slope[1] = -horizontal;
    }

    // Horizontal edges start on the pixel row center
    let row_snap = |y: i32| y.wrapping_add(PRECISE_FP_HALF_PIXEL - 1) & (!0i32 << fp);
    let vy_start = [
        if horizontal0 { row_snap(y_diff[0]) } else { y_diff[0] },
        if horizontal1 { row_snap(y_diff[1]) } else { y_diff[1] },
        y_diff[0],
    ];

    let fp_tile_height = (1i32 << fp_tile_shift) as f32;
    let mut edges = [EdgeSetup::default(); 3];
    for (i, edge) in edges.iter_mut().enumerate() {
        let slope_sign = if edge_x[i] < 0 { -1 } else { 1 };
        let abs_edge_x = edge_x[i].wrapping_abs();

        // The tile step is kept as quotient plus remainder / edge_y
        let slope_tile_delta = (slope[i] * fp_tile_height) as i32;
        let slope_tile_remainder = (abs_edge_x << fp_tile_shift)
            .wrapping_sub(slope_tile_delta.wrapping_abs().wrapping_mul(edge_y[i]));

        // Jump to the first scanline of the tile row, possibly downwards
        let vy = vy_start[i];
        let tile_start_dir = if vy < 0 { -slope_sign } else { slope_sign };
        let tie_breaker = if tile_start_dir < 0 { 1 } else { 0 };
        let tile_start_slope = (slope[i] * vy.wrapping_neg() as f32) as i32;
        let tile_start_remainder = abs_edge_x
            .wrapping_mul(vy.wrapping_abs())
            .wrapping_sub(tile_start_slope.wrapping_abs().wrapping_mul(edge_y[i]));

        let mut remainder = tile_start_remainder.wrapping_sub(tie_breaker);
        let overflow = remainder >> 31;
        remainder = remainder.wrapping_add(overflow & edge_y[i]);
        if vy < 0 {
            remainder = edge_y[i].wrapping_sub(remainder).wrapping_sub(1);
        }

        let event_start = x_diff[i & 1]
            .wrapping_add(tile_start_slope)
            .wrapping_add(overflow & tile_start_dir)
            .wrapping_add(PRECISE_FP_HALF_PIXEL - 1)
            .wrapping_add(tie_breaker);

        *edge = EdgeSetup {
            event_start,
            slope_tile_delta,
            slope_fp: 0,
            slope: slope[i],
            edge_y: edge_y[i],
            abs_edge_x,
            slope_sign,
            event_start_remainder: remainder,
            slope_tile_remainder,
        };
    }
    (mid_vtx_right, mid_tile_y, edges)
}

/// Masked hierarchical depth buffer: one 32xN tile per SIMD register
///
/// Key Design Principles:
/// 1. Tile layout: each 32xN tile holds N subtiles of 8x4 pixels, one per lane,
///    laid out 4 across. Subtile `s` covers pixel columns `(s % 4) * 8 ..` and
///    rows `(s / 4) * 4 ..` of its tile.
/// 2. Two depth layers per subtile: `z_min[0]` is the conservative reference
///    layer, `z_min[1]` the working layer. Bit `py * 8 + px` of the coverage
///    mask selects which layer a pixel belongs to.
/// 3. Reversed depth: z = 1/w, so 0 is infinitely far and larger is nearer.
///    Occlusion tests pass when the query is at least as near as the buffer.
/// 4. Cache-line aligned tiles: a tile is read and written as one unit by the
///    rasterizer, never pixel by pixel.

/// Tile width in pixels is `1 << TILE_WIDTH_SHIFT`.
pub const TILE_WIDTH_SHIFT: u32 = 5;
pub const TILE_WIDTH: i32 = 1 << TILE_WIDTH_SHIFT;
pub const SUB_TILE_WIDTH: i32 = 8;
pub const SUB_TILE_HEIGHT: i32 = 4;

/// Tile height in pixels equals the lane count, so the shift is its log2.
#[inline]
pub const fn tile_height_shift(lanes: usize) -> u32 {
    lanes.trailing_zeros()
}

/// Pixel column of subtile `lane` inside its tile.
#[inline]
pub const fn sub_tile_col_offset(lane: usize) -> i32 {
    (lane % 4) as i32 * SUB_TILE_WIDTH
}

/// Pixel row of subtile `lane` inside its tile.
#[inline]
pub const fn sub_tile_row_offset(lane: usize) -> i32 {
    (lane / 4) as i32 * SUB_TILE_HEIGHT
}

/// Depth of a cleared reference layer: beyond infinity, so clear data never
/// merges with rendered data.
pub const CLEAR_Z0: f32 = -1.0;

/// One 32xN tile. Lane `s` holds subtile `s`.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZTile<const L: usize> {
    pub z_min: [[f32; L]; 2],
    pub mask: [u32; L],
}

impl<const L: usize> ZTile<L> {
    /// Empty tile for the given merge heuristic.
    #[inline]
    pub const fn cleared(quick_mask: bool) -> Self {
        // Quick mask pushes layer 1 back on each update, so it starts nearest
        let z1 = if quick_mask { f32::MAX } else { 0.0 };
        Self {
            z_min: [[CLEAR_Z0; L], [z1; L]],
            mask: [0; L],
        }
    }

    /// Conservative farthest depth of each subtile, used for coarse rejection.
    #[inline]
    pub fn coarse_z_min(&self, quick_mask: bool) -> [f32; L] {
        if quick_mask {
            // Layer 0 is always conservative on its own
            return self.z_min[0];
        }
        let mut out = [0.0f32; L];
        for s in 0..L {
            let z0 = self.z_min[0][s];
            let z1 = self.z_min[1][s];
            let mask = self.mask[s];
            let layer0 = if mask == !0 { z1 } else { z0 };
            let layer1 = if mask == 0 { z0 } else { z1 };
            out[s] = layer0.min(layer1);
        }
        out
    }

    /// Quick-mask update with per-subtile coverage `coverage` at depth `z_tri`.
    ///
    /// Layer 1 accumulates coverage and keeps the farthest depth seen; once a
    /// subtile is fully covered it collapses into layer 0. Layer 1 is discarded
    /// when the incoming triangle is nearer to it than layer 0 is.
    pub fn update_quick(&mut self, coverage: &[u32; L], z_tri: &[f32; L]) {
        for s in 0..L {
            let z0 = self.z_min[0][s];
            let z1 = self.z_min[1][s];
            let zt = z_tri[s];

            // Subtiles failing the depth test against layer 0 are not updated
            let dead = coverage[s] == 0 || (zt - z0).is_sign_negative();
            let rast = if dead { 0 } else { coverage[s] };

            let covered = rast == !0;
            let diff = z1 * 2.0 - (zt + z0);
            let discard = !dead && (diff.is_sign_negative() || covered);

            let mask = (if discard { 0 } else { self.mask[s] }) | rast;
            let full = mask == !0;

            let op_a = if dead { z1 } else { zt };
            let op_b = if discard { zt } else { z1 };
            let z1_min = op_a.min(op_b);

            self.z_min[1][s] = if full { f32::MAX } else { z1_min };
            self.z_min[0][s] = if full { z1_min } else { z0 };
            self.mask[s] = if full { 0 } else { mask };
        }
    }

    /// Accurate update: merges the surviving coverage into whichever pair of
    /// depths (layer 0, layer 1, triangle) lies closest together.
    ///
    /// Returns `false` without touching the tile when no pixel passes the
    /// per-layer depth test.
    pub fn update_accurate(&mut self, coverage: &[u32; L], z_tri: &[f32; L]) -> bool {
        let mut tri_mask = [0u32; L];
        let mut any = false;
        for s in 0..L {
            let sdist0 = self.z_min[0][s] - z_tri[s];
            let sdist1 = self.z_min[1][s] - z_tri[s];
            let sign0 = if sdist0.is_sign_negative() { !0u32 } else { 0 };
            let sign1 = if sdist1.is_sign_negative() { !0u32 } else { 0 };
            let mask = self.mask[s];
            tri_mask[s] = coverage[s] & ((!mask & sign0) | (mask & sign1));
            any |= tri_mask[s] != 0;
        }
        if !any {
            return false;
        }

        for s in 0..L {
            let mask = self.mask[s];
            let zmin0 = self.z_min[0][s];
            let zmin1 = self.z_min[1][s];
            let sdist0 = zmin0 - z_tri[s];
            let sdist1 = zmin1 - z_tri[s];

            let t0 = tri_mask[s] == 0;
            let z_tri_s = if t0 { zmin0 } else { z_tri[s] };

            // Does the triangle completely overwrite layer 0 or layer 1?
            let layer_mask0 = !tri_mask[s] & !mask;
            let layer_mask1 = !tri_mask[s] & mask;
            let lm0 = layer_mask0 == 0;
            let lm1 = layer_mask1 == 0;
            let z0 = if lm0 { z_tri_s } else { zmin0 };
            let z1 = if lm1 { z_tri_s } else { zmin1 };

            let d0 = sdist0.abs();
            let d1 = sdist1.abs();
            let d2 = (z0 - z1).abs();

            let c01 = (d0 - d1).is_sign_negative();
            let c02 = (d0 - d2).is_sign_negative();
            let c12 = (d1 - d2).is_sign_negative();

            // d0min: triangle overwrites or merges into layer 0
            // d1min: triangle overwrites or merges into layer 1
            let d0min = (c01 && c02) || lm0 || t0;
            let d1min = !d0min && (c12 || lm1);

            self.mask[s] = if d1min {
                layer_mask0
            } else if d0min {
                layer_mask1
            } else {
                tri_mask[s]
            };

            let e0 = if d1min { z1 } else { z0 };
            let e1 = if d1min || d0min { z_tri_s } else { z1 };
            self.z_min[0][s] = e0.min(e1);

            let z1t = if d0min { z1 } else { z_tri_s };
            self.z_min[1][s] = if d1min { z0 } else { z1t };
        }
        true
    }

    /// Merge `other` into `self` with the quick heuristic. Returns the number
    /// of merge steps performed (0, 1 or 2).
    pub fn merge_quick(&mut self, other: &ZTile<L>) -> u32 {
        let mut merged = 0;

        // Only merge reference layers that hold data, clear lanes are negative
        if other.z_min[0].iter().any(|z| !z.is_sign_negative()) {
            merged += 1;
            for s in 0..L {
                self.z_min[0][s] = self.z_min[0][s].max(other.z_min[0][s]);
                let dead = self.mask[s] == 0 || (self.z_min[1][s] - self.z_min[0][s]).is_sign_negative();
                if dead {
                    self.mask[s] = 0;
                }
            }
        }

        if other.mask.iter().any(|&m| m != 0) {
            merged += 1;
            self.update_quick(&other.mask, &other.z_min[1]);
        }
        merged
    }

    /// Merge `other` into `self` with the accurate heuristic. Returns the number
    /// of merge steps that updated the tile.
    pub fn merge_accurate(&mut self, other: &ZTile<L>) -> u32 {
        let self_clear =
            self.z_min[0].iter().all(|z| z.is_sign_negative()) && self.mask.iter().all(|&m| m == 0);
        if self_clear {
            *self = *other;
            return 1;
        }

        let mut merged = 0;
        if other.z_min[0].iter().any(|z| !z.is_sign_negative()) {
            // Full coverage where layer 0 is complete, else the complement of layer 1
            let mut rast = [0u32; L];
            for s in 0..L {
                let layer_mask0 = if other.z_min[1][s].is_sign_negative() { 0 } else { !0u32 };
                rast[s] = layer_mask0 | !other.mask[s];
            }
            merged += self.update_accurate(&rast, &other.z_min[0]) as u32;
        }

        if other.mask.iter().any(|&m| m != 0) {
            merged += self.update_accurate(&other.mask, &other.z_min[1]) as u32;
        }
        merged
    }
}

/// Read/write access to the tile grid. Implemented by the full buffer and by
/// the disjoint per-bin views used for parallel rendering.
pub trait TileStore<const L: usize> {
    fn tile(&self, idx: usize) -> &ZTile<L>;
    fn tile_mut(&mut self, idx: usize) -> &mut ZTile<L>;
}

/// Masked hierarchical Z-buffer for a `width` x `height` screen.
#[derive(Debug, Clone)]
pub struct HiZBuffer<const L: usize> {
    width: u32,
    height: u32,
    tiles_width: usize,
    tiles_height: usize,
    quick_mask: bool,
    tiles: Vec<ZTile<L>>,
}

impl<const L: usize> HiZBuffer<L> {
    /// Allocate a cleared buffer. Tile counts round up to whole tiles.
    pub fn new(width: u32, height: u32, quick_mask: bool) -> Self {
        let tiles_width = (width as usize + TILE_WIDTH as usize - 1) >> TILE_WIDTH_SHIFT;
        let tiles_height = (height as usize + L - 1) >> tile_height_shift(L);
        Self {
            width,
            height,
            tiles_width,
            tiles_height,
            quick_mask,
            tiles: vec![ZTile::cleared(quick_mask); tiles_width * tiles_height],
        }
    }

    /// Reset every tile to the empty state
    #[inline]
    pub fn clear(&mut self) {
        self.tiles.fill(ZTile::cleared(self.quick_mask));
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn tiles_width(&self) -> usize {
        self.tiles_width
    }

    #[inline]
    pub fn tiles_height(&self) -> usize {
        self.tiles_height
    }

    #[inline]
    pub fn quick_mask(&self) -> bool {
        self.quick_mask
    }

    #[inline]
    pub fn tiles(&self) -> &[ZTile<L>] {
        &self.tiles
    }

    #[inline]
    pub fn tiles_mut(&mut self) -> &mut [ZTile<L>] {
        &mut self.tiles
    }

    /// Merge another buffer of identical dimensions tile by tile.
    /// Returns the number of tile merge steps performed.
    pub fn merge_from(&mut self, other: &HiZBuffer<L>) -> u64 {
        debug_assert_eq!(self.tiles.len(), other.tiles.len());
        let quick = self.quick_mask;
        self.tiles
            .iter_mut()
            .zip(other.tiles.iter())
            .map(|(a, b)| {
                let steps = if quick { a.merge_quick(b) } else { a.merge_accurate(b) };
                steps as u64
            })
            .sum()
    }

    /// Depth stored for pixel `(x, y)`, using the layer its mask bit selects.
    #[inline]
    pub fn pixel_depth(&self, x: u32, y: u32) -> f32 {
        let (x, y) = (x as usize, y as usize);
        let tile_idx = (y >> tile_height_shift(L)) * self.tiles_width + (x >> TILE_WIDTH_SHIFT);

        let stx = (x % TILE_WIDTH as usize) / SUB_TILE_WIDTH as usize;
        let sty = (y % L) / SUB_TILE_HEIGHT as usize;
        let sub_tile = sty * 4 + stx;

        let bit = (y % SUB_TILE_HEIGHT as usize) * 8 + (x % SUB_TILE_WIDTH as usize);
        let tile = &self.tiles[tile_idx];
        let layer = ((tile.mask[sub_tile] >> bit) & 1) as usize;
        tile.z_min[layer][sub_tile]
    }

    /// Write one depth per pixel into `out` (row-major, `width * height`).
    /// `flip_y` stores row 0 last.
    pub fn compute_pixel_depth_buffer(&self, out: &mut [f32], flip_y: bool) {
        let (w, h) = (self.width as usize, self.height as usize);
        assert!(out.len() >= w * h, "depth output holds {} values, need {}", out.len(), w * h);
        for y in 0..h {
            let row = if flip_y { h - y - 1 } else { y };
            for x in 0..w {
                out[row * w + x] = self.pixel_depth(x as u32, y as u32);
            }
        }
    }
}

impl<const L: usize> TileStore<L> for HiZBuffer<L> {
    #[inline]
    fn tile(&self, idx: usize) -> &ZTile<L> {
        &self.tiles[idx]
    }

    #[inline]
    fn tile_mut(&mut self, idx: usize) -> &mut ZTile<L> {
        &mut self.tiles[idx]
    }
}

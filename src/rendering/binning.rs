/// Screen-space binning for parallel occluder rendering
///
/// Key Design Principles:
/// 1. Bins are whole tiles: bin sizes are rounded down to the tile grid so
///    every tile belongs to exactly one bin.
/// 2. Binned triangles are already projected and backface culled; rendering a
///    bin only runs triangle setup and rasterization under the bin scissor.
/// 3. Disjoint views: each parallel worker writes through a `BinTarget` that
///    can only reach the tiles inside its own scissor.
use std::marker::PhantomData;

use crate::config::ScissorRect;
use crate::error::OcclusionError;
use crate::rendering::hiz_buffer::{tile_height_shift, HiZBuffer, TileStore, ZTile, TILE_WIDTH, TILE_WIDTH_SHIFT};

/// Screen-space triangles binned to one screen region. Each vertex is stored
/// as `(x, y, z)` with `z = 1/w`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriList {
    triangles: Vec<[[f32; 3]; 3]>,
}

impl TriList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(triangles: usize) -> Self {
        Self { triangles: Vec::with_capacity(triangles) }
    }

    /// Forget all binned triangles, keeping the allocation.
    pub fn clear(&mut self) {
        self.triangles.clear();
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangles(&self) -> &[[[f32; 3]; 3]] {
        &self.triangles
    }

    #[inline]
    pub(crate) fn push(&mut self, triangle: [[f32; 3]; 3]) {
        self.triangles.push(triangle);
    }
}

/// Bin size in pixels for a `bins_w` x `bins_h` grid, rounded down to whole
/// tiles and never smaller than one tile.
pub fn bin_width_height<const L: usize>(width: u32, height: u32, bins_w: u32, bins_h: u32) -> (u32, u32) {
    let tile_height = 1u32 << tile_height_shift(L);
    let bw = width / bins_w.max(1);
    let bh = height / bins_h.max(1);
    let bin_width = (bw - bw % TILE_WIDTH as u32).max(TILE_WIDTH as u32);
    let bin_height = (bh - bh % tile_height).max(tile_height);
    (bin_width, bin_height)
}

/// One scissor per bin in row-major order. The last row and column extend to
/// the padded edge of the tile grid.
pub fn bin_scissors<const L: usize>(width: u32, height: u32, bins_w: u32, bins_h: u32) -> Vec<ScissorRect> {
    let (bin_width, bin_height) = bin_width_height::<L>(width, height, bins_w, bins_h);
    let tile_height = 1i32 << tile_height_shift(L);
    let padded_w = (width as i32 + TILE_WIDTH - 1) / TILE_WIDTH * TILE_WIDTH;
    let padded_h = (height as i32 + tile_height - 1) / tile_height * tile_height;
    let (bins_w, bins_h) = (bins_w.max(1) as i32, bins_h.max(1) as i32);
    let (bin_width, bin_height) = (bin_width as i32, bin_height as i32);

    let mut scissors = Vec::with_capacity((bins_w * bins_h) as usize);
    for by in 0..bins_h {
        for bx in 0..bins_w {
            let min_x = (bx * bin_width).min(padded_w);
            let min_y = (by * bin_height).min(padded_h);
            let max_x = if bx + 1 == bins_w { padded_w } else { ((bx + 1) * bin_width).min(padded_w) };
            let max_y = if by + 1 == bins_h { padded_h } else { ((by + 1) * bin_height).min(padded_h) };
            scissors.push(ScissorRect::new(min_x, min_y, max_x, max_y));
        }
    }
    scissors
}

/// Range of bins `[start, end)` overlapped by a pixel span `[min, max)`.
#[inline]
pub(crate) fn bin_range(min: i32, max: i32, bin_size: u32, bins: u32) -> (u32, u32) {
    let bin_size = bin_size as i32;
    let start = ((min.max(0) / bin_size) as u32).min(bins - 1);
    let end = (((max.max(0) + bin_size - 1) / bin_size) as u32).min(bins);
    (start, end)
}

/// Check that a scissor is tile aligned and inside the tile grid.
pub(crate) fn validate_scissor<const L: usize>(
    scissor: &ScissorRect,
    tiles_width: usize,
    tiles_height: usize,
) -> Result<(), OcclusionError> {
    let tile_height = 1i32 << tile_height_shift(L);
    let aligned = scissor.min_x % TILE_WIDTH == 0
        && scissor.max_x % TILE_WIDTH == 0
        && scissor.min_y % tile_height == 0
        && scissor.max_y % tile_height == 0;
    let inside = scissor.min_x >= 0
        && scissor.min_y >= 0
        && scissor.max_x <= tiles_width as i32 * TILE_WIDTH
        && scissor.max_y <= tiles_height as i32 * tile_height;
    if aligned && inside {
        Ok(())
    } else {
        Err(OcclusionError::UnalignedScissor {
            min_x: scissor.min_x,
            min_y: scissor.min_y,
            max_x: scissor.max_x,
            max_y: scissor.max_y,
        })
    }
}

/// Write access to the tiles of one bin of a depth buffer.
pub struct BinTarget<'a, const L: usize> {
    tiles_ptr: *mut ZTile<L>,
    tiles_width: usize,
    tile_min_x: usize,
    tile_min_y: usize,
    tile_max_x: usize,
    tile_max_y: usize,
    _buffer: PhantomData<&'a mut HiZBuffer<L>>,
}

// Safety: BinTarget only carries a raw pointer into the tile grid, and
// `split_into_bins` hands out views over pairwise disjoint tile rectangles,
// so no two workers ever touch the same tile.
unsafe impl<const L: usize> Send for BinTarget<'_, L> {}
unsafe impl<const L: usize> Sync for BinTarget<'_, L> {}

impl<'a, const L: usize> BinTarget<'a, L> {
    #[inline]
    fn contains(&self, idx: usize) -> bool {
        let (x, y) = (idx % self.tiles_width, idx / self.tiles_width);
        x >= self.tile_min_x && x < self.tile_max_x && y >= self.tile_min_y && y < self.tile_max_y
    }
}

impl<'a, const L: usize> TileStore<L> for BinTarget<'a, L> {
    #[inline]
    fn tile(&self, idx: usize) -> &ZTile<L> {
        assert!(self.contains(idx), "tile {} outside of bin", idx);
        // SAFETY: idx lies inside this bin, which no other view overlaps
        unsafe { &*self.tiles_ptr.add(idx) }
    }

    #[inline]
    fn tile_mut(&mut self, idx: usize) -> &mut ZTile<L> {
        assert!(self.contains(idx), "tile {} outside of bin", idx);
        // SAFETY: as above, and `&mut self` makes this view's access exclusive
        unsafe { &mut *self.tiles_ptr.add(idx) }
    }
}

/// Split `buffer` into one writable view per scissor.
///
/// Fails when a scissor is not tile aligned or leaves the tile grid, or when
/// two scissors share a tile.
pub fn split_into_bins<'a, const L: usize>(
    buffer: &'a mut HiZBuffer<L>,
    scissors: &[ScissorRect],
) -> Result<Vec<BinTarget<'a, L>>, OcclusionError> {
    let th_shift = tile_height_shift(L);
    let (tiles_width, tiles_height) = (buffer.tiles_width(), buffer.tiles_height());
    for scissor in scissors {
        validate_scissor::<L>(scissor, tiles_width, tiles_height)?;
    }
    for (i, a) in scissors.iter().enumerate() {
        for (j, b) in scissors.iter().enumerate().skip(i + 1) {
            if !a.is_empty() && !b.is_empty() && a.overlaps(b) {
                return Err(OcclusionError::OverlappingBins { first: i, second: j });
            }
        }
    }

    let tiles_ptr = buffer.tiles_mut().as_mut_ptr();
    Ok(scissors
        .iter()
        .map(|s| BinTarget {
            tiles_ptr,
            tiles_width,
            tile_min_x: (s.min_x >> TILE_WIDTH_SHIFT) as usize,
            tile_min_y: (s.min_y >> th_shift) as usize,
            tile_max_x: (s.max_x >> TILE_WIDTH_SHIFT) as usize,
            tile_max_y: (s.max_y >> th_shift) as usize,
            _buffer: PhantomData,
        })
        .collect())
}

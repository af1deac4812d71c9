/// Frustum classification, polygon clipping and batch assembly
///
/// Triangles are gathered one per lane. Each batch is classified against the
/// enabled frustum planes: lanes fully outside any plane are dropped, lanes
/// straddling a plane are clipped against the guard-band shrunk planes and the
/// resulting fan of sub-triangles is queued for later batches.
use std::collections::VecDeque;

use glam::{Mat4, Vec4};

use crate::config::{ClipPlanes, VertexLayout};
use crate::rendering::simd_vertex::{gather_triangles, TriangleBatch, IDLE_VERTEX};

/// Clipping a triangle against five planes yields at most 3 + 5 vertices.
pub(crate) const MAX_POLY_VERTS: usize = 8;

/// Guard band around the screen in pixels, absorbs projection round-off.
pub(crate) const GUARD_BAND_PIXEL_SIZE: f32 = 1.0;

const PLANE_ORDER: [ClipPlanes; 5] =
    [ClipPlanes::NEAR, ClipPlanes::LEFT, ClipPlanes::RIGHT, ClipPlanes::BOTTOM, ClipPlanes::TOP];

/// Clip-space planes dotted with `(x, y, w, 1)`, in `PLANE_ORDER`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FrustumPlanes {
    planes: [Vec4; 5],
    near: f32,
}

impl FrustumPlanes {
    pub(crate) fn new(near: f32) -> Self {
        Self {
            planes: [
                Vec4::new(0.0, 0.0, 1.0, -near),
                Vec4::new(1.0, 0.0, 1.0, 0.0),
                Vec4::new(-1.0, 0.0, 1.0, 0.0),
                Vec4::new(0.0, 1.0, 1.0, 0.0),
                Vec4::new(0.0, -1.0, 1.0, 0.0),
            ],
            near,
        }
    }

    /// Shrink the side planes by the guard band for a `width` x `height` screen.
    pub(crate) fn set_resolution(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let gbw = (2.0 / width as f32) * GUARD_BAND_PIXEL_SIZE;
        let gbh = (2.0 / height as f32) * GUARD_BAND_PIXEL_SIZE;
        self.planes[1] = Vec4::new(1.0 - gbw, 0.0, 1.0, 0.0);
        self.planes[2] = Vec4::new(-1.0 + gbw, 0.0, 1.0, 0.0);
        self.planes[3] = Vec4::new(0.0, 1.0 - gbh, 1.0, 0.0);
        self.planes[4] = Vec4::new(0.0, -1.0 + gbh, 1.0, 0.0);
    }

    pub(crate) fn set_near(&mut self, near: f32) {
        self.near = near;
        self.planes[0] = Vec4::new(0.0, 0.0, 1.0, -near);
    }

    #[inline]
    pub(crate) fn near(&self) -> f32 {
        self.near
    }

    /// Exact distance used for the inside/outside classification. The
    /// classification ignores the guard band so only truly visible parts survive.
    #[inline]
    fn classify_distance(&self, plane: usize, v: Vec4) -> f32 {
        match plane {
            0 => v.w - self.near,
            1 => v.w + v.x,
            2 => v.w - v.x,
            3 => v.w + v.y,
            _ => v.w - v.y,
        }
    }
}

#[inline]
fn plane_distance(plane: Vec4, v: Vec4) -> f32 {
    plane.x * v.x + plane.y * v.y + plane.z * v.w + plane.w
}

/// Clip a convex polygon against one plane (Sutherland-Hodgman).
/// Returns the number of output vertices written to `output`.
pub(crate) fn clip_polygon(input: &[Vec4], plane: Vec4, output: &mut [Vec4; MAX_POLY_VERTS]) -> usize {
    let Some(&last) = input.last() else {
        return 0;
    };

    let mut out_len = 0usize;
    let mut push = |v: Vec4, out_len: &mut usize| {
        if *out_len < MAX_POLY_VERTS {
            output[*out_len] = v;
            *out_len += 1;
        }
    };

    let mut p0 = last;
    let mut dist0 = plane_distance(plane, p0);
    for &p1 in input {
        let dist1 = plane_distance(plane, p1);
        let p0_inside = !dist0.is_sign_negative();
        if p0_inside {
            push(p0, &mut out_len);
        }
        if dist0.is_sign_negative() != dist1.is_sign_negative() {
            // Always interpolate from the inside vertex for consistent round-off
            let inter = if p0_inside {
                let t = dist0 / (dist0 - dist1);
                p0 + (p1 - p0) * t
            } else {
                let t = dist1 / (dist1 - dist0);
                p1 + (p0 - p1) * t
            };
            push(inter, &mut out_len);
        }
        p0 = p1;
        dist0 = dist1;
    }
    out_len
}

/// Per-plane lane masks of triangles straddling each plane. Lanes completely
/// outside an enabled plane are removed from `tri_mask`.
pub(crate) fn classify_batch<const L: usize>(
    batch: &TriangleBatch<L>,
    planes: &FrustumPlanes,
    clip_planes: ClipPlanes,
    tri_mask: &mut u32,
) -> [u32; 5] {
    let mut straddle = [0u32; 5];
    for (p, flag) in PLANE_ORDER.iter().enumerate() {
        if !clip_planes.contains(*flag) {
            continue;
        }
        let mut in_mask = 0u32;
        let mut out_mask = 0u32;
        for (lane, tri) in batch.iter().enumerate() {
            let neg = tri.map(|v| planes.classify_distance(p, v).is_sign_negative());
            if !neg[0] && !neg[1] && !neg[2] {
                in_mask |= 1 << lane;
            }
            if neg[0] && neg[1] && neg[2] {
                out_mask |= 1 << lane;
            }
        }
        straddle[p] = !out_mask & !in_mask;
        *tri_mask &= !out_mask;
    }
    straddle
}

/// Clip one triangle against every enabled plane it straddles.
fn clip_triangle(
    tri: &[Vec4; 3],
    lane_bit: u32,
    straddle: &[u32; 5],
    clip_planes: ClipPlanes,
    planes: &FrustumPlanes,
) -> ([Vec4; MAX_POLY_VERTS], usize) {
    let mut buffers = [[Vec4::ZERO; MAX_POLY_VERTS]; 2];
    buffers[0][..3].copy_from_slice(tri);
    let mut current = 0usize;
    let mut count = 3usize;

    for (p, flag) in PLANE_ORDER.iter().enumerate() {
        if straddle[p] & lane_bit != 0 && clip_planes.contains(*flag) {
            let [a, b] = &mut buffers;
            let (src, dst) = if current == 0 { (&*a, b) } else { (&*b, a) };
            count = clip_polygon(&src[..count], planes.planes[p], dst);
            current ^= 1;
        }
    }
    (buffers[current], count)
}

/// Clip straddling lanes of `batch` and queue the resulting sub-triangles.
///
/// With `preserve_order`, a batch containing any straddling triangle pushes all
/// of its clip-eligible triangles through the queue so submission order holds.
/// Otherwise the first sub-triangle replaces its lane and the rest are queued.
#[allow(clippy::too_many_arguments)]
pub(crate) fn clip_batch<const L: usize>(
    batch: &mut TriangleBatch<L>,
    tri_mask: &mut u32,
    tri_clip_mask: u32,
    clip_planes: ClipPlanes,
    planes: &FrustumPlanes,
    preserve_order: bool,
    queue: &mut VecDeque<[Vec4; 3]>,
) {
    if tri_clip_mask == 0 {
        return;
    }

    let straddle = classify_batch(batch, planes, clip_planes, tri_mask);
    let any_straddle = straddle.iter().fold(0, |acc, m| acc | m);

    fn enqueue_fan(poly: &[Vec4], first: usize, queue: &mut VecDeque<[Vec4; 3]>) {
        for i in first..poly.len() - 1 {
            queue.push_back([poly[0], poly[i], poly[i + 1]]);
        }
    }

    if preserve_order {
        let mut clip_mask = tri_clip_mask & *tri_mask;
        if any_straddle & clip_mask == 0 {
            return;
        }
        while clip_mask != 0 {
            let lane = clip_mask.trailing_zeros() as usize;
            clip_mask &= clip_mask - 1;
            let (poly, count) = clip_triangle(&batch[lane], 1 << lane, &straddle, clip_planes, planes);
            if count >= 3 {
                enqueue_fan(&poly[..count], 1, queue);
            }
        }
        // Every triangle now lives in the queue and is rasterized from there
        *tri_mask = 0;
    } else {
        let mut clip_mask = any_straddle & tri_clip_mask & *tri_mask;
        while clip_mask != 0 {
            let lane = clip_mask.trailing_zeros() as usize;
            clip_mask &= clip_mask - 1;
            let (poly, count) = clip_triangle(&batch[lane], 1 << lane, &straddle, clip_planes, planes);
            if count >= 3 {
                batch[lane] = [poly[0], poly[1], poly[2]];
                enqueue_fan(&poly[..count], 2, queue);
            } else {
                *tri_mask &= !(1 << lane);
            }
        }
    }
}

/// Pulls triangles from an indexed vertex stream and the clip queue, one
/// batch of `L` lanes at a time.
pub(crate) struct BatchAssembler<'a, const L: usize> {
    vertices: &'a [f32],
    indices: &'a [u32],
    num_tris: usize,
    tri_index: usize,
    model_to_clip: Option<&'a Mat4>,
    layout: VertexLayout,
    clip_planes: ClipPlanes,
    planes: FrustumPlanes,
    preserve_order: bool,
    queue: VecDeque<[Vec4; 3]>,
}

impl<'a, const L: usize> BatchAssembler<'a, L> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        vertices: &'a [f32],
        indices: &'a [u32],
        model_to_clip: Option<&'a Mat4>,
        layout: VertexLayout,
        clip_planes: ClipPlanes,
        planes: FrustumPlanes,
        preserve_order: bool,
    ) -> Self {
        Self {
            vertices,
            indices,
            num_tris: indices.len() / 3,
            tri_index: 0,
            model_to_clip,
            layout,
            clip_planes,
            planes,
            preserve_order,
            queue: VecDeque::new(),
        }
    }

    #[inline]
    pub(crate) fn num_triangles(&self) -> usize {
        self.num_tris
    }

    /// Fill `batch` with the next triangles. Returns the mask of live lanes,
    /// which may be zero when everything was culled or queued, or `None` once
    /// the input and the clip queue are exhausted.
    pub(crate) fn next_batch(&mut self, batch: &mut TriangleBatch<L>) -> Option<u32> {
        let remaining = self.num_tris - self.tri_index;
        if remaining == 0 && self.queue.is_empty() {
            return None;
        }

        let mut tri_mask;
        let tri_clip_mask;
        if !self.queue.is_empty() {
            let clipped = self.queue.len().min(L);
            // Preserving order drains the queue before gathering new triangles
            let num_lanes = if self.preserve_order { 0 } else { (L - clipped).min(remaining) };

            *batch = [[IDLE_VERTEX; 3]; L];
            if num_lanes > 0 {
                self.gather(num_lanes, batch);
            }
            for lane in num_lanes..num_lanes + clipped {
                if let Some(tri) = self.queue.pop_front() {
                    batch[lane] = tri;
                }
            }
            self.tri_index += num_lanes;

            tri_mask = lane_mask(clipped + num_lanes);
            // Already clipped triangles are never clipped again
            tri_clip_mask = lane_mask(num_lanes);
        } else {
            let num_lanes = L.min(remaining);
            tri_mask = lane_mask(num_lanes);
            tri_clip_mask = tri_mask;
            self.gather(num_lanes, batch);
            self.tri_index += num_lanes;
        }

        if !self.clip_planes.is_empty() {
            clip_batch(
                batch,
                &mut tri_mask,
                tri_clip_mask,
                self.clip_planes,
                &self.planes,
                self.preserve_order,
                &mut self.queue,
            );
        }
        Some(tri_mask)
    }

    fn gather(&self, num_lanes: usize, batch: &mut TriangleBatch<L>) {
        gather_triangles(
            self.vertices,
            self.indices,
            self.tri_index,
            num_lanes,
            self.model_to_clip,
            &self.layout,
            batch,
        );
    }
}

/// Mask with the low `lanes` bits set.
#[inline]
pub(crate) fn lane_mask(lanes: usize) -> u32 {
    if lanes >= 32 {
        !0
    } else {
        (1u32 << lanes) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planes_for(width: u32, height: u32) -> FrustumPlanes {
        let mut planes = FrustumPlanes::new(0.0);
        planes.set_resolution(width, height);
        planes
    }

    #[test]
    fn test_clip_polygon_inside_is_unchanged() {
        let tri = [Vec4::new(-0.5, -0.5, 0.0, 1.0), Vec4::new(0.5, -0.5, 0.0, 1.0), Vec4::new(0.0, 0.5, 0.0, 1.0)];
        let mut out = [Vec4::ZERO; MAX_POLY_VERTS];
        let n = clip_polygon(&tri, Vec4::new(0.0, 0.0, 1.0, 0.0), &mut out);
        assert_eq!(n, 3);
        // Output starts from the last input vertex
        assert_eq!(out[0], tri[2]);
        assert_eq!(out[1], tri[0]);
        assert_eq!(out[2], tri[1]);
    }

    #[test]
    fn test_clip_polygon_near_plane_splits_triangle() {
        // One vertex behind the near plane w >= 1
        let tri = [Vec4::new(0.0, 0.0, 0.0, 0.0), Vec4::new(1.0, 0.0, 0.0, 2.0), Vec4::new(0.0, 1.0, 0.0, 2.0)];
        let mut out = [Vec4::ZERO; MAX_POLY_VERTS];
        let n = clip_polygon(&tri, Vec4::new(0.0, 0.0, 1.0, -1.0), &mut out);
        assert_eq!(n, 4, "Clipping one corner of a triangle yields a quad");
        for v in &out[..n] {
            assert!(v.w >= 1.0 - 1e-6, "Vertex {:?} lies behind the near plane", v);
        }
    }

    #[test]
    fn test_clip_polygon_fully_outside() {
        let tri = [Vec4::new(0.0, 0.0, 0.0, -1.0), Vec4::new(1.0, 0.0, 0.0, -2.0), Vec4::new(0.0, 1.0, 0.0, -1.5)];
        let mut out = [Vec4::ZERO; MAX_POLY_VERTS];
        assert_eq!(clip_polygon(&tri, Vec4::new(0.0, 0.0, 1.0, 0.0), &mut out), 0);
    }

    #[test]
    fn test_classify_batch_culls_outside_lanes() {
        let planes = planes_for(64, 64);
        let inside = [Vec4::new(-0.5, -0.5, 0.0, 1.0), Vec4::new(0.5, -0.5, 0.0, 1.0), Vec4::new(0.0, 0.5, 0.0, 1.0)];
        let behind = inside.map(|v| Vec4::new(v.x, v.y, 0.0, -1.0));
        let straddling = [Vec4::new(-2.0, 0.0, 0.0, 1.0), Vec4::new(0.5, -0.5, 0.0, 1.0), Vec4::new(0.0, 0.5, 0.0, 1.0)];
        let batch: TriangleBatch<4> = [inside, behind, straddling, [IDLE_VERTEX; 3]];

        let mut tri_mask = 0b0111;
        let straddle = classify_batch(&batch, &planes, ClipPlanes::ALL, &mut tri_mask);
        assert_eq!(tri_mask, 0b0101, "Triangle behind the camera must be culled");
        assert_eq!(straddle[1] & 0b0100, 0b0100, "Lane 2 straddles the left plane");
        assert_eq!(straddle[1] & 0b0001, 0, "Lane 0 is inside the left plane");
    }

    #[test]
    fn test_preserve_order_queues_whole_batch() {
        let planes = planes_for(64, 64);
        let inside = [Vec4::new(-0.5, -0.5, 0.0, 1.0), Vec4::new(0.5, -0.5, 0.0, 1.0), Vec4::new(0.0, 0.5, 0.0, 1.0)];
        let straddling = [Vec4::new(-2.0, 0.0, 0.0, 1.0), Vec4::new(0.5, -0.5, 0.0, 1.0), Vec4::new(0.0, 0.5, 0.0, 1.0)];
        let mut batch: TriangleBatch<4> = [inside, straddling, [IDLE_VERTEX; 3], [IDLE_VERTEX; 3]];
        let mut queue = VecDeque::new();
        let mut tri_mask = 0b0011;

        clip_batch(&mut batch, &mut tri_mask, 0b0011, ClipPlanes::ALL, &planes, true, &mut queue);
        assert_eq!(tri_mask, 0);
        assert!(queue.len() >= 2);
        assert_eq!(queue[0], inside, "The unclipped triangle is queued first, untouched");
    }

    #[test]
    fn test_reordering_mode_keeps_lane_for_first_piece() {
        let planes = planes_for(64, 64);
        let inside = [Vec4::new(-0.5, -0.5, 0.0, 1.0), Vec4::new(0.5, -0.5, 0.0, 1.0), Vec4::new(0.0, 0.5, 0.0, 1.0)];
        let straddling = [Vec4::new(-2.0, 0.0, 0.0, 1.0), Vec4::new(0.5, -0.5, 0.0, 1.0), Vec4::new(0.0, 0.5, 0.0, 1.0)];
        let mut batch: TriangleBatch<4> = [inside, straddling, [IDLE_VERTEX; 3], [IDLE_VERTEX; 3]];
        let mut queue = VecDeque::new();
        let mut tri_mask = 0b0011;

        clip_batch(&mut batch, &mut tri_mask, 0b0011, ClipPlanes::ALL, &planes, false, &mut queue);
        assert_eq!(tri_mask, 0b0011);
        assert_eq!(batch[0], inside, "Unclipped lanes stay in place");
        assert!(batch[1].iter().all(|v| v.x >= -v.w / (1.0 - 2.0 / 64.0) - 1e-5));
        assert_eq!(queue.len(), 1, "A quad splits into the lane triangle plus one queued triangle");
    }

    #[test]
    fn test_assembler_drains_queue() {
        // Two triangles, the second crosses the near plane
        let vertices = [
            -0.5, -0.5, 0.0, 1.0, //
            0.5, -0.5, 0.0, 1.0, //
            0.0, 0.5, 0.0, 1.0, //
            0.0, 0.0, 0.0, -1.0,
        ];
        let indices = [0u32, 1, 2, 0, 1, 3];
        let mut assembler = BatchAssembler::<4>::new(
            &vertices,
            &indices,
            None,
            VertexLayout::XYZW,
            ClipPlanes::NEAR,
            planes_for(64, 64),
            true,
        );
        assert_eq!(assembler.num_triangles(), 2);

        let mut batch = [[IDLE_VERTEX; 3]; 4];
        let mut live = 0;
        let mut batches = 0;
        while let Some(mask) = assembler.next_batch(&mut batch) {
            live += mask.count_ones();
            batches += 1;
            assert!(batches < 10, "Assembler must terminate");
        }
        assert_eq!(batches, 2, "One gather batch, one batch draining the clip queue");
        assert!(live >= 2);
    }

    #[test]
    fn test_lane_mask() {
        assert_eq!(lane_mask(0), 0);
        assert_eq!(lane_mask(4), 0xf);
        assert_eq!(lane_mask(16), 0xffff);
    }
}

//! Clipping spherical edges to cube faces and 2D edges to rectangles
//!
//! A geodesic edge AB is defined by the great circle through A and B, which
//! is represented by its normal `N = A x B`. Every question about where the
//! edge enters or leaves a face is answered from that normal alone, so the
//! pieces produced for consecutive faces always join up even when the
//! endpoint projections carry rounding error.

use crate::projection::{self, uvw_face};
use crate::r1::R1Interval;
use crate::r2::{R2Point, R2Rect, coord};
use geo::Coord;
use glam::DVec3;
use smallvec::SmallVec;

/// Maximum angular error of the clipped endpoints, in radians
pub const FACE_CLIP_ERROR_RADIANS: f64 = 3.0 * f64::EPSILON;

/// Maximum error of a clipped (u,v) coordinate, per axis
pub const FACE_CLIP_ERROR_UV_COORD: f64 = 9.0 * std::f64::consts::FRAC_1_SQRT_2 * f64::EPSILON;

/// Maximum error of `clip_edge_bound` results, per axis
pub const EDGE_CLIP_ERROR_UV_COORD: f64 = 2.25 * f64::EPSILON;

/// The piece of an edge lying on a single cube face
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceSegment {
    pub face: u8,
    pub a: R2Point,
    pub b: R2Point,
}

/// An edge crosses at most six faces
pub type FaceSegmentVec = SmallVec<[FaceSegment; 6]>;

/// A vector orthogonal to `a`, stable for any input direction
pub fn ortho(a: DVec3) -> DVec3 {
    let abs = a.abs();
    let largest = if abs.x > abs.y {
        if abs.x > abs.z { 0 } else { 2 }
    } else if abs.y > abs.z {
        1
    } else {
        2
    };
    let k = if largest == 0 { 2 } else { largest - 1 };
    let mut temp = DVec3::new(0.012, 0.0053, 0.00457);
    temp[k] = 1.0;
    a.cross(temp).normalize()
}

/// `2 (A x B)` computed as `(B + A) x (B - A)`, which stays accurate when A
/// and B are nearly identical. Falls back to any orthogonal vector when the
/// two points coincide or are antipodal.
pub fn robust_cross_prod(a: DVec3, b: DVec3) -> DVec3 {
    let x = (b + a).cross(b - a);
    if x != DVec3::ZERO {
        return x;
    }
    ortho(a)
}

/// Value at `x` of the linear function through `(a, a1)` and `(b, b1)`,
/// interpolating from whichever endpoint is closer to `x`
#[inline]
pub fn interpolate(x: f64, a: f64, b: f64, a1: f64, b1: f64) -> f64 {
    debug_assert!(a != b);
    if (a - x).abs() <= (b - x).abs() {
        a1 + (b1 - a1) * (x - a) / (b - a)
    } else {
        b1 + (a1 - b1) * (x - b) / (a - b)
    }
}

/// `u + v == w`, evaluated exactly
#[inline]
fn sum_equals(u: f64, v: f64, w: f64) -> bool {
    u + v == w && u == w - v && v == w - u
}

/// Whether the line with (u,v,w) normal `n` passes through the face square
#[inline]
fn intersects_face(n: DVec3) -> bool {
    let u = n.x.abs();
    let v = n.y.abs();
    let w = n.z.abs();
    v >= w - u && u >= w - v
}

/// Whether the line with normal `n` crosses two opposite edges of the square
#[inline]
fn intersects_opposite_edges(n: DVec3) -> bool {
    let u = n.x.abs();
    let v = n.y.abs();
    let w = n.z.abs();
    if (u - v).abs() != w {
        return (u - v).abs() >= w;
    }
    // A line through a corner counts as crossing opposite edges.
    if u >= v { u - w >= v } else { v - w >= u }
}

/// Axis of the face edge where the directed line leaves the face: 0 for a
/// `u = +-1` edge, 1 for a `v = +-1` edge
fn exit_axis(n: DVec3) -> usize {
    debug_assert!(intersects_face(n));
    if intersects_opposite_edges(n) {
        if n.x.abs() >= n.y.abs() { 1 } else { 0 }
    } else {
        debug_assert!(n.x != 0.0 && n.y != 0.0 && n.z != 0.0);
        let negatives = n.x.is_sign_negative() ^ n.y.is_sign_negative() ^ n.z.is_sign_negative();
        if negatives { 0 } else { 1 }
    }
}

/// (u,v) where the directed line leaves the face through `axis`
fn exit_point(n: DVec3, axis: usize) -> R2Point {
    if axis == 0 {
        let u = if n.y > 0.0 { 1.0 } else { -1.0 };
        Coord {
            x: u,
            y: (-u * n.x - n.z) / n.y,
        }
    } else {
        let v = if n.x < 0.0 { 1.0 } else { -1.0 };
        Coord {
            x: (-v * n.y - n.z) / n.x,
            y: v,
        }
    }
}

/// Reproject the origin `a` of AB onto an adjacent face when rounding left
/// the line AB missing `face`, or leaving it on the wrong side of `a`
fn move_origin_to_valid_face(face: u8, a: DVec3, ab: DVec3, a_uv: &mut R2Point) -> u8 {
    let max_safe_uv_coord = 1.0 - FACE_CLIP_ERROR_UV_COORD;
    if a_uv.x.abs().max(a_uv.y.abs()) <= max_safe_uv_coord {
        return face;
    }
    let n = projection::face_xyz_to_uvw(face, ab);
    if intersects_face(n) {
        let exit = projection::face_uv_to_xyz(face, exit_point(n, exit_axis(n)));
        let a_tangent = ab.normalize().cross(a);
        if (exit - a).dot(a_tangent) >= -FACE_CLIP_ERROR_RADIANS {
            return face;
        }
    }
    // A line that misses this face passes through all of its neighbours.
    let face = if a_uv.x.abs() >= a_uv.y.abs() {
        uvw_face(face, 0, a_uv.x > 0.0)
    } else {
        uvw_face(face, 1, a_uv.y > 0.0)
    };
    debug_assert!(intersects_face(projection::face_xyz_to_uvw(face, ab)));
    let uv = projection::valid_face_xyz_to_uv(face, a);
    *a_uv = Coord {
        x: uv.x.clamp(-1.0, 1.0),
        y: uv.y.clamp(-1.0, 1.0),
    };
    face
}

/// Face entered after leaving `face` at `exit` through `axis`. If the line
/// leaves exactly through a corner next to `target_face`, go there directly.
fn next_face(face: u8, exit: R2Point, axis: usize, n: DVec3, target_face: u8) -> u8 {
    let other = coord(exit, 1 - axis);
    if other.abs() == 1.0
        && uvw_face(face, 1 - axis, other > 0.0) == target_face
        && sum_equals(exit.x * n.x, exit.y * n.y, -n.z)
    {
        return target_face;
    }
    uvw_face(face, axis, coord(exit, axis) > 0.0)
}

/// Split edge AB into its pieces on each cube face it crosses, in order
/// from A to B. `a` and `b` must be unit length.
pub fn face_segments(a: DVec3, b: DVec3) -> FaceSegmentVec {
    let mut segments = FaceSegmentVec::new();
    let (a_face, a_uv) = projection::xyz_to_face_uv(a);
    let (b_face, b_uv) = projection::xyz_to_face_uv(b);
    let mut segment = FaceSegment {
        face: a_face,
        a: a_uv,
        b: b_uv,
    };
    if a_face == b_face {
        segments.push(segment);
        return segments;
    }
    // The normal is the definition of the line AB from here on; the
    // endpoints are nudged onto faces that line actually crosses.
    let ab = robust_cross_prod(a, b);
    let a_face = move_origin_to_valid_face(a_face, a, ab, &mut segment.a);
    let b_face = move_origin_to_valid_face(b_face, b, -ab, &mut segment.b);

    segment.face = a_face;
    let b_saved = segment.b;
    let mut face = a_face;
    while face != b_face {
        let n = projection::face_xyz_to_uvw(face, ab);
        let axis = exit_axis(n);
        segment.b = exit_point(n, axis);
        segments.push(segment);

        let exit_xyz = projection::face_uv_to_xyz(face, segment.b);
        face = next_face(face, segment.b, axis, n, b_face);
        let exit_uvw = projection::face_xyz_to_uvw(face, exit_xyz);
        segment.face = face;
        segment.a = Coord {
            x: exit_uvw.x,
            y: exit_uvw.y,
        };
    }
    segment.b = b_saved;
    segments.push(segment);
    segments
}

/// Clip the destination of an edge to the face whose (u,v,w) frame all
/// arguments are expressed in. Returns a score in 0..=3; the edge misses the
/// face when the scores of both endpoints sum to 3 or more.
fn clip_destination(
    a: DVec3,
    b: DVec3,
    scaled_n: DVec3,
    a_tangent: DVec3,
    b_tangent: DVec3,
    scale_uv: f64,
    uv: &mut R2Point,
) -> u8 {
    debug_assert!(intersects_face(scaled_n));
    let max_safe_uv_coord = 1.0 - FACE_CLIP_ERROR_UV_COORD;
    if b.z > 0.0 {
        *uv = Coord {
            x: b.x / b.z,
            y: b.y / b.z,
        };
        if uv.x.abs().max(uv.y.abs()) <= max_safe_uv_coord {
            return 0;
        }
    }
    let exit = exit_point(scaled_n, exit_axis(scaled_n));
    *uv = Coord {
        x: scale_uv * exit.x,
        y: scale_uv * exit.y,
    };
    let p = DVec3::new(uv.x, uv.y, 1.0);

    // As the exit point moves along the circle past B it is first on the
    // wrong side of B only, then of both endpoints, then of A only.
    let mut score = 0;
    if (p - a).dot(a_tangent) < 0.0 {
        score = 2;
    } else if (p - b).dot(b_tangent) < 0.0 {
        score = 1;
    }
    if score > 0 {
        if b.z <= 0.0 {
            score = 3;
        } else {
            *uv = Coord {
                x: b.x / b.z,
                y: b.y / b.z,
            };
        }
    }
    score
}

/// Clip edge AB to `face` grown by `padding` in (u,v). Returns the clipped
/// (u,v) endpoints, or `None` if the edge does not reach the padded face.
pub fn clip_to_padded_face(
    a_xyz: DVec3,
    b_xyz: DVec3,
    face: u8,
    padding: f64,
) -> Option<(R2Point, R2Point)> {
    debug_assert!(padding >= 0.0);
    if projection::get_face(a_xyz) == face && projection::get_face(b_xyz) == face {
        return Some((
            projection::valid_face_xyz_to_uv(face, a_xyz),
            projection::valid_face_xyz_to_uv(face, b_xyz),
        ));
    }
    // The cross product must be taken in (x,y,z) before changing frames.
    let mut n = projection::face_xyz_to_uvw(face, robust_cross_prod(a_xyz, b_xyz));
    let a = projection::face_xyz_to_uvw(face, a_xyz);
    let b = projection::face_xyz_to_uvw(face, b_xyz);

    // Scaling the normal's (u,v) is equivalent to testing against the
    // padded square.
    let scale_uv = 1.0 + padding;
    let scaled_n = DVec3::new(scale_uv * n.x, scale_uv * n.y, n.z);
    if !intersects_face(scaled_n) {
        return None;
    }
    // Keep normalize() from underflowing on tiny normals.
    if n.abs().max_element() < 2f64.powi(-511) {
        n *= 2f64.powi(563);
    }
    let n = n.normalize();
    let a_tangent = n.cross(a);
    let b_tangent = b.cross(n);

    let mut a_uv = Coord { x: 0.0, y: 0.0 };
    let mut b_uv = Coord { x: 0.0, y: 0.0 };
    let a_score = clip_destination(b, a, -scaled_n, b_tangent, a_tangent, scale_uv, &mut a_uv);
    let b_score = clip_destination(a, b, scaled_n, a_tangent, b_tangent, scale_uv, &mut b_uv);
    (a_score + b_score < 3).then_some((a_uv, b_uv))
}

/// Clip edge AB to `face`. Returns the clipped (u,v) endpoints, or `None`
/// if the edge does not touch the face.
#[inline]
pub fn clip_to_face(a: DVec3, b: DVec3, face: u8) -> Option<(R2Point, R2Point)> {
    clip_to_padded_face(a, b, face, 0.0)
}

/// Shrink one endpoint of `bound` toward `value`; false if that empties it
#[inline]
fn update_endpoint(bound: &mut R1Interval, end: usize, value: f64) -> bool {
    if end == 0 {
        if bound.hi() < value {
            return false;
        }
        if bound.lo() < value {
            bound.set_lo(value);
        }
    } else {
        if bound.lo() > value {
            return false;
        }
        if bound.hi() > value {
            bound.set_hi(value);
        }
    }
    true
}

/// Clip `bound0` (the bound of the edge along axis 0 of this call) to
/// `clip0`, updating `bound1` with the matching coordinate along the other axis
#[allow(clippy::too_many_arguments)]
fn clip_bound_axis(
    a0: f64,
    b0: f64,
    bound0: &mut R1Interval,
    a1: f64,
    b1: f64,
    bound1: &mut R1Interval,
    diag: usize,
    clip0: &R1Interval,
) -> bool {
    if bound0.lo() < clip0.lo() {
        if bound0.hi() < clip0.lo() {
            return false;
        }
        bound0.set_lo(clip0.lo());
        if !update_endpoint(bound1, diag, interpolate(clip0.lo(), a0, b0, a1, b1)) {
            return false;
        }
    }
    if bound0.hi() > clip0.hi() {
        if bound0.lo() > clip0.hi() {
            return false;
        }
        bound0.set_hi(clip0.hi());
        if !update_endpoint(bound1, 1 - diag, interpolate(clip0.hi(), a0, b0, a1, b1)) {
            return false;
        }
    }
    true
}

/// Which diagonal of its bound the segment AB spans: 0 for a positive
/// slope, 1 for a negative one
#[inline]
pub fn diagonal(a: R2Point, b: R2Point) -> usize {
    ((a.x > b.x) != (a.y > b.y)) as usize
}

/// Shrink `bound`, the current bound of some part of segment AB, to the
/// bound of the portion of AB inside `clip`. Returns false (leaving `bound`
/// unspecified) if that portion is empty.
pub fn clip_edge_bound(a: R2Point, b: R2Point, clip: &R2Rect, bound: &mut R2Rect) -> bool {
    let diag = diagonal(a, b);
    let (mut u, mut v) = (bound[0], bound[1]);
    let ok = clip_bound_axis(a.x, b.x, &mut u, a.y, b.y, &mut v, diag, &clip[0])
        && clip_bound_axis(a.y, b.y, &mut v, a.x, b.x, &mut u, diag, &clip[1]);
    *bound = R2Rect::new(u, v);
    ok
}

//! Cube-face projection between the unit sphere and (face, u, v) coordinates
//!
//! The sphere is projected onto the six faces of the cube `[-1,1]^3`. Each
//! face has a right-handed (u,v,w) frame where `w` is the outward face
//! normal. Face coordinates `(u,v)` are then mapped to `(s,t)` in `[0,1]`
//! with the quadratic transform, which roughly equalizes cell areas, and
//! `(s,t)` is discretized into 30-bit `(i,j)` leaf coordinates.

use crate::r2::R2Point;
use geo::Coord;
use glam::DVec3;

/// Maximum cell subdivision level
pub const MAX_LEVEL: u8 = 30;

/// Number of leaf cells along each axis of a face
pub const MAX_SIZE: u32 = 1 << MAX_LEVEL;

/// Number of (si,ti) half-steps along each axis of a face
pub const MAX_SI_TI: u32 = 1 << (MAX_LEVEL + 1);

/// The (u,v,w) axes of each face, expressed in (x,y,z)
const FACE_UVW_AXES: [[DVec3; 3]; 6] = [
    [DVec3::Y, DVec3::Z, DVec3::X],
    [DVec3::NEG_X, DVec3::Z, DVec3::Y],
    [DVec3::NEG_X, DVec3::NEG_Y, DVec3::Z],
    [DVec3::NEG_Z, DVec3::NEG_Y, DVec3::NEG_X],
    [DVec3::NEG_Z, DVec3::X, DVec3::NEG_Y],
    [DVec3::Y, DVec3::X, DVec3::NEG_Z],
];

/// The face adjacent to each face in the negative and positive direction of
/// each (u,v,w) axis
const FACE_UVW_FACES: [[[u8; 2]; 3]; 6] = [
    [[4, 1], [5, 2], [3, 0]],
    [[0, 3], [5, 2], [4, 1]],
    [[0, 3], [1, 4], [5, 2]],
    [[2, 5], [1, 4], [0, 3]],
    [[2, 5], [3, 0], [1, 4]],
    [[4, 1], [3, 0], [2, 5]],
];

/// Quadratic transform: ST [0, 1] -> UV [-1, 1]
#[inline]
pub fn st_to_uv(s: f64) -> f64 {
    if s >= 0.5 {
        (1.0 / 3.0) * (4.0 * s * s - 1.0)
    } else {
        (1.0 / 3.0) * (1.0 - 4.0 * (1.0 - s) * (1.0 - s))
    }
}

/// Inverse quadratic transform: UV [-1, 1] -> ST [0, 1]
#[inline]
pub fn uv_to_st(u: f64) -> f64 {
    if u >= 0.0 {
        0.5 * (1.0 + 3.0 * u).sqrt()
    } else {
        1.0 - 0.5 * (1.0 - 3.0 * u).sqrt()
    }
}

/// Leaf-cell coordinate containing the given `s` value, clamped to the face
#[inline]
pub fn st_to_ij(s: f64) -> u32 {
    let scaled = (MAX_SIZE as f64 * s - 0.5).round();
    scaled.clamp(0.0, (MAX_SIZE - 1) as f64) as u32
}

/// Minimum `s` value covered by leaf coordinate `i`
#[inline]
pub fn ij_to_st_min(i: u32) -> f64 {
    debug_assert!(i <= MAX_SIZE);
    i as f64 / MAX_SIZE as f64
}

/// Convert an (si,ti) half-step coordinate to `s`
#[inline]
pub fn si_ti_to_st(si: u32) -> f64 {
    debug_assert!(si <= MAX_SI_TI);
    si as f64 / MAX_SI_TI as f64
}

/// Face whose projection contains `p`: the axis of largest magnitude, with
/// faces 3..6 for the negative directions
#[inline]
pub fn get_face(p: DVec3) -> u8 {
    let a = p.abs();
    let mut face = if a.x > a.y {
        if a.x > a.z { 0 } else { 2 }
    } else if a.y > a.z {
        1
    } else {
        2
    };
    if p[face] < 0.0 {
        face += 3;
    }
    face as u8
}

/// (u,v) of `p` on `face`. `p` must lie in the hemisphere of that face.
#[inline]
pub fn valid_face_xyz_to_uv(face: u8, p: DVec3) -> R2Point {
    debug_assert!(p.dot(face_normal(face)) > 0.0);
    let (u, v) = match face {
        0 => (p.y / p.x, p.z / p.x),
        1 => (-p.x / p.y, p.z / p.y),
        2 => (-p.x / p.z, -p.y / p.z),
        3 => (p.z / p.x, p.y / p.x),
        4 => (p.z / p.y, -p.x / p.y),
        _ => (-p.y / p.z, -p.x / p.z),
    };
    Coord { x: u, y: v }
}

/// (u,v) of `p` on `face`, or `None` if `p` is not in that face's hemisphere
pub fn face_xyz_to_uv(face: u8, p: DVec3) -> Option<R2Point> {
    let axis = (face % 3) as usize;
    let positive = if face < 3 { p[axis] > 0.0 } else { p[axis] < 0.0 };
    positive.then(|| valid_face_xyz_to_uv(face, p))
}

/// Face containing `p` and its (u,v) coordinates there
#[inline]
pub fn xyz_to_face_uv(p: DVec3) -> (u8, R2Point) {
    let face = get_face(p);
    (face, valid_face_xyz_to_uv(face, p))
}

/// Point on the cube face (not unit length) for the given (u,v)
#[inline]
pub fn face_uv_to_xyz(face: u8, uv: R2Point) -> DVec3 {
    let (u, v) = (uv.x, uv.y);
    match face {
        0 => DVec3::new(1.0, u, v),
        1 => DVec3::new(-u, 1.0, v),
        2 => DVec3::new(-u, -v, 1.0),
        3 => DVec3::new(-1.0, -v, -u),
        4 => DVec3::new(v, -1.0, -u),
        _ => DVec3::new(v, u, -1.0),
    }
}

/// Express `p` in the (u,v,w) frame of `face`
#[inline]
pub fn face_xyz_to_uvw(face: u8, p: DVec3) -> DVec3 {
    match face {
        0 => DVec3::new(p.y, p.z, p.x),
        1 => DVec3::new(-p.x, p.z, p.y),
        2 => DVec3::new(-p.x, -p.y, p.z),
        3 => DVec3::new(-p.z, -p.y, -p.x),
        4 => DVec3::new(-p.z, p.x, -p.y),
        _ => DVec3::new(p.y, p.x, -p.z),
    }
}

/// Normal of the plane through the origin containing all points with the
/// given `u` on `face` (not unit length)
#[inline]
pub fn u_norm(face: u8, u: f64) -> DVec3 {
    match face {
        0 => DVec3::new(u, -1.0, 0.0),
        1 => DVec3::new(1.0, u, 0.0),
        2 => DVec3::new(1.0, 0.0, u),
        3 => DVec3::new(-u, 0.0, 1.0),
        4 => DVec3::new(0.0, -u, 1.0),
        _ => DVec3::new(0.0, -1.0, -u),
    }
}

/// Normal of the plane through the origin containing all points with the
/// given `v` on `face` (not unit length)
#[inline]
pub fn v_norm(face: u8, v: f64) -> DVec3 {
    match face {
        0 => DVec3::new(-v, 0.0, 1.0),
        1 => DVec3::new(0.0, -v, 1.0),
        2 => DVec3::new(0.0, -1.0, -v),
        3 => DVec3::new(v, -1.0, 0.0),
        4 => DVec3::new(1.0, v, 0.0),
        _ => DVec3::new(-1.0, 0.0, -v),
    }
}

/// Axis `axis` (0 = u, 1 = v, 2 = w) of `face` in (x,y,z)
#[inline]
pub fn uvw_axis(face: u8, axis: usize) -> DVec3 {
    FACE_UVW_AXES[face as usize][axis]
}

/// Outward unit normal of `face`
#[inline]
pub fn face_normal(face: u8) -> DVec3 {
    uvw_axis(face, 2)
}

/// Face adjacent to `face` in the given direction of the given axis
#[inline]
pub fn uvw_face(face: u8, axis: usize, positive: bool) -> u8 {
    FACE_UVW_FACES[face as usize][axis][positive as usize]
}

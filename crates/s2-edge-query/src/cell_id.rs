//! Hierarchical cell identifiers ordered along a Hilbert curve
//!
//! A `CellId` packs a face number (3 bits) and a position along the face's
//! Hilbert curve (61 bits) into a `u64`. The lowest set bit marks the level:
//! a level-`k` cell has `2 * (30 - k)` trailing zeros. This encoding gives
//! every cell's descendants a contiguous id range, which is what the index
//! cursor relies on.

use crate::projection::{self, MAX_LEVEL, MAX_SIZE};
use crate::r1::R1Interval;
use crate::r2::R2Rect;
use glam::DVec3;
use std::fmt;
use std::sync::LazyLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const FACE_BITS: u32 = 3;
pub(crate) const NUM_FACES: u8 = 6;
const POS_BITS: u32 = 2 * MAX_LEVEL as u32 + 1;

/// Bits of (i,j) handled per lookup-table step
const LOOKUP_BITS: u32 = 4;

/// Hilbert curve orientation bits
pub(crate) const SWAP_MASK: u8 = 0x01;
pub(crate) const INVERT_MASK: u8 = 0x02;

/// (i,j) of the child at each Hilbert position, for each orientation
pub(crate) const POS_TO_IJ: [[u8; 4]; 4] = [[0, 1, 3, 2], [0, 2, 3, 1], [3, 2, 0, 1], [3, 1, 0, 2]];

/// Orientation change applied when descending into each Hilbert position
pub(crate) const POS_TO_ORIENTATION: [u8; 4] = [SWAP_MASK, 0, 0, INVERT_MASK | SWAP_MASK];

/// Hilbert position of the child at each `2*i + j`, for each orientation
pub(crate) const IJ_TO_POS: [[u8; 4]; 4] = [[0, 1, 3, 2], [0, 3, 1, 2], [2, 3, 1, 0], [2, 1, 3, 0]];

struct LookupTables {
    /// `(i << 6) | (j << 2) | orientation` -> `(pos << 2) | orientation`
    pos: Vec<u16>,
    /// `(pos << 2) | orientation` -> `(i << 6) | (j << 2) | orientation`
    ij: Vec<u16>,
}

static LOOKUP: LazyLock<LookupTables> = LazyLock::new(|| {
    let size = 1usize << (2 * LOOKUP_BITS + 2);
    let mut tables = LookupTables {
        pos: vec![0; size],
        ij: vec![0; size],
    };
    for orientation in [0, SWAP_MASK, INVERT_MASK, SWAP_MASK | INVERT_MASK] {
        init_lookup_cell(&mut tables, 0, 0, 0, orientation, 0, orientation);
    }
    tables
});

fn init_lookup_cell(
    tables: &mut LookupTables,
    level: u32,
    i: u16,
    j: u16,
    orig_orientation: u8,
    pos: u16,
    orientation: u8,
) {
    if level == LOOKUP_BITS {
        let ij = (i << LOOKUP_BITS) + j;
        tables.pos[((ij << 2) + orig_orientation as u16) as usize] = (pos << 2) + orientation as u16;
        tables.ij[((pos << 2) + orig_orientation as u16) as usize] = (ij << 2) + orientation as u16;
        return;
    }
    let r = &POS_TO_IJ[orientation as usize];
    for (index, &child_ij) in r.iter().enumerate() {
        init_lookup_cell(
            tables,
            level + 1,
            (i << 1) + (child_ij >> 1) as u16,
            (j << 1) + (child_ij & 1) as u16,
            orig_orientation,
            (pos << 2) + index as u16,
            orientation ^ POS_TO_ORIENTATION[index],
        );
    }
}

/// Identifier of a cell in the hierarchical decomposition of the sphere
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellId(u64);

impl CellId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// An invalid id that sorts before every valid one
    #[inline]
    pub const fn none() -> Self {
        Self(0)
    }

    /// An invalid id that sorts after every valid one
    #[inline]
    pub const fn sentinel() -> Self {
        Self(u64::MAX)
    }

    /// Level-0 cell covering a whole cube face
    #[inline]
    pub fn from_face(face: u8) -> Self {
        debug_assert!(face < NUM_FACES);
        Self(((face as u64) << POS_BITS) + Self::lsb_for_level(0))
    }

    /// Leaf cell at the given (i,j) coordinates of `face`
    pub fn from_face_ij(face: u8, i: u32, j: u32) -> Self {
        let lookup = &*LOOKUP;
        let mut n = (face as u64) << (POS_BITS - 1);
        let mut bits = (face & SWAP_MASK) as usize;
        let mask = (1u32 << LOOKUP_BITS) - 1;
        for k in (0..8).rev() {
            bits += (((i >> (k * LOOKUP_BITS)) & mask) as usize) << (LOOKUP_BITS + 2);
            bits += (((j >> (k * LOOKUP_BITS)) & mask) as usize) << 2;
            bits = lookup.pos[bits] as usize;
            n |= ((bits >> 2) as u64) << (k * 2 * LOOKUP_BITS);
            bits &= (SWAP_MASK | INVERT_MASK) as usize;
        }
        Self(n * 2 + 1)
    }

    /// Leaf cell containing the point `p` (need not be unit length)
    pub fn from_point(p: DVec3) -> Self {
        let (face, uv) = projection::xyz_to_face_uv(p);
        let i = projection::st_to_ij(projection::uv_to_st(uv.x));
        let j = projection::st_to_ij(projection::uv_to_st(uv.y));
        Self::from_face_ij(face, i, j)
    }

    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn face(self) -> u8 {
        (self.0 >> POS_BITS) as u8
    }

    /// Position along the face's Hilbert curve, including the level marker bit
    #[inline]
    pub fn pos(self) -> u64 {
        self.0 & (u64::MAX >> FACE_BITS)
    }

    #[inline]
    pub fn lsb(self) -> u64 {
        self.0 & self.0.wrapping_neg()
    }

    #[inline]
    pub const fn lsb_for_level(level: u8) -> u64 {
        1u64 << (2 * (MAX_LEVEL - level) as u32)
    }

    #[inline]
    pub fn level(self) -> u8 {
        debug_assert!(self.0 != 0);
        MAX_LEVEL - (self.0.trailing_zeros() >> 1) as u8
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.face() < NUM_FACES && (self.lsb() & 0x1555_5555_5555_5555) != 0
    }

    #[inline]
    pub fn is_face(self) -> bool {
        (self.0 & (Self::lsb_for_level(0) - 1)) == 0
    }

    #[inline]
    pub fn is_leaf(self) -> bool {
        self.0 & 1 != 0
    }

    /// Smallest leaf-cell id contained by this cell
    #[inline]
    pub fn range_min(self) -> Self {
        Self(self.0 - (self.lsb() - 1))
    }

    /// Largest leaf-cell id contained by this cell
    #[inline]
    pub fn range_max(self) -> Self {
        Self(self.0 + (self.lsb() - 1))
    }

    #[inline]
    pub fn contains(self, other: CellId) -> bool {
        debug_assert!(self.is_valid() && other.is_valid());
        other >= self.range_min() && other <= self.range_max()
    }

    #[inline]
    pub fn intersects(self, other: CellId) -> bool {
        other.range_min() <= self.range_max() && other.range_max() >= self.range_min()
    }

    /// Child at Hilbert position `pos` (0..4). Must not be a leaf.
    #[inline]
    pub fn child(self, pos: u8) -> Self {
        debug_assert!(!self.is_leaf() && pos < 4);
        let new_lsb = self.lsb() >> 2;
        Self(self.0 - 3 * new_lsb + 2 * pos as u64 * new_lsb)
    }

    /// First child in Hilbert order
    #[inline]
    pub fn child_begin(self) -> Self {
        debug_assert!(!self.is_leaf());
        let old_lsb = self.lsb();
        Self(self.0 - old_lsb + (old_lsb >> 2))
    }

    /// Immediate parent. Must not be a face cell.
    #[inline]
    pub fn parent(self) -> Self {
        debug_assert!(!self.is_face());
        let new_lsb = self.lsb() << 2;
        Self((self.0 & new_lsb.wrapping_neg()) | new_lsb)
    }

    /// Ancestor at `level`, which must not exceed this cell's level
    #[inline]
    pub fn parent_at(self, level: u8) -> Self {
        debug_assert!(level <= self.level());
        let new_lsb = Self::lsb_for_level(level);
        Self((self.0 & new_lsb.wrapping_neg()) | new_lsb)
    }

    /// Next cell at the same level along the Hilbert curve (may cross faces)
    #[inline]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(self.lsb() << 1))
    }

    /// Edge length of this cell in leaf-cell units
    #[inline]
    pub fn size_ij(level: u8) -> u32 {
        1u32 << (MAX_LEVEL - level)
    }

    /// Face, leaf (i,j) of the cell's lower-left-most descendant path, and
    /// the Hilbert orientation of this cell
    pub fn to_face_ij_orientation(self) -> (u8, u32, u32, u8) {
        let lookup = &*LOOKUP;
        let face = self.face();
        let mut i = 0u32;
        let mut j = 0u32;
        let mut bits = (face & SWAP_MASK) as usize;
        for k in (0..8u32).rev() {
            let nbits = if k == 7 {
                MAX_LEVEL as u32 - 7 * LOOKUP_BITS
            } else {
                LOOKUP_BITS
            };
            bits += (((self.0 >> (k * 2 * LOOKUP_BITS + 1)) & ((1u64 << (2 * nbits)) - 1))
                as usize)
                << 2;
            bits = lookup.ij[bits] as usize;
            i += ((bits >> (LOOKUP_BITS + 2)) as u32) << (k * LOOKUP_BITS);
            j += (((bits >> 2) & ((1 << LOOKUP_BITS) - 1)) as u32) << (k * LOOKUP_BITS);
            bits &= (SWAP_MASK | INVERT_MASK) as usize;
        }
        // Each trailing "00" pair below the level marker flips the swap bit.
        if self.lsb() & 0x1111_1111_1111_1110 != 0 {
            bits ^= SWAP_MASK as usize;
        }
        (face, i, j, bits as u8)
    }

    /// (u,v) bound of the level-`level` cell containing leaf `(i,j)`
    pub fn ij_level_to_bound_uv(i: u32, j: u32, level: u8) -> R2Rect {
        let cell_size = Self::size_ij(level);
        let axis_bound = |ij: u32| {
            let ij_lo = ij & cell_size.wrapping_neg();
            let ij_hi = ij_lo as u64 + cell_size as u64;
            R1Interval::new(
                projection::st_to_uv(projection::ij_to_st_min(ij_lo)),
                projection::st_to_uv(ij_hi as f64 / MAX_SIZE as f64),
            )
        };
        R2Rect::new(axis_bound(i), axis_bound(j))
    }

    /// (u,v) bound of this cell
    pub fn bound_uv(self) -> R2Rect {
        let (_, i, j, _) = self.to_face_ij_orientation();
        Self::ij_level_to_bound_uv(i, j, self.level())
    }

    /// Compact hex representation with trailing zeros removed
    pub fn to_token(self) -> String {
        if self.0 == 0 {
            return "X".to_string();
        }
        let digits = 16 - (self.0.trailing_zeros() / 4) as usize;
        format!("{:016x}", self.0)[..digits].to_string()
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellId({})", self)
    }
}

/// Face digit followed by the Hilbert child positions, e.g. `2/0313`
impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "Invalid: {:016x}", self.0);
        }
        write!(f, "{}/", self.face())?;
        for level in 1..=self.level() {
            let child_pos = (self.0 >> (POS_BITS - 2 * level as u32)) & 3;
            write!(f, "{child_pos}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_cells() {
        for face in 0..6u8 {
            let id = CellId::from_face(face);
            assert!(id.is_valid());
            assert!(id.is_face());
            assert_eq!(id.face(), face);
            assert_eq!(id.level(), 0);
            assert_eq!(id.to_string(), format!("{face}/"));
        }
        assert!(CellId::from_face(0) < CellId::from_face(1));
        assert_eq!(CellId::from_face(0).next(), CellId::from_face(1));
    }

    #[test]
    fn test_child_parent_roundtrip() {
        let face = CellId::from_face(3);
        for pos in 0..4 {
            let child = face.child(pos);
            assert_eq!(child.level(), 1);
            assert_eq!(child.parent(), face);
            assert!(face.contains(child));
            assert!(!child.contains(face));
        }
        assert_eq!(face.child_begin(), face.child(0));
        assert_eq!(face.child(0).next(), face.child(1));
        assert_eq!(face.child(2).to_string(), "3/2");
    }

    #[test]
    fn test_ranges_are_contiguous() {
        let cell = CellId::from_face(1).child(2).child(1);
        assert_eq!(cell.range_min(), cell.child(0).range_min());
        assert_eq!(cell.range_max(), cell.child(3).range_max());
        assert!(cell.range_min().is_leaf());
        assert!(cell.range_max().is_leaf());
        assert!(cell.intersects(cell.child(3)));
        assert!(!cell.intersects(cell.next()));
    }

    #[test]
    fn test_leaf_and_parent_at() {
        let leaf = CellId::from_face_ij(4, 12345, 67890);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.level(), MAX_LEVEL);
        let ancestor = leaf.parent_at(10);
        assert_eq!(ancestor.level(), 10);
        assert!(ancestor.contains(leaf));
        assert_eq!(leaf.parent_at(0), CellId::from_face(4));
    }

    #[test]
    fn test_face_ij_roundtrip() {
        for face in 0..6u8 {
            for &(i, j) in &[(0, 0), (1, 0), (MAX_SIZE - 1, 17), (123_456_789, 987_654_321)] {
                let id = CellId::from_face_ij(face, i, j);
                let (f, i2, j2, _) = id.to_face_ij_orientation();
                assert_eq!((f, i2, j2), (face, i, j));
            }
        }
    }

    #[test]
    fn test_child_orientation_matches_tables() {
        let parent = CellId::from_face(2).child(1).child(3);
        let (_, _, _, orientation) = parent.to_face_ij_orientation();
        for pos in 0..4u8 {
            let (_, _, _, child_orientation) = parent.child(pos).to_face_ij_orientation();
            assert_eq!(
                child_orientation,
                orientation ^ POS_TO_ORIENTATION[pos as usize]
            );
        }
    }

    #[test]
    fn test_from_point_contains_point() {
        let p = DVec3::new(0.3, -0.2, 0.9).normalize();
        let leaf = CellId::from_point(p);
        let bound = leaf.bound_uv();
        let (_, uv) = projection::xyz_to_face_uv(p);
        assert!(bound.expanded(1e-15).contains_point(uv));
        for level in (0..MAX_LEVEL).step_by(5) {
            let ancestor = leaf.parent_at(level);
            assert!(ancestor.bound_uv().expanded(1e-15).contains_point(uv));
        }
    }

    #[test]
    fn test_face_bound_is_full_square() {
        let bound = CellId::from_face(5).bound_uv();
        assert_eq!(bound.lo().x, -1.0);
        assert_eq!(bound.hi().y, 1.0);
    }

    #[test]
    fn test_token() {
        assert_eq!(CellId::from_face(0).to_token(), "1");
        assert_eq!(CellId::from_face(1).to_token(), "3");
        assert_eq!(CellId::none().to_token(), "X");
    }
}

//! Lightweight geometric view of a cell: (u,v) bound, center, and children
//!
//! A `PaddedCell` carries no index state. Children are derived from the
//! parent incrementally, so descending a whole path costs O(1) per level
//! instead of recomputing each cell's bound from its id.

use crate::cell_id::{CellId, IJ_TO_POS, POS_TO_ORIENTATION};
use crate::projection::{self, MAX_LEVEL};
use crate::r1::R1Interval;
use crate::r2::{R2Point, R2Rect};
use std::cell::Cell;

#[derive(Clone, Debug)]
pub struct PaddedCell {
    id: CellId,
    padding: f64,
    bound: R2Rect,
    /// Lazily computed; empty until first requested
    middle: Cell<R2Rect>,
    /// Minimum (i,j) leaf coordinates covered by this cell
    ij_lo: [u32; 2],
    orientation: u8,
    level: u8,
}

impl PaddedCell {
    /// Padded cell for `id`, with its bound grown by `padding` on every side
    pub fn new(id: CellId, padding: f64) -> Self {
        if id.is_face() {
            let limit = 1.0 + padding;
            return Self {
                id,
                padding,
                bound: R2Rect::new(
                    R1Interval::new(-limit, limit),
                    R1Interval::new(-limit, limit),
                ),
                middle: Cell::new(R2Rect::new(
                    R1Interval::new(-padding, padding),
                    R1Interval::new(-padding, padding),
                )),
                ij_lo: [0, 0],
                orientation: id.face() & 1,
                level: 0,
            };
        }
        let (_, i, j, orientation) = id.to_face_ij_orientation();
        let level = id.level();
        let ij_size = CellId::size_ij(level);
        Self {
            id,
            padding,
            bound: CellId::ij_level_to_bound_uv(i, j, level).expanded(padding),
            middle: Cell::new(R2Rect::empty()),
            ij_lo: [i & ij_size.wrapping_neg(), j & ij_size.wrapping_neg()],
            orientation,
            level,
        }
    }

    /// Child of `parent` in quadrant `(i, j)`, where `i` selects the low (0)
    /// or high (1) half along u and `j` the same along v
    pub fn child(parent: &PaddedCell, i: usize, j: usize) -> Self {
        debug_assert!(i < 2 && j < 2);
        debug_assert!(parent.level < MAX_LEVEL);
        let pos = IJ_TO_POS[parent.orientation as usize][2 * i + j];
        let level = parent.level + 1;
        let ij_size = CellId::size_ij(level);
        // One corner of the child's bound comes from the parent, the
        // diagonally opposite one from the parent's middle.
        let middle = parent.middle();
        let mut bound = parent.bound;
        bound[0][1 - i] = middle[0][1 - i];
        bound[1][1 - j] = middle[1][1 - j];
        Self {
            id: parent.id.child(pos),
            padding: parent.padding,
            bound,
            middle: Cell::new(R2Rect::empty()),
            ij_lo: [
                parent.ij_lo[0] + i as u32 * ij_size,
                parent.ij_lo[1] + j as u32 * ij_size,
            ],
            orientation: parent.orientation ^ POS_TO_ORIENTATION[pos as usize],
            level,
        }
    }

    #[inline]
    pub fn id(&self) -> CellId {
        self.id
    }

    #[inline]
    pub fn padding(&self) -> f64 {
        self.padding
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Padded (u,v) bound of the cell
    #[inline]
    pub fn bound(&self) -> &R2Rect {
        &self.bound
    }

    /// Rectangle where all four children overlap: the cell center, grown by
    /// the padding. With zero padding it degenerates to the exact center.
    pub fn middle(&self) -> R2Rect {
        let cached = self.middle.get();
        if !cached.is_empty() {
            return cached;
        }
        let u = self.center_coord(0);
        let v = self.center_coord(1);
        let middle = R2Rect::new(
            R1Interval::new(u - self.padding, u + self.padding),
            R1Interval::new(v - self.padding, v + self.padding),
        );
        self.middle.set(middle);
        middle
    }

    /// Exact (u,v) center of the unpadded cell
    #[inline]
    pub fn center(&self) -> R2Point {
        geo::Coord {
            x: self.center_coord(0),
            y: self.center_coord(1),
        }
    }

    fn center_coord(&self, axis: usize) -> f64 {
        let ij_size = CellId::size_ij(self.level);
        projection::st_to_uv(projection::si_ti_to_st(2 * self.ij_lo[axis] + ij_size))
    }

    /// Smallest descendant of this cell (possibly itself) whose padded bound
    /// contains `rect`. `rect` must intersect this cell's bound.
    pub fn shrink_to_fit(&self, rect: &R2Rect) -> CellId {
        debug_assert!(self.bound.intersects(rect));
        // If `rect` straddles the center on either axis no child can hold it.
        if self.level == 0 {
            if rect[0].contains(0.0) || rect[1].contains(0.0) {
                return self.id;
            }
        } else if rect[0].contains(self.center_coord(0)) || rect[1].contains(self.center_coord(1))
        {
            return self.id;
        }
        // Find the highest bit where the min and max (i,j) spanned by the
        // padded rect differ; that fixes the deepest level holding both.
        let padded = rect.expanded(self.padding + 1.5 * f64::EPSILON);
        let ij_size = CellId::size_ij(self.level);
        let mut ij_min = [0u32; 2];
        let mut ij_xor = [0u32; 2];
        for d in 0..2 {
            ij_min[d] = self.ij_lo[d].max(projection::st_to_ij(projection::uv_to_st(padded[d][0])));
            let ij_max = (self.ij_lo[d] + ij_size - 1)
                .min(projection::st_to_ij(projection::uv_to_st(padded[d][1])));
            ij_xor[d] = ij_min[d] ^ ij_max;
        }
        let level_msb = ((ij_xor[0] | ij_xor[1]) << 1) + 1;
        let level = MAX_LEVEL - (31 - level_msb.leading_zeros()) as u8;
        if level <= self.level {
            return self.id;
        }
        CellId::from_face_ij(self.id.face(), ij_min[0], ij_min[1]).parent_at(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn pt(x: f64, y: f64) -> R2Point {
        Coord { x, y }
    }

    #[test]
    fn test_face_cell() {
        let pcell = PaddedCell::new(CellId::from_face(2), 0.0);
        assert_eq!(pcell.level(), 0);
        assert_eq!(pcell.bound().lo(), pt(-1.0, -1.0));
        assert_eq!(pcell.bound().hi(), pt(1.0, 1.0));
        assert_eq!(pcell.center(), pt(0.0, 0.0));
    }

    #[test]
    fn test_children_match_direct_construction() {
        let root = PaddedCell::new(CellId::from_face(1).child(2).child(0), 0.0);
        for i in 0..2 {
            for j in 0..2 {
                let child = PaddedCell::child(&root, i, j);
                let direct = PaddedCell::new(child.id(), 0.0);
                assert_eq!(child.id().parent(), root.id());
                assert_eq!(child.level(), direct.level());
                assert_eq!(child.bound(), direct.bound());
                assert_eq!(child.middle(), direct.middle());
                assert_eq!(child.orientation, direct.orientation);
                assert_eq!(child.ij_lo, direct.ij_lo);
            }
        }
    }

    #[test]
    fn test_children_tile_parent_at_center() {
        let root = PaddedCell::new(CellId::from_face(4).child(3), 0.0);
        let center = root.center();
        let lower_left = PaddedCell::child(&root, 0, 0);
        let upper_right = PaddedCell::child(&root, 1, 1);
        assert_eq!(lower_left.bound().hi(), center);
        assert_eq!(upper_right.bound().lo(), center);
        assert_eq!(lower_left.bound().lo(), root.bound().lo());
        assert_eq!(upper_right.bound().hi(), root.bound().hi());
    }

    #[test]
    fn test_padding_grows_bound() {
        let id = CellId::from_face(0).child(1);
        let plain = PaddedCell::new(id, 0.0);
        let padded = PaddedCell::new(id, 0.01);
        assert!(padded.bound().contains(plain.bound()));
        assert!((padded.middle().x().length() - 0.02).abs() < 1e-15);
        assert_eq!(padded.center(), plain.center());
        assert_eq!(padded.padding(), 0.01);
        assert_eq!(PaddedCell::child(&padded, 1, 0).padding(), 0.01);
    }

    #[test]
    fn test_shrink_to_fit_rect_straddling_center() {
        let pcell = PaddedCell::new(CellId::from_face(0), 0.0);
        let rect = R2Rect::from_point_pair(pt(-0.1, 0.2), pt(0.1, 0.3));
        assert_eq!(pcell.shrink_to_fit(&rect), pcell.id());
    }

    #[test]
    fn test_shrink_to_fit_small_rect() {
        let pcell = PaddedCell::new(CellId::from_face(3), 0.0);
        let rect = R2Rect::from_point_pair(pt(0.40, 0.40), pt(0.4001, 0.4001));
        let fit = pcell.shrink_to_fit(&rect);
        assert!(fit.level() > 5);
        assert!(CellId::from_face(3).contains(fit));
        assert!(fit.bound_uv().contains(&rect));
        // No child of the fitted cell contains the whole rect
        if !fit.is_leaf() {
            let fit_cell = PaddedCell::new(fit, 0.0);
            for i in 0..2 {
                for j in 0..2 {
                    assert!(!PaddedCell::child(&fit_cell, i, j).bound().contains(&rect));
                }
            }
        }
    }

    #[test]
    fn test_shrink_to_fit_point_reaches_leaf() {
        let pcell = PaddedCell::new(CellId::from_face(5), 0.0);
        let p = pt(0.123456, -0.654321);
        let fit = pcell.shrink_to_fit(&R2Rect::from_point_pair(p, p));
        assert!(fit.level() >= 25);
        assert!(fit.bound_uv().expanded(1e-15).contains_point(p));
    }
}

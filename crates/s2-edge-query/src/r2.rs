//! Axis-aligned rectangles in (u,v) face coordinates

use crate::r1::R1Interval;
use geo::Coord;
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point in 2D face coordinates
pub type R2Point = Coord<f64>;

/// Component of `p` along axis `d` (0 = u/x, 1 = v/y)
#[inline(always)]
pub fn coord(p: R2Point, d: usize) -> f64 {
    if d == 0 { p.x } else { p.y }
}

/// A closed axis-aligned rectangle, possibly empty
///
/// Unlike `geo::Rect`, which always normalizes its corners, an `R2Rect` can
/// represent the empty set; recursive bound splitting relies on that.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct R2Rect {
    x: R1Interval,
    y: R1Interval,
}

impl R2Rect {
    #[inline]
    pub const fn new(x: R1Interval, y: R1Interval) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn empty() -> Self {
        Self::new(R1Interval::empty(), R1Interval::empty())
    }

    /// Smallest rectangle containing both points
    #[inline]
    pub fn from_point_pair(p1: R2Point, p2: R2Point) -> Self {
        Self::new(
            R1Interval::from_point_pair(p1.x, p2.x),
            R1Interval::from_point_pair(p1.y, p2.y),
        )
    }

    #[inline]
    pub fn x(&self) -> &R1Interval {
        &self.x
    }

    #[inline]
    pub fn y(&self) -> &R1Interval {
        &self.y
    }

    #[inline]
    pub fn lo(&self) -> R2Point {
        Coord {
            x: self.x.lo(),
            y: self.y.lo(),
        }
    }

    #[inline]
    pub fn hi(&self) -> R2Point {
        Coord {
            x: self.x.hi(),
            y: self.y.hi(),
        }
    }

    #[inline]
    pub fn center(&self) -> R2Point {
        Coord {
            x: self.x.center(),
            y: self.y.center(),
        }
    }

    /// A rectangle is empty if either interval is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty()
    }

    #[inline]
    pub fn contains_point(&self, p: R2Point) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y)
    }

    #[inline]
    pub fn contains(&self, other: &R2Rect) -> bool {
        self.x.contains_interval(&other.x) && self.y.contains_interval(&other.y)
    }

    #[inline]
    pub fn intersects(&self, other: &R2Rect) -> bool {
        self.x.intersects(&other.x) && self.y.intersects(&other.y)
    }

    /// Closest point in the rectangle to `p`. The rectangle must be non-empty.
    #[inline]
    pub fn clamp_point(&self, p: R2Point) -> R2Point {
        Coord {
            x: self.x.clamp_point(p.x),
            y: self.y.clamp_point(p.y),
        }
    }

    pub fn expanded(&self, margin: f64) -> Self {
        let x = self.x.expanded(margin);
        let y = self.y.expanded(margin);
        if x.is_empty() || y.is_empty() {
            return Self::empty();
        }
        Self::new(x, y)
    }

    pub fn union(&self, other: &R2Rect) -> Self {
        Self::new(self.x.union(&other.x), self.y.union(&other.y))
    }

    pub fn intersection(&self, other: &R2Rect) -> Self {
        let x = self.x.intersection(&other.x);
        let y = self.y.intersection(&other.y);
        if x.is_empty() || y.is_empty() {
            return Self::empty();
        }
        Self::new(x, y)
    }
}

/// `rect[0]` is the u-interval, `rect[1]` the v-interval
impl Index<usize> for R2Rect {
    type Output = R1Interval;

    #[inline]
    fn index(&self, axis: usize) -> &R1Interval {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => panic!("rect axis out of range: {axis}"),
        }
    }
}

impl IndexMut<usize> for R2Rect {
    #[inline]
    fn index_mut(&mut self, axis: usize) -> &mut R1Interval {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => panic!("rect axis out of range: {axis}"),
        }
    }
}

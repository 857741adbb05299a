//! Closed intervals on the real line

use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A closed interval `[lo, hi]`
///
/// Any interval with `lo > hi` is empty. The canonical empty interval is
/// `[1, 0]`, which keeps `expanded()` and `union()` well-behaved.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct R1Interval {
    lo: f64,
    hi: f64,
}

impl R1Interval {
    #[inline]
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub const fn empty() -> Self {
        Self { lo: 1.0, hi: 0.0 }
    }

    /// Smallest interval containing both values, in any order
    #[inline]
    pub fn from_point_pair(p1: f64, p2: f64) -> Self {
        if p1 <= p2 {
            Self::new(p1, p2)
        } else {
            Self::new(p2, p1)
        }
    }

    #[inline]
    pub fn lo(&self) -> f64 {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> f64 {
        self.hi
    }

    #[inline]
    pub fn set_lo(&mut self, lo: f64) {
        self.lo = lo;
    }

    #[inline]
    pub fn set_hi(&mut self, hi: f64) {
        self.hi = hi;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    #[inline]
    pub fn center(&self) -> f64 {
        0.5 * (self.lo + self.hi)
    }

    /// Length of the interval (negative if empty)
    #[inline]
    pub fn length(&self) -> f64 {
        self.hi - self.lo
    }

    #[inline]
    pub fn contains(&self, p: f64) -> bool {
        p >= self.lo && p <= self.hi
    }

    pub fn contains_interval(&self, other: &R1Interval) -> bool {
        if other.is_empty() {
            return true;
        }
        other.lo >= self.lo && other.hi <= self.hi
    }

    pub fn intersects(&self, other: &R1Interval) -> bool {
        if self.lo <= other.lo {
            other.lo <= self.hi && other.lo <= other.hi
        } else {
            self.lo <= other.hi && self.lo <= self.hi
        }
    }

    /// Closest point in the interval to `p`. The interval must be non-empty.
    #[inline]
    pub fn clamp_point(&self, p: f64) -> f64 {
        debug_assert!(!self.is_empty());
        self.lo.max(self.hi.min(p))
    }

    /// Interval grown by `margin` on both sides. Empty intervals stay empty.
    pub fn expanded(&self, margin: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::new(self.lo - margin, self.hi + margin)
    }

    pub fn union(&self, other: &R1Interval) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    pub fn intersection(&self, other: &R1Interval) -> Self {
        Self::new(self.lo.max(other.lo), self.hi.min(other.hi))
    }
}

impl Default for R1Interval {
    fn default() -> Self {
        Self::empty()
    }
}

/// `interval[0]` is `lo`, `interval[1]` is `hi`
impl Index<usize> for R1Interval {
    type Output = f64;

    #[inline]
    fn index(&self, end: usize) -> &f64 {
        match end {
            0 => &self.lo,
            1 => &self.hi,
            _ => panic!("interval endpoint out of range: {end}"),
        }
    }
}

impl IndexMut<usize> for R1Interval {
    #[inline]
    fn index_mut(&mut self, end: usize) -> &mut f64 {
        match end {
            0 => &mut self.lo,
            1 => &mut self.hi,
            _ => panic!("interval endpoint out of range: {end}"),
        }
    }
}

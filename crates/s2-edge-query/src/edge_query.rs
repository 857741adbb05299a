//! EdgeQuery - Candidate edges that may intersect a query edge
//!
//! The query edge is split into face segments. For each segment, the
//! smallest cell containing its (u,v) bound is located in the index; if the
//! index is subdivided below that cell, a `SubdivisionWalk` descends the
//! quadrants the segment passes through, splitting the segment bound exactly
//! at each cell center. The clipped edge lists of the cells reached form the
//! candidate set: a superset of the indexed edges that cross the query edge.

use crate::cell_id::CellId;
use crate::clip;
use crate::index::{CellRelation, IndexCell, ShapeIndex, ShapeIndexIterator};
use crate::padded_cell::PaddedCell;
use crate::r2::{R2Point, R2Rect};
use crate::shape::ShapeId;

use glam::DVec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for an `EdgeQuery`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeQueryOptions {
    /// Shapes with at most this many edges are not looked up in the index;
    /// every edge is returned as a candidate. Default: 27
    pub max_brute_force_edges: usize,
}

impl Default for EdgeQueryOptions {
    fn default() -> Self {
        Self {
            max_brute_force_edges: 27,
        }
    }
}

/// Candidate edges per shape, in ascending shape id order
pub type EdgeMap = BTreeMap<ShapeId, Vec<usize>>;

/// Finds the indexed edges that may intersect a given edge
///
/// Borrows the index for `'a`; the cells returned by the query methods are
/// borrows of the index, not copies. Reuse one `EdgeQuery` for many queries
/// to keep its scratch allocations.
#[derive(Debug)]
pub struct EdgeQuery<'a> {
    index: &'a ShapeIndex,
    iter: ShapeIndexIterator<'a>,
    /// Cells discovered by the last query
    cells: Vec<&'a IndexCell>,
    options: EdgeQueryOptions,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'a> EdgeQuery<'a> {
    pub fn new(index: &'a ShapeIndex) -> Self {
        Self::with_options(index, EdgeQueryOptions::default())
    }

    pub fn with_options(index: &'a ShapeIndex, options: EdgeQueryOptions) -> Self {
        if !index.is_fresh() {
            tracing::warn!(
                "Querying a shape index with shapes added since the last rebuild; \
                 their edges will not be found"
            );
        }
        Self {
            index,
            iter: index.iter(),
            cells: Vec::new(),
            options,
        }
    }

    #[inline]
    pub fn index(&self) -> &'a ShapeIndex {
        self.index
    }

    #[inline]
    pub fn options(&self) -> &EdgeQueryOptions {
        &self.options
    }

    /// Replace `edges` with the ascending, duplicate-free indices of the
    /// edges of `shape_id` that may intersect edge AB. Returns true if there
    /// is at least one candidate.
    ///
    /// Shapes with at most `max_brute_force_edges` edges yield all of their
    /// edges regardless of geometry. An id not present in the index yields
    /// no candidates.
    pub fn candidates(
        &mut self,
        a: DVec3,
        b: DVec3,
        shape_id: ShapeId,
        edges: &mut Vec<usize>,
    ) -> bool {
        // Profile single-shape candidate lookup (brute force or cell discovery)
        #[cfg(feature = "profiling")]
        profiling::scope!("edge_query::candidates");

        edges.clear();
        let Some(shape) = self.index.shape(shape_id) else {
            return false;
        };
        let num_edges = shape.num_edges();
        if num_edges <= self.options.max_brute_force_edges {
            edges.extend(0..num_edges);
            return !edges.is_empty();
        }

        let num_segments = self.discover_cells(a, b);
        for cell in &self.cells {
            if let Some(clipped) = cell.find_clipped(shape_id) {
                edges.extend_from_slice(clipped.edges());
            }
        }
        // Each cell's list is already sorted and unique.
        if self.cells.len() > 1 || num_segments > 1 {
            edges.sort_unstable();
            edges.dedup();
        }
        !edges.is_empty()
    }

    /// Fill `edge_map` with the candidate edges of every shape that may
    /// intersect edge AB. Returns true if any shape has candidates.
    ///
    /// When the index holds exactly one shape, the map is reused across calls
    /// instead of being cleared: after a call it always holds exactly one
    /// entry for that shape, whose list is empty if there are no candidates.
    /// An empty map therefore does not mean "not yet queried", and a non-empty
    /// map does not mean that candidates were found; use the return value.
    pub fn candidates_by_shape(&mut self, a: DVec3, b: DVec3, edge_map: &mut EdgeMap) -> bool {
        // Profile multi-shape candidate lookup
        #[cfg(feature = "profiling")]
        profiling::scope!("edge_query::candidates_by_shape");

        if self.index.num_shape_ids() == 1 {
            let shape_id = ShapeId(0);
            if edge_map.len() != 1 || !edge_map.contains_key(&shape_id) {
                // Left over from another index.
                edge_map.clear();
            }
            let edges = edge_map.entry(shape_id).or_default();
            return self.candidates(a, b, shape_id, edges);
        }

        edge_map.clear();
        let num_segments = self.discover_cells(a, b);
        for cell in &self.cells {
            for clipped in cell.clipped_shapes() {
                edge_map
                    .entry(clipped.shape_id())
                    .or_default()
                    .extend_from_slice(clipped.edges());
            }
        }
        if self.cells.len() > 1 || num_segments > 1 {
            for edges in edge_map.values_mut() {
                edges.sort_unstable();
                edges.dedup();
            }
        }
        !edge_map.is_empty()
    }

    /// Index cells intersected by edge AB, over the whole sphere. A cell
    /// appears once per face segment that reaches it.
    pub fn cells(&mut self, a: DVec3, b: DVec3) -> &[&'a IndexCell] {
        // Profile raw cell discovery
        #[cfg(feature = "profiling")]
        profiling::scope!("edge_query::cells");

        self.discover_cells(a, b);
        &self.cells
    }

    /// Replace `cells` with the index cells below `root` intersected by edge
    /// AB. Returns false, with `cells` empty, if AB does not reach `root`.
    pub fn cells_in_root(
        &mut self,
        a: DVec3,
        b: DVec3,
        root: &PaddedCell,
        cells: &mut Vec<&'a IndexCell>,
    ) -> bool {
        // Profile root-seeded cell discovery
        #[cfg(feature = "profiling")]
        profiling::scope!("edge_query::cells_in_root");

        self.cells.clear();
        cells.clear();
        if let Some((a_uv, b_uv)) = clip::clip_to_face(a, b, root.id().face()) {
            let edge_bound = R2Rect::from_point_pair(a_uv, b_uv);
            if root.bound().intersects(&edge_bound) {
                SubdivisionWalk::new(a_uv, b_uv, &mut self.iter, &mut self.cells)
                    .visit(root, &edge_bound);
            }
        }
        cells.extend_from_slice(&self.cells);
        !cells.is_empty()
    }

    /// Collect into `self.cells` the index cells intersected by AB. Returns
    /// the number of face segments processed.
    fn discover_cells(&mut self, a: DVec3, b: DVec3) -> usize {
        self.cells.clear();
        let segments = clip::face_segments(a, b);
        for segment in &segments {
            // Start from the smallest cell containing the segment instead of
            // the face cell; most edges are short.
            let edge_bound = R2Rect::from_point_pair(segment.a, segment.b);
            let face_cell = PaddedCell::new(CellId::from_face(segment.face), 0.0);
            let edge_root = face_cell.shrink_to_fit(&edge_bound);

            match self.iter.locate(edge_root) {
                CellRelation::Indexed => {
                    debug_assert!(self.iter.id().contains(edge_root));
                    self.cells.push(self.iter.cell());
                }
                CellRelation::Subdivided => {
                    let root = if edge_root.is_face() {
                        face_cell
                    } else {
                        PaddedCell::new(edge_root, 0.0)
                    };
                    SubdivisionWalk::new(segment.a, segment.b, &mut self.iter, &mut self.cells)
                        .visit(&root, &edge_bound);
                }
                CellRelation::Disjoint => {}
            }
        }
        tracing::trace!(
            "Edge query: {} face segments, {} cells",
            segments.len(),
            self.cells.len()
        );
        segments.len()
    }
}

/// Recursive descent of one face segment AB through the cells below a root
///
/// `visit` is recursive with depth bounded by the maximum cell level.
struct SubdivisionWalk<'w, 'a> {
    a: R2Point,
    b: R2Point,
    iter: &'w mut ShapeIndexIterator<'a>,
    cells: &'w mut Vec<&'a IndexCell>,
}

impl<'w, 'a> SubdivisionWalk<'w, 'a> {
    fn new(
        a: R2Point,
        b: R2Point,
        iter: &'w mut ShapeIndexIterator<'a>,
        cells: &'w mut Vec<&'a IndexCell>,
    ) -> Self {
        Self { a, b, iter, cells }
    }

    /// Add the index cells below `pcell` that the part of AB bounded by
    /// `edge_bound` intersects
    fn visit(&mut self, pcell: &PaddedCell, edge_bound: &R2Rect) {
        self.iter.seek(pcell.id().range_min());
        if self.iter.done() || self.iter.id() > pcell.id().range_max() {
            // Nothing stored at or below this cell.
            return;
        }
        if self.iter.id() == pcell.id() {
            self.cells.push(self.iter.cell());
            return;
        }

        let center = pcell.center();
        if edge_bound[0].hi() < center.x {
            self.clip_v_axis(edge_bound, center.y, 0, pcell);
        } else if edge_bound[0].lo() >= center.x {
            self.clip_v_axis(edge_bound, center.y, 1, pcell);
        } else {
            let [left, right] = self.split_u_bound(edge_bound, center.x);
            if edge_bound[1].hi() < center.y {
                self.visit(&PaddedCell::child(pcell, 0, 0), &left);
                self.visit(&PaddedCell::child(pcell, 1, 0), &right);
            } else if edge_bound[1].lo() >= center.y {
                self.visit(&PaddedCell::child(pcell, 0, 1), &left);
                self.visit(&PaddedCell::child(pcell, 1, 1), &right);
            } else {
                // A straight segment meets at most three of the four quadrants.
                self.clip_v_axis(&left, center.y, 0, pcell);
                self.clip_v_axis(&right, center.y, 1, pcell);
            }
        }
    }

    /// Visit the lower and/or upper child in column `i` of `pcell`, where
    /// `center` is the v-coordinate of the cell center
    fn clip_v_axis(&mut self, edge_bound: &R2Rect, center: f64, i: usize, pcell: &PaddedCell) {
        if edge_bound[1].hi() < center {
            self.visit(&PaddedCell::child(pcell, i, 0), edge_bound);
        } else if edge_bound[1].lo() >= center {
            self.visit(&PaddedCell::child(pcell, i, 1), edge_bound);
        } else {
            let [lower, upper] = self.split_v_bound(edge_bound, center);
            self.visit(&PaddedCell::child(pcell, i, 0), &lower);
            self.visit(&PaddedCell::child(pcell, i, 1), &upper);
        }
    }

    /// Bounds of the parts of the segment on either side of `u`
    fn split_u_bound(&self, edge_bound: &R2Rect, u: f64) -> [R2Rect; 2] {
        let v = edge_bound[1].clamp_point(clip::interpolate(u, self.a.x, self.b.x, self.a.y, self.b.y));
        let diag = clip::diagonal(self.a, self.b);
        split_bound(edge_bound, 0, u, diag, v)
    }

    /// Bounds of the parts of the segment on either side of `v`
    fn split_v_bound(&self, edge_bound: &R2Rect, v: f64) -> [R2Rect; 2] {
        let u = edge_bound[0].clamp_point(clip::interpolate(v, self.a.y, self.b.y, self.a.x, self.b.x));
        let diag = clip::diagonal(self.a, self.b);
        split_bound(edge_bound, diag, u, 0, v)
    }
}

/// Split `edge_bound` at the point (u,v) of the segment. `u_end` and `v_end`
/// are the endpoints of the second child's bound that move to (u,v).
fn split_bound(edge_bound: &R2Rect, u_end: usize, u: f64, v_end: usize, v: f64) -> [R2Rect; 2] {
    let mut first = *edge_bound;
    first[0][1 - u_end] = u;
    first[1][1 - v_end] = v;
    debug_assert!(!first.is_empty());
    debug_assert!(edge_bound.contains(&first));

    let mut second = *edge_bound;
    second[0][u_end] = u;
    second[1][v_end] = v;
    debug_assert!(!second.is_empty());
    debug_assert!(edge_bound.contains(&second));

    [first, second]
}

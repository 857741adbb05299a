//! ShapeIndex - Hierarchical cell index over the edges of a set of shapes
//!
//! Every edge is clipped to each (padded) cube face it reaches, then each
//! face is subdivided recursively until no cell holds more than
//! `max_edges_per_cell` short edges. The non-empty leaf cells of that
//! subdivision are stored in a vector sorted by `CellId`, so the cells of any
//! subtree form a contiguous run that a `ShapeIndexIterator` can seek into.

use crate::cell_id::{CellId, NUM_FACES};
use crate::clip::{self, EDGE_CLIP_ERROR_UV_COORD, FACE_CLIP_ERROR_UV_COORD};
use crate::padded_cell::PaddedCell;
use crate::projection::MAX_LEVEL;
use crate::r2::{R2Point, R2Rect};
use crate::shape::{Shape, ShapeId};
use crate::{IndexError, Result};

use glam::DVec3;
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Padding that absorbs the error of clipping an edge to a face and then
/// to a cell, on both sides of every cell boundary
pub const DEFAULT_CELL_PADDING: f64 = 2.0 * (FACE_CLIP_ERROR_UV_COORD + EDGE_CLIP_ERROR_UV_COORD);

/// Average cell edge length at level 0, as a multiple of `2^-level`
const AVG_EDGE_DERIV: f64 = 1.459_213_746_386_106;

/// Configuration for building a `ShapeIndex`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexOptions {
    /// A cell is subdivided while it holds more than this many short edges.
    /// Default: 10
    pub max_edges_per_cell: usize,
    /// Margin in (u,v) added around every cell when assigning edges.
    /// Default: `DEFAULT_CELL_PADDING`
    pub cell_padding: f64,
    /// Edges longer than this multiple of a cell's size are "long" for that
    /// cell and do not count toward subdividing it. Default: 1.0
    pub cell_size_to_long_edge_ratio: f64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_edges_per_cell: 10,
            cell_padding: DEFAULT_CELL_PADDING,
            cell_size_to_long_edge_ratio: 1.0,
        }
    }
}

impl IndexOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_edges_per_cell == 0 {
            return Err(IndexError::InvalidOptions(
                "max_edges_per_cell must be at least 1".to_string(),
            ));
        }
        if !self.cell_padding.is_finite() || self.cell_padding < DEFAULT_CELL_PADDING {
            return Err(IndexError::InvalidOptions(format!(
                "cell_padding must be finite and at least {DEFAULT_CELL_PADDING:e}, got {}",
                self.cell_padding
            )));
        }
        if !self.cell_size_to_long_edge_ratio.is_finite() || self.cell_size_to_long_edge_ratio <= 0.0
        {
            return Err(IndexError::InvalidOptions(format!(
                "cell_size_to_long_edge_ratio must be positive, got {}",
                self.cell_size_to_long_edge_ratio
            )));
        }
        Ok(())
    }
}

/// The edges of one shape that intersect an index cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippedShape {
    shape_id: ShapeId,
    /// Ascending edge indices
    edges: Vec<usize>,
}

impl ClippedShape {
    #[inline]
    pub fn shape_id(&self) -> ShapeId {
        self.shape_id
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn edge(&self, j: usize) -> usize {
        self.edges[j]
    }

    #[inline]
    pub fn edges(&self) -> &[usize] {
        &self.edges
    }
}

/// Contents of one index cell: a `ClippedShape` per shape present, ordered
/// by shape id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCell {
    clipped: SmallVec<[ClippedShape; 2]>,
}

impl IndexCell {
    #[inline]
    pub fn num_clipped(&self) -> usize {
        self.clipped.len()
    }

    #[inline]
    pub fn clipped(&self, i: usize) -> &ClippedShape {
        &self.clipped[i]
    }

    pub fn clipped_shapes(&self) -> impl Iterator<Item = &ClippedShape> {
        self.clipped.iter()
    }

    /// Clipped edges of `shape_id`, if that shape intersects this cell
    pub fn find_clipped(&self, shape_id: ShapeId) -> Option<&ClippedShape> {
        self.clipped
            .binary_search_by_key(&shape_id, |c| c.shape_id)
            .ok()
            .map(|i| &self.clipped[i])
    }

    /// Total number of clipped edges over all shapes
    pub fn num_edges(&self) -> usize {
        self.clipped.iter().map(ClippedShape::num_edges).sum()
    }
}

/// How a cell relates to the cells stored in an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRelation {
    /// The cell is stored in the index, or is a descendant of a stored cell
    Indexed,
    /// The cell is an ancestor of one or more stored cells
    Subdivided,
    /// The cell does not intersect any stored cell
    Disjoint,
}

/// Summary of the last build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexInfo {
    pub shape_count: usize,
    pub edge_count: usize,
    pub cell_count: usize,
    pub max_level: u8,
}

/// Cell index over a set of shapes
#[derive(Debug, Clone)]
pub struct ShapeIndex {
    shapes: Vec<Arc<dyn Shape>>,
    /// Sorted by cell id, no two cells overlap
    cells: Vec<(CellId, IndexCell)>,
    options: IndexOptions,
    /// Number of shapes added since the cells were last built
    pending: usize,
    info: IndexInfo,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ShapeIndex {
    /// Create an empty index
    pub fn new(options: IndexOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            shapes: Vec::new(),
            cells: Vec::new(),
            options,
            pending: 0,
            info: IndexInfo::default(),
        })
    }

    /// Build an index over `shapes`, assigning ids in iteration order
    pub fn build<I>(shapes: I, options: IndexOptions) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Shape>>,
    {
        let mut index = Self::new(options)?;
        for shape in shapes {
            index.add_arc(shape);
        }
        index.rebuild();
        Ok(index)
    }

    /// Add a shape. Its edges become visible to queries after `rebuild()`.
    pub fn add<S: Shape + 'static>(&mut self, shape: S) -> ShapeId {
        self.add_arc(Arc::new(shape))
    }

    /// Add a shared shape. Its edges become visible to queries after `rebuild()`.
    pub fn add_arc(&mut self, shape: Arc<dyn Shape>) -> ShapeId {
        debug_assert!(self.shapes.len() < u32::MAX as usize);
        let id = ShapeId(self.shapes.len() as u32);
        self.shapes.push(shape);
        self.pending += 1;
        id
    }

    /// True if every added shape is reflected in the cells
    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.pending == 0
    }

    /// Recompute all cells from the current shapes
    ///
    /// Faces are built in parallel and merged sequentially.
    pub fn rebuild(&mut self) {
        // Profile full index construction (clipping + subdivision + merge)
        #[cfg(feature = "profiling")]
        profiling::scope!("index::rebuild");

        let faces: Vec<(Vec<(CellId, IndexCell)>, u8)> = (0..NUM_FACES)
            .into_par_iter()
            .map(|face| {
                let edges = self.face_edges(face);
                FaceBuilder::new(&edges, &self.options).build(face)
            })
            .collect();

        self.cells.clear();
        let mut max_level = 0;
        for (cells, level) in faces {
            self.cells.extend(cells);
            max_level = max_level.max(level);
        }
        self.cells.sort_unstable_by_key(|(id, _)| *id);
        debug_assert!(self.cells.windows(2).all(|w| w[0].0.range_max() < w[1].0.range_min()));

        self.pending = 0;
        self.info = IndexInfo {
            shape_count: self.shapes.len(),
            edge_count: self.shapes.iter().map(|s| s.num_edges()).sum(),
            cell_count: self.cells.len(),
            max_level,
        };
        tracing::debug!(
            "Built shape index: {} shapes, {} edges, {} cells, max level {}",
            self.info.shape_count,
            self.info.edge_count,
            self.info.cell_count,
            self.info.max_level
        );
    }

    /// Clip every edge of every shape to the padded `face`
    fn face_edges(&self, face: u8) -> Vec<FaceEdge> {
        let padding = self.options.cell_padding;
        let ratio = self.options.cell_size_to_long_edge_ratio;
        let mut edges = Vec::new();
        for (shape_index, shape) in self.shapes.iter().enumerate() {
            let shape_id = ShapeId(shape_index as u32);
            for edge_id in 0..shape.num_edges() {
                let edge = shape.edge(edge_id);
                if let Some((a, b)) = clip::clip_to_padded_face(edge.v0, edge.v1, face, padding) {
                    edges.push(FaceEdge {
                        shape_id,
                        edge_id,
                        a,
                        b,
                        max_level: edge_max_level(edge.v0, edge.v1, ratio),
                    });
                }
            }
        }
        edges
    }

    /// Number of shape ids assigned so far
    #[inline]
    pub fn num_shape_ids(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    pub fn shape(&self, id: ShapeId) -> Option<&dyn Shape> {
        self.shapes.get(id.index()).map(|s| s.as_ref())
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Stored cells in ascending id order
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &IndexCell)> {
        self.cells.iter().map(|(id, cell)| (*id, cell))
    }

    #[inline]
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    #[inline]
    pub fn info(&self) -> &IndexInfo {
        &self.info
    }

    /// Cursor positioned at the first cell
    pub fn iter(&self) -> ShapeIndexIterator<'_> {
        ShapeIndexIterator {
            cells: &self.cells,
            pos: 0,
        }
    }
}

/// Deepest level at which edge AB is still short relative to the cell size
fn edge_max_level(a: DVec3, b: DVec3, ratio: f64) -> u8 {
    let cell_size = (a - b).length() * ratio;
    if cell_size <= 0.0 {
        return MAX_LEVEL;
    }
    let level = -(cell_size / AVG_EDGE_DERIV).log2().floor();
    level.clamp(0.0, MAX_LEVEL as f64) as u8
}

/// An edge clipped to one face, in that face's (u,v) coordinates
#[derive(Debug, Clone, Copy)]
struct FaceEdge {
    shape_id: ShapeId,
    edge_id: usize,
    a: R2Point,
    b: R2Point,
    max_level: u8,
}

/// A face edge restricted to the current cell
#[derive(Debug, Clone, Copy)]
struct ClippedEdge {
    /// Index into the face's edge list
    edge: usize,
    bound: R2Rect,
}

struct FaceBuilder<'a> {
    edges: &'a [FaceEdge],
    options: &'a IndexOptions,
    cells: Vec<(CellId, IndexCell)>,
    max_level: u8,
}

impl<'a> FaceBuilder<'a> {
    fn new(edges: &'a [FaceEdge], options: &'a IndexOptions) -> Self {
        Self {
            edges,
            options,
            cells: Vec::new(),
            max_level: 0,
        }
    }

    fn build(mut self, face: u8) -> (Vec<(CellId, IndexCell)>, u8) {
        let root = PaddedCell::new(CellId::from_face(face), self.options.cell_padding);
        let clipped = self
            .edges
            .iter()
            .enumerate()
            .map(|(edge, e)| ClippedEdge {
                edge,
                bound: R2Rect::from_point_pair(e.a, e.b),
            })
            .collect();
        self.update(&root, clipped);
        (self.cells, self.max_level)
    }

    /// Store `clipped` in `pcell`, or distribute it among the children
    fn update(&mut self, pcell: &PaddedCell, clipped: Vec<ClippedEdge>) {
        if clipped.is_empty() {
            return;
        }
        if !self.should_subdivide(pcell, &clipped) {
            let cell = self.make_cell(&clipped);
            self.cells.push((pcell.id(), cell));
            self.max_level = self.max_level.max(pcell.level());
            return;
        }
        for i in 0..2 {
            for j in 0..2 {
                let child = PaddedCell::child(pcell, i, j);
                let child_edges = clipped
                    .iter()
                    .filter_map(|c| {
                        let e = &self.edges[c.edge];
                        let mut bound = c.bound;
                        clip::clip_edge_bound(e.a, e.b, child.bound(), &mut bound)
                            .then_some(ClippedEdge { edge: c.edge, bound })
                    })
                    .collect();
                self.update(&child, child_edges);
            }
        }
    }

    fn should_subdivide(&self, pcell: &PaddedCell, clipped: &[ClippedEdge]) -> bool {
        if pcell.level() >= MAX_LEVEL || clipped.len() <= self.options.max_edges_per_cell {
            return false;
        }
        let short_edges = clipped
            .iter()
            .filter(|c| pcell.level() < self.edges[c.edge].max_level)
            .count();
        short_edges > self.options.max_edges_per_cell
    }

    /// Group `clipped` by shape; face edges are already ordered by (shape, edge)
    fn make_cell(&self, clipped: &[ClippedEdge]) -> IndexCell {
        let mut cell = IndexCell::default();
        for c in clipped {
            let e = &self.edges[c.edge];
            match cell.clipped.last_mut() {
                Some(last) if last.shape_id == e.shape_id => last.edges.push(e.edge_id),
                _ => cell.clipped.push(ClippedShape {
                    shape_id: e.shape_id,
                    edges: vec![e.edge_id],
                }),
            }
        }
        cell
    }
}

/// Seekable cursor over the cells of a `ShapeIndex`, in ascending id order
#[derive(Debug, Clone)]
pub struct ShapeIndexIterator<'a> {
    cells: &'a [(CellId, IndexCell)],
    pos: usize,
}

impl<'a> ShapeIndexIterator<'a> {
    /// Position at the first cell
    #[inline]
    pub fn begin(&mut self) {
        self.pos = 0;
    }

    /// Position at the first cell with id >= `target`
    #[inline]
    pub fn seek(&mut self, target: CellId) {
        self.pos = self.cells.partition_point(|(id, _)| *id < target);
    }

    #[inline]
    pub fn next(&mut self) {
        debug_assert!(!self.done());
        self.pos += 1;
    }

    /// Step back one cell; false (without moving) if already at the first
    #[inline]
    pub fn prev(&mut self) -> bool {
        if self.pos == 0 {
            return false;
        }
        self.pos -= 1;
        true
    }

    #[inline]
    pub fn done(&self) -> bool {
        self.pos >= self.cells.len()
    }

    /// Id of the current cell, or `CellId::sentinel()` when done
    #[inline]
    pub fn id(&self) -> CellId {
        self.cells
            .get(self.pos)
            .map_or(CellId::sentinel(), |(id, _)| *id)
    }

    /// Current cell. Must not be done.
    #[inline]
    pub fn cell(&self) -> &'a IndexCell {
        &self.cells[self.pos].1
    }

    /// Relation of `target` to the stored cells. For `Indexed` the cursor
    /// is left on the stored cell containing `target`; for `Subdivided` on
    /// the first stored descendant.
    pub fn locate(&mut self, target: CellId) -> CellRelation {
        self.seek(target.range_min());
        if !self.done() {
            if self.id() >= target && self.id().range_min() <= target {
                return CellRelation::Indexed;
            }
            if self.id() <= target.range_max() {
                return CellRelation::Subdivided;
            }
        }
        if self.prev() && self.id().range_max() >= target {
            return CellRelation::Indexed;
        }
        CellRelation::Disjoint
    }

    /// Position at the cell containing `p`; false if no stored cell does
    pub fn locate_point(&mut self, p: DVec3) -> bool {
        let target = CellId::from_point(p);
        self.seek(target);
        if !self.done() && self.id().range_min() <= target {
            return true;
        }
        self.prev() && self.id().range_max() >= target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::face_uv_to_xyz;
    use crate::shape::{EdgeVector, Polyline};
    use geo::Coord;

    fn face_point(face: u8, u: f64, v: f64) -> DVec3 {
        face_uv_to_xyz(face, Coord { x: u, y: v }).normalize()
    }

    /// Closed loop of `n` short edges around a small circle on face 0
    fn small_loop(n: usize, radius: f64) -> Polyline {
        let vertices = (0..=n)
            .map(|k| {
                let angle = std::f64::consts::TAU * k as f64 / n as f64;
                face_point(0, 0.3 + radius * angle.cos(), -0.2 + radius * angle.sin())
            })
            .collect();
        Polyline::new(vertices).unwrap()
    }

    #[test]
    fn test_options_default() {
        let options = IndexOptions::default();
        assert_eq!(options.max_edges_per_cell, 10);
        assert_eq!(options.cell_padding, DEFAULT_CELL_PADDING);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let options = IndexOptions {
            max_edges_per_cell: 0,
            ..Default::default()
        };
        assert!(matches!(
            ShapeIndex::new(options),
            Err(IndexError::InvalidOptions(_))
        ));
        let options = IndexOptions {
            cell_padding: f64::NAN,
            ..Default::default()
        };
        assert!(options.validate().is_err());
        let options = IndexOptions {
            cell_size_to_long_edge_ratio: 0.0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_empty_index() {
        let index = ShapeIndex::new(IndexOptions::default()).unwrap();
        assert_eq!(index.num_cells(), 0);
        assert_eq!(index.num_shape_ids(), 0);
        let mut iter = index.iter();
        assert!(iter.done());
        assert_eq!(iter.id(), CellId::sentinel());
        assert_eq!(iter.locate(CellId::from_face(2)), CellRelation::Disjoint);
        assert!(!iter.locate_point(DVec3::X));
    }

    #[test]
    fn test_single_edge_stays_in_face_cell() {
        let mut edges = EdgeVector::new();
        edges
            .push(face_point(0, 0.1, 0.1), face_point(0, 0.2, 0.3))
            .unwrap();
        let mut index = ShapeIndex::new(IndexOptions::default()).unwrap();
        let id = index.add(edges);
        assert!(!index.is_fresh());
        index.rebuild();
        assert!(index.is_fresh());

        assert_eq!(id, ShapeId(0));
        assert_eq!(index.num_cells(), 1);
        let (cell_id, cell) = index.cells().next().unwrap();
        assert_eq!(cell_id, CellId::from_face(0));
        assert_eq!(cell.find_clipped(id).unwrap().edges(), &[0]);
        assert!(cell.find_clipped(ShapeId(1)).is_none());

        let mut iter = index.iter();
        let inside = CellId::from_point(face_point(0, 0.15, 0.2)).parent_at(12);
        assert_eq!(iter.locate(inside), CellRelation::Indexed);
        assert_eq!(iter.id(), CellId::from_face(0));
        assert_eq!(iter.locate(CellId::from_face(1)), CellRelation::Disjoint);
        assert!(iter.locate_point(face_point(0, -0.5, 0.9)));
        assert!(!iter.locate_point(face_point(3, 0.0, 0.0)));
    }

    #[test]
    fn test_many_edges_subdivide() {
        let index = ShapeIndex::build(
            [Arc::new(small_loop(200, 0.05)) as Arc<dyn Shape>],
            IndexOptions::default(),
        )
        .unwrap();
        assert!(index.num_cells() > 1);
        assert!(index.info().max_level > 0);
        assert_eq!(index.info().edge_count, 200);
        for (_, cell) in index.cells() {
            assert!(cell.num_edges() > 0);
            assert_eq!(cell.num_clipped(), 1);
        }

        let mut iter = index.iter();
        assert_eq!(iter.locate(CellId::from_face(0)), CellRelation::Subdivided);
        assert!(CellId::from_face(0).contains(iter.id()));
    }

    #[test]
    fn test_every_edge_is_found_at_its_endpoints() {
        let polyline = small_loop(150, 0.02);
        let vertices = polyline.vertices().to_vec();
        let index =
            ShapeIndex::build([Arc::new(polyline) as Arc<dyn Shape>], IndexOptions::default())
                .unwrap();
        let mut iter = index.iter();
        for (i, edge) in vertices.windows(2).enumerate() {
            for p in edge {
                assert!(iter.locate_point(*p));
                assert!(iter.id().contains(CellId::from_point(*p)));
                let clipped = iter.cell().find_clipped(ShapeId(0)).unwrap();
                assert!(clipped.edges().contains(&i), "edge {i} missing");
            }
        }
    }

    #[test]
    fn test_iterator_order_and_stepping() {
        let index = ShapeIndex::build(
            [Arc::new(small_loop(300, 0.1)) as Arc<dyn Shape>],
            IndexOptions::default(),
        )
        .unwrap();
        let mut iter = index.iter();
        let mut previous = CellId::none();
        let mut count = 0;
        while !iter.done() {
            assert!(iter.id() > previous);
            previous = iter.id();
            iter.next();
            count += 1;
        }
        assert_eq!(count, index.num_cells());
        assert!(iter.prev());
        assert_eq!(iter.id(), previous);

        iter.begin();
        assert!(!iter.prev());
        let first = iter.id();
        iter.seek(first);
        assert_eq!(iter.id(), first);
        iter.seek(first.next());
        assert!(iter.id() > first);
        iter.seek(CellId::sentinel());
        assert!(iter.done());
    }

    #[test]
    fn test_clipped_shapes_sorted_by_id() {
        let mut a = EdgeVector::new();
        let mut b = EdgeVector::new();
        a.push(face_point(2, -0.1, 0.0), face_point(2, 0.1, 0.0))
            .unwrap();
        b.push(face_point(2, 0.0, -0.1), face_point(2, 0.0, 0.1))
            .unwrap();
        let mut index = ShapeIndex::new(IndexOptions::default()).unwrap();
        let id_a = index.add(a);
        let id_b = index.add(b);
        index.rebuild();
        let (_, cell) = index.cells().next().unwrap();
        assert_eq!(cell.num_clipped(), 2);
        assert_eq!(cell.clipped(0).shape_id(), id_a);
        assert_eq!(cell.clipped(1).shape_id(), id_b);
        assert_eq!(cell.find_clipped(id_b).unwrap().edge(0), 0);
        assert_eq!(index.shape(id_b).unwrap().num_edges(), 1);
        assert!(index.shape(ShapeId(2)).is_none());
    }

    #[test]
    fn test_long_edges_do_not_force_subdivision() {
        let mut edges = EdgeVector::new();
        for k in 0..50 {
            let dv = k as f64 * 1e-4;
            edges
                .push(face_point(0, -0.8, -0.1 + dv), face_point(0, 0.8, 0.1 + dv))
                .unwrap();
        }
        let mut index = ShapeIndex::new(IndexOptions::default()).unwrap();
        index.add(edges);
        index.rebuild();
        assert!(index.num_cells() <= 4, "{} cells", index.num_cells());
        assert!(index.info().max_level <= 1);
    }

    #[test]
    fn test_edge_max_level() {
        assert_eq!(edge_max_level(DVec3::X, DVec3::X, 1.0), MAX_LEVEL);
        assert_eq!(edge_max_level(DVec3::X, DVec3::NEG_X, 1.0), 0);
        let short = edge_max_level(DVec3::X, face_point(0, 1e-6, 0.0), 1.0);
        assert!(short > 15 && short < MAX_LEVEL);
    }
}

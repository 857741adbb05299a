//! S2 Edge Query - Candidate edge lookup over a hierarchical cell index on the sphere
//!
//! This library finds, for a geodesic edge on the unit sphere, the indexed
//! edges that could intersect it. It is the broad phase of crossing tests and
//! proximity queries: the result is a small superset of the edges that truly
//! cross the query edge, found by descending only the cells the query edge
//! passes through.
//!
//! # Architecture
//!
//! - **[`ShapeIndex`]**: cube-face cell decomposition storing, per cell, the
//!   edges of each shape that intersect it
//! - **[`EdgeQuery`]**: face segmentation, root-cell selection and recursive
//!   subdivision against the index, producing candidate edges
//! - **[`PaddedCell`]**: (u,v) bound, center and children of a cell
//! - **[`Shape`]**: anything with indexed edges ([`Polyline`], [`EdgeVector`])
//!
//! # Example
//!
//! ```
//! use s2_edge_query::{EdgeQuery, IndexOptions, Polyline, ShapeIndex, ShapeId, utils};
//!
//! let track = Polyline::new(
//!     (0..=40)
//!         .map(|i| utils::lat_lng_to_point(0.0, i as f64 * 0.5))
//!         .collect(),
//! )?;
//! let mut index = ShapeIndex::new(IndexOptions::default())?;
//! let id = index.add(track);
//! index.rebuild();
//!
//! let mut query = EdgeQuery::new(&index);
//! let mut edges = Vec::new();
//! let a = utils::lat_lng_to_point(-1.0, 10.25);
//! let b = utils::lat_lng_to_point(1.0, 10.25);
//! assert!(query.candidates(a, b, id, &mut edges));
//! assert!(edges.contains(&20));
//! # Ok::<(), s2_edge_query::IndexError>(())
//! ```

pub mod cell_id;
pub mod clip;
mod edge_query;
mod index;
pub mod padded_cell;
pub mod projection;
pub mod r1;
pub mod r2;
mod shape;
pub mod utils;

// Public API exports
pub use cell_id::CellId;
pub use edge_query::{EdgeMap, EdgeQuery, EdgeQueryOptions};
pub use index::{
    CellRelation, ClippedShape, DEFAULT_CELL_PADDING, IndexCell, IndexInfo, IndexOptions,
    ShapeIndex, ShapeIndexIterator,
};
pub use padded_cell::PaddedCell;
pub use r1::R1Interval;
pub use r2::{R2Point, R2Rect};
pub use shape::{Edge, EdgeVector, Polyline, Shape, ShapeId};

/// Error types for index and shape construction
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Invalid point at vertex {index}: {reason}")]
    InvalidPoint { index: usize, reason: String },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Shape needs at least two vertices")]
    EmptyShape,
}

pub type Result<T> = std::result::Result<T, IndexError>;

//! Shapes stored in a `ShapeIndex`: anything that can enumerate its edges

use crate::{IndexError, Result, utils};
use geo::{LineString, Point};
use glam::DVec3;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier assigned to a shape when it is added to an index
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeId(pub u32);

impl ShapeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// A geodesic edge between two unit-length points
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge {
    pub v0: DVec3,
    pub v1: DVec3,
}

impl Edge {
    #[inline]
    pub fn new(v0: DVec3, v1: DVec3) -> Self {
        Self { v0, v1 }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.v0 == self.v1
    }
}

/// A collection of edges addressed by index `0..num_edges()`
pub trait Shape: fmt::Debug + Send + Sync {
    fn num_edges(&self) -> usize;

    /// Edge `i`, for `i < num_edges()`
    fn edge(&self, i: usize) -> Edge;
}

/// Normalize `p` onto the unit sphere, rejecting points that have no direction
pub(crate) fn unit_vertex(p: DVec3, index: usize) -> Result<DVec3> {
    if !p.is_finite() || p.length_squared() == 0.0 {
        return Err(IndexError::InvalidPoint {
            index,
            reason: format!("cannot project ({}, {}, {}) onto the sphere", p.x, p.y, p.z),
        });
    }
    if !utils::is_unit_length(p) {
        tracing::warn!(
            "Normalizing non-unit vertex {} (length {})",
            index,
            p.length()
        );
        return Ok(p.normalize());
    }
    Ok(p)
}

/// A connected chain of vertices; edge `i` joins vertices `i` and `i + 1`
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polyline {
    vertices: Vec<DVec3>,
}

impl Polyline {
    /// Build a polyline from points on (or near) the unit sphere
    pub fn new(vertices: Vec<DVec3>) -> Result<Self> {
        if vertices.len() < 2 {
            return Err(IndexError::EmptyShape);
        }
        let vertices = vertices
            .into_iter()
            .enumerate()
            .map(|(i, p)| unit_vertex(p, i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { vertices })
    }

    /// Build a polyline from WGS84 points (`x` = longitude, `y` = latitude)
    pub fn from_lng_lat(points: &[Point<f64>]) -> Result<Self> {
        Self::new(
            points
                .iter()
                .map(|p| utils::lat_lng_to_point(p.y(), p.x()))
                .collect(),
        )
    }

    /// Build a polyline from a WGS84 line string (`x` = longitude, `y` = latitude)
    pub fn from_line_string(line: &LineString<f64>) -> Result<Self> {
        Self::new(
            line.coords()
                .map(|c| utils::lat_lng_to_point(c.y, c.x))
                .collect(),
        )
    }

    #[inline]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }
}

impl Shape for Polyline {
    #[inline]
    fn num_edges(&self) -> usize {
        self.vertices.len() - 1
    }

    #[inline]
    fn edge(&self, i: usize) -> Edge {
        Edge::new(self.vertices[i], self.vertices[i + 1])
    }
}

/// A set of unrelated edges
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeVector {
    edges: Vec<Edge>,
}

impl EdgeVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the edge AB, normalizing its endpoints
    pub fn push(&mut self, a: DVec3, b: DVec3) -> Result<()> {
        let index = 2 * self.edges.len();
        let edge = Edge::new(unit_vertex(a, index)?, unit_vertex(b, index + 1)?);
        self.edges.push(edge);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl Shape for EdgeVector {
    #[inline]
    fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    fn edge(&self, i: usize) -> Edge {
        self.edges[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_edges() {
        let polyline = Polyline::new(vec![DVec3::X, DVec3::Y, DVec3::Z]).unwrap();
        assert_eq!(polyline.num_vertices(), 3);
        assert_eq!(polyline.num_edges(), 2);
        assert_eq!(polyline.edge(1), Edge::new(DVec3::Y, DVec3::Z));
    }

    #[test]
    fn test_polyline_requires_two_vertices() {
        assert!(matches!(
            Polyline::new(vec![DVec3::X]),
            Err(IndexError::EmptyShape)
        ));
    }

    #[test]
    fn test_polyline_normalizes_vertices() {
        let polyline = Polyline::new(vec![DVec3::new(2.0, 0.0, 0.0), DVec3::Y]).unwrap();
        assert_eq!(polyline.vertices()[0], DVec3::X);
    }

    #[test]
    fn test_polyline_rejects_invalid_vertices() {
        let result = Polyline::new(vec![DVec3::X, DVec3::ZERO]);
        assert!(matches!(
            result,
            Err(IndexError::InvalidPoint { index: 1, .. })
        ));
        let result = Polyline::new(vec![DVec3::new(f64::NAN, 0.0, 1.0), DVec3::X]);
        assert!(result.is_err());
    }

    #[test]
    fn test_polyline_from_lng_lat() {
        let polyline =
            Polyline::from_lng_lat(&[Point::new(0.0, 0.0), Point::new(90.0, 0.0)]).unwrap();
        assert!((polyline.vertices()[0] - DVec3::X).length() < 1e-15);
        assert!((polyline.vertices()[1] - DVec3::Y).length() < 1e-15);

        let line: LineString<f64> = vec![(0.0, 0.0), (0.0, 90.0)].into();
        let polyline = Polyline::from_line_string(&line).unwrap();
        assert!((polyline.vertices()[1] - DVec3::Z).length() < 1e-15);
    }

    #[test]
    fn test_edge_vector() {
        let mut edges = EdgeVector::new();
        assert!(edges.is_empty());
        edges.push(DVec3::X, DVec3::Y).unwrap();
        edges.push(DVec3::Z, DVec3::NEG_X).unwrap();
        assert_eq!(edges.num_edges(), 2);
        assert_eq!(edges.edge(1).v1, DVec3::NEG_X);
        assert!(edges.push(DVec3::ZERO, DVec3::X).is_err());
        assert_eq!(edges.num_edges(), 2);
    }

    #[test]
    fn test_shape_id_display() {
        assert_eq!(ShapeId(7).to_string(), "shape#7");
        assert_eq!(ShapeId(7).index(), 7);
    }
}

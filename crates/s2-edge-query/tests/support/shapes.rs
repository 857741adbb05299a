use glam::DVec3;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use s2_edge_query::{Polyline, Shape};

/// Random point uniformly distributed on the unit sphere.
pub fn random_point<R: Rng + ?Sized>(rng: &mut R) -> DVec3 {
    let z: f64 = rng.gen_range(-1.0..1.0);
    let theta: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
    let r = (1.0 - z * z).sqrt();
    DVec3::new(r * theta.cos(), r * theta.sin(), z).normalize()
}

/// Point at angular distance roughly `distance` from `p` in a random direction.
pub fn random_step<R: Rng + ?Sized>(rng: &mut R, p: DVec3, distance: f64) -> DVec3 {
    loop {
        let r = random_point(rng);
        let tangent = r - p * p.dot(r);
        if tangent.length_squared() > 1e-6 {
            return (p + tangent.normalize() * distance.tan()).normalize();
        }
    }
}

/// Random walk of `num_edges` edges of length `step` (radians).
pub fn random_walk<R: Rng + ?Sized>(rng: &mut R, num_edges: usize, step: f64) -> Polyline {
    let mut p = random_point(rng);
    let mut vertices = vec![p];
    for _ in 0..num_edges {
        p = random_step(rng, p, step);
        vertices.push(p);
    }
    Polyline::new(vertices).unwrap()
}

/// `count` random walks, deterministic for a given seed.
pub fn random_walks(count: usize, num_edges: usize, step: f64, seed: u64) -> Vec<Polyline> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| random_walk(&mut rng, num_edges, step))
        .collect()
}

/// `count` random query edges with lengths up to `max_length` (radians).
pub fn random_edges(count: usize, max_length: f64, seed: u64) -> Vec<(DVec3, DVec3)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let a = random_point(&mut rng);
            let length = rng.gen_range(0.0..max_length);
            (a, random_step(&mut rng, a, length))
        })
        .collect()
}

/// True if edges AB and CD cross at a point interior to both.
///
/// Plain floating point; only meant for edges that are not nearly collinear
/// and shorter than a hemisphere.
pub fn edges_cross(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> bool {
    let ab = a.cross(b);
    let cd = c.cross(d);
    (ab.dot(c) > 0.0) != (ab.dot(d) > 0.0)
        && (cd.dot(a) > 0.0) != (cd.dot(b) > 0.0)
        && (a + b).dot(c + d) > 0.0
}

/// Indices of the edges of `shape` that cross AB, by exhaustive search.
pub fn brute_force_crossings(shape: &dyn Shape, a: DVec3, b: DVec3) -> Vec<usize> {
    (0..shape.num_edges())
        .filter(|&i| {
            let edge = shape.edge(i);
            edges_cross(a, b, edge.v0, edge.v1)
        })
        .collect()
}

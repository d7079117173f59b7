//! The fuzzy k-nearest-neighbor graph that the layout is optimized against.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::{core::metric::DistanceMetric, SizedHeap};

/// The maximum number of binary-search steps when fitting a vertex's bandwidth.
const N_ITER: usize = 64;

/// The tolerance on the membership sum when fitting a vertex's bandwidth.
const SMOOTH_K_TOLERANCE: f64 = 1e-5;

/// The minimum bandwidth, as a fraction of the mean neighbor distance.
const MIN_K_DIST_SCALE: f64 = 1e-3;

/// The points between which the graph measures distances.
#[derive(Debug, Clone)]
pub enum Points {
    /// Sets of non-zero column indices, compared with Jaccard distance.
    Sets(Vec<Vec<usize>>),
    /// Dense vectors, compared with any `DistanceMetric`.
    Vectors(Vec<Vec<f64>>),
}

impl Points {
    /// Returns the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Sets(s) => s.len(),
            Self::Vectors(v) => v.len(),
        }
    }

    /// Whether there are no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The distance between points `i` and `j`.
    fn distance(&self, metric: DistanceMetric, i: usize, j: usize) -> f64 {
        match self {
            Self::Sets(s) => DistanceMetric::sets(&s[i], &s[j]),
            Self::Vectors(v) => metric.vectors(&v[i], &v[j]),
        }
    }
}

/// A symmetric weighted graph over the points.
///
/// Edges are stored in both directions, sorted by `(head, tail)`.
#[derive(Debug, Clone)]
pub struct FuzzyGraph {
    /// The `(head, tail, weight)` edges.
    edges: Vec<(usize, usize, f64)>,
    /// The number of vertices.
    n_vertices: usize,
}

impl FuzzyGraph {
    /// Builds the fuzzy simplicial set of the points.
    ///
    /// Each point is connected to its `n_neighbors - 1` nearest neighbors,
    /// ignoring any at or beyond the metric's disconnection distance. The
    /// directed memberships are then merged with a fuzzy union.
    ///
    /// # Arguments
    ///
    /// * `points`: The points to connect.
    /// * `metric`: The metric to measure distances with.
    /// * `n_neighbors`: The size of each neighborhood, counting the point itself.
    #[must_use]
    pub fn new(points: &Points, metric: DistanceMetric, n_neighbors: usize) -> Self {
        let n = points.len();
        let k = n_neighbors.min(n).saturating_sub(1);
        let cutoff = metric.disconnection_distance();

        let neighbors = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut heap = SizedHeap::new(k);
                heap.extend((0..n).filter(|&j| j != i).map(|j| (points.distance(metric, i, j), j)));
                heap.into_sorted_vec()
                    .into_iter()
                    .filter(|&(d, _)| d < cutoff)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mean_distance = {
            let all = neighbors.iter().flatten().map(|&(d, _)| d).collect::<Vec<_>>();
            crate::utils::mean::<f64, f64>(&all).unwrap_or_default()
        };

        #[allow(clippy::cast_precision_loss)]
        let target = (k as f64 + 1.0).log2();

        let mut memberships = BTreeMap::new();
        for (i, knn) in neighbors.iter().enumerate() {
            let distances = knn.iter().map(|&(d, _)| d).collect::<Vec<_>>();
            let (rho, sigma) = smooth_knn_distance(&distances, target, mean_distance);
            for &(d, j) in knn {
                let w = if d - rho <= 0.0 || sigma == 0.0 {
                    1.0
                } else {
                    (-(d - rho) / sigma).exp()
                };
                memberships.insert((i, j), w);
            }
        }

        let mut union = BTreeMap::new();
        for (&(i, j), &w) in &memberships {
            let t = memberships.get(&(j, i)).copied().unwrap_or_default();
            let w = w + t - w * t;
            union.insert((i, j), w);
            union.insert((j, i), w);
        }

        let edges = union
            .into_iter()
            .filter(|&(_, w)| w > 0.0)
            .map(|((i, j), w)| (i, j, w))
            .collect::<Vec<_>>();

        ftlog::debug!("Built fuzzy graph with {n} vertices and {} edges", edges.len());

        Self { edges, n_vertices: n }
    }

    /// Returns the `(head, tail, weight)` edges.
    #[must_use]
    pub fn edges(&self) -> &[(usize, usize, f64)] {
        &self.edges
    }

    /// Returns the number of vertices.
    #[must_use]
    pub const fn n_vertices(&self) -> usize {
        self.n_vertices
    }

    /// Returns, for each vertex, whether it has at least one edge.
    #[must_use]
    pub fn connected(&self) -> Vec<bool> {
        let mut connected = vec![false; self.n_vertices];
        for &(i, j, _) in &self.edges {
            connected[i] = true;
            connected[j] = true;
        }
        connected
    }

    /// Drops the edges too weak to be sampled even once in `n_epochs`.
    #[must_use]
    pub fn prune(mut self, n_epochs: usize) -> Self {
        let max = self.edges.iter().map(|&(_, _, w)| w).fold(0.0, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let threshold = max / n_epochs as f64;
        self.edges.retain(|&(_, _, w)| w >= threshold);
        self
    }
}

/// Finds the distance to the nearest neighbor (`rho`) and the bandwidth
/// (`sigma`) for which the memberships of a vertex sum to `target`.
///
/// # Arguments
///
/// * `distances`: The sorted distances to the vertex's neighbors.
/// * `target`: The target membership sum, `log2(k)`.
/// * `mean_distance`: The mean neighbor distance over all vertices.
fn smooth_knn_distance(distances: &[f64], target: f64, mean_distance: f64) -> (f64, f64) {
    let rho = distances.iter().copied().find(|&d| d > 0.0).unwrap_or_default();

    let (mut lo, mut hi, mut mid) = (0.0, f64::INFINITY, 1.0);
    for _ in 0..N_ITER {
        let sum = distances
            .iter()
            .map(|&d| if d - rho > 0.0 { (-(d - rho) / mid).exp() } else { 1.0 })
            .sum::<f64>();

        if (sum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }

        if sum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let floor = if rho > 0.0 {
        MIN_K_DIST_SCALE * crate::utils::mean::<f64, f64>(distances).unwrap_or_default()
    } else {
        MIN_K_DIST_SCALE * mean_distance
    };

    (rho, mid.max(floor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_points_are_disconnected() {
        let points = Points::Sets(vec![vec![0, 1, 2], vec![0, 1, 3], vec![0, 2, 3], vec![7, 8]]);
        let graph = FuzzyGraph::new(&points, DistanceMetric::Jaccard, 3);
        assert_eq!(graph.connected(), vec![true, true, true, false]);

        for &(i, j, w) in graph.edges() {
            assert!(w > 0.0 && w <= 1.0);
            assert!(graph.edges().iter().any(|&(a, b, v)| a == j && b == i && (v - w).abs() < f64::EPSILON));
        }
    }

    #[test]
    fn bandwidth_hits_target() {
        let distances = [0.1, 0.2, 0.3, 0.4];
        let target = 5_f64.log2();
        let (rho, sigma) = smooth_knn_distance(&distances, target, 0.25);
        assert!((rho - 0.1).abs() < f64::EPSILON);
        assert!(sigma > 0.0);
    }
}

//! Hierarchical density-based clustering.
//!
//! Points are linked by their mutual reachability distance, the single
//! linkage tree of those distances is condensed so that only splits into
//! two parts of at least `min_cluster_size` points create new clusters, and
//! the flat clustering is the set of condensed clusters with the greatest
//! total stability (excess of mass).

use std::collections::{BTreeMap, BTreeSet};

use rand::prelude::*;

use super::{Label, UNCLUSTERED};

/// A merge in the single linkage tree.
#[derive(Debug, Clone, Copy)]
struct Merge {
    /// The node merged from the left.
    left: usize,
    /// The node merged from the right.
    right: usize,
    /// The distance at which the two nodes merge.
    distance: f64,
    /// The number of points under the new node.
    size: usize,
}

/// An edge of the condensed tree.
#[derive(Debug, Clone, Copy)]
struct Condensed {
    /// The parent cluster.
    parent: usize,
    /// The child cluster or point.
    child: usize,
    /// The density at which the child leaves the parent.
    lambda: f64,
    /// The number of points under the child.
    child_size: usize,
}

/// A union-find over the nodes of the single linkage tree.
struct Linker {
    /// The parent of each node, with roots pointing at themselves.
    parent: Vec<usize>,
    /// The number of points under each node.
    size: Vec<usize>,
}

impl Linker {
    /// Creates a union-find with `n` singleton points and room for `n - 1` merges.
    fn new(n: usize) -> Self {
        let capacity = 2 * n - 1;
        Self {
            parent: (0..capacity).collect(),
            size: (0..capacity).map(|i| usize::from(i < n)).collect(),
        }
    }

    /// Finds the root of the given node, compressing the path.
    fn find(&mut self, mut node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merges two roots under the new node `label`.
    fn union(&mut self, a: usize, b: usize, label: usize) {
        self.parent[a] = label;
        self.parent[b] = label;
        self.size[label] = self.size[a] + self.size[b];
    }
}

/// Clusters the points.
///
/// # Arguments
///
/// * `points`: The points, as rows of equal length.
/// * `min_cluster_size`: The smallest group of points that forms a cluster.
/// * `min_samples`: The number of other points, not counting the point
///   itself, whose farthest member defines a point's core distance.
/// * `seed`: Picks the point the spanning tree is grown from.
///
/// # Returns
///
/// One label per point, with clusters numbered from 0 and unclustered points
/// labeled with `UNCLUSTERED`.
pub fn hdbscan(points: &[Vec<f64>], min_cluster_size: usize, min_samples: usize, seed: u64) -> Vec<Label> {
    let n = points.len();
    if n < 2 {
        return vec![UNCLUSTERED; n];
    }

    let distance = |i: usize, j: usize| -> f64 { distances::vectors::euclidean(&points[i], &points[j]) };
    let core = core_distances(n, min_samples, &distance);
    let reachability = |i: usize, j: usize| distance(i, j).max(core[i]).max(core[j]);

    let start = StdRng::seed_from_u64(seed).gen_range(0..n);
    let merges = single_linkage(n, minimum_spanning_tree(n, start, reachability));
    let condensed = condense(&merges, n, min_cluster_size);
    let selected = select_clusters(&condensed, n);

    ftlog::debug!(
        "Condensed tree of {n} points has {} edges; selected {} clusters.",
        condensed.len(),
        selected.len()
    );

    label_points(&condensed, &selected, n)
}

/// The distance from each point to its `min_samples`-th nearest other point.
///
/// `min_samples` is raised to 1 and capped at `n - 1`.
fn core_distances<F: Fn(usize, usize) -> f64>(n: usize, min_samples: usize, distance: F) -> Vec<f64> {
    let k = min_samples.max(1).min(n - 1);
    (0..n)
        .map(|i| {
            let mut row = (0..n).map(|j| distance(i, j)).collect::<Vec<_>>();
            row.sort_by(f64::total_cmp);
            // `row[0]` is the point itself.
            row[k]
        })
        .collect()
}

/// Builds the minimum spanning tree of the complete graph with Prim's
/// algorithm, grown from `start`, returning its edges sorted by weight.
///
/// The sort is stable, so tied edges keep the order in which they joined the
/// tree.
fn minimum_spanning_tree<F: Fn(usize, usize) -> f64>(n: usize, start: usize, weight: F) -> Vec<(usize, usize, f64)> {
    let mut in_tree = vec![false; n];
    let mut best = vec![(f64::INFINITY, 0); n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = start;
    in_tree[current] = true;
    for _ in 1..n {
        let mut next = None;
        for j in (0..n).filter(|&j| !in_tree[j]) {
            let w = weight(current, j);
            if w < best[j].0 {
                best[j] = (w, current);
            }
            if next.map_or(true, |k: usize| best[j].0 < best[k].0) {
                next = Some(j);
            }
        }
        let Some(j) = next else { break };
        in_tree[j] = true;
        edges.push((best[j].1, j, best[j].0));
        current = j;
    }

    edges.sort_by(|a, b| a.2.total_cmp(&b.2));
    edges
}

/// Builds the single linkage tree from the sorted spanning tree edges.
///
/// Merge `i` creates node `n + i`.
fn single_linkage(n: usize, edges: Vec<(usize, usize, f64)>) -> Vec<Merge> {
    let mut linker = Linker::new(n);
    edges
        .into_iter()
        .enumerate()
        .map(|(i, (a, b, distance))| {
            let (left, right) = (linker.find(a), linker.find(b));
            linker.union(left, right, n + i);
            Merge {
                left,
                right,
                distance,
                size: linker.size[n + i],
            }
        })
        .collect()
}

/// The nodes under `node` in the single linkage tree, in breadth-first order.
fn descendants(merges: &[Merge], n: usize, node: usize) -> Vec<usize> {
    let mut queue = vec![node];
    let mut i = 0;
    while i < queue.len() {
        if let Some(m) = queue[i].checked_sub(n).map(|r| merges[r]) {
            queue.push(m.left);
            queue.push(m.right);
        }
        i += 1;
    }
    queue
}

/// Condenses the single linkage tree.
///
/// The root cluster is numbered `n` and new clusters are numbered upward
/// from it. A split in which both sides have at least `min_cluster_size`
/// points creates two new clusters; otherwise the larger side continues the
/// parent cluster and the points on any small side fall out of it.
fn condense(merges: &[Merge], n: usize, min_cluster_size: usize) -> Vec<Condensed> {
    let root = 2 * n - 2;
    let mut relabel = vec![0; root + 1];
    relabel[root] = n;
    let mut next_label = n + 1;
    let mut ignore = vec![false; root + 1];
    let mut result = Vec::new();

    let size_of = |node: usize| node.checked_sub(n).map_or(1, |r| merges[r].size);
    let lambda_of = |distance: f64| if distance > 0.0 { 1.0 / distance } else { f64::MAX };

    for node in descendants(merges, n, root) {
        if ignore[node] || node < n {
            continue;
        }

        let Merge { left, right, distance, .. } = merges[node - n];
        let lambda = lambda_of(distance);
        let parent = relabel[node];
        let (left_size, right_size) = (size_of(left), size_of(right));

        let mut fall_out = |side: usize, ignore: &mut Vec<bool>| {
            for sub in descendants(merges, n, side) {
                if sub < n {
                    result.push(Condensed {
                        parent,
                        child: sub,
                        lambda,
                        child_size: 1,
                    });
                }
                ignore[sub] = true;
            }
        };

        match (left_size >= min_cluster_size, right_size >= min_cluster_size) {
            (true, true) => {
                for (side, size) in [(left, left_size), (right, right_size)] {
                    relabel[side] = next_label;
                    result.push(Condensed {
                        parent,
                        child: next_label,
                        lambda,
                        child_size: size,
                    });
                    next_label += 1;
                }
            }
            (false, false) => {
                fall_out(left, &mut ignore);
                fall_out(right, &mut ignore);
            }
            (false, true) => {
                relabel[right] = parent;
                fall_out(left, &mut ignore);
            }
            (true, false) => {
                relabel[left] = parent;
                fall_out(right, &mut ignore);
            }
        }
    }

    result
}

/// Selects the flat clustering with the greatest total stability.
///
/// The root cluster is never selected.
fn select_clusters(condensed: &[Condensed], n: usize) -> BTreeSet<usize> {
    let mut births = BTreeMap::from([(n, 0.0)]);
    for e in condensed.iter().filter(|e| e.child >= n) {
        births.insert(e.child, e.lambda);
    }

    let mut stability = births.keys().map(|&c| (c, 0.0)).collect::<BTreeMap<_, _>>();
    for e in condensed {
        let birth = births.get(&e.parent).copied().unwrap_or_default();
        #[allow(clippy::cast_precision_loss)]
        let mass = (e.lambda - birth) * e.child_size as f64;
        *stability.entry(e.parent).or_insert(0.0) += mass;
    }

    let children_of = |cluster: usize| {
        condensed
            .iter()
            .filter(move |e| e.parent == cluster && e.child >= n)
            .map(|e| e.child)
    };

    let mut is_cluster = stability.keys().filter(|&&c| c != n).map(|&c| (c, true)).collect::<BTreeMap<_, _>>();
    let candidates = is_cluster.keys().rev().copied().collect::<Vec<_>>();
    for cluster in candidates {
        let subtree = children_of(cluster).map(|c| stability[&c]).sum::<f64>();
        if subtree > stability[&cluster] {
            is_cluster.insert(cluster, false);
            stability.insert(cluster, subtree);
        } else {
            let mut queue = children_of(cluster).collect::<Vec<_>>();
            while let Some(sub) = queue.pop() {
                is_cluster.insert(sub, false);
                queue.extend(children_of(sub));
            }
        }
    }

    is_cluster.into_iter().filter(|&(_, s)| s).map(|(c, _)| c).collect()
}

/// Labels each point with the selected cluster that contains it.
///
/// Labels follow the order of the selected cluster ids.
fn label_points(condensed: &[Condensed], selected: &BTreeSet<usize>, n: usize) -> Vec<Label> {
    let parents = condensed.iter().map(|e| (e.child, e.parent)).collect::<BTreeMap<_, _>>();
    let labels = selected
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, Label::try_from(i).unwrap_or(Label::MAX)))
        .collect::<BTreeMap<_, _>>();

    (0..n)
        .map(|point| {
            let mut node = parents.get(&point).copied();
            while let Some(cluster) = node {
                if let Some(&label) = labels.get(&cluster) {
                    return label;
                }
                node = parents.get(&cluster).copied();
            }
            UNCLUSTERED
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        let centers = [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
        let offsets = [[0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [0.1, 0.1], [0.05, 0.2]];
        centers
            .iter()
            .flat_map(|c| offsets.iter().map(move |o| vec![c[0] + o[0], c[1] + o[1]]))
            .collect()
    }

    #[test]
    fn three_blobs() {
        let labels = hdbscan(&blobs(), 3, 3, 0);
        assert_eq!(labels.len(), 15);
        assert!(labels.iter().all(|&l| l != UNCLUSTERED));

        let groups = labels.chunks(5).map(|c| c[0]).collect::<BTreeSet<_>>();
        assert_eq!(groups.len(), 3);
        for chunk in labels.chunks(5) {
            assert!(chunk.iter().all(|&l| l == chunk[0]));
        }
    }

    #[test]
    fn core_distance_skips_the_point_itself() {
        let points = [0.0, 1.0, 3.0, 7.0];
        let distance = |i: usize, j: usize| f64::abs(points[i] - points[j]);

        assert_eq!(core_distances(4, 1, distance), vec![1.0, 1.0, 2.0, 4.0]);
        assert_eq!(core_distances(4, 2, distance), vec![3.0, 2.0, 3.0, 6.0]);
        assert_eq!(core_distances(4, 0, distance), core_distances(4, 1, distance));
        assert_eq!(core_distances(4, 10, distance), vec![7.0, 6.0, 4.0, 7.0]);
    }

    #[test]
    fn too_large_min_cluster_size() {
        let labels = hdbscan(&blobs(), 20, 5, 0);
        assert!(labels.iter().all(|&l| l == UNCLUSTERED));
    }
}

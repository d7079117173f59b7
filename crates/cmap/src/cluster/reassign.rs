//! Assigning unclustered points to the majority cluster among their nearest
//! clustered neighbors.

use std::collections::BTreeMap;

use ndarray::ArrayView2;

use super::{Label, UNCLUSTERED};
use crate::SizedHeap;

/// Replaces every `UNCLUSTERED` label with the most common label among the
/// point's `n_neighbors` nearest clustered points.
///
/// Ties in the vote go to the lowest label. If fewer than `n_neighbors + 1`
/// points are clustered, `n_neighbors` is reduced to one less than the
/// number of clustered points, but never below 1.
///
/// If no point is unclustered, the labels are returned unchanged. If every
/// point is unclustered, every point is assigned to cluster 0.
///
/// # Arguments
///
/// * `labels`: The labels, one per row of the embedding.
/// * `embedding`: The embedding the labels were computed on.
/// * `n_neighbors`: The number of clustered neighbors that vote.
#[must_use]
pub fn reassign(labels: &[Label], embedding: ArrayView2<f64>, n_neighbors: usize) -> Vec<Label> {
    let (clustered, unclustered): (Vec<_>, Vec<_>) = (0..labels.len()).partition(|&i| labels[i] != UNCLUSTERED);

    if unclustered.is_empty() {
        ftlog::info!("No decks are unclustered; keeping the original labels.");
        return labels.to_vec();
    }
    if clustered.is_empty() {
        ftlog::info!("No decks are clustered; assigning all {} to one cluster.", labels.len());
        return vec![0; labels.len()];
    }

    let k = if clustered.len() < n_neighbors + 1 {
        ftlog::info!(
            "Only {} decks are clustered; reducing the number of neighbors from {n_neighbors}.",
            clustered.len()
        );
        (clustered.len() - 1).max(1)
    } else {
        n_neighbors.max(1)
    };

    let rows = embedding.rows().into_iter().map(|r| r.to_vec()).collect::<Vec<_>>();
    let mut result = labels.to_vec();
    for &i in &unclustered {
        let mut heap = SizedHeap::new(k);
        heap.extend(
            clustered
                .iter()
                .map(|&j| (distances::vectors::euclidean::<f64, f64>(&rows[i], &rows[j]), j)),
        );

        let mut votes = BTreeMap::new();
        for (_, j) in heap.into_sorted_vec() {
            *votes.entry(labels[j]).or_insert(0_usize) += 1;
        }
        // `BTreeMap` iterates labels in ascending order, so the first maximum
        // is the lowest label.
        let counts = votes.values().copied().collect::<Vec<_>>();
        result[i] = crate::utils::arg_max(&counts)
            .and_then(|(v, _)| votes.keys().nth(v).copied())
            .unwrap_or_default();
    }

    ftlog::info!("Reassigned {} unclustered decks.", unclustered.len());

    result
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn majority_vote() {
        let embedding = array![[0.0], [0.1], [0.2], [5.0], [5.1], [0.15], [4.9]];
        let labels = [0, 0, 1, 2, 2, UNCLUSTERED, UNCLUSTERED];
        let result = reassign(&labels, embedding.view(), 3);
        assert_eq!(result, vec![0, 0, 1, 2, 2, 0, 2]);
    }

    #[test]
    fn ties_go_to_lowest_label() {
        let embedding = array![[0.0], [1.0], [3.0], [4.0], [10.0], [2.0]];
        let labels = [3, 3, 1, 1, 7, UNCLUSTERED];
        let result = reassign(&labels, embedding.view(), 4);
        assert_eq!(result[5], 1);
    }
}

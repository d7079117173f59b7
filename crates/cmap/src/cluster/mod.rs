//! Clustering an embedding of decks.

pub mod hdbscan;
pub mod reassign;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::params::ClusterParams;

/// A cluster label.
pub type Label = i32;

/// The label of a point that is not (yet) in any cluster.
pub const UNCLUSTERED: Label = -1;

/// Datasets with at most this many points are put in a single cluster.
pub const MAX_TRIVIAL_SIZE: usize = 10;

/// The clustering algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Clusterer {
    /// Hierarchical density-based clustering.
    #[default]
    Hdbscan,
}

impl std::str::FromStr for Clusterer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("hdbscan") {
            Ok(Self::Hdbscan)
        } else {
            Err(format!("Clusterer `{s}` is not implemented. Only `HDBSCAN` is implemented."))
        }
    }
}

/// Clusters the rows of the embedding.
///
/// An embedding with at most `MAX_TRIVIAL_SIZE` rows is put in cluster 0
/// without running the clusterer. Otherwise, points the clusterer leaves
/// out of every cluster are labeled `UNCLUSTERED`.
///
/// # Errors
///
/// * If `params.min_cluster_size` is less than 2.
/// * If `params.min_samples` is `Some(0)`.
pub fn cluster(embedding: ArrayView2<f64>, params: &ClusterParams) -> Result<Vec<Label>, String> {
    if params.min_cluster_size < 2 {
        return Err(format!(
            "The minimum cluster size must be at least 2, but got {}.",
            params.min_cluster_size
        ));
    }
    let min_samples = params.min_samples.unwrap_or(params.min_cluster_size);
    if min_samples == 0 {
        return Err("The number of samples for core distances must be positive.".to_string());
    }

    let n = embedding.nrows();
    if n <= MAX_TRIVIAL_SIZE {
        ftlog::info!("Too few decks ({n}) to cluster; assigning all to one cluster.");
        return Ok(vec![0; n]);
    }

    let labels = match params.clusterer {
        Clusterer::Hdbscan => {
            let points = embedding.rows().into_iter().map(|r| r.to_vec()).collect::<Vec<_>>();
            hdbscan::hdbscan(&points, params.min_cluster_size, min_samples, params.seed)
        }
    };

    let n_clusters = labels.iter().copied().max().map_or(0, |m| m + 1);
    let n_unclustered = labels.iter().filter(|&&l| l == UNCLUSTERED).count();
    ftlog::info!("Found {n_clusters} clusters among {n} decks, with {n_unclustered} unclustered.");

    Ok(labels)
}

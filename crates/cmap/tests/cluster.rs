//! Tests for clustering decks and reassigning unclustered decks.

use cmap::{
    cluster::{cluster, reassign::reassign, MAX_TRIVIAL_SIZE},
    params::ClusterParams,
    Clusterer, EmbeddingTarget, Label, UNCLUSTERED,
};
use ndarray::Array2;
use test_case::test_case;

mod common;

use common::data_gen;

/// Points on a line in blobs of `per_blob` points spaced 100 apart.
fn blobs(n_blobs: usize, per_blob: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_blobs * per_blob, 4), |(i, j)| {
        let (blob, offset) = (i / per_blob, i % per_blob);
        100.0 * blob as f64 + 0.1 * offset as f64 + 0.01 * j as f64
    })
}

#[test_case(1 ; "one deck")]
#[test_case(5 ; "five decks")]
#[test_case(MAX_TRIVIAL_SIZE ; "trivial size")]
fn tiny_maps_form_one_cluster(n: usize) -> Result<(), String> {
    let embedding = blobs(1, n);
    let labels = cluster(embedding.view(), &ClusterParams::default())?;
    assert_eq!(labels, vec![0; n]);
    Ok(())
}

#[test]
fn separated_blobs() -> Result<(), String> {
    let embedding = blobs(3, 8);
    let labels = cluster(embedding.view(), &ClusterParams::default().with_min_cluster_size(4))?;

    assert_eq!(labels.len(), 24);
    for blob in labels.chunks(8) {
        assert!(blob.iter().all(|&l| l == blob[0] && l != UNCLUSTERED), "{labels:?}");
    }
    let mut distinct = labels.clone();
    distinct.dedup();
    assert_eq!(distinct.len(), 3);
    Ok(())
}

#[test_case(0 ; "zero")]
#[test_case(1 ; "one")]
fn invalid_min_cluster_size(min_cluster_size: usize) {
    let embedding = blobs(3, 8);
    let params = ClusterParams::default().with_min_cluster_size(min_cluster_size);
    assert!(cluster(embedding.view(), &params).is_err());
}

#[test_case("HDBSCAN", true ; "upper case")]
#[test_case("hdbscan", true ; "lower case")]
#[test_case("KMeans", false ; "k-means")]
fn clusterer_names(name: &str, supported: bool) {
    assert_eq!(name.parse::<Clusterer>().is_ok(), supported);
}

#[test_case(&[0, 0, 1, 1, UNCLUSTERED, UNCLUSTERED] ; "some unclustered")]
#[test_case(&[0, 1, 1, 2, 2, 2] ; "none unclustered")]
#[test_case(&[UNCLUSTERED; 6] ; "all unclustered")]
fn reassignment_keeps_clustered_labels(labels: &[Label]) {
    let embedding = blobs(2, 3);
    let result = reassign(labels, embedding.view(), 50);

    assert_eq!(result.len(), labels.len());
    assert!(result.iter().all(|&l| l != UNCLUSTERED));
    for (&before, &after) in labels.iter().zip(&result) {
        if before != UNCLUSTERED {
            assert_eq!(before, after);
        }
    }
    if labels.iter().all(|&l| l == UNCLUSTERED) {
        assert!(result.iter().all(|&l| l == 0));
    }
}

#[test]
fn reassigned_to_nearest_blob() {
    let embedding = blobs(2, 5);
    let labels = [0, 0, 0, UNCLUSTERED, 0, 1, UNCLUSTERED, 1, 1, 1];
    let result = reassign(&labels, embedding.view(), 3);
    assert_eq!(result, vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1]);
}

#[test]
fn stages_run_in_order() -> Result<(), String> {
    let mut map = data_gen::map(data_gen::groups(3, 4))?;

    let err = map.cluster_decks(&ClusterParams::default());
    assert!(err.is_err_and(|e| e.contains("EmbeddingTarget::Clustering")));
    assert!(map.assign_unclustered(15).is_err());
    assert!(map.get_cluster_traits(&cmap::params::TraitParams::default()).is_err());
    assert!(map.jsonify_map(None, None).is_err());
    assert!(map.cluster_column().is_err());
    assert!(map.coordinates_table().is_err());

    let params = cmap::params::ReductionParams::default()
        .with_target_dims(4)
        .with_n_neighbors(3);
    map.reduce_dimensionality(EmbeddingTarget::Clustering, false, &params)?;
    map.cluster_decks(&ClusterParams::default().with_min_cluster_size(3))?;
    assert!(map
        .get_defining_cards(&cmap::params::DefiningCardParams::default())
        .is_err());
    assert!(map.calculate_average_decklists(&[]).is_err());

    // A new clustering embedding invalidates the labels.
    map.reduce_dimensionality(EmbeddingTarget::Clustering, false, &params)?;
    assert!(map.labels().is_none());
    Ok(())
}

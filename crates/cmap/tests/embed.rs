//! Tests for embedding decks and repairing disconnected decks.

use cmap::{
    embed::{reduce, repair::repair},
    params::ReductionParams,
    Deck, DeckMatrix, EmbeddingTarget, Reducer, ReductionInput,
};
use float_cmp::approx_eq;
use test_case::test_case;

mod common;

use common::data_gen;

fn params() -> ReductionParams {
    ReductionParams::default()
        .with_target_dims(4)
        .with_n_neighbors(3)
        .with_min_dist(0.0)
        .with_seed(42)
}

#[test]
fn deterministic_for_a_seed() -> Result<(), String> {
    let decks = data_gen::groups(3, 4);
    let (matrix, _) = DeckMatrix::from_decks(&decks);

    let first = reduce(ReductionInput::Sparse(&matrix), &params())?;
    let second = reduce(ReductionInput::Sparse(&matrix), &params())?;

    assert_eq!(first.dim(), (12, 4));
    assert!(first.iter().all(|v| v.is_finite()));
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn disconnected_deck_is_repaired() -> Result<(), String> {
    let mut decks = data_gen::groups(2, 4);
    decks.push(Deck::new(100, data_gen::commander(0), data_gen::names(&["Lonely Card"])));
    let (matrix, _) = DeckMatrix::from_decks(&decks);

    let embedding = reduce(ReductionInput::Sparse(&matrix), &params())?;
    assert!(embedding.row(8).iter().all(|v| v.is_nan()));
    assert!(embedding.rows().into_iter().take(8).flatten().all(|v| v.is_finite()));

    let repaired = repair(embedding, Some(&decks), 7)?;
    assert!(repaired.iter().all(|v| v.is_finite()));

    // Every group 0 deck is equally dissimilar, so the first one is the anchor.
    for (&lonely, &anchor) in repaired.row(8).iter().zip(repaired.row(0).iter()) {
        let offset = (lonely - anchor).abs();
        assert!((0.001..=0.002).contains(&offset), "offset {offset} out of range");
    }

    let again = repair(repaired.clone(), Some(&decks), 7)?;
    assert_eq!(again, repaired);
    Ok(())
}

#[test]
fn too_few_rows_fall_back_to_random() -> Result<(), String> {
    let decks = data_gen::groups(1, 1);
    let (matrix, _) = DeckMatrix::from_decks(&decks);

    let embedding = reduce(ReductionInput::Sparse(&matrix), &ReductionParams::default())?;
    assert_eq!(embedding.dim(), (1, 2));
    assert!(embedding.iter().all(|v| (0.0..1.0).contains(v)));
    Ok(())
}

#[test]
fn dense_input() -> Result<(), String> {
    let points = ndarray::Array2::from_shape_fn((12, 3), |(i, j)| {
        let center = if i < 6 { 0.0 } else { 10.0 };
        center + 0.1 * (i * 3 + j) as f64
    });
    let params = ReductionParams {
        metric: cmap::DistanceMetric::Euclidean,
        ..ReductionParams::default()
    };
    let embedding = reduce(ReductionInput::Dense(points.view()), &params.with_n_neighbors(4))?;
    assert_eq!(embedding.dim(), (12, 2));
    assert!(embedding.iter().all(|v| v.is_finite()));
    Ok(())
}

#[test_case("UMAP", true ; "upper case")]
#[test_case("umap", true ; "lower case")]
#[test_case("t-SNE", false ; "t-SNE")]
#[test_case("PCA", false ; "PCA")]
fn reducer_names(name: &str, supported: bool) {
    let reducer = name.parse::<Reducer>();
    assert_eq!(reducer.is_ok(), supported);
    if let Err(e) = reducer {
        assert!(e.contains(name), "{e}");
    }
}

#[test_case(EmbeddingTarget::Coordinates, 2, true ; "2-D coordinates")]
#[test_case(EmbeddingTarget::Coordinates, 3, false ; "3-D coordinates")]
#[test_case(EmbeddingTarget::Clustering, 3, false ; "3-D clustering")]
#[test_case(EmbeddingTarget::Clustering, 6, true ; "6-D clustering")]
fn target_dims(target: EmbeddingTarget, dims: usize, valid: bool) {
    assert_eq!(target.check_dims(dims).is_ok(), valid);
}

#[test]
fn invalid_parameters() {
    let decks = data_gen::groups(2, 3);
    let (matrix, _) = DeckMatrix::from_decks(&decks);
    let input = ReductionInput::Sparse(&matrix);

    assert!(reduce(input, &ReductionParams::default().with_target_dims(1)).is_err());
    assert!(reduce(input, &ReductionParams::default().with_n_neighbors(1)).is_err());
}

#[test]
fn embedding_an_embedding_needs_one() -> Result<(), String> {
    let mut map = data_gen::map(data_gen::groups(3, 4))?;
    let coordinates = ReductionParams::default().with_n_neighbors(3);

    assert!(map
        .reduce_dimensionality(EmbeddingTarget::Coordinates, true, &coordinates)
        .is_err());
    assert!(map
        .reduce_dimensionality(EmbeddingTarget::Coordinates, false, &params())
        .is_err());

    map.reduce_dimensionality(EmbeddingTarget::Clustering, false, &params())?;
    map.reduce_dimensionality(EmbeddingTarget::Coordinates, true, &coordinates)?;

    let table = map.coordinates_table()?;
    assert_eq!(table.len(), 12);
    for (row, deck) in table.iter().zip(map.decks()) {
        assert_eq!(row.deck_id, deck.deck_id());
        assert!(approx_eq!(f64, row.x, (row.x * 1e6).round() / 1e6, epsilon = 1e-9));
    }
    Ok(())
}

//! Reducing decks to low-dimensional embeddings.
//!
//! The reducer builds a fuzzy neighborhood graph of the decks and lays it out
//! in `target_dims` dimensions by stochastic gradient descent. Decks with no
//! neighbor closer than the metric's disconnection distance come out as
//! `NaN` rows, which [`repair`](repair::repair) then places near a similar
//! deck.

pub mod knn_graph;
pub mod layout;
pub mod repair;

use ndarray::{Array2, ArrayView2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{params::ReductionParams, DeckMatrix};

use knn_graph::{FuzzyGraph, Points};

/// The number of rows above which fewer epochs are run by default.
const LARGE_DATASET: usize = 10_000;

/// The dimensionality-reduction algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Reducer {
    /// Uniform Manifold Approximation and Projection.
    #[default]
    Umap,
}

impl std::str::FromStr for Reducer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("umap") {
            Ok(Self::Umap)
        } else {
            Err(format!("Reducer `{s}` is not implemented. Only `UMAP` is implemented."))
        }
    }
}

/// Which embedding of a map a reduction produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingTarget {
    /// The 2-D coordinates used for display.
    Coordinates,
    /// The embedding of at least 4 dimensions used for clustering.
    Clustering,
}

impl EmbeddingTarget {
    /// Checks that `target_dims` suits this target.
    ///
    /// # Errors
    ///
    /// * If the target is `Coordinates` and `target_dims` is not 2.
    /// * If the target is `Clustering` and `target_dims` is less than 4.
    pub fn check_dims(self, target_dims: usize) -> Result<(), String> {
        match self {
            Self::Coordinates if target_dims != 2 => Err(format!(
                "Coordinates must have 2 dimensions, but {target_dims} were requested."
            )),
            Self::Clustering if target_dims < 4 => Err(format!(
                "A clustering embedding must have at least 4 dimensions, but {target_dims} were requested."
            )),
            _ => Ok(()),
        }
    }
}

/// The data a reduction starts from.
#[derive(Debug, Clone, Copy)]
pub enum ReductionInput<'a> {
    /// The sparse deck×card matrix.
    Sparse(&'a DeckMatrix),
    /// A dense matrix, e.g. an existing embedding.
    Dense(ArrayView2<'a, f64>),
}

impl ReductionInput<'_> {
    /// Returns the number of rows in the input.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        match self {
            Self::Sparse(m) => m.n_decks(),
            Self::Dense(a) => a.nrows(),
        }
    }

    /// Converts the input into the points the graph is built over.
    fn points(&self, params: &ReductionParams) -> Points {
        match self {
            Self::Sparse(m) if params.metric.is_set_metric() => {
                Points::Sets((0..m.n_decks()).map(|r| m.row_columns(r)).collect())
            }
            Self::Sparse(m) => Points::Vectors((0..m.n_decks()).map(|r| m.dense_row(r)).collect()),
            Self::Dense(a) => Points::Vectors(a.rows().into_iter().map(|r| r.to_vec()).collect()),
        }
    }
}

/// Reduces the input to a `n_rows × target_dims` embedding.
///
/// The result is deterministic for a fixed `params.seed`. Rows the reducer
/// could not connect to any other row are `NaN`.
///
/// If the algorithm itself fails, e.g. on fewer than two rows or when the
/// optimization diverges, a warning is logged and a uniform random embedding
/// in `[0, 1)` is returned instead.
///
/// # Errors
///
/// * If `params.target_dims` is less than 2.
/// * If `params.n_neighbors` is less than 2.
pub fn reduce(input: ReductionInput, params: &ReductionParams) -> Result<Array2<f64>, String> {
    if params.target_dims < 2 {
        return Err(format!(
            "The target dimensionality must be at least 2, but got {}.",
            params.target_dims
        ));
    }
    if params.n_neighbors < 2 {
        return Err(format!(
            "The number of neighbors must be at least 2, but got {}.",
            params.n_neighbors
        ));
    }

    let n = input.n_rows();
    let result = match params.reducer {
        Reducer::Umap => umap(input, params),
    };

    Ok(result.unwrap_or_else(|e| {
        ftlog::warn!("Failed to embed {n} decks: {e} Using a random embedding.");
        let mut rng = StdRng::seed_from_u64(params.seed);
        Array2::from_shape_fn((n, params.target_dims), |_| rng.gen_range(0.0..1.0))
    }))
}

/// Runs the UMAP-style reduction.
fn umap(input: ReductionInput, params: &ReductionParams) -> Result<Array2<f64>, String> {
    let n = input.n_rows();
    if n < 2 {
        return Err(format!("At least 2 rows are needed to embed, but got {n}."));
    }

    let n_epochs = params
        .n_epochs
        .unwrap_or(if n <= LARGE_DATASET { 500 } else { 200 });
    ftlog::info!(
        "Embedding {n} decks into {} dimensions with {} neighbors and {n_epochs} epochs.",
        params.target_dims,
        params.n_neighbors
    );

    let graph = FuzzyGraph::new(&input.points(params), params.metric, params.n_neighbors);
    let connected = graph.connected();
    let graph = graph.prune(n_epochs);

    let curve = layout::fit_curve(params.min_dist, params.spread);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let initial = layout::random_init(n, params.target_dims, &mut rng);
    let mut embedding = layout::optimize(initial, &graph, curve, n_epochs, &mut rng);

    if embedding.iter().any(|v| !v.is_finite()) {
        return Err("The optimized layout has non-finite coordinates.".to_string());
    }

    let n_disconnected = connected.iter().filter(|&&c| !c).count();
    if n_disconnected > 0 {
        ftlog::info!("{n_disconnected} decks are disconnected from the neighborhood graph.");
        for (mut row, _) in embedding.rows_mut().into_iter().zip(&connected).filter(|(_, &c)| !c) {
            row.fill(f64::NAN);
        }
    }

    Ok(embedding)
}

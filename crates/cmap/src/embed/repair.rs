//! Placing the decks that the reducer could not connect to the rest of the
//! graph.

use ndarray::{Array2, Axis};
use rand::prelude::*;

use crate::{core::metric::jaccard_similarity, Deck};

/// The range of the jitter added to borrowed coordinates.
const JITTER: std::ops::Range<f64> = 0.001..0.002;

/// Replaces every row of the embedding that holds a `NaN` with the
/// coordinates of an anchor deck, plus a small jitter.
///
/// The anchor of a disconnected deck is the connected deck with the same
/// commander whose card list is most similar by Jaccard similarity, ties
/// going to the lowest row. Without such a deck, or when `decks` is `None`,
/// the anchor is a uniformly random connected deck. If no deck is connected,
/// the whole embedding is replaced by uniform random coordinates in `[0, 1)`.
///
/// An embedding without `NaN`s is returned unchanged.
///
/// # Arguments
///
/// * `embedding`: One row per deck.
/// * `decks`: The decks, in row order, if available.
/// * `seed`: The seed for anchor selection and jitter.
///
/// # Errors
///
/// * If `decks` is given and does not hold one deck per row.
pub fn repair(mut embedding: Array2<f64>, decks: Option<&[Deck]>, seed: u64) -> Result<Array2<f64>, String> {
    if let Some(decks) = decks {
        if decks.len() != embedding.nrows() {
            return Err(format!(
                "Expected one deck per embedded row, but got {} decks and {} rows.",
                decks.len(),
                embedding.nrows()
            ));
        }
    }

    let connected = embedding
        .axis_iter(Axis(0))
        .map(|row| !row.iter().any(|v| v.is_nan()))
        .collect::<Vec<_>>();
    let (connected_rows, disconnected_rows): (Vec<_>, Vec<_>) = (0..connected.len()).partition(|&i| connected[i]);

    if disconnected_rows.is_empty() {
        return Ok(embedding);
    }

    let mut rng = StdRng::seed_from_u64(seed);

    if connected_rows.is_empty() {
        ftlog::warn!("All {} decks are disconnected. Using a random embedding.", embedding.nrows());
        return Ok(Array2::from_shape_fn(embedding.dim(), |_| rng.gen_range(0.0..1.0)));
    }

    ftlog::info!("Repairing {} disconnected decks.", disconnected_rows.len());

    for &i in &disconnected_rows {
        let anchor = decks
            .and_then(|decks| most_similar(decks, &connected_rows, i))
            .unwrap_or_else(|| connected_rows[rng.gen_range(0..connected_rows.len())]);

        for d in 0..embedding.ncols() {
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            embedding[[i, d]] = sign * rng.gen_range(JITTER) + embedding[[anchor, d]];
        }
    }

    Ok(embedding)
}

/// Finds the connected deck with the same commander as deck `i` and the most
/// similar card list.
fn most_similar(decks: &[Deck], connected_rows: &[usize], i: usize) -> Option<usize> {
    let deck = &decks[i];
    let candidates = connected_rows
        .iter()
        .copied()
        .filter(|&j| j != i && decks[j].commander() == deck.commander())
        .collect::<Vec<_>>();

    let similarities = candidates
        .iter()
        .map(|&j| jaccard_similarity(deck.cards(), decks[j].cards()))
        .collect::<Vec<_>>();

    crate::utils::arg_max(&similarities).map(|(k, _)| candidates[k])
}

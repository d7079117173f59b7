//! How often each cluster played each card, and how often it could have.

use std::collections::{BTreeSet, HashMap};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{params::CardCountParams, CardIndex, Deck, DeckMatrix, Label, ReferenceMatrices};

/// Whether color identity restricts which cards a deck could have played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorRule {
    /// Only the release date of a card matters.
    #[default]
    Ignore,
    /// A deck could also only play cards within its color identity.
    Restrict,
}

/// The played and not-played counts of every card in every cluster.
///
/// Row `i` of both matrices belongs to `clusters[i]`, and column `j` to
/// column `j` of the card index the counts were computed with.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterCardCounts {
    /// The clusters, in ascending order.
    clusters: Vec<Label>,
    /// The number of decks of each cluster that played each card.
    played: Array2<f64>,
    /// The number of decks of each cluster that could have played each card
    /// but did not.
    not_played: Array2<f64>,
}

impl ClusterCardCounts {
    /// Creates a new `ClusterCardCounts`.
    ///
    /// # Errors
    ///
    /// * If the clusters are not strictly ascending.
    /// * If either matrix does not have one row per cluster.
    /// * If the matrices differ in shape.
    pub fn new(clusters: Vec<Label>, played: Array2<f64>, not_played: Array2<f64>) -> Result<Self, String> {
        if clusters.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!("The clusters must be strictly ascending, but got {clusters:?}."));
        }
        if played.nrows() != clusters.len() || played.dim() != not_played.dim() {
            return Err(format!(
                "Expected two count matrices with {} rows of the same shape, but got {:?} and {:?}.",
                clusters.len(),
                played.dim(),
                not_played.dim()
            ));
        }
        Ok(Self {
            clusters,
            played,
            not_played,
        })
    }

    /// The clusters, in ascending order.
    #[must_use]
    pub fn clusters(&self) -> &[Label] {
        &self.clusters
    }

    /// The number of clusters.
    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// The row of the given cluster.
    #[must_use]
    pub fn cluster_row(&self, cluster: Label) -> Option<usize> {
        self.clusters.binary_search(&cluster).ok()
    }

    /// The played counts.
    #[must_use]
    pub const fn played(&self) -> &Array2<f64> {
        &self.played
    }

    /// The not-played counts.
    #[must_use]
    pub const fn not_played(&self) -> &Array2<f64> {
        &self.not_played
    }
}

/// Counts, per cluster and card, the decks that played the card and the decks
/// that could have played it but did not.
///
/// A deck plays a card at most once, however many copies it holds.
///
/// A deck could have played a card if it was saved on or after the card's
/// release and, under `ColorRule::Restrict`, the card lies within the deck's
/// color identity. The could-play counts are accumulated over chunks of
/// `params.chunk_size` decks, where decks with the same date and color
/// buckets are counted together.
///
/// # Errors
///
/// * If the labels, decks and matrix rows differ in number.
/// * If the card index does not match the columns of the matrix.
/// * If `params.chunk_size` is zero.
/// * If a deck or card is missing from a reference matrix that is consulted.
pub fn get_cluster_card_counts(
    decks: &[Deck],
    labels: &[Label],
    matrix: &DeckMatrix,
    cards: &CardIndex,
    references: &ReferenceMatrices,
    params: &CardCountParams,
) -> Result<ClusterCardCounts, String> {
    if labels.len() != decks.len() || matrix.n_decks() != decks.len() {
        return Err(format!(
            "Expected one label and one matrix row per deck, but got {} decks, {} labels and {} rows.",
            decks.len(),
            labels.len(),
            matrix.n_decks()
        ));
    }
    if cards.len() != matrix.n_cards() {
        return Err(format!(
            "The card index has {} cards but the matrix has {} columns.",
            cards.len(),
            matrix.n_cards()
        ));
    }
    if params.chunk_size == 0 {
        return Err("The chunk size must be positive.".to_string());
    }

    let clusters = labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>();
    let cluster_rows = labels
        .iter()
        .map(|l| clusters.binary_search(l).unwrap_or_default())
        .collect::<Vec<_>>();
    let shape = (clusters.len(), cards.len());

    let mut played = Array2::zeros(shape);
    for (k, _) in clusters.iter().enumerate() {
        let rows = (0..decks.len()).filter(|&i| cluster_rows[i] == k).collect::<Vec<_>>();
        for (c, count) in matrix.column_presence(&rows).into_iter().enumerate() {
            played[[k, c]] = count;
        }
    }

    if params.commanders_in_matrix {
        for (deck, &k) in decks.iter().zip(&cluster_rows) {
            for column in deck.all_commanders().into_iter().filter_map(|name| cards.column(name)) {
                played[[k, column]] -= 1.0;
            }
        }
        played.mapv_inplace(|v: f64| v.max(0.0));
    }

    let could_play = could_play_counts(decks, &cluster_rows, cards, references, params, shape)?;
    let not_played = (&could_play - &played).mapv(|v| v.max(0.0));

    ftlog::info!(
        "Counted {} cards over {} clusters of {} decks.",
        cards.len(),
        clusters.len(),
        decks.len()
    );

    Ok(ClusterCardCounts {
        clusters,
        played,
        not_played,
    })
}

/// The number of decks in each cluster that could have played each card.
fn could_play_counts(
    decks: &[Deck],
    cluster_rows: &[usize],
    cards: &CardIndex,
    references: &ReferenceMatrices,
    params: &CardCountParams,
    shape: (usize, usize),
) -> Result<Array2<f64>, String> {
    let (dates, colors) = (references.dates(), references.colors());
    let restrict = params.color_rule == ColorRule::Restrict;

    let date_columns = cards
        .names()
        .iter()
        .map(|name| dates.card_column(name))
        .collect::<Result<Vec<_>, _>>()?;
    let color_columns = if restrict {
        cards
            .names()
            .iter()
            .map(|name| colors.card_column(name))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };

    let mut could_play = Array2::zeros(shape);
    let indices = (0..decks.len()).collect::<Vec<_>>();
    for (i, chunk) in indices.chunks(params.chunk_size).enumerate() {
        let mut buckets = HashMap::<(usize, usize, Option<usize>), f64>::new();
        for &d in chunk {
            let id = decks[d].deck_id();
            let date_row = dates.deck_row(id)?;
            let color_row = if restrict { Some(colors.deck_row(id)?) } else { None };
            *buckets.entry((cluster_rows[d], date_row, color_row)).or_default() += 1.0;
        }

        ftlog::debug!("Chunk {i} of {} decks has {} buckets.", chunk.len(), buckets.len());

        for ((k, date_row, color_row), count) in buckets {
            for (c, &date_column) in date_columns.iter().enumerate() {
                let legal = dates.get(date_row, date_column)
                    && color_row.map_or(true, |r| colors.get(r, color_columns[c]));
                if legal {
                    could_play[[k, c]] += count;
                }
            }
        }
    }

    Ok(could_play)
}

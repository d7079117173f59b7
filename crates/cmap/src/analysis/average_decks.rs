//! The most representative deck of each cluster.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::defining_cards::DefiningCard;
use crate::{
    utils::{arg_max, percentile},
    CardIndex, Deck, DeckId, DeckMatrix, Label,
};

/// The lower and upper percentiles of deck sizes considered typical.
const TYPICAL_SIZES: (f64, f64) = (20.0, 80.0);

/// Picks the average deck of each cluster.
///
/// Each deck is scored with the mean score of its distinct cards among the
/// defining cards of its cluster, where a card that is not a defining card
/// scores 0. Among the decks whose number of distinct cards lies between the
/// 20th and 80th percentiles of the cluster, or among all decks of the
/// cluster if none does, the first deck with the highest score is the
/// average deck.
///
/// # Arguments
///
/// * `decks`: The decks, one per row of the matrix.
/// * `labels`: The cluster of each deck.
/// * `matrix`: The deck-card matrix.
/// * `cards`: The names of the columns of the matrix.
/// * `defining`: The defining cards of every cluster.
/// * `ignore_clusters`: Clusters for which no average deck is picked.
///
/// # Errors
///
/// * If the labels, decks and matrix rows differ in number.
/// * If the card index does not match the columns of the matrix.
pub fn calculate_average_decklists(
    decks: &[Deck],
    labels: &[Label],
    matrix: &DeckMatrix,
    cards: &CardIndex,
    defining: &[DefiningCard],
    ignore_clusters: &[Label],
) -> Result<BTreeMap<Label, DeckId>, String> {
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

    let mut scores = HashMap::<(Label, &str), f64>::new();
    for d in defining {
        scores.insert((d.cluster, d.card.as_str()), d.score());
    }

    let clusters = labels
        .iter()
        .copied()
        .filter(|l| !ignore_clusters.contains(l))
        .collect::<BTreeSet<_>>();

    let mut result = BTreeMap::new();
    for cluster in clusters {
        let members = (0..decks.len()).filter(|&i| labels[i] == cluster).collect::<Vec<_>>();

        let sizes = members.iter().map(|&i| matrix.row_columns(i).len()).collect::<Vec<_>>();
        let deck_scores = members
            .iter()
            .map(|&i| {
                let columns = matrix.row_columns(i);
                if columns.is_empty() {
                    return f64::NEG_INFINITY;
                }
                #[allow(clippy::cast_precision_loss)]
                let n = columns.len() as f64;
                columns
                    .into_iter()
                    .filter_map(|c| cards.name(c))
                    .map(|name| scores.get(&(cluster, name)).copied().unwrap_or_default())
                    .sum::<f64>()
                    / n
            })
            .collect::<Vec<_>>();

        let typical = match (
            percentile(&sizes, TYPICAL_SIZES.0),
            percentile(&sizes, TYPICAL_SIZES.1),
        ) {
            (Some(lo), Some(hi)) => (0..members.len())
                .filter(|&m| {
                    #[allow(clippy::cast_precision_loss)]
                    let size = sizes[m] as f64;
                    lo <= size && size <= hi
                })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };
        let candidates = if typical.is_empty() {
            (0..members.len()).collect()
        } else {
            typical
        };

        let candidate_scores = candidates.iter().map(|&m| deck_scores[m]).collect::<Vec<_>>();
        if let Some((best, score)) = arg_max(&candidate_scores) {
            let deck = &decks[members[candidates[best]]];
            ftlog::debug!("Cluster {cluster}: average deck {} scores {score:.3}.", deck.deck_id());
            result.insert(cluster, deck.deck_id());
        }
    }

    ftlog::info!("Picked average decks for {} clusters.", result.len());

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defining(cluster: Label, card: &str, play_rate: f64) -> DefiningCard {
        DefiningCard {
            cluster,
            card: card.to_string(),
            play_rate,
            synergy: None,
        }
    }

    #[test]
    fn highest_mean_score() -> Result<(), String> {
        let names = |v: &[&str]| v.iter().map(ToString::to_string).collect::<Vec<_>>();
        let decks = vec![
            Deck::new(10, "Krenko", names(&["Goblin Guide", "Sol Ring"])),
            Deck::new(11, "Krenko", names(&["Goblin Guide", "Skirk Prospector"])),
            Deck::new(12, "Krenko", names(&["Sol Ring", "Arcane Signet"])),
            Deck::new(20, "Atraxa", names(&["Sol Ring", "Arcane Signet"])),
        ];
        let (matrix, cards) = DeckMatrix::from_decks(&decks);
        let defining = [
            defining(0, "Goblin Guide", 0.9),
            defining(0, "Skirk Prospector", 0.8),
            defining(0, "Sol Ring", 0.1),
            defining(1, "Sol Ring", 1.0),
        ];

        let average = calculate_average_decklists(&decks, &[0, 0, 0, 1], &matrix, &cards, &defining, &[])?;
        assert_eq!(average, BTreeMap::from([(0, 11), (1, 20)]));

        let average = calculate_average_decklists(&decks, &[0, 0, 0, 1], &matrix, &cards, &defining, &[1])?;
        assert_eq!(average, BTreeMap::from([(0, 11)]));
        Ok(())
    }
}

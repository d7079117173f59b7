//! The cards that define each cluster.

use serde::{Deserialize, Serialize};

use super::card_counts::ClusterCardCounts;
use crate::{params::DefiningCardParams, utils::round_half_even, CardIndex, Label};

/// A card that defines a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefiningCard {
    /// The cluster.
    pub cluster: Label,
    /// The name of the card.
    pub card: String,
    /// The share of the cluster's decks that could play the card and did.
    pub play_rate: f64,
    /// The play rate in the cluster less the play rate in every other
    /// cluster combined.
    pub synergy: Option<f64>,
}

impl DefiningCard {
    /// The value used to rank the card, i.e. the synergy if computed and the
    /// play rate otherwise.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.synergy.unwrap_or(self.play_rate)
    }
}

/// Ranks the defining cards of each cluster.
///
/// For each cluster, the `params.n_scope` cards with the highest play rate
/// are kept, with ties in their column order. Their play rate and synergy are
/// rounded to two decimals, and they are sorted by synergy, or by play rate if
/// synergy is not computed, in descending order. Synergy is only computed when
/// it is requested and there is more than one cluster.
///
/// The result lists the clusters in ascending order.
#[must_use]
pub fn get_defining_cards(
    counts: &ClusterCardCounts,
    cards: &CardIndex,
    params: &DefiningCardParams,
) -> Vec<DefiningCard> {
    let (played, not_played) = (counts.played(), counts.not_played());
    let with_synergy = params.include_synergy && counts.n_clusters() > 1;
    if params.include_synergy && !with_synergy {
        ftlog::info!("Only one cluster; not computing synergy.");
    }

    let rate = |p: f64, np: f64| if p + np > 0.0 { p / (p + np) } else { 0.0 };
    let total_played = played.sum_axis(ndarray::Axis(0));
    let total_not_played = not_played.sum_axis(ndarray::Axis(0));

    let mut result = Vec::new();
    for (k, &cluster) in counts.clusters().iter().enumerate() {
        let mut ranked = (0..cards.len())
            .map(|c| {
                let (p, np) = (played[[k, c]], not_played[[k, c]]);
                let play_rate = rate(p, np);
                let synergy =
                    with_synergy.then(|| play_rate - rate(total_played[c] - p, total_not_played[c] - np));
                (c, play_rate, synergy)
            })
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(params.n_scope);

        let mut defining = ranked
            .into_iter()
            .filter_map(|(c, play_rate, synergy)| {
                cards.name(c).map(|name| DefiningCard {
                    cluster,
                    card: name.to_string(),
                    play_rate: round_half_even(play_rate, 2),
                    synergy: synergy.map(|s| round_half_even(s, 2)),
                })
            })
            .collect::<Vec<_>>();
        defining.sort_by(|a, b| b.score().total_cmp(&a.score()));

        ftlog::debug!("Cluster {cluster} has {} defining cards.", defining.len());
        result.extend(defining);
    }

    result
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;
    use ndarray::array;

    use super::*;

    fn cards() -> Result<CardIndex, String> {
        CardIndex::new(vec!["Arcane Signet".into(), "Command Tower".into(), "Sol Ring".into()])
    }

    #[test]
    fn ranked_by_synergy() -> Result<(), String> {
        let counts = ClusterCardCounts::new(
            vec![0, 1],
            array![[4.0, 9.0, 10.0], [1.0, 9.0, 10.0]],
            array![[6.0, 1.0, 0.0], [9.0, 1.0, 0.0]],
        )?;
        let defining = get_defining_cards(&counts, &cards()?, &DefiningCardParams::default());
        assert_eq!(defining.len(), 6);

        let first = &defining[0];
        assert_eq!((first.cluster, first.card.as_str()), (0, "Arcane Signet"));
        assert!(approx_eq!(f64, first.play_rate, 0.4));
        assert!(approx_eq!(f64, first.synergy.unwrap_or_default(), 0.3));

        assert!(defining.iter().all(|d| (0.0..=1.0).contains(&d.play_rate)));
        Ok(())
    }

    #[test]
    fn no_synergy_for_one_cluster() -> Result<(), String> {
        let counts = ClusterCardCounts::new(vec![0], array![[1.0, 0.0, 3.0]], array![[2.0, 0.0, 0.0]])?;
        let params = DefiningCardParams {
            include_synergy: true,
            n_scope: 2,
        };
        let defining = get_defining_cards(&counts, &cards()?, &params);

        assert_eq!(defining.len(), 2);
        assert!(defining.iter().all(|d| d.synergy.is_none()));
        assert_eq!(defining[0].card, "Sol Ring");
        assert!(approx_eq!(f64, defining[1].play_rate, 0.33));
        Ok(())
    }
}

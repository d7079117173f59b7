//! The JSON summary of a map's clusters.

use std::collections::{BTreeMap, BTreeSet};

use serde::{ser::SerializeSeq, Serialize, Serializer};

use crate::{
    analysis::{DefiningCard, TraitMapping, TraitRow},
    Deck, DeckId, Label,
};

/// Cards left out of the defining cards of an export.
pub const BASIC_LANDS: [&str; 5] = ["Plains", "Island", "Swamp", "Mountain", "Forest"];

/// A defining card in an export, written as `[card, play_rate]` or
/// `[card, play_rate, synergy]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DefiningCardEntry {
    /// The name of the card.
    pub card: String,
    /// The play rate of the card in the cluster.
    pub play_rate: f64,
    /// The synergy of the card with the cluster.
    pub synergy: Option<f64>,
}

impl Serialize for DefiningCardEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.synergy.is_some() { 3 } else { 2 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.card)?;
        seq.serialize_element(&self.play_rate)?;
        if let Some(synergy) = self.synergy {
            seq.serialize_element(&synergy)?;
        }
        seq.end()
    }
}

/// The summary of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterExport {
    /// The cluster, only written when several clusters are exported.
    #[serde(rename = "clusterID", skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<Label>,
    /// The `[value, percent]` pairs of each trait category, keyed by the
    /// export key of the category.
    #[serde(flatten)]
    pub traits: BTreeMap<String, Vec<(String, u32)>>,
    /// The defining cards.
    #[serde(rename = "definingCards")]
    pub defining_cards: Vec<DefiningCardEntry>,
    /// The mean price of the cluster's decks with a known price, truncated.
    #[serde(rename = "averagePrice")]
    pub average_price: i64,
    /// The id of the average deck, or `"0"` if there is none.
    #[serde(rename = "averageDeck")]
    pub average_deck: String,
}

/// An export of a map.
///
/// A single cluster is written as a JSON object, and any other number of
/// clusters as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MapExport {
    /// The summary of the only cluster.
    Single(ClusterExport),
    /// The summaries of the clusters, in ascending order.
    Many(Vec<ClusterExport>),
}

impl MapExport {
    /// The summaries of the exported clusters.
    #[must_use]
    pub fn clusters(&self) -> &[ClusterExport] {
        match self {
            Self::Single(cluster) => std::slice::from_ref(cluster),
            Self::Many(clusters) => clusters,
        }
    }

    /// Serializes the export to a JSON string.
    ///
    /// # Errors
    ///
    /// * If serialization fails.
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| e.to_string())
    }
}

/// The analysis results a map is exported from.
#[derive(Debug, Clone, Copy)]
pub struct ExportInput<'a> {
    /// The decks.
    pub decks: &'a [Deck],
    /// The cluster of each deck.
    pub labels: &'a [Label],
    /// The defining cards of every cluster.
    pub defining_cards: &'a [DefiningCard],
    /// The traits of every cluster.
    pub traits: &'a [TraitRow],
    /// The average deck of each cluster.
    pub average_decklists: &'a BTreeMap<Label, DeckId>,
}

/// Builds the export of a map.
///
/// Basic lands are dropped from the defining cards, and theme and tribe rows
/// with an empty value are dropped from the traits. The exported clusters are
/// those among `clusters` (or all clusters if `None`) that still have a trait
/// row, so a cluster whose trait rows were all filtered out is not exported.
///
/// When a trait mapping is given, trait values are replaced by their ids.
///
/// # Errors
///
/// * If the number of labels differs from the number of decks.
pub fn jsonify_map(
    input: ExportInput,
    clusters: Option<&[Label]>,
    mapping: Option<&TraitMapping>,
) -> Result<MapExport, String> {
    let ExportInput {
        decks,
        labels,
        defining_cards,
        traits,
        average_decklists,
    } = input;

    if labels.len() != decks.len() {
        return Err(format!(
            "There are {} labels for {} decks; run clustering before exporting.",
            labels.len(),
            decks.len()
        ));
    }

    let requested = clusters.map_or_else(
        || labels.iter().copied().collect::<BTreeSet<_>>(),
        |c| c.iter().copied().collect(),
    );

    let traits = traits
        .iter()
        .filter(|t| requested.contains(&t.cluster))
        .filter(|t| !(t.category.is_optional() && t.value.is_empty()))
        .collect::<Vec<_>>();
    let exported = traits.iter().map(|t| t.cluster).collect::<BTreeSet<_>>();

    let dropped = requested.difference(&exported).collect::<Vec<_>>();
    if !dropped.is_empty() {
        ftlog::warn!("Clusters {dropped:?} have no traits left and are not exported.");
    }

    let mut prices = BTreeMap::<Label, Vec<f64>>::new();
    for (deck, &label) in decks.iter().zip(labels) {
        if let Some(price) = deck.price().filter(|p| p.is_finite()) {
            prices.entry(label).or_default().push(price);
        }
    }

    let several = exported.len() > 1;
    let mut summaries = exported
        .iter()
        .map(|&cluster| {
            let mut cluster_traits = BTreeMap::<String, Vec<(String, u32)>>::new();
            for t in traits.iter().filter(|t| t.cluster == cluster) {
                let value = mapping.map_or_else(|| t.value.clone(), |m| m.convert(t.category, &t.value));
                cluster_traits
                    .entry(t.category.export_key().to_string())
                    .or_default()
                    .push((value, t.percent));
            }

            let cards = defining_cards
                .iter()
                .filter(|d| d.cluster == cluster && !BASIC_LANDS.contains(&d.card.as_str()))
                .map(|d| DefiningCardEntry {
                    card: d.card.clone(),
                    play_rate: d.play_rate,
                    synergy: d.synergy,
                })
                .collect();

            #[allow(clippy::cast_possible_truncation)]
            let average_price = prices
                .get(&cluster)
                .and_then(|p| crate::utils::mean::<f64, f64>(p))
                .map_or(0, |p| p as i64);

            ClusterExport {
                cluster_id: several.then_some(cluster),
                traits: cluster_traits,
                defining_cards: cards,
                average_price,
                average_deck: average_decklists
                    .get(&cluster)
                    .map_or_else(|| "0".to_string(), ToString::to_string),
            }
        })
        .collect::<Vec<_>>();

    ftlog::info!("Exported {} clusters.", summaries.len());

    Ok(if summaries.len() == 1 {
        MapExport::Single(summaries.remove(0))
    } else {
        MapExport::Many(summaries)
    })
}


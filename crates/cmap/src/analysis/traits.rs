//! The dominant categorical traits of each cluster.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{params::TraitParams, utils::round_half_even, Deck, Label};

/// A categorical trait of a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraitCategory {
    /// The commander, joined with the partner as `"commander + partner"`.
    #[serde(rename = "commander-partnerID")]
    CommanderPartner,
    /// The color identity, written in WUBRG order.
    #[serde(rename = "colorIdentityID")]
    ColorIdentity,
    /// The theme.
    #[serde(rename = "themeID")]
    Theme,
    /// The tribe.
    #[serde(rename = "tribeID")]
    Tribe,
}

impl TraitCategory {
    /// Every category, in the order they are analyzed by default.
    pub const ALL: [Self; 4] = [Self::CommanderPartner, Self::ColorIdentity, Self::Theme, Self::Tribe];

    /// The name of the category in analysis tables.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CommanderPartner => "commander-partnerID",
            Self::ColorIdentity => "colorIdentityID",
            Self::Theme => "themeID",
            Self::Tribe => "tribeID",
        }
    }

    /// The key of the category in exports and trait mappings.
    #[must_use]
    pub const fn export_key(self) -> &'static str {
        match self {
            Self::CommanderPartner => "commanderID",
            other => other.name(),
        }
    }

    /// Whether an empty value of this category carries no signal.
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::Theme | Self::Tribe)
    }

    /// The value of this trait for the given deck.
    #[must_use]
    pub fn value_of(self, deck: &Deck) -> String {
        match self {
            Self::CommanderPartner => deck.commander_pair(),
            Self::ColorIdentity => deck.color_identity().to_string(),
            Self::Theme => deck.theme().to_string(),
            Self::Tribe => deck.tribe().to_string(),
        }
    }

    /// Parses a list of category names.
    ///
    /// # Errors
    ///
    /// * If any name is not a category, listing every such name.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>, String> {
        let (parsed, missing): (Vec<_>, Vec<_>) = names
            .iter()
            .map(|n| n.as_ref().parse::<Self>().map_err(|_| n.as_ref().to_string()))
            .partition(Result::is_ok);

        if missing.is_empty() {
            Ok(parsed.into_iter().filter_map(Result::ok).collect())
        } else {
            let missing = missing.into_iter().filter_map(Result::err).collect::<Vec<_>>();
            Err(format!("Missing trait categories: {missing:?}"))
        }
    }
}

impl std::fmt::Display for TraitCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TraitCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commander-partnerID" | "commanderID" | "commander" => Ok(Self::CommanderPartner),
            "colorIdentityID" | "color_identity" => Ok(Self::ColorIdentity),
            "themeID" | "theme" => Ok(Self::Theme),
            "tribeID" | "tribe" => Ok(Self::Tribe),
            _ => Err(format!("Unknown trait category `{s}`.")),
        }
    }
}

/// The share of a cluster's decks with one value of one trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitRow {
    /// The cluster.
    pub cluster: Label,
    /// The trait.
    pub category: TraitCategory,
    /// The value of the trait.
    pub value: String,
    /// The integer percentage of the cluster's decks with this value.
    pub percent: u32,
}

/// Computes the dominant traits of each cluster.
///
/// For each category, the percentage of a cluster's decks holding each value
/// is rounded to an integer, ties going to the even neighbor. If rounding
/// pushes the percentages of a cluster above 100 in total, the rounded-up
/// values with the smallest fractional parts are decremented until the total
/// is 100.
///
/// Rows are grouped by category, in the order of `params.categories`, and
/// within a category ordered by cluster, then by percent descending, then by
/// value. Only rows with at least `params.min_percent` percent are kept, and
/// at most `params.top_n` per cluster and category.
///
/// # Errors
///
/// * If the number of labels differs from the number of decks.
pub fn get_cluster_traits(decks: &[Deck], labels: &[Label], params: &TraitParams) -> Result<Vec<TraitRow>, String> {
    if labels.len() != decks.len() {
        return Err(format!(
            "There are {} labels for {} decks; run clustering on these decks first.",
            labels.len(),
            decks.len()
        ));
    }

    let categories = params
        .categories
        .iter()
        .copied()
        .filter(|c| !params.excluded.contains(c))
        .collect::<Vec<_>>();

    let n_clusters = labels.iter().collect::<BTreeSet<_>>().len();
    ftlog::debug!("Computing {} trait categories over {n_clusters} clusters.", categories.len());

    let mut rows = Vec::new();
    for category in categories {
        let mut counts = BTreeMap::<Label, BTreeMap<String, usize>>::new();
        for (deck, &label) in decks.iter().zip(labels) {
            *counts
                .entry(label)
                .or_default()
                .entry(category.value_of(deck))
                .or_default() += 1;
        }

        for (cluster, values) in counts {
            let mut percents = cluster_percents(&values);
            percents.sort_by(|(va, pa), (vb, pb)| pb.cmp(pa).then_with(|| va.cmp(vb)));
            rows.extend(
                percents
                    .into_iter()
                    .filter(|&(_, p)| p >= params.min_percent)
                    .take(params.top_n)
                    .map(|(value, percent)| TraitRow {
                        cluster,
                        category,
                        value,
                        percent,
                    }),
            );
        }
    }

    Ok(rows)
}

/// The rounded percentage of each value, capped to a total of 100.
fn cluster_percents(values: &BTreeMap<String, usize>) -> Vec<(String, u32)> {
    let total = values.values().sum::<usize>();

    #[allow(clippy::cast_precision_loss)]
    let raw = values
        .iter()
        .map(|(v, &c)| (v.clone(), c as f64 / total as f64 * 100.0))
        .collect::<Vec<_>>();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut percents = raw
        .iter()
        .map(|(v, p)| (v.clone(), round_half_even(*p, 0) as u32))
        .collect::<Vec<_>>();

    let mut excess = percents.iter().map(|&(_, p)| p).sum::<u32>().saturating_sub(100);
    if excess > 0 {
        let mut rounded_up = raw
            .iter()
            .enumerate()
            .filter(|&(i, (_, p))| f64::from(percents[i].1) > *p)
            .map(|(i, (_, p))| (p - p.floor(), i))
            .collect::<Vec<_>>();
        rounded_up.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (_, i) in rounded_up {
            if excess == 0 {
                break;
            }
            percents[i].1 -= 1;
            excess -= 1;
        }
    }

    percents
}

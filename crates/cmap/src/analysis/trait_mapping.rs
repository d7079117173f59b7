//! Integer ids for trait values, used to compress exports.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::traits::TraitCategory;
use crate::{ColorIdentity, Deck};

/// The categories of a mapping, in the order their rows are listed.
const MAPPED: [TraitCategory; 4] = [
    TraitCategory::CommanderPartner,
    TraitCategory::Theme,
    TraitCategory::Tribe,
    TraitCategory::ColorIdentity,
];

/// A row of a trait mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitMappingRow {
    /// The export key of the category.
    pub category: String,
    /// The trait value.
    pub internal_slug: String,
    /// The id of the value within its category.
    pub id: u32,
}

/// Maps each value of each trait category to an integer id.
///
/// The commander category covers every commander, partner and companion, so
/// that the components of a commander pair can be mapped separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitMapping {
    /// The ids of the values of each category.
    ids: BTreeMap<TraitCategory, BTreeMap<String, u32>>,
}

impl TraitMapping {
    /// Builds the mapping from the decks.
    ///
    /// Commander, theme and tribe values are sorted, skipping empty values,
    /// and numbered from 0. Color identities cover all 32 identities in
    /// power-set order, starting with the colorless identity.
    #[must_use]
    pub fn build(decks: &[Deck]) -> Self {
        let sorted_ids = |values: BTreeSet<&str>| {
            values
                .into_iter()
                .filter(|v| !v.is_empty())
                .zip(0_u32..)
                .map(|(v, i)| (v.to_string(), i))
                .collect::<BTreeMap<_, _>>()
        };

        let commanders = decks.iter().flat_map(Deck::all_commanders).collect();
        let themes = decks.iter().map(Deck::theme).collect();
        let tribes = decks.iter().map(Deck::tribe).collect();
        let colors = ColorIdentity::all()
            .into_iter()
            .zip(0_u32..)
            .map(|(ci, i)| (ci.to_string(), i))
            .collect();

        let ids = BTreeMap::from([
            (TraitCategory::CommanderPartner, sorted_ids(commanders)),
            (TraitCategory::Theme, sorted_ids(themes)),
            (TraitCategory::Tribe, sorted_ids(tribes)),
            (TraitCategory::ColorIdentity, colors),
        ]);

        let n_traits = ids.values().map(BTreeMap::len).sum::<usize>();
        ftlog::info!("Defined {n_traits} trait mappings.");

        Self { ids }
    }

    /// Rebuilds a mapping from its rows.
    ///
    /// # Errors
    ///
    /// * If a row names an unknown category.
    /// * If a value appears twice within a category.
    pub fn from_rows(rows: &[TraitMappingRow]) -> Result<Self, String> {
        let mut ids = BTreeMap::<TraitCategory, BTreeMap<String, u32>>::new();
        for row in rows {
            let category = row.category.parse::<TraitCategory>()?;
            if ids
                .entry(category)
                .or_default()
                .insert(row.internal_slug.clone(), row.id)
                .is_some()
            {
                return Err(format!(
                    "The value `{}` appears twice in category `{}`.",
                    row.internal_slug, row.category
                ));
            }
        }
        Ok(Self { ids })
    }

    /// The rows of the mapping, listing the commander, theme, tribe and
    /// color-identity categories in that order, each by increasing id.
    #[must_use]
    pub fn rows(&self) -> Vec<TraitMappingRow> {
        MAPPED
            .iter()
            .filter_map(|c| self.ids.get(c).map(|ids| (c, ids)))
            .flat_map(|(category, ids)| {
                let mut rows = ids
                    .iter()
                    .map(|(slug, &id)| TraitMappingRow {
                        category: category.export_key().to_string(),
                        internal_slug: slug.clone(),
                        id,
                    })
                    .collect::<Vec<_>>();
                rows.sort_by_key(|r| r.id);
                rows
            })
            .collect()
    }

    /// The id of a value.
    #[must_use]
    pub fn get(&self, category: TraitCategory, value: &str) -> Option<u32> {
        self.ids.get(&category).and_then(|ids| ids.get(value)).copied()
    }

    /// Converts a trait value to its id as a string.
    ///
    /// Commander pairs written as `"A + B"` are converted component-wise and
    /// joined as `"idA+idB"`. Values without an id are kept as they are.
    #[must_use]
    pub fn convert(&self, category: TraitCategory, value: &str) -> String {
        let lookup = |v: &str| self.get(category, v).map_or_else(|| v.to_string(), |id| id.to_string());
        if category == TraitCategory::CommanderPartner && value.contains(" + ") {
            value.split(" + ").map(lookup).collect::<Vec<_>>().join("+")
        } else {
            lookup(value)
        }
    }
}

/// Builds the trait mapping of the given decks.
#[must_use]
pub fn build_trait_mapping(decks: &[Deck]) -> TraitMapping {
    TraitMapping::build(decks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decks() -> Vec<Deck> {
        vec![
            Deck::new(1, "Tymna the Weaver", Vec::new())
                .with_partner("Thrasios, Triton Hero")
                .with_theme("Stax"),
            Deck::new(2, "Lurrus of the Dream-Den", Vec::new()).with_tribe("Cats"),
            Deck::new(3, "Kaheera, the Orphanguard", Vec::new()).with_companion("Lurrus of the Dream-Den"),
        ]
    }

    #[test]
    fn sorted_ids() {
        let mapping = build_trait_mapping(&decks());
        assert_eq!(mapping.get(TraitCategory::CommanderPartner, "Kaheera, the Orphanguard"), Some(0));
        assert_eq!(mapping.get(TraitCategory::CommanderPartner, "Tymna the Weaver"), Some(3));
        assert_eq!(mapping.get(TraitCategory::Theme, ""), None);
        assert_eq!(mapping.get(TraitCategory::ColorIdentity, ""), Some(0));
        assert_eq!(mapping.get(TraitCategory::ColorIdentity, "WUBRG"), Some(31));
        assert_eq!(mapping.rows().len(), 4 + 1 + 1 + 32);
    }

    #[test]
    fn converts_pairs() -> Result<(), String> {
        let mapping = build_trait_mapping(&decks());
        assert_eq!(
            mapping.convert(TraitCategory::CommanderPartner, "Tymna the Weaver + Thrasios, Triton Hero"),
            "3+2"
        );
        assert_eq!(mapping.convert(TraitCategory::Theme, "Voltron"), "Voltron");

        let rebuilt = TraitMapping::from_rows(&mapping.rows())?;
        assert_eq!(rebuilt, mapping);
        Ok(())
    }
}

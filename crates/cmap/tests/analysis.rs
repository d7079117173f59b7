//! Tests for the cluster traits, card counts, defining cards and average
//! decks.

use std::collections::BTreeMap;

use cmap::{
    analysis::{
        calculate_average_decklists, get_cluster_card_counts, get_cluster_traits, get_defining_cards,
        TraitCategory, TraitRow,
    },
    params::{CardCountParams, DefiningCardParams, TraitParams},
    Deck, DeckMatrix, Label,
};
use float_cmp::approx_eq;
use test_case::test_case;

mod common;

use common::data_gen;

/// The group of each deck made by `data_gen::groups`.
fn group_labels(n_groups: usize, per_group: usize) -> Vec<Label> {
    (0..n_groups)
        .flat_map(|g| std::iter::repeat(Label::try_from(g).unwrap_or_default()).take(per_group))
        .collect()
}

fn rows_of(traits: &[TraitRow], category: TraitCategory) -> Vec<(Label, &str, u32)> {
    traits
        .iter()
        .filter(|t| t.category == category)
        .map(|t| (t.cluster, t.value.as_str(), t.percent))
        .collect()
}

#[test]
fn traits_of_pure_clusters() -> Result<(), String> {
    let decks = data_gen::groups(3, 4);
    let traits = get_cluster_traits(&decks, &group_labels(3, 4), &TraitParams::default())?;

    let commanders = rows_of(&traits, TraitCategory::CommanderPartner);
    assert_eq!(
        commanders,
        vec![(0, "Commander 0", 100), (1, "Commander 1", 100), (2, "Commander 2", 100)]
    );
    let themes = rows_of(&traits, TraitCategory::Theme);
    assert_eq!(themes, vec![(0, "Tokens", 100), (1, "", 100), (2, "Tokens", 100)]);

    // Rows are grouped by category, in the order the categories are listed.
    let categories = traits.iter().map(|t| t.category).collect::<Vec<_>>();
    let mut grouped = categories.clone();
    grouped.dedup();
    assert_eq!(grouped, TraitCategory::ALL.to_vec());
    Ok(())
}

#[test_case(20, 1, 3 ; "defaults")]
#[test_case(2, 1, 2 ; "top two")]
#[test_case(20, 34, 0 ; "above every share")]
fn traits_of_one_cluster(top_n: usize, min_percent: u32, expected: usize) -> Result<(), String> {
    let decks = data_gen::groups(3, 4);
    let params = TraitParams {
        top_n,
        min_percent,
        categories: vec![TraitCategory::CommanderPartner],
        ..TraitParams::default()
    };
    let traits = get_cluster_traits(&decks, &[0; 12], &params)?;

    assert_eq!(traits.len(), expected);
    assert!(traits.iter().all(|t| t.percent == 33));
    let values = traits.iter().map(|t| t.value.as_str()).collect::<Vec<_>>();
    let mut sorted = values.clone();
    sorted.sort_unstable();
    assert_eq!(values, sorted);
    Ok(())
}

#[test]
fn excluded_traits() -> Result<(), String> {
    let decks = data_gen::groups(2, 3);
    let params = TraitParams {
        excluded: vec![TraitCategory::CommanderPartner, TraitCategory::ColorIdentity],
        ..TraitParams::default()
    };
    let traits = get_cluster_traits(&decks, &group_labels(2, 3), &params)?;
    assert!(traits
        .iter()
        .all(|t| matches!(t.category, TraitCategory::Theme | TraitCategory::Tribe)));

    assert!(get_cluster_traits(&decks, &[0; 5], &params).is_err());
    Ok(())
}

#[test]
fn counts_and_defining_cards() -> Result<(), String> {
    let decks = data_gen::groups(3, 4);
    let labels = group_labels(3, 4);
    let (matrix, cards) = DeckMatrix::from_decks(&decks);
    let references = data_gen::permissive_references(&decks, &cards);

    let counts = get_cluster_card_counts(&decks, &labels, &matrix, &cards, &references, &CardCountParams::default())?;
    assert_eq!(counts.clusters(), &[0, 1, 2]);
    assert!(counts.not_played().iter().all(|&v| v >= 0.0));
    for (&p, &np) in counts.played().iter().zip(counts.not_played()) {
        assert!(approx_eq!(f64, p + np, 4.0));
    }

    let defining = get_defining_cards(&counts, &cards, &DefiningCardParams::default());
    assert_eq!(defining.len(), 3 * cards.len());
    assert!(defining.iter().all(|d| (0.0..=1.0).contains(&d.play_rate)));

    let first = &defining[0];
    assert_eq!(first.cluster, 0);
    assert!(first.card.starts_with("Group 0 Card"));
    assert!(approx_eq!(f64, first.play_rate, 1.0));
    assert!(approx_eq!(f64, first.synergy.unwrap_or_default(), 1.0));

    let deck_card = defining
        .iter()
        .find(|d| d.cluster == 0 && d.card == "Group 0 Deck 2")
        .ok_or("missing deck card")?;
    assert!(approx_eq!(f64, deck_card.play_rate, 0.25));
    Ok(())
}

#[test]
fn commanders_in_matrix_are_not_counted() -> Result<(), String> {
    let decks = (0..3)
        .map(|i| {
            Deck::new(i, "Krenko, Mob Boss", data_gen::names(&["Krenko, Mob Boss", "Goblin Guide"]))
                .with_date("2023-01-01")
        })
        .collect::<Vec<_>>();
    let (matrix, cards) = DeckMatrix::from_decks(&decks);
    let references = data_gen::permissive_references(&decks, &cards);
    let params = CardCountParams {
        commanders_in_matrix: true,
        chunk_size: 2,
        ..CardCountParams::default()
    };

    let counts = get_cluster_card_counts(&decks, &[0; 3], &matrix, &cards, &references, &params)?;
    let krenko = cards.column("Krenko, Mob Boss").ok_or("missing")?;
    let goblin = cards.column("Goblin Guide").ok_or("missing")?;
    assert!(approx_eq!(f64, counts.played()[[0, krenko]], 0.0));
    assert!(approx_eq!(f64, counts.not_played()[[0, krenko]], 3.0));
    assert!(approx_eq!(f64, counts.played()[[0, goblin]], 3.0));
    Ok(())
}

#[test]
fn missing_reference_lookups() -> Result<(), String> {
    let decks = data_gen::groups(2, 2);
    let (matrix, cards) = DeckMatrix::from_decks(&decks);
    let references = data_gen::permissive_references(&decks[..1], &cards);

    let err = get_cluster_card_counts(&decks, &[0, 0, 1, 1], &matrix, &cards, &references, &CardCountParams::default());
    assert_eq!(err.err(), Some("Deck 2 is missing from the reference matrix.".to_string()));
    Ok(())
}

#[test]
fn average_decks_belong_to_their_clusters() -> Result<(), String> {
    let decks = data_gen::groups(3, 5);
    let labels = group_labels(3, 5);
    let (matrix, cards) = DeckMatrix::from_decks(&decks);
    let references = data_gen::permissive_references(&decks, &cards);

    let counts = get_cluster_card_counts(&decks, &labels, &matrix, &cards, &references, &CardCountParams::default())?;
    let defining = get_defining_cards(&counts, &cards, &DefiningCardParams::default());
    let average = calculate_average_decklists(&decks, &labels, &matrix, &cards, &defining, &[2])?;

    assert_eq!(average.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    let clusters = decks
        .iter()
        .map(Deck::deck_id)
        .zip(labels.iter().copied())
        .collect::<BTreeMap<_, _>>();
    for (cluster, deck_id) in average {
        assert_eq!(clusters[&deck_id], cluster);
    }
    Ok(())
}

//! Synthetic decks for testing.

use std::sync::Arc;

use cmap::{CardIndex, ColorIdentity, CommanderMap, Deck, DeckMatrix, ReferenceMatrices, ReferenceMatrix};

/// The number of cards every deck of a group shares.
pub const SHARED_CARDS: usize = 6;

/// The commander of the given group.
pub fn commander(group: usize) -> String {
    format!("Commander {group}")
}

/// Decks in `n_groups` groups of `per_group` decks.
///
/// The decks of a group share a commander, a color identity, a theme and
/// `SHARED_CARDS` cards, and each deck adds one card of its own, so that no
/// two groups have a card in common. Deck ids start at 1.
pub fn groups(n_groups: usize, per_group: usize) -> Vec<Deck> {
    (0..n_groups)
        .flat_map(|g| (0..per_group).map(move |i| (g, i)))
        .enumerate()
        .map(|(d, (g, i))| {
            let cards = (0..SHARED_CARDS)
                .map(|c| format!("Group {g} Card {c}"))
                .chain(std::iter::once(format!("Group {g} Deck {i}")))
                .collect();
            #[allow(clippy::cast_possible_truncation)]
            let bits = 1 << (g % 5) as u8;
            Deck::new(d as u64 + 1, commander(g), cards)
                .with_color_identity(ColorIdentity::from_bits(bits))
                .with_theme(if g % 2 == 0 { "Tokens" } else { "" })
                .with_tribe(format!("Tribe {g}"))
                .with_date("2023-01-01")
                .with_price(100.0 + d as f64)
        })
        .collect()
}

/// A map of the given decks with reference matrices in which every deck
/// could play every card.
pub fn map(decks: Vec<Deck>) -> Result<CommanderMap, String> {
    let (matrix, cards) = DeckMatrix::from_decks(&decks);
    let references = permissive_references(&decks, &cards);
    Ok(CommanderMap::new(matrix, cards, decks)?.with_references(Arc::new(references)))
}

/// Reference matrices in which every card is colorless and released
/// before every deck was saved.
pub fn permissive_references(decks: &[Deck], cards: &CardIndex) -> ReferenceMatrices {
    let deck_dates = decks
        .iter()
        .map(|d| (d.deck_id(), d.date().to_string()))
        .collect::<Vec<_>>();
    let releases = cards
        .names()
        .iter()
        .map(|n| (n.clone(), "1993-08-05".to_string()))
        .collect::<Vec<_>>();

    let deck_colors = decks
        .iter()
        .map(|d| (d.deck_id(), d.color_identity()))
        .collect::<Vec<_>>();
    let card_colors = cards
        .names()
        .iter()
        .map(|n| (n.clone(), ColorIdentity::COLORLESS))
        .collect::<Vec<_>>();

    ReferenceMatrices::new(
        ReferenceMatrix::date_legality(&deck_dates, &releases),
        ReferenceMatrix::color_identity(&deck_colors, &card_colors),
    )
}

/// Converts string slices into owned card names.
pub fn names(cards: &[&str]) -> Vec<String> {
    cards.iter().map(ToString::to_string).collect()
}

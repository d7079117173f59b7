//! Boolean reference matrices answering "could this deck have played this
//! card", independent of whether it did.

use std::collections::HashMap;

use ndarray::Array2;

use super::deck::{ColorIdentity, DeckId};

/// A boolean matrix with deck-id→row and card-name→column lookups.
///
/// Several decks may share a row and several cards may share a column, e.g.
/// all decks saved on the same date share one date bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMatrix {
    /// The cells of the matrix.
    cells: Array2<bool>,
    /// The row of each deck.
    deck_rows: HashMap<DeckId, usize>,
    /// The column of each card.
    card_columns: HashMap<String, usize>,
}

impl ReferenceMatrix {
    /// Creates a new `ReferenceMatrix`.
    ///
    /// # Errors
    ///
    /// * If any deck maps to a row outside the matrix.
    /// * If any card maps to a column outside the matrix.
    pub fn new(
        cells: Array2<bool>,
        deck_rows: HashMap<DeckId, usize>,
        card_columns: HashMap<String, usize>,
    ) -> Result<Self, String> {
        let (n_rows, n_columns) = cells.dim();
        if let Some((id, &r)) = deck_rows.iter().find(|(_, &r)| r >= n_rows) {
            return Err(format!("Deck {id} maps to row {r} but the matrix has {n_rows} rows."));
        }
        if let Some((name, &c)) = card_columns.iter().find(|(_, &c)| c >= n_columns) {
            return Err(format!(
                "Card `{name}` maps to column {c} but the matrix has {n_columns} columns."
            ));
        }
        Ok(Self {
            cells,
            deck_rows,
            card_columns,
        })
    }

    /// Builds the date-legality matrix.
    ///
    /// The buckets are the sorted distinct ISO dates among deck save dates and
    /// card release dates. The cell for (deck bucket, card bucket) is true
    /// when the deck was saved on or after the card's release.
    ///
    /// # Arguments
    ///
    /// * `deck_dates`: the save date of each deck.
    /// * `card_releases`: the earliest release date of each card.
    #[must_use]
    pub fn date_legality(deck_dates: &[(DeckId, String)], card_releases: &[(String, String)]) -> Self {
        let mut buckets = deck_dates
            .iter()
            .map(|(_, d)| d.as_str())
            .chain(card_releases.iter().map(|(_, d)| d.as_str()))
            .collect::<Vec<_>>();
        buckets.sort_unstable();
        buckets.dedup();

        let bucket_of = |date: &str| buckets.binary_search(&date).unwrap_or_default();
        let deck_rows = deck_dates.iter().map(|(id, d)| (*id, bucket_of(d))).collect();
        let card_columns = card_releases
            .iter()
            .map(|(name, d)| (name.clone(), bucket_of(d)))
            .collect();

        let n = buckets.len();
        let cells = Array2::from_shape_fn((n, n), |(r, c)| r >= c);

        Self {
            cells,
            deck_rows,
            card_columns,
        }
    }

    /// Builds the color-identity matrix.
    ///
    /// Rows and columns are the 32 color identities in power-set order. The
    /// cell for (deck identity, card identity) is true when the deck's
    /// identity is a superset of the card's.
    #[must_use]
    pub fn color_identity(
        deck_identities: &[(DeckId, ColorIdentity)],
        card_identities: &[(String, ColorIdentity)],
    ) -> Self {
        let all = ColorIdentity::all();
        let position_of = |ci: ColorIdentity| all.iter().position(|&a| a == ci).unwrap_or_default();

        let deck_rows = deck_identities.iter().map(|&(id, ci)| (id, position_of(ci))).collect();
        let card_columns = card_identities
            .iter()
            .map(|(name, ci)| (name.clone(), position_of(*ci)))
            .collect();
        let cells = Array2::from_shape_fn((all.len(), all.len()), |(r, c)| all[r].can_play(all[c]));

        Self {
            cells,
            deck_rows,
            card_columns,
        }
    }

    /// Returns the row of the given deck.
    ///
    /// # Errors
    ///
    /// * If the deck is not in the lookup.
    pub fn deck_row(&self, deck_id: DeckId) -> Result<usize, String> {
        self.deck_rows
            .get(&deck_id)
            .copied()
            .ok_or_else(|| format!("Deck {deck_id} is missing from the reference matrix."))
    }

    /// Returns the column of the given card.
    ///
    /// # Errors
    ///
    /// * If the card is not in the lookup.
    pub fn card_column(&self, name: &str) -> Result<usize, String> {
        self.card_columns
            .get(name)
            .copied()
            .ok_or_else(|| format!("Card `{name}` is missing from the reference matrix."))
    }

    /// Returns the value of the cell at the given row and column.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> bool {
        self.cells[[row, column]]
    }

    /// Returns the shape of the matrix.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.cells.dim()
    }
}

/// The date and color-identity reference matrices, shared read-only between
/// a map and its submaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMatrices {
    /// The date-legality matrix.
    dates: ReferenceMatrix,
    /// The color-identity matrix.
    colors: ReferenceMatrix,
}

impl ReferenceMatrices {
    /// Bundles the date and color-identity matrices.
    #[must_use]
    pub const fn new(dates: ReferenceMatrix, colors: ReferenceMatrix) -> Self {
        Self { dates, colors }
    }

    /// The date-legality matrix.
    #[must_use]
    pub const fn dates(&self) -> &ReferenceMatrix {
        &self.dates
    }

    /// The color-identity matrix.
    #[must_use]
    pub const fn colors(&self) -> &ReferenceMatrix {
        &self.colors
    }
}

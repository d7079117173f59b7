//! The sparse deck×card matrix and the card-name↔column bijection.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::deck::Deck;

/// A bijection between card names and matrix columns.
///
/// Serializes as the list of names in column order. Deserializing rebuilds the
/// name→column lookup and fails on duplicate names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CardIndex {
    /// The card names, in column order.
    names: Vec<String>,
    /// The column of each card name.
    columns: HashMap<String, usize>,
}

impl TryFrom<Vec<String>> for CardIndex {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<CardIndex> for Vec<String> {
    fn from(index: CardIndex) -> Self {
        index.names
    }
}

impl CardIndex {
    /// Creates a new `CardIndex` from card names in column order.
    ///
    /// # Errors
    ///
    /// * If any card name appears more than once.
    pub fn new(names: Vec<String>) -> Result<Self, String> {
        let mut columns = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if let Some(j) = columns.insert(name.clone(), i) {
                return Err(format!(
                    "Card names must be unique, but `{name}` is in columns {j} and {i}."
                ));
            }
        }
        Ok(Self { names, columns })
    }

    /// Returns the column of the given card, if it is in the index.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    /// Returns the name of the card in the given column.
    #[must_use]
    pub fn name(&self, column: usize) -> Option<&str> {
        self.names.get(column).map(String::as_str)
    }

    /// Returns the card names in column order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the number of cards in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A sparse deck×card count matrix.
///
/// Each row holds the `(column, count)` pairs of the cards in one deck, sorted
/// by column and with no zero counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckMatrix {
    /// The non-zero entries of each row.
    rows: Vec<Vec<(usize, u32)>>,
    /// The number of columns.
    n_cards: usize,
}

impl DeckMatrix {
    /// Creates a new `DeckMatrix` from its rows.
    ///
    /// Entries within a row are sorted by column, repeated columns are summed
    /// and zero counts are dropped.
    ///
    /// # Errors
    ///
    /// * If any entry refers to a column outside `0..n_cards`.
    pub fn new(rows: Vec<Vec<(usize, u32)>>, n_cards: usize) -> Result<Self, String> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(r, row)| {
                let mut merged = BTreeMap::new();
                for (c, count) in row {
                    if c >= n_cards {
                        return Err(format!(
                            "Row {r} has an entry in column {c} but the matrix only has {n_cards} columns."
                        ));
                    }
                    *merged.entry(c).or_insert(0) += count;
                }
                Ok(merged.into_iter().filter(|&(_, count)| count > 0).collect())
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows, n_cards })
    }

    /// Builds the matrix of the given decks along with its `CardIndex`.
    ///
    /// The columns are the distinct card names across all decks, sorted by
    /// name. A card listed more than once in a deck occupies a single column
    /// whose count is the number of copies.
    #[must_use]
    pub fn from_decks(decks: &[Deck]) -> (Self, CardIndex) {
        let mut names = decks
            .iter()
            .flat_map(|d| d.cards().iter().cloned())
            .collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();

        let columns = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect::<HashMap<_, _>>();

        let rows = decks
            .iter()
            .map(|d| {
                let mut counts = BTreeMap::new();
                for card in d.cards() {
                    *counts.entry(columns[card]).or_insert(0_u32) += 1;
                }
                counts.into_iter().collect()
            })
            .collect();

        let n_cards = names.len();
        (Self { rows, n_cards }, CardIndex { names, columns })
    }

    /// Returns the number of decks (rows).
    #[must_use]
    pub fn n_decks(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of cards (columns).
    #[must_use]
    pub const fn n_cards(&self) -> usize {
        self.n_cards
    }

    /// Returns the `(column, count)` entries of a row.
    #[must_use]
    pub fn row(&self, r: usize) -> &[(usize, u32)] {
        &self.rows[r]
    }

    /// Returns the columns of the non-zero entries of a row.
    #[must_use]
    pub fn row_columns(&self, r: usize) -> Vec<usize> {
        self.rows[r].iter().map(|&(c, _)| c).collect()
    }

    /// Returns the row as a dense vector of counts.
    #[must_use]
    pub fn dense_row(&self, r: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_cards];
        for &(c, count) in &self.rows[r] {
            dense[c] = f64::from(count);
        }
        dense
    }

    /// Returns the count in the given cell.
    #[must_use]
    pub fn get(&self, r: usize, c: usize) -> u32 {
        self.rows[r]
            .binary_search_by_key(&c, |&(col, _)| col)
            .map_or(0, |i| self.rows[r][i].1)
    }

    /// Counts, per column, how many of the given rows hold the card.
    ///
    /// Copies are not counted: a row with 30 of a card adds 1 to its column.
    #[must_use]
    pub fn column_presence(&self, rows: &[usize]) -> Vec<f64> {
        let mut present = vec![0.0; self.n_cards];
        for &r in rows {
            for &(c, count) in &self.rows[r] {
                if count > 0 {
                    present[c] += 1.0;
                }
            }
        }
        present
    }

    /// Returns a new matrix holding only the given rows, in the given order.
    #[must_use]
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            rows: rows.iter().map(|&r| self.rows[r].clone()).collect(),
            n_cards: self.n_cards,
        }
    }

    /// Drops every column with no non-zero entries.
    ///
    /// Returns the compacted matrix along with a `CardIndex` for the kept
    /// columns, built from the names in `cards`.
    ///
    /// # Errors
    ///
    /// * If `cards` does not have one name per column.
    pub fn drop_empty_columns(&self, cards: &CardIndex) -> Result<(Self, CardIndex), String> {
        if cards.len() != self.n_cards {
            return Err(format!(
                "The card index has {} cards but the matrix has {} columns.",
                cards.len(),
                self.n_cards
            ));
        }

        let mut used = vec![false; self.n_cards];
        for &(c, _) in self.rows.iter().flatten() {
            used[c] = true;
        }

        let mut remap = vec![None; self.n_cards];
        let mut names = Vec::new();
        for (c, _) in used.iter().enumerate().filter(|(_, &u)| u) {
            remap[c] = Some(names.len());
            names.push(cards.names[c].clone());
        }

        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().filter_map(|&(c, count)| remap[c].map(|n| (n, count))).collect())
            .collect();
        let matrix = Self {
            rows,
            n_cards: names.len(),
        };

        Ok((matrix, CardIndex::new(names)?))
    }
}

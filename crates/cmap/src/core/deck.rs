//! A Commander deck and its color identity.

use serde::{Deserialize, Serialize};

/// The identifier of a deck.
pub type DeckId = u64;

/// The color identity of a card or a deck.
///
/// Stored as a bit-set over the five colors in WUBRG order, so that the
/// superset check used for "could this deck play this card" is a single
/// mask operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ColorIdentity(u8);

impl ColorIdentity {
    /// The five colors in WUBRG order.
    pub const WUBRG: [char; 5] = ['W', 'U', 'B', 'R', 'G'];

    /// The colorless identity.
    pub const COLORLESS: Self = Self(0);

    /// Creates a `ColorIdentity` from its raw bit-set.
    ///
    /// Bits above the fifth are ignored.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1_1111)
    }

    /// Returns the raw bit-set of the identity.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns the number of colors in the identity.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Whether the identity is colorless.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether a deck of this identity may play a card of the `other` identity,
    /// i.e. whether `self` is a superset of `other`.
    #[must_use]
    pub const fn can_play(self, other: Self) -> bool {
        other.0 & !self.0 == 0
    }

    /// Returns all 32 color identities in power-set order.
    ///
    /// The identities are ordered by number of colors and then
    /// lexicographically by their position in WUBRG, so the colorless
    /// identity comes first and `WUBRG` comes last.
    #[must_use]
    pub fn all() -> Vec<Self> {
        let mut identities = (0..32_u8).map(Self).collect::<Vec<_>>();
        identities.sort_by_key(|ci| (ci.len(), ci.wubrg_positions()));
        identities
    }

    /// The positions in WUBRG of the colors in this identity.
    fn wubrg_positions(self) -> Vec<usize> {
        (0..5).filter(|&i| self.0 & (1 << i) != 0).collect()
    }
}

impl std::fmt::Display for ColorIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = Self::WUBRG
            .iter()
            .enumerate()
            .filter(|&(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, &c)| c)
            .collect::<String>();
        f.write_str(&s)
    }
}

impl std::str::FromStr for ColorIdentity {
    type Err = String;

    /// Parses identities written as `"WUB"`, `"{W,U,B}"` or `""` (colorless).
    ///
    /// Braces, commas and whitespace are skipped; any other character is an
    /// error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = 0;
        for c in s.chars() {
            if matches!(c, '{' | '}' | ',') || c.is_whitespace() {
                continue;
            }
            let position = Self::WUBRG
                .iter()
                .position(|&w| w == c.to_ascii_uppercase())
                .ok_or_else(|| format!("Invalid color `{c}` in `{s}`. Must be one of {:?}.", Self::WUBRG))?;
            bits |= 1 << position;
        }
        Ok(Self(bits))
    }
}

/// A Commander deck.
///
/// A deck is immutable once loaded. The `cards` are the "99", i.e. they do not
/// include the commander, partner or companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    /// The unique id of the deck.
    deck_id: DeckId,
    /// The URL the deck was collected from.
    url: String,
    /// The commander of the deck.
    commander: String,
    /// The partner commander, if any.
    partner: Option<String>,
    /// The companion, if any.
    companion: Option<String>,
    /// The color identity of the deck.
    color_identity: ColorIdentity,
    /// The theme of the deck. Empty when the deck has none.
    theme: String,
    /// The tribe of the deck. Empty when the deck has none.
    tribe: String,
    /// The names of the cards in the deck.
    cards: Vec<String>,
    /// The date the deck was saved, as an ISO date string.
    date: String,
    /// The price of the deck, if known.
    price: Option<f64>,
}

impl Deck {
    /// Creates a new `Deck` with the given id, commander and cards.
    ///
    /// Every other field starts empty and can be set with the `with_*`
    /// builders.
    pub fn new<S: Into<String>>(deck_id: DeckId, commander: S, cards: Vec<String>) -> Self {
        Self {
            deck_id,
            url: String::new(),
            commander: commander.into(),
            partner: None,
            companion: None,
            color_identity: ColorIdentity::COLORLESS,
            theme: String::new(),
            tribe: String::new(),
            cards,
            date: String::new(),
            price: None,
        }
    }

    /// Sets the URL of the deck.
    #[must_use]
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the partner commander of the deck. An empty name means no partner.
    #[must_use]
    pub fn with_partner<S: Into<String>>(mut self, partner: S) -> Self {
        self.partner = Some(partner.into()).filter(|p| !p.is_empty());
        self
    }

    /// Sets the companion of the deck. An empty name means no companion.
    #[must_use]
    pub fn with_companion<S: Into<String>>(mut self, companion: S) -> Self {
        self.companion = Some(companion.into()).filter(|c| !c.is_empty());
        self
    }

    /// Sets the color identity of the deck.
    #[must_use]
    pub fn with_color_identity(mut self, color_identity: ColorIdentity) -> Self {
        self.color_identity = color_identity;
        self
    }

    /// Sets the theme of the deck.
    #[must_use]
    pub fn with_theme<S: Into<String>>(mut self, theme: S) -> Self {
        self.theme = theme.into();
        self
    }

    /// Sets the tribe of the deck.
    #[must_use]
    pub fn with_tribe<S: Into<String>>(mut self, tribe: S) -> Self {
        self.tribe = tribe.into();
        self
    }

    /// Sets the save date of the deck.
    #[must_use]
    pub fn with_date<S: Into<String>>(mut self, date: S) -> Self {
        self.date = date.into();
        self
    }

    /// Sets the price of the deck. Non-finite or negative prices are
    /// recorded as unknown.
    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price).filter(|p| p.is_finite() && *p >= 0.0);
        self
    }

    /// Checks that the deck has a commander and at least one card.
    ///
    /// # Errors
    ///
    /// * If the commander is empty.
    /// * If the deck has no cards.
    pub fn validate(&self) -> Result<(), String> {
        if self.commander.is_empty() {
            Err(format!("Deck {} has no commander.", self.deck_id))
        } else if self.cards.is_empty() {
            Err(format!("Deck {} ({}) has no cards.", self.deck_id, self.commander))
        } else {
            Ok(())
        }
    }

    /// The unique id of the deck.
    #[must_use]
    pub const fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    /// The URL the deck was collected from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The commander of the deck.
    #[must_use]
    pub fn commander(&self) -> &str {
        &self.commander
    }

    /// The partner commander of the deck.
    #[must_use]
    pub fn partner(&self) -> Option<&str> {
        self.partner.as_deref()
    }

    /// The companion of the deck.
    #[must_use]
    pub fn companion(&self) -> Option<&str> {
        self.companion.as_deref()
    }

    /// The color identity of the deck.
    #[must_use]
    pub const fn color_identity(&self) -> ColorIdentity {
        self.color_identity
    }

    /// The theme of the deck.
    #[must_use]
    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// The tribe of the deck.
    #[must_use]
    pub fn tribe(&self) -> &str {
        &self.tribe
    }

    /// The names of the cards in the deck.
    #[must_use]
    pub fn cards(&self) -> &[String] {
        &self.cards
    }

    /// The save date of the deck.
    #[must_use]
    pub fn date(&self) -> &str {
        &self.date
    }

    /// The price of the deck, if known.
    #[must_use]
    pub const fn price(&self) -> Option<f64> {
        self.price
    }

    /// The commander and partner, joined as `"commander + partner"` when the
    /// deck has a partner.
    #[must_use]
    pub fn commander_pair(&self) -> String {
        self.partner.as_ref().map_or_else(
            || self.commander.clone(),
            |partner| format!("{} + {partner}", self.commander),
        )
    }

    /// The commander, partner and companion of the deck, skipping the absent
    /// ones.
    #[must_use]
    pub fn all_commanders(&self) -> Vec<&str> {
        std::iter::once(self.commander.as_str())
            .chain(self.partner.as_deref())
            .chain(self.companion.as_deref())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

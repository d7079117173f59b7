//! Parameters of the pipeline stages.
//!
//! Every struct deserializes with `#[serde(default)]`, so a configuration
//! only needs to name the values it changes. Where `MapParams` has its own
//! defaults for a stage, a partial stage config is laid over those defaults.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    analysis::{card_counts::ColorRule, traits::TraitCategory},
    Clusterer, DistanceMetric, Reducer,
};

/// Parameters of the embedding stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionParams {
    /// The algorithm to use.
    pub reducer: Reducer,
    /// The number of dimensions of the embedding.
    pub target_dims: usize,
    /// The size of each neighborhood, counting the deck itself.
    pub n_neighbors: usize,
    /// The minimum distance between embedded points.
    pub min_dist: f64,
    /// The scale of the embedded points.
    pub spread: f64,
    /// The metric between decks.
    pub metric: DistanceMetric,
    /// The number of optimization epochs. Chosen from the number of decks
    /// when `None`.
    pub n_epochs: Option<usize>,
    /// The seed for every random draw of the stage.
    pub seed: u64,
}

impl Default for ReductionParams {
    fn default() -> Self {
        Self {
            reducer: Reducer::Umap,
            target_dims: 2,
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            metric: DistanceMetric::Jaccard,
            n_epochs: None,
            seed: 0,
        }
    }
}

impl ReductionParams {
    /// Sets the number of dimensions of the embedding.
    #[must_use]
    pub const fn with_target_dims(mut self, target_dims: usize) -> Self {
        self.target_dims = target_dims;
        self
    }

    /// Sets the size of each neighborhood.
    #[must_use]
    pub const fn with_n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = n_neighbors;
        self
    }

    /// Sets the minimum distance between embedded points.
    #[must_use]
    pub fn with_min_dist(mut self, min_dist: f64) -> Self {
        self.min_dist = min_dist;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Parameters of the clustering stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// The algorithm to use.
    pub clusterer: Clusterer,
    /// The smallest group of decks that forms a cluster.
    pub min_cluster_size: usize,
    /// The number of neighbors, not counting the deck itself, that set its
    /// core distance. Defaults to
    /// `min_cluster_size` when `None`.
    pub min_samples: Option<usize>,
    /// The seed for the vertex the spanning tree is grown from, which decides
    /// the order of tied edges.
    pub seed: u64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            clusterer: Clusterer::Hdbscan,
            min_cluster_size: 15,
            min_samples: None,
            seed: 0,
        }
    }
}

impl ClusterParams {
    /// Sets the minimum cluster size.
    #[must_use]
    pub const fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.min_cluster_size = min_cluster_size;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Parameters of the trait extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitParams {
    /// The most values kept per cluster and category.
    pub top_n: usize,
    /// The smallest percentage kept.
    pub min_percent: u32,
    /// The categories to analyze.
    pub categories: Vec<TraitCategory>,
    /// The categories to skip even if listed in `categories`.
    pub excluded: Vec<TraitCategory>,
}

impl Default for TraitParams {
    fn default() -> Self {
        Self {
            top_n: 20,
            min_percent: 1,
            categories: TraitCategory::ALL.to_vec(),
            excluded: Vec::new(),
        }
    }
}

/// Parameters of the card-count computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardCountParams {
    /// Whether color identity restricts which cards a deck could play.
    pub color_rule: ColorRule,
    /// Whether the deck matrix counts the commanders, partners and
    /// companions as cards of their decks.
    pub commanders_in_matrix: bool,
    /// The number of decks per chunk of the could-play computation.
    pub chunk_size: usize,
}

impl Default for CardCountParams {
    fn default() -> Self {
        Self {
            color_rule: ColorRule::Ignore,
            commanders_in_matrix: false,
            chunk_size: 1000,
        }
    }
}

/// Parameters of the defining-card extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefiningCardParams {
    /// Whether to compute synergy when there is more than one cluster.
    pub include_synergy: bool,
    /// The number of cards with the highest play rate kept per cluster.
    pub n_scope: usize,
}

impl Default for DefiningCardParams {
    fn default() -> Self {
        Self {
            include_synergy: true,
            n_scope: 200,
        }
    }
}

/// Parameters of a full run of the pipeline on a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapParams {
    /// The reduction producing the clustering embedding.
    #[serde(deserialize_with = "map_embedding")]
    pub embedding: ReductionParams,
    /// The clustering of that embedding.
    pub clustering: ClusterParams,
    /// The number of clustered neighbors that vote on an unclustered deck.
    pub reassign_neighbors: usize,
    /// The trait extraction.
    pub traits: TraitParams,
    /// The card counts.
    pub card_counts: CardCountParams,
    /// The defining cards.
    #[serde(deserialize_with = "map_defining_cards")]
    pub defining_cards: DefiningCardParams,
}

impl Default for MapParams {
    fn default() -> Self {
        Self {
            embedding: ReductionParams::default()
                .with_target_dims(6)
                .with_n_neighbors(25)
                .with_min_dist(0.0),
            clustering: ClusterParams::default(),
            reassign_neighbors: 50,
            traits: TraitParams::default(),
            card_counts: CardCountParams::default(),
            defining_cards: DefiningCardParams {
                include_synergy: true,
                n_scope: 1000,
            },
        }
    }
}

fn map_embedding<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ReductionParams, D::Error> {
    overlay(deserializer, MapParams::default().embedding)
}

fn map_defining_cards<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DefiningCardParams, D::Error> {
    overlay(deserializer, MapParams::default().defining_cards)
}

/// Deserializes a possibly partial `T` and fills its missing fields from
/// `base`, at every level of nesting.
fn overlay<'de, D, T>(deserializer: D, base: T) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Serialize + DeserializeOwned,
{
    use serde::de::Error;

    let patch = Value::deserialize(deserializer)?;
    let mut merged = serde_json::to_value(base).map_err(D::Error::custom)?;
    merge(&mut merged, patch);
    serde_json::from_value(merged).map_err(D::Error::custom)
}

/// Writes `patch` over `base`, recursing into objects present in both.
fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Parameters of the iterative clustering of a submap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmapParams {
    /// The number of dimensions of the clustering embedding.
    pub target_dims: usize,
    /// The number of clustered neighbors that vote on an unclustered deck.
    pub reassign_neighbors: usize,
    /// The entropy, in nats, of the cluster sizes at or above which the
    /// clustering is accepted.
    pub min_entropy: f64,
    /// The share of decks in the largest cluster at or below which the
    /// clustering is accepted.
    pub max_cluster_share: f64,
    /// Submaps with at most this many decks are clustered only once.
    pub single_pass_size: usize,
    /// The seed for the embeddings and the clusterings.
    pub seed: u64,
    /// The card counts.
    pub card_counts: CardCountParams,
    /// The defining cards. Synergy is only computed when the submap has
    /// more than one cluster.
    pub defining_cards: DefiningCardParams,
}

impl Default for SubmapParams {
    fn default() -> Self {
        Self {
            target_dims: 4,
            reassign_neighbors: 15,
            min_entropy: 1.0,
            max_cluster_share: 0.8,
            single_pass_size: 200,
            seed: 0,
            card_counts: CardCountParams::default(),
            defining_cards: DefiningCardParams::default(),
        }
    }
}

/// The size-dependent `(n_neighbors, min_cluster_size)` for embedding and
/// clustering a map of `n_decks` decks.
#[must_use]
pub const fn cluster_parameters(n_decks: usize) -> (usize, usize) {
    match n_decks {
        0..=299 => (4, 4),
        300..=499 => (6, 6),
        500..=999 => (8, 6),
        1000..=1999 => (10, 6),
        2000..=4999 => (12, 6),
        5000..=19_999 => (15, 8),
        _ => (25, 12),
    }
}

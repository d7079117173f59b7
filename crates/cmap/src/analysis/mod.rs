//! Describing the clusters of a map: their traits, the cards they play, the
//! cards that define them and their most representative decks.

pub mod average_decks;
pub mod card_counts;
pub mod defining_cards;
pub mod trait_mapping;
pub mod traits;

pub use average_decks::calculate_average_decklists;
pub use card_counts::{get_cluster_card_counts, ClusterCardCounts, ColorRule};
pub use defining_cards::{get_defining_cards, DefiningCard};
pub use trait_mapping::{build_trait_mapping, TraitMapping, TraitMappingRow};
pub use traits::{get_cluster_traits, TraitCategory, TraitRow};

#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod analysis;
pub mod cluster;
mod core;
pub mod embed;
pub mod export;
pub mod params;
pub mod utils;

pub use aggregate::{CommanderMap, DeckCoordinates, SubmapFilter};
pub use crate::core::{
    deck::{ColorIdentity, Deck, DeckId},
    matrix::{CardIndex, DeckMatrix},
    metric::DistanceMetric,
    reference::{ReferenceMatrices, ReferenceMatrix},
    sized_heap::SizedHeap,
};
pub use cluster::{Clusterer, Label, UNCLUSTERED};
pub use embed::{EmbeddingTarget, Reducer, ReductionInput};
pub use export::MapExport;

/// The current version of the crate.
pub const VERSION: &str = "0.1.0";

//! The core data structures of the Commander Map.

pub mod deck;
pub mod matrix;
pub mod metric;
pub mod reference;
pub mod sized_heap;

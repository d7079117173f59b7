//! Distance functions over decks and embeddings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The distance metrics supported by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Jaccard distance between the sets of non-zero columns.
    #[default]
    Jaccard,
    /// Euclidean distance.
    Euclidean,
    /// Cosine distance.
    Cosine,
}

impl DistanceMetric {
    /// The distance at or beyond which two points are considered
    /// disconnected in a neighborhood graph.
    #[must_use]
    pub const fn disconnection_distance(self) -> f64 {
        match self {
            Self::Jaccard => 1.0,
            Self::Cosine => 2.0,
            Self::Euclidean => f64::INFINITY,
        }
    }

    /// Whether the metric compares sets of non-zero columns rather than
    /// vectors of values.
    #[must_use]
    pub const fn is_set_metric(self) -> bool {
        matches!(self, Self::Jaccard)
    }

    /// Computes the Jaccard distance between two sets of column indices.
    #[must_use]
    pub fn sets(x: &[usize], y: &[usize]) -> f64 {
        distances::sets::jaccard(x, y)
    }

    /// Computes the distance between two dense vectors.
    ///
    /// For the Jaccard metric the vectors are read as the sets of their
    /// non-zero positions.
    #[must_use]
    pub fn vectors(self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            Self::Jaccard => {
                let x = non_zero_positions(x);
                let y = non_zero_positions(y);
                distances::sets::jaccard(&x, &y)
            }
            Self::Euclidean => distances::vectors::euclidean(x, y),
            Self::Cosine => distances::vectors::cosine(x, y),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Jaccard => "jaccard",
            Self::Euclidean => "euclidean",
            Self::Cosine => "cosine",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jaccard" => Ok(Self::Jaccard),
            "euclidean" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            _ => Err(format!(
                "Unknown distance metric `{s}`. Must be one of `jaccard`, `euclidean` or `cosine`."
            )),
        }
    }
}

/// The positions of the non-zero values in a vector.
fn non_zero_positions(x: &[f64]) -> Vec<usize> {
    x.iter()
        .enumerate()
        .filter(|(_, &v)| v != 0.0)
        .map(|(i, _)| i)
        .collect()
}

/// The Jaccard similarity of two lists of names, treated as sets.
///
/// Two empty lists have a similarity of zero.
#[must_use]
pub fn jaccard_similarity<S: AsRef<str>>(x: &[S], y: &[S]) -> f64 {
    let mut ids = HashMap::new();
    let mut intern = |names: &[S]| {
        names
            .iter()
            .map(|n| {
                let next = ids.len();
                *ids.entry(n.as_ref().to_string()).or_insert(next)
            })
            .collect::<Vec<usize>>()
    };
    let x = intern(x);
    let y = intern(y);
    1.0 - distances::sets::jaccard::<usize, f64>(&x, &y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity() {
        let x = ["Sol Ring", "Arcane Signet", "Command Tower"];
        let y = ["Sol Ring", "Command Tower", "Cultivate", "Sol Ring"];
        assert!((jaccard_similarity(&x, &y) - 0.5).abs() < f64::EPSILON);
        assert!((jaccard_similarity(&x, &x) - 1.0).abs() < f64::EPSILON);

        let empty: [&str; 0] = [];
        assert!(jaccard_similarity(&empty, &empty).abs() < f64::EPSILON);
    }

    #[test]
    fn disconnection() {
        let metric = DistanceMetric::Jaccard;
        let d = DistanceMetric::sets(&[1, 2], &[3, 4]);
        assert!(d >= metric.disconnection_distance());

        let d = metric.vectors(&[1.0, 0.0, 2.0], &[3.0, 0.0, 0.0]);
        assert!((d - 0.5).abs() < f64::EPSILON);
    }
}

//! The `CommanderMap` aggregate, which owns the decks of a map along with the
//! results of every stage of the pipeline.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use distances::Number;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{self, ClusterCardCounts, DefiningCard, TraitCategory, TraitMapping, TraitRow},
    cluster::{self, reassign::reassign},
    embed::{self, repair::repair},
    export::{self, ExportInput},
    params::{
        cluster_parameters, CardCountParams, ClusterParams, DefiningCardParams, MapParams, ReductionParams,
        SubmapParams, TraitParams,
    },
    utils::{entropy, round_half_even},
    CardIndex, Deck, DeckId, DeckMatrix, DistanceMetric, EmbeddingTarget, Label, MapExport, ReductionInput,
    ReferenceMatrices,
};

/// The 2-D coordinates of a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckCoordinates {
    /// The deck.
    pub deck_id: DeckId,
    /// The first coordinate, rounded to 6 decimals.
    pub x: f64,
    /// The second coordinate, rounded to 6 decimals.
    pub y: f64,
}

/// Selects the decks of a submap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmapFilter {
    /// Decks whose trait in `category` equals `value`.
    Trait {
        /// The trait to compare.
        category: TraitCategory,
        /// The value decks must have.
        value: String,
    },
    /// Decks led by the given card, either as commander or as partner.
    Partner(String),
}

impl SubmapFilter {
    /// Whether the deck belongs to the submap.
    #[must_use]
    pub fn matches(&self, deck: &Deck) -> bool {
        match self {
            Self::Trait { category, value } => category.value_of(deck) == *value,
            Self::Partner(name) => deck.commander() == name || deck.partner() == Some(name.as_str()),
        }
    }

    /// The trait categories that carry no information within the submap.
    ///
    /// Decks sharing a commander pair also share a color identity.
    #[must_use]
    pub fn excluded_categories(&self) -> Vec<TraitCategory> {
        match self {
            Self::Trait {
                category: TraitCategory::CommanderPartner,
                ..
            } => vec![TraitCategory::CommanderPartner, TraitCategory::ColorIdentity],
            Self::Trait { category, .. } => vec![*category],
            Self::Partner(_) => Vec::new(),
        }
    }
}

impl std::fmt::Display for SubmapFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trait { category, value } => write!(f, "{category} = `{value}`"),
            Self::Partner(name) => write!(f, "partnerID = `{name}`"),
        }
    }
}

/// A map of Commander decks.
///
/// The stages of the pipeline are run in order through the methods of the
/// map, each storing its result:
///
/// 1. `reduce_dimensionality` with `EmbeddingTarget::Coordinates` and with
///    `EmbeddingTarget::Clustering`,
/// 2. `cluster_decks`,
/// 3. `assign_unclustered`,
/// 4. `get_cluster_traits`, `get_cluster_card_counts`, `get_defining_cards`
///    and `calculate_average_decklists`,
/// 5. `jsonify_map`.
///
/// Running a stage before the stages it depends on is an error.
#[derive(Debug, Clone)]
pub struct CommanderMap {
    /// The decks, one per row of the matrix.
    decks: Vec<Deck>,
    /// The deck-card matrix.
    matrix: DeckMatrix,
    /// The names of the columns of the matrix.
    cards: CardIndex,
    /// The date and color-identity references, shared with submaps.
    references: Option<Arc<ReferenceMatrices>>,
    /// The 2-D display coordinates.
    coordinates: Option<Array2<f64>>,
    /// The embedding clustering runs on.
    cluster_embedding: Option<Array2<f64>>,
    /// The cluster of each deck.
    labels: Option<Vec<Label>>,
    /// The traits of each cluster.
    traits: Option<Vec<TraitRow>>,
    /// The card counts of each cluster.
    card_counts: Option<ClusterCardCounts>,
    /// The defining cards of each cluster.
    defining_cards: Option<Vec<DefiningCard>>,
    /// The average deck of each cluster.
    average_decklists: Option<BTreeMap<Label, DeckId>>,
    /// The integer ids of trait values.
    trait_mapping: Option<TraitMapping>,
}

impl CommanderMap {
    /// Creates a new `CommanderMap`.
    ///
    /// # Arguments
    ///
    /// * `matrix`: The deck-card matrix, one row per deck.
    /// * `cards`: The names of the columns of the matrix.
    /// * `decks`: The decks.
    ///
    /// # Errors
    ///
    /// * If the matrix does not have one row per deck.
    /// * If the card index does not have one name per column.
    /// * If two decks share an id.
    /// * If any deck is invalid.
    pub fn new(matrix: DeckMatrix, cards: CardIndex, decks: Vec<Deck>) -> Result<Self, String> {
        if matrix.n_decks() != decks.len() {
            return Err(format!(
                "The matrix has {} rows but there are {} decks.",
                matrix.n_decks(),
                decks.len()
            ));
        }
        if matrix.n_cards() != cards.len() {
            return Err(format!(
                "The matrix has {} columns but the card index has {} cards.",
                matrix.n_cards(),
                cards.len()
            ));
        }

        let mut ids = decks.iter().map(Deck::deck_id).collect::<Vec<_>>();
        ids.sort_unstable();
        if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(format!("Deck id {} appears more than once.", w[0]));
        }
        for deck in &decks {
            deck.validate()?;
        }

        ftlog::info!("Created a map of {} decks over {} cards.", decks.len(), cards.len());

        Ok(Self {
            decks,
            matrix,
            cards,
            references: None,
            coordinates: None,
            cluster_embedding: None,
            labels: None,
            traits: None,
            card_counts: None,
            defining_cards: None,
            average_decklists: None,
            trait_mapping: None,
        })
    }

    /// Attaches the reference matrices used to count the cards decks could
    /// have played.
    #[must_use]
    pub fn with_references(mut self, references: Arc<ReferenceMatrices>) -> Self {
        self.references = Some(references);
        self
    }

    /// The number of decks in the map.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.decks.len()
    }

    /// The decks.
    #[must_use]
    pub fn decks(&self) -> &[Deck] {
        &self.decks
    }

    /// The deck-card matrix.
    #[must_use]
    pub const fn matrix(&self) -> &DeckMatrix {
        &self.matrix
    }

    /// The names of the columns of the matrix.
    #[must_use]
    pub const fn cards(&self) -> &CardIndex {
        &self.cards
    }

    /// The reference matrices, if attached.
    #[must_use]
    pub fn references(&self) -> Option<&Arc<ReferenceMatrices>> {
        self.references.as_ref()
    }

    /// The 2-D display coordinates, if computed.
    #[must_use]
    pub const fn coordinates(&self) -> Option<&Array2<f64>> {
        self.coordinates.as_ref()
    }

    /// The clustering embedding, if computed.
    #[must_use]
    pub const fn cluster_embedding(&self) -> Option<&Array2<f64>> {
        self.cluster_embedding.as_ref()
    }

    /// The cluster labels, if computed.
    #[must_use]
    pub fn labels(&self) -> Option<&[Label]> {
        self.labels.as_deref()
    }

    /// The cluster traits, if computed.
    #[must_use]
    pub fn traits(&self) -> Option<&[TraitRow]> {
        self.traits.as_deref()
    }

    /// The card counts, if computed.
    #[must_use]
    pub const fn card_counts(&self) -> Option<&ClusterCardCounts> {
        self.card_counts.as_ref()
    }

    /// The defining cards, if computed.
    #[must_use]
    pub fn defining_cards(&self) -> Option<&[DefiningCard]> {
        self.defining_cards.as_deref()
    }

    /// The average decks, if computed.
    #[must_use]
    pub const fn average_decklists(&self) -> Option<&BTreeMap<Label, DeckId>> {
        self.average_decklists.as_ref()
    }

    /// The number of distinct clusters, if the decks are clustered.
    #[must_use]
    pub fn n_clusters(&self) -> Option<usize> {
        self.labels
            .as_ref()
            .map(|l| l.iter().collect::<BTreeSet<_>>().len())
    }

    /// Embeds the decks and stores the embedding as the given target.
    ///
    /// The reduction starts from the deck matrix, or from the clustering
    /// embedding when `on_embedding` is set, in which case set metrics are
    /// replaced by the Euclidean distance. Decks the reducer leaves
    /// disconnected are then placed near their most similar deck.
    ///
    /// Storing a new clustering embedding clears every later stage.
    ///
    /// # Errors
    ///
    /// * If `params.target_dims` does not suit the target.
    /// * If `on_embedding` is set but there is no clustering embedding yet.
    /// * If the reducer rejects the parameters.
    pub fn reduce_dimensionality(
        &mut self,
        target: EmbeddingTarget,
        on_embedding: bool,
        params: &ReductionParams,
    ) -> Result<(), String> {
        target.check_dims(params.target_dims)?;

        let embedding = if on_embedding {
            let source = self.cluster_embedding.as_ref().ok_or_else(|| {
                "Embed the decks with `EmbeddingTarget::Clustering` before reducing that embedding.".to_string()
            })?;
            let mut params = params.clone();
            if params.metric.is_set_metric() {
                ftlog::info!("Using the Euclidean distance instead of {} on an embedding.", params.metric);
                params.metric = DistanceMetric::Euclidean;
            }
            embed::reduce(ReductionInput::Dense(source.view()), &params)?
        } else {
            embed::reduce(ReductionInput::Sparse(&self.matrix), params)?
        };
        let embedding = repair(embedding, Some(&self.decks), params.seed)?;

        match target {
            EmbeddingTarget::Coordinates => self.coordinates = Some(embedding),
            EmbeddingTarget::Clustering => {
                self.cluster_embedding = Some(embedding);
                self.clear_from_labels();
            }
        }

        Ok(())
    }

    /// Clusters the decks on the clustering embedding.
    ///
    /// # Errors
    ///
    /// * If there is no clustering embedding yet.
    /// * If the clusterer rejects the parameters.
    pub fn cluster_decks(&mut self, params: &ClusterParams) -> Result<(), String> {
        let embedding = self.cluster_embedding.as_ref().ok_or_else(|| {
            "Embed the decks with `EmbeddingTarget::Clustering` before clustering them.".to_string()
        })?;
        let labels = cluster::cluster(embedding.view(), params)?;
        self.clear_from_labels();
        self.labels = Some(labels);
        Ok(())
    }

    /// Assigns every unclustered deck to the majority cluster among its
    /// `n_neighbors` nearest clustered decks in the clustering embedding.
    ///
    /// # Errors
    ///
    /// * If the decks are not clustered yet.
    pub fn assign_unclustered(&mut self, n_neighbors: usize) -> Result<(), String> {
        let (Some(embedding), Some(labels)) = (&self.cluster_embedding, &self.labels) else {
            return Err("Cluster the decks before assigning unclustered decks.".to_string());
        };
        let labels = reassign(labels, embedding.view(), n_neighbors);
        self.clear_from_labels();
        self.labels = Some(labels);
        Ok(())
    }

    /// Computes and stores the traits of each cluster.
    ///
    /// # Errors
    ///
    /// * If the decks are not clustered yet.
    pub fn get_cluster_traits(&mut self, params: &TraitParams) -> Result<&[TraitRow], String> {
        let labels = self.require_labels("computing traits")?;
        let traits = analysis::get_cluster_traits(&self.decks, labels, params)?;
        Ok(self.traits.insert(traits).as_slice())
    }

    /// Computes and stores the card counts of each cluster.
    ///
    /// # Errors
    ///
    /// * If the decks are not clustered yet.
    /// * If no reference matrices are attached.
    /// * If a deck or card is missing from a reference matrix.
    pub fn get_cluster_card_counts(&mut self, params: &CardCountParams) -> Result<&ClusterCardCounts, String> {
        let labels = self.require_labels("counting cards")?;
        let references = self
            .references
            .as_ref()
            .ok_or_else(|| "Attach reference matrices with `with_references` before counting cards.".to_string())?;
        let counts =
            analysis::get_cluster_card_counts(&self.decks, labels, &self.matrix, &self.cards, references, params)?;
        Ok(&*self.card_counts.insert(counts))
    }

    /// Computes and stores the defining cards of each cluster.
    ///
    /// # Errors
    ///
    /// * If the card counts are not computed yet.
    pub fn get_defining_cards(&mut self, params: &DefiningCardParams) -> Result<&[DefiningCard], String> {
        let counts = self
            .card_counts
            .as_ref()
            .ok_or_else(|| "Count the cards of each cluster before finding defining cards.".to_string())?;
        let defining = analysis::get_defining_cards(counts, &self.cards, params);
        Ok(self.defining_cards.insert(defining).as_slice())
    }

    /// Picks and stores the average deck of each cluster not in
    /// `ignore_clusters`.
    ///
    /// # Errors
    ///
    /// * If the defining cards are not computed yet.
    pub fn calculate_average_decklists(
        &mut self,
        ignore_clusters: &[Label],
    ) -> Result<&BTreeMap<Label, DeckId>, String> {
        let labels = self.require_labels("picking average decks")?;
        let defining = self
            .defining_cards
            .as_ref()
            .ok_or_else(|| "Find the defining cards before picking average decks.".to_string())?;
        let average = analysis::calculate_average_decklists(
            &self.decks,
            labels,
            &self.matrix,
            &self.cards,
            defining,
            ignore_clusters,
        )?;
        Ok(&*self.average_decklists.insert(average))
    }

    /// Builds and stores the trait mapping of the decks.
    pub fn trait_mapping(&mut self) -> &TraitMapping {
        self.trait_mapping
            .get_or_insert_with(|| analysis::build_trait_mapping(&self.decks))
    }

    /// Exports the given clusters, or every cluster if `None`.
    ///
    /// Trait values are replaced by their ids if `mapping` is given. Missing
    /// defining cards or average decks are exported as empty.
    ///
    /// # Errors
    ///
    /// * If the traits are not computed yet.
    pub fn jsonify_map(&self, clusters: Option<&[Label]>, mapping: Option<&TraitMapping>) -> Result<MapExport, String> {
        let labels = self.require_labels("exporting")?;
        let traits = self
            .traits
            .as_deref()
            .ok_or_else(|| "Compute the cluster traits before exporting.".to_string())?;
        let empty = BTreeMap::new();
        let input = ExportInput {
            decks: &self.decks,
            labels,
            defining_cards: self.defining_cards.as_deref().unwrap_or_default(),
            traits,
            average_decklists: self.average_decklists.as_ref().unwrap_or(&empty),
        };
        export::jsonify_map(input, clusters, mapping)
    }

    /// The display coordinates of each deck, rounded to 6 decimals.
    ///
    /// # Errors
    ///
    /// * If the coordinates are not computed yet.
    pub fn coordinates_table(&self) -> Result<Vec<DeckCoordinates>, String> {
        let coordinates = self.coordinates.as_ref().ok_or_else(|| {
            "Embed the decks with `EmbeddingTarget::Coordinates` before listing coordinates.".to_string()
        })?;
        Ok(self
            .decks
            .iter()
            .zip(coordinates.rows())
            .map(|(deck, row)| DeckCoordinates {
                deck_id: deck.deck_id(),
                x: round_half_even(row[0], 6),
                y: round_half_even(row[1], 6),
            })
            .collect())
    }

    /// The cluster of each deck.
    ///
    /// # Errors
    ///
    /// * If the decks are not clustered yet.
    pub fn cluster_column(&self) -> Result<Vec<(DeckId, Label)>, String> {
        let labels = self.require_labels("listing clusters")?;
        Ok(self.decks.iter().map(Deck::deck_id).zip(labels.iter().copied()).collect())
    }

    /// Builds a map of the decks that satisfy the predicate.
    ///
    /// The submap drops the cards none of its decks play and shares the
    /// reference matrices of this map. No stage results are carried over.
    ///
    /// # Errors
    ///
    /// * If no deck satisfies the predicate.
    pub fn submap<P: Fn(&Deck) -> bool>(&self, predicate: P) -> Result<Self, String> {
        let rows = (0..self.decks.len())
            .filter(|&i| predicate(&self.decks[i]))
            .collect::<Vec<_>>();
        if rows.is_empty() {
            return Err("No decks are left in the submap.".to_string());
        }

        let (matrix, cards) = self.matrix.select_rows(&rows).drop_empty_columns(&self.cards)?;
        let decks = rows.iter().map(|&i| self.decks[i].clone()).collect();

        let mut submap = Self::new(matrix, cards, decks)?;
        submap.references.clone_from(&self.references);
        Ok(submap)
    }

    /// Builds the submap selected by the filter.
    ///
    /// # Errors
    ///
    /// * If no deck matches the filter.
    pub fn submap_by(&self, filter: &SubmapFilter) -> Result<Self, String> {
        ftlog::info!("Building the submap of {filter}.");
        self.submap(|deck| filter.matches(deck))
    }

    /// Runs the whole pipeline, from the clustering embedding to the average
    /// decks.
    ///
    /// # Errors
    ///
    /// * If any stage fails.
    pub fn generate_clusters(&mut self, params: &MapParams) -> Result<(), String> {
        self.reduce_dimensionality(EmbeddingTarget::Clustering, false, &params.embedding)?;
        self.cluster_decks(&params.clustering)?;
        self.assign_unclustered(params.reassign_neighbors)?;
        self.get_cluster_traits(&params.traits)?;
        self.get_cluster_card_counts(&params.card_counts)?;
        self.get_defining_cards(&params.defining_cards)?;
        self.calculate_average_decklists(&[])?;
        Ok(())
    }

    /// Computes the display coordinates of a submap and clusters it.
    ///
    /// The neighborhood and minimum cluster sizes start from
    /// `cluster_parameters`. Embedding and clustering are repeated, lowering
    /// the minimum cluster size by one each time, while the entropy of the
    /// cluster sizes is below `params.min_entropy`, the largest cluster holds
    /// more than `params.max_cluster_share` of the decks and the minimum
    /// cluster size is above 1. Submaps of at most `params.single_pass_size`
    /// decks are clustered only once.
    ///
    /// Returns the number of passes.
    ///
    /// # Errors
    ///
    /// * If any stage fails.
    pub fn refine_submap_clusters(&mut self, params: &SubmapParams) -> Result<usize, String> {
        let coordinates = ReductionParams::default().with_seed(params.seed);
        self.reduce_dimensionality(EmbeddingTarget::Coordinates, false, &coordinates)?;

        let n = self.cardinality();
        let (n_neighbors, mut min_cluster_size) = cluster_parameters(n);
        let embedding = ReductionParams::default()
            .with_target_dims(params.target_dims)
            .with_n_neighbors(n_neighbors)
            .with_min_dist(0.0)
            .with_seed(params.seed);

        let (mut size_entropy, mut largest_share) = (0.0, 1.0);
        let mut passes = 0;
        while size_entropy < params.min_entropy && largest_share > params.max_cluster_share && min_cluster_size > 1 {
            self.reduce_dimensionality(EmbeddingTarget::Clustering, false, &embedding)?;
            let clustering = ClusterParams::default()
                .with_min_cluster_size(min_cluster_size)
                .with_seed(params.seed);
            self.cluster_decks(&clustering)?;
            self.assign_unclustered(params.reassign_neighbors)?;
            passes += 1;

            let sizes = self.cluster_sizes();
            size_entropy = entropy(&sizes);
            largest_share = sizes.iter().copied().max().unwrap_or_default().as_f64() / n.as_f64();

            ftlog::info!(
                "Pass {passes} with minimum cluster size {min_cluster_size}: {} clusters, \
                 entropy {size_entropy:.3}, largest share {largest_share:.3}.",
                sizes.len()
            );

            if n <= params.single_pass_size {
                break;
            }
            min_cluster_size -= 1;
        }

        Ok(passes)
    }

    /// Builds, clusters and analyzes the submap selected by the filter.
    ///
    /// Trait categories the filter makes uniform are not analyzed, colors do
    /// not restrict which cards a deck could play, and synergy is only
    /// computed when the submap has more than one cluster.
    ///
    /// # Errors
    ///
    /// * If no deck matches the filter.
    /// * If any stage fails.
    pub fn generate_submap(&self, filter: &SubmapFilter, params: &SubmapParams) -> Result<Self, String> {
        let mut submap = self.submap_by(filter)?;
        submap.refine_submap_clusters(params)?;

        let traits = TraitParams {
            excluded: filter.excluded_categories(),
            ..TraitParams::default()
        };
        submap.get_cluster_traits(&traits)?;

        let card_counts = CardCountParams {
            color_rule: analysis::ColorRule::Ignore,
            ..params.card_counts.clone()
        };
        submap.get_cluster_card_counts(&card_counts)?;

        let defining = DefiningCardParams {
            include_synergy: params.defining_cards.include_synergy && submap.n_clusters().unwrap_or_default() > 1,
            ..params.defining_cards.clone()
        };
        submap.get_defining_cards(&defining)?;
        submap.calculate_average_decklists(&[])?;

        Ok(submap)
    }

    /// The number of decks in each cluster, in ascending order of label.
    fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = BTreeMap::<Label, usize>::new();
        for &l in self.labels.iter().flatten() {
            *sizes.entry(l).or_default() += 1;
        }
        sizes.into_values().collect()
    }

    /// The labels, or an error naming the stage that needs them.
    fn require_labels(&self, stage: &str) -> Result<&[Label], String> {
        self.labels
            .as_deref()
            .ok_or_else(|| format!("Cluster the decks before {stage}."))
    }

    /// Clears the labels and every result computed from them.
    fn clear_from_labels(&mut self) {
        self.labels = None;
        self.traits = None;
        self.card_counts = None;
        self.defining_cards = None;
        self.average_decklists = None;
    }
}

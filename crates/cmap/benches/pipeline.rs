//! Benchmarks for the embedding, clustering and card-count stages.

use cmap::{
    analysis::get_cluster_card_counts,
    cluster::cluster,
    embed::reduce,
    params::{CardCountParams, ClusterParams, ReductionParams},
    CardIndex, ColorIdentity, Deck, DeckMatrix, ReductionInput, ReferenceMatrices, ReferenceMatrix,
};
use criterion::*;
use rand::prelude::*;

/// Random decks around `n_archetypes` archetypes of 60 cards each.
///
/// Every deck keeps each card of its archetype with probability 0.8 and adds
/// 20 cards drawn from a shared pool of 500.
fn random_decks(cardinality: usize, n_archetypes: usize, seed: u64) -> Vec<Deck> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..cardinality)
        .map(|i| {
            let archetype = i % n_archetypes;
            let mut cards = (0..60)
                .filter(|_| rng.gen_bool(0.8))
                .map(|c| format!("Archetype {archetype} Card {c}"))
                .collect::<Vec<_>>();
            cards.extend((0..20).map(|_| format!("Staple {}", rng.gen_range(0..500))));

            let year = 2015 + rng.gen_range(0..9);
            Deck::new(i as u64, format!("Commander {archetype}"), cards)
                .with_date(format!("{year}-01-01"))
                .with_color_identity(ColorIdentity::from_bits(rng.gen_range(0..32)))
        })
        .collect()
}

fn references(decks: &[Deck], cards: &CardIndex, seed: u64) -> ReferenceMatrices {
    let mut rng = StdRng::seed_from_u64(seed);
    let deck_dates = decks.iter().map(|d| (d.deck_id(), d.date().to_string())).collect::<Vec<_>>();
    let releases = cards
        .names()
        .iter()
        .map(|n| (n.clone(), format!("{}-06-01", 2010 + rng.gen_range(0..14))))
        .collect::<Vec<_>>();
    let deck_colors = decks.iter().map(|d| (d.deck_id(), d.color_identity())).collect::<Vec<_>>();
    let card_colors = cards
        .names()
        .iter()
        .map(|n| (n.clone(), ColorIdentity::from_bits(1 << rng.gen_range(0..5))))
        .collect::<Vec<_>>();

    ReferenceMatrices::new(
        ReferenceMatrix::date_legality(&deck_dates, &releases),
        ReferenceMatrix::color_identity(&deck_colors, &card_colors),
    )
}

fn pipeline(c: &mut Criterion) {
    let seed = 42;

    for cardinality in [250, 1000] {
        let decks = random_decks(cardinality, 8, seed);
        let (matrix, cards) = DeckMatrix::from_decks(&decks);
        let params = ReductionParams::default()
            .with_target_dims(6)
            .with_n_neighbors(25)
            .with_min_dist(0.0)
            .with_seed(seed);

        let mut group = c.benchmark_group(format!("pipeline-{cardinality}"));
        group
            .sample_size(10)
            .sampling_mode(SamplingMode::Flat)
            .throughput(Throughput::Elements(cardinality as u64));

        group.bench_function("embed", |b| {
            b.iter_with_large_drop(|| reduce(ReductionInput::Sparse(&matrix), &params));
        });

        let Ok(embedding) = reduce(ReductionInput::Sparse(&matrix), &params) else {
            continue;
        };
        let cluster_params = ClusterParams::default().with_min_cluster_size(15);
        group.bench_function("cluster", |b| {
            b.iter_with_large_drop(|| cluster(embedding.view(), &cluster_params));
        });

        let labels = (0..cardinality).map(|i| (i % 8) as i32).collect::<Vec<_>>();
        let reference_matrices = references(&decks, &cards, seed);
        for chunk_size in [100, 1000] {
            let count_params = CardCountParams {
                chunk_size,
                ..CardCountParams::default()
            };
            let id = BenchmarkId::new("card-counts", chunk_size);
            group.bench_with_input(id, &chunk_size, |b, _| {
                b.iter_with_large_drop(|| {
                    get_cluster_card_counts(&decks, &labels, &matrix, &cards, &reference_matrices, &count_params)
                });
            });
        }

        group.finish();
    }
}

criterion_group!(benches, pipeline);
criterion_main!(benches);

//! Optimizing a low-dimensional layout of a `FuzzyGraph`.

use ndarray::{Array2, ArrayView1};
use rand::prelude::*;

use super::knn_graph::FuzzyGraph;

/// The number of negative samples drawn per positive sample.
const NEGATIVE_SAMPLE_RATE: f64 = 5.0;

/// The weight of the repulsive force.
const REPULSION_STRENGTH: f64 = 1.0;

/// The largest gradient applied to any coordinate in one step.
const GRADIENT_CLIP: f64 = 4.0;

/// The learning rate at the first epoch.
const INITIAL_ALPHA: f64 = 1.0;

/// The side of the box the layout is rescaled to before optimization.
const INIT_SCALE: f64 = 10.0;

/// Fits the `(a, b)` parameters of the low-dimensional membership curve
/// `1 / (1 + a * x^(2b))` to the offset exponential decay defined by
/// `min_dist` and `spread`.
///
/// The fit is a damped Gauss-Newton least-squares fit over 300 evenly spaced
/// points in `[0, 3 * spread]`.
#[must_use]
pub fn fit_curve(min_dist: f64, spread: f64) -> (f64, f64) {
    let n = 300;
    #[allow(clippy::cast_precision_loss)]
    let xs = (0..n)
        .map(|i| 3.0 * spread * i as f64 / (n - 1) as f64)
        .collect::<Vec<_>>();
    let ys = xs
        .iter()
        .map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() })
        .collect::<Vec<_>>();

    let residuals = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| (curve(x, a, b) - y).powi(2))
            .sum()
    };

    let (mut a, mut b, mut lambda) = (1.0, 1.0, 1e-3);
    let mut error = residuals(a, b);
    for _ in 0..200 {
        // Normal equations of the linearized problem.
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            let u = x.powf(2.0 * b);
            let denom = (1.0 + a * u).powi(2);
            let da = -u / denom;
            let db = if x > 0.0 { -2.0 * a * u * x.ln() / denom } else { 0.0 };
            let r = y - curve(x, a, b);
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * r;
            gb += db * r;
        }

        let (daa, dbb) = (jaa.mul_add(lambda, jaa), jbb.mul_add(lambda, jbb));
        let det = daa.mul_add(dbb, -(jab * jab));
        if det.abs() < f64::EPSILON {
            break;
        }
        let step_a = dbb.mul_add(ga, -(jab * gb)) / det;
        let step_b = daa.mul_add(gb, -(jab * ga)) / det;

        let (next_a, next_b) = (a + step_a, b + step_b);
        let next_error = residuals(next_a, next_b);
        if next_error.is_finite() && next_error < error {
            let converged = (error - next_error) < 1e-12;
            (a, b, error) = (next_a, next_b, next_error);
            lambda /= 10.0;
            if converged {
                break;
            }
        } else {
            lambda *= 10.0;
        }
    }

    (a, b)
}

/// The low-dimensional membership curve.
fn curve(x: f64, a: f64, b: f64) -> f64 {
    1.0 / a.mul_add(x.powf(2.0 * b), 1.0)
}

/// Draws a uniform random layout in `[-10, 10]^dims` and rescales each
/// dimension to `[0, 10]`.
pub fn random_init<R: Rng>(n: usize, dims: usize, rng: &mut R) -> Array2<f64> {
    let mut layout = Array2::from_shape_fn((n, dims), |_| rng.gen_range(-10.0..10.0));
    for mut column in layout.columns_mut() {
        let min = column.fold(f64::INFINITY, |m, &v| m.min(v));
        let max = column.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        if max > min {
            column.mapv_inplace(|v| INIT_SCALE * (v - min) / (max - min));
        }
    }
    layout
}

/// The squared Euclidean distance between two rows of the layout.
fn squared_distance(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| (a - b).powi(2)).sum()
}

/// Optimizes the layout against the graph with stochastic gradient descent.
///
/// Each edge is sampled in proportion to its weight. Every positive sample
/// pulls both endpoints together and is followed by negative samples that
/// push the head away from uniformly random vertices. The learning rate
/// decays linearly to zero over the epochs.
///
/// # Arguments
///
/// * `layout`: The initial layout, one row per vertex.
/// * `graph`: The graph to optimize against, already pruned for `n_epochs`.
/// * `(a, b)`: The parameters of the membership curve.
/// * `n_epochs`: The number of epochs.
/// * `rng`: The random number generator for negative sampling.
pub fn optimize<R: Rng>(
    mut layout: Array2<f64>,
    graph: &FuzzyGraph,
    (a, b): (f64, f64),
    n_epochs: usize,
    rng: &mut R,
) -> Array2<f64> {
    let n_vertices = graph.n_vertices();
    let dims = layout.ncols();
    let edges = graph.edges();
    if edges.is_empty() || n_vertices < 2 {
        return layout;
    }

    let max_weight = edges.iter().map(|&(_, _, w)| w).fold(0.0, f64::max);
    let epochs_per_sample = edges.iter().map(|&(_, _, w)| max_weight / w).collect::<Vec<_>>();
    let epochs_per_negative = epochs_per_sample
        .iter()
        .map(|e| e / NEGATIVE_SAMPLE_RATE)
        .collect::<Vec<_>>();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    let clip = |g: f64| g.clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
    let mut alpha = INITIAL_ALPHA;
    let mut steps = vec![0.0; dims];

    for epoch in 0..n_epochs {
        #[allow(clippy::cast_precision_loss)]
        let e = epoch as f64;

        for (s, &(head, tail, _)) in edges.iter().enumerate() {
            if next_sample[s] > e {
                continue;
            }

            let d2 = squared_distance(layout.row(head), layout.row(tail));
            let coefficient = if d2 > 0.0 {
                -2.0 * a * b * d2.powf(b - 1.0) / a.mul_add(d2.powf(b), 1.0)
            } else {
                0.0
            };
            for (d, step) in steps.iter_mut().enumerate() {
                *step = clip(coefficient * (layout[[head, d]] - layout[[tail, d]])) * alpha;
            }
            for (d, &step) in steps.iter().enumerate() {
                layout[[head, d]] += step;
                layout[[tail, d]] -= step;
            }
            next_sample[s] += epochs_per_sample[s];

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n_negative = ((e - next_negative[s]) / epochs_per_negative[s]).max(0.0) as usize;
            for _ in 0..n_negative {
                let other = rng.gen_range(0..n_vertices);
                if other == head {
                    continue;
                }
                let d2 = squared_distance(layout.row(head), layout.row(other));
                let coefficient = if d2 > 0.0 {
                    2.0 * REPULSION_STRENGTH * b / ((0.001 + d2) * a.mul_add(d2.powf(b), 1.0))
                } else {
                    0.0
                };
                for d in 0..dims {
                    let gradient = if coefficient > 0.0 {
                        clip(coefficient * (layout[[head, d]] - layout[[other, d]]))
                    } else {
                        GRADIENT_CLIP
                    };
                    layout[[head, d]] += gradient * alpha;
                }
            }
            #[allow(clippy::cast_precision_loss)]
            {
                next_negative[s] += n_negative as f64 * epochs_per_negative[s];
            }
        }

        #[allow(clippy::cast_precision_loss)]
        {
            alpha = INITIAL_ALPHA * (1.0 - (epoch + 1) as f64 / n_epochs as f64);
        }

        if (epoch + 1) % 100 == 0 {
            ftlog::debug!("Completed epoch {}/{n_epochs}", epoch + 1);
        }
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_for_zero_min_dist() {
        let (a, b) = fit_curve(0.0, 1.0);
        assert!((a - 1.896).abs() < 0.05, "a = {a}");
        assert!((b - 0.8006).abs() < 0.02, "b = {b}");
    }

    #[test]
    fn init_is_bounded() {
        let mut rng = StdRng::seed_from_u64(0);
        let layout = random_init(20, 3, &mut rng);
        assert!(layout.iter().all(|&v| (0.0..=INIT_SCALE).contains(&v)));
    }
}

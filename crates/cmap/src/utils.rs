//! Utility functions for the crate.

use std::cmp::Ordering;

use distances::{number::Float, Number};

/// Return the index and value of the maximum value in the given slice of values.
///
/// Ties go to the first occurrence. NAN values are ordered as smaller than all
/// other values.
///
/// This will return `None` if the given slice is empty.
pub fn arg_max<T: PartialOrd + Copy>(values: &[T]) -> Option<(usize, T)> {
    let is_nan = |x: &T| x.partial_cmp(x).is_none();
    values.iter().copied().enumerate().fold(None, |best, (i, v)| match best {
        Some((_, b)) if !(v > b || (is_nan(&b) && !is_nan(&v))) => best,
        _ => Some((i, v)),
    })
}

/// Return the mean value of the given slice of values, or `None` if it is empty.
pub fn mean<T: Number, F: Float>(values: &[T]) -> Option<F> {
    if values.is_empty() {
        None
    } else {
        Some(F::from(values.iter().copied().sum::<T>()) / F::from(values.len()))
    }
}

/// Return the `q`-th percentile of the given values, interpolating linearly
/// between the closest ranks.
///
/// # Arguments
///
/// * `values` - The values, in any order.
/// * `q` - The percentile, in `[0, 100]`.
///
/// This will return `None` if the given slice is empty.
pub fn percentile<T: Number>(values: &[T], q: f64) -> Option<f64> {
    let mut sorted = values.iter().map(|&v| v.as_f64()).collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Less));

    let last = sorted.len().checked_sub(1)?;
    let rank = q.clamp(0.0, 100.0) / 100.0 * last.as_f64();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(last);
    let frac = rank - lo.as_f64();

    Some(frac.mul_add(sorted[hi] - sorted[lo], sorted[lo]))
}

/// Round the given value to `decimals` decimal places, with ties going to
/// the even neighbor.
#[must_use]
pub fn round_half_even(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Return the Shannon entropy, in nats, of the given counts after
/// normalizing them to a distribution.
///
/// Zero counts contribute nothing. An empty or all-zero slice has an entropy
/// of zero.
pub fn entropy<T: Number>(counts: &[T]) -> f64 {
    let total = counts.iter().map(|&v| v.as_f64()).sum::<f64>();
    if total <= 0.0 {
        return 0.0;
    }
    counts
        .iter()
        .map(|c| c.as_f64() / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn first_max() {
        assert_eq!(arg_max(&[1.0, 3.0, 2.0, 3.0]), Some((1, 3.0)));
        assert_eq!(arg_max(&[f64::NAN, 0.5]), Some((1, 0.5)));
        assert_eq!(arg_max::<f64>(&[]), None);
    }

    #[test]
    fn percentiles() {
        let sizes = [10_u32, 20, 30, 40, 50];
        assert!(approx_eq!(f64, percentile(&sizes, 20.0).unwrap_or_default(), 18.0, ulps = 4));
        assert!(approx_eq!(f64, percentile(&sizes, 80.0).unwrap_or_default(), 42.0, ulps = 4));
        assert!(approx_eq!(f64, percentile(&[7_u32], 80.0).unwrap_or_default(), 7.0));
        assert_eq!(percentile::<u32>(&[], 50.0), None);
    }

    #[test]
    fn rounding() {
        assert!(approx_eq!(f64, round_half_even(2.5, 0), 2.0));
        assert!(approx_eq!(f64, round_half_even(3.5, 0), 4.0));
        assert!(approx_eq!(f64, round_half_even(0.123, 2), 0.12));
    }

    #[test]
    fn entropies() {
        assert!(approx_eq!(f64, entropy(&[5_usize]), 0.0));
        assert!(approx_eq!(f64, entropy(&[1_usize, 1]), std::f64::consts::LN_2, ulps = 4));
    }
}

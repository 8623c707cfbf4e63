//! Two-sample Kolmogorov-Smirnov statistic and its asymptotic p-value.

/// Maximum number of terms summed in the Kolmogorov series.
pub const MAX_SERIES_TERMS: u32 = 199;

/// Summation stops once a series term drops below this magnitude.
pub const TERM_EPSILON: f64 = 1e-10;

/// Compute the two-sample KS distance `D = max |F_ref(x) - F_cur(x)|`.
///
/// Both empirical CDFs are evaluated at every point of the pooled sample
/// using the `<=` tie rule, which gives the exact statistic for finite
/// samples, duplicates included. NaN values are ignored.
///
/// Returns `None` when either sample has no usable values.
pub fn ks_statistic(reference: &[f64], current: &[f64]) -> Option<f64> {
    let reference = sorted_without_nan(reference);
    let current = sorted_without_nan(current);
    if reference.is_empty() || current.is_empty() {
        return None;
    }

    let d = reference
        .iter()
        .chain(current.iter())
        .map(|&x| (ecdf(&reference, x) - ecdf(&current, x)).abs())
        .fold(0.0, f64::max);

    Some(d)
}

/// Asymptotic two-sided p-value for a KS statistic, with Massey's
/// small-sample correction.
///
/// Returns `None` if either sample size is zero or `d` is not finite.
pub fn ks_pvalue(d: f64, n: usize, m: usize) -> Option<f64> {
    if n == 0 || m == 0 || !d.is_finite() {
        return None;
    }

    let (n, m) = (n as f64, m as f64);
    let effective = n * m / (n + m);
    let root = effective.sqrt();
    let lambda = (root + 0.12 + 0.11 / root) * d;

    let mut p = 0.0;
    for k in 1..=MAX_SERIES_TERMS {
        let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
        let k = f64::from(k);
        let term = (-2.0 * k * k * lambda * lambda).exp();
        p += 2.0 * sign * term;
        if term < TERM_EPSILON {
            break;
        }
    }

    Some(p.clamp(0.0, 1.0))
}

fn sorted_without_nan(sample: &[f64]) -> Vec<f64> {
    let mut values: Vec<f64> = sample.iter().copied().filter(|v| !v.is_nan()).collect();
    values.sort_by(f64::total_cmp);
    values
}

/// Fraction of `sorted` at or below `x`.
fn ecdf(sorted: &[f64], x: f64) -> f64 {
    sorted.partition_point(|&v| v <= x) as f64 / sorted.len() as f64
}

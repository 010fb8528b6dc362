//! Distribution merging and confidence estimators.
//!
//! Distributions are ordered lists of `(key, count)` pairs. Classification
//! keys are category labels, regression keys are bin values.

use std::cmp::Ordering;

/// Maximum number of bins kept in a merged regression distribution.
pub const BINS_LIMIT: usize = 32;

/// Default z-score of the confidence estimators (95%).
pub const DEFAULT_Z: f64 = 1.96;

// =============================================================================
// Distribution Merging
// =============================================================================

/// Key of a distribution entry.
pub trait DistributionKey: Clone {
    /// Total order used to sort and match keys.
    fn cmp_key(&self, other: &Self) -> Ordering;
}

impl DistributionKey for String {
    #[inline]
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl DistributionKey for f64 {
    #[inline]
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

/// Union of two distributions, summing the counts of shared keys.
///
/// The result is ordered by key.
pub fn merge_distributions<K: DistributionKey>(a: &[(K, f64)], b: &[(K, f64)]) -> Vec<(K, f64)> {
    let mut merged: Vec<(K, f64)> = a.iter().chain(b).cloned().collect();
    merged.sort_by(|x, y| x.0.cmp_key(&y.0));
    merged.dedup_by(|next, kept| {
        if next.0.cmp_key(&kept.0) == Ordering::Equal {
            kept.1 += next.1;
            true
        } else {
            false
        }
    });
    merged
}

/// Cap a bin distribution at `max(limit, 1)` bins.
///
/// Repeatedly fuses the two adjacent bins with the smallest value gap into
/// one bin at their count-weighted mean. On equal gaps the leftmost pair is
/// fused first.
pub fn merge_bins(bins: &[(f64, f64)], limit: usize) -> Vec<(f64, f64)> {
    let limit = limit.max(1);
    let mut bins = bins.to_vec();
    bins.sort_by(|x, y| x.0.total_cmp(&y.0));

    while bins.len() > limit {
        let gap = |i: usize| bins[i + 1].0 - bins[i].0;
        let Some(i) = (0..bins.len() - 1).min_by(|&i, &j| gap(i).total_cmp(&gap(j))) else {
            break;
        };

        let (v1, c1) = bins[i];
        let (v2, c2) = bins[i + 1];
        let count = c1 + c2;
        let value = if count > 0.0 {
            (v1 * c1 + v2 * c2) / count
        } else {
            (v1 + v2) / 2.0
        };
        bins[i] = (value, count);
        bins.remove(i + 1);
    }
    bins
}

// =============================================================================
// Summary Statistics
// =============================================================================

/// Total count of a distribution.
#[inline]
pub fn total_count<K>(distribution: &[(K, f64)]) -> f64 {
    distribution.iter().map(|(_, c)| c).sum()
}

/// Count-weighted mean of the bin values. `None` for an empty population.
pub fn mean(bins: &[(f64, f64)]) -> Option<f64> {
    let count = total_count(bins);
    if count <= 0.0 {
        return None;
    }
    Some(bins.iter().map(|(v, c)| v * c).sum::<f64>() / count)
}

/// Unbiased sample variance of the bins around `mean`.
///
/// `None` when the population is one or less.
pub fn unbiased_sample_variance(bins: &[(f64, f64)], mean: f64) -> Option<f64> {
    let count = total_count(bins);
    if count <= 1.0 {
        return None;
    }
    let sum_sq: f64 = bins.iter().map(|(v, c)| c * (v - mean).powi(2)).sum();
    Some(sum_sq / (count - 1.0))
}

/// Median of sorted bins holding `count` instances.
///
/// When `count` is even and the middle falls exactly between two bins the
/// two bin values are averaged.
pub fn dist_median(bins: &[(f64, f64)], count: f64) -> Option<f64> {
    let half = count / 2.0;
    let even = count % 2.0 == 0.0;
    let mut cumulative = 0.0;
    let mut previous: Option<f64> = None;

    for &(value, instances) in bins {
        let before = cumulative;
        cumulative += instances;
        if cumulative > half {
            return Some(match previous {
                Some(prev) if even && before == half => (prev + value) / 2.0,
                _ => value,
            });
        }
        previous = Some(value);
    }
    previous
}

// =============================================================================
// Confidence Estimators
// =============================================================================

/// Wilson score lower bound for proportion `p` over `n` trials.
pub fn wilson_lower_bound(p: f64, n: f64, z: f64) -> Option<f64> {
    if n <= 0.0 || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let z2 = z * z;
    let centre = p + z2 / (2.0 * n);
    let spread = z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt();
    Some(((centre - spread) / (1.0 + z2 / n)).clamp(0.0, 1.0))
}

/// Wilson lower bound of the share of `category` in `distribution`.
///
/// `None` when the category is absent or the distribution is empty.
pub fn ws_confidence(category: &str, distribution: &[(String, f64)], z: f64) -> Option<f64> {
    ws_confidence_with_n(category, distribution, z, None)
}

/// Like [`ws_confidence`], with an explicit number of trials `n`.
///
/// The proportion is still taken over the distribution's total.
pub fn ws_confidence_with_n(
    category: &str,
    distribution: &[(String, f64)],
    z: f64,
    n: Option<f64>,
) -> Option<f64> {
    let total = total_count(distribution);
    if total <= 0.0 {
        return None;
    }
    let count = distribution
        .iter()
        .find(|(k, _)| k == category)
        .map(|(_, c)| *c)?;
    wilson_lower_bound(count / total, n.unwrap_or(total), z)
}

/// Error estimate of a regression prediction.
///
/// Scales the sample variance by the chi-squared quantile of the population
/// at the two-sided tail of `z`. `None` when the population is one or less
/// or the quantile degenerates to zero.
pub fn regression_error(variance: f64, population: f64, z: f64) -> Option<f64> {
    if population <= 1.0 {
        return None;
    }
    let ppf = chi2_ppf(1.0 - erf(z / std::f64::consts::SQRT_2), population);
    if ppf == 0.0 {
        return None;
    }
    let error = variance * (population - 1.0) / ppf * (population.sqrt() + z).powi(2);
    Some((error / population).sqrt())
}

// =============================================================================
// Special Functions
// =============================================================================

/// Error function (Abramowitz and Stegun 7.1.26, |error| < 1.5e-7).
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Quantile function of the chi-squared distribution with `dof` degrees
/// of freedom.
pub fn chi2_ppf(p: f64, dof: f64) -> f64 {
    2.0 * inverse_gamma_p(p, dof / 2.0)
}

const LANCZOS: [f64; 14] = [
    57.156_235_665_862_923_5,
    -59.597_960_355_475_491_2,
    14.136_097_974_741_747_1,
    -0.491_913_816_097_620_199,
    0.339_946_499_848_118_887e-4,
    0.465_236_289_270_485_756e-4,
    -0.983_744_753_048_795_646e-4,
    0.158_088_703_224_912_494e-3,
    -0.210_264_441_724_104_883e-3,
    0.217_439_618_115_212_643e-3,
    -0.164_318_106_536_763_890e-3,
    0.844_182_239_838_527_433e-4,
    -0.261_908_384_015_814_087e-4,
    0.368_991_826_595_316_234e-5,
];

/// Natural log of the gamma function for `x > 0`.
fn ln_gamma(x: f64) -> f64 {
    let mut y = x;
    let tmp = x + 5.242_187_5;
    let tmp = (x + 0.5) * tmp.ln() - tmp;
    let mut series = 0.999_999_999_999_997_092;
    for c in LANCZOS {
        y += 1.0;
        series += c / y;
    }
    tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

const GAMMA_EPS: f64 = f64::EPSILON;
const GAMMA_FPMIN: f64 = f64::MIN_POSITIVE / f64::EPSILON;

/// Regularized lower incomplete gamma function P(a, x).
fn gamma_p(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let ln_gamma_a = ln_gamma(a);
    if x < a + 1.0 {
        gamma_series(a, x, ln_gamma_a)
    } else {
        1.0 - gamma_continued_fraction(a, x, ln_gamma_a)
    }
}

fn gamma_series(a: f64, x: f64, ln_gamma_a: f64) -> f64 {
    let mut ap = a;
    let mut delta = 1.0 / a;
    let mut sum = delta;
    loop {
        ap += 1.0;
        delta *= x / ap;
        sum += delta;
        if delta.abs() < sum.abs() * GAMMA_EPS {
            return sum * (-x + a * x.ln() - ln_gamma_a).exp();
        }
    }
}

// Modified Lentz evaluation of the continued fraction for Q(a, x).
fn gamma_continued_fraction(a: f64, x: f64, ln_gamma_a: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / GAMMA_FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    let mut i = 1.0;
    loop {
        let an = -i * (i - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < GAMMA_FPMIN {
            d = GAMMA_FPMIN;
        }
        c = b + an / c;
        if c.abs() < GAMMA_FPMIN {
            c = GAMMA_FPMIN;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        i += 1.0;
        if (delta - 1.0).abs() <= GAMMA_EPS {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma_a).exp() * h
}

/// Inverse of P(a, x) in `x`, by Halley iteration.
fn inverse_gamma_p(p: f64, a: f64) -> f64 {
    if p >= 1.0 {
        return f64::max(100.0, a + 100.0 * a.sqrt());
    }
    if p <= 0.0 {
        return 0.0;
    }

    let a1 = a - 1.0;
    let ln_gamma_a = ln_gamma(a);
    let (ln_a1, afac) = if a > 1.0 {
        let ln_a1 = a1.ln();
        (ln_a1, (a1 * (ln_a1 - 1.0) - ln_gamma_a).exp())
    } else {
        (0.0, 0.0)
    };

    let mut x = if a > 1.0 {
        let pp = if p < 0.5 { p } else { 1.0 - p };
        let t = (-2.0 * pp.ln()).sqrt();
        let mut x = (2.30753 + t * 0.27061) / (1.0 + t * (0.99229 + t * 0.04481)) - t;
        if p < 0.5 {
            x = -x;
        }
        f64::max(1e-3, a * (1.0 - 1.0 / (9.0 * a) - x / (3.0 * a.sqrt())).powi(3))
    } else {
        let t = 1.0 - a * (0.253 + a * 0.12);
        if p < t {
            (p / t).powf(1.0 / a)
        } else {
            1.0 - (1.0 - (p - t) / (1.0 - t)).ln()
        }
    };

    for _ in 0..12 {
        if x <= 0.0 {
            return 0.0;
        }
        let err = gamma_p(a, x) - p;
        let density = if a > 1.0 {
            afac * (-(x - a1) + a1 * (x.ln() - ln_a1)).exp()
        } else {
            (-x + a1 * x.ln() - ln_gamma_a).exp()
        };
        let u = err / density;
        let step = u / (1.0 - 0.5 * f64::min(1.0, u * ((a - 1.0) / x - 1.0)));
        x -= step;
        if x <= 0.0 {
            x = 0.5 * (x + step);
        }
        if step.abs() < 1e-8 * x {
            break;
        }
    }
    x
}

// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # Fisher's Noncentral Hypergeometric Distribution
//!
//! Fisher's variant of biased sampling without replacement: every ball is
//! included with an independent weighted Bernoulli trial, and the
//! distribution is the conditional law of the colour-1 count given that
//! exactly `n` balls were taken in total.
//!
//! ## Mathematical Definition
//!
//! For a population of `N` balls of which `m` are colour 1 with odds `ω`
//! (colour 2 has odds 1), and a sample of `n` balls:
//!
//! ```text
//! P(X = x) = C(m, x) · C(N−m, n−x) · ω^x / Σ_y C(m, y) · C(N−m, n−y) · ω^y
//! ```
//!
//! with support `max(0, n−(N−m)) ≤ x ≤ min(n, m)`. `ω = 1` recovers the
//! central hypergeometric distribution.
//!
//! ## Common Applications
//!
//! - **Case–control studies**: odds-ratio inference in 2×2 tables
//! - **Ecology**: biased capture models with unequal catchability
//! - **Auditing / quality control**: weighted acceptance sampling
//! - **Vaccine efficacy**: conditional inference on exposure counts
//!
//! The stateful evaluation engine is exposed as
//! [`FishersNCHypergeometric`] for callers that make many related queries on
//! one parameter set.

mod engine;
mod std;

pub use engine::FishersNCHypergeometric;

use minarrow::enums::error::KernelError;
use minarrow::{Bitmask, FloatArray, Vec64};
use rand::rng;

/// Compute the probability mass function (PMF) of Fisher's noncentral
/// hypergeometric distribution.
///
/// ## Parameters
/// * `x` - Observed colour-1 counts to evaluate
/// * `population` - Total population size N
/// * `success` - Number of colour-1 balls m (0 ≤ m ≤ N)
/// * `draws` - Sample size n (0 ≤ n ≤ N)
/// * `odds` - Odds ω ≥ 0 of colour 1 relative to colour 2
/// * `accuracy` - Requested absolute accuracy in (0, 1]; terms below
///   `0.1·accuracy` are dropped from the normalisation sum
/// * `null_mask` / `null_count` - Arrow-style validity handling
///
/// ## Returns
/// `FloatArray<f64>` of PMF values, or `KernelError` on invalid parameters
/// (including `odds == 0` with more draws than zero-weight complement).
/// Out-of-support `x` values yield 0.
#[inline(always)]
pub fn fishers_nchypergeo_pmf(
    x: &[u64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    std::fishers_nchypergeo_pmf_std(
        x, population, success, draws, odds, accuracy, null_mask, null_count,
    )
}

/// Fisher's noncentral hypergeometric CDF: F(x) = Σ_{i≤x} P(i).
#[inline(always)]
pub fn fishers_nchypergeo_cdf(
    x: &[u64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    std::fishers_nchypergeo_cdf_std(
        x, population, success, draws, odds, accuracy, null_mask, null_count,
    )
}

/// Fisher's noncentral hypergeometric quantile: Q(p) = smallest x such that
/// CDF(x) ≥ p.
#[inline(always)]
pub fn fishers_nchypergeo_quantile(
    p: &[f64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    std::fishers_nchypergeo_quantile_std(
        p, population, success, draws, odds, accuracy, null_mask, null_count,
    )
}

/// Zero-allocation variant of [`fishers_nchypergeo_pmf`].
///
/// Writes directly to caller-provided output buffer.
#[inline(always)]
pub fn fishers_nchypergeo_pmf_to(
    x: &[u64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    output: &mut [f64],
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<(), KernelError> {
    std::fishers_nchypergeo_pmf_std_to(
        x, population, success, draws, odds, accuracy, output, null_mask, null_count,
    )
}

/// Zero-allocation variant of [`fishers_nchypergeo_cdf`].
///
/// Writes directly to caller-provided output buffer.
#[inline(always)]
pub fn fishers_nchypergeo_cdf_to(
    x: &[u64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    output: &mut [f64],
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<(), KernelError> {
    std::fishers_nchypergeo_cdf_std_to(
        x, population, success, draws, odds, accuracy, output, null_mask, null_count,
    )
}

/// Zero-allocation variant of [`fishers_nchypergeo_quantile`].
///
/// Writes directly to caller-provided output buffer.
#[inline(always)]
pub fn fishers_nchypergeo_quantile_to(
    p: &[f64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    output: &mut [f64],
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<(), KernelError> {
    std::fishers_nchypergeo_quantile_std_to(
        p, population, success, draws, odds, accuracy, output, null_mask, null_count,
    )
}

/// Mean of Fisher's noncentral hypergeometric distribution.
///
/// `accuracy ≥ 0.1` returns the fast Cornfield approximation; stricter
/// accuracies compute the exact moment sum over the support.
pub fn fishers_nchypergeo_mean(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
) -> Result<f64, KernelError> {
    let mut dist = FishersNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    if accuracy >= 0.1 || odds == 1.0 || odds == 0.0 {
        Ok(dist.mean())
    } else {
        Ok(dist.moments().0)
    }
}

/// Variance of Fisher's noncentral hypergeometric distribution.
///
/// `accuracy ≥ 0.1` returns the (rough) Fisher approximation; stricter
/// accuracies compute the exact moment sum over the support.
pub fn fishers_nchypergeo_variance(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
) -> Result<f64, KernelError> {
    let mut dist = FishersNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    if accuracy >= 0.1 {
        Ok(dist.variance())
    } else {
        Ok(dist.moments().1)
    }
}

/// Exact mean and variance by summation over the support.
pub fn fishers_nchypergeo_moments(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
) -> Result<(f64, f64), KernelError> {
    let mut dist = FishersNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    Ok(dist.moments())
}

/// Exact mode via the Liao–Rosen quadratic.
pub fn fishers_nchypergeo_mode(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
) -> Result<i64, KernelError> {
    let dist = FishersNCHypergeometric::new(population, success, draws, odds, 1e-8)?;
    Ok(dist.mode())
}

/// Draw `n_samples` variates by chop-down inversion over the recurrence
/// table (built once per call). Counts are returned as f64, matching the
/// other sampling kernels.
pub fn fishers_nchypergeo_sample(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    n_samples: usize,
) -> Result<FloatArray<f64>, KernelError> {
    let mut dist = FishersNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    let mut rng = rng();
    let mut out = Vec64::with_capacity(n_samples);
    for _ in 0..n_samples {
        out.push(dist.sample(&mut rng) as f64);
    }
    Ok(FloatArray::from_vec64(out, None))
}

/// Recovers the odds from a target mean by analytic inversion of the
/// Cornfield mean equation `μ(μ + N − m − n) = ω·(m−μ)(n−μ)`.
///
/// The result targets the *approximate* mean (the inversion is not exact
/// for the exact mean); `mean` must lie in `[x_min, x_max)`.
pub fn fishers_nchypergeo_odds_from_mean(
    mean: f64,
    population: u64,
    success: u64,
    draws: u64,
) -> Result<f64, KernelError> {
    if success > population || draws > population {
        return Err(KernelError::InvalidArguments(
            "fishers_nchypergeo_odds_from_mean: success and draws must not exceed population"
                .into(),
        ));
    }
    let nn = population as f64;
    let m = success as f64;
    let n = draws as f64;
    let x_min = (m + n - nn).max(0.0);
    let x_max = n.min(m);
    if !mean.is_finite() || mean < x_min || mean >= x_max {
        return Err(KernelError::InvalidArguments(
            "fishers_nchypergeo_odds_from_mean: mean outside the support interval".into(),
        ));
    }
    Ok(mean * (mean + nn - m - n) / ((m - mean) * (n - mean)))
}

/// Cornfield approximate mean as a function of a (real-valued) colour-1
/// count, used by the urn-composition inverse.
fn cornfield_mean(m: f64, n: f64, nn: f64, odds: f64) -> f64 {
    if odds == 1.0 {
        return m * n / nn;
    }
    let a = (m + n) * odds + (nn - m - n);
    let b = (a * a - 4.0 * odds * (odds - 1.0) * m * n).max(0.0).sqrt();
    (a - b) / (2.0 * (odds - 1.0))
}

/// Recovers the urn composition `(m1, m2)` with `m1 + m2 = N` whose
/// approximate mean equals `mean`, by scalar bisection on `m1 ∈ [0, N]`
/// (the Cornfield mean is increasing in `m1`).
pub fn fishers_nchypergeo_size_from_mean(
    mean: f64,
    population: u64,
    draws: u64,
    odds: f64,
) -> Result<(u64, u64), KernelError> {
    if draws > population {
        return Err(KernelError::InvalidArguments(
            "fishers_nchypergeo_size_from_mean: draws must not exceed population".into(),
        ));
    }
    if !odds.is_finite() || odds <= 0.0 {
        return Err(KernelError::InvalidArguments(
            "fishers_nchypergeo_size_from_mean: odds must be finite and positive".into(),
        ));
    }
    let nn = population as f64;
    let n = draws as f64;
    if !mean.is_finite() || mean < 0.0 || mean > n {
        return Err(KernelError::InvalidArguments(
            "fishers_nchypergeo_size_from_mean: mean must lie in [0, draws]".into(),
        ));
    }
    let mut lo = 0.0_f64;
    let mut hi = nn;
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if cornfield_mean(mid, n, nn, odds) < mean {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let m1 = (0.5 * (lo + hi)).round().clamp(0.0, nn) as u64;
    Ok((m1, population - m1))
}

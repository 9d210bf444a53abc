// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # Wallenius' Noncentral Hypergeometric Distribution
//!
//! Wallenius' variant of biased sampling without replacement: balls are
//! drawn one at a time, and at each draw the probability of taking a given
//! colour is proportional to its residual count times its odds. Because
//! later draws depend on what was taken earlier, this distribution differs
//! from Fisher's variant for the same urn (they coincide at `odds = 1`).
//!
//! ## Mathematical Definition
//!
//! With `d = ω(m−x) + (N−m−(n−x))` (total residual weight after the
//! outcome), the PMF is the integral
//!
//! ```text
//! P(X = x) = C(m, x)·C(N−m, n−x) · ∫₀¹ (1 − t^{ω/d})^x (1 − t^{1/d})^{n−x} dt
//! ```
//!
//! which has no closed form and is evaluated numerically (see the engine
//! documentation for the strategy selection).
//!
//! ## Common Applications
//!
//! - **Competitive selection**: unequal catchability in sequential capture
//! - **Auction / matching models**: weighted sequential allocation
//! - **Epidemiology**: biased sampling where the urn depletes as it is read
//!
//! The stateful evaluation engine is exposed as
//! [`WalleniusNCHypergeometric`] for callers making many related queries.

mod engine;
mod std;

pub use engine::WalleniusNCHypergeometric;
pub(crate) use engine::{ln_wallenius_integral, ln_wallenius_integral_laplace};

use minarrow::enums::error::KernelError;
use minarrow::{Bitmask, FloatArray, Vec64};
use rand::rng;

/// Compute the probability mass function (PMF) of Wallenius' noncentral
/// hypergeometric distribution.
///
/// ## Parameters
/// * `x` - Observed colour-1 counts to evaluate
/// * `population` - Total population size N
/// * `success` - Number of colour-1 balls m (0 ≤ m ≤ N)
/// * `draws` - Sample size n (0 ≤ n ≤ N)
/// * `odds` - Odds ω ≥ 0 of colour 1 relative to colour 2
/// * `accuracy` - Requested accuracy in (0, 1]; values ≥ 0.1 switch to the
///   fast normal approximation
/// * `null_mask` / `null_count` - Arrow-style validity handling
///
/// ## Returns
/// `FloatArray<f64>` of PMF values, or `KernelError` on invalid parameters.
/// Out-of-support `x` values yield 0.
#[inline(always)]
pub fn wallenius_nchypergeo_pmf(
    x: &[u64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    std::wallenius_nchypergeo_pmf_std(
        x, population, success, draws, odds, accuracy, null_mask, null_count,
    )
}

/// Wallenius' noncentral hypergeometric CDF: F(x) = Σ_{i≤x} P(i).
#[inline(always)]
pub fn wallenius_nchypergeo_cdf(
    x: &[u64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    std::wallenius_nchypergeo_cdf_std(
        x, population, success, draws, odds, accuracy, null_mask, null_count,
    )
}

/// Wallenius' noncentral hypergeometric quantile: Q(p) = smallest x such
/// that CDF(x) ≥ p.
#[inline(always)]
pub fn wallenius_nchypergeo_quantile(
    p: &[f64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    std::wallenius_nchypergeo_quantile_std(
        p, population, success, draws, odds, accuracy, null_mask, null_count,
    )
}

/// Zero-allocation variant of [`wallenius_nchypergeo_pmf`].
///
/// Writes directly to caller-provided output buffer.
#[inline(always)]
pub fn wallenius_nchypergeo_pmf_to(
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
    std::wallenius_nchypergeo_pmf_std_to(
        x, population, success, draws, odds, accuracy, output, null_mask, null_count,
    )
}

/// Zero-allocation variant of [`wallenius_nchypergeo_cdf`].
///
/// Writes directly to caller-provided output buffer.
#[inline(always)]
pub fn wallenius_nchypergeo_cdf_to(
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
    std::wallenius_nchypergeo_cdf_std_to(
        x, population, success, draws, odds, accuracy, output, null_mask, null_count,
    )
}

/// Zero-allocation variant of [`wallenius_nchypergeo_quantile`].
///
/// Writes directly to caller-provided output buffer.
#[inline(always)]
pub fn wallenius_nchypergeo_quantile_to(
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
    std::wallenius_nchypergeo_quantile_std_to(
        p, population, success, draws, odds, accuracy, output, null_mask, null_count,
    )
}

/// Mean of Wallenius' noncentral hypergeometric distribution.
///
/// `accuracy ≥ 0.1` returns the transfer-equation approximation; stricter
/// accuracies compute the exact moment sum over the support.
pub fn wallenius_nchypergeo_mean(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
) -> Result<f64, KernelError> {
    let mut dist = WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    if accuracy >= 0.1 || odds == 1.0 || odds == 0.0 {
        Ok(dist.mean())
    } else {
        Ok(dist.moments().0)
    }
}

/// Variance of Wallenius' noncentral hypergeometric distribution.
///
/// `accuracy ≥ 0.1` returns the rough approximation; stricter accuracies
/// compute the exact moment sum over the support.
pub fn wallenius_nchypergeo_variance(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
) -> Result<f64, KernelError> {
    let mut dist = WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    if accuracy >= 0.1 {
        Ok(dist.variance())
    } else {
        Ok(dist.moments().1)
    }
}

/// Exact mean and variance by summation over the support.
pub fn wallenius_nchypergeo_moments(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
) -> Result<(f64, f64), KernelError> {
    let mut dist = WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    Ok(dist.moments())
}

/// Mode by hill-climbing from the approximate mean.
pub fn wallenius_nchypergeo_mode(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
) -> Result<i64, KernelError> {
    let mut dist = WalleniusNCHypergeometric::new(population, success, draws, odds, 1e-8)?;
    Ok(dist.mode())
}

/// Draw `n_samples` variates by urn emulation (exact by the distribution's
/// definition); a chop-down table takes over automatically for repeated
/// sampling from the same parameter set.
pub fn wallenius_nchypergeo_sample(
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    n_samples: usize,
) -> Result<FloatArray<f64>, KernelError> {
    let mut dist = WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    let mut rng = rng();
    let mut out = Vec64::with_capacity(n_samples);
    for _ in 0..n_samples {
        out.push(dist.sample(&mut rng) as f64);
    }
    Ok(FloatArray::from_vec64(out, None))
}

/// Recovers the odds from a target mean by bisection on
/// `odds ∈ [1e−9, 1e9]` against the fast mean approximation (which is
/// strictly increasing in the odds).
///
/// The result targets the *approximate* mean; `accuracy` is a hint only.
pub fn wallenius_nchypergeo_odds_from_mean(
    mean: f64,
    population: u64,
    success: u64,
    draws: u64,
) -> Result<f64, KernelError> {
    if success > population || draws > population {
        return Err(KernelError::InvalidArguments(
            "wallenius_nchypergeo_odds_from_mean: success and draws must not exceed population"
                .into(),
        ));
    }
    let m = success as f64;
    let n = draws as f64;
    let x_min = (m + n - population as f64).max(0.0);
    let x_max = n.min(m);
    if !mean.is_finite() || mean < x_min || mean >= x_max {
        return Err(KernelError::InvalidArguments(
            "wallenius_nchypergeo_odds_from_mean: mean outside the support interval".into(),
        ));
    }
    let mean_at = |odds: f64| -> f64 {
        WalleniusNCHypergeometric::new(population, success, draws, odds, 0.5)
            .map(|d| d.mean())
            .unwrap_or(f64::NAN)
    };
    let mut lo = 1e-9_f64;
    let mut hi = 1e9_f64;
    if mean <= mean_at(lo) {
        return Ok(lo);
    }
    if mean >= mean_at(hi) {
        return Ok(hi);
    }
    // bisection in log-odds for uniform relative resolution
    for _ in 0..200 {
        let mid = (0.5 * (lo.ln() + hi.ln())).exp();
        if mean_at(mid) < mean {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok((0.5 * (lo.ln() + hi.ln())).exp())
}

/// Recovers the urn composition `(m1, m2)` with `m1 + m2 = N` whose
/// approximate Wallenius mean equals `mean`, by scalar bisection on
/// `m1 ∈ [0, N]`.
pub fn wallenius_nchypergeo_size_from_mean(
    mean: f64,
    population: u64,
    draws: u64,
    odds: f64,
) -> Result<(u64, u64), KernelError> {
    if draws > population {
        return Err(KernelError::InvalidArguments(
            "wallenius_nchypergeo_size_from_mean: draws must not exceed population".into(),
        ));
    }
    if !odds.is_finite() || odds <= 0.0 {
        return Err(KernelError::InvalidArguments(
            "wallenius_nchypergeo_size_from_mean: odds must be finite and positive".into(),
        ));
    }
    let n = draws as f64;
    if !mean.is_finite() || mean < 0.0 || mean > n {
        return Err(KernelError::InvalidArguments(
            "wallenius_nchypergeo_size_from_mean: mean must lie in [0, draws]".into(),
        ));
    }
    // transfer-equation mean as a function of a real-valued m1: solve the
    // theta root for each candidate composition
    let nn = population as f64;
    let mean_at = |m1: f64| -> f64 {
        let m2 = nn - m1;
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        for _ in 0..100 {
            let th = 0.5 * (lo + hi);
            let v = m1 * (1.0 - th.powf(odds)) + m2 * (1.0 - th);
            if v > n {
                lo = th;
            } else {
                hi = th;
            }
        }
        let th = 0.5 * (lo + hi);
        m1 * (1.0 - th.powf(odds))
    };
    let mut lo = 0.0_f64;
    let mut hi = nn;
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if mean_at(mid) < mean {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let m1 = (0.5 * (lo + hi)).round().clamp(0.0, nn) as u64;
    Ok((m1, population - m1))
}

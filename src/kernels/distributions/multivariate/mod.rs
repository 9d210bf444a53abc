// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Multivariate Noncentral Hypergeometric Distributions**
//!
//! Engines and kernels for urns with up to [`MAX_COLORS`] colours, each with
//! its own count and odds. Colours with a zero count or zero odds are
//! *excluded* from computation: their outcome is forced to 0, and a query
//! with a nonzero count at an excluded colour has probability 0.
//!
//! Both engines reduce to the univariate case below three used colours, and
//! to a product of central hypergeometric draws when every remaining odds is
//! equal. The general Fisher case sums the proportional function over the
//! feasible lattice with a depth-first, mean-anchored enumeration; the
//! general Wallenius case evaluates the multivariate Wallenius integral.
//!
//! These are kernel-level entry points: a PMF call takes one outcome vector
//! and returns a length-1 array, and 2-d broadcasting belongs to a higher
//! layer. Null masks are not supported on the multivariate surface.

pub mod fishers;
pub mod wallenius;

pub use fishers::MultiFishersNCHypergeometric;
pub use wallenius::MultiWalleniusNCHypergeometric;

use minarrow::enums::error::KernelError;
use minarrow::{Bitmask, FloatArray, Vec64};

use crate::config::MAX_COLORS;

/// Validated, colour-reduced urn parameters shared by the two multivariate
/// engines.
///
/// `m`/`odds` hold the *used* colours only; `nonzero` remembers the input
/// positions so results can be expanded back to the caller's colour order.
pub(crate) struct UrnReduction {
    pub colors: usize,
    pub used: usize,
    pub draws: i64,
    pub total_used: i64, // Nu: balls on used colours
    pub m: [i64; MAX_COLORS],
    pub odds: [f64; MAX_COLORS],
    pub nonzero: [bool; MAX_COLORS],
    pub all_odds_equal: bool,
    pub accuracy: f64,
}

impl UrnReduction {
    pub fn new(
        m: &[u64],
        odds: &[f64],
        draws: u64,
        accuracy: f64,
        context: &'static str,
    ) -> Result<Self, KernelError> {
        if m.is_empty() || m.len() != odds.len() {
            return Err(KernelError::InvalidArguments(format!(
                "{context}: m and odds must be non-empty and of equal length"
            )));
        }
        if m.len() > MAX_COLORS {
            return Err(KernelError::InvalidArguments(format!(
                "{context}: at most {MAX_COLORS} colours are supported"
            )));
        }
        if !accuracy.is_finite() || accuracy <= 0.0 {
            return Err(KernelError::InvalidArguments(format!(
                "{context}: accuracy must lie in (0, 1]"
            )));
        }
        let accuracy = accuracy.min(1.0);
        let colors = m.len();
        let mut used = 0usize;
        let mut total = 0i64;
        let mut total_used = 0i64;
        let mut mu = [0i64; MAX_COLORS];
        let mut ou = [0f64; MAX_COLORS];
        let mut nonzero = [false; MAX_COLORS];
        let mut all_odds_equal = true;
        for i in 0..colors {
            if !odds[i].is_finite() || odds[i] < 0.0 {
                return Err(KernelError::InvalidArguments(format!(
                    "{context}: odds must be finite and non-negative"
                )));
            }
            total += m[i] as i64;
            let active = m[i] > 0 && odds[i] > 0.0;
            nonzero[i] = active;
            if active {
                if used > 0 && odds[i] != ou[used - 1] {
                    all_odds_equal = false;
                }
                mu[used] = m[i] as i64;
                ou[used] = odds[i];
                total_used += m[i] as i64;
                used += 1;
            }
        }
        if (draws as i64) > total {
            return Err(KernelError::InvalidArguments(format!(
                "{context}: taking more items than there are in the urn"
            )));
        }
        if (draws as i64) > total_used {
            return Err(KernelError::InvalidArguments(format!(
                "{context}: not enough items with nonzero weight"
            )));
        }
        Ok(Self {
            colors,
            used,
            draws: draws as i64,
            total_used,
            m: mu,
            odds: ou,
            nonzero,
            all_odds_equal,
            accuracy,
        })
    }

    /// Copies the input outcome vector into used-colour order.
    ///
    /// Returns `Ok(None)` (probability 0, soft) when a nonzero count sits at
    /// an excluded colour; errors when the counts do not sum to `draws`.
    pub fn resolve_x(
        &self,
        x: &[u64],
        context: &'static str,
    ) -> Result<Option<[i64; MAX_COLORS]>, KernelError> {
        if x.len() != self.colors {
            return Err(KernelError::InvalidArguments(format!(
                "{context}: x must have one entry per colour"
            )));
        }
        let mut xu = [0i64; MAX_COLORS];
        let mut xsum = 0i64;
        let mut j = 0usize;
        for i in 0..self.colors {
            if self.nonzero[i] {
                xu[j] = x[i] as i64;
                xsum += x[i] as i64;
                j += 1;
            } else if x[i] != 0 {
                return Ok(None);
            }
        }
        if xsum != self.draws {
            return Err(KernelError::InvalidArguments(format!(
                "{context}: sum of x values must equal the number of draws"
            )));
        }
        Ok(Some(xu))
    }

    /// Expands a used-colour vector back to the caller's colour order,
    /// filling excluded colours with zero.
    pub fn expand(&self, reduced: &[f64; MAX_COLORS]) -> Vec64<f64> {
        let mut out = Vec64::with_capacity(self.colors);
        let mut j = 0usize;
        for i in 0..self.colors {
            if self.nonzero[i] {
                out.push(reduced[j]);
                j += 1;
            } else {
                out.push(0.0);
            }
        }
        out
    }
}

#[inline(always)]
fn reject_null_mask(
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<(), KernelError> {
    if null_mask.is_some() || null_count.is_some() {
        return Err(KernelError::InvalidArguments(
            "Null mask support is not implemented for multivariate distributions".into(),
        ));
    }
    Ok(())
}

/// Multivariate Fisher's noncentral hypergeometric PMF at one outcome
/// vector `x` (one entry per colour, summing to `draws`).
///
/// Returns a length-1 array containing P(X = x).
pub fn multi_fishers_nchypergeo_pmf(
    x: &[u64],
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    reject_null_mask(null_mask, null_count)?;
    let mut dist = MultiFishersNCHypergeometric::new(m, odds, draws, accuracy)?;
    let p = dist.probability(x)?;
    let mut out = Vec64::with_capacity(1);
    out.push(p);
    Ok(FloatArray::from_vec64(out, None))
}

/// Per-colour approximate means of the multivariate Fisher distribution
/// (Cornfield fixed point); exact enumeration when `accuracy < 0.1`.
pub fn multi_fishers_nchypergeo_mean(
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
) -> Result<FloatArray<f64>, KernelError> {
    let mut dist = MultiFishersNCHypergeometric::new(m, odds, draws, accuracy)?;
    let out = if accuracy >= 0.1 {
        dist.mean()?
    } else {
        dist.moments()?.0
    };
    Ok(FloatArray::from_vec64(out, None))
}

/// Per-colour approximate variances of the multivariate Fisher
/// distribution; exact enumeration when `accuracy < 0.1`.
pub fn multi_fishers_nchypergeo_variance(
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
) -> Result<FloatArray<f64>, KernelError> {
    let mut dist = MultiFishersNCHypergeometric::new(m, odds, draws, accuracy)?;
    let out = if accuracy >= 0.1 {
        dist.variance()?.0
    } else {
        dist.moments()?.1
    };
    Ok(FloatArray::from_vec64(out, None))
}

/// Exact per-colour mean and variance of the multivariate Fisher
/// distribution by lattice enumeration, plus the number of outcome
/// combinations visited.
pub fn multi_fishers_nchypergeo_moments(
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
) -> Result<(FloatArray<f64>, FloatArray<f64>, u64), KernelError> {
    let mut dist = MultiFishersNCHypergeometric::new(m, odds, draws, accuracy)?;
    let (mean, var, combinations) = dist.moments()?;
    Ok((
        FloatArray::from_vec64(mean, None),
        FloatArray::from_vec64(var, None),
        combinations,
    ))
}

/// Draw `n_samples` outcome vectors from the multivariate Fisher
/// distribution by conditional decomposition into univariate marginals with
/// pooled odds.
pub fn multi_fishers_nchypergeo_sample(
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
    n_samples: usize,
) -> Result<Vec<FloatArray<f64>>, KernelError> {
    let mut dist = MultiFishersNCHypergeometric::new(m, odds, draws, accuracy)?;
    let mut rng = rand::rng();
    let mut out = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row = dist.sample(&mut rng)?;
        out.push(FloatArray::from_vec64(row, None));
    }
    Ok(out)
}

/// Multivariate Wallenius' noncentral hypergeometric PMF at one outcome
/// vector `x`.
///
/// Returns a length-1 array containing P(X = x).
pub fn multi_wallenius_nchypergeo_pmf(
    x: &[u64],
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    reject_null_mask(null_mask, null_count)?;
    let mut dist = MultiWalleniusNCHypergeometric::new(m, odds, draws, accuracy)?;
    let p = dist.probability(x)?;
    let mut out = Vec64::with_capacity(1);
    out.push(p);
    Ok(FloatArray::from_vec64(out, None))
}

/// Per-colour approximate means of the multivariate Wallenius distribution
/// (transfer-equation root); exact enumeration when `accuracy < 0.1`.
pub fn multi_wallenius_nchypergeo_mean(
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
) -> Result<FloatArray<f64>, KernelError> {
    let mut dist = MultiWalleniusNCHypergeometric::new(m, odds, draws, accuracy)?;
    let out = if accuracy >= 0.1 {
        dist.mean()?
    } else {
        dist.moments()?.0
    };
    Ok(FloatArray::from_vec64(out, None))
}

/// Per-colour approximate variances of the multivariate Wallenius
/// distribution; exact enumeration when `accuracy < 0.1`.
pub fn multi_wallenius_nchypergeo_variance(
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
) -> Result<FloatArray<f64>, KernelError> {
    let mut dist = MultiWalleniusNCHypergeometric::new(m, odds, draws, accuracy)?;
    let out = if accuracy >= 0.1 {
        dist.variance()?.0
    } else {
        dist.moments()?.1
    };
    Ok(FloatArray::from_vec64(out, None))
}

/// Exact per-colour mean and variance of the multivariate Wallenius
/// distribution by lattice enumeration of the PMF, plus the number of
/// combinations visited.
pub fn multi_wallenius_nchypergeo_moments(
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
) -> Result<(FloatArray<f64>, FloatArray<f64>, u64), KernelError> {
    let mut dist = MultiWalleniusNCHypergeometric::new(m, odds, draws, accuracy)?;
    let (mean, var, combinations) = dist.moments()?;
    Ok((
        FloatArray::from_vec64(mean, None),
        FloatArray::from_vec64(var, None),
        combinations,
    ))
}

/// Draw `n_samples` outcome vectors from the multivariate Wallenius
/// distribution by urn emulation (exact by definition).
pub fn multi_wallenius_nchypergeo_sample(
    m: &[u64],
    odds: &[f64],
    draws: u64,
    accuracy: f64,
    n_samples: usize,
) -> Result<Vec<FloatArray<f64>>, KernelError> {
    let mut dist = MultiWalleniusNCHypergeometric::new(m, odds, draws, accuracy)?;
    let mut rng = rand::rng();
    let mut out = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row = dist.sample(&mut rng);
        out.push(FloatArray::from_vec64(row, None));
    }
    Ok(out)
}

/// Recovers per-colour odds from target means for the multivariate Fisher
/// distribution.
///
/// From the Cornfield mean equations `μᵢ = mᵢ·rωᵢ/(rωᵢ+1)` the odds are
/// proportional to `μᵢ/(mᵢ−μᵢ)`; the result is normalised so the last
/// used colour has odds 1. The means must sum to `draws`.
pub fn multi_fishers_nchypergeo_odds_from_mean(
    mean: &[f64],
    m: &[u64],
    draws: u64,
) -> Result<FloatArray<f64>, KernelError> {
    multi_odds_from_mean(mean, m, draws, false)
}

/// Recovers per-colour odds from target means for the multivariate
/// Wallenius distribution.
///
/// From the transfer equations `μᵢ = mᵢ(1−θ^{ωᵢ})` the odds are
/// proportional to `ln(1−μᵢ/mᵢ)`; the result is normalised so the last
/// used colour has odds 1. The means must sum to `draws`.
pub fn multi_wallenius_nchypergeo_odds_from_mean(
    mean: &[f64],
    m: &[u64],
    draws: u64,
) -> Result<FloatArray<f64>, KernelError> {
    multi_odds_from_mean(mean, m, draws, true)
}

fn multi_odds_from_mean(
    mean: &[f64],
    m: &[u64],
    draws: u64,
    wallenius: bool,
) -> Result<FloatArray<f64>, KernelError> {
    if mean.is_empty() || mean.len() != m.len() {
        return Err(KernelError::InvalidArguments(
            "odds_from_mean: mean and m must be non-empty and of equal length".into(),
        ));
    }
    let sum: f64 = mean.iter().sum();
    if (sum - draws as f64).abs() > 1e-4 * (draws as f64).max(1.0) {
        return Err(KernelError::InvalidArguments(
            "odds_from_mean: means must sum to the number of draws".into(),
        ));
    }
    let mut raw = Vec64::with_capacity(m.len());
    let mut reference = f64::NAN;
    for (&mu_i, &m_i) in mean.iter().zip(m.iter()) {
        if mu_i < 0.0 || (mu_i > 0.0 && mu_i >= m_i as f64) {
            return Err(KernelError::InvalidArguments(
                "odds_from_mean: each mean must lie in [0, m_i)".into(),
            ));
        }
        let w = if mu_i == 0.0 {
            0.0
        } else if wallenius {
            -(-mu_i / m_i as f64).ln_1p()
        } else {
            mu_i / (m_i as f64 - mu_i)
        };
        if w > 0.0 {
            reference = w;
        }
        raw.push(w);
    }
    if !reference.is_finite() || reference <= 0.0 {
        return Err(KernelError::InvalidArguments(
            "odds_from_mean: no colour with positive mean".into(),
        ));
    }
    for w in raw.iter_mut() {
        *w /= reference;
    }
    Ok(FloatArray::from_vec64(raw, None))
}

/// Recovers per-colour counts from target means, a known total `population`
/// and known odds, for the multivariate Fisher distribution.
///
/// The Cornfield equations give `mᵢ = μᵢ(1 + 1/(rωᵢ))` with the common
/// factor fixed by `Σmᵢ = N`: `r = Σ(μᵢ/ωᵢ) / (N − Σμᵢ)`. Counts are
/// returned as reals; rounding is up to the caller.
pub fn multi_fishers_nchypergeo_size_from_mean(
    mean: &[f64],
    odds: &[f64],
    population: u64,
) -> Result<FloatArray<f64>, KernelError> {
    if mean.is_empty() || mean.len() != odds.len() {
        return Err(KernelError::InvalidArguments(
            "multi_fishers_nchypergeo_size_from_mean: mean and odds must match".into(),
        ));
    }
    let mu_sum: f64 = mean.iter().sum();
    let nn = population as f64;
    if mu_sum >= nn {
        return Err(KernelError::InvalidArguments(
            "multi_fishers_nchypergeo_size_from_mean: means must sum below the population".into(),
        ));
    }
    let mut ratio_sum = 0.0;
    for (&mu_i, &w) in mean.iter().zip(odds.iter()) {
        if !(w > 0.0) || mu_i < 0.0 {
            return Err(KernelError::InvalidArguments(
                "multi_fishers_nchypergeo_size_from_mean: odds must be positive and means non-negative"
                    .into(),
            ));
        }
        ratio_sum += mu_i / w;
    }
    let r = ratio_sum / (nn - mu_sum);
    let mut out = Vec64::with_capacity(mean.len());
    for (&mu_i, &w) in mean.iter().zip(odds.iter()) {
        out.push(if mu_i == 0.0 { 0.0 } else { mu_i * (1.0 + 1.0 / (r * w)) });
    }
    Ok(FloatArray::from_vec64(out, None))
}

/// Recovers per-colour counts from target means, a known total `population`
/// and known odds, for the multivariate Wallenius distribution, by scalar
/// bisection on the common depletion factor θ.
pub fn multi_wallenius_nchypergeo_size_from_mean(
    mean: &[f64],
    odds: &[f64],
    population: u64,
) -> Result<FloatArray<f64>, KernelError> {
    if mean.is_empty() || mean.len() != odds.len() {
        return Err(KernelError::InvalidArguments(
            "multi_wallenius_nchypergeo_size_from_mean: mean and odds must match".into(),
        ));
    }
    let nn = population as f64;
    let mu_sum: f64 = mean.iter().sum();
    if mu_sum >= nn {
        return Err(KernelError::InvalidArguments(
            "multi_wallenius_nchypergeo_size_from_mean: means must sum below the population".into(),
        ));
    }
    for (&mu_i, &w) in mean.iter().zip(odds.iter()) {
        if !(w > 0.0) || mu_i < 0.0 {
            return Err(KernelError::InvalidArguments(
                "multi_wallenius_nchypergeo_size_from_mean: odds must be positive and means non-negative"
                    .into(),
            ));
        }
    }
    // Σ μ_i / (1 − θ^{ω_i}) is increasing in θ on (0, 1); find where it hits N
    let total_at = |th: f64| -> f64 {
        mean
            .iter()
            .zip(odds.iter())
            .map(|(&mu_i, &w)| if mu_i == 0.0 { 0.0 } else { mu_i / (1.0 - th.powf(w)) })
            .sum()
    };
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    for _ in 0..200 {
        let th = 0.5 * (lo + hi);
        if total_at(th) < nn {
            lo = th;
        } else {
            hi = th;
        }
    }
    let th = 0.5 * (lo + hi);
    let mut out = Vec64::with_capacity(mean.len());
    for (&mu_i, &w) in mean.iter().zip(odds.iter()) {
        out.push(if mu_i == 0.0 { 0.0 } else { mu_i / (1.0 - th.powf(w)) });
    }
    Ok(FloatArray::from_vec64(out, None))
}

// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

use minarrow::enums::error::KernelError;
use minarrow::{Bitmask, FloatArray, Vec64};

use super::engine::WalleniusNCHypergeometric;
use crate::kernels::distributions::univariate::common::std::{
    dense_univariate_kernel_f64_std_to, dense_univariate_kernel_u64_std_to,
    masked_univariate_kernel_f64_std_to, masked_univariate_kernel_u64_std_to,
};
use crate::kernels::distributions::univariate::common::PmfTable;
use crate::utils::has_nulls;

#[inline(always)]
fn clamp_index(ki: u64) -> i64 {
    ki.min(i64::MAX as u64) as i64
}

#[inline(always)]
fn normalised_prefix(table: &PmfTable) -> Vec64<f64> {
    let mut prefix = Vec64::with_capacity(table.values.len());
    let mut acc = 0.0;
    for &v in table.values.iter() {
        acc += v;
        prefix.push(acc / table.sum);
    }
    prefix
}

/// Wallenius' noncentral hypergeometric PMF (zero-allocation variant).
///
/// Writes directly to caller-provided output buffer. Each value evaluates
/// the Wallenius integral (or its large-n / loose-accuracy approximations).
#[inline(always)]
pub fn wallenius_nchypergeo_pmf_std_to(
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
    let mut dist = WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    if x.is_empty() {
        return Ok(());
    }

    let scalar_body = |ki: u64| -> f64 { dist.probability(clamp_index(ki)) };

    if !has_nulls(null_count, null_mask) {
        dense_univariate_kernel_u64_std_to(x, output, scalar_body);
        return Ok(());
    }

    let in_mask = null_mask.expect("wallenius_nchypergeo_pmf: null_count > 0 requires null_mask");
    let mut out_mask = in_mask.clone();
    masked_univariate_kernel_u64_std_to(x, in_mask, output, &mut out_mask, scalar_body);

    Ok(())
}

/// Wallenius' noncentral hypergeometric PMF: P(X = x).
#[inline(always)]
pub fn wallenius_nchypergeo_pmf_std(
    x: &[u64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    let len = x.len();
    if len == 0 {
        WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
        return Ok(FloatArray::from_slice(&[]));
    }

    let mut out = Vec64::with_capacity(len);
    unsafe { out.set_len(len) };

    wallenius_nchypergeo_pmf_std_to(
        x,
        population,
        success,
        draws,
        odds,
        accuracy,
        out.as_mut_slice(),
        null_mask,
        null_count,
    )?;

    Ok(FloatArray::from_vec64(out, null_mask.cloned()))
}

/// Wallenius' noncentral hypergeometric CDF (zero-allocation variant).
///
/// The whole batch shares one PMF table (exact draw recursion when the
/// problem size permits).
#[inline(always)]
pub fn wallenius_nchypergeo_cdf_std_to(
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
    let mut dist = WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    if x.is_empty() {
        return Ok(());
    }

    let span = (dist.x_max() - dist.x_min() + 1) as usize;
    let table = dist.make_table(span, None);
    let prefix = normalised_prefix(&table);

    let scalar_body = |ki: u64| -> f64 {
        let k = clamp_index(ki);
        if k < table.x_first {
            0.0
        } else if k >= table.x_last {
            1.0
        } else {
            prefix[(k - table.x_first) as usize]
        }
    };

    if !has_nulls(null_count, null_mask) {
        dense_univariate_kernel_u64_std_to(x, output, scalar_body);
        return Ok(());
    }

    let in_mask = null_mask.expect("wallenius_nchypergeo_cdf: null_count > 0 requires null_mask");
    let mut out_mask = in_mask.clone();
    masked_univariate_kernel_u64_std_to(x, in_mask, output, &mut out_mask, scalar_body);

    Ok(())
}

/// Wallenius' noncentral hypergeometric CDF: F(x) = Σ_{i≤x} P(i).
#[inline(always)]
pub fn wallenius_nchypergeo_cdf_std(
    x: &[u64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    let len = x.len();
    if len == 0 {
        WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
        return Ok(FloatArray::from_slice(&[]));
    }

    let mut out = Vec64::with_capacity(len);
    unsafe { out.set_len(len) };

    wallenius_nchypergeo_cdf_std_to(
        x,
        population,
        success,
        draws,
        odds,
        accuracy,
        out.as_mut_slice(),
        null_mask,
        null_count,
    )?;

    Ok(FloatArray::from_vec64(out, null_mask.cloned()))
}

/// Wallenius' noncentral hypergeometric quantile (zero-allocation variant).
///
/// Q(p) = smallest x such that CDF(x) ≥ p, with the same edge conventions as
/// the other discrete quantile kernels (`p == 0` → −1, `p ≈ 1` → upper
/// support bound, out-of-domain → NaN).
#[inline(always)]
pub fn wallenius_nchypergeo_quantile_std_to(
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
    let mut dist = WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
    if p.is_empty() {
        return Ok(());
    }

    let span = (dist.x_max() - dist.x_min() + 1) as usize;
    let table = dist.make_table(span, None);
    let prefix = normalised_prefix(&table);
    let x_max = dist.x_max();

    let compute_quantile = |pi: f64| -> f64 {
        if !pi.is_finite() || pi < 0.0 || pi > 1.0 + 1e-14 {
            return f64::NAN;
        }
        if pi == 0.0 {
            return -1.0;
        }
        if pi >= 1.0 - 1e-14 {
            return x_max as f64;
        }
        for (i, &c) in prefix.iter().enumerate() {
            if c >= pi {
                return (table.x_first + i as i64) as f64;
            }
        }
        table.x_last as f64
    };

    if !has_nulls(null_count, null_mask) {
        dense_univariate_kernel_f64_std_to(p, output, compute_quantile);
        return Ok(());
    }

    let in_mask =
        null_mask.expect("wallenius_nchypergeo_quantile: null_count > 0 requires null_mask");
    let mut out_mask = in_mask.clone();
    masked_univariate_kernel_f64_std_to(p, in_mask, output, &mut out_mask, compute_quantile);

    Ok(())
}

/// Wallenius' noncentral hypergeometric quantile: Q(p) = smallest x with
/// CDF(x) ≥ p.
#[inline(always)]
pub fn wallenius_nchypergeo_quantile_std(
    p: &[f64],
    population: u64,
    success: u64,
    draws: u64,
    odds: f64,
    accuracy: f64,
    null_mask: Option<&Bitmask>,
    null_count: Option<usize>,
) -> Result<FloatArray<f64>, KernelError> {
    let len = p.len();
    if len == 0 {
        WalleniusNCHypergeometric::new(population, success, draws, odds, accuracy)?;
        return Ok(FloatArray::from_slice(&[]));
    }

    let mut out = Vec64::with_capacity(len);
    unsafe { out.set_len(len) };

    wallenius_nchypergeo_quantile_std_to(
        p,
        population,
        success,
        draws,
        odds,
        accuracy,
        out.as_mut_slice(),
        null_mask,
        null_count,
    )?;

    Ok(FloatArray::from_vec64(out, null_mask.cloned()))
}

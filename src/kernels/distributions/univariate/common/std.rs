// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

use minarrow::Bitmask;

/// Dense kernel helper for u64 → f64 kernels (zero-allocation).
///
/// ### Null handling
/// - The dense path is taken when the caller supplied no mask, or supplied
///   a mask with a null count of `0`.
/// - `NaN`/`inf` values produced by the body are kept verbatim; they can
///   carry signal and nulling them would cost cycles on the hot path.
#[inline(always)]
pub fn dense_univariate_kernel_u64_std_to<FScalar>(
    x: &[u64],
    output: &mut [f64],
    mut scalar_body: FScalar,
) where
    FScalar: FnMut(u64) -> f64,
{
    for (idx, &ki) in x.iter().enumerate() {
        output[idx] = scalar_body(ki);
    }
}

/// Null-aware masked kernel helper for u64 → f64 kernels (zero-allocation).
///
/// Null lanes produce a NaN sentinel and a cleared bit in `out_mask`; valid
/// lanes run the scalar body.
#[inline(always)]
pub fn masked_univariate_kernel_u64_std_to<FScalar>(
    x: &[u64],
    mask: &Bitmask,
    output: &mut [f64],
    out_mask: &mut Bitmask,
    mut scalar_body: FScalar,
) where
    FScalar: FnMut(u64) -> f64,
{
    for (idx, &ki) in x.iter().enumerate() {
        if !unsafe { mask.get_unchecked(idx) } {
            output[idx] = f64::NAN;
            unsafe { out_mask.set_unchecked(idx, false) };
        } else {
            output[idx] = scalar_body(ki);
            unsafe { out_mask.set_unchecked(idx, true) };
        }
    }
}

/// Dense kernel helper for f64 → f64 kernels (zero-allocation).
#[inline(always)]
pub fn dense_univariate_kernel_f64_std_to<FScalar>(
    x: &[f64],
    output: &mut [f64],
    mut scalar_body: FScalar,
) where
    FScalar: FnMut(f64) -> f64,
{
    for (idx, &xi) in x.iter().enumerate() {
        output[idx] = scalar_body(xi);
    }
}

/// Null-aware masked kernel helper for f64 → f64 kernels (zero-allocation).
#[inline(always)]
pub fn masked_univariate_kernel_f64_std_to<FScalar>(
    x: &[f64],
    mask: &Bitmask,
    output: &mut [f64],
    out_mask: &mut Bitmask,
    mut scalar_body: FScalar,
) where
    FScalar: FnMut(f64) -> f64,
{
    for (idx, &xi) in x.iter().enumerate() {
        if !unsafe { mask.get_unchecked(idx) } {
            output[idx] = f64::NAN;
            unsafe { out_mask.set_unchecked(idx, false) };
        } else {
            output[idx] = scalar_body(xi);
            unsafe { out_mask.set_unchecked(idx, true) };
        }
    }
}

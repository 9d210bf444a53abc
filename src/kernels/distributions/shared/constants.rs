// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Mathematical Constants Module** - *High-Precision Constants*
//!
//! Hard-coded constants backing the distribution kernels: normalisation
//! factors, the Lanczos and Stirling series coefficients, and Acklam's
//! rational approximation tables for the inverse normal CDF.

/// The square root of 2π: √(2π) ≈ 2.506628274631000.
pub(crate) const SQRT_2PI: f64 = 2.5066282746310002_f64;

/// ½·ln(2π), the additive constant in Stirling's series.
pub(crate) const HALF_LOG_TWO_PI: f64 = 0.9189385332046727_f64;

/// Stirling series correction coefficients for `ln Γ(z)`:
/// `1/(12z) − 1/(360z³) + 1/(1260z⁵) − 1/(1680z⁷)`.
pub(crate) const STIRLING_C1: f64 = 1.0 / 12.0;
pub(crate) const STIRLING_C3: f64 = -1.0 / 360.0;
pub(crate) const STIRLING_C5: f64 = 1.0 / 1260.0;
pub(crate) const STIRLING_C7: f64 = -1.0 / 1680.0;

/// Lanczos approximation coefficients (g = 7, n = 9) for `ln Γ(x)`.
///
/// Standard coefficient set delivering near machine precision for x ≥ 0.5,
/// combined with the reflection formula below that threshold.
pub(crate) const COF: [f64; 9] = [
    0.99999999999980993,
    676.5203681218851,
    -1259.1392167224028,
    771.32342877765313,
    -176.61502916214059,
    12.507343278686905,
    -0.13857109526572012,
    9.9843695780195716e-6,
    1.5056327351493116e-7,
];

/// Acklam's inverse normal CDF approximation coefficients (central region
/// numerator polynomial).
pub(crate) const A: [f64; 6] = [
    -3.969683028665376e+01,
    2.209460984245205e+02,
    -2.759285104469687e+02,
    1.383577518672690e+02,
    -3.066479806614716e+01,
    2.506628277459239e+00,
];

/// Acklam's inverse normal CDF approximation coefficients (central region
/// denominator polynomial).
pub(crate) const B: [f64; 5] = [
    -5.447609879822406e+01,
    1.615858368580409e+02,
    -1.556989798598866e+02,
    6.680131188771972e+01,
    -1.328068155288572e+01,
];

/// Acklam's inverse normal CDF approximation coefficients (tail region
/// numerator polynomial).
pub(crate) const C: [f64; 6] = [
    -7.784894002430293e-03,
    -3.223964580411365e-01,
    -2.400758277161838e+00,
    -2.549732539343734e+00,
    4.374664141464968e+00,
    2.938163982698783e+00,
];

/// Acklam's inverse normal CDF approximation coefficients (tail region
/// denominator polynomial).
pub(crate) const D: [f64; 4] = [
    7.784695709041462e-03,
    3.224671290700398e-01,
    2.445134137142996e+00,
    3.754408661907416e+00,
];

/// Break-point between Acklam's central and tail approximations (≈ 2σ).
pub(crate) const P_LOW: f64 = 0.02425;

/// 12-point Gauss–Legendre nodes on [-1, 1].
pub(crate) const GL12_NODES: [f64; 12] = [
    -0.9815606342467192,
    -0.9041172563704749,
    -0.7699026741943047,
    -0.5873179542866175,
    -0.3678314989981802,
    -0.1252334085114689,
    0.1252334085114689,
    0.3678314989981802,
    0.5873179542866175,
    0.7699026741943047,
    0.9041172563704749,
    0.9815606342467192,
];

/// 12-point Gauss–Legendre weights matching [`GL12_NODES`].
pub(crate) const GL12_WEIGHTS: [f64; 12] = [
    0.0471753363865118,
    0.1069393259953184,
    0.1600783285433462,
    0.2031674267230659,
    0.2334925365383548,
    0.2491470458134028,
    0.2491470458134028,
    0.2334925365383548,
    0.2031674267230659,
    0.1600783285433462,
    0.1069393259953184,
    0.0471753363865118,
];

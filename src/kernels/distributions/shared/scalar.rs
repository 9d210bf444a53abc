// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Scalar Distribution Utilities** - *Special Functions and Log-Space Primitives*
//!
//! Scalar building blocks shared by every distribution kernel: the
//! process-wide log-factorial cache, `ln Γ`, log binomial coefficients,
//! falling factorials, the regularised incomplete gamma (backing the normal
//! CDF), and Acklam's inverse normal approximation.

use std::sync::OnceLock;

use crate::config::LN_FAC_TABLE_LEN;
use crate::kernels::distributions::shared::constants::*;

/// Natural log of the absolute value of the Gamma function, ln|Γ(x)|.
///
/// * Lanczos approximation (g = 7, n = 9) for x ≥ 0.5.
/// * Reflection formula for x < 0.5 using `ln(|sin(πx)|)`.
/// * Poles at non-positive integers return **+∞**.
/// * Propagates NaN.
#[inline(always)]
pub fn ln_gamma(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x.is_infinite() && x.is_sign_positive() {
        return f64::INFINITY;
    }
    // Poles: Γ(x) has simple poles at 0, −1, −2, …  ⇒  ln|Γ| → +∞
    if x <= 0.0 && (x.fract().abs() < 1e-14) {
        return f64::INFINITY;
    }
    if x < 0.5 {
        return std::f64::consts::PI.ln()
            - (std::f64::consts::PI * x).sin().abs().ln()
            - ln_gamma(1.0 - x);
    }
    let z = x - 1.0; // shift to minimise cancellation
    let mut a = COF[0];
    for (i, &c) in COF.iter().enumerate().skip(1) {
        a += c / (z + i as f64);
    }
    let t = z + 7.5; // g + ½  with g = 7
    HALF_LOG_TWO_PI + (z + 0.5) * t.ln() - t + a.ln()
}

fn ln_fac_table() -> &'static [f64; LN_FAC_TABLE_LEN] {
    static TABLE: OnceLock<[f64; LN_FAC_TABLE_LEN]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [0.0_f64; LN_FAC_TABLE_LEN];
        let mut acc = 0.0_f64;
        for (k, slot) in t.iter_mut().enumerate().skip(1) {
            acc += (k as f64).ln();
            *slot = acc;
        }
        t
    })
}

/// `ln(k!)` with relative error below 1e-13.
///
/// Table lookup for `k < LN_FAC_TABLE_LEN`; Stirling's series applied to
/// `Γ(k+1)` above that. The table is filled once per process and is
/// immutable afterwards, so concurrent readers need no synchronisation.
#[inline(always)]
pub fn ln_factorial(k: u64) -> f64 {
    if (k as usize) < LN_FAC_TABLE_LEN {
        return ln_fac_table()[k as usize];
    }
    let z = k as f64 + 1.0;
    let r = 1.0 / z;
    let r2 = r * r;
    let correction = r * (STIRLING_C1 + r2 * (STIRLING_C3 + r2 * (STIRLING_C5 + r2 * STIRLING_C7)));
    (z - 0.5) * z.ln() - z + HALF_LOG_TWO_PI + correction
}

/// Logarithmic binomial coefficient `ln C(n, k)` for integer arguments.
///
/// Returns `-inf` when `k > n` (an impossible combination has zero weight).
#[inline(always)]
pub fn ln_choose(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// Log falling factorial `ln(Γ(a+1) / Γ(a−dx+1))`.
///
/// Integer arguments take the exact log-factorial path; anything else goes
/// through `ln Γ`.
#[inline(always)]
pub fn falling_factorial_ln(a: f64, dx: f64) -> f64 {
    if a >= 0.0
        && dx >= 0.0
        && dx <= a
        && a.fract() == 0.0
        && dx.fract() == 0.0
        && a <= u64::MAX as f64
    {
        return ln_factorial(a as u64) - ln_factorial((a - dx) as u64);
    }
    ln_gamma(a + 1.0) - ln_gamma(a - dx + 1.0)
}

/// Regularised lower incomplete gamma P(a, x).
///
/// Series representation for `x < a + 1`, Lentz's continued fraction
/// otherwise. Edge cases follow the usual conventions (`a == 0` → 1 for
/// x ≥ 0, `x == 0` → 0 for a > 0, negative arguments → NaN).
#[inline(always)]
pub fn reg_lower_gamma(a: f64, x: f64) -> f64 {
    if !(a.is_finite() && x.is_finite()) {
        return f64::NAN;
    }
    if x < 0.0 || a < 0.0 {
        return f64::NAN;
    }
    if a == 0.0 {
        return 1.0;
    }
    if x == 0.0 {
        return 0.0;
    }

    if x < a + 1.0 {
        // Series representation
        let mut ap = a;
        let mut sum = 1.0 / a;
        let mut del = sum;
        for _ in 0..200 {
            ap += 1.0;
            del *= x / ap;
            sum += del;
            if del.abs() < sum.abs() * 1e-15 {
                break;
            }
        }
        (-x + a * x.ln() - ln_gamma(a)).exp() * sum
    } else {
        // Continued fraction (Lentz's method)
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / f64::MIN_POSITIVE;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..200 {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < 1e-30 {
                d = 1e-30;
            }
            c = b + an / c;
            if c.abs() < 1e-30 {
                c = 1e-30;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < 1e-15 {
                break;
            }
        }
        1.0 - (-x + a * x.ln() - ln_gamma(a)).exp() * h
    }
}

/// Standard normal CDF Φ(z) through the incomplete gamma:
/// `Φ(z) = ½·Q(½, z²/2)` for z < 0 and `1 − ½·Q(½, z²/2)` for z ≥ 0.
#[inline(always)]
pub fn std_normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    let q = 0.5 * (1.0 - reg_lower_gamma(0.5, 0.5 * z * z));
    if z < 0.0 { q } else { 1.0 - q }
}

/// Inverse CDF Φ⁻¹(p) for the standard normal distribution.
///
/// Acklam's minimax rational approximation: central polynomial for
/// `P_LOW < p < 1 − P_LOW`, tail polynomial outside. Out-of-domain inputs
/// return NaN; the exact endpoints map to ∓∞.
#[inline(always)]
pub fn inv_std_normal(p: f64) -> f64 {
    if !(p >= 0.0 && p <= 1.0) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    let (q, sign) = if p < 0.5 { (p, 1.0) } else { (1.0 - p, -1.0) };
    let x = if q < P_LOW {
        let t = (-2.0 * q.ln()).sqrt();
        (((((C[0] * t + C[1]) * t + C[2]) * t + C[3]) * t + C[4]) * t + C[5])
            / ((((D[0] * t + D[1]) * t + D[2]) * t + D[3]) * t + 1.0)
    } else {
        let t = q - 0.5;
        let r = t * t;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * t
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    };
    sign * x
}

/// Number of standard deviations beyond which the standard normal upper
/// tail mass falls below `accuracy`. Used to size PMF tables.
#[inline(always)]
pub fn normal_tail_sd(accuracy: f64) -> f64 {
    let a = accuracy.clamp(1e-300, 0.5);
    -inv_std_normal(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} vs {} (tol {})", a, b, tol);
    }

    #[test]
    fn test_ln_gamma() {
        close(ln_gamma(1.0), 0.0, 1e-14);
        close(ln_gamma(5.0), 3.1780538303479458, 1e-14);
        close(ln_gamma(0.5), 0.5723649429247001, 1e-13);
        assert!(ln_gamma(0.0).is_infinite());
        assert!(ln_gamma(f64::NAN).is_nan());
    }

    #[test]
    fn test_ln_factorial_table_region() {
        close(ln_factorial(0), 0.0, 1e-15);
        close(ln_factorial(1), 0.0, 1e-15);
        // ln 5! = ln 120
        close(ln_factorial(5), 120.0_f64.ln(), 1e-13);
        // ln 170! against lgamma
        close(ln_factorial(170), ln_gamma(171.0), 1e-10);
    }

    #[test]
    fn test_ln_factorial_stirling_region() {
        // continuity across the table/Stirling boundary
        for k in [1022_u64, 1023, 1024, 1025, 5000, 1_000_000] {
            let via_gamma = ln_gamma(k as f64 + 1.0);
            let rel = (ln_factorial(k) - via_gamma).abs() / via_gamma;
            assert!(rel < 1e-13, "k={}: rel err {}", k, rel);
        }
    }

    #[test]
    fn test_ln_choose() {
        // ln C(5,2) = ln 10
        close(ln_choose(5, 2), 2.302585092994046, 1e-14);
        assert!(ln_choose(2, 3).is_infinite() && ln_choose(2, 3) < 0.0);
        close(ln_choose(100, 3), ln_choose(100, 97), 1e-12);
        close(ln_choose(1000, 10), 53.927997037888275, 1e-10);
        close(ln_choose(10, 0), 0.0, 1e-14);
        close(ln_choose(10, 10), 0.0, 1e-14);
    }

    #[test]
    fn test_falling_factorial_ln() {
        // Γ(6)/Γ(3) = 120/2 = 60
        close(falling_factorial_ln(5.0, 3.0), 60.0_f64.ln(), 1e-12);
        // non-integer path against lgamma
        close(
            falling_factorial_ln(5.5, 2.25),
            ln_gamma(6.5) - ln_gamma(4.25),
            1e-12,
        );
    }

    #[test]
    fn test_std_normal_cdf() {
        close(std_normal_cdf(0.0), 0.5, 1e-14);
        close(std_normal_cdf(1.0), 0.8413447460685429, 1e-12);
        close(std_normal_cdf(-1.0), 0.15865525393145705, 1e-12);
        close(std_normal_cdf(3.0), 0.9986501019683699, 1e-12);
        // symmetry
        for z in [0.1, 0.7, 1.3, 2.9] {
            close(std_normal_cdf(z) + std_normal_cdf(-z), 1.0, 1e-13);
        }
    }

    #[test]
    fn test_inv_std_normal() {
        close(inv_std_normal(0.5), 0.0, 1e-14);
        close(inv_std_normal(0.975), 1.959963984540054, 1e-8);
        close(inv_std_normal(0.025), -1.959963984540054, 1e-8);
        assert!(inv_std_normal(0.0).is_infinite());
        assert!(inv_std_normal(-0.1).is_nan());
        // round trip through the CDF
        for p in [1e-6, 0.01, 0.3, 0.5, 0.9, 0.999] {
            let z = inv_std_normal(p);
            close(std_normal_cdf(z), p, 1e-8);
        }
    }

    #[test]
    fn test_normal_tail_sd() {
        // P(Z > 2.326) ≈ 0.01
        close(normal_tail_sd(0.01), 2.3263478740408408, 1e-6);
        assert!(normal_tail_sd(1e-10) > 6.0);
    }
}

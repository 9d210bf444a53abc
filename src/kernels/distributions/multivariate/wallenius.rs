// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! Multivariate Wallenius' noncentral hypergeometric engine.
//!
//! The PMF is `Π C(mᵢ, xᵢ) · ∫₀¹ Π (1 − t^{ωᵢ/d})^{xᵢ} dt` with
//! `d = Σ ωᵢ(mᵢ − xᵢ)`, evaluated through the same peak-anchored integral
//! routine as the univariate engine (which is the two-colour instance of
//! this formula). Approximate means come from the depletion-factor root
//! `Σ mᵢ(1 − θ^{ωᵢ}) = n`; exact moments enumerate the feasible lattice
//! the same way the Fisher engine does, with the integral evaluated at each
//! leaf.

use minarrow::enums::error::KernelError;
use minarrow::Vec64;
use rand::Rng;

use super::UrnReduction;
use crate::config::{MAX_COLORS, WALLENIUS_QUADRATURE_LIMIT};
use crate::kernels::distributions::shared::sampler::weighted_index;
use crate::kernels::distributions::shared::scalar::ln_choose;
use crate::kernels::distributions::univariate::fishers::FishersNCHypergeometric;
use crate::kernels::distributions::univariate::wallenius::{
    ln_wallenius_integral, ln_wallenius_integral_laplace, WalleniusNCHypergeometric,
};

/// Multivariate Wallenius' noncentral hypergeometric distribution
/// `MWNCHypergeo(m[0..c−1], odds[0..c−1], draws n)`.
pub struct MultiWalleniusNCHypergeometric {
    urn: UrnReduction,
    // enumeration state for exact moments
    xm: [i64; MAX_COLORS],
    remaining: [i64; MAX_COLORS],
    sx: [f64; MAX_COLORS],
    sxx: [f64; MAX_COLORS],
    sy: f64,
    mu_exact: [f64; MAX_COLORS],
    var_exact: [f64; MAX_COLORS],
    combinations: u64,
}

impl MultiWalleniusNCHypergeometric {
    /// Validates parameters and performs the colour reduction.
    pub fn new(m: &[u64], odds: &[f64], draws: u64, accuracy: f64) -> Result<Self, KernelError> {
        let urn = UrnReduction::new(m, odds, draws, accuracy, "multi_wallenius_nchypergeo")?;
        Ok(Self {
            urn,
            xm: [0; MAX_COLORS],
            remaining: [0; MAX_COLORS],
            sx: [0.0; MAX_COLORS],
            sxx: [0.0; MAX_COLORS],
            sy: 0.0,
            mu_exact: [0.0; MAX_COLORS],
            var_exact: [0.0; MAX_COLORS],
            combinations: 0,
        })
    }

    /// PMF core over used colours: combinatorial weight times the Wallenius
    /// integral.
    fn probability_reduced(&self, xu: &[i64; MAX_COLORS]) -> f64 {
        let used = self.urn.used;
        let mut d = 0.0;
        let mut ln_bico = 0.0;
        for i in 0..used {
            d += self.urn.odds[i] * (self.urn.m[i] - xu[i]) as f64;
            ln_bico += ln_choose(self.urn.m[i] as u64, xu[i] as u64);
        }
        if d <= 0.0 {
            return 1.0; // urn exhausted of weighted balls: outcome is forced
        }
        let mut terms = [(0.0_f64, 0.0_f64); MAX_COLORS];
        for i in 0..used {
            terms[i] = (self.urn.odds[i] / d, xu[i] as f64);
        }
        let ln_i = if self.urn.draws as u64 > WALLENIUS_QUADRATURE_LIMIT {
            ln_wallenius_integral_laplace(&terms[..used])
        } else {
            ln_wallenius_integral(&terms[..used], self.urn.accuracy)
        };
        (ln_bico + ln_i).exp().min(1.0)
    }

    /// Probability mass function P(X = x), `x` in the caller's colour
    /// order. Validation matches the Fisher engine: excluded-colour and
    /// out-of-bounds outcomes are soft zeros, a sum mismatch is an error.
    pub fn probability(&mut self, x: &[u64]) -> Result<f64, KernelError> {
        let xu = match self.urn.resolve_x(x, "multi_wallenius_nchypergeo")? {
            Some(xu) => xu,
            None => return Ok(0.0),
        };
        let used = self.urn.used;
        let n = self.urn.draws;
        let nu = self.urn.total_used;
        for i in 0..used {
            if xu[i] > self.urn.m[i] || xu[i] < n - nu + self.urn.m[i] {
                return Ok(0.0);
            }
        }
        if n == 0 || n == nu {
            return Ok(1.0);
        }
        if used < 3 {
            if used < 2 {
                return Ok(1.0);
            }
            let mut uni = WalleniusNCHypergeometric::new(
                nu as u64,
                self.urn.m[0] as u64,
                n as u64,
                self.urn.odds[0] / self.urn.odds[1],
                self.urn.accuracy,
            )?;
            return Ok(uni.probability(xu[0]));
        }
        if self.urn.all_odds_equal {
            // equal odds: identical to the central multivariate case
            let mut sx = n;
            let mut sm = nu;
            let mut p = 1.0;
            for i in 0..used - 1 {
                let mut uni = FishersNCHypergeometric::new(
                    sm as u64,
                    self.urn.m[i] as u64,
                    sx as u64,
                    1.0,
                    self.urn.accuracy,
                )?;
                p *= uni.probability(xu[i]);
                sx -= xu[i];
                sm -= self.urn.m[i];
            }
            return Ok(p);
        }
        Ok(self.probability_reduced(&xu))
    }

    /// Approximate per-colour means (caller's colour order) from the
    /// depletion-factor root `Σ mᵢ(1 − θ^{ωᵢ}) = n`, `θ ∈ (0, 1)`.
    pub fn mean(&self) -> Result<Vec64<f64>, KernelError> {
        let mut mu = [0.0; MAX_COLORS];
        self.mean1(&mut mu);
        Ok(self.urn.expand(&mu))
    }

    /// Approximate means for the used colours only.
    fn mean1(&self, mu: &mut [f64; MAX_COLORS]) {
        let used = self.urn.used;
        let n = self.urn.draws as f64;
        if self.urn.draws == self.urn.total_used {
            for i in 0..used {
                mu[i] = self.urn.m[i] as f64;
            }
            return;
        }
        if self.urn.draws == 0 {
            for v in mu.iter_mut().take(used) {
                *v = 0.0;
            }
            return;
        }
        // the left side is decreasing in theta: N_u at 0, 0 at 1
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        for _ in 0..100 {
            let th = 0.5 * (lo + hi);
            let mut v = 0.0;
            for i in 0..used {
                v += self.urn.m[i] as f64 * (1.0 - th.powf(self.urn.odds[i]));
            }
            if v > n {
                lo = th;
            } else {
                hi = th;
            }
        }
        let th = 0.5 * (lo + hi);
        for i in 0..used {
            mu[i] = self.urn.m[i] as f64 * (1.0 - th.powf(self.urn.odds[i]));
        }
    }

    /// Approximate per-colour variances (and means), caller's colour order.
    /// The same noncentral approximation form as the Fisher engine,
    /// evaluated at the Wallenius means; rough.
    pub fn variance(&self) -> Result<(Vec64<f64>, Vec64<f64>), KernelError> {
        let mut mu = [0.0; MAX_COLORS];
        self.mean1(&mut mu);
        let nu = self.urn.total_used as f64;
        let n = self.urn.draws as f64;
        let mut var = [0.0; MAX_COLORS];
        for i in 0..self.urn.used {
            let m = self.urn.m[i] as f64;
            let r1 = mu[i] * (m - mu[i]);
            let r2 = (n - mu[i]) * (mu[i] + nu - n - m);
            var[i] = if r1 <= 0.0 || r2 <= 0.0 {
                0.0
            } else {
                nu * r1 * r2 / ((nu - 1.0) * (m * r2 + (nu - m) * r1))
            };
        }
        Ok((self.urn.expand(&var), self.urn.expand(&mu)))
    }

    /// Exact per-colour means and variances by enumerating every feasible
    /// outcome with non-negligible probability (the integral is evaluated
    /// at each lattice point, so this is considerably more expensive than
    /// the Fisher equivalent); also returns the number of combinations
    /// visited.
    pub fn moments(&mut self) -> Result<(Vec64<f64>, Vec64<f64>, u64), KernelError> {
        if self.combinations == 0 {
            self.sum_of_all()?;
        }
        Ok((
            self.urn.expand(&self.mu_exact),
            self.urn.expand(&self.var_exact),
            self.combinations,
        ))
    }

    fn sum_of_all(&mut self) -> Result<(), KernelError> {
        let used = self.urn.used;
        let mut mu = [0.0; MAX_COLORS];
        self.mean1(&mut mu);

        let mut msum = 0i64;
        for i in 0..used {
            self.xm[i] = (mu[i] + 0.4999999).floor() as i64;
            msum += self.xm[i];
        }
        let mut diff = msum - self.urn.draws;
        let mut i = 0usize;
        while diff < 0 {
            if self.xm[i % used] < self.urn.m[i % used] {
                self.xm[i % used] += 1;
                diff += 1;
            }
            i += 1;
        }
        let mut i = 0usize;
        while diff > 0 {
            if self.xm[i % used] > 0 {
                self.xm[i % used] -= 1;
                diff -= 1;
            }
            i += 1;
        }

        let mut msum = 0i64;
        for i in (0..used).rev() {
            self.remaining[i] = msum;
            msum += self.urn.m[i];
        }
        for i in 0..used {
            self.sx[i] = 0.0;
            self.sxx[i] = 0.0;
        }
        self.sy = 0.0;
        self.combinations = 0;

        let mut xi = [0i64; MAX_COLORS];
        self.loop_colour(self.urn.draws, 0, &mut xi);
        if !(self.sy > 0.0) {
            return Err(KernelError::InvalidArguments(
                "multi_wallenius_nchypergeo: probability sum vanished".into(),
            ));
        }
        let inv = 1.0 / self.sy;
        for i in 0..used {
            self.mu_exact[i] = self.sx[i] * inv;
            self.var_exact[i] =
                (self.sxx[i] * inv - self.mu_exact[i] * self.mu_exact[i]).max(0.0);
        }
        Ok(())
    }

    fn loop_colour(&mut self, n: i64, c: usize, xi: &mut [i64; MAX_COLORS]) -> f64 {
        if c < self.urn.used - 1 {
            let x_lo = (n - self.remaining[c]).max(0);
            let x_hi = self.urn.m[c].min(n);
            let x0 = self.xm[c].clamp(x_lo, x_hi);
            let mut sum = 0.0;
            let mut s2 = 0.0;
            let mut x = x0;
            while x <= x_hi {
                xi[c] = x;
                let s1 = self.loop_colour(n - x, c + 1, xi);
                sum += s1;
                if s1 < self.urn.accuracy && s1 < s2 {
                    break;
                }
                s2 = s1;
                x += 1;
            }
            let mut x = x0 - 1;
            while x >= x_lo {
                xi[c] = x;
                let s1 = self.loop_colour(n - x, c + 1, xi);
                sum += s1;
                if s1 < self.urn.accuracy && s1 < s2 {
                    break;
                }
                s2 = s1;
                x -= 1;
            }
            sum
        } else {
            if n > self.urn.m[c] {
                return 0.0;
            }
            xi[c] = n;
            let s1 = self.probability_reduced(xi);
            for i in 0..self.urn.used {
                self.sx[i] += s1 * xi[i] as f64;
                self.sxx[i] += s1 * (xi[i] * xi[i]) as f64;
            }
            self.sy += s1;
            self.combinations += 1;
            s1
        }
    }

    /// Draws one outcome vector by urn emulation: `n` successive draws,
    /// each picking colour `i` with probability proportional to
    /// `ωᵢ · (residual count)ᵢ`. Exact by the distribution's definition.
    pub fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec64<f64> {
        let used = self.urn.used;
        let mut residual = [0i64; MAX_COLORS];
        residual[..used].copy_from_slice(&self.urn.m[..used]);
        let mut xu = [0.0_f64; MAX_COLORS];
        for _ in 0..self.urn.draws {
            let mut total = 0.0;
            let mut weights = [0.0_f64; MAX_COLORS];
            for i in 0..used {
                weights[i] = self.urn.odds[i] * residual[i] as f64;
                total += weights[i];
            }
            let pick = weighted_index(rng, &weights[..used], total);
            xu[pick] += 1.0;
            residual[pick] -= 1;
        }
        self.urn.expand(&xu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Expected values generated by the exact vector-state draw recursion.

    const M: [u64; 3] = [20, 30, 20];
    const ODDS: [f64; 3] = [1.0, 2.5, 1.8];
    const N: u64 = 24;

    #[test]
    fn probability_reference_values() {
        let mut d = MultiWalleniusNCHypergeometric::new(&M, &ODDS, N, 1e-9).unwrap();
        let p1 = d.probability(&[8, 10, 6]).unwrap();
        assert!((p1 - 0.0035909388932382985).abs() < 1e-9, "got {}", p1);
        let p2 = d.probability(&[4, 12, 8]).unwrap();
        assert!((p2 - 0.044211448219152509).abs() < 1e-8, "got {}", p2);
    }

    #[test]
    fn four_colour_reference_value() {
        let m = [10u64, 12, 8, 6];
        let odds = [0.5, 1.0, 2.0, 4.0];
        let mut d = MultiWalleniusNCHypergeometric::new(&m, &odds, 15, 1e-9).unwrap();
        let p = d.probability(&[2, 4, 5, 4]).unwrap();
        assert!((p - 0.031184758714158229).abs() < 1e-8, "got {}", p);
    }

    #[test]
    fn equal_odds_matches_central() {
        let m = [5u64, 10, 15];
        let odds = [2.0, 2.0, 2.0];
        let mut d = MultiWalleniusNCHypergeometric::new(&m, &odds, 12, 1e-9).unwrap();
        let p = d.probability(&[2, 4, 6]).unwrap();
        assert!((p - 0.12151818827428353).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn two_colour_delegates_to_univariate() {
        let m = [25u64, 32];
        let odds = [2.5, 1.0];
        let mut d = MultiWalleniusNCHypergeometric::new(&m, &odds, 20, 1e-9).unwrap();
        let p = d.probability(&[12, 8]).unwrap();
        assert!((p - 0.21833874748010612).abs() < 1e-8, "got {}", p);
    }

    #[test]
    fn approximate_mean_close_to_exact() {
        let d = MultiWalleniusNCHypergeometric::new(&M, &ODDS, N, 1e-8).unwrap();
        let mu = d.mean().unwrap();
        let approx_exp = [4.107744026176814, 13.114646994900196, 6.777608978923];
        for (got, exp) in mu.iter().zip(approx_exp.iter()) {
            assert!((got - exp).abs() < 1e-8, "{} vs {}", got, exp);
        }
        let total: f64 = mu.iter().sum();
        assert!((total - N as f64).abs() < 1e-9);
    }

    #[test]
    fn exact_moments_reference() {
        let mut d = MultiWalleniusNCHypergeometric::new(&M, &ODDS, N, 1e-9).unwrap();
        let (mean, var, combinations) = d.moments().unwrap();
        let mean_exp = [4.094810309138086, 13.129361193993, 6.775828496868912];
        let var_exp = [2.5937138885845386, 3.8473982549871835, 3.2003477608788273];
        for (got, exp) in mean.iter().zip(mean_exp.iter()) {
            assert!((got - exp).abs() < 1e-4, "mean {} vs {}", got, exp);
        }
        for (got, exp) in var.iter().zip(var_exp.iter()) {
            assert!((got - exp).abs() < 1e-3, "var {} vs {}", got, exp);
        }
        assert!(combinations > 0);
    }

    #[test]
    fn sum_mismatch_is_error_and_bounds_are_soft() {
        let mut d = MultiWalleniusNCHypergeometric::new(&M, &ODDS, N, 1e-8).unwrap();
        assert!(d.probability(&[8, 10, 5]).is_err());
        assert_eq!(d.probability(&[21, 2, 1]).unwrap(), 0.0);
    }

    #[test]
    fn sample_rows_are_feasible() {
        let mut d = MultiWalleniusNCHypergeometric::new(&M, &ODDS, N, 1e-6).unwrap();
        let mut rng = rand::rng();
        for _ in 0..200 {
            let row = d.sample(&mut rng);
            let total: f64 = row.iter().sum();
            assert_eq!(total, N as f64);
            for (v, cap) in row.iter().zip(M.iter()) {
                assert!(*v >= 0.0 && *v <= *cap as f64);
            }
        }
    }
}

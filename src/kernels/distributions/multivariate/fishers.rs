// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! Multivariate Fisher's noncentral hypergeometric engine.
//!
//! The proportional function over the feasible lattice is
//! `g(x) = Π C(mᵢ, xᵢ)·ωᵢ^{xᵢ}`; the PMF is `g(x)/Σg`. The normalisation
//! sum is accumulated by `sum_of_all`: a depth-first recursion over colours,
//! anchored at the rounded approximate mean, walking outward per colour and
//! pruning a direction once two consecutive subtree sums are negligible and
//! decreasing. Exact means and variances fall out of the same pass. The
//! recursion depth equals the number of used colours (≤ `MAX_COLORS`), and
//! all working buffers live in fixed arrays on the instance.

use minarrow::enums::error::KernelError;
use minarrow::Vec64;
use rand::Rng;

use super::UrnReduction;
use crate::config::{MAX_COLORS, MEAN_ITERATION_LIMIT};
use crate::kernels::distributions::shared::scalar::ln_factorial;
use crate::kernels::distributions::univariate::fishers::FishersNCHypergeometric;

/// Multivariate Fisher's noncentral hypergeometric distribution
/// `MFNCHypergeo(m[0..c−1], odds[0..c−1], draws n)`.
pub struct MultiFishersNCHypergeometric {
    urn: UrnReduction,
    log_odds: [f64; MAX_COLORS],
    m_fac: f64, // Σ ln mᵢ! over used colours
    scale: f64,
    rsum: f64,
    // enumeration state
    xm: [i64; MAX_COLORS],        // anchor (rounded approximate mean)
    remaining: [i64; MAX_COLORS], // suffix sums of m
    sx: [f64; MAX_COLORS],
    sxx: [f64; MAX_COLORS],
    mu_exact: [f64; MAX_COLORS],
    var_exact: [f64; MAX_COLORS],
    combinations: u64, // outcome combinations visited; 0 = not summed yet
}

impl MultiFishersNCHypergeometric {
    /// Validates parameters and performs the colour reduction.
    pub fn new(m: &[u64], odds: &[f64], draws: u64, accuracy: f64) -> Result<Self, KernelError> {
        let urn = UrnReduction::new(m, odds, draws, accuracy, "multi_fishers_nchypergeo")?;
        let mut log_odds = [0.0; MAX_COLORS];
        let mut m_fac = 0.0;
        for i in 0..urn.used {
            log_odds[i] = urn.odds[i].ln();
            m_fac += ln_factorial(urn.m[i] as u64);
        }
        Ok(Self {
            urn,
            log_odds,
            m_fac,
            scale: 0.0,
            rsum: 0.0,
            xm: [0; MAX_COLORS],
            remaining: [0; MAX_COLORS],
            sx: [0.0; MAX_COLORS],
            sxx: [0.0; MAX_COLORS],
            mu_exact: [0.0; MAX_COLORS],
            var_exact: [0.0; MAX_COLORS],
            combinations: 0,
        })
    }

    /// Natural log of the proportional function over used colours, minus
    /// the scale factor.
    fn lng(&self, x: &[i64; MAX_COLORS]) -> f64 {
        let mut y = 0.0;
        for i in 0..self.urn.used {
            y += x[i] as f64 * self.log_odds[i]
                - ln_factorial(x[i] as u64)
                - ln_factorial((self.urn.m[i] - x[i]) as u64);
        }
        self.m_fac + y - self.scale
    }

    /// Probability mass function P(X = x), `x` in the caller's colour
    /// order.
    ///
    /// A nonzero count at an excluded colour or an out-of-bounds count is a
    /// soft zero; a count vector that does not sum to `draws` is an error.
    /// The first general-case call enumerates the feasible lattice to
    /// normalise (this can be slow for many colours with strict accuracy).
    pub fn probability(&mut self, x: &[u64]) -> Result<f64, KernelError> {
        let xu = match self.urn.resolve_x(x, "multi_fishers_nchypergeo")? {
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
            let mut uni = FishersNCHypergeometric::new(
                nu as u64,
                self.urn.m[0] as u64,
                n as u64,
                self.urn.odds[0] / self.urn.odds[1],
                self.urn.accuracy,
            )?;
            return Ok(uni.probability(xu[0]));
        }
        if self.urn.all_odds_equal {
            // multivariate central hypergeometric: a product of univariate
            // central draws with decrementing residual totals
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
        if self.combinations == 0 {
            self.sum_of_all()?;
        }
        Ok(self.lng(&xu).exp() * self.rsum)
    }

    /// Approximate per-colour means (in the caller's colour order) by the
    /// Cornfield fixed point.
    pub fn mean(&self) -> Result<Vec64<f64>, KernelError> {
        let mut mu = [0.0; MAX_COLORS];
        self.mean1(&mut mu)?;
        Ok(self.urn.expand(&mu))
    }

    /// Approximate means for the used colours only.
    ///
    /// The fixed point iterates `r ← r·n·(Nu−q)/(q·(Nu−n))` with
    /// `q(r) = Σ mᵢ·rωᵢ/(rωᵢ+1)`; exceeding the iteration cap is a
    /// convergence error.
    fn mean1(&self, mu: &mut [f64; MAX_COLORS]) -> Result<(), KernelError> {
        let used = self.urn.used;
        let n = self.urn.draws as f64;
        let nu = self.urn.total_used as f64;
        if used < 3 {
            if used == 1 {
                mu[0] = n;
            }
            if used == 2 {
                let uni = FishersNCHypergeometric::new(
                    self.urn.total_used as u64,
                    self.urn.m[0] as u64,
                    self.urn.draws as u64,
                    self.urn.odds[0] / self.urn.odds[1],
                    self.urn.accuracy,
                )?;
                mu[0] = uni.mean();
                mu[1] = n - mu[0];
            }
            return Ok(());
        }
        if self.urn.draws == self.urn.total_used {
            // taking all balls
            for i in 0..used {
                mu[i] = self.urn.m[i] as f64;
            }
            return Ok(());
        }
        let mut w = 0.0;
        for i in 0..used {
            w += self.urn.m[i] as f64 * self.urn.odds[i];
        }
        let mut r = n * nu / ((nu - n) * w);
        if r > 0.0 {
            let mut iterations = 0;
            loop {
                let r1 = r;
                let mut q = 0.0;
                for i in 0..used {
                    q += self.urn.m[i] as f64 * r * self.urn.odds[i]
                        / (r * self.urn.odds[i] + 1.0);
                }
                r *= n * (nu - q) / (q * (nu - n));
                if (r - r1).abs() <= 1e-5 {
                    break;
                }
                iterations += 1;
                if iterations > MEAN_ITERATION_LIMIT {
                    return Err(KernelError::InvalidArguments(
                        "multi_fishers_nchypergeo: mean iteration did not converge".into(),
                    ));
                }
            }
        }
        for i in 0..used {
            mu[i] = self.urn.m[i] as f64 * r * self.urn.odds[i] / (r * self.urn.odds[i] + 1.0);
        }
        Ok(())
    }

    /// Approximate per-colour variances (and means), in the caller's colour
    /// order. Accuracy is modest; use [`moments`](Self::moments) for exact
    /// values.
    pub fn variance(&self) -> Result<(Vec64<f64>, Vec64<f64>), KernelError> {
        let mut mu = [0.0; MAX_COLORS];
        self.mean1(&mut mu)?;
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
    /// outcome with non-negligible probability; also returns the number of
    /// combinations visited.
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

    /// Sums the proportional function over all feasible outcome vectors
    /// with probability above the accuracy threshold, producing `rsum` and
    /// the exact moments as by-products.
    fn sum_of_all(&mut self) -> Result<(), KernelError> {
        let used = self.urn.used;
        let mut mu = [0.0; MAX_COLORS];
        self.mean1(&mut mu)?;

        // round the anchor to integers and repair the sum to n
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

        // anchor the scale so g(anchor) == 1
        self.scale = 0.0;
        self.scale = self.lng(&self.xm);

        let mut msum = 0i64;
        for i in (0..used).rev() {
            self.remaining[i] = msum;
            msum += self.urn.m[i];
        }
        for i in 0..used {
            self.sx[i] = 0.0;
            self.sxx[i] = 0.0;
        }
        self.combinations = 0;

        let mut xi = [0i64; MAX_COLORS];
        let total = self.loop_colour(self.urn.draws, 0, &mut xi);
        if !(total > 0.0) {
            return Err(KernelError::InvalidArguments(
                "multi_fishers_nchypergeo: normalisation sum vanished".into(),
            ));
        }
        self.rsum = 1.0 / total;
        for i in 0..used {
            self.var_exact[i] =
                (self.sxx[i] * self.rsum - self.sx[i] * self.sx[i] * self.rsum * self.rsum)
                    .max(0.0);
            self.mu_exact[i] = self.sx[i] * self.rsum;
        }
        Ok(())
    }

    /// Depth-first walk over colour `c`'s feasible values, anchored at the
    /// approximate mean; each direction stops when two consecutive subtree
    /// sums are below the accuracy threshold and decreasing.
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
            // last colour is forced to the remainder
            if n > self.urn.m[c] {
                return 0.0;
            }
            xi[c] = n;
            let s1 = self.lng(xi).exp();
            for i in 0..self.urn.used {
                self.sx[i] += s1 * xi[i] as f64;
                self.sxx[i] += s1 * (xi[i] * xi[i]) as f64;
            }
            self.combinations += 1;
            s1
        }
    }

    /// Draws one outcome vector by conditional decomposition: each colour is
    /// drawn from the univariate Fisher marginal against the pooled
    /// (count-weighted mean) odds of the colours still in the urn, then
    /// subtracted.
    ///
    /// The pooled-odds marginal is exact only when the remaining odds are
    /// all equal; otherwise the sampler targets the distribution
    /// approximately.
    pub fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec64<f64>, KernelError> {
        let used = self.urn.used;
        let mut xu = [0.0_f64; MAX_COLORS];
        let mut n_left = self.urn.draws;
        let mut nu_left = self.urn.total_used;
        for i in 0..used {
            if i == used - 1 {
                xu[i] = n_left as f64;
                break;
            }
            if n_left > 0 {
                let mut wsum = 0.0;
                let mut msum = 0i64;
                for j in i + 1..used {
                    wsum += self.urn.m[j] as f64 * self.urn.odds[j];
                    msum += self.urn.m[j];
                }
                let pooled = if msum > 0 { wsum / msum as f64 } else { 1.0 };
                let mut uni = FishersNCHypergeometric::new(
                    nu_left as u64,
                    self.urn.m[i] as u64,
                    n_left as u64,
                    self.urn.odds[i] / pooled,
                    self.urn.accuracy,
                )?;
                let x = uni.sample(rng);
                xu[i] = x as f64;
                n_left -= x;
            }
            nu_left -= self.urn.m[i];
        }
        Ok(self.urn.expand(&xu))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Expected values generated by exact lattice enumeration in log space.

    const M: [u64; 3] = [20, 30, 20];
    const ODDS: [f64; 3] = [1.0, 2.5, 1.8];
    const N: u64 = 24;

    #[test]
    fn probability_reference_values() {
        let mut d = MultiFishersNCHypergeometric::new(&M, &ODDS, N, 1e-12).unwrap();
        let p1 = d.probability(&[8, 10, 6]).unwrap();
        assert!((p1 - 0.006376339848374186).abs() < 1e-10, "got {}", p1);
        let p2 = d.probability(&[4, 12, 8]).unwrap();
        assert!((p2 - 0.046463953724658502).abs() < 1e-9, "got {}", p2);
        let p3 = d.probability(&[2, 14, 8]).unwrap();
        assert!((p3 - 0.019147233677743885).abs() < 1e-9, "got {}", p3);
    }

    #[test]
    fn four_colour_reference_values() {
        let m = [10u64, 12, 8, 6];
        let odds = [0.5, 1.0, 2.0, 4.0];
        let mut d = MultiFishersNCHypergeometric::new(&m, &odds, 15, 1e-12).unwrap();
        let p = d.probability(&[2, 4, 5, 4]).unwrap();
        assert!((p - 0.038878562423501274).abs() < 1e-9, "got {}", p);
        let p = d.probability(&[3, 5, 4, 3]).unwrap();
        assert!((p - 0.01727936107711164).abs() < 1e-9, "got {}", p);
    }

    #[test]
    fn sum_mismatch_is_error_and_bounds_are_soft() {
        let mut d = MultiFishersNCHypergeometric::new(&M, &ODDS, N, 1e-8).unwrap();
        assert!(d.probability(&[8, 10, 5]).is_err());
        // within the sum but outside a colour bound
        assert_eq!(d.probability(&[21, 2, 1]).unwrap(), 0.0);
    }

    #[test]
    fn excluded_colour_is_forced_to_zero() {
        let m = [20u64, 0, 30, 20];
        let odds = [1.0, 3.0, 2.5, 1.8];
        let mut d = MultiFishersNCHypergeometric::new(&m, &odds, N, 1e-10).unwrap();
        // any count at the empty colour is impossible
        assert_eq!(d.probability(&[8, 1, 10, 5]).unwrap(), 0.0);
        // with the excluded colour at zero, matches the 3-colour urn
        let p4 = d.probability(&[8, 0, 10, 6]).unwrap();
        let mut d3 = MultiFishersNCHypergeometric::new(&M, &ODDS, N, 1e-10).unwrap();
        let p3 = d3.probability(&[8, 10, 6]).unwrap();
        assert!((p4 - p3).abs() < 1e-12, "{} vs {}", p4, p3);
    }

    #[test]
    fn equal_odds_product_fast_path() {
        // all odds equal: multivariate central hypergeometric
        let m = [5u64, 10, 15];
        let odds = [2.0, 2.0, 2.0];
        let mut d = MultiFishersNCHypergeometric::new(&m, &odds, 12, 1e-10).unwrap();
        let p = d.probability(&[2, 4, 6]).unwrap();
        assert!((p - 0.12151818827428353).abs() < 1e-10, "got {}", p);
        let p = d.probability(&[1, 5, 6]).unwrap();
        assert!((p - 0.072910912964570265).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn two_colour_delegates_to_univariate() {
        let m = [25u64, 32];
        let odds = [2.5, 1.0];
        let mut d = MultiFishersNCHypergeometric::new(&m, &odds, 20, 1e-10).unwrap();
        let p = d.probability(&[12, 8]).unwrap();
        assert!((p - 0.22197094281920696).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn approximate_mean_close_to_exact() {
        let d = MultiFishersNCHypergeometric::new(&M, &ODDS, N, 1e-8).unwrap();
        let mu = d.mean().unwrap();
        let exact = [4.474742902810941, 12.658399852807909, 6.86685724438114];
        for (got, exp) in mu.iter().zip(exact.iter()) {
            assert!((got - exp).abs() < 0.05, "{} vs {}", got, exp);
        }
        let total: f64 = mu.iter().sum();
        assert!((total - N as f64).abs() < 1e-6);
    }

    #[test]
    fn exact_moments_reference() {
        let mut d = MultiFishersNCHypergeometric::new(&M, &ODDS, N, 1e-12).unwrap();
        let (mean, var, combinations) = d.moments().unwrap();
        let mean_exp = [4.474742902810941, 12.658399852807909, 6.86685724438114];
        let var_exp = [2.720025667800545, 3.8767454438089715, 3.227562179901639];
        for (got, exp) in mean.iter().zip(mean_exp.iter()) {
            assert!((got - exp).abs() < 1e-6, "mean {} vs {}", got, exp);
        }
        for (got, exp) in var.iter().zip(var_exp.iter()) {
            assert!((got - exp).abs() < 1e-5, "var {} vs {}", got, exp);
        }
        assert!(combinations > 0);
    }

    #[test]
    fn pmf_sums_to_one_over_lattice() {
        let m = [6u64, 8, 5];
        let odds = [0.7, 1.3, 2.2];
        let n = 9u64;
        let mut d = MultiFishersNCHypergeometric::new(&m, &odds, n, 1e-12).unwrap();
        let mut total = 0.0;
        for x0 in 0..=m[0].min(n) {
            for x1 in 0..=m[1].min(n - x0) {
                let x2 = n - x0 - x1;
                if x2 <= m[2] {
                    total += d.probability(&[x0, x1, x2]).unwrap();
                }
            }
        }
        assert!((total - 1.0).abs() < 1e-8, "total {}", total);
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(MultiFishersNCHypergeometric::new(&[5, 5], &[1.0], 4, 1e-8).is_err());
        assert!(MultiFishersNCHypergeometric::new(&[], &[], 0, 1e-8).is_err());
        assert!(MultiFishersNCHypergeometric::new(&[5, 5], &[1.0, -1.0], 4, 1e-8).is_err());
        // more draws than balls
        assert!(MultiFishersNCHypergeometric::new(&[2, 2], &[1.0, 1.0], 5, 1e-8).is_err());
        // enough balls but not enough with nonzero weight
        assert!(MultiFishersNCHypergeometric::new(&[4, 4], &[1.0, 0.0], 5, 1e-8).is_err());
    }

    #[test]
    fn sample_rows_are_feasible() {
        let mut d = MultiFishersNCHypergeometric::new(&M, &ODDS, N, 1e-6).unwrap();
        let mut rng = rand::rng();
        for _ in 0..100 {
            let row = d.sample(&mut rng).unwrap();
            let total: f64 = row.iter().sum();
            assert_eq!(total, N as f64);
            for (v, cap) in row.iter().zip(M.iter()) {
                assert!(*v >= 0.0 && *v <= *cap as f64);
            }
        }
    }
}

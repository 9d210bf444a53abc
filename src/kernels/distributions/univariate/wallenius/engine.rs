// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! Stateful evaluation engine for Wallenius' noncentral hypergeometric
//! distribution.
//!
//! Wallenius' PMF has no closed form. With `d = ω(m−x) + (N−m−(n−x))` it is
//!
//! ```text
//! P(x) = C(m, x)·C(N−m, n−x) · ∫₀¹ (1 − t^{ω/d})^x (1 − t^{1/d})^{n−x} dt
//! ```
//!
//! The substitution `t = e^{−v}` turns the integral into
//! `∫₀^∞ e^{−v}·Π(1 − e^{−w_i v})^{x_i} dv`, whose log-integrand is strictly
//! concave with a single interior maximum. The engine locates that maximum
//! by safeguarded Newton, scales the integrand so its peak is 1, and
//! integrates outward with adaptive 12-point Gauss–Legendre panels; very
//! large draw counts switch to a Laplace expansion about the peak, and loose
//! accuracies (≥ 0.1) use a normal approximation. The same integral routine
//! serves the multivariate engine, which passes one term per colour.

use minarrow::enums::error::KernelError;
use minarrow::Vec64;
use rand::Rng;

use crate::config::{
    QUADRATURE_MAX_DEPTH, TABLE_FULL_SUPPORT_LIMIT, WALLENIUS_QUADRATURE_LIMIT,
    WALLENIUS_TABLE_RECURSION_LIMIT,
};
use crate::kernels::distributions::shared::constants::{GL12_NODES, GL12_WEIGHTS, SQRT_2PI};
use crate::kernels::distributions::shared::sampler::weighted_index;
use crate::kernels::distributions::shared::scalar::{ln_choose, normal_tail_sd, std_normal_cdf};
use crate::kernels::distributions::univariate::common::PmfTable;

/// Largest population accepted; counts above this lose integer exactness in
/// f64 arithmetic.
const MAX_POPULATION: u64 = 1 << 53;

/// Number of urn-emulation draws after which a sampling table is built and
/// cached for chop-down sampling.
const SAMPLE_TABLE_THRESHOLD: u64 = 32;

// ---------------------------------------------------------------------------
// Transformed-integrand machinery (shared with the multivariate engine)
// ---------------------------------------------------------------------------

/// `λ(v) = −v + Σ xᵢ·ln(1 − e^{−wᵢ v})`, the log of the transformed
/// Wallenius integrand.
#[inline]
fn log_integrand(v: f64, terms: &[(f64, f64)]) -> f64 {
    if v <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let mut s = -v;
    for &(w, x) in terms {
        if x == 0.0 {
            continue;
        }
        let one_minus = -(-w * v).exp_m1();
        if one_minus <= 0.0 {
            return f64::NEG_INFINITY;
        }
        s += x * one_minus.ln();
    }
    s
}

/// First derivative λ'(v); strictly decreasing from +∞ to −1.
#[inline]
fn dlog_integrand(v: f64, terms: &[(f64, f64)]) -> f64 {
    let mut s = -1.0;
    for &(w, x) in terms {
        if x == 0.0 {
            continue;
        }
        let u = (-w * v).exp();
        s += x * w * u / (1.0 - u);
    }
    s
}

/// Second derivative λ''(v); strictly negative.
#[inline]
fn d2log_integrand(v: f64, terms: &[(f64, f64)]) -> f64 {
    let mut s = 0.0;
    for &(w, x) in terms {
        if x == 0.0 {
            continue;
        }
        let u = (-w * v).exp();
        let q = 1.0 - u;
        s -= x * w * w * u / (q * q);
    }
    s
}

/// Locates the unique maximum of the log-integrand by bracketed Newton.
fn find_peak(terms: &[(f64, f64)]) -> f64 {
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    while dlog_integrand(hi, terms) > 0.0 {
        lo = hi;
        hi *= 2.0;
        if hi > 1e18 {
            break;
        }
    }
    let mut v = 0.5 * (lo + hi);
    for _ in 0..100 {
        let f = dlog_integrand(v, terms);
        if f > 0.0 {
            lo = v;
        } else {
            hi = v;
        }
        let fp = d2log_integrand(v, terms);
        let mut vn = if fp != 0.0 { v - f / fp } else { 0.5 * (lo + hi) };
        if !(vn > lo && vn < hi) {
            vn = 0.5 * (lo + hi);
        }
        if (vn - v).abs() < 1e-12 * v.max(1.0) {
            return vn;
        }
        v = vn;
    }
    v
}

/// Single 12-point Gauss–Legendre panel over [a, b].
#[inline]
fn gl12<F: Fn(f64) -> f64>(a: f64, b: f64, f: &F) -> f64 {
    let c = 0.5 * (a + b);
    let h = 0.5 * (b - a);
    let mut s = 0.0;
    for (nd, wt) in GL12_NODES.iter().zip(GL12_WEIGHTS.iter()) {
        s += wt * f(c + h * nd);
    }
    h * s
}

/// Adaptive panel bisection: subdivide until the whole-panel estimate and
/// the two half-panel estimates agree to `tol`.
fn adaptive_gl<F: Fn(f64) -> f64>(a: f64, b: f64, f: &F, tol: f64, depth: usize) -> f64 {
    let whole = gl12(a, b, f);
    let mid = 0.5 * (a + b);
    let halves = gl12(a, mid, f) + gl12(mid, b, f);
    if depth >= QUADRATURE_MAX_DEPTH || (halves - whole).abs() <= tol {
        return halves;
    }
    adaptive_gl(a, mid, f, 0.5 * tol, depth + 1) + adaptive_gl(mid, b, f, 0.5 * tol, depth + 1)
}

/// `ln ∫₀^∞ e^{−v}·Π(1 − e^{−wᵢ v})^{xᵢ} dv` by peak-scaled adaptive
/// quadrature. `terms` holds `(wᵢ, xᵢ)` pairs; accuracy controls the panel
/// tolerance and tail cutoff.
pub(crate) fn ln_wallenius_integral(terms: &[(f64, f64)], accuracy: f64) -> f64 {
    let total: f64 = terms.iter().map(|&(_, x)| x).sum();
    if total == 0.0 {
        return 0.0; // ∫ e^{−v} dv = 1
    }
    let v0 = find_peak(terms);
    let lam0 = log_integrand(v0, terms);
    let d2 = d2log_integrand(v0, terms);
    let sigma = if d2 < 0.0 { 1.0 / (-d2).sqrt() } else { 1.0 };
    let f = |v: f64| -> f64 {
        if v <= 0.0 {
            0.0
        } else {
            (log_integrand(v, terms) - lam0).exp()
        }
    };
    let step = sigma.max(0.25 * v0).max(1e-3);
    let tail = 1e-3 * accuracy;
    let tol = 1e-2 * accuracy * sigma;

    let mut total_j = 0.0;
    // left of the peak, walking to v = 0 or negligibility
    let mut b = v0;
    let mut a = (b - 2.0 * step).max(0.0);
    loop {
        total_j += adaptive_gl(a, b, &f, tol, 0);
        if a <= 0.0 || f(a) < tail {
            break;
        }
        b = a;
        a = (b - 2.0 * step).max(0.0);
    }
    // right of the peak, extending until the scaled integrand is negligible
    let mut a2 = v0;
    let mut b2 = a2 + 2.0 * step;
    loop {
        total_j += adaptive_gl(a2, b2, &f, tol, 0);
        if f(b2) < tail || b2 > v0 + 1e6 * step {
            break;
        }
        a2 = b2;
        b2 = a2 + 2.0 * step;
    }
    lam0 + total_j.ln()
}

/// Laplace expansion of the same integral about its peak, with the
/// fourth-order (kurtosis/skewness) correction. Relative error is
/// O(1/n); used only above [`WALLENIUS_QUADRATURE_LIMIT`] draws where that
/// is far below any realistic accuracy request.
pub(crate) fn ln_wallenius_integral_laplace(terms: &[(f64, f64)]) -> f64 {
    let total: f64 = terms.iter().map(|&(_, x)| x).sum();
    if total == 0.0 {
        return 0.0;
    }
    let v0 = find_peak(terms);
    let lam0 = log_integrand(v0, terms);
    let d2 = d2log_integrand(v0, terms);
    let mut d3 = 0.0;
    let mut d4 = 0.0;
    for &(w, x) in terms {
        if x == 0.0 {
            continue;
        }
        let u = (-w * v0).exp();
        let q = 1.0 - u;
        d3 += x * w.powi(3) * u * (1.0 + u) / q.powi(3);
        d4 -= x * w.powi(4) * u * (1.0 + 4.0 * u + u * u) / q.powi(4);
    }
    let sigma = 1.0 / (-d2).sqrt();
    let g3 = d3 * sigma.powi(3);
    let g4 = d4 * sigma.powi(4);
    let corr = g4 / 8.0 + 5.0 * g3 * g3 / 24.0;
    lam0 + (sigma * SQRT_2PI).ln() + corr.ln_1p()
}

// ---------------------------------------------------------------------------
// Univariate engine
// ---------------------------------------------------------------------------

/// Wallenius' noncentral hypergeometric distribution
/// `WNCHypergeo(population N, success m, draws n, odds ω)`.
pub struct WalleniusNCHypergeometric {
    population: i64,
    success: i64,
    draws: i64,
    odds: f64,
    accuracy: f64,
    x_min: i64,
    x_max: i64,
    table: Option<PmfTable>,
    samples_drawn: u64,
}

impl WalleniusNCHypergeometric {
    /// Validates parameters and computes the support bounds; the constraints
    /// match the Fisher engine.
    pub fn new(
        population: u64,
        success: u64,
        draws: u64,
        odds: f64,
        accuracy: f64,
    ) -> Result<Self, KernelError> {
        if success > population || draws > population {
            return Err(KernelError::InvalidArguments(
                "wallenius_nchypergeo: success and draws must not exceed population".into(),
            ));
        }
        if population > MAX_POPULATION {
            return Err(KernelError::InvalidArguments(
                "wallenius_nchypergeo: population too large for exact f64 arithmetic".into(),
            ));
        }
        if !odds.is_finite() || odds < 0.0 {
            return Err(KernelError::InvalidArguments(
                "wallenius_nchypergeo: odds must be finite and non-negative".into(),
            ));
        }
        if !accuracy.is_finite() || accuracy <= 0.0 {
            return Err(KernelError::InvalidArguments(
                "wallenius_nchypergeo: accuracy must lie in (0, 1]".into(),
            ));
        }
        let accuracy = accuracy.min(1.0);
        if odds == 0.0 && draws > population - success {
            return Err(KernelError::InvalidArguments(
                "wallenius_nchypergeo: not enough items with nonzero weight".into(),
            ));
        }
        let population = population as i64;
        let success = success as i64;
        let draws = draws as i64;
        Ok(Self {
            population,
            success,
            draws,
            odds,
            accuracy,
            x_min: (success + draws - population).max(0),
            x_max: draws.min(success),
            table: None,
            samples_drawn: 0,
        })
    }

    /// Lower support bound `max(0, n − m2)`.
    #[inline]
    pub fn x_min(&self) -> i64 {
        self.x_min
    }

    /// Upper support bound `min(n, m1)`.
    #[inline]
    pub fn x_max(&self) -> i64 {
        self.x_max
    }

    /// Requested accuracy (possibly clamped at construction).
    #[inline]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Probability mass function P(X = x).
    ///
    /// Strategy selection: loose accuracies (≥ 0.1) use the normal
    /// approximation; draw counts above [`WALLENIUS_QUADRATURE_LIMIT`] use
    /// the Laplace expansion; everything else evaluates the integral by
    /// adaptive quadrature.
    pub fn probability(&mut self, x: i64) -> f64 {
        if x < self.x_min || x > self.x_max {
            return 0.0;
        }
        if self.draws == 0 {
            return 1.0;
        }
        if self.x_min == self.x_max {
            return 1.0;
        }
        if self.odds == 1.0 {
            let m = self.success as u64;
            let m2 = (self.population - self.success) as u64;
            return (ln_choose(m, x as u64) + ln_choose(m2, (self.draws - x) as u64)
                - ln_choose(self.population as u64, self.draws as u64))
            .exp();
        }
        if self.odds == 0.0 {
            return if x == 0 { 1.0 } else { 0.0 };
        }
        if self.accuracy >= 0.1 {
            // normal approximation with continuity correction
            let mu = self.mean();
            let sd = self.variance().sqrt().max(1e-100);
            let xf = x as f64;
            let p = std_normal_cdf((xf + 0.5 - mu) / sd) - std_normal_cdf((xf - 0.5 - mu) / sd);
            return p.clamp(0.0, 1.0);
        }
        self.probability_exact(x)
    }

    /// Integral evaluation of P(X = x), bypassing the approximation
    /// shortcuts.
    fn probability_exact(&self, x: i64) -> f64 {
        let m = self.success;
        let m2 = self.population - self.success;
        let x2 = self.draws - x;
        let d = self.odds * (m - x) as f64 + (m2 - x2) as f64;
        if d <= 0.0 {
            return if x == self.x_max { 1.0 } else { 0.0 };
        }
        let terms = [(self.odds / d, x as f64), (1.0 / d, x2 as f64)];
        let ln_bico = ln_choose(m as u64, x as u64) + ln_choose(m2 as u64, x2 as u64);
        let ln_i = if self.draws as u64 > WALLENIUS_QUADRATURE_LIMIT {
            ln_wallenius_integral_laplace(&terms)
        } else {
            ln_wallenius_integral(&terms, self.accuracy)
        };
        (ln_bico + ln_i).exp().min(1.0)
    }

    /// Probability ratio `P(x) / P(x0)`.
    ///
    /// `x` outside the support yields 0; `x0` outside the support is an
    /// error. Unlike Fisher's variant there is no cheap recurrence, so this
    /// costs two PMF evaluations.
    pub fn probability_ratio(&mut self, x: i64, x0: i64) -> Result<f64, KernelError> {
        if x0 < self.x_min || x0 > self.x_max {
            return Err(KernelError::InvalidArguments(
                "wallenius_nchypergeo: probability_ratio reference x0 outside the support".into(),
            ));
        }
        if x < self.x_min || x > self.x_max {
            return Ok(0.0);
        }
        if x == x0 {
            return Ok(1.0);
        }
        let p0 = self.probability(x0);
        Ok(self.probability(x) / p0)
    }

    /// Approximate mean: the root of the Wallenius transfer equation
    /// `m(1−θ^ω) + (N−m)(1−θ) = n` for `θ ∈ (0, 1)`, with
    /// `mean = m(1−θ^ω)`.
    pub fn mean(&self) -> f64 {
        let m = self.success as f64;
        let m2 = (self.population - self.success) as f64;
        let n = self.draws as f64;
        if self.draws == 0 {
            return 0.0;
        }
        if self.draws == self.population {
            return m;
        }
        if self.odds == 1.0 {
            return m * n / self.population as f64;
        }
        if self.odds == 0.0 {
            return (n - m2).max(0.0);
        }
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        for _ in 0..100 {
            let th = 0.5 * (lo + hi);
            let v = m * (1.0 - th.powf(self.odds)) + m2 * (1.0 - th);
            if v > n {
                lo = th;
            } else {
                hi = th;
            }
        }
        let th = 0.5 * (lo + hi);
        m * (1.0 - th.powf(self.odds))
    }

    /// Approximate variance, using the same noncentral approximation form as
    /// the Fisher engine evaluated at the Wallenius mean. A rough estimate;
    /// use [`moments`](Self::moments) when precision matters.
    pub fn variance(&self) -> f64 {
        let m = self.success as f64;
        let n = self.draws as f64;
        let nn = self.population as f64;
        let my = self.mean();
        let r1 = my * (m - my);
        let r2 = (n - my) * (my + nn - n - m);
        if r1 <= 0.0 || r2 <= 0.0 {
            return 0.0;
        }
        let var = nn * r1 * r2 / ((nn - 1.0) * (m * r2 + (nn - m) * r1));
        var.max(0.0)
    }

    /// Mode by hill-climbing from the rounded approximate mean. No closed
    /// form exists for Wallenius' variant.
    pub fn mode(&mut self) -> i64 {
        let mut x = ((self.mean() + 0.5).floor() as i64).clamp(self.x_min, self.x_max);
        let mut px = self.probability(x);
        while x < self.x_max {
            let pn = self.probability(x + 1);
            if pn <= px {
                break;
            }
            x += 1;
            px = pn;
        }
        while x > self.x_min {
            let pn = self.probability(x - 1);
            if pn <= px {
                break;
            }
            x -= 1;
            px = pn;
        }
        x
    }

    /// Exact mean and variance by summation over the support, anchored at
    /// the approximate mean with shifted accumulation; each tail stops when
    /// a term drops below `0.1·accuracy`.
    pub fn moments(&mut self) -> (f64, f64) {
        let accur = 0.1 * self.accuracy;
        let xm = (self.mean() as i64).clamp(self.x_min, self.x_max);
        let (mut sy, mut sxy, mut sxxy) = (0.0_f64, 0.0_f64, 0.0_f64);
        let mut x = xm;
        while x <= self.x_max {
            let y = self.probability(x);
            let x1 = (x - xm) as f64;
            sy += y;
            sxy += x1 * y;
            sxxy += x1 * x1 * y;
            if y < accur && x != xm {
                break;
            }
            x += 1;
        }
        let mut x = xm - 1;
        while x >= self.x_min {
            let y = self.probability(x);
            let x1 = (x - xm) as f64;
            sy += y;
            sxy += x1 * y;
            sxxy += x1 * x1 * y;
            if y < accur {
                break;
            }
            x -= 1;
        }
        let me1 = sxy / sy;
        let mean = me1 + xm as f64;
        let var = (sxxy / sy - me1 * me1).max(0.0);
        (mean, var)
    }

    /// Exact PMF row for draw `n` by the draw-by-draw Markov recursion (the
    /// state after `k` draws is the colour-1 count, so Wallenius' process is
    /// a Markov chain on that state). Cost `O(n · support)`.
    fn recursion_row(&self) -> Vec<f64> {
        let m = self.success;
        let m2 = self.population - self.success;
        let n = self.draws;
        let size = (self.x_max + 2) as usize;
        let mut cur = vec![0.0_f64; size];
        let mut nxt = vec![0.0_f64; size];
        cur[0] = 1.0;
        for k in 0..n {
            let lo = (k - m2).max(0);
            let hi = k.min(self.x_max);
            for slot in nxt.iter_mut().take((hi + 2) as usize) {
                *slot = 0.0;
            }
            for x in lo..=hi {
                let p = cur[x as usize];
                if p == 0.0 {
                    continue;
                }
                let w1 = self.odds * (m - x) as f64;
                let w2 = (m2 - (k - x)) as f64;
                let dd = w1 + w2;
                if w1 > 0.0 {
                    nxt[(x + 1) as usize] += p * w1 / dd;
                }
                if w2 > 0.0 {
                    nxt[x as usize] += p * w2 / dd;
                }
            }
            core::mem::swap(&mut cur, &mut nxt);
        }
        cur[self.x_min as usize..=self.x_max as usize].to_vec()
    }

    /// Builds a table of PMF values scaled so the largest entry is 1,
    /// centred on the mode with tails cut below `cutoff` (default
    /// `0.01·accuracy`).
    ///
    /// Draw counts up to [`WALLENIUS_TABLE_RECURSION_LIMIT`] use the exact
    /// draw-by-draw recursion; larger problems walk outward from the mode
    /// evaluating the integral per value.
    pub fn make_table(&mut self, max_length: usize, cutoff: Option<f64>) -> PmfTable {
        let cutoff = cutoff.unwrap_or(0.01 * self.accuracy);
        if self.x_min == self.x_max || self.odds <= 0.0 {
            let x0 = if self.odds <= 0.0 { 0 } else { self.x_min };
            let mut values = Vec64::with_capacity(1);
            values.push(1.0);
            return PmfTable {
                values,
                x_first: x0,
                x_last: x0,
                sum: 1.0,
                sampling_recommended: true,
            };
        }

        let recursion = self.draws as u64 <= WALLENIUS_TABLE_RECURSION_LIMIT;
        let (raw, raw_x_first): (Vec<f64>, i64) = if recursion {
            (self.recursion_row(), self.x_min)
        } else {
            // integral per value, walking outward from the mode
            let mode = self.mode();
            let p_mode = self.probability(mode);
            let mut left: Vec<f64> = Vec::new();
            let mut x = mode - 1;
            while x >= self.x_min {
                let p = self.probability(x);
                left.push(p);
                if p < cutoff * p_mode {
                    break;
                }
                x -= 1;
            }
            let mut vals: Vec<f64> = left.into_iter().rev().collect();
            let first = mode - vals.len() as i64;
            vals.push(p_mode);
            let mut x = mode + 1;
            while x <= self.x_max {
                let p = self.probability(x);
                vals.push(p);
                if p < cutoff * p_mode {
                    break;
                }
                x += 1;
            }
            (vals, first)
        };

        // scale to peak 1, locate the mode index
        let mut peak = 0.0_f64;
        let mut peak_idx = 0usize;
        for (i, &v) in raw.iter().enumerate() {
            if v > peak {
                peak = v;
                peak_idx = i;
            }
        }
        let inv_peak = 1.0 / peak;

        // trim both tails below cutoff, then fit the length budget with the
        // mode kept inside
        let mut first = 0usize;
        while first < peak_idx && raw[first] * inv_peak < cutoff {
            first += 1;
        }
        let mut last = raw.len() - 1;
        while last > peak_idx && raw[last] * inv_peak < cutoff {
            last -= 1;
        }
        let cap = max_length.max(1);
        while last - first + 1 > cap {
            if peak_idx - first >= last - peak_idx {
                first += 1;
            } else {
                last -= 1;
            }
        }

        let mut values = Vec64::with_capacity(last - first + 1);
        let mut sum = 0.0;
        for &v in &raw[first..=last] {
            let scaled = v * inv_peak;
            sum += scaled;
            values.push(scaled);
        }
        PmfTable {
            values,
            x_first: raw_x_first + first as i64,
            x_last: raw_x_first + last as i64,
            sum,
            sampling_recommended: recursion,
        }
    }

    /// Desired table length when the caller has not allocated yet.
    pub fn table_length(&self) -> u64 {
        let full = (self.x_max - self.x_min + 1) as u64;
        if full > TABLE_FULL_SUPPORT_LIMIT {
            let sd = self.variance().sqrt();
            let est = (normal_tail_sd(self.accuracy) * sd + 0.5) as u64;
            full.min(est.max(1))
        } else {
            full
        }
    }

    /// Draws one variate.
    ///
    /// Urn emulation (exact by the distribution's definition): each draw
    /// picks colour 1 with probability `ω·m1′/(ω·m1′ + m2′)` over the
    /// residual counts. Once an instance has produced enough variates the
    /// exact recursion table is built and reused for chop-down sampling.
    pub fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> i64 {
        self.samples_drawn += 1;
        if self.table.is_none()
            && self.samples_drawn > SAMPLE_TABLE_THRESHOLD
            && self.draws as u64 <= WALLENIUS_TABLE_RECURSION_LIMIT
        {
            let span = (self.x_max - self.x_min + 1) as usize;
            let table = self.make_table(span, None);
            self.table = Some(table);
        }
        if let Some(table) = &self.table {
            return table.x_first + weighted_index(rng, &table.values, table.sum) as i64;
        }
        // urn emulation
        let mut m1 = self.success;
        let mut m2 = self.population - self.success;
        let mut x = 0_i64;
        for _ in 0..self.draws {
            let w1 = self.odds * m1 as f64;
            let w2 = m2 as f64;
            if rng.random::<f64>() * (w1 + w2) < w1 {
                x += 1;
                m1 -= 1;
            } else {
                m2 -= 1;
            }
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Expected values generated by the exact draw-by-draw Markov recursion,
    // which is exact for Wallenius' distribution up to f64 rounding.

    #[test]
    fn probability_reference_values() {
        let mut d = WalleniusNCHypergeometric::new(57, 25, 20, 2.5, 1e-9).unwrap();
        assert!((d.probability(12) - 0.21833874748010612).abs() < 1e-9);
        assert!((d.probability(13) - 0.21500283012078558).abs() < 1e-9);
        assert!((d.probability(5) - 4.8950320094564804e-05).abs() < 1e-12);
        assert!((d.probability(20) - 1.8330730080681669e-06).abs() < 1e-12);
    }

    #[test]
    fn probability_sums_to_one() {
        let mut d = WalleniusNCHypergeometric::new(140, 80, 50, 0.3, 1e-9).unwrap();
        let mut s = 0.0;
        for x in d.x_min()..=d.x_max() {
            s += d.probability(x);
        }
        assert!((s - 1.0).abs() < 1e-7, "sum = {}", s);
    }

    #[test]
    fn quadrature_agrees_with_recursion_table() {
        let mut d = WalleniusNCHypergeometric::new(700, 300, 200, 1.7, 1e-10).unwrap();
        let span = (d.x_max() - d.x_min() + 1) as usize;
        let t = d.make_table(span, Some(0.0));
        for x in [100_i64, 108, 115, 120] {
            let exact = t.probability_at(x);
            let quad = d.probability(x);
            assert!(
                (quad - exact).abs() < 1e-9 * exact.max(1e-12),
                "x={}: quad {} vs exact {}",
                x,
                quad,
                exact
            );
        }
    }

    #[test]
    fn central_case_matches_closed_form() {
        let mut d = WalleniusNCHypergeometric::new(20, 7, 12, 1.0, 1e-9).unwrap();
        assert!((d.probability(4) - 0.35758513931888553).abs() < 1e-14);
    }

    #[test]
    fn mean_approximation() {
        let d = WalleniusNCHypergeometric::new(57, 25, 20, 2.5, 1e-9).unwrap();
        assert!((d.mean() - 12.359858115399359).abs() < 1e-9);
        let d2 = WalleniusNCHypergeometric::new(140, 80, 50, 0.3, 1e-9).unwrap();
        assert!((d2.mean() - 17.02447543640541).abs() < 1e-9);
        // odds == 1 is the central mean
        let d3 = WalleniusNCHypergeometric::new(57, 25, 20, 1.0, 1e-9).unwrap();
        assert!((d3.mean() - 25.0 * 20.0 / 57.0).abs() < 1e-12);
    }

    #[test]
    fn exact_moments_reference() {
        let mut d = WalleniusNCHypergeometric::new(57, 25, 20, 2.5, 1e-10).unwrap();
        let (mean, var) = d.moments();
        assert!((mean - 12.383728985667908).abs() < 1e-7);
        assert!((var - 3.0945420761019875).abs() < 1e-6);
    }

    #[test]
    fn mode_is_argmax() {
        for &(nn, m, n, odds) in &[(57u64, 25u64, 20u64, 2.5), (140, 80, 50, 0.3), (12, 6, 6, 0.5)]
        {
            let mut d = WalleniusNCHypergeometric::new(nn, m, n, odds, 1e-9).unwrap();
            let mode = d.mode();
            let pm = d.probability(mode);
            assert!(pm >= d.probability(mode - 1));
            assert!(pm >= d.probability(mode + 1));
        }
    }

    #[test]
    fn mode_reference_values() {
        let mut d = WalleniusNCHypergeometric::new(57, 25, 20, 2.5, 1e-9).unwrap();
        assert_eq!(d.mode(), 12);
        let mut d2 = WalleniusNCHypergeometric::new(140, 80, 50, 0.3, 1e-9).unwrap();
        assert_eq!(d2.mode(), 17);
    }

    #[test]
    fn recursion_table_reference_values() {
        let mut d = WalleniusNCHypergeometric::new(12, 6, 6, 0.5, 1e-9).unwrap();
        let t = d.make_table(16, Some(0.0));
        let expect = [
            0.011904761904761902,
            0.17122583299053884,
            0.43059881295175412,
            0.31027795733678087,
            0.071252277134630074,
            0.0046864899806076266,
            5.3867700926524448e-05,
        ];
        for (x, e) in (0..=6).zip(expect.iter()) {
            assert!(
                (t.probability_at(x) - e).abs() < 1e-14,
                "x={}: {} vs {}",
                x,
                t.probability_at(x),
                e
            );
        }
    }

    #[test]
    fn laplace_close_to_recursion_for_large_n() {
        // compare strategies on a problem big enough for Laplace but small
        // enough for the exact recursion
        let mut d = WalleniusNCHypergeometric::new(25_000, 10_000, 8_000, 3.0, 1e-9).unwrap();
        let span = (d.x_max() - d.x_min() + 1) as usize;
        let t = d.make_table(span, Some(0.0));
        let mode = d.mode();
        for x in [mode - 30, mode, mode + 30] {
            let exact = t.probability_at(x);
            let lap = d.probability(x);
            assert!(
                (lap - exact).abs() < 1e-6 * exact,
                "x={}: laplace {} vs exact {}",
                x,
                lap,
                exact
            );
        }
    }

    #[test]
    fn probability_ratio_consistency() {
        let mut d = WalleniusNCHypergeometric::new(57, 25, 20, 2.5, 1e-9).unwrap();
        let p12 = d.probability(12);
        let p9 = d.probability(9);
        let r = d.probability_ratio(12, 9).unwrap();
        assert!((r - p12 / p9).abs() < 1e-9 * (p12 / p9));
        assert!(d.probability_ratio(12, 25).is_err());
        assert_eq!(d.probability_ratio(25, 12).unwrap(), 0.0);
    }

    #[test]
    fn normal_approximation_is_coarse_but_sane() {
        let mut d = WalleniusNCHypergeometric::new(57, 25, 20, 2.5, 0.2).unwrap();
        let p = d.probability(12);
        assert!((p - 0.21833874748010612).abs() < 0.05, "normal approx {}", p);
    }

    #[test]
    fn sample_within_support_and_unbiased() {
        let mut d = WalleniusNCHypergeometric::new(57, 25, 20, 2.5, 1e-8).unwrap();
        let mut rng = rand::rng();
        let trials = 4000;
        let mut sum = 0.0;
        for _ in 0..trials {
            let x = d.sample(&mut rng);
            assert!((d.x_min()..=d.x_max()).contains(&x));
            sum += x as f64;
        }
        let mean = sum / trials as f64;
        // exact mean 12.3837; sd ~ 1.76 → tolerance ~ 5 sd of the average
        assert!((mean - 12.38).abs() < 0.15, "sample mean {}", mean);
    }
}

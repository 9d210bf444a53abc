// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Statistical Sampling Module** - *Pseudorandom Urn Sampling Helpers*
//!
//! Sampling infrastructure shared by the distribution kernels. Samplers are
//! generic over `rand::Rng`, so callers can substitute any PRNG; the
//! [`Sampler`] struct wraps a thread-local generator for convenience.

use rand::rngs::ThreadRng;
use rand::{rng, Rng};

/// Thread-local sampler backed by a high-quality PRNG.
pub struct Sampler {
    rng: ThreadRng,
}

impl Sampler {
    /// Creates a new sampler instance with a thread-local pseudorandom
    /// number generator.
    #[inline]
    pub fn new() -> Self {
        Sampler { rng: rng() }
    }

    /// Uniform deviate in [0, 1).
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Mutable access to the underlying generator, for the engine-level
    /// `sample` methods.
    #[inline]
    pub fn rng(&mut self) -> &mut ThreadRng {
        &mut self.rng
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Chop-down selection of an index with probability proportional to
/// `weights[i]`, given the precomputed `total = Σ weights`.
///
/// Preconditions: `total > 0` and consistent with `weights`. The final
/// index absorbs any floating-point shortfall.
#[inline]
pub fn weighted_index<R: Rng + ?Sized>(rng: &mut R, weights: &[f64], total: f64) -> usize {
    let mut u = rng.random::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        u -= w;
        if u < 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_in_range() {
        let mut s = Sampler::new();
        for _ in 0..1000 {
            let u = s.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn weighted_index_respects_zero_weights() {
        let mut s = Sampler::new();
        let w = [0.0, 3.0, 0.0, 1.0];
        for _ in 0..500 {
            let i = weighted_index(s.rng(), &w, 4.0);
            assert!(i == 1 || i == 3, "picked zero-weight index {}", i);
        }
    }

    #[test]
    fn weighted_index_rough_proportions() {
        let mut s = Sampler::new();
        let w = [1.0, 3.0];
        let mut counts = [0usize; 2];
        let trials = 20_000;
        for _ in 0..trials {
            counts[weighted_index(s.rng(), &w, 4.0)] += 1;
        }
        let frac = counts[1] as f64 / trials as f64;
        assert!((frac - 0.75).abs() < 0.02, "frac = {}", frac);
    }
}

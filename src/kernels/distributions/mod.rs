// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Noncentral Hypergeometric Distributions** - *Biased Urn Computing*
//!
//! Kernels for the two noncentral hypergeometric families, which model
//! drawing `n` balls without replacement from an urn of coloured balls whose
//! colours carry unequal selection weights ("odds"):
//!
//! - **Fisher's** variant conditions independent weighted Bernoulli
//!   inclusions on the total drawn; its PMF is a weighted hypergeometric
//!   ratio with an `odds^x` tilt.
//! - **Wallenius'** variant draws sequentially with bias proportional to
//!   residual count × weight; its PMF is an integral with no closed form.
//!
//! ## Numerical architecture
//!
//! All probability mass is computed in log space against a per-instance
//! scale factor anchored at (an approximation of) the mean, so intermediate
//! magnitudes stay near 1 regardless of how large the factorial ratios get.
//! Sums over the support walk outward from the anchor and stop once terms
//! drop below the requested accuracy. The multivariate engines enumerate the
//! feasible lattice depth-first with per-branch pruning, anchored at a
//! Cornfield-style approximate mean.
//!
//! ## Structure
//! - **`shared`**: log-factorial cache, special functions, sampling helpers
//! - **`univariate`**: Fisher and Wallenius engines plus their bulk kernels
//! - **`multivariate`**: colour-reduction engines over the feasible lattice
//!
//! Distribution instances are stateful numeric objects: repeated queries at
//! neighbouring `x` reuse cached factorial state and are O(1). Instances are
//! cheap to create and are not `Sync`; use one per thread.

pub mod shared {
    pub mod constants;
    pub mod sampler;
    pub mod scalar;
}

pub mod univariate {
    // common kernel patterns
    pub mod common;

    // distributions
    pub mod fishers;
    pub mod wallenius;
}

pub mod multivariate;

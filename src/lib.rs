// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under the Mozilla Public License (MPL) 2.0.
// See LICENSE for details.

//! # urn-kernels
//!
//! Noncentral hypergeometric distribution kernels covering sampling *without
//! replacement* from an urn whose colours carry unequal selection weights:
//!
//! - **Fisher's** variant: each ball's inclusion is an independent weighted
//!   Bernoulli, conditioned on the total number drawn.
//! - **Wallenius'** variant: balls are drawn one at a time, each draw biased
//!   by the residual counts and weights. Order matters, so the two variants
//!   have different distributions for the same urn.
//!
//! Both variants ship univariate and multivariate engines with PMF, CDF,
//! quantile, exact and approximate moments, mode, table builders, samplers,
//! and inverse (mean → odds / mean → urn composition) estimators.
//!
//! The bulk kernel surface follows the Arrow-compatible conventions of the
//! wider kernel family: slice inputs, `FloatArray<f64>` outputs, optional
//! validity bitmasks with NaN sentinels, and zero-allocation `_to` variants
//! writing into caller buffers.

pub mod kernels {
    pub mod distributions;
}

pub mod config;
pub mod utils;

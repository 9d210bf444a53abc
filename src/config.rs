// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

// These parameters should rarely need adjustment.

//! # **Configuration Constants** - *Runtime Behaviour Parameters*
//!
//! Global configuration constants controlling kernel behaviour and numerical
//! thresholds. These values are compile-time constants chosen for typical
//! workloads.

/// Maximum number of colours accepted by the multivariate engines.
///
/// Bounds the fixed working arrays and the depth of the lattice enumeration
/// recursion, which is well within any stack.
pub const MAX_COLORS: usize = 32;

/// Length of the process-wide `ln(k!)` lookup table.
///
/// Values at or above this index fall back to Stirling's series, which at
/// `k = 1024` is already accurate to well below 1e-13 relative error.
pub const LN_FAC_TABLE_LEN: usize = 1024;

/// Iteration cap for the Cornfield-style fixed-point mean solvers.
///
/// Exceeding the cap is reported as a convergence error rather than looping
/// indefinitely on pathological inputs.
pub const MEAN_ITERATION_LIMIT: usize = 100;

/// Draw count above which the Wallenius PMF switches from adaptive
/// quadrature to the Laplace expansion of the transformed integrand.
///
/// Above this size the integrand is within ~1e-8 of its Gaussian limit, so
/// panel subdivision would only rediscover the expansion.
pub const WALLENIUS_QUADRATURE_LIMIT: u64 = 4096;

/// Draw count above which the Wallenius table builder abandons the exact
/// draw-by-draw recursion (cost `O(n · support)`) in favour of per-value
/// integral evaluation around the mode.
pub const WALLENIUS_TABLE_RECURSION_LIMIT: u64 = 65_536;

/// Support length above which the desired PMF table length is capped at the
/// normal-tail estimate instead of the full support.
pub const TABLE_FULL_SUPPORT_LIMIT: u64 = 200;

/// Maximum recursion depth for adaptive panel bisection in the Wallenius
/// quadrature.
pub const QUADRATURE_MAX_DEPTH: usize = 14;

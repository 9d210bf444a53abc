// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Common Distribution Utilities** - *Shared Kernel and Test Infrastructure*
//!
//! Dense/masked kernel plumbing shared by the univariate distribution entry
//! points, plus small helpers used by their test suites.
//!
//! The kernel helpers take the per-value scalar body as a closure. The body
//! is `FnMut` because the distribution engines cache normalisation state
//! between neighbouring evaluations.

/// Scalar implementations of the common kernel loops.
pub mod std;

use minarrow::{Bitmask, Buffer, FloatArray, Vec64};

/// Contiguous table of unnormalised PMF values over (part of) a support.
///
/// Values are scaled so the largest entry is 1; normalised probabilities are
/// obtained by dividing by `sum`. The tails may be cut where entries fall
/// below the builder's cutoff, so `x_first`/`x_last` can lie strictly inside
/// the distribution's support.
pub struct PmfTable {
    /// Unnormalised values for `x_first..=x_last`.
    pub values: Vec64<f64>,
    /// First x value represented in the table.
    pub x_first: i64,
    /// Last x value represented in the table.
    pub x_last: i64,
    /// Sum of all table values.
    pub sum: f64,
    /// Whether table-based (chop-down) sampling is recommended for this
    /// parameter set.
    pub sampling_recommended: bool,
}

impl PmfTable {
    /// Normalised probability at `x`; 0 outside the tabled range.
    #[inline]
    pub fn probability_at(&self, x: i64) -> f64 {
        if x < self.x_first || x > self.x_last {
            return 0.0;
        }
        self.values[(x - self.x_first) as usize] / self.sum
    }
}

// Common test helpers

/// Test helper: unwrap a `FloatArray`, assert *no* null mask, return data.
pub fn dense_data(arr: FloatArray<f64>) -> Buffer<f64> {
    assert!(arr.null_mask.is_none(), "unexpected mask on dense path");
    arr.data
}

/// Create a mask of given length with exactly the lane `idx` null.
pub fn single_null_mask(len: usize, idx: usize) -> Bitmask {
    let mut m = Bitmask::new_set_all(len, true);
    unsafe { m.set_unchecked(idx, false) };
    m
}

/// Assert absolute difference ≤ `tol`.
pub fn assert_close(a: f64, b: f64, tol: f64) {
    assert!(
        (a - b).abs() < tol,
        "assert_close failed: {} vs {} (tol={})",
        a,
        b,
        tol
    )
}

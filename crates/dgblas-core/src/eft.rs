//! Error-free transformations
//!
//! Each routine returns a floating-point result together with its exact
//! rounding error, so that `result + error` equals the mathematically exact
//! value. The lane forms apply the same identities to fixed-width groups of
//! doubles and are written so the compiler can map them onto vector registers.

use std::sync::OnceLock;

/// Reference lane width (one 512-bit register of doubles)
pub const LANES: usize = 8;

/// Exact product: `hi + lo == a * b`
///
/// `hi` is the correctly rounded product, `lo` the rounding error recovered
/// with a fused multiply-add. Exact as long as the error term does not
/// underflow.
#[inline(always)]
pub fn two_product(a: f64, b: f64) -> (f64, f64) {
    let hi = a * b;
    let lo = a.mul_add(b, -hi);
    (hi, lo)
}

/// Exact sum: `s + e == a + b` (Knuth, no magnitude precondition)
#[inline(always)]
pub fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    let e = (a - (s - bb)) + (b - bb);
    (s, e)
}

/// Exact sum for `|a| >= |b|` (Dekker)
#[inline(always)]
pub fn fast_two_sum(a: f64, b: f64) -> (f64, f64) {
    debug_assert!(
        a.abs() >= b.abs() || !a.is_finite() || !b.is_finite(),
        "fast_two_sum requires |a| >= |b|"
    );
    let s = a + b;
    let e = b - (s - a);
    (s, e)
}

/// Lane-wise [`two_product`]
#[inline(always)]
pub fn two_product_lanes<const L: usize>(a: &[f64; L], b: &[f64; L]) -> ([f64; L], [f64; L]) {
    let mut hi = [0.0; L];
    let mut lo = [0.0; L];
    for k in 0..L {
        hi[k] = a[k] * b[k];
        lo[k] = a[k].mul_add(b[k], -hi[k]);
    }
    (hi, lo)
}

/// Lane-wise [`two_sum`]
#[inline(always)]
pub fn two_sum_lanes<const L: usize>(a: &[f64; L], b: &[f64; L]) -> ([f64; L], [f64; L]) {
    let mut s = [0.0; L];
    let mut e = [0.0; L];
    for k in 0..L {
        s[k] = a[k] + b[k];
        let bb = s[k] - a[k];
        e[k] = (a[k] - (s[k] - bb)) + (b[k] - bb);
    }
    (s, e)
}

/// Load `L` consecutive values starting at `offset`
#[inline(always)]
pub fn load_lanes<const L: usize>(data: &[f64], offset: usize) -> [f64; L] {
    let mut out = [0.0; L];
    out.copy_from_slice(&data[offset..offset + L]);
    out
}

/// Check that the host provides a correctly rounded fused multiply-add
///
/// `(1 + 2^-30)^2 = 1 + 2^-29 + 2^-60`; the last term is only recoverable if
/// `mul_add` does not round the intermediate product. Evaluated once per
/// process.
pub fn fma_is_exact() -> bool {
    static EXACT: OnceLock<bool> = OnceLock::new();
    *EXACT.get_or_init(|| {
        let a = 1.0 + f64::powi(2.0, -30);
        let (hi, lo) = two_product(a, a);
        hi == 1.0 + f64::powi(2.0, -29) && lo == f64::powi(2.0, -60)
    })
}

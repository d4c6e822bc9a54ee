//! Reduction primitives trait
//!
//! Backends implement the inner loops of every reduction. The exact variants
//! push error-free products into a superaccumulator; the fast variants are
//! plain IEEE loops kept for comparison and for non-reproducible consumers.

use crate::eft::two_product;
use crate::superacc::Superaccumulator;

/// Inner loops for exact and fast reductions over equally long slices
///
/// Callers check operand lengths; implementations may assume them equal.
pub trait ReductionPrimitives: Clone + Send + Sync {
    /// Get the name of this backend
    fn backend_name(&self) -> &'static str;

    /// Number of elements processed per step
    fn lane_width(&self) -> usize {
        1
    }

    /// Add Σ x[i]·y[i] exactly to `acc`
    fn accumulate_dot(&self, x: &[f64], y: &[f64], acc: &mut Superaccumulator) {
        debug_assert_eq!(x.len(), y.len());
        for (&a, &b) in x.iter().zip(y) {
            let (hi, lo) = two_product(a, b);
            acc.accumulate(hi);
            acc.accumulate(lo);
        }
    }

    /// Add Σ x[i]·y[i]·z[i] exactly to `acc`
    fn accumulate_dot3(&self, x: &[f64], y: &[f64], z: &[f64], acc: &mut Superaccumulator) {
        debug_assert_eq!(x.len(), y.len());
        debug_assert_eq!(x.len(), z.len());
        for ((&a, &b), &c) in x.iter().zip(y).zip(z) {
            for term in product3_terms(a, b, c) {
                acc.accumulate(term);
            }
        }
    }

    /// Add Σ x[i] exactly to `acc`
    fn accumulate_sum(&self, x: &[f64], acc: &mut Superaccumulator) {
        acc.accumulate_slice(x);
    }

    /// Naive left-to-right dot product
    fn fast_dot(&self, x: &[f64], y: &[f64]) -> f64 {
        x.iter().zip(y).fold(0.0, |s, (&a, &b)| s + a * b)
    }

    /// Naive left-to-right three-operand dot product
    fn fast_dot3(&self, x: &[f64], y: &[f64], z: &[f64]) -> f64 {
        x.iter()
            .zip(y)
            .zip(z)
            .fold(0.0, |s, ((&a, &b), &c)| s + a * b * c)
    }
}

/// Four doubles whose exact sum is `a·b·c`
///
/// Exact unless one of the partial error terms underflows.
#[inline(always)]
pub fn product3_terms(a: f64, b: f64, c: f64) -> [f64; 4] {
    let (h, l) = two_product(a, b);
    let (hh, hl) = two_product(h, c);
    let (lh, ll) = two_product(l, c);
    [hh, hl, lh, ll]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Plain;

    impl ReductionPrimitives for Plain {
        fn backend_name(&self) -> &'static str {
            "plain"
        }
    }

    #[test]
    fn test_default_methods() {
        let p = Plain;
        assert_eq!(p.lane_width(), 1);

        let x = [1e16, 1.0, -1e16];
        let ones = [1.0; 3];
        let mut acc = Superaccumulator::new();
        p.accumulate_dot(&x, &ones, &mut acc);
        assert_eq!(acc.round(), 1.0);
        assert_eq!(p.fast_dot(&x, &ones), 0.0);

        let mut acc = Superaccumulator::new();
        p.accumulate_dot3(&x, &ones, &[2.0; 3], &mut acc);
        assert_eq!(acc.round(), 2.0);
    }

    #[test]
    fn test_product3_terms_are_exact() {
        // (1 + 2^-30)^3 = 1 + 3·2^-30 + 3·2^-60 + 2^-90
        let a = 1.0 + f64::powi(2.0, -30);
        let terms = product3_terms(a, a, a);
        let acc: Superaccumulator = terms.into_iter().collect();
        let expected: Superaccumulator = [
            1.0,
            3.0 * f64::powi(2.0, -30),
            3.0 * f64::powi(2.0, -60),
            f64::powi(2.0, -90),
        ]
        .into_iter()
        .collect();
        assert!(acc.same_value(&expected));
    }
}

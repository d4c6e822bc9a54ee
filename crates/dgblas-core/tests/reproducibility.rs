//! Order, chunking and backend independence of exact reductions

mod common;

use common::{edge_case_lengths, ill_conditioned, special_values};
use dgblas_core::execution::{lane_sequential, scalar_sequential, ExecutionEngine};
use dgblas_core::{exact_dot, exact_sum, DeviceBuffer, DeviceEngine, Superaccumulator};
use proptest::prelude::*;

/// Values m·2^e that are exactly representable, with their exact sum kept
/// as an integer multiple of 2^-SCALE.
const SCALE: i32 = 30;

fn scaled_value() -> impl Strategy<Value = (i64, i32)> {
    (-(1i64 << 50)..(1i64 << 50), -SCALE..SCALE)
}

fn reference_sum(terms: &[(i64, i32)]) -> f64 {
    let total: i128 = terms
        .iter()
        .map(|&(m, e)| i128::from(m) << (e + SCALE))
        .sum();
    // i128 -> f64 rounds to nearest, ties to even
    total as f64 * f64::powi(2.0, -SCALE)
}

fn to_values(terms: &[(i64, i32)]) -> Vec<f64> {
    terms
        .iter()
        .map(|&(m, e)| m as f64 * f64::powi(2.0, e))
        .collect()
}

proptest! {
    #[test]
    fn prop_sum_is_correctly_rounded(terms in prop::collection::vec(scaled_value(), 0..200)) {
        let values = to_values(&terms);
        prop_assert_eq!(exact_sum(&values).unwrap().to_bits(), reference_sum(&terms).to_bits());
    }

    #[test]
    fn prop_sum_is_order_independent(
        values in prop::collection::vec(-1e30f64..1e30, 1..150)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let (original, shuffled) = values;
        prop_assert_eq!(
            exact_sum(&original).unwrap().to_bits(),
            exact_sum(&shuffled).unwrap().to_bits()
        );
    }

    #[test]
    fn prop_dot_is_order_independent(
        (x, y, order) in (1usize..150).prop_flat_map(|len| (
            prop::collection::vec(-1e30f64..1e30, len),
            prop::collection::vec(-1e30f64..1e30, len),
            Just((0..len).collect::<Vec<usize>>()).prop_shuffle(),
        ))
    ) {
        // one permutation applied to both operands keeps every product intact
        let xp: Vec<f64> = order.iter().map(|&i| x[i]).collect();
        let yp: Vec<f64> = order.iter().map(|&i| y[i]).collect();
        prop_assert_eq!(
            exact_dot(&x, &y).unwrap().to_bits(),
            exact_dot(&xp, &yp).unwrap().to_bits()
        );
    }

    #[test]
    fn prop_dot_is_chunk_independent(len in 0usize..500, chunk in 1usize..64, seed in any::<u64>()) {
        let x = ill_conditioned(len, seed);
        let y = ill_conditioned(len, seed.wrapping_add(1));
        let reference = scalar_sequential().exact_dot_superacc(&x, &y);
        let chunked = lane_sequential().with_chunk_size(chunk).exact_dot_superacc(&x, &y);
        prop_assert!(reference.same_value(&chunked));
    }

    #[test]
    fn prop_merge_is_associative(
        values in prop::collection::vec(-1e200f64..1e200, 3..60),
        cut1 in 0usize..20,
        cut2 in 0usize..20,
    ) {
        let a_end = cut1.min(values.len());
        let b_end = (a_end + cut2).min(values.len());
        let a: Superaccumulator = values[..a_end].iter().copied().collect();
        let b: Superaccumulator = values[a_end..b_end].iter().copied().collect();
        let c: Superaccumulator = values[b_end..].iter().copied().collect();

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        let mut bc = b;
        bc.merge(&c);
        let mut right = a;
        right.merge(&bc);

        let whole: Superaccumulator = values.iter().copied().collect();
        prop_assert!(left.same_value(&right));
        prop_assert!(left.same_value(&whole));
    }
}

#[test]
fn test_backends_agree_on_edge_lengths() {
    for len in edge_case_lengths() {
        let x = ill_conditioned(len, 7);
        let y = ill_conditioned(len, 8);
        let scalar = scalar_sequential().exact_dot_superacc(&x, &y).round();
        let lanes = lane_sequential().exact_dot_superacc(&x, &y).round();
        let device = DeviceEngine::with_block_size(8)
            .unwrap()
            .exact_dot_superacc(
                DeviceBuffer::upload(&x).as_f64(),
                DeviceBuffer::upload(&y).as_f64(),
            )
            .round();
        assert_eq!(scalar.to_bits(), lanes.to_bits(), "length {len}");
        assert_eq!(scalar.to_bits(), device.to_bits(), "length {len}");
        assert_eq!(exact_dot(&x, &y).unwrap().to_bits(), scalar.to_bits());
    }
}

#[test]
fn test_special_values_pairwise_cancel() {
    for v in special_values() {
        let values = [v, 1.0, -v];
        assert_eq!(exact_sum(&values).unwrap(), 1.0, "value {v:e}");
    }
}

#[test]
fn test_reversed_dot_is_identical() {
    let x = ill_conditioned(10_000, 42);
    let y = ill_conditioned(10_000, 43);
    let forward = exact_dot(&x, &y).unwrap();

    let xr: Vec<f64> = x.iter().rev().copied().collect();
    let yr: Vec<f64> = y.iter().rev().copied().collect();
    let backward = exact_dot(&xr, &yr).unwrap();
    assert_eq!(forward.to_bits(), backward.to_bits());
}

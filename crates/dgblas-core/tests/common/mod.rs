//! Shared utilities for integration tests

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Array lengths around the lane width and chunk boundaries
pub fn edge_case_lengths() -> Vec<usize> {
    vec![
        0,   // Empty
        1,   // Single element
        7,   // Lane width - 1
        8,   // Lane width
        9,   // Lane width + 1
        15,  // Multiple of no lane width
        16,  // Power of 2
        17,  // Power of 2 + 1
        63,  // Almost cache line
        64,  // Cache line
        127, // Mersenne prime
        1000,
    ]
}

/// Values that stress rounding and range handling
pub fn special_values() -> Vec<f64> {
    vec![
        0.0,
        -0.0,
        1.0,
        -1.0,
        f64::MAX,
        -f64::MAX,
        f64::MIN_POSITIVE,
        -f64::MIN_POSITIVE,
        5e-324,
        f64::EPSILON,
        std::f64::consts::PI,
        1e-308, // Near underflow
        1e308,  // Near overflow
    ]
}

/// Seeded data spanning many binades, so naive summation loses bits
pub fn ill_conditioned(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let mantissa: f64 = rng.gen_range(-1.0..1.0);
            let exponent: i32 = rng.gen_range(-40..40);
            mantissa * f64::powi(2.0, exponent)
        })
        .collect()
}

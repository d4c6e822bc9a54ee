//! Lane-parallel backend
//!
//! Processes `LANES` elements per step with the lane forms of the error-free
//! transformations and buffers the products in an [`Expansion`] cache. Tails
//! shorter than a lane group go through the same cache one element at a time.

use crate::eft::{load_lanes, two_product, two_product_lanes, LANES};
use crate::error::{Error, Result};
use crate::expansion::{Expansion, EXPANSION_SIZE};
use crate::primitives::traits::product3_terms;
use crate::primitives::ReductionPrimitives;
use crate::superacc::Superaccumulator;

type Cache = Expansion<LANES, EXPANSION_SIZE>;

/// Backend built on lane-wide fused multiply-add
#[derive(Clone, Copy, Debug)]
pub struct LaneBackend(());

impl LaneBackend {
    /// Create a new lane backend
    ///
    /// # Panics
    /// Panics if fused multiply-add is not correctly rounded on this host
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        match Self::try_new() {
            Ok(backend) => backend,
            Err(e) => panic!("{e}"),
        }
    }

    /// Create a new lane backend, reporting a missing capability as an error
    pub fn try_new() -> Result<Self> {
        Self::with_fma_check(Self::is_available)
    }

    /// Create a new lane backend gated on a custom capability check
    pub fn with_fma_check(check: impl FnOnce() -> bool) -> Result<Self> {
        if !check() {
            return Err(Error::FeatureNotAvailable(
                "lane backend requires a correctly rounded fused multiply-add".to_string(),
            ));
        }
        Ok(Self(()))
    }

    /// Check if the error-free product is exact on this host
    pub fn is_available() -> bool {
        crate::eft::fma_is_exact()
    }
}

impl ReductionPrimitives for LaneBackend {
    fn backend_name(&self) -> &'static str {
        "lanes"
    }

    fn lane_width(&self) -> usize {
        LANES
    }

    fn accumulate_dot(&self, x: &[f64], y: &[f64], acc: &mut Superaccumulator) {
        debug_assert_eq!(x.len(), y.len());
        let mut cache = Cache::new();
        let body = x.len() - x.len() % LANES;

        for i in (0..body).step_by(LANES) {
            let a: [f64; LANES] = load_lanes(x, i);
            let b: [f64; LANES] = load_lanes(y, i);
            let (hi, lo) = two_product_lanes(&a, &b);
            cache.accumulate_lanes(&hi);
            cache.accumulate_lanes(&lo);
        }
        for i in body..x.len() {
            let (hi, lo) = two_product(x[i], y[i]);
            cache.accumulate(hi);
            cache.accumulate(lo);
        }

        acc.merge(&cache.into_superacc());
    }

    fn accumulate_dot3(&self, x: &[f64], y: &[f64], z: &[f64], acc: &mut Superaccumulator) {
        debug_assert_eq!(x.len(), y.len());
        debug_assert_eq!(x.len(), z.len());
        let mut cache = Cache::new();
        let body = x.len() - x.len() % LANES;

        for i in (0..body).step_by(LANES) {
            let a: [f64; LANES] = load_lanes(x, i);
            let b: [f64; LANES] = load_lanes(y, i);
            let c: [f64; LANES] = load_lanes(z, i);
            let (h, l) = two_product_lanes(&a, &b);
            let (hh, hl) = two_product_lanes(&h, &c);
            let (lh, ll) = two_product_lanes(&l, &c);
            cache.accumulate_lanes(&hh);
            cache.accumulate_lanes(&hl);
            cache.accumulate_lanes(&lh);
            cache.accumulate_lanes(&ll);
        }
        for i in body..x.len() {
            for term in product3_terms(x[i], y[i], z[i]) {
                cache.accumulate(term);
            }
        }

        acc.merge(&cache.into_superacc());
    }

    fn accumulate_sum(&self, x: &[f64], acc: &mut Superaccumulator) {
        let mut cache = Cache::new();
        let body = x.len() - x.len() % LANES;
        for i in (0..body).step_by(LANES) {
            cache.accumulate_lanes(&load_lanes(x, i));
        }
        for &v in &x[body..] {
            cache.accumulate(v);
        }
        acc.merge(&cache.into_superacc());
    }

    fn fast_dot(&self, x: &[f64], y: &[f64]) -> f64 {
        let mut partial = [0.0; LANES];
        let body = x.len() - x.len() % LANES;
        for i in (0..body).step_by(LANES) {
            for k in 0..LANES {
                partial[k] = x[i + k].mul_add(y[i + k], partial[k]);
            }
        }
        let mut s: f64 = partial.iter().sum();
        for i in body..x.len() {
            s = x[i].mul_add(y[i], s);
        }
        s
    }
}

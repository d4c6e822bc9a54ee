//! Floating-point expansion cache in front of a superaccumulator
//!
//! Most products that enter a dot product are absorbed exactly by a short
//! cascade of `two_sum` slots. Only the residual that survives every slot
//! (and values large enough to overflow a slot) touches the superaccumulator,
//! which keeps the slow path cold for well-scaled data.
//!
//! At any time `Σ slots + superaccumulator` is the exact sum of all inputs.

use crate::eft::two_sum_lanes;
use crate::superacc::Superaccumulator;

/// Default number of cascade slots
pub const EXPANSION_SIZE: usize = 8;

// Inputs or slots above this magnitude could overflow inside two_sum.
const GUARD: f64 = 1.0715086071862673e301; // 2^1000

/// `N` lane-wide `two_sum` slots backed by a superaccumulator
#[derive(Clone, Debug)]
pub struct Expansion<const L: usize, const N: usize> {
    slots: [[f64; L]; N],
    acc: Superaccumulator,
}

impl<const L: usize, const N: usize> Default for Expansion<L, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const L: usize, const N: usize> Expansion<L, N> {
    pub fn new() -> Self {
        Self {
            slots: [[0.0; L]; N],
            acc: Superaccumulator::new(),
        }
    }

    /// Absorb one lane group of values exactly
    #[inline]
    pub fn accumulate_lanes(&mut self, values: &[f64; L]) {
        let mut x = *values;
        for v in x.iter_mut() {
            // also catches NaN
            if !(v.abs() <= GUARD) {
                self.acc.accumulate(*v);
                *v = 0.0;
            }
        }

        for slot in self.slots.iter_mut() {
            for s in slot.iter_mut() {
                if s.abs() > GUARD {
                    self.acc.accumulate(*s);
                    *s = 0.0;
                }
            }
            let (sum, err) = two_sum_lanes(slot, &x);
            *slot = sum;
            x = err;
            if x.iter().all(|&v| v == 0.0) {
                return;
            }
        }

        for &v in &x {
            self.acc.accumulate(v);
        }
    }

    /// Absorb a single value (placed in lane 0)
    #[inline]
    pub fn accumulate(&mut self, value: f64) {
        let mut lanes = [0.0; L];
        if L == 0 {
            self.acc.accumulate(value);
            return;
        }
        lanes[0] = value;
        self.accumulate_lanes(&lanes);
    }

    /// Move every slot into the superaccumulator
    pub fn flush(&mut self) {
        for slot in self.slots.iter_mut() {
            for s in slot.iter_mut() {
                self.acc.accumulate(*s);
                *s = 0.0;
            }
        }
    }

    /// Flush and hand out the exact total
    pub fn into_superacc(mut self) -> Superaccumulator {
        self.flush();
        self.acc
    }
}

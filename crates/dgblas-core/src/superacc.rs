//! Fixed-point superaccumulator
//!
//! A superaccumulator represents an exact running sum of IEEE-754 doubles as
//! 39 signed 64-bit bins. Bin `i` carries place value `2^(56·(i − 20))`, so the
//! bins together span `2^-1120 .. 2^1064` and every double (`2^-1074` up to
//! `2^1024`) fits with room for carries.
//!
//! Each bin holds a 56-bit digit plus 8 carry-save bits. Accumulation only
//! touches the one or two bins that straddle a value's place value; carries
//! into higher bins are propagated lazily once a bin leaves the carry-save
//! range. Between normalizations the bins are therefore out of canonical
//! range, but `Σ bins[i]·2^(56·(i − 20))` always equals the exact sum of
//! everything accumulated so far. This is what makes accumulation order,
//! chunking and the merge tree irrelevant for the final result.
//!
//! Canonical form (after [`Superaccumulator::normalize`]): bins `0..38` in
//! `[0, 2^56)`, the top bin signed. It is unique per value.

use crate::error::{Error, Result};
use num_traits::Float;

/// Number of bins
pub const BIN_COUNT: usize = 39;
/// Digit width of a bin
pub const DIGITS: u32 = 56;
/// Carry-save bits on top of each digit
pub const KRX: u32 = 8;
/// Bins below the unit place value
pub const F_WORDS: usize = 20;
/// Words in the serialized form (bins plus the non-finite slot)
pub const WIRE_WORDS: usize = BIN_COUNT + 1;

const TOP: usize = BIN_COUNT - 1;
const DIGIT_MASK: u64 = (1 << DIGITS) - 1;
// A bin is carried into its neighbour once its magnitude reaches this bound,
// which keeps every later addition of a digit-sized word overflow free.
const CARRY_THRESHOLD: u64 = 1 << (DIGITS + KRX - 2);
// Bit position of 2^0 inside the bin array.
const BIT_OFFSET: i32 = F_WORDS as i32 * DIGITS as i32;
// Bit position of the smallest subnormal, 2^-1074.
const MIN_BIT: usize = (BIT_OFFSET - 1074) as usize;

/// Exact accumulator for sums of doubles
#[derive(Clone, Debug)]
pub struct Superaccumulator {
    bins: [i64; BIN_COUNT],
    // Dirty range; imin > imax when the accumulator is normalized.
    imin: usize,
    imax: usize,
    // IEEE sum of NaN / infinite inputs (and of overflow beyond the top bin).
    special: f64,
}

impl Default for Superaccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Superaccumulator {
    /// Create a zeroed accumulator
    pub fn new() -> Self {
        Self {
            bins: [0; BIN_COUNT],
            imin: BIN_COUNT,
            imax: 0,
            special: 0.0,
        }
    }

    /// Add one double exactly
    pub fn accumulate(&mut self, x: f64) {
        if x == 0.0 {
            return;
        }
        if !x.is_finite() {
            self.special += x;
            return;
        }

        // x = sign · mantissa · 2^exponent with mantissa < 2^54
        let (mantissa, exponent, sign) = Float::integer_decode(x);
        let position = (i32::from(exponent) + BIT_OFFSET) as u32;
        let bin = (position / DIGITS) as usize;
        let shifted = u128::from(mantissa) << (position % DIGITS);

        let mut lo = (shifted as u64 & DIGIT_MASK) as i64;
        let mut hi = (shifted >> DIGITS) as i64;
        if sign < 0 {
            lo = -lo;
            hi = -hi;
        }
        if lo != 0 {
            self.add_word(bin, lo);
        }
        if hi != 0 {
            self.add_word(bin + 1, hi);
        }
    }

    /// Add every value of a slice exactly
    pub fn accumulate_slice(&mut self, values: &[f64]) {
        for &x in values {
            self.accumulate(x);
        }
    }

    /// Propagate carries so that every bin is back in canonical range
    pub fn normalize(&mut self) {
        if self.is_normalized() {
            return;
        }
        let (lo, hi) = (self.imin, self.imax);
        self.normalize_range(lo, hi);
    }

    /// Propagate carries starting at bin `lo`, at least up to bin `hi`
    ///
    /// The range is widened to the tracked dirty range, so passing a range
    /// that is too narrow cannot leave the accumulator unnormalized.
    pub fn normalize_range(&mut self, lo: usize, hi: usize) {
        let lo = lo.min(self.imin).min(TOP);
        let hi = hi.max(self.imax.min(TOP)).min(TOP);

        let mut i = lo;
        while i < TOP {
            let carry = self.bins[i] >> DIGITS;
            self.bins[i] -= carry << DIGITS;
            if carry == 0 && i >= hi {
                break;
            }
            if i + 1 == TOP {
                self.add_top(carry);
            } else {
                self.bins[i + 1] += carry;
            }
            i += 1;
        }

        self.imin = BIN_COUNT;
        self.imax = 0;
    }

    /// Whether all bins are in canonical range
    pub fn is_normalized(&self) -> bool {
        self.imin > self.imax
    }

    /// Add another accumulator bin by bin
    ///
    /// Both operands are normalized first; the result is normalized again, so
    /// merges can be chained in any tree shape.
    pub fn merge(&mut self, other: &Superaccumulator) {
        self.normalize();
        let normalized;
        let other = if other.is_normalized() {
            other
        } else {
            let mut copy = other.clone();
            copy.normalize();
            normalized = copy;
            &normalized
        };

        for i in 0..TOP {
            self.bins[i] += other.bins[i];
        }
        self.add_top(other.bins[TOP]);
        self.special += other.special;

        self.imin = 0;
        self.imax = TOP;
        self.normalize();
    }

    /// Correctly rounded double nearest to the exact sum (ties to even)
    pub fn round(&self) -> f64 {
        if self.special != 0.0 {
            return self.special;
        }

        let mut acc = self.clone();
        acc.normalize();
        let negative = acc.bins[TOP] < 0;
        let digits = acc.magnitude_digits(negative);

        let Some(lead) = digits.iter().rposition(|&d| d != 0) else {
            return 0.0;
        };
        let msb = lead * DIGITS as usize + (63 - digits[lead].leading_zeros() as usize);
        // 53 significant bits, or fewer once the result is subnormal
        let lsb = msb.saturating_sub(52).max(MIN_BIT);

        let mut mantissa: u64 = 0;
        for p in (lsb..=msb).rev() {
            mantissa = (mantissa << 1) | bit(&digits, p);
        }
        let round_bit = bit(&digits, lsb - 1) == 1;
        let sticky = any_below(&digits, lsb - 1);
        if round_bit && (sticky || mantissa & 1 == 1) {
            mantissa += 1;
        }

        let magnitude = mantissa as f64 * pow2(lsb as i32 - BIT_OFFSET);
        if negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Whether the represented sum is exactly zero
    pub fn is_zero(&self) -> bool {
        if self.special != 0.0 {
            return false;
        }
        let mut acc = self.clone();
        acc.normalize();
        acc.bins.iter().all(|&b| b == 0)
    }

    /// Whether two accumulators represent the same exact value
    pub fn same_value(&self, other: &Superaccumulator) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.normalize();
        b.normalize();
        a.bins == b.bins && a.special.to_bits() == b.special.to_bits()
    }

    /// Raw bins (canonical only after `normalize`)
    pub fn bins(&self) -> &[i64; BIN_COUNT] {
        &self.bins
    }

    /// Serialize the normalized accumulator as little-endian words
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut acc = self.clone();
        acc.normalize();

        let mut words = [0i64; WIRE_WORDS];
        for (w, &b) in words.iter_mut().zip(acc.bins.iter()) {
            *w = b.to_le();
        }
        words[BIN_COUNT] = (acc.special.to_bits() as i64).to_le();
        bytemuck::cast_slice::<i64, u8>(&words).to_vec()
    }

    /// Rebuild an accumulator from [`Superaccumulator::to_bytes`] output
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != WIRE_WORDS * 8 {
            return Err(Error::size_mismatch(
                WIRE_WORDS * 8,
                bytes.len(),
                "superaccumulator wire format",
            ));
        }

        let mut words = [0i64; WIRE_WORDS];
        for (w, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            *w = i64::from_le(bytemuck::pod_read_unaligned::<i64>(chunk));
        }

        let mut acc = Self::new();
        acc.bins.copy_from_slice(&words[..BIN_COUNT]);
        acc.special = f64::from_bits(words[BIN_COUNT] as u64);

        if acc.bins[..TOP]
            .iter()
            .any(|&b| !(0..=DIGIT_MASK as i64).contains(&b))
        {
            return Err(Error::InvalidInput(
                "superaccumulator bins are not in canonical range".to_string(),
            ));
        }
        Ok(acc)
    }

    fn mark_dirty(&mut self, i: usize) {
        self.imin = self.imin.min(i);
        self.imax = self.imax.max(i);
    }

    fn add_word(&mut self, i: usize, x: i64) {
        self.mark_dirty(i);
        if i == TOP {
            self.add_top(x);
            return;
        }
        // |bins[i]| < 2^62 and |x| < 2^56, no overflow possible
        self.bins[i] += x;
        if self.bins[i].unsigned_abs() >= CARRY_THRESHOLD {
            self.carry_from(i);
        }
    }

    fn carry_from(&mut self, mut i: usize) {
        while i < TOP {
            let carry = self.bins[i] >> DIGITS;
            self.bins[i] -= carry << DIGITS;
            i += 1;
            self.mark_dirty(i);
            if i == TOP {
                self.add_top(carry);
                return;
            }
            self.bins[i] += carry;
            if self.bins[i].unsigned_abs() < CARRY_THRESHOLD {
                return;
            }
        }
    }

    fn add_top(&mut self, x: i64) {
        match self.bins[TOP].checked_add(x) {
            Some(v) => self.bins[TOP] = v,
            // The sum left the range of any double by more than 2^40
            None => {
                self.special += if x > 0 {
                    f64::INFINITY
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    // Base-2^56 digits of |sum|; requires a normalized accumulator.
    fn magnitude_digits(&self, negative: bool) -> [u64; BIN_COUNT] {
        let mut digits = [0u64; BIN_COUNT];
        if !negative {
            for (d, &b) in digits.iter_mut().zip(self.bins.iter()) {
                *d = b as u64;
            }
            return digits;
        }

        let mut carry = 0i64;
        for i in 0..TOP {
            let v = carry - self.bins[i];
            carry = v >> DIGITS;
            digits[i] = (v - (carry << DIGITS)) as u64;
        }
        digits[TOP] = (i128::from(carry) - i128::from(self.bins[TOP])) as u64;
        digits
    }
}

impl Extend<f64> for Superaccumulator {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for x in iter {
            self.accumulate(x);
        }
    }
}

impl FromIterator<f64> for Superaccumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        acc.extend(iter);
        acc
    }
}

fn split_position(p: usize) -> (usize, usize) {
    let idx = (p / DIGITS as usize).min(TOP);
    (idx, p - idx * DIGITS as usize)
}

fn bit(digits: &[u64; BIN_COUNT], p: usize) -> u64 {
    let (idx, off) = split_position(p);
    if off >= 64 {
        0
    } else {
        (digits[idx] >> off) & 1
    }
}

// Any set bit strictly below position p.
fn any_below(digits: &[u64; BIN_COUNT], p: usize) -> bool {
    let (idx, off) = split_position(p);
    let mask = if off >= 64 { u64::MAX } else { (1u64 << off) - 1 };
    digits[..idx].iter().any(|&d| d != 0) || digits[idx] & mask != 0
}

// Exact power of two for -1074 <= k <= 1023.
fn pow2(k: i32) -> f64 {
    debug_assert!((-1074..=1023).contains(&k));
    if k >= -1022 {
        f64::from_bits(((k + 1023) as u64) << 52)
    } else {
        f64::from_bits(1u64 << (k + 1074))
    }
}

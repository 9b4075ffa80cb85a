//! Random Number Generator.

#![allow(dead_code)]

use crate::common::*;
use crate::geometry::Point2f;

/// 32-bit precision value for 1 - epsilon.
pub const FLOAT_ONE_MINUS_EPSILON: f32 = hexf32!("0x1.fffffep-1"); // 0.99999994

/// 1 - epsilon in the precision we've selected for `Float`.
pub const ONE_MINUS_EPSILON: Float = FLOAT_ONE_MINUS_EPSILON;

const PCG32_DEFAULT_STATE: u64 = 0x853c49e6748fea9b;
const PCG32_DEFAULT_STREAM: u64 = 0xda3e39cb94b95bdb;
const PCG32_MULT: u64 = 0x5851f42d4c957f2d;

/// Implements the PCG pseudo-random number generator.
#[derive(Clone, Debug)]
pub struct Rng {
    state: u64,
    inc: u64,
}

impl Default for Rng {
    /// Return a new instance of `Rng` with default state and stream.
    fn default() -> Self {
        Self {
            state: PCG32_DEFAULT_STATE,
            inc: PCG32_DEFAULT_STREAM,
        }
    }
}

impl Rng {
    /// Create a new `Rng` from a seed and a stream sequence. Generators with
    /// the same seed but different sequences produce independent streams.
    ///
    /// * `seed`     - The seed value.
    /// * `sequence` - The stream selector.
    pub fn new(seed: u64, sequence: u64) -> Self {
        let mut ret = Self { state: 0, inc: 0 };
        ret.set_sequence(seed, sequence);
        ret
    }

    /// Initialize the random number generator state for a seed and sequence.
    ///
    /// * `seed`     - The seed value.
    /// * `sequence` - The stream selector.
    #[inline(always)]
    fn set_sequence(&mut self, seed: u64, sequence: u64) {
        self.state = 0;
        let (inc, _) = sequence.overflowing_shl(1);
        self.inc = inc | 1;
        let _ = self.uniform_u32();

        let (state, _) = self.state.overflowing_add(seed);
        self.state = state;
        let _ = self.uniform_u32();
    }

    /// Returns a uniformly distributed u32 value.
    #[inline(always)]
    pub fn uniform_u32(&mut self) -> u32 {
        let old_state = self.state;
        let (new_state, _) = old_state.overflowing_mul(PCG32_MULT);
        let (new_state, _) = new_state.overflowing_add(self.inc);
        self.state = new_state;

        let (xor_shifted, _) = old_state.overflowing_shr(18);
        let (xor_shifted, _) = (xor_shifted ^ old_state).overflowing_shr(27);
        let xor_shifted = xor_shifted as u32;

        let (rot, _) = old_state.overflowing_shr(59);
        let rot = rot as u32;

        let (r1, _) = xor_shifted.overflowing_shr(rot);
        let (bits, _) = (!rot).overflowing_add(1);
        let (r2, _) = xor_shifted.overflowing_shl(bits & 31);

        r1 | r2
    }

    /// Returns a uniformly distributed value in `[0, n)`.
    ///
    /// * `n` - The exclusive upper bound.
    #[inline(always)]
    pub fn uniform_u32_below(&mut self, n: u32) -> u32 {
        self.uniform_u32() % n
    }

    /// Returns a uniformly distributed value over the half open interval [0.0, 1.0).
    pub fn uniform_float(&mut self) -> Float {
        min(
            self.uniform_u32() as Float * hexf32!("0x1.0p-32") as Float,
            FLOAT_ONE_MINUS_EPSILON,
        )
    }

    /// Returns a 2-D point with coordinates uniformly distributed in [0.0, 1.0)².
    pub fn uniform_point2f(&mut self) -> Point2f {
        let x = self.uniform_float();
        let y = self.uniform_float();
        Point2f::new(x, y)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Rng::new(42, 7);
        let mut b = Rng::new(42, 7);
        for _ in 0..100 {
            assert_eq!(a.uniform_u32(), b.uniform_u32());
        }
    }

    #[test]
    fn sequences_are_independent() {
        let mut a = Rng::new(42, 1);
        let mut b = Rng::new(42, 2);
        let matches = (0..100).filter(|_| a.uniform_u32() == b.uniform_u32()).count();
        assert!(matches < 10);
    }

    #[test]
    fn uniform_float_range() {
        let mut rng = Rng::new(961748941, 1);
        for _ in 0..10_000 {
            let v = rng.uniform_float();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn uniform_u32_below_range() {
        let mut rng = Rng::new(1301081, 1);
        for _ in 0..10_000 {
            assert!(rng.uniform_u32_below(1 << 31) < (1 << 31));
        }
    }
}

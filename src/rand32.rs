//! 32-bit random value composition
//!
//! Protocol exchanges need full 32-bit random values while host RNGs only
//! guarantee 15 bits per draw. [`rand32_compose`] widens a bounded source
//! to 32 bits; [`Lcg32`] is a deterministic generator for tests.

use rand::RngCore;

/// Deterministic 32-bit linear congruential generator
///
/// Not suitable for anything security-sensitive; used where tests need a
/// reproducible value stream.
#[derive(Debug, Clone)]
pub struct Lcg32 {
    state: u32,
}

impl Lcg32 {
    /// Create a generator from a seed
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advance the generator and return the next value
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.state
    }
}

/// Compose a 32-bit value from a bounded random source.
///
/// `source_max` is the largest value `draw` can return; the number of
/// draws is however many are needed for the combined range to cover
/// 32 bits (one for a full-width source, three for a 15-bit one).
pub fn rand32_compose(source_max: u32, mut draw: impl FnMut() -> u32) -> u32 {
    let span = u64::from(source_max) + 1;
    let mut covered: u64 = 1;
    let mut result: u32 = 0;
    while covered < 1 << 32 {
        result = result
            .wrapping_mul(source_max.wrapping_add(1))
            .wrapping_add(draw());
        covered = covered.saturating_mul(span);
    }
    result
}

/// Produce a 32-bit random value from a host RNG.
pub fn rand32<R: RngCore + ?Sized>(rng: &mut R) -> u32 {
    rand32_compose(u32::MAX, || rng.next_u32())
}

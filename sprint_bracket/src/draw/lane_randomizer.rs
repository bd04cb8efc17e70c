//! Random lane draws.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

/// Source of randomness for drawing lots.
///
/// Passed explicitly into every call that may shuffle lanes, so a seeded
/// randomizer reproduces a whole competition.
#[derive(Debug, Clone)]
pub struct LaneRandomizer {
    rng: StdRng,
}

impl LaneRandomizer {
    /// Create a randomizer seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a reproducible randomizer
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Shuffle lanes in place with an unbiased permutation
    pub fn draw_lots<T>(&mut self, lanes: &mut [T]) {
        lanes.shuffle(&mut self.rng);
    }
}

impl Default for LaneRandomizer {
    fn default() -> Self {
        Self::new()
    }
}

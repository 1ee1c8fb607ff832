//! Test RNG — a deterministic `DeterministicRng` for repeatable session seeds.

use casefile_core::rng::DeterministicRng;

/// An RNG that returns values from a predetermined sequence, cycling when
/// exhausted. Used in tests that need specific, repeatable session seeds.
#[derive(Debug)]
pub struct SequenceRng {
    values: Vec<u32>,
    index: usize,
}

impl SequenceRng {
    /// Create a new `SequenceRng` with the given values.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        if self.values.is_empty() {
            return min;
        }
        let val = self.values[self.index % self.values.len()];
        self.index += 1;
        val
    }
}

use crate::config::IsiRange;
use rand::Rng;

/// Draws interstimulus intervals from a discrete range.
///
/// Each draw is independent and uniform over the full candidate set, so the
/// same value may occur any number of times in a run.
pub struct IntervalSampler<R: Rng> {
    candidates: Vec<u64>,
    rng: R,
}

impl<R: Rng> IntervalSampler<R> {
    pub fn new(range: IsiRange, rng: R) -> Self {
        Self {
            candidates: range.candidates(),
            rng,
        }
    }

    pub fn candidates(&self) -> &[u64] {
        &self.candidates
    }

    /// `count` durations in milliseconds.
    pub fn sample(&mut self, count: usize) -> Vec<u64> {
        if self.candidates.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|_| self.candidates[self.rng.random_range(0..self.candidates.len())])
            .collect()
    }
}

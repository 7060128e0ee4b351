//! Seeded measurement sampling.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Measurement histogram over basis-state indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    shots: u32,
    outcomes: BTreeMap<usize, u32>,
}

impl Counts {
    pub fn shots(&self) -> u32 {
        self.shots
    }

    pub fn get(&self, outcome: usize) -> u32 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Outcomes in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.outcomes.iter().map(|(&k, &v)| (k, v))
    }

    /// Total count over outcomes matching `predicate`.
    pub fn count_where(&self, predicate: impl Fn(usize) -> bool) -> u32 {
        self.outcomes
            .iter()
            .filter(|&(&k, _)| predicate(k))
            .map(|(_, &v)| v)
            .sum()
    }

    fn record(&mut self, outcome: usize) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        self.shots += 1;
    }
}

/// Draws shots from a probability distribution with a reproducible RNG.
///
/// Two samplers built from the same seed produce identical histograms for
/// the same distribution.
pub struct ShotSampler {
    rng: StdRng,
}

impl ShotSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sample `shots` outcomes from `probabilities`. The distribution does
    /// not have to be normalized exactly; draws are scaled by its total.
    pub fn sample(&mut self, probabilities: &[f64], shots: u32) -> Counts {
        let mut cumulative = Vec::with_capacity(probabilities.len());
        let mut total = 0.0;
        for p in probabilities {
            total += p.max(0.0);
            cumulative.push(total);
        }

        let mut counts = Counts::default();
        if total <= 0.0 {
            return counts;
        }
        for _ in 0..shots {
            let r: f64 = self.rng.r#gen::<f64>() * total;
            let outcome = cumulative
                .partition_point(|&c| c <= r)
                .min(cumulative.len() - 1);
            counts.record(outcome);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_state_always_sampled() {
        let mut sampler = ShotSampler::new(7);
        let counts = sampler.sample(&[0.0, 1.0, 0.0, 0.0], 100);
        assert_eq!(counts.get(1), 100);
        assert_eq!(counts.shots(), 100);
    }

    #[test]
    fn same_seed_same_histogram() {
        let probs = [0.1, 0.2, 0.3, 0.4];
        let a = ShotSampler::new(42).sample(&probs, 1000);
        let b = ShotSampler::new(42).sample(&probs, 1000);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let probs = [0.25; 4];
        let a = ShotSampler::new(1).sample(&probs, 1000);
        let b = ShotSampler::new(2).sample(&probs, 1000);
        assert_ne!(a, b);
    }

    #[test]
    fn frequencies_track_probabilities() {
        let probs = [0.7, 0.3];
        let counts = ShotSampler::new(3).sample(&probs, 20_000);
        let freq = f64::from(counts.get(0)) / 20_000.0;
        assert!((freq - 0.7).abs() < 0.02);
    }

    #[test]
    fn count_where_filters_outcomes() {
        let counts = ShotSampler::new(5).sample(&[0.5, 0.5], 200);
        assert_eq!(counts.count_where(|i| i & 1 == 1), counts.get(1));
    }

    #[test]
    fn empty_distribution_yields_no_shots() {
        let counts = ShotSampler::new(5).sample(&[0.0, 0.0], 10);
        assert_eq!(counts.shots(), 0);
    }
}

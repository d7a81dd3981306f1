use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::instrument;

/// Strategy for drawing samples without replacement from a set of eligible pool indices.
pub trait Sampler {
    /// Chooses `min(count, eligible.len())` distinct entries of `eligible`, in selection order.
    fn choose(&mut self, eligible: &[usize], count: usize) -> Vec<usize>;
}

/// Uniform random selection without replacement.
#[derive(Debug, Clone)]
pub struct UniformSampler {
    rng: StdRng,
}

impl UniformSampler {
    /// A sampler seeded from operating system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// A reproducible sampler.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when `seed` is given, entropy-seeded otherwise.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::new, Self::seeded)
    }
}

impl Default for UniformSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for UniformSampler {
    #[instrument(level = "trace", skip_all, fields(available = eligible.len(), count))]
    fn choose(&mut self, eligible: &[usize], count: usize) -> Vec<usize> {
        eligible
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect()
    }
}

/// Deterministic selection of the first eligible indices, in pool order.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedSampler;

impl Sampler for OrderedSampler {
    fn choose(&mut self, eligible: &[usize], count: usize) -> Vec<usize> {
        eligible.iter().take(count).copied().collect()
    }
}

impl<S: Sampler + ?Sized> Sampler for &mut S {
    fn choose(&mut self, eligible: &[usize], count: usize) -> Vec<usize> {
        (**self).choose(eligible, count)
    }
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    fn choose(&mut self, eligible: &[usize], count: usize) -> Vec<usize> {
        (**self).choose(eligible, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uniform_sampler_draws_distinct_eligible_indices() {
        let eligible: Vec<usize> = (10..30).collect();
        let mut sampler = UniformSampler::seeded(7);
        let chosen = sampler.choose(&eligible, 8);
        assert_eq!(chosen.len(), 8);
        assert_eq!(chosen.iter().collect::<HashSet<_>>().len(), 8);
        assert!(chosen.iter().all(|i| eligible.contains(i)));
    }

    #[test]
    fn uniform_sampler_is_reproducible_with_a_seed() {
        let eligible: Vec<usize> = (0..50).collect();
        let a = UniformSampler::seeded(42).choose(&eligible, 10);
        let b = UniformSampler::seeded(42).choose(&eligible, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn samplers_cap_at_available_count() {
        let eligible = vec![3, 5];
        assert_eq!(UniformSampler::seeded(1).choose(&eligible, 10).len(), 2);
        assert_eq!(OrderedSampler.choose(&eligible, 10), vec![3, 5]);
        assert!(OrderedSampler.choose(&[], 4).is_empty());
    }

    #[test]
    fn ordered_sampler_takes_leading_indices() {
        assert_eq!(OrderedSampler.choose(&[4, 1, 9, 2], 2), vec![4, 1]);
    }

    #[test]
    fn boxed_samplers_delegate() {
        let mut boxed: Box<dyn Sampler> = Box::new(OrderedSampler);
        assert_eq!(boxed.choose(&[8, 9], 1), vec![8]);
    }
}

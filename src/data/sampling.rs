//! Class-balanced mini-batch sampling

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::{ApplianceError, ClassPair, Result};

/// Per-record sampling weights giving each class of the pair half the mass
///
/// A record of class `c` gets `0.5 / count(c)`. If one class is absent the
/// weights sum to 0.5 and [`BatchSampler::new`] rejects them.
pub fn class_balanced_weights(labels: &[usize], pair: ClassPair) -> Vec<f64> {
    let count_a = labels.iter().filter(|&&l| l == pair.a).count();
    let count_b = labels.len() - count_a;
    let weight_a = 0.5 / count_a as f64;
    let weight_b = 0.5 / count_b as f64;

    labels
        .iter()
        .map(|&l| if l == pair.a { weight_a } else { weight_b })
        .collect()
}

/// Draws positions into a weighted population, with replacement
#[derive(Debug, Clone)]
pub struct BatchSampler {
    distribution: WeightedIndex<f64>,
}

impl BatchSampler {
    pub fn new(weights: &[f64]) -> Result<Self> {
        let total_mass: f64 = weights.iter().sum();
        if !total_mass.is_finite() || (total_mass - 1.0).abs() > 1e-6 {
            return Err(ApplianceError::Sampling(format!(
                "weights over {} records sum to {}, expected 1",
                weights.len(),
                total_mass
            )));
        }
        let distribution =
            WeightedIndex::new(weights).map_err(|e| ApplianceError::Sampling(e.to_string()))?;
        Ok(BatchSampler { distribution })
    }

    /// Balanced sampler over records of a class pair
    pub fn balanced(labels: &[usize], pair: ClassPair) -> Result<Self> {
        Self::new(&class_balanced_weights(labels, pair)).map_err(|e| {
            ApplianceError::Sampling(format!("pair {} has an empty class: {}", pair, e))
        })
    }

    /// Draw `batch_size` positions
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize) -> Vec<usize> {
        (0..batch_size).map(|_| self.distribution.sample(rng)).collect()
    }
}

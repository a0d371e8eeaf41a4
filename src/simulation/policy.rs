//! Linear context-conditioned policy.
//!
//! Inference projects sampled states through a fixed random basis and takes
//! the reward-weighted mean, so the context points toward the region of
//! feature space the reward favours. The actor is a single `tanh` layer over
//! `[features; context]`.

use super::traits::{Environment, PolicyModel};
use super::types::Observation;
use crate::cache::ContextVector;
use crate::error::ComputationError;
use crate::reward::RewardConfiguration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct LinearPolicy {
    context_dim: usize,
    action_dim: usize,
    samples: usize,
    /// `context_dim × FEATURE_DIM`
    basis: Vec<Vec<f64>>,
    /// `action_dim × (FEATURE_DIM + context_dim)`
    actor: Vec<Vec<f64>>,
}

impl LinearPolicy {
    pub fn new(context_dim: usize, action_dim: usize, samples: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let features = Observation::FEATURE_DIM;
        let basis = random_matrix(&mut rng, context_dim, features);
        let actor = random_matrix(&mut rng, action_dim, features + context_dim);
        Self {
            context_dim,
            action_dim,
            samples: samples.max(1),
            basis,
            actor,
        }
    }

    fn project<'a>(&'a self, features: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        self.basis.iter().map(move |row| dot(row, features))
    }

    /// Rescale to norm `sqrt(context_dim)` so every context has the same scale.
    fn normalize(&self, values: &mut [f64]) -> Result<(), ComputationError> {
        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if !norm.is_finite() || norm == 0.0 {
            return Err(ComputationError::new(format!(
                "degenerate context (norm {norm})"
            )));
        }
        let scale = (self.context_dim as f64).sqrt() / norm;
        for value in values.iter_mut() {
            *value *= scale;
        }
        Ok(())
    }
}

impl PolicyModel for LinearPolicy {
    fn context_dim(&self) -> usize {
        self.context_dim
    }

    fn sample_context(&mut self, rng: &mut StdRng) -> ContextVector {
        let mut values: Vec<f64> = (0..self.context_dim)
            .map(|_| rng.random_range(-1.0..=1.0))
            .collect();
        if self.normalize(&mut values).is_err() {
            values = vec![1.0; self.context_dim];
        }
        ContextVector::new(values.into_iter().map(|v| v as f32).collect())
    }

    fn infer_context(
        &mut self,
        env: &dyn Environment,
        reward: &RewardConfiguration,
        rng: &mut StdRng,
    ) -> Result<ContextVector, ComputationError> {
        let states = env.sample_states(self.samples, rng);
        let mut context = vec![0.0; self.context_dim];
        let mut total = 0.0;

        for state in &states {
            let r = reward.evaluate(state);
            if !r.is_finite() {
                return Err(ComputationError::new("reward evaluated to a non-finite value"));
            }
            if r == 0.0 {
                continue;
            }
            total += r;
            for (slot, projected) in context.iter_mut().zip(self.project(&state.features())) {
                *slot += r * projected;
            }
        }

        if total <= 0.0 {
            return Err(ComputationError::new(format!(
                "reward is zero on all {} sampled states",
                states.len()
            )));
        }
        self.normalize(&mut context)?;
        Ok(ContextVector::new(
            context.into_iter().map(|v| v as f32).collect(),
        ))
    }

    fn act(&mut self, observation: &Observation, context: &ContextVector) -> Vec<f64> {
        let mut input = observation.features();
        input.extend(context.as_slice().iter().map(|v| f64::from(*v)));
        input.resize(Observation::FEATURE_DIM + self.context_dim, 0.0);
        let scale = 1.0 / (input.len() as f64).sqrt();

        self.actor
            .iter()
            .take(self.action_dim)
            .map(|row| (dot(row, &input) * scale).tanh())
            .collect()
    }
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|_| (0..cols).map(|_| rng.random_range(-1.0..=1.0)).collect())
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

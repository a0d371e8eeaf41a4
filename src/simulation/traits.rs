use super::types::{Frame, Observation, StepOutcome, VideoQuality};
use crate::cache::ContextVector;
use crate::error::ComputationError;
use crate::reward::RewardConfiguration;
use rand::rngs::StdRng;

/// Physics environment driven by the simulation worker.
///
/// Implementations hold process-wide mutable state and are only ever touched
/// from the worker thread, so they need `Send` but not `Sync`.
pub trait Environment: Send {
    fn reset(&mut self) -> Observation;

    fn step(&mut self, action: &[f64]) -> StepOutcome;

    fn render(&mut self, quality: VideoQuality) -> Frame;

    fn body_names(&self) -> Vec<String>;

    fn joint_positions(&self) -> Vec<f64>;

    /// Size of the action vector `step` expects.
    fn action_dim(&self) -> usize;

    /// Plausible states used to score a reward function during inference.
    fn sample_states(&self, count: usize, rng: &mut StdRng) -> Vec<Observation>;

    /// Elapsed control steps in the current episode.
    fn step_count(&self) -> u64;
}

/// Context-conditioned control policy.
pub trait PolicyModel: Send {
    /// Length of every context vector this model produces or consumes.
    fn context_dim(&self) -> usize;

    /// A random context, used before any reward is requested.
    fn sample_context(&mut self, rng: &mut StdRng) -> ContextVector;

    /// Infer the context that best optimizes `reward` over states sampled
    /// from `env`.
    fn infer_context(
        &mut self,
        env: &dyn Environment,
        reward: &RewardConfiguration,
        rng: &mut StdRng,
    ) -> Result<ContextVector, ComputationError>;

    fn act(&mut self, observation: &Observation, context: &ContextVector) -> Vec<f64>;
}

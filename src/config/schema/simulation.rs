use crate::simulation::VideoQuality;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Target simulation step rate
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Bounded request queue in front of the simulation thread
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Length of the policy's context vector
    #[serde(default = "default_context_dim")]
    pub context_dim: usize,
    /// States sampled per context inference
    #[serde(default = "default_inference_samples")]
    pub inference_samples: usize,
    #[serde(default)]
    pub seed: u64,
    /// Steps before an episode is truncated
    #[serde(default = "default_max_episode_steps")]
    pub max_episode_steps: u64,
    /// Step continuously once a context is active
    #[serde(default = "default_true")]
    pub autoplay: bool,
}

fn default_fps() -> u32 {
    30
}

fn default_queue_capacity() -> usize {
    64
}

fn default_context_dim() -> usize {
    256
}

fn default_inference_samples() -> usize {
    512
}

fn default_max_episode_steps() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            queue_capacity: default_queue_capacity(),
            context_dim: default_context_dim(),
            inference_samples: default_inference_samples(),
            seed: 0,
            max_episode_steps: default_max_episode_steps(),
            autoplay: true,
        }
    }
}

impl SimulationConfig {
    /// Identifies the policy a cached context was inferred with. Contexts
    /// from different models share reward keys but are not interchangeable.
    pub fn model_id(&self) -> String {
        format!(
            "dim{}-seed{}-n{}",
            self.context_dim, self.seed, self.inference_samples
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default)]
    pub default_quality: VideoQuality,
}

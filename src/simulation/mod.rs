pub mod kinematic;
pub mod policy;
pub mod traits;
pub mod types;
pub mod worker;

pub use kinematic::{ACTION_DIM, KinematicEnvironment};
pub use policy::LinearPolicy;
pub use traits::{Environment, PolicyModel};
pub use types::{Frame, Observation, PoseSnapshot, StepOutcome, VideoQuality};
pub use worker::{SimulationHandle, SimulationStatus};

use crate::config::SimulationConfig;
use crate::error::SimulationError;

/// Start the worker with the built-in kinematic humanoid and linear policy.
pub fn spawn_builtin(
    config: &SimulationConfig,
    quality: VideoQuality,
) -> Result<SimulationHandle, SimulationError> {
    SimulationHandle::spawn(
        Box::new(KinematicEnvironment::new(config.max_episode_steps)),
        Box::new(LinearPolicy::new(
            config.context_dim,
            ACTION_DIM,
            config.inference_samples,
            config.seed,
        )),
        config,
        quality,
    )
}

use super::super::{
    CacheConfig, GatewayConfig, ObservabilityConfig, PresetsConfig, SimulationConfig, VideoConfig,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory holding config.toml - computed from home, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub presets: PresetsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Disk tier location for the configured model: `<cache.dir>/<model_id>`.
    pub fn context_cache_dir(&self) -> PathBuf {
        self.cache
            .resolved_dir()
            .join(self.simulation.model_id())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.host.trim().is_empty() {
            return Err(invalid("gateway.host must not be empty"));
        }
        if self.gateway.max_sessions == 0 {
            return Err(invalid("gateway.max_sessions must be at least 1"));
        }
        if self.gateway.session_queue == 0 {
            return Err(invalid("gateway.session_queue must be at least 1"));
        }
        if self.cache.dir.trim().is_empty() {
            return Err(invalid("cache.dir must not be empty"));
        }
        if self.cache.memory_capacity == 0 {
            return Err(invalid("cache.memory_capacity must be at least 1"));
        }
        if !(1..=240).contains(&self.simulation.fps) {
            return Err(invalid("simulation.fps must be within 1..=240"));
        }
        if self.simulation.queue_capacity == 0 {
            return Err(invalid("simulation.queue_capacity must be at least 1"));
        }
        if self.simulation.context_dim == 0 {
            return Err(invalid("simulation.context_dim must be at least 1"));
        }
        if self.simulation.inference_samples == 0 {
            return Err(invalid("simulation.inference_samples must be at least 1"));
        }
        if self.simulation.max_episode_steps == 0 {
            return Err(invalid("simulation.max_episode_steps must be at least 1"));
        }
        if !matches!(self.observability.backend.as_str(), "none" | "log") {
            return Err(invalid(&format!(
                "observability.backend must be \"none\" or \"log\", got {:?}",
                self.observability.backend
            )));
        }
        if self.observability.level().is_none() {
            return Err(invalid(&format!(
                "observability.log_level {:?} is not a tracing level",
                self.observability.log_level
            )));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(message.to_string())
}

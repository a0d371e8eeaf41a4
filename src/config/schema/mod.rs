mod cache;
mod core;
mod gateway;
mod observability;
mod simulation;

pub use cache::{CacheConfig, PresetsConfig};
pub use core::Config;
pub use gateway::GatewayConfig;
pub use observability::ObservabilityConfig;
pub use simulation::{SimulationConfig, VideoConfig};

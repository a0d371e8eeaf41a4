pub mod schema;

pub use schema::{
    CacheConfig, Config, GatewayConfig, ObservabilityConfig, PresetsConfig, SimulationConfig,
    VideoConfig,
};

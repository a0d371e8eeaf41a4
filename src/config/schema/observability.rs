use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "none" | "log"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_backend() -> String {
    "log".into()
}

fn default_log_level() -> String {
    "info".into()
}

impl ObservabilityConfig {
    pub fn level(&self) -> Option<tracing::Level> {
        self.log_level.parse().ok()
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            log_level: default_log_level(),
        }
    }
}

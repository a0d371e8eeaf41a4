use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one `.ctx` file per cached context; `~` is expanded
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Entries kept in the in-memory LRU tier (default: 100)
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

fn default_cache_dir() -> String {
    "~/.motion-gateway/cache".into()
}

fn default_memory_capacity() -> usize {
    100
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.dir).into_owned())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetsConfig {
    /// SQLite database for saved reward presets and captured poses
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.motion-gateway/presets.db".into()
}

impl PresetsConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).into_owned())
    }
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_config() {
        let config = CacheConfig::default();
        assert_eq!(config.memory_capacity, 100);
        assert!(config.dir.ends_with("cache"));
    }

    #[test]
    fn tilde_is_expanded() {
        let config = CacheConfig {
            dir: "~/ctx".into(),
            memory_capacity: 1,
        };
        let resolved = config.resolved_dir();
        assert!(!resolved.to_string_lossy().starts_with('~'));
        assert!(resolved.ends_with("ctx"));

        let presets = PresetsConfig {
            db_path: "/var/lib/motion/presets.db".into(),
        };
        assert_eq!(
            presets.resolved_path(),
            PathBuf::from("/var/lib/motion/presets.db")
        );
    }
}

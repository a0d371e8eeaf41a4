use clap::{Parser, Subcommand};

/// `motion-gateway` - reward-context cache and session gateway for a humanoid motion policy.
#[derive(Parser, Debug)]
#[command(name = "motion-gateway")]
#[command(version)]
#[command(about = "Serve a humanoid motion policy with cached reward contexts.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway (control WebSocket, frame stream, signaling)
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect or empty the context cache
    Cache {
        #[command(subcommand)]
        cache_command: CacheCommands,
    },

    /// Manage saved reward presets
    Presets {
        #[command(subcommand)]
        preset_command: PresetCommands,
    },

    /// Print the cache key of a reward configuration given as JSON
    Key {
        /// e.g. '{"terms":[{"name":"move-ego","move_speed":2.0}]}'
        reward: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show on-disk entry count and location
    Stats,
    /// Delete every cached context
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum PresetCommands {
    /// List preset names
    List,
    /// Print a preset's reward configuration
    Show {
        /// Preset name
        name: String,
    },
    /// Delete a preset
    Delete {
        /// Preset name
        name: String,
    },
}

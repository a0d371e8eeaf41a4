use crate::app::AppContext;
use crate::cache::TieredContextCache;
use crate::cli::{CacheCommands, Cli, Commands, PresetCommands};
use crate::config::Config;
use crate::presets::PresetStore;
use crate::reward::{self, RewardConfiguration};
use crate::transport::gateway;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let host = config.gateway.host.clone();
            let port = config.gateway.port;
            if port == 0 {
                info!("Starting motion-gateway on {host} (random port)");
            } else {
                info!("Starting motion-gateway on {host}:{port}");
            }

            let ctx = Arc::new(AppContext::build(config).await?);
            gateway::run_gateway(&host, port, ctx).await
        }

        Commands::Cache { cache_command } => {
            let cache = TieredContextCache::from_config(&config);
            match cache_command {
                CacheCommands::Stats => {
                    println!("Cache directory: {}", cache.disk().dir().display());
                    println!("Entries on disk: {}", cache.disk().count());
                    println!("Memory capacity: {}", config.cache.memory_capacity);
                }
                CacheCommands::Clear => {
                    let removed = cache.clear().await.context("clear context cache")?;
                    println!("Removed {removed} cached contexts");
                }
            }
            Ok(())
        }

        Commands::Presets { preset_command } => {
            let store = PresetStore::open(&config.presets.resolved_path())
                .await
                .context("open preset database")?;
            match preset_command {
                PresetCommands::List => {
                    let names = store.list().await?;
                    if names.is_empty() {
                        println!("No presets saved.");
                    } else {
                        for name in names {
                            println!("  - {name}");
                        }
                    }
                }
                PresetCommands::Show { name } => {
                    let preset = store.load(&name).await?;
                    println!("{}", serde_json::to_string_pretty(&preset.reward)?);
                    println!("Key: {}", reward::encode(&preset.reward));
                    println!("Saved: {}", preset.created_at);
                }
                PresetCommands::Delete { name } => {
                    if store.delete(&name).await? {
                        println!("Deleted preset '{name}'");
                    } else {
                        println!("No preset named '{name}'");
                    }
                }
            }
            Ok(())
        }

        Commands::Key { reward } => {
            let configuration =
                RewardConfiguration::from_json_str(&reward).context("parse reward configuration")?;
            let key = reward::encode(&configuration);
            println!("{key}");
            println!(
                "file: {}",
                TieredContextCache::from_config(&config)
                    .disk()
                    .path_for(&key)
                    .display()
            );
            Ok(())
        }
    }
}

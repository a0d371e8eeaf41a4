use anyhow::Result;
use clap::Parser;
use motion_gateway::Config;
use motion_gateway::cli::Cli;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_init()?;

    // Initialize logging
    let level = config.observability.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install tracing subscriber: {error}");
    }

    motion_gateway::app::dispatch(cli, config).await
}

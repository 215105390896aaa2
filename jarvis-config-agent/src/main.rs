mod config;

use anyhow::{Context, Result};
use jarvis_config_client::{ConfigClient, Snapshot};
use crate::config::Config;

fn log_watched(watch: &[String], services: &Snapshot) {
    for name in watch {
        match services.get(name) {
            Some(record) => tracing::info!("{} -> {}", name, record.url),
            None => tracing::warn!("{} is not registered with the config service", name),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(
                    "jarvis_config_agent=info,jarvis_config_client=info",
                ))
        )
        .init();

    tracing::info!("Starting jarvis-config-agent");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/jarvis-config/agent.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    let watch = config.agent.watch.clone();
    let client = ConfigClient::builder(config.client)
        .on_refresh(move |services: &Snapshot| log_watched(&watch, services))
        .start()
        .await
        .context("Failed to start config client")?;

    if !client.initial_fetch_succeeded() {
        tracing::warn!(
            "Config service unreachable at startup, serving {} cached services",
            client.all_services().len()
        );
        log_watched(&config.agent.watch, &client.all_services());
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    client.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

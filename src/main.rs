use batch_latency_probe::config::ConfigManager;
use batch_latency_probe::handler::{Event, handle_event};
use batch_latency_probe::{metrics, server};

use anyhow::Context;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    // Load config first to get log level
    let config_mgr = Arc::new(ConfigManager::start().await?);
    let log_level = config_mgr.config.read().await.get_tracing_level()?;

    // stderr keeps stdout free for the invoke response
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("batch_latency_probe={}", log_level.as_str().to_lowercase()).parse()?))
        .init();

    let enable_latency_history = config_mgr.config.read().await.enable_latency_history;
    metrics::initialize_metrics(enable_latency_history)?;

    if std::env::args().nth(1).as_deref() == Some("invoke") {
        let mut raw = String::new();
        tokio::io::stdin().read_to_string(&mut raw).await.context("reading event from stdin")?;
        let event: Event = serde_json::from_str(&raw).context("parsing event")?;
        let config = config_mgr.config.read().await.clone();
        let response = handle_event(&event, &config).await?;
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    let (listen_addr, metrics_addr) = {
        let config = config_mgr.config.read().await;
        (config.listen_addr, config.metrics_addr)
    };
    info!("Starting batch_latency_probe");

    tokio::spawn(metrics::serve_metrics(metrics_addr));
    server::serve(listen_addr, config_mgr.config.clone()).await;

    Ok(())
}

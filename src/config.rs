use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use anyhow::{Context, Result};

use crate::batch::ClientSettings;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
    /// Reject the whole batch with 422 if any URL is syntactically invalid.
    #[serde(default = "default_validate_urls")]
    pub validate_urls: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Total per-request timeout for the shared client. `null` disables it.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: Option<u64>,
    #[serde(default = "default_enable_latency_history")]
    pub enable_latency_history: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_addr() -> SocketAddr {
    ([0, 0, 0, 0], 8080).into()
}

fn default_metrics_addr() -> SocketAddr {
    ([0, 0, 0, 0], 9100).into()
}

fn default_validate_urls() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("batch-latency-probe/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_ms() -> Option<u64> {
    Some(300_000)
}

fn default_enable_latency_history() -> bool {
    false
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            listen_addr: default_listen_addr(),
            metrics_addr: default_metrics_addr(),
            validate_urls: default_validate_urls(),
            user_agent: default_user_agent(),
            request_timeout_ms: default_request_timeout_ms(),
            enable_latency_history: default_enable_latency_history(),
        }
    }
}

impl ProbeConfig {
    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            user_agent: self.user_agent.clone(),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
        }
    }
}

pub struct ConfigManager {
    pub config: Arc<RwLock<ProbeConfig>>,

    // file watcher, stopped when the manager goes away
    poller: JoinHandle<()>,
}

impl ConfigManager {
    /// Load the config file named by `PROBE_CONFIG` and keep polling it for changes.
    pub async fn start() -> Result<Self> {
        let config_file = std::env::var("PROBE_CONFIG")
            .unwrap_or_else(|_| "probe.json".to_string());

        let poll_interval_sec: u64 = std::env::var("CONFIG_POLL_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        Self::start_with_local_file(config_file, Duration::from_secs(poll_interval_sec)).await
    }

    async fn start_with_local_file(config_file: String, poll_interval: Duration) -> Result<Self> {
        let initial = if Path::new(&config_file).exists() {
            eprintln!("Starting with local file: {}", config_file);
            Self::load_file_config(&config_file).await?
        } else {
            eprintln!("Config file {} not found, starting with defaults", config_file);
            ProbeConfig::default()
        };
        initial.get_tracing_level()?;
        let config = Arc::new(RwLock::new(initial));

        let poller = {
            let config_clone = config.clone();

            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(poll_interval).await;
                    if !Path::new(&config_file).exists() {
                        continue;
                    }
                    match Self::load_file_config(&config_file).await {
                        Ok(new_cfg) => {
                            let mut c = config_clone.write().await;
                            if *c != new_cfg {
                                tracing::info!("Local config file updated");
                                *c = new_cfg;
                            }
                        }
                        Err(e) => {
                            tracing::error!("Error reading config file {}: {:?}", config_file, e);
                        }
                    }
                }
            })
        };

        Ok(ConfigManager {
            config,
            poller,
        })
    }

    async fn load_file_config(file_path: &str) -> Result<ProbeConfig> {
        let content = fs::read_to_string(file_path)
            .await
            .with_context(|| format!("reading config file {}", file_path))?;
        let config: ProbeConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {}", file_path))?;
        config.get_tracing_level()?;
        Ok(config)
    }
}

impl Drop for ConfigManager {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

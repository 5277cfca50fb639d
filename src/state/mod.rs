use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Pooled HTTP client for upstream requests
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .pool_max_idle_per_host(10)
            .build()
            .expect("failed to build HTTP client");

        Arc::new(Self { config, http })
    }
}

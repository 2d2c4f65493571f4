use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Instant;
use tracing::info;

use crate::config::PipelineConfig;

/// Explicit execution context for a run: the config and the HTTP client.
///
/// Opened once, passed by reference into each stage and released on drop,
/// including when a stage bails out early.
pub struct Session {
    config: PipelineConfig,
    client: Client,
    opened: Instant,
}

impl Session {
    pub fn open(config: PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        info!(raw_dir = %config.raw_dir.display(), base_url = %config.base_url, "session opened");
        Ok(Self {
            config,
            client,
            opened: Instant::now(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        info!(elapsed = ?self.opened.elapsed(), "session closed");
    }
}

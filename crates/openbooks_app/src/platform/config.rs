//! Client configuration read from a RON file.
//!
//! ```ron
//! (
//!     server_url: "http://localhost:5228",
//!     download_dir: "books",
//!     reconnect: (base_delay_ms: 500, max_delay_ms: 30000, max_attempts: 8),
//! )
//! ```
//! Omitted fields keep their defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use openbooks_engine::{EngineConfig, ReconnectPolicy};
use serde::Deserialize;

pub(crate) const DEFAULT_CONFIG_PATH: &str = "openbooks.ron";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct ClientConfig {
    pub server_url: String,
    pub storage_dir: PathBuf,
    pub download_dir: PathBuf,
    pub reconnect: ReconnectSettings,
    pub persist_interval_ms: u64,
    pub log_to_file: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5228".to_string(),
            storage_dir: PathBuf::from(".openbooks"),
            download_dir: PathBuf::from("books"),
            reconnect: ReconnectSettings::default(),
            persist_interval_ms: 1000,
            log_to_file: false,
        }
    }
}

/// `max_attempts: 0` turns reconnection off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct ReconnectSettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            base_delay_ms: duration_ms(policy.base_delay),
            max_delay_ms: duration_ms(policy.max_delay),
            max_attempts: policy.max_attempts,
        }
    }
}

impl ReconnectSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
        }
    }
}

impl ClientConfig {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.server_url.clone(), self.download_dir.clone());
        config.reconnect = self.reconnect.policy();
        config
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }
}

/// Config file named by the first command-line argument, else the default.
pub(crate) fn config_path(mut args: impl Iterator<Item = String>) -> PathBuf {
    args.nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// `Ok(None)` when the file does not exist.
pub(crate) fn load(path: &Path) -> anyhow::Result<Option<ClientConfig>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config {}", path.display()))
        }
    };
    parse(&text)
        .map(Some)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

pub(crate) fn parse(text: &str) -> anyhow::Result<ClientConfig> {
    Ok(ron::from_str(text)?)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

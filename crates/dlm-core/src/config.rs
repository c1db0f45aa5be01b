use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::task::TransferOptions;

/// Global configuration loaded from `~/.config/dlm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlmConfig {
    /// Directory new downloads are written to. Current directory when unset.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Largest slice of the response body written and reported as one chunk.
    pub chunk_size: usize,
    /// Seconds allowed for the TCP/TLS connect phase.
    pub connect_timeout_secs: u64,
    /// Abort the transfer when throughput stays below this many bytes/s ...
    pub low_speed_limit: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
    /// Maximum number of redirects followed per request.
    pub max_redirections: u32,
    /// Optional User-Agent header; libcurl sends none when unset.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for DlmConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            chunk_size: 1024,
            connect_timeout_secs: 30,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            max_redirections: 10,
            user_agent: None,
        }
    }
}

impl DlmConfig {
    /// Transfer tunables handed to every task created under this config.
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            chunk_size: self.chunk_size.max(1),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            max_redirections: self.max_redirections,
            user_agent: self.user_agent.clone(),
        }
    }

    /// Resolves the download directory: explicit override, then config, then cwd.
    pub fn resolve_download_dir(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir.or(self.download_dir.as_deref()) {
            return Ok(dir.to_path_buf());
        }
        std::env::current_dir().context("cannot determine current directory")
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DlmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DlmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: DlmConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Defaults for new jobs, loaded from `~/.config/pdl/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdlConfig {
    /// Maximum chunk workers running at once.
    pub max_workers: usize,
    /// Largest byte range fetched by one chunk request.
    pub max_chunk_size: u64,
    /// Attempts per chunk, including the first.
    pub max_retries: u32,
    /// Fixed delay between attempts, in seconds.
    pub retry_interval_secs: f64,
    /// Publish the file even if some chunks failed (their ranges are zero-filled).
    pub continue_on_error: bool,
    /// How often progress samples are emitted, in milliseconds.
    pub progress_interval_ms: u64,
}

impl Default for PdlConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            max_chunk_size: 1024 * 1024,
            max_retries: 3,
            retry_interval_secs: 5.0,
            continue_on_error: false,
            progress_interval_ms: 1000,
        }
    }
}

impl PdlConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_interval_secs).unwrap_or(Duration::ZERO)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PdlConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<PdlConfig> {
    if !path.exists() {
        let default_cfg = PdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PdlConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

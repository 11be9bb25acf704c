pub mod schema;

pub use schema::{DashConfig, SamplerConfig, ServerConfig};

use dash_core::{DashError, Result};
use std::path::{Path, PathBuf};

/// Lowest accepted browser refresh period.
pub const MIN_REFRESH_INTERVAL_MS: u64 = 100;

/// Longest accepted tick period (one day).
pub const MAX_SAMPLE_INTERVAL_SECS: f64 = 86_400.0;

/// Load configuration from a TOML file.  Returns `DashConfig::default()` if
/// the file doesn't exist so the dashboard always has sensible defaults.
pub fn load(path: impl AsRef<Path>) -> Result<DashConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(DashConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| DashError::Config(format!("cannot read '{}': {e}", path.display())))?;

    parse(&raw)
}

/// Parse and validate a TOML document.
pub fn parse(raw: &str) -> Result<DashConfig> {
    let config: DashConfig =
        toml::from_str(raw).map_err(|e| DashError::Config(format!("TOML parse error: {e}")))?;
    validate(&config)?;
    Ok(config)
}

/// Reject values the sampler or server cannot run with.
pub fn validate(config: &DashConfig) -> Result<()> {
    let sampler = &config.sampler;
    if sampler.horizon_seconds == 0 {
        return Err(DashError::Config("sampler.horizon_seconds must be at least 1".into()));
    }
    let interval = sampler.sample_interval_seconds;
    if interval.is_nan() || interval <= 0.0 || interval > MAX_SAMPLE_INTERVAL_SECS {
        return Err(DashError::Config(format!(
            "sampler.sample_interval_seconds must be in (0, {MAX_SAMPLE_INTERVAL_SECS}], got {interval}"
        )));
    }
    if config.server.refresh_interval_ms < MIN_REFRESH_INTERVAL_MS {
        return Err(DashError::Config(format!(
            "server.refresh_interval_ms must be at least {MIN_REFRESH_INTERVAL_MS}"
        )));
    }
    if config.server.bind.trim().is_empty() {
        return Err(DashError::Config("server.bind must not be empty".into()));
    }
    Ok(())
}

/// Return the default config path, honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("pcdash").join("pcdash.toml")
}

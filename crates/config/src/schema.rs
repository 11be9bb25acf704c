use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure parsed from `pcdash.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    /// Background sampling settings.
    pub sampler: SamplerConfig,
    /// HTTP dashboard settings.
    pub server: ServerConfig,
}

/// Sampling cadence and history size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Rolling buffer capacity, in samples.
    pub horizon_seconds: usize,
    /// Tick period in seconds.
    pub sample_interval_seconds: f64,
    /// `true` = use a GPU if one is detected, `false` = never touch the driver.
    pub gpu_enabled: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            horizon_seconds:         300, // 5 minutes at 1 Hz
            sample_interval_seconds: 1.0,
            gpu_enabled:             true,
        }
    }
}

impl SamplerConfig {
    /// Tick period. Values `validate` would reject fall back to one second.
    pub fn sample_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.sample_interval_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(1))
    }
}

/// HTTP listener and browser refresh cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `"127.0.0.1:8050"`.
    pub bind: String,
    /// How often the page polls the API (milliseconds).
    pub refresh_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind:                "127.0.0.1:8050".to_string(),
            refresh_interval_ms: 1_000,
        }
    }
}

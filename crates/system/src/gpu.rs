//! NVIDIA GPU access through NVML.
//!
//! Detection runs once at startup. Everything downstream consults the
//! resulting [`GpuCapability`] instead of retrying the driver per call.

use dash_core::{ReadError, ReadResult};
use nvml_wrapper::enums::device::UsedGpuMemory;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use std::collections::HashMap;
use tracing::{debug, info};

/// Outcome of the startup GPU probe.
pub enum GpuCapability {
    /// NVML initialised and device `index` answered.
    Available { nvml: Nvml, index: u32, name: String },
    /// No usable GPU; carries the reason for logs and the UI.
    Unavailable(String),
}

impl std::fmt::Debug for GpuCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available { index, name, .. } => f
                .debug_struct("Available")
                .field("index", index)
                .field("name", name)
                .finish(),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

impl GpuCapability {
    /// Probe NVML for device 0. `enabled = false` skips the probe.
    pub fn detect(enabled: bool) -> Self {
        if !enabled {
            info!("GPU sampling disabled by configuration");
            return Self::disabled();
        }

        let nvml = match Nvml::init() {
            Ok(n) => n,
            Err(e) => {
                info!("No NVML driver found, GPU metrics unavailable: {e}");
                return Self::Unavailable(format!("NVML init failed: {e}"));
            }
        };

        let name = match nvml.device_by_index(0) {
            Ok(device) => device.name().unwrap_or_else(|_| "GPU 0".to_string()),
            Err(e) => {
                info!("NVML loaded but device 0 is not accessible: {e}");
                return Self::Unavailable(format!("no GPU device: {e}"));
            }
        };

        info!("GPU detected: {name}");
        Self::Available { nvml, index: 0, name }
    }

    pub fn disabled() -> Self {
        Self::Unavailable("disabled by configuration".to_string())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    /// Device name, or the reason the GPU is unavailable.
    pub fn describe(&self) -> &str {
        match self {
            Self::Available { name, .. } => name,
            Self::Unavailable(reason) => reason,
        }
    }

    /// Utilisation percent of the detected device, `None` without a GPU.
    pub fn utilization(&self) -> ReadResult<Option<f32>> {
        let Self::Available { nvml, index, .. } = self else {
            return Ok(None);
        };
        let device = nvml.device_by_index(*index).map_err(map_nvml)?;
        let rates = device.utilization_rates().map_err(map_nvml)?;
        Ok(Some(rates.gpu.min(100) as f32))
    }

    /// Per-process GPU memory in bytes, keyed by PID. `None` without a GPU.
    ///
    /// Graphics and compute contexts are merged; a PID present in both keeps
    /// the larger figure. Entries whose usage the driver hides come back as
    /// per-entry errors so the caller can skip them.
    pub fn process_memory(&self) -> ReadResult<Option<Vec<(u32, ReadResult<u64>)>>> {
        let Self::Available { nvml, index, .. } = self else {
            return Ok(None);
        };
        let device = nvml.device_by_index(*index).map_err(map_nvml)?;

        let mut procs = device.running_graphics_processes().map_err(map_nvml)?;
        match device.running_compute_processes() {
            Ok(compute) => procs.extend(compute),
            Err(e) => debug!("compute process list unavailable: {e}"),
        }

        let mut by_pid: HashMap<u32, ReadResult<u64>> = HashMap::new();
        for p in procs {
            let used = match p.used_gpu_memory {
                UsedGpuMemory::Used(bytes) => Ok(bytes),
                UsedGpuMemory::Unavailable => {
                    Err(ReadError::transient(format!("GPU memory of pid {} hidden", p.pid)))
                }
            };
            let slot = by_pid.entry(p.pid).or_insert_with(|| used.clone());
            if let Ok(bytes) = used {
                match slot {
                    Ok(prev) if *prev >= bytes => {}
                    _ => *slot = Ok(bytes),
                }
            }
        }

        Ok(Some(by_pid.into_iter().collect()))
    }
}

fn map_nvml(e: NvmlError) -> ReadError {
    match e {
        NvmlError::NotSupported => ReadError::unsupported("operation not supported by GPU driver"),
        other => ReadError::transient(other.to_string()),
    }
}

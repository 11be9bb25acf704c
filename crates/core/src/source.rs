use crate::error::{ReadError, ReadResult};
use crate::sample::{NetCounters, ResourceKind};
use serde::Serialize;
use std::time::Duration;

/// Placeholder name used when no process could be attributed.
pub const SENTINEL_NAME: &str = "–";

/// The process with the largest value of one resource dimension.
///
/// `magnitude` units: cpu = percent, ram = MiB resident, gpu = MiB of GPU
/// memory, net = MiB of cumulative traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopConsumer {
    pub name:      String,
    pub pid:       u32,
    pub magnitude: f64,
}

impl TopConsumer {
    pub fn new(name: impl Into<String>, pid: u32, magnitude: f64) -> Self {
        Self {
            name: name.into(),
            pid,
            magnitude,
        }
    }

    /// `("–", 0, 0.0)`: nothing could be read.
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_NAME, 0, 0.0)
    }

    pub fn is_sentinel(&self) -> bool {
        self.pid == 0 && self.name == SENTINEL_NAME
    }

    /// Pick the largest reading from a process scan.
    ///
    /// Failed per-process reads and non-finite magnitudes are skipped. Ties
    /// resolve to whichever maximum the scan yields last. An empty or fully
    /// failed scan yields [`TopConsumer::sentinel`].
    pub fn max_of<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = ReadResult<TopConsumer>>,
    {
        readings
            .into_iter()
            .filter_map(Result::ok)
            .filter(|c| c.magnitude.is_finite())
            .max_by(|a, b| a.magnitude.total_cmp(&b.magnitude))
            .unwrap_or_else(Self::sentinel)
    }
}

/// Point-in-time accessors for host metrics.
///
/// Every call is a best-effort snapshot. Implementations may block on OS or
/// driver calls, so callers keep them off latency-sensitive threads.
pub trait MetricSource: Send + Sync {
    /// System-wide CPU utilisation in `[0, 100]`.
    fn cpu_usage_percent(&self) -> ReadResult<f32>;

    /// Physical memory in use, `used / total * 100`.
    fn ram_usage_percent(&self) -> ReadResult<f32>;

    /// GPU utilisation, or `Ok(None)` when no usable GPU is present.
    fn gpu_usage_percent(&self) -> ReadResult<Option<f32>>;

    /// Cumulative interface counters since boot.
    fn net_counters(&self) -> ReadResult<NetCounters>;

    fn top_by_cpu(&self) -> TopConsumer;
    fn top_by_ram(&self) -> TopConsumer;
    fn top_by_gpu(&self) -> TopConsumer;
    fn top_by_net(&self) -> TopConsumer;

    /// Time since the host booted.
    fn uptime(&self) -> Duration;

    /// Whether startup detection found a GPU this source can query.
    fn gpu_available(&self) -> bool;

    fn top_consumer(&self, kind: ResourceKind) -> TopConsumer {
        match kind {
            ResourceKind::Cpu => self.top_by_cpu(),
            ResourceKind::Ram => self.top_by_ram(),
            ResourceKind::Gpu => self.top_by_gpu(),
            ResourceKind::Net => self.top_by_net(),
        }
    }
}

/// Convert a used/total pair into a percentage, failing on a zero total.
pub fn usage_percent(used: u64, total: u64) -> ReadResult<f32> {
    if total == 0 {
        return Err(ReadError::transient("total reported as zero"));
    }
    Ok(((used as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32)
}

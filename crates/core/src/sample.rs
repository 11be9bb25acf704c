use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four sampled resource dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Ram,
    Gpu,
    Net,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [Self::Cpu, Self::Ram, Self::Gpu, Self::Net];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Ram => "ram",
            Self::Gpu => "gpu",
            Self::Net => "net",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "ram" | "mem" | "memory" => Ok(Self::Ram),
            "gpu" => Ok(Self::Gpu),
            "net" | "network" => Ok(Self::Net),
            other => Err(format!("unknown resource kind '{other}'")),
        }
    }
}

/// Cumulative network byte counters since boot, summed over all interfaces.
///
/// These are totals, not rates. They normally only grow, but an interface
/// reset makes them dip; consumers must tolerate that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Payload of one [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Instantaneous utilisation in `[0, 100]` (cpu, ram, gpu).
    Percent { percent: f32 },
    /// Cumulative network counters (net).
    Counters {
        bytes_sent: u64,
        bytes_recv: u64,
    },
}

impl SampleValue {
    pub fn percent(value: f32) -> Self {
        Self::Percent { percent: value }
    }

    pub fn as_percent(&self) -> Option<f32> {
        match *self {
            Self::Percent { percent } => Some(percent),
            Self::Counters { .. } => None,
        }
    }

    pub fn as_counters(&self) -> Option<NetCounters> {
        match *self {
            Self::Counters { bytes_sent, bytes_recv } => Some(NetCounters { bytes_sent, bytes_recv }),
            Self::Percent { .. } => None,
        }
    }
}

impl From<NetCounters> for SampleValue {
    fn from(c: NetCounters) -> Self {
        Self::Counters {
            bytes_sent: c.bytes_sent,
            bytes_recv: c.bytes_recv,
        }
    }
}

/// An immutable time-series point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(flatten)]
    pub value: SampleValue,
}

impl Sample {
    pub fn new(timestamp: f64, value: impl Into<SampleValue>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

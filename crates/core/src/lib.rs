pub mod error;
pub mod history;
pub mod sample;
pub mod source;

pub use error::{DashError, ReadError, ReadResult, Result};
pub use history::RollingBuffer;
pub use sample::{unix_now, NetCounters, ResourceKind, Sample, SampleValue};
pub use source::{usage_percent, MetricSource, TopConsumer, SENTINEL_NAME};

use thiserror::Error;

/// Top-level error type used across the entire application.
#[derive(Debug, Error)]
pub enum DashError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Failure of a single metric-source call.
///
/// A missing capability (no GPU driver) is *not* a `ReadError`; sources
/// report it as `Ok(None)` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Momentary failure: process vanished mid-scan, permission hiccup,
    /// a counter that read back as zero. The next tick may succeed.
    #[error("transient: {0}")]
    Transient(String),

    /// The OS or driver does not support this reading at all.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ReadError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// `true` when retrying on the next tick cannot help.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

pub type Result<T, E = DashError> = std::result::Result<T, E>;

/// Result type returned by [`MetricSource`](crate::source::MetricSource) readings.
pub type ReadResult<T> = std::result::Result<T, ReadError>;

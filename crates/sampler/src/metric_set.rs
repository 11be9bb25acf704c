use dash_core::{ResourceKind, RollingBuffer, Sample};
use parking_lot::RwLock;

/// The four rolling histories, one lock per buffer.
///
/// Locks are only held for an O(1) append or for copying a buffer out, so
/// readers never wait on a metric source. Only the owning crate can append.
#[derive(Debug)]
pub struct MetricSet {
    cpu:           RwLock<RollingBuffer<Sample>>,
    ram:           RwLock<RollingBuffer<Sample>>,
    gpu:           RwLock<RollingBuffer<Sample>>,
    net:           RwLock<RollingBuffer<Sample>>,
    horizon:       usize,
    gpu_available: bool,
}

impl MetricSet {
    pub fn new(horizon: usize, gpu_available: bool) -> Self {
        let buffer = || RwLock::new(RollingBuffer::new(horizon));
        Self {
            cpu: buffer(),
            ram: buffer(),
            gpu: buffer(),
            net: buffer(),
            horizon: horizon.max(1),
            gpu_available,
        }
    }

    /// Copy of one buffer, oldest first.
    pub fn snapshot(&self, kind: ResourceKind) -> Vec<Sample> {
        self.buffer(kind).read().to_vec()
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.buffer(kind).read().len()
    }

    pub fn latest(&self, kind: ResourceKind) -> Option<Sample> {
        self.buffer(kind).read().latest().copied()
    }

    /// Capacity of every buffer.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// `false` when GPU samples are placeholders rather than readings.
    pub fn gpu_available(&self) -> bool {
        self.gpu_available
    }

    pub(crate) fn append(&self, kind: ResourceKind, sample: Sample) {
        self.buffer(kind).write().push(sample);
    }

    fn buffer(&self, kind: ResourceKind) -> &RwLock<RollingBuffer<Sample>> {
        match kind {
            ResourceKind::Cpu => &self.cpu,
            ResourceKind::Ram => &self.ram,
            ResourceKind::Gpu => &self.gpu,
            ResourceKind::Net => &self.net,
        }
    }
}

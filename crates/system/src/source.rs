use crate::gpu::GpuCapability;
use dash_core::{
    usage_percent, MetricSource, NetCounters, ReadError, ReadResult, TopConsumer,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use sysinfo::{Networks, Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// [`MetricSource`] backed by long-lived `sysinfo::System`s and NVML.
///
/// Host-wide readings (tick path) and process scans (request path) use
/// separate `System`s: a scan never holds the lock the tick needs, and its
/// process refresh does not move the tick's CPU baseline. CPU percentages
/// are deltas against the previous refresh of the same `System`, so the
/// first reading compares against the baseline taken in
/// [`SysinfoSource::new`].
pub struct SysinfoSource {
    host:        Mutex<System>,
    procs:       Mutex<System>,
    networks:    Mutex<Networks>,
    gpu:         GpuCapability,
    net_warned:  AtomicBool,
}

impl SysinfoSource {
    pub fn new(gpu: GpuCapability) -> Self {
        let mut host = System::new();
        host.refresh_cpu_usage();
        host.refresh_memory();

        let mut procs = System::new();
        procs.refresh_processes_specifics(ProcessesToUpdate::All, true, process_refresh_kind());

        Self {
            host:       Mutex::new(host),
            procs:      Mutex::new(procs),
            networks:   Mutex::new(Networks::new_with_refreshed_list()),
            gpu,
            net_warned: AtomicBool::new(false),
        }
    }

    pub fn gpu(&self) -> &GpuCapability {
        &self.gpu
    }

    /// Refresh the process table and map every entry through `read`.
    fn scan_processes<F>(&self, read: F) -> TopConsumer
    where
        F: Fn(&sysinfo::Process) -> ReadResult<f64>,
    {
        let mut sys = self.procs.lock();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, process_refresh_kind());

        TopConsumer::max_of(sys.processes().iter().map(|(pid, proc_)| -> ReadResult<TopConsumer> {
            let name = proc_.name().to_string_lossy();
            if name.is_empty() {
                return Err(ReadError::transient(format!("pid {pid} has no readable name")));
            }
            let magnitude = read(proc_)?;
            Ok(TopConsumer::new(name.into_owned(), pid.as_u32(), magnitude))
        }))
    }
}

/// Bytes to fractional mebibytes.
fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / (1u64 << 20) as f64
}

fn process_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().with_cpu().with_memory()
}

impl MetricSource for SysinfoSource {
    fn cpu_usage_percent(&self) -> ReadResult<f32> {
        let mut sys = self.host.lock();
        sys.refresh_cpu_usage();
        let usage = sys.global_cpu_usage();
        if !usage.is_finite() {
            return Err(ReadError::transient("CPU usage is not a number"));
        }
        Ok(usage.clamp(0.0, 100.0))
    }

    fn ram_usage_percent(&self) -> ReadResult<f32> {
        let mut sys = self.host.lock();
        sys.refresh_memory();
        usage_percent(sys.used_memory(), sys.total_memory())
    }

    fn gpu_usage_percent(&self) -> ReadResult<Option<f32>> {
        self.gpu.utilization()
    }

    fn net_counters(&self) -> ReadResult<NetCounters> {
        let mut networks = self.networks.lock();
        networks.refresh(true); // true = forget interfaces that disappeared
        if networks.list().is_empty() {
            return Err(ReadError::transient("no network interfaces"));
        }

        // `total_*` are cumulative since boot, not deltas since last refresh.
        let (bytes_sent, bytes_recv) = networks.iter().fold((0u64, 0u64), |(tx, rx), (_, data)| {
            (
                tx.saturating_add(data.total_transmitted()),
                rx.saturating_add(data.total_received()),
            )
        });
        Ok(NetCounters { bytes_sent, bytes_recv })
    }

    fn top_by_cpu(&self) -> TopConsumer {
        self.scan_processes(|p| Ok(f64::from(p.cpu_usage())))
    }

    fn top_by_ram(&self) -> TopConsumer {
        self.scan_processes(|p| Ok(bytes_to_mib(p.memory())))
    }

    fn top_by_gpu(&self) -> TopConsumer {
        let usage = match self.gpu.process_memory() {
            Ok(Some(usage)) => usage,
            Ok(None) => return TopConsumer::sentinel(),
            Err(e) => {
                debug!("GPU process list unavailable: {e}");
                return TopConsumer::sentinel();
            }
        };

        let mut sys = self.procs.lock();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());

        TopConsumer::max_of(usage.into_iter().map(|(pid, used)| -> ReadResult<TopConsumer> {
            let used = used?;
            let name = sys
                .process(Pid::from_u32(pid))
                .map(|p| p.name().to_string_lossy().into_owned())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("pid_{pid}"));
            Ok(TopConsumer::new(name, pid, bytes_to_mib(used)))
        }))
    }

    fn top_by_net(&self) -> TopConsumer {
        // Neither sysinfo nor procfs attribute interface traffic to a single
        // process; /proc/<pid>/net/dev is per network namespace.
        if !self.net_warned.swap(true, Ordering::Relaxed) {
            warn!("per-process network accounting is not supported on this platform; network top consumer disabled");
        }
        TopConsumer::sentinel()
    }

    fn uptime(&self) -> Duration {
        Duration::from_secs(System::uptime())
    }

    fn gpu_available(&self) -> bool {
        self.gpu.is_available()
    }
}

use crate::metric_set::MetricSet;
use dash_config::SamplerConfig;
use dash_core::{
    unix_now, MetricSource, ReadResult, ResourceKind, Sample, SampleValue, TopConsumer,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Value stored in the GPU buffer when no GPU reading exists.
pub const GPU_PLACEHOLDER: f32 = 0.0;

/// Runtime parameters of a [`Sampler`].
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSettings {
    /// Rolling buffer capacity.
    pub horizon:     usize,
    /// Delay between the end of one tick and the start of the next.
    pub interval:    Duration,
    /// `false` never queries the GPU, even if the source has one.
    pub gpu_enabled: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self::from(&SamplerConfig::default())
    }
}

impl From<&SamplerConfig> for SamplerSettings {
    fn from(config: &SamplerConfig) -> Self {
        Self {
            horizon:     config.horizon_seconds,
            interval:    config.sample_interval(),
            gpu_enabled: config.gpu_enabled,
        }
    }
}

struct RunningTask {
    stop_tx: watch::Sender<bool>,
    handle:  JoinHandle<()>,
}

/// Lifecycle of the tick loop. `Stopping` covers the window in which
/// `stop()` waits for the last tick; `start()` refuses during it.
enum TaskState {
    Idle,
    Running(RunningTask),
    Stopping,
}

/// Periodically samples a [`MetricSource`] into a [`MetricSet`].
///
/// The tick runs on Tokio's blocking pool; the next tick is scheduled
/// `interval` after the previous one finishes. A slow source therefore makes
/// sampling drift, it never makes ticks overlap.
pub struct Sampler {
    source:   Arc<dyn MetricSource>,
    metrics:  Arc<MetricSet>,
    settings: SamplerSettings,
    ticks:    Arc<AtomicU64>,
    /// Shared by every loop this sampler spawns; holding it is what makes a
    /// tick exclusive.
    ticker:   Arc<Mutex<Ticker>>,
    task:     Mutex<TaskState>,
}

impl Sampler {
    pub fn new(source: Arc<dyn MetricSource>, settings: SamplerSettings) -> Self {
        let gpu_available = settings.gpu_enabled && source.gpu_available();
        let metrics = Arc::new(MetricSet::new(settings.horizon, gpu_available));
        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = Ticker {
            source:         Arc::clone(&source),
            metrics:        Arc::clone(&metrics),
            ticks:          Arc::clone(&ticks),
            last_timestamp: None,
            degraded:       HashSet::new(),
        };
        Self {
            source,
            metrics,
            settings,
            ticks,
            ticker: Arc::new(Mutex::new(ticker)),
            task: Mutex::new(TaskState::Idle),
        }
    }

    /// Spawn the tick loop on the current Tokio runtime.
    ///
    /// Returns `false` without spawning anything if the loop is already
    /// running or a `stop()` is still waiting for it to exit.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        match &*task {
            TaskState::Running(t) if !t.handle.is_finished() => {
                debug!("sampler already running; start ignored");
                return false;
            }
            TaskState::Stopping => {
                debug!("sampler is stopping; start ignored");
                return false;
            }
            TaskState::Running(_) | TaskState::Idle => {}
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let ticker = Arc::clone(&self.ticker);
        let handle = tokio::spawn(run_loop(ticker, self.settings.interval, stop_rx));
        *task = TaskState::Running(RunningTask { stop_tx, handle });

        info!(
            "sampler started: every {:?}, horizon {} samples, gpu {}",
            self.settings.interval,
            self.metrics.horizon(),
            if self.metrics.gpu_available() { "on" } else { "off" },
        );
        true
    }

    /// Signal the loop and wait for it to exit. A tick in progress finishes
    /// first. No-op when stopped or when another `stop()` is already waiting.
    pub async fn stop(&self) {
        let running = {
            let mut task = self.task.lock();
            match std::mem::replace(&mut *task, TaskState::Stopping) {
                TaskState::Running(t) => t,
                other => {
                    *task = other;
                    return;
                }
            }
        };

        // Back to Idle even if this future is dropped mid-wait.
        let _reset = ResetToIdle(&self.task);
        let _ = running.stop_tx.send(true);
        if let Err(e) = running.handle.await {
            warn!("sampler task ended abnormally: {e}");
        }
        info!("sampler stopped after {} ticks", self.tick_count());
    }

    pub fn is_running(&self) -> bool {
        match &*self.task.lock() {
            TaskState::Running(t) => !t.handle.is_finished(),
            TaskState::Stopping => true,
            TaskState::Idle => false,
        }
    }

    /// Current contents of one buffer, oldest first.
    pub fn snapshot(&self, kind: ResourceKind) -> Vec<Sample> {
        self.metrics.snapshot(kind)
    }

    /// Read-only handle to the buffers for presentation layers.
    pub fn metrics(&self) -> Arc<MetricSet> {
        Arc::clone(&self.metrics)
    }

    /// Fresh top-consumer scan. Blocks on process enumeration.
    pub fn top_consumer(&self, kind: ResourceKind) -> TopConsumer {
        if kind == ResourceKind::Gpu && !self.metrics.gpu_available() {
            return TopConsumer::sentinel();
        }
        self.source.top_consumer(kind)
    }

    pub fn uptime(&self) -> Duration {
        self.source.uptime()
    }

    pub fn gpu_available(&self) -> bool {
        self.metrics.gpu_available()
    }

    /// Number of completed ticks since construction.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }
}

struct ResetToIdle<'a>(&'a Mutex<TaskState>);

impl Drop for ResetToIdle<'_> {
    fn drop(&mut self) {
        *self.0.lock() = TaskState::Idle;
    }
}

async fn run_loop(
    ticker: Arc<Mutex<Ticker>>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let current = Arc::clone(&ticker);
        if let Err(e) = tokio::task::spawn_blocking(move || current.lock().tick()).await {
            error!("sampler tick panicked: {e}");
        }

        // A dropped sender means the Sampler is gone; stop as well.
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop_rx.changed() => break,
        }
    }
    debug!("sampler loop exited");
}

/// State carried from one tick to the next.
struct Ticker {
    source:         Arc<dyn MetricSource>,
    metrics:        Arc<MetricSet>,
    ticks:          Arc<AtomicU64>,
    last_timestamp: Option<f64>,
    /// Dimensions currently failing persistently; warned about once.
    degraded:       HashSet<ResourceKind>,
}

impl Ticker {
    fn tick(&mut self) {
        let now = self.next_timestamp();

        let cpu = self.source.cpu_usage_percent().map(SampleValue::percent);
        self.record(ResourceKind::Cpu, now, cpu);

        let ram = self.source.ram_usage_percent().map(SampleValue::percent);
        self.record(ResourceKind::Ram, now, ram);

        let gpu = if self.metrics.gpu_available() {
            self.source
                .gpu_usage_percent()
                .map(|v| SampleValue::percent(v.unwrap_or(GPU_PLACEHOLDER)))
        } else {
            Ok(SampleValue::percent(GPU_PLACEHOLDER))
        };
        self.record(ResourceKind::Gpu, now, gpu);

        let net = self.source.net_counters().map(SampleValue::from);
        self.record(ResourceKind::Net, now, net);

        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Wall-clock stamp, nudged forward if the clock stepped backwards so
    /// stamps stay strictly increasing.
    fn next_timestamp(&mut self) -> f64 {
        let mut now = unix_now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + 1e-6;
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn record(&mut self, kind: ResourceKind, timestamp: f64, reading: ReadResult<SampleValue>) {
        match reading {
            Ok(value) => {
                if self.degraded.remove(&kind) {
                    info!("{kind} sampling recovered");
                }
                self.metrics.append(kind, Sample::new(timestamp, value));
            }
            Err(e) if e.is_persistent() => {
                if self.degraded.insert(kind) {
                    warn!("{kind} sampling degraded, history will go stale: {e}");
                }
            }
            Err(e) => debug!("{kind} reading skipped this tick: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::{NetCounters, ReadError};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    struct StubSource {
        cpu:         ReadResult<f32>,
        ram:         ReadResult<f32>,
        gpu:         ReadResult<Option<f32>>,
        gpu_present: bool,
        gpu_calls:   AtomicUsize,
        /// Popped per call; the last entry repeats.
        net:         Mutex<VecDeque<ReadResult<NetCounters>>>,
        top_cpu:     TopConsumer,
        /// Simulated driver latency inside every CPU read.
        cpu_delay:   Duration,
        /// 1-based CPU call that panics instead of answering.
        cpu_panics_on: Option<usize>,
        cpu_calls:   AtomicUsize,
        in_flight:   AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Default for StubSource {
        fn default() -> Self {
            Self {
                cpu:         Ok(12.5),
                ram:         Ok(40.0),
                gpu:         Ok(Some(30.0)),
                gpu_present: true,
                gpu_calls:   AtomicUsize::new(0),
                net:         Mutex::new(VecDeque::from([Ok(NetCounters::default())])),
                top_cpu:     TopConsumer::sentinel(),
                cpu_delay:   Duration::ZERO,
                cpu_panics_on: None,
                cpu_calls:   AtomicUsize::new(0),
                in_flight:   AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    impl MetricSource for StubSource {
        fn cpu_usage_percent(&self) -> ReadResult<f32> {
            let call = self.cpu_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);
            std::thread::sleep(self.cpu_delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.cpu_panics_on == Some(call) {
                panic!("sensor driver crashed");
            }
            self.cpu.clone()
        }
        fn ram_usage_percent(&self) -> ReadResult<f32> {
            self.ram.clone()
        }
        fn gpu_usage_percent(&self) -> ReadResult<Option<f32>> {
            self.gpu_calls.fetch_add(1, Ordering::Relaxed);
            self.gpu.clone()
        }
        fn net_counters(&self) -> ReadResult<NetCounters> {
            let mut net = self.net.lock();
            if net.len() > 1 {
                net.pop_front().unwrap_or(Ok(NetCounters::default()))
            } else {
                net.front().cloned().unwrap_or(Ok(NetCounters::default()))
            }
        }
        fn top_by_cpu(&self) -> TopConsumer {
            self.top_cpu.clone()
        }
        fn top_by_ram(&self) -> TopConsumer {
            TopConsumer::sentinel()
        }
        fn top_by_gpu(&self) -> TopConsumer {
            TopConsumer::new("render", 7, 512.0)
        }
        fn top_by_net(&self) -> TopConsumer {
            TopConsumer::sentinel()
        }
        fn uptime(&self) -> Duration {
            Duration::from_secs(3_600)
        }
        fn gpu_available(&self) -> bool {
            self.gpu_present
        }
    }

    fn settings(horizon: usize, interval_ms: u64) -> SamplerSettings {
        SamplerSettings {
            horizon,
            interval: Duration::from_millis(interval_ms),
            gpu_enabled: true,
        }
    }

    fn sampler(source: StubSource, horizon: usize, interval_ms: u64) -> Sampler {
        Sampler::new(Arc::new(source), settings(horizon, interval_ms))
    }

    fn strictly_increasing(samples: &[Sample]) -> bool {
        samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }

    #[tokio::test]
    async fn fills_horizon_at_configured_period() {
        let s = sampler(StubSource::default(), 5, 100);
        assert!(s.start());
        tokio::time::sleep(Duration::from_millis(600)).await;

        let cpu = s.snapshot(ResourceKind::Cpu);
        assert!((5..=6).contains(&cpu.len()), "len {}", cpu.len());
        assert!(strictly_increasing(&cpu));
        assert!(cpu.iter().all(|x| x.value == SampleValue::percent(12.5)));
        s.stop().await;
    }

    #[tokio::test]
    async fn second_start_does_not_spawn_another_loop() {
        let s = sampler(StubSource::default(), 300, 50);
        assert!(s.start());
        assert!(!s.start());
        assert!(s.is_running());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let ticks = s.tick_count();
        // One loop gives ~10-11 ticks; two would give ~20.
        assert!((5..=14).contains(&ticks), "ticks {ticks}");
        s.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_the_loop_and_allows_restart() {
        let s = sampler(StubSource::default(), 300, 20);
        s.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        s.stop().await;
        assert!(!s.is_running());

        let frozen = s.tick_count();
        assert!(frozen > 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(s.tick_count(), frozen);

        assert!(s.start());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(s.tick_count() > frozen);
        s.stop().await;
    }

    #[tokio::test]
    async fn restart_while_stopping_never_overlaps_ticks() {
        let source = Arc::new(StubSource {
            cpu_delay: Duration::from_millis(200),
            ..StubSource::default()
        });
        let s = Arc::new(Sampler::new(source.clone(), settings(100, 10)));
        assert!(s.start());

        // First tick is now blocked inside the slow CPU read.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stopping = tokio::spawn({
            let s = Arc::clone(&s);
            async move { s.stop().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!s.start(), "start must wait until the old loop has exited");

        stopping.await.unwrap();
        assert!(!s.is_running());
        assert!(s.start());
        tokio::time::sleep(Duration::from_millis(500)).await;
        s.stop().await;

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(s.tick_count() >= 2);
        assert!(strictly_increasing(&s.snapshot(ResourceKind::Cpu)));
    }

    #[tokio::test]
    async fn panicking_tick_is_survived() {
        let s = sampler(
            StubSource {
                cpu_panics_on: Some(2),
                ..StubSource::default()
            },
            100,
            20,
        );
        assert!(s.start());
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(s.is_running());
        let ticks = s.tick_count();
        let cpu = s.snapshot(ResourceKind::Cpu).len();
        assert!(ticks >= 3, "ticks {ticks}");
        assert!(cpu >= 3, "cpu samples {cpu}");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(s.tick_count() > ticks);
        assert!(s.snapshot(ResourceKind::Cpu).len() > cpu);
        s.stop().await;
    }

    #[test]
    fn ram_failure_leaves_other_buffers_untouched() {
        let s = sampler(
            StubSource {
                ram: Err(ReadError::transient("permission denied")),
                ..StubSource::default()
            },
            10,
            1_000,
        );
        let mut ticker = s.ticker.lock();
        ticker.tick();
        ticker.tick();

        assert_eq!(s.snapshot(ResourceKind::Cpu).len(), 2);
        assert!(s.snapshot(ResourceKind::Ram).is_empty());
        assert_eq!(s.snapshot(ResourceKind::Gpu).len(), 2);
        assert_eq!(s.snapshot(ResourceKind::Net).len(), 2);
        assert_eq!(s.tick_count(), 2);
    }

    #[test]
    fn persistent_failure_degrades_one_buffer_until_recovery() {
        let s = sampler(
            StubSource {
                net: Mutex::new(VecDeque::from([
                    Err(ReadError::unsupported("no counters")),
                    Err(ReadError::unsupported("no counters")),
                    Ok(NetCounters { bytes_sent: 1, bytes_recv: 2 }),
                ])),
                ..StubSource::default()
            },
            10,
            1_000,
        );
        let mut ticker = s.ticker.lock();
        ticker.tick();
        ticker.tick();
        assert!(ticker.degraded.contains(&ResourceKind::Net));
        assert!(s.snapshot(ResourceKind::Net).is_empty());
        assert_eq!(s.snapshot(ResourceKind::Cpu).len(), 2);

        ticker.tick();
        assert!(ticker.degraded.is_empty());
        assert_eq!(s.snapshot(ResourceKind::Net).len(), 1);
    }

    #[test]
    fn absent_gpu_stores_placeholder_and_sentinel_top() {
        let s = sampler(
            StubSource {
                gpu: Ok(None),
                gpu_present: false,
                ..StubSource::default()
            },
            10,
            1_000,
        );
        s.ticker.lock().tick();

        assert!(!s.gpu_available());
        let gpu = s.snapshot(ResourceKind::Gpu);
        assert_eq!(gpu.len(), 1);
        assert_eq!(gpu[0].value, SampleValue::percent(GPU_PLACEHOLDER));
        assert_eq!(s.top_consumer(ResourceKind::Gpu), TopConsumer::new("–", 0, 0.0));
    }

    #[test]
    fn gpu_reading_of_none_is_placeholder() {
        let s = sampler(StubSource { gpu: Ok(None), ..StubSource::default() }, 10, 1_000);
        s.ticker.lock().tick();
        assert!(s.gpu_available());
        assert_eq!(
            s.metrics().latest(ResourceKind::Gpu).map(|x| x.value),
            Some(SampleValue::percent(GPU_PLACEHOLDER))
        );
    }

    #[test]
    fn disabled_gpu_is_never_queried() {
        let source = Arc::new(StubSource::default());
        let s = Sampler::new(
            source.clone(),
            SamplerSettings { gpu_enabled: false, ..settings(10, 1_000) },
        );
        s.ticker.lock().tick();

        assert_eq!(source.gpu_calls.load(Ordering::Relaxed), 0);
        assert_eq!(
            s.metrics().latest(ResourceKind::Gpu).map(|x| x.value),
            Some(SampleValue::percent(GPU_PLACEHOLDER))
        );
        assert!(s.top_consumer(ResourceKind::Gpu).is_sentinel());
    }

    #[test]
    fn counter_reset_is_stored_as_is() {
        let readings = [(100, 200), (300, 400), (5, 6)]
            .map(|(bytes_sent, bytes_recv)| Ok(NetCounters { bytes_sent, bytes_recv }));
        let s = sampler(
            StubSource {
                net: Mutex::new(VecDeque::from(readings)),
                ..StubSource::default()
            },
            10,
            1_000,
        );
        let mut ticker = s.ticker.lock();
        for _ in 0..3 {
            ticker.tick();
        }

        let sent: Vec<u64> = s
            .snapshot(ResourceKind::Net)
            .iter()
            .filter_map(|x| x.value.as_counters())
            .map(|c| c.bytes_sent)
            .collect();
        assert_eq!(sent, vec![100, 300, 5]);
    }

    #[test]
    fn top_consumer_passes_through_unmodified() {
        let s = sampler(
            StubSource {
                top_cpu: TopConsumer::new("stress.exe", 4321, 97.5),
                ..StubSource::default()
            },
            10,
            1_000,
        );
        assert_eq!(
            s.top_consumer(ResourceKind::Cpu),
            TopConsumer::new("stress.exe", 4321, 97.5)
        );
        assert_eq!(s.top_consumer(ResourceKind::Gpu), TopConsumer::new("render", 7, 512.0));
        assert_eq!(s.uptime(), Duration::from_secs(3_600));
    }

    #[test]
    fn timestamps_stay_strictly_increasing() {
        let s = sampler(StubSource::default(), 100, 1_000);
        let mut ticker = s.ticker.lock();
        ticker.last_timestamp = Some(unix_now() + 60.0); // clock stepped back
        for _ in 0..50 {
            ticker.tick();
        }
        assert!(strictly_increasing(&s.snapshot(ResourceKind::Cpu)));
    }
}

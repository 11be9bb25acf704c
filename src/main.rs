//! pcdash — a local host-metrics dashboard served over HTTP.
//!
//! Run with:  `RUST_LOG=info pcdash` and open http://127.0.0.1:8050

use anyhow::{Context, Result};
use clap::Parser;
use dash_config::DashConfig;
use dash_sampler::{Sampler, SamplerSettings};
use dash_system::{GpuCapability, SysinfoSource};
use dash_web::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pcdash")]
#[command(version)]
#[command(about = "Live CPU, RAM, GPU and network charts in the browser", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "PCDASH_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind`
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Samples kept per chart, overrides `sampler.horizon_seconds`
    #[arg(long, value_name = "N")]
    horizon: Option<usize>,

    /// Seconds between samples, overrides `sampler.sample_interval_seconds`
    #[arg(long, value_name = "SECS")]
    interval: Option<f64>,

    /// Never query the GPU driver
    #[arg(long)]
    no_gpu: bool,
}

impl Cli {
    fn apply(&self, config: &mut DashConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(horizon) = self.horizon {
            config.sampler.horizon_seconds = horizon;
        }
        if let Some(interval) = self.interval {
            config.sampler.sample_interval_seconds = interval;
        }
        if self.no_gpu {
            config.sampler.gpu_enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logging — RUST_LOG controls verbosity (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("pcdash v{} starting", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(dash_config::default_path);
    let mut config = dash_config::load(&path)?;
    cli.apply(&mut config);
    dash_config::validate(&config)?;

    let gpu_enabled = config.sampler.gpu_enabled;
    let source = tokio::task::spawn_blocking(move || {
        SysinfoSource::new(GpuCapability::detect(gpu_enabled))
    })
    .await
    .context("metric source initialisation panicked")?;

    tracing::info!("GPU: {}", source.gpu().describe());

    let sampler = Arc::new(Sampler::new(
        Arc::new(source),
        SamplerSettings::from(&config.sampler),
    ));
    sampler.start();

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    let state = AppState {
        sampler:             Arc::clone(&sampler),
        refresh_interval_ms: config.server.refresh_interval_ms,
    };
    let served = dash_web::serve(listener, state, shutdown_signal()).await;

    sampler.stop().await;
    served.map_err(Into::into)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

//! Host metric adapters for the dashboard sampler.
//!
//! [`SysinfoSource`] implements [`dash_core::MetricSource`] on top of
//! `sysinfo` for CPU, memory, network and processes, and NVML for the GPU.

pub mod gpu;
pub mod source;

pub use gpu::GpuCapability;
pub use source::SysinfoSource;

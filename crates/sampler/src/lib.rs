//! Background sampling of host metrics into fixed-size rolling histories.
//!
//! A [`Sampler`] owns one repeating tick task. Each tick reads every
//! dimension from a [`dash_core::MetricSource`] and appends to the matching
//! buffer of a shared [`MetricSet`]. Readers take copy-on-read snapshots and
//! never wait on the source.

pub mod metric_set;
pub mod sampler;

pub use metric_set::MetricSet;
pub use sampler::{Sampler, SamplerSettings, GPU_PLACEHOLDER};

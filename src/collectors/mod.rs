//! Metric collectors reading the published inventory

pub mod host_stats;
pub mod registry;

pub use host_stats::{HostStatSample, HostStatsCollector};
pub use registry::{CollectorRegistration, CollectorRegistry, MetricName};

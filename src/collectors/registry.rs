//! Registry of collectors and the metric names they export
//!
//! Collectors announce themselves over HTTP; the registry only keeps what they
//! sent so that operators can see who is consuming the inventory.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A collector and the metric names it reported at registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorRegistration {
    pub collector: String,
    pub metrics: Vec<String>,
}

/// One exported metric name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricName {
    pub metric_name: String,
}

#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: Arc<RwLock<Vec<CollectorRegistration>>>,
    metric_names: Arc<RwLock<Vec<MetricName>>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a collector; returns everything registered so far
    pub async fn register(&self, registration: CollectorRegistration) -> Vec<CollectorRegistration> {
        let mut collectors = self.collectors.write().await;
        debug!(
            collector = %registration.collector,
            metrics = registration.metrics.len(),
            "Collector registered"
        );
        collectors.push(registration);
        collectors.clone()
    }

    pub async fn collectors(&self) -> Vec<CollectorRegistration> {
        self.collectors.read().await.clone()
    }

    /// Append a metric name; returns the full list
    pub async fn add_metric_name(&self, metric_name: impl Into<String>) -> Vec<MetricName> {
        let mut names = self.metric_names.write().await;
        names.push(MetricName {
            metric_name: metric_name.into(),
        });
        names.clone()
    }

    pub async fn metric_names(&self) -> Vec<MetricName> {
        self.metric_names.read().await.clone()
    }

    pub async fn clear_metric_names(&self) {
        self.metric_names.write().await.clear();
    }
}

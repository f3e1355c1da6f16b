//! Host stats collector - latest host stats annotated with topology labels
//!
//! Each call works against one pinned inventory generation, so all samples of
//! a collection agree on host names, clusters and datacenters even if the
//! synchronizer publishes in the meantime.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::inventory::InventoryStore;
use crate::vrops::BulkQuery;

/// One stat value of one host, with its place in the topology
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostStatSample {
    pub stat_key: String,
    pub hostsystem: String,
    pub vcenter: String,
    pub datacenter: String,
    pub vccluster: String,
    pub value: f64,
}

pub struct HostStatsCollector {
    target: String,
    store: Arc<InventoryStore>,
    bulk: BulkQuery,
}

impl HostStatsCollector {
    pub fn new(target: impl Into<String>, store: Arc<InventoryStore>, bulk: BulkQuery) -> Self {
        HostStatsCollector {
            target: target.into(),
            store,
            bulk,
        }
    }

    /// Block until the synchronizer has published its first generation
    pub async fn wait_for_inventory(&self) {
        self.store.wait_for_inventory().await;
    }

    /// Latest value of every stat key for every host of the target
    pub async fn collect(&self, stat_keys: &[&str]) -> Vec<HostStatSample> {
        let generation = self.store.snapshot();
        let Some(token) = generation.tokens.get(&self.target) else {
            warn!(target = %self.target, "No token for target, skipping host stats");
            return Vec::new();
        };

        let uuids = generation.inventory.host_uuids_for_target(&self.target);
        if uuids.is_empty() {
            debug!(target = %self.target, "No hosts known for target");
            return Vec::new();
        }

        let mut samples = Vec::new();
        for stat_key in stat_keys {
            let values = self
                .bulk
                .latest_stat(&self.target, token, &uuids, stat_key)
                .await;
            if values.is_empty() {
                info!(target = %self.target, stat_key = %stat_key, "Skipping stat key, no return");
                continue;
            }

            for value in values {
                let Some(host) = generation.inventory.hosts.get(&value.resource_id) else {
                    debug!(resource_id = %value.resource_id, "Stat for unknown host");
                    continue;
                };
                samples.push(HostStatSample {
                    stat_key: value.stat_key,
                    hostsystem: host.name.clone(),
                    vcenter: host.vcenter.clone(),
                    datacenter: host.datacenter.to_lowercase(),
                    vccluster: host.parent_cluster_name.clone(),
                    value: value.value,
                });
            }
        }
        samples
    }
}

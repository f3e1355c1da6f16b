//! Fan-out population of a target's topology
//!
//! Datacenters and clusters are discovered sequentially. Below that, every
//! cluster of a datacenter gets its own worker task which lists the cluster's
//! hosts and then each host's datastores and VMs. At most
//! `max_cluster_workers` run at once; all of them are joined before the
//! datacenter is considered complete.
//!
//! Failures below the adapter level are isolated: a cluster whose worker fails
//! or panics keeps its place in the tree with no hosts, and its siblings are
//! unaffected.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::topology::{Cluster, NodeInfo, Vcenter};
use crate::vrops::{Backend, FetchError, Token};

pub struct TopologyFetcher {
    backend: Arc<dyn Backend>,
    max_cluster_workers: usize,
}

impl TopologyFetcher {
    pub fn new(backend: Arc<dyn Backend>, max_cluster_workers: usize) -> Self {
        TopologyFetcher {
            backend,
            max_cluster_workers: max_cluster_workers.max(1),
        }
    }

    /// Build the full vcenter forest of one target
    ///
    /// Only a failed adapter listing fails the target; anything deeper is
    /// logged and leaves the affected node without children.
    pub async fn build_target(&self, target: &str, token: &Token) -> Result<Vec<Vcenter>, FetchError> {
        let adapters = self.backend.list_adapters(target, token).await.into_items()?;
        if adapters.is_empty() {
            info!(target = %target, "No vcenter adapters registered");
        }

        let mut vcenters = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            debug!(target = %target, vcenter = %adapter.name, "Collecting vcenter");
            let mut vcenter = Vcenter::new(NodeInfo::new(
                adapter.uuid,
                adapter.name,
                target,
                token.clone(),
            ));
            self.populate_vcenter(&mut vcenter).await;
            vcenters.push(vcenter);
        }
        Ok(vcenters)
    }

    async fn populate_vcenter(&self, vcenter: &mut Vcenter) {
        if let Err(e) = vcenter.populate_datacenters(self.backend.as_ref()).await {
            warn!(vcenter = %vcenter.info.name, error = %e, "Cannot list datacenters");
            return;
        }

        for datacenter in vcenter.datacenters_mut() {
            debug!(datacenter = %datacenter.info.name, "Collecting datacenter");
            if let Err(e) = datacenter.populate_clusters(self.backend.as_ref()).await {
                warn!(datacenter = %datacenter.info.name, error = %e, "Cannot list clusters");
                continue;
            }
            let clusters = datacenter.take_clusters();
            let populated = self.populate_clusters(clusters).await;
            datacenter.restore_clusters(populated);
        }
    }

    /// One worker per cluster, joined; the returned clusters keep discovery order
    async fn populate_clusters(&self, clusters: Vec<Cluster>) -> Vec<Cluster> {
        let skeletons: Vec<Cluster> = clusters.iter().map(Cluster::skeleton).collect();
        let mut slots: Vec<Option<Cluster>> = (0..clusters.len()).map(|_| None).collect();

        let permits = Arc::new(Semaphore::new(self.max_cluster_workers));
        let mut workers = JoinSet::new();
        for (index, cluster) in clusters.into_iter().enumerate() {
            let backend = self.backend.clone();
            let permits = permits.clone();
            workers.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (index, populate_cluster(backend.as_ref(), cluster).await)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, cluster)) => slots[index] = Some(cluster),
                Err(e) => warn!(error = %e, "Cluster worker aborted"),
            }
        }

        slots
            .into_iter()
            .zip(skeletons)
            .map(|(slot, skeleton)| {
                slot.unwrap_or_else(|| {
                    warn!(cluster = %skeleton.info.name, "Cluster left without hosts this cycle");
                    skeleton
                })
            })
            .collect()
    }
}

async fn populate_cluster(backend: &dyn Backend, mut cluster: Cluster) -> Cluster {
    debug!(cluster = %cluster.info.name, "Collecting cluster");
    if let Err(e) = cluster.populate_hosts(backend).await {
        warn!(cluster = %cluster.info.name, error = %e, "Cannot list hosts");
        return cluster;
    }

    for host in cluster.hosts_mut() {
        if let Err(e) = host.populate_datastores(backend).await {
            warn!(host = %host.info.name, error = %e, "Cannot list datastores");
        }
        if let Err(e) = host.populate_vms(backend).await {
            warn!(host = %host.info.name, error = %e, "Cannot list virtual machines");
        }
    }
    cluster
}

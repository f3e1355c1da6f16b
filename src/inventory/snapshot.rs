//! Flattened inventory records
//!
//! Collectors look entities up by uuid and need their parents' names without
//! walking a tree, so every record carries the denormalized parent fields.

use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use super::topology::{NodeInfo, Vcenter};
use crate::vrops::Token;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VcenterRecord {
    pub uuid: String,
    pub name: String,
    pub target: String,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatacenterRecord {
    pub uuid: String,
    pub name: String,
    pub parent_vcenter_uuid: String,
    pub parent_vcenter_name: String,
    pub target: String,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterRecord {
    pub uuid: String,
    pub name: String,
    pub parent_dc_uuid: String,
    pub parent_dc_name: String,
    pub vcenter: String,
    pub target: String,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostRecord {
    pub uuid: String,
    pub name: String,
    pub parent_cluster_uuid: String,
    pub parent_cluster_name: String,
    pub datacenter: String,
    pub vcenter: String,
    pub target: String,
    pub token: Token,
}

/// Shared shape of datastore and VM records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostChildRecord {
    pub uuid: String,
    pub name: String,
    pub parent_host_uuid: String,
    pub parent_host_name: String,
    pub cluster: String,
    pub datacenter: String,
    pub vcenter: String,
    pub target: String,
    pub token: Token,
}

pub type DatastoreRecord = HostChildRecord;
pub type VmRecord = HostChildRecord;

/// Six lookup tables keyed by uuid
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub vcenters: HashMap<String, VcenterRecord>,
    pub datacenters: HashMap<String, DatacenterRecord>,
    pub clusters: HashMap<String, ClusterRecord>,
    pub hosts: HashMap<String, HostRecord>,
    pub datastores: HashMap<String, DatastoreRecord>,
    pub vms: HashMap<String, VmRecord>,
}

impl Inventory {
    /// Flatten a forest of populated vcenters
    pub fn flatten(vcenters: &[Vcenter]) -> Self {
        let mut inventory = Inventory::default();

        for vcenter in vcenters {
            let vc = &vcenter.info;
            inventory.vcenters.insert(
                vc.uuid.clone(),
                VcenterRecord {
                    uuid: vc.uuid.clone(),
                    name: vc.name.clone(),
                    target: vc.target.clone(),
                    token: vc.token.clone(),
                },
            );

            for datacenter in vcenter.datacenters() {
                let dc = &datacenter.info;
                inventory.datacenters.insert(
                    dc.uuid.clone(),
                    DatacenterRecord {
                        uuid: dc.uuid.clone(),
                        name: dc.name.clone(),
                        parent_vcenter_uuid: vc.uuid.clone(),
                        parent_vcenter_name: vc.name.clone(),
                        target: dc.target.clone(),
                        token: dc.token.clone(),
                    },
                );

                for cluster in datacenter.clusters() {
                    let cl = &cluster.info;
                    inventory.clusters.insert(
                        cl.uuid.clone(),
                        ClusterRecord {
                            uuid: cl.uuid.clone(),
                            name: cl.name.clone(),
                            parent_dc_uuid: dc.uuid.clone(),
                            parent_dc_name: dc.name.clone(),
                            vcenter: vc.name.clone(),
                            target: cl.target.clone(),
                            token: cl.token.clone(),
                        },
                    );

                    for host in cluster.hosts() {
                        let hs = &host.info;
                        inventory.hosts.insert(
                            hs.uuid.clone(),
                            HostRecord {
                                uuid: hs.uuid.clone(),
                                name: hs.name.clone(),
                                parent_cluster_uuid: cl.uuid.clone(),
                                parent_cluster_name: cl.name.clone(),
                                datacenter: dc.name.clone(),
                                vcenter: vc.name.clone(),
                                target: hs.target.clone(),
                                token: hs.token.clone(),
                            },
                        );

                        let leaf = |info: &NodeInfo| HostChildRecord {
                            uuid: info.uuid.clone(),
                            name: info.name.clone(),
                            parent_host_uuid: hs.uuid.clone(),
                            parent_host_name: hs.name.clone(),
                            cluster: cl.name.clone(),
                            datacenter: dc.name.clone(),
                            vcenter: vc.name.clone(),
                            target: info.target.clone(),
                            token: info.token.clone(),
                        };
                        for datastore in host.datastores() {
                            inventory
                                .datastores
                                .insert(datastore.info.uuid.clone(), leaf(&datastore.info));
                        }
                        for vm in host.vms() {
                            inventory.vms.insert(vm.info.uuid.clone(), leaf(&vm.info));
                        }
                    }
                }
            }
        }
        inventory
    }

    /// Copy every entry of `other` into `self`; on a uuid collision `other` wins
    pub fn absorb(&mut self, other: &Inventory) {
        absorb_table("vcenter", &mut self.vcenters, &other.vcenters);
        absorb_table("datacenter", &mut self.datacenters, &other.datacenters);
        absorb_table("cluster", &mut self.clusters, &other.clusters);
        absorb_table("host", &mut self.hosts, &other.hosts);
        absorb_table("datastore", &mut self.datastores, &other.datastores);
        absorb_table("vm", &mut self.vms, &other.vms);
    }

    pub fn entity_count(&self) -> usize {
        self.vcenters.len()
            + self.datacenters.len()
            + self.clusters.len()
            + self.hosts.len()
            + self.datastores.len()
            + self.vms.len()
    }

    /// Uuids of all hosts discovered on `target`
    pub fn host_uuids_for_target(&self, target: &str) -> Vec<String> {
        self.hosts
            .values()
            .filter(|h| h.target == target)
            .map(|h| h.uuid.clone())
            .collect()
    }

    /// Uuids of all VMs discovered on `target`
    pub fn vm_uuids_for_target(&self, target: &str) -> Vec<String> {
        self.vms
            .values()
            .filter(|vm| vm.target == target)
            .map(|vm| vm.uuid.clone())
            .collect()
    }
}

fn absorb_table<R: Clone>(
    kind: &str,
    into: &mut HashMap<String, R>,
    from: &HashMap<String, R>,
) {
    for (uuid, record) in from {
        if into.insert(uuid.clone(), record.clone()).is_some() {
            warn!(kind = %kind, uuid = %uuid, "Duplicate uuid across targets, keeping the later one");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::fetcher::TopologyFetcher;
    use crate::testing::FakeBackend;
    use std::sync::Arc;

    async fn forest(target: &str) -> Vec<Vcenter> {
        let backend = Arc::new(FakeBackend::standard(&[target]));
        TopologyFetcher::new(backend, 4)
            .build_target(target, &Token::new(format!("token-{target}")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_flatten_denormalizes_parents() {
        let inventory = Inventory::flatten(&forest("vrops-a").await);

        assert_eq!(inventory.vcenters.len(), 1);
        assert_eq!(inventory.datacenters.len(), 1);
        assert_eq!(inventory.clusters.len(), 2);
        assert_eq!(inventory.hosts.len(), 2);
        assert_eq!(inventory.datastores.len(), 2);
        assert_eq!(inventory.vms.len(), 2);
        assert_eq!(inventory.entity_count(), 10);

        let dc = &inventory.datacenters["vrops-a/dc1"];
        assert_eq!(dc.parent_vcenter_uuid, "vrops-a/vc");
        assert_eq!(dc.parent_vcenter_name, "vc-vrops-a");

        let cluster = &inventory.clusters["vrops-a/c2"];
        assert_eq!(cluster.parent_dc_name, "DC1");
        assert_eq!(cluster.vcenter, "vc-vrops-a");

        let host = &inventory.hosts["vrops-a/h1"];
        assert_eq!(host.parent_cluster_name, "C1");
        assert_eq!(host.datacenter, "DC1");

        let vm = &inventory.vms["vrops-a/vm2"];
        assert_eq!(vm.parent_host_name, "esx-c2");
        assert_eq!(vm.cluster, "C2");
        assert_eq!(vm.token, Token::new("token-vrops-a"));
    }

    #[tokio::test]
    async fn test_absorb_merges_targets() {
        let mut merged = Inventory::flatten(&forest("vrops-a").await);
        merged.absorb(&Inventory::flatten(&forest("vrops-b").await));

        assert_eq!(merged.vcenters.len(), 2);
        assert_eq!(merged.hosts.len(), 4);
        assert_eq!(merged.host_uuids_for_target("vrops-b").len(), 2);
        assert_eq!(merged.vm_uuids_for_target("vrops-a").len(), 2);
    }

    #[test]
    fn test_record_serializes_original_field_names() {
        let record = HostRecord {
            uuid: "h-1".to_string(),
            name: "esx01".to_string(),
            parent_cluster_uuid: "c-1".to_string(),
            parent_cluster_name: "C1".to_string(),
            datacenter: "DC1".to_string(),
            vcenter: "vc".to_string(),
            target: "vrops-a".to_string(),
            token: Token::new("tok"),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["parent_cluster_name"], "C1");
        assert_eq!(json["token"], "tok");
    }

    #[test]
    fn test_flatten_empty_forest() {
        assert_eq!(Inventory::flatten(&[]), Inventory::default());
    }
}

//! In-memory vROps topology for one cycle
//!
//! vcenter -> datacenter -> cluster -> host -> {datastore, virtual machine}
//!
//! A fresh tree is built every cycle and dropped once it has been flattened.
//! Each child list starts out [`Children::Pending`]; populating it fetches the
//! direct children from the backend exactly once. Calling populate again on a
//! populated list is a no-op, so children are never duplicated.

use tracing::debug;

use crate::vrops::{Backend, FetchError, ResourceKind, ResourceRef, Token};

/// Identity shared by every node kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub uuid: String,
    pub name: String,
    pub target: String,
    pub token: Token,
}

impl NodeInfo {
    pub fn new(
        uuid: impl Into<String>,
        name: impl Into<String>,
        target: impl Into<String>,
        token: Token,
    ) -> Self {
        NodeInfo {
            uuid: uuid.into(),
            name: name.into(),
            target: target.into(),
            token,
        }
    }

    /// Children inherit the target and token of their parent
    fn child(&self, resource: ResourceRef) -> NodeInfo {
        NodeInfo {
            uuid: resource.uuid,
            name: resource.name,
            target: self.target.clone(),
            token: self.token.clone(),
        }
    }
}

/// Child list of one kind
#[derive(Debug, Clone, PartialEq)]
pub enum Children<T> {
    Pending,
    Populated(Vec<T>),
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Children::Pending
    }
}

impl<T> Children<T> {
    pub fn is_populated(&self) -> bool {
        matches!(self, Children::Populated(_))
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            Children::Pending => &[],
            Children::Populated(items) => items,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            Children::Pending => &mut [],
            Children::Populated(items) => items,
        }
    }

    /// Fetch children of `kind` under `parent` unless already populated
    ///
    /// A failed listing still marks the list populated (empty) so the node is
    /// never fetched twice within a cycle; the error is returned to the caller.
    async fn populate(
        &mut self,
        backend: &dyn Backend,
        parent: &NodeInfo,
        kind: ResourceKind,
        make: impl Fn(NodeInfo) -> T,
    ) -> Result<usize, FetchError> {
        if let Children::Populated(existing) = self {
            debug!(parent = %parent.name, kind = %kind, "Children already populated this cycle");
            return Ok(existing.len());
        }

        let listed = backend
            .list_resources(&parent.target, &parent.token, kind, Some(&parent.uuid))
            .await
            .into_items();

        let (nodes, result) = match listed {
            Ok(resources) => {
                let nodes: Vec<T> = resources
                    .into_iter()
                    .map(|resource| make(parent.child(resource)))
                    .collect();
                let count = nodes.len();
                (nodes, Ok(count))
            }
            Err(e) => (Vec::new(), Err(e)),
        };
        debug!(parent = %parent.name, kind = %kind, count = nodes.len(), "Collected children");
        *self = Children::Populated(nodes);
        result
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vcenter {
    pub info: NodeInfo,
    datacenters: Children<Datacenter>,
}

impl Vcenter {
    pub fn new(info: NodeInfo) -> Self {
        Vcenter {
            info,
            datacenters: Children::Pending,
        }
    }

    pub async fn populate_datacenters(&mut self, backend: &dyn Backend) -> Result<usize, FetchError> {
        self.datacenters
            .populate(backend, &self.info, ResourceKind::Datacenter, Datacenter::new)
            .await
    }

    pub fn datacenters(&self) -> &[Datacenter] {
        self.datacenters.as_slice()
    }

    pub fn datacenters_mut(&mut self) -> &mut [Datacenter] {
        self.datacenters.as_mut_slice()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Datacenter {
    pub info: NodeInfo,
    clusters: Children<Cluster>,
}

impl Datacenter {
    pub fn new(info: NodeInfo) -> Self {
        Datacenter {
            info,
            clusters: Children::Pending,
        }
    }

    pub async fn populate_clusters(&mut self, backend: &dyn Backend) -> Result<usize, FetchError> {
        self.clusters
            .populate(backend, &self.info, ResourceKind::Cluster, Cluster::new)
            .await
    }

    pub fn clusters(&self) -> &[Cluster] {
        self.clusters.as_slice()
    }

    /// Move the clusters out so they can be populated by separate workers
    pub fn take_clusters(&mut self) -> Vec<Cluster> {
        match std::mem::take(&mut self.clusters) {
            Children::Pending => Vec::new(),
            Children::Populated(clusters) => clusters,
        }
    }

    /// Put back clusters previously moved out with [`Datacenter::take_clusters`]
    pub fn restore_clusters(&mut self, clusters: Vec<Cluster>) {
        self.clusters = Children::Populated(clusters);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub info: NodeInfo,
    hosts: Children<Host>,
}

impl Cluster {
    pub fn new(info: NodeInfo) -> Self {
        Cluster {
            info,
            hosts: Children::Pending,
        }
    }

    /// Same cluster with an empty, already populated host list
    pub fn skeleton(&self) -> Self {
        Cluster {
            info: self.info.clone(),
            hosts: Children::Populated(Vec::new()),
        }
    }

    pub async fn populate_hosts(&mut self, backend: &dyn Backend) -> Result<usize, FetchError> {
        self.hosts
            .populate(backend, &self.info, ResourceKind::Host, Host::new)
            .await
    }

    pub fn hosts(&self) -> &[Host] {
        self.hosts.as_slice()
    }

    pub fn hosts_mut(&mut self) -> &mut [Host] {
        self.hosts.as_mut_slice()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub info: NodeInfo,
    datastores: Children<Datastore>,
    vms: Children<VirtualMachine>,
}

impl Host {
    pub fn new(info: NodeInfo) -> Self {
        Host {
            info,
            datastores: Children::Pending,
            vms: Children::Pending,
        }
    }

    pub async fn populate_datastores(&mut self, backend: &dyn Backend) -> Result<usize, FetchError> {
        self.datastores
            .populate(backend, &self.info, ResourceKind::Datastore, |info| Datastore { info })
            .await
    }

    pub async fn populate_vms(&mut self, backend: &dyn Backend) -> Result<usize, FetchError> {
        self.vms
            .populate(backend, &self.info, ResourceKind::VirtualMachine, |info| {
                VirtualMachine { info }
            })
            .await
    }

    pub fn datastores(&self) -> &[Datastore] {
        self.datastores.as_slice()
    }

    pub fn vms(&self) -> &[VirtualMachine] {
        self.vms.as_slice()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Datastore {
    pub info: NodeInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachine {
    pub info: NodeInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    fn vcenter(target: &str) -> Vcenter {
        Vcenter::new(NodeInfo::new(
            format!("{target}/vc"),
            format!("vc-{target}"),
            target,
            Token::new(format!("token-{target}")),
        ))
    }

    #[tokio::test]
    async fn test_children_inherit_target_and_token() {
        let backend = FakeBackend::standard(&["vrops-a"]);
        let mut vc = vcenter("vrops-a");

        assert_eq!(vc.populate_datacenters(&backend).await.unwrap(), 1);
        let dc = &mut vc.datacenters_mut()[0];
        assert_eq!(dc.info.name, "DC1");
        assert_eq!(dc.info.target, "vrops-a");
        assert_eq!(dc.info.token, Token::new("token-vrops-a"));

        assert_eq!(dc.populate_clusters(&backend).await.unwrap(), 2);
        let names: Vec<&str> = dc.clusters().iter().map(|c| c.info.name.as_str()).collect();
        assert_eq!(names, vec!["C1", "C2"]);
    }

    #[tokio::test]
    async fn test_populate_runs_once_per_cycle() {
        let backend = FakeBackend::standard(&["vrops-a"]);
        let mut vc = vcenter("vrops-a");

        vc.populate_datacenters(&backend).await.unwrap();
        vc.populate_datacenters(&backend).await.unwrap();

        assert_eq!(vc.datacenters().len(), 1);
        assert_eq!(backend.listing_calls("vrops-a/vc", ResourceKind::Datacenter), 1);
    }

    #[tokio::test]
    async fn test_failed_listing_marks_node_populated_and_empty() {
        let backend = FakeBackend::standard(&["vrops-a"]);
        backend.fail_listing("vrops-a/h1");
        let mut host = Host::new(NodeInfo::new("vrops-a/h1", "esx-c1", "vrops-a", Token::new("t")));

        assert!(host.populate_datastores(&backend).await.is_err());
        assert!(host.datastores().is_empty());
        assert!(host.datastores.is_populated());

        // no second request for a node already marked populated
        assert_eq!(host.populate_datastores(&backend).await.unwrap(), 0);
        assert_eq!(backend.listing_calls("vrops-a/h1", ResourceKind::Datastore), 1);
    }

    #[tokio::test]
    async fn test_host_populates_datastores_and_vms() {
        let backend = FakeBackend::standard(&["vrops-a"]);
        let mut host = Host::new(NodeInfo::new("vrops-a/h2", "esx-c2", "vrops-a", Token::new("t")));

        host.populate_datastores(&backend).await.unwrap();
        host.populate_vms(&backend).await.unwrap();
        assert_eq!(host.datastores()[0].info.uuid, "vrops-a/ds2");
        assert_eq!(host.vms()[0].info.name, "vm-h2");
    }

    #[test]
    fn test_take_and_restore_clusters() {
        let info = NodeInfo::new("dc", "DC1", "t", Token::new("t"));
        let mut dc = Datacenter::new(info.clone());
        assert!(dc.take_clusters().is_empty());

        let cluster = Cluster::new(NodeInfo::new("c1", "C1", "t", Token::new("t")));
        dc.restore_clusters(vec![cluster.skeleton()]);
        assert_eq!(dc.clusters().len(), 1);
        assert!(dc.clusters()[0].hosts.is_populated());
    }
}

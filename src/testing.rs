//! In-memory backend for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::config::Credentials;
use crate::vrops::{
    AdapterDescriptor, AncestorLink, AncestorQuery, Backend, FetchError, FetchOutcome,
    PropertyData, PropertyValue, ResourceKind, ResourceRef, StatValue, Token,
};

#[derive(Default)]
struct State {
    adapters: HashMap<String, Vec<AdapterDescriptor>>,
    children: HashMap<(String, ResourceKind), Vec<ResourceRef>>,
    token_failures: HashMap<String, u16>,
    adapter_failures: HashSet<String>,
    listing_failures: HashSet<String>,
    listing_panics: HashSet<String>,
    stat_failures: HashSet<String>,
    stat_chunk_sizes: Vec<usize>,
    listing_calls: HashMap<(String, ResourceKind), usize>,
    token_calls: HashMap<String, usize>,
    listings_in_flight: usize,
    peak_listings_in_flight: usize,
    stats_in_flight: usize,
    peak_stats_in_flight: usize,
}

/// Scriptable [`Backend`] with a fixed topology and injectable failures
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per target: one vcenter, datacenter `DC1`, clusters `C1`/`C2` with one
    /// host each, and one datastore plus one VM per host
    pub fn standard(targets: &[&str]) -> Self {
        let backend = Self::new();
        for target in targets {
            let vc = format!("{target}/vc");
            let dc = format!("{target}/dc1");
            backend.add_adapter(target, &format!("vc-{target}"), &vc);
            backend.add_child(&vc, ResourceKind::Datacenter, "DC1", &dc);
            for n in 1..=2 {
                let cluster = format!("{target}/c{n}");
                let host = format!("{target}/h{n}");
                backend.add_child(&dc, ResourceKind::Cluster, &format!("C{n}"), &cluster);
                backend.add_child(&cluster, ResourceKind::Host, &format!("esx-c{n}"), &host);
                backend.add_child(
                    &host,
                    ResourceKind::Datastore,
                    &format!("ds-h{n}"),
                    &format!("{target}/ds{n}"),
                );
                backend.add_child(
                    &host,
                    ResourceKind::VirtualMachine,
                    &format!("vm-h{n}"),
                    &format!("{target}/vm{n}"),
                );
            }
        }
        backend
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_adapter(&self, target: &str, name: &str, uuid: &str) {
        self.with_state(|s| {
            s.adapters
                .entry(target.to_string())
                .or_default()
                .push(AdapterDescriptor {
                    name: name.to_string(),
                    uuid: uuid.to_string(),
                    adapter_kind: "VMWARE".to_string(),
                })
        });
    }

    pub fn add_child(&self, parent: &str, kind: ResourceKind, name: &str, uuid: &str) {
        self.with_state(|s| {
            s.children
                .entry((parent.to_string(), kind))
                .or_default()
                .push(ResourceRef::new(name, uuid))
        });
    }

    pub fn remove_child(&self, parent: &str, kind: ResourceKind, uuid: &str) {
        self.with_state(|s| {
            if let Some(children) = s.children.get_mut(&(parent.to_string(), kind)) {
                children.retain(|c| c.uuid != uuid);
            }
        });
    }

    pub fn fail_token(&self, target: &str, status: u16) {
        self.with_state(|s| s.token_failures.insert(target.to_string(), status));
    }

    pub fn restore_token(&self, target: &str) {
        self.with_state(|s| s.token_failures.remove(target));
    }

    pub fn fail_adapters(&self, target: &str) {
        self.with_state(|s| s.adapter_failures.insert(target.to_string()));
    }

    pub fn fail_listing(&self, parent: &str) {
        self.with_state(|s| s.listing_failures.insert(parent.to_string()));
    }

    pub fn panic_listing(&self, parent: &str) {
        self.with_state(|s| s.listing_panics.insert(parent.to_string()));
    }

    pub fn fail_stats_for(&self, uuid: &str) {
        self.with_state(|s| s.stat_failures.insert(uuid.to_string()));
    }

    pub fn stat_chunk_sizes(&self) -> Vec<usize> {
        self.with_state(|s| s.stat_chunk_sizes.clone())
    }

    pub fn listing_calls(&self, parent: &str, kind: ResourceKind) -> usize {
        self.with_state(|s| {
            s.listing_calls
                .get(&(parent.to_string(), kind))
                .copied()
                .unwrap_or(0)
        })
    }

    pub fn token_calls(&self, target: &str) -> usize {
        self.with_state(|s| s.token_calls.get(target).copied().unwrap_or(0))
    }

    /// Most resource listings that were ever running at the same time
    pub fn peak_listings_in_flight(&self) -> usize {
        self.with_state(|s| s.peak_listings_in_flight)
    }

    /// Most stat queries that were ever running at the same time
    pub fn peak_stats_in_flight(&self) -> usize {
        self.with_state(|s| s.peak_stats_in_flight)
    }
}

fn unavailable(target: &str) -> FetchError {
    FetchError::Connectivity {
        target: target.to_string(),
        reason: "scripted failure".to_string(),
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn acquire_token(&self, target: &str, _credentials: &Credentials) -> FetchOutcome<Token> {
        self.with_state(|s| {
            *s.token_calls.entry(target.to_string()).or_default() += 1;
            match s.token_failures.get(target) {
                Some(status) => FetchOutcome::Failed(FetchError::Status {
                    target: target.to_string(),
                    status: *status,
                    body: "denied".to_string(),
                }),
                None => FetchOutcome::Data(Token::new(format!("token-{target}"))),
            }
        })
    }

    async fn list_adapters(
        &self,
        target: &str,
        _token: &Token,
    ) -> FetchOutcome<Vec<AdapterDescriptor>> {
        self.with_state(|s| {
            if s.adapter_failures.contains(target) {
                return FetchOutcome::Failed(unavailable(target));
            }
            FetchOutcome::from_items(s.adapters.get(target).cloned().unwrap_or_default())
        })
    }

    async fn list_resources(
        &self,
        target: &str,
        _token: &Token,
        kind: ResourceKind,
        parent_id: Option<&str>,
    ) -> FetchOutcome<Vec<ResourceRef>> {
        self.with_state(|s| {
            s.listings_in_flight += 1;
            s.peak_listings_in_flight = s.peak_listings_in_flight.max(s.listings_in_flight);
        });
        // give concurrent cluster workers a chance to interleave
        tokio::task::yield_now().await;

        let parent = parent_id.unwrap_or_default().to_string();
        let (outcome, should_panic) = self.with_state(|s| {
            s.listings_in_flight -= 1;
            *s.listing_calls.entry((parent.clone(), kind)).or_default() += 1;
            if s.listing_panics.contains(&parent) {
                return (FetchOutcome::Empty, true);
            }
            if s.listing_failures.contains(&parent) {
                return (FetchOutcome::Failed(unavailable(target)), false);
            }
            let children = s.children.get(&(parent.clone(), kind)).cloned();
            (FetchOutcome::from_items(children.unwrap_or_default()), false)
        });
        if should_panic {
            panic!("scripted panic while listing {kind} under {parent}");
        }
        outcome
    }

    async fn latest_stats(
        &self,
        target: &str,
        _token: &Token,
        uuids: &[String],
        stat_key: &str,
    ) -> FetchOutcome<Vec<StatValue>> {
        self.with_state(|s| {
            s.stats_in_flight += 1;
            s.peak_stats_in_flight = s.peak_stats_in_flight.max(s.stats_in_flight);
        });
        tokio::task::yield_now().await;
        self.with_state(|s| {
            s.stats_in_flight -= 1;
            s.stat_chunk_sizes.push(uuids.len());
            if uuids.iter().any(|u| s.stat_failures.contains(u)) {
                return FetchOutcome::Failed(unavailable(target));
            }
            FetchOutcome::from_items(
                uuids
                    .iter()
                    .enumerate()
                    .map(|(i, uuid)| StatValue {
                        resource_id: uuid.clone(),
                        stat_key: stat_key.to_string(),
                        value: i as f64,
                    })
                    .collect(),
            )
        })
    }

    async fn latest_properties(
        &self,
        _target: &str,
        _token: &Token,
        uuids: &[String],
        property_key: &str,
    ) -> FetchOutcome<Vec<PropertyValue>> {
        FetchOutcome::from_items(
            uuids
                .iter()
                .map(|uuid| PropertyValue {
                    resource_id: uuid.clone(),
                    property_key: property_key.to_string(),
                    value: PropertyData::Text("Powered On".to_string()),
                })
                .collect(),
        )
    }

    async fn ancestor_relationships(
        &self,
        _target: &str,
        _token: &Token,
        uuids: &[String],
        _query: &AncestorQuery,
    ) -> FetchOutcome<Vec<AncestorLink>> {
        FetchOutcome::from_items(
            uuids
                .iter()
                .map(|uuid| AncestorLink {
                    resource_id: uuid.clone(),
                    ancestor_label: format!("project-{uuid}"),
                })
                .collect(),
        )
    }
}

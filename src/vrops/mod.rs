//! vROps suite-api boundary
//!
//! Everything the inventory engine needs from a vROps target goes through the
//! [`Backend`] trait. [`VropsClient`] is the HTTP implementation; the bulk
//! helpers in [`bulk`] layer chunking and bounded fan-out on top of any backend.
//!
//! ## Outcomes
//!
//! Calls never panic and never hand back a bare error. Each single call returns
//! a [`FetchOutcome`]:
//! - `Data` - a well-formed response with content
//! - `Empty` - a well-formed response with nothing in it (not an error)
//! - `Failed` - connectivity, status or decoding problem, with the reason

pub mod bulk;
pub mod client;
pub mod models;

pub use bulk::BulkQuery;
pub use client::{VropsClient, VropsClientConfig};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::config::Credentials;

/// Opaque bearer credential for one target
///
/// Never rotated mid-build: every node of a cycle carries the token that was
/// acquired for its target at the start of that cycle.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Token(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Why a backend call produced no usable data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Timeout, DNS, TLS or any other transport problem
    #[error("connection to {target} failed: {reason}")]
    Connectivity { target: String, reason: String },

    /// The backend answered with something other than 200
    #[error("{target} answered {status}: {body}")]
    Status {
        target: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape
    #[error("malformed response from {target}: {reason}")]
    Malformed { target: String, reason: String },
}

impl FetchError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, FetchError::Status { status: 401 | 403, .. })
    }
}

/// Classified result of a single backend call
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Data(T),
    Empty,
    Failed(FetchError),
}

impl<T> FetchOutcome<T> {
    /// Collapse into a `Result`, with `Empty` mapped to `None`
    pub fn into_result(self) -> Result<Option<T>, FetchError> {
        match self {
            FetchOutcome::Data(value) => Ok(Some(value)),
            FetchOutcome::Empty => Ok(None),
            FetchOutcome::Failed(e) => Err(e),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

impl<T> FetchOutcome<Vec<T>> {
    /// `Data` when there is at least one item, `Empty` otherwise
    pub fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Data(items)
        }
    }

    /// Items of a successful call, or the error of a failed one
    pub fn into_items(self) -> Result<Vec<T>, FetchError> {
        self.into_result().map(Option::unwrap_or_default)
    }
}

/// Resource kinds the inventory walks, in suite-api spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Datacenter,
    Cluster,
    Host,
    Datastore,
    VirtualMachine,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Datacenter => "Datacenter",
            ResourceKind::Cluster => "ClusterComputeResource",
            ResourceKind::Host => "HostSystem",
            ResourceKind::Datastore => "Datastore",
            ResourceKind::VirtualMachine => "VirtualMachine",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One monitoring adapter instance (a vcenter) registered in vROps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescriptor {
    pub name: String,
    pub uuid: String,
    pub adapter_kind: String,
}

/// Name and identifier of a listed resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub name: String,
    pub uuid: String,
}

impl ResourceRef {
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        ResourceRef {
            name: name.into(),
            uuid: uuid.into(),
        }
    }
}

/// Latest value of one stat key for one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatValue {
    pub resource_id: String,
    pub stat_key: String,
    pub value: f64,
}

/// Latest value of one property for one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyValue {
    pub resource_id: String,
    pub property_key: String,
    pub value: PropertyData,
}

/// Properties come back either as numbers or as strings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyData {
    Number(f64),
    Text(String),
}

/// A resource and the label of its matching ancestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorLink {
    pub resource_id: String,
    pub ancestor_label: String,
}

/// Which ancestors a bulk relationship query should resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorQuery {
    pub names: Vec<String>,
    pub adapter_kind: String,
    pub resource_kind: String,
    pub hierarchy_depth: u32,
}

impl AncestorQuery {
    /// Project folders enclosing VMs, labelled `Project (<project id>)`
    pub fn project() -> Self {
        AncestorQuery {
            names: vec!["Project".to_string()],
            adapter_kind: "VMWARE".to_string(),
            resource_kind: "VMFolder".to_string(),
            hierarchy_depth: 5,
        }
    }
}

/// Single-request operations against a vROps target
///
/// Implementations issue exactly one backend request per call and must not
/// chunk; [`BulkQuery`] is responsible for respecting the id limit.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn acquire_token(&self, target: &str, credentials: &Credentials) -> FetchOutcome<Token>;

    async fn list_adapters(
        &self,
        target: &str,
        token: &Token,
    ) -> FetchOutcome<Vec<AdapterDescriptor>>;

    /// Children of `parent_id` (or all resources of `kind` when `None`)
    async fn list_resources(
        &self,
        target: &str,
        token: &Token,
        kind: ResourceKind,
        parent_id: Option<&str>,
    ) -> FetchOutcome<Vec<ResourceRef>>;

    async fn latest_stats(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        stat_key: &str,
    ) -> FetchOutcome<Vec<StatValue>>;

    async fn latest_properties(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        property_key: &str,
    ) -> FetchOutcome<Vec<PropertyValue>>;

    async fn ancestor_relationships(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        query: &AncestorQuery,
    ) -> FetchOutcome<Vec<AncestorLink>>;
}

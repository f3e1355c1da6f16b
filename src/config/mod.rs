use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::utils::MAX_IDS_PER_REQUEST;

// suite-api endpoints, relative to https://<target>
pub const API_ROOT: &str = "/suite-api/api";
pub const TOKEN_PATH: &str = "/auth/token/acquire";
pub const ADAPTERS_PATH: &str = "/adapters";
pub const RESOURCES_PATH: &str = "/resources";
pub const STATS_QUERY_PATH: &str = "/resources/stats/latest/query";
pub const PROPERTIES_QUERY_PATH: &str = "/resources/properties/latest/query";
pub const RELATIONSHIPS_PATH: &str = "/resources/bulk/relationships";

// Service-discovery job whose entries are vROps targets
pub const VROPS_JOB: &str = "vrops";

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 180;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_CLUSTER_WORKERS: usize = 16;
pub const DEFAULT_MAX_CHUNK_WORKERS: usize = 8;

/// Login used for token acquisition on every target
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(anyhow!("user and password must not be blank"));
        }
        Ok(Credentials { username, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tuning for the inventory synchronizer and the backend client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncSettings {
    /// Pause between the end of one cycle and the start of the next
    pub sync_interval: Duration,
    /// Ids per bulk request, never above the backend limit
    pub chunk_size: usize,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Clusters populated concurrently per datacenter
    pub max_cluster_workers: usize,
    /// Chunks in flight per bulk query
    pub max_chunk_workers: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            chunk_size: MAX_IDS_PER_REQUEST,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_cluster_workers: DEFAULT_MAX_CLUSTER_WORKERS,
            max_chunk_workers: DEFAULT_MAX_CHUNK_WORKERS,
        }
    }
}

impl SyncSettings {
    /// Reject settings the engine cannot run with; clamp the chunk size to the backend limit
    pub fn validated(mut self) -> Result<Self> {
        if self.sync_interval.is_zero() {
            return Err(anyhow!("sync interval must be > 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("request timeout must be > 0"));
        }
        if self.max_cluster_workers == 0 || self.max_chunk_workers == 0 {
            return Err(anyhow!(
                "worker limits must be > 0, got clusters={} chunks={}",
                self.max_cluster_workers,
                self.max_chunk_workers
            ));
        }
        self.chunk_size = self.chunk_size.clamp(1, MAX_IDS_PER_REQUEST);
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryEntry {
    #[serde(default)]
    labels: DiscoveryLabels,
}

#[derive(Debug, Default, Deserialize)]
struct DiscoveryLabels {
    #[serde(default)]
    job: Option<String>,
    #[serde(default)]
    server_name: Option<String>,
}

/// Extract vROps targets from a service-discovery document
///
/// The document is a JSON array of `{"labels": {"job": ..., "server_name": ...}}`
/// entries; only `job == "vrops"` entries count. Duplicates are dropped while
/// keeping first-seen order.
pub fn parse_targets(document: &str) -> Result<Vec<String>> {
    let entries: Vec<DiscoveryEntry> =
        serde_json::from_str(document).context("inventory file is not a JSON array of targets")?;

    let mut targets: Vec<String> = Vec::new();
    for entry in entries {
        if entry.labels.job.as_deref() != Some(VROPS_JOB) {
            continue;
        }
        if let Some(server) = entry.labels.server_name {
            let server = server.trim().to_string();
            if !server.is_empty() && !targets.contains(&server) {
                targets.push(server);
            }
        }
    }
    Ok(targets)
}

/// Read and parse the service-discovery file
pub fn load_targets(path: &Path) -> Result<Vec<String>> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read inventory file {}", path.display()))?;
    parse_targets(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_reject_blank() {
        assert!(Credentials::new(" ", "pw").is_err());
        assert!(Credentials::new("user", "").is_err());
        assert!(Credentials::new("user", "testpw31!").is_ok());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("testuser", "testpw31!").unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("testuser"));
        assert!(!debug.contains("testpw31!"));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = SyncSettings::default().validated().unwrap();
        assert_eq!(settings.sync_interval, Duration::from_secs(180));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.chunk_size, 1000);
    }

    #[test]
    fn test_settings_clamp_chunk_size() {
        let settings = SyncSettings {
            chunk_size: 5000,
            ..Default::default()
        };
        assert_eq!(settings.validated().unwrap().chunk_size, 1000);

        let settings = SyncSettings {
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(settings.validated().unwrap().chunk_size, 1);
    }

    #[test]
    fn test_settings_reject_zero_values() {
        let zero_interval = SyncSettings {
            sync_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_interval.validated().is_err());

        let zero_workers = SyncSettings {
            max_cluster_workers: 0,
            ..Default::default()
        };
        assert!(zero_workers.validated().is_err());
    }

    #[test]
    fn test_parse_targets_filters_job() {
        let document = r#"[
            {"targets": ["a:443"], "labels": {"job": "vrops", "server_name": "vrops-a.example.com"}},
            {"targets": ["b:443"], "labels": {"job": "vcenter", "server_name": "vc-b.example.com"}},
            {"targets": ["c:443"], "labels": {"job": "vrops", "server_name": "vrops-c.example.com"}},
            {"targets": ["a:443"], "labels": {"job": "vrops", "server_name": "vrops-a.example.com"}},
            {"targets": ["d:443"], "labels": {"job": "vrops"}}
        ]"#;
        let targets = parse_targets(document).unwrap();
        assert_eq!(targets, vec!["vrops-a.example.com", "vrops-c.example.com"]);
    }

    #[test]
    fn test_parse_targets_rejects_non_array() {
        assert!(parse_targets(r#"{"labels": {}}"#).is_err());
    }

    #[test]
    fn test_load_targets_missing_file() {
        let err = load_targets(Path::new("/nonexistent/vrops-inventory.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read inventory file"));
    }
}

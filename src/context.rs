//! Application context and dependency injection
//!
//! All long-lived services are created once during startup and shared through
//! this context by the HTTP layer and the background synchronizer.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::collectors::CollectorRegistry;
use crate::config::{Credentials, SyncSettings};
use crate::inventory::{InventoryStore, InventorySynchronizer};
use crate::vrops::{Backend, BulkQuery, VropsClient, VropsClientConfig};

/// Application context holding all singleton instances
#[derive(Clone)]
pub struct AppContext {
    /// Published inventory generations, read by the HTTP layer and collectors
    store: Arc<InventoryStore>,

    /// Periodic inventory rebuild
    synchronizer: Arc<InventorySynchronizer>,

    /// Chunked bulk queries for collectors, sharing the synchronizer's backend
    bulk: BulkQuery,

    /// Collectors and metric names announced over HTTP
    registry: CollectorRegistry,
}

impl AppContext {
    /// Create the context backed by the suite-api HTTP client
    pub fn new(targets: Vec<String>, credentials: Credentials, settings: SyncSettings) -> Result<Self> {
        let settings = settings.validated()?;
        let client = VropsClient::new(
            VropsClientConfig::default().with_timeout(settings.request_timeout),
        )?;
        Self::with_backend(Arc::new(client), targets, credentials, settings)
    }

    /// Create the context on top of any backend implementation
    pub fn with_backend(
        backend: Arc<dyn Backend>,
        targets: Vec<String>,
        credentials: Credentials,
        settings: SyncSettings,
    ) -> Result<Self> {
        tracing::info!(targets = targets.len(), "Initializing application context");

        if targets.is_empty() {
            return Err(anyhow!("no vrops targets configured"));
        }
        let settings = settings.validated()?;

        let store = Arc::new(InventoryStore::new(targets));
        let synchronizer = Arc::new(InventorySynchronizer::new(
            backend.clone(),
            store.clone(),
            credentials,
            &settings,
        ));
        let bulk = BulkQuery::from_settings(backend, &settings);
        tracing::info!("Inventory store and synchronizer initialized");

        Ok(AppContext {
            store,
            synchronizer,
            bulk,
            registry: CollectorRegistry::new(),
        })
    }

    /// Spawn the synchronizer loop; it runs until `shutdown` turns true
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let synchronizer = self.synchronizer.clone();
        tokio::spawn(async move {
            if let Err(e) = synchronizer.start(shutdown).await {
                tracing::error!(error = %e, "Inventory synchronizer error");
            }
        })
    }

    /// Get reference to the inventory store
    pub fn store(&self) -> &Arc<InventoryStore> {
        &self.store
    }

    /// Get the bulk query helper for collectors
    pub fn bulk_query(&self) -> &BulkQuery {
        &self.bulk
    }

    /// Get the collector registry
    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }
}

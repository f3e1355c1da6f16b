//! Inventory synchronizer - rebuilds and publishes the topology periodically
//!
//! Responsibilities:
//! - Acquire a token per target at the start of every cycle
//! - Build each target's topology and flatten it into a per-target fragment
//! - Keep the previous fragment of a target that failed this cycle
//! - Publish all fragments as one generation (single atomic swap)
//! - Sleep the sync interval, until shutdown is signalled

use anyhow::Result;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::fetcher::TopologyFetcher;
use super::snapshot::Inventory;
use super::store::{Generation, InventoryStore};
use crate::config::{Credentials, SyncSettings};
use crate::vrops::{Backend, FetchError, FetchOutcome, Token};

/// Why a target contributed nothing new this cycle
#[derive(Debug, thiserror::Error)]
enum TargetError {
    #[error("token acquisition failed: {0}")]
    Token(FetchError),
    #[error("token response was empty")]
    NoToken,
    #[error("adapter listing failed: {0}")]
    Adapters(FetchError),
    #[error("topology build panicked")]
    Panicked,
}

/// Last successful result of one target
#[derive(Debug, Clone)]
struct TargetFragment {
    token: Token,
    inventory: Inventory,
}

/// Outcome of one synchronization cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Iteration number of the generation published by this cycle
    pub iteration: u64,
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
    pub entities: usize,
    pub duration: Duration,
}

pub struct InventorySynchronizer {
    backend: Arc<dyn Backend>,
    fetcher: TopologyFetcher,
    store: Arc<InventoryStore>,
    credentials: Credentials,
    sync_interval: Duration,
    fragments: Mutex<HashMap<String, TargetFragment>>,
}

impl InventorySynchronizer {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<InventoryStore>,
        credentials: Credentials,
        settings: &SyncSettings,
    ) -> Self {
        InventorySynchronizer {
            fetcher: TopologyFetcher::new(backend.clone(), settings.max_cluster_workers),
            backend,
            store,
            credentials,
            sync_interval: settings.sync_interval,
            fragments: Mutex::new(HashMap::new()),
        }
    }

    /// Run cycles until `shutdown` turns true (or its sender goes away)
    ///
    /// Target failures never end the loop; they are retried next cycle.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            interval_secs = self.sync_interval.as_secs(),
            targets = self.store.targets().len(),
            "Starting inventory synchronizer"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.sync_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Inventory synchronizer stopped");
        Ok(())
    }

    /// One full cycle: tokens, tree builds, flatten, publish
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_start = Instant::now();
        let targets = self.store.targets().to_vec();
        info!(
            iteration = self.store.iteration(),
            targets = targets.len(),
            "Starting inventory cycle"
        );

        // targets are independent; a panic inside one only fails that target
        let results = join_all(targets.iter().map(|target| async move {
            let result = AssertUnwindSafe(self.sync_target(target))
                .catch_unwind()
                .await
                .unwrap_or(Err(TargetError::Panicked));
            (target.clone(), result)
        }))
        .await;

        let mut fragments = self.fragments.lock().await;
        let mut refreshed = Vec::new();
        let mut failed = Vec::new();
        for (target, result) in results {
            match result {
                Ok(fragment) => {
                    debug!(
                        target = %target,
                        entities = fragment.inventory.entity_count(),
                        "Target refreshed"
                    );
                    fragments.insert(target.clone(), fragment);
                    refreshed.push(target);
                }
                Err(e) => {
                    warn!(
                        target = %target,
                        error = %e,
                        keeps_previous = fragments.contains_key(&target),
                        "Skipping target this cycle, retrying next iteration"
                    );
                    failed.push(target);
                }
            }
        }

        let mut generation = Generation::default();
        for target in &targets {
            if let Some(fragment) = fragments.get(target) {
                generation.inventory.absorb(&fragment.inventory);
                generation
                    .tokens
                    .insert(target.clone(), fragment.token.clone());
            }
        }
        drop(fragments);

        let entities = generation.inventory.entity_count();
        let swap_start = Instant::now();
        let iteration = self.store.publish(generation);
        let swap_duration_us = swap_start.elapsed().as_micros();

        let report = CycleReport {
            iteration,
            refreshed,
            failed,
            entities,
            duration: cycle_start.elapsed(),
        };
        info!(
            iteration = report.iteration,
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            entities = report.entities,
            duration_ms = report.duration.as_millis(),
            swap_duration_us = swap_duration_us,
            "Inventory cycle completed"
        );
        report
    }

    async fn sync_target(&self, target: &str) -> Result<TargetFragment, TargetError> {
        debug!(target = %target, "Querying target");
        let token = match self.backend.acquire_token(target, &self.credentials).await {
            FetchOutcome::Data(token) => token,
            FetchOutcome::Empty => return Err(TargetError::NoToken),
            FetchOutcome::Failed(e) => return Err(TargetError::Token(e)),
        };

        let forest = self
            .fetcher
            .build_target(target, &token)
            .await
            .map_err(TargetError::Adapters)?;

        Ok(TargetFragment {
            token,
            inventory: Inventory::flatten(&forest),
        })
    }
}

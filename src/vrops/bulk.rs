//! Chunked bulk queries
//!
//! The suite-api accepts at most 1000 resource ids per bulk request. A
//! [`BulkQuery`] splits the id list, runs one task per chunk (at most
//! `max_in_flight` at a time), waits for all of them and merges their entries.
//! Entries are merged in completion order, so callers must not rely on any
//! ordering across chunks. A failed chunk contributes nothing and never
//! cancels its siblings.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{AncestorQuery, Backend, FetchOutcome, PropertyValue, StatValue, Token};
use crate::config::SyncSettings;
use crate::utils::chunk_list;

#[derive(Clone)]
pub struct BulkQuery {
    backend: Arc<dyn Backend>,
    chunk_size: usize,
    max_in_flight: usize,
}

impl BulkQuery {
    pub fn new(backend: Arc<dyn Backend>, chunk_size: usize, max_in_flight: usize) -> Self {
        BulkQuery {
            backend,
            chunk_size: chunk_size.max(1),
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn from_settings(backend: Arc<dyn Backend>, settings: &SyncSettings) -> Self {
        Self::new(backend, settings.chunk_size, settings.max_chunk_workers)
    }

    /// Latest value of `stat_key` for every resource in `uuids`
    pub async fn latest_stat(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        stat_key: &str,
    ) -> Vec<StatValue> {
        let backend = self.backend.clone();
        let (target_owned, token, key) = (target.to_string(), token.clone(), stat_key.to_string());
        self.fan_out(target, stat_key, uuids, move |chunk| {
            let backend = backend.clone();
            let (target, token, key) = (target_owned.clone(), token.clone(), key.clone());
            async move { backend.latest_stats(&target, &token, &chunk, &key).await }
        })
        .await
    }

    /// Latest value of `property_key` for every resource in `uuids`
    pub async fn latest_property(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        property_key: &str,
    ) -> Vec<PropertyValue> {
        let backend = self.backend.clone();
        let (target_owned, token, key) =
            (target.to_string(), token.clone(), property_key.to_string());
        self.fan_out(target, property_key, uuids, move |chunk| {
            let backend = backend.clone();
            let (target, token, key) = (target_owned.clone(), token.clone(), key.clone());
            async move { backend.latest_properties(&target, &token, &chunk, &key).await }
        })
        .await
    }

    /// Map each resource in `uuids` to the label of its matching ancestor
    pub async fn ancestor_relationship(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        query: &AncestorQuery,
    ) -> HashMap<String, String> {
        let backend = self.backend.clone();
        let (target_owned, token, query) = (target.to_string(), token.clone(), query.clone());
        let links = self
            .fan_out(target, "relationships", uuids, move |chunk| {
                let backend = backend.clone();
                let (target, token, query) = (target_owned.clone(), token.clone(), query.clone());
                async move {
                    backend
                        .ancestor_relationships(&target, &token, &chunk, &query)
                        .await
                }
            })
            .await;

        links
            .into_iter()
            .map(|link| (link.resource_id, link.ancestor_label))
            .collect()
    }

    async fn fan_out<T, F, Fut>(&self, target: &str, what: &str, uuids: &[String], call: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(Vec<String>) -> Fut,
        Fut: Future<Output = FetchOutcome<Vec<T>>> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut workers = JoinSet::new();

        for (index, chunk) in chunk_list(uuids, self.chunk_size).enumerate() {
            debug!(target = %target, what = %what, chunk = index, size = chunk.len(), "Dispatching chunk");
            let request = call(chunk.to_vec());
            let permits = permits.clone();
            workers.spawn(async move {
                // the semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                (index, request.await)
            });
        }

        let mut merged = Vec::new();
        let mut failed_chunks = 0usize;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, FetchOutcome::Data(entries))) => merged.extend(entries),
                Ok((index, FetchOutcome::Empty)) => {
                    debug!(target = %target, what = %what, chunk = index, "Chunk returned no entries");
                }
                Ok((index, FetchOutcome::Failed(e))) => {
                    failed_chunks += 1;
                    warn!(target = %target, what = %what, chunk = index, error = %e, "Chunk failed, skipping its entries");
                }
                Err(e) => {
                    failed_chunks += 1;
                    warn!(target = %target, what = %what, error = %e, "Chunk worker aborted");
                }
            }
        }

        debug!(
            target = %target,
            what = %what,
            requested = uuids.len(),
            returned = merged.len(),
            failed_chunks = failed_chunks,
            "Bulk query merged"
        );
        merged
    }
}

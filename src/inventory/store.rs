//! Published inventory generations
//!
//! The synchronizer builds each generation off to the side and publishes it
//! with a single pointer swap:
//! - readers call [`InventoryStore::snapshot`] and keep the `Arc` they got for as
//!   long as they need a consistent view; no lock is taken on the read path
//! - a publish never mutates a generation that readers may hold
//! - the iteration counter is bumped after the swap, so a reader that sees
//!   iteration `n` always finds generation `n` (or newer) in the store

use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use super::snapshot::Inventory;
use crate::vrops::Token;

/// One complete, internally consistent result of a sync cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Generation {
    pub inventory: Inventory,
    /// Current token per target, for collectors issuing their own queries
    pub tokens: HashMap<String, Token>,
}

pub struct InventoryStore {
    targets: Vec<String>,
    current: ArcSwap<Generation>,
    iteration: AtomicU64,
    published: watch::Sender<u64>,
}

impl InventoryStore {
    /// Create an empty store for the configured targets (iteration 0)
    pub fn new(targets: Vec<String>) -> Self {
        let (published, _) = watch::channel(0);
        InventoryStore {
            targets,
            current: ArcSwap::from_pointee(Generation::default()),
            iteration: AtomicU64::new(0),
            published,
        }
    }

    /// Targets this store is fed from
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// The generation current at the time of the call
    pub fn snapshot(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    /// Number of generations published so far
    pub fn iteration(&self) -> u64 {
        self.iteration.load(Ordering::Acquire)
    }

    pub fn target_tokens(&self) -> HashMap<String, Token> {
        self.current.load().tokens.clone()
    }

    pub fn token_for(&self, target: &str) -> Option<Token> {
        self.current.load().tokens.get(target).cloned()
    }

    /// Receiver that observes the iteration number of every publish
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.published.subscribe()
    }

    /// Resolve once the first generation has been published
    pub async fn wait_for_inventory(&self) {
        let mut receiver = self.subscribe();
        let _ = receiver.wait_for(|iteration| *iteration > 0).await;
    }

    /// Replace the current generation and return the new iteration number
    pub(crate) fn publish(&self, generation: Generation) -> u64 {
        self.current.store(Arc::new(generation));
        let iteration = self.iteration.fetch_add(1, Ordering::AcqRel) + 1;
        self.published.send_replace(iteration);
        debug!(iteration = iteration, "Inventory generation published");
        iteration
    }
}

//! In-flight builds and backend reconciliation.

use std::collections::HashMap;

use maestrod_core::{BuildKey, BuildRequest, Driver, RunningBuild};
use tracing::{debug, warn};

/// Builds currently executing on the backend, keyed by `(project, branch)`.
///
/// Owned exclusively by the scheduler; mutated only by [`watch`] (removal)
/// and successful admission via [`insert`].
///
/// [`watch`]: RunningSet::watch
/// [`insert`]: RunningSet::insert
#[derive(Debug, Default)]
pub struct RunningSet {
    builds: HashMap<BuildKey, RunningBuild>,
}

impl RunningSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile membership against the backend's live state.
    ///
    /// Every build whose worker the backend no longer reports is removed.
    /// A failed status check keeps the entry in place for the next cycle:
    /// removal is irreversible for admission purposes, so a transient error
    /// must not cause it.
    pub async fn watch(&mut self, driver: &dyn Driver) {
        let mut finished = Vec::new();
        for (key, build) in &self.builds {
            match driver.worker_exists(&build.worker_name()).await {
                Ok(true) => {}
                Ok(false) => finished.push(key.clone()),
                Err(err) => {
                    warn!(build = %key, error = %err, "could not check worker status");
                }
            }
        }
        for key in finished {
            debug!(build = %key, "worker finished");
            self.builds.remove(&key);
        }
    }

    /// Track an admitted build.
    ///
    /// The queue's per-key admission rule guarantees the key is free.
    pub fn insert(&mut self, req: &BuildRequest) {
        let prev = self.builds.insert(req.key(), RunningBuild::from(req));
        debug_assert!(prev.is_none(), "admitted {} while already running", req.key());
    }

    pub fn contains(&self, key: &BuildKey) -> bool {
        self.builds.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    /// In-flight builds, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &RunningBuild> {
        self.builds.values()
    }
}

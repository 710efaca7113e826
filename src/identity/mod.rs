// src/identity/mod.rs
pub mod cache;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use metrics::counter;

use crate::error::{CacheError, ResolutionError};
use crate::identity::cache::{IdentityMap, IdentityStore};
use crate::retry::{retry_transient, RetryPolicy};
use crate::timeline::types::{TimelineApi, UserId, LOOKUP_BATCH_SIZE};

/// Canonical handle form: trimmed, no leading `@`, lower-case.
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

/// Resolves handles to identifiers, consulting the cache before the network.
pub struct IdentityResolver {
    api: Arc<dyn TimelineApi>,
    cache: IdentityMap,
    dirty: bool,
    retry: RetryPolicy,
    batch_size: usize,
}

impl IdentityResolver {
    pub fn new(api: Arc<dyn TimelineApi>, cache: IdentityMap) -> Self {
        Self {
            api,
            cache,
            dirty: false,
            retry: RetryPolicy::default(),
            batch_size: LOOKUP_BATCH_SIZE,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Batch sizes below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn cache(&self) -> &IdentityMap {
        &self.cache
    }

    /// True when lookups added entries that are not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Resolve every handle in `handles`. Cached handles cost no request;
    /// the rest are looked up in bounded batches, each applied all-or-nothing.
    pub async fn resolve(
        &mut self,
        handles: &BTreeSet<String>,
    ) -> Result<IdentityMap, ResolutionError> {
        let wanted: BTreeSet<String> = handles.iter().map(|h| normalize_handle(h)).collect();
        let missing: Vec<String> = wanted
            .iter()
            .filter(|h| !self.cache.contains_key(*h))
            .cloned()
            .collect();

        tracing::info!(
            target: "identity",
            requested = wanted.len(),
            cached = wanted.len() - missing.len(),
            missing = missing.len(),
            "resolving handles"
        );

        for batch in missing.chunks(self.batch_size) {
            let found = self.lookup_batch(batch).await?;
            self.cache.extend(found);
            self.dirty = true;
        }

        Ok(wanted
            .into_iter()
            .filter_map(|h| self.cache.get(&h).cloned().map(|id| (h, id)))
            .collect())
    }

    async fn lookup_batch(&self, batch: &[String]) -> Result<Vec<(String, UserId)>, ResolutionError> {
        let api = &self.api;
        counter!("identity_lookups_total").increment(1);
        let users = retry_transient(self.retry, "lookup_users", || api.lookup_users(batch))
            .await
            .map_err(|source| ResolutionError::Lookup {
                handles: batch.to_vec(),
                source,
            })?;

        let by_name: HashMap<String, UserId> = users
            .into_iter()
            .map(|u| (normalize_handle(&u.username), u.id))
            .collect();

        let unresolved: Vec<String> = batch
            .iter()
            .filter(|h| !by_name.contains_key(*h))
            .cloned()
            .collect();
        if !unresolved.is_empty() {
            return Err(ResolutionError::Unresolved(unresolved));
        }

        Ok(batch
            .iter()
            .filter_map(|h| by_name.get(h).map(|id| (h.clone(), id.clone())))
            .collect())
    }

    /// Write the cache through `store` if lookups changed it.
    pub fn persist(&mut self, store: &dyn IdentityStore) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }
        store.persist(&self.cache)?;
        self.dirty = false;
        tracing::debug!(target: "identity", entries = self.cache.len(), "identity cache persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_normalized() {
        assert_eq!(normalize_handle(" @Alice "), "alice");
        assert_eq!(normalize_handle("bob"), "bob");
    }
}

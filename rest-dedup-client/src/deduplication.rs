use crate::endpoint::EndpointKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// One outstanding network operation, keyed in the table by its
/// fingerprint.
#[derive(Debug)]
pub struct InFlightRequest {
    endpoint: EndpointKey,
    resolved: AtomicBool,
}

impl InFlightRequest {
    fn new(endpoint: EndpointKey) -> Self {
        Self {
            endpoint,
            resolved: AtomicBool::new(false),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }
}

/// Table of in-flight requests. At most one unresolved entry exists per
/// fingerprint; resolved entries linger until the next completion or claim
/// sweeps them out.
pub struct InFlightTable {
    requests: DashMap<String, InFlightRequest>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }

    /// Claim a fingerprint for a new network operation. Returns `false`
    /// when an identical request is still unresolved; a resolved leftover
    /// entry is evicted and the claim succeeds.
    pub fn try_claim(&self, fingerprint: &str, endpoint: EndpointKey) -> bool {
        match self.requests.entry(fingerprint.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_resolved() {
                    entry.insert(InFlightRequest::new(endpoint));
                    true
                } else {
                    log::debug!("duplicate in-flight request suppressed: {}", fingerprint);
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(InFlightRequest::new(endpoint));
                true
            }
        }
    }

    /// Endpoint key the fingerprint was claimed for, used for callback
    /// fan-out on completion.
    pub fn endpoint_of(&self, fingerprint: &str) -> Option<EndpointKey> {
        self.requests
            .get(fingerprint)
            .map(|entry| entry.endpoint.clone())
    }

    pub fn resolve(&self, fingerprint: &str) {
        if let Some(entry) = self.requests.get(fingerprint) {
            entry.resolved.store(true, Ordering::Release);
        }
    }

    /// Sweep every resolved entry. Called opportunistically on each
    /// completion so the table stays bounded without a background task.
    pub fn purge(&self) {
        let before = self.requests.len();
        self.requests.retain(|_, request| !request.is_resolved());
        let purged = before.saturating_sub(self.requests.len());
        if purged > 0 {
            log::debug!("purged {} resolved in-flight entries", purged);
        }
    }

    pub fn stats(&self) -> InFlightStats {
        let total_entries = self.requests.len();
        let resolved_entries = self
            .requests
            .iter()
            .filter(|entry| entry.is_resolved())
            .count();

        InFlightStats {
            total_entries,
            pending_entries: total_entries.saturating_sub(resolved_entries),
            resolved_entries,
        }
    }
}

impl Default for InFlightTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the in-flight table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlightStats {
    pub total_entries: usize,
    pub pending_entries: usize,
    pub resolved_entries: usize,
}

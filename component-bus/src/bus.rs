use crate::component::Component;
use crate::error::CapabilityError;
use crate::tree::ComponentTree;
use crate::visibility::VisibilitySource;
use dashmap::DashMap;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A multicast invocation: call `target` on every component matched by
/// `selector`, optionally scoped to a subtree root.
#[derive(Clone, Debug, Getters)]
#[get = "pub"]
pub struct Multicall {
    target: String,
    selector: String,
    root: Option<String>,
    params: Vec<Value>,
}

impl Multicall {
    pub fn new(target: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            selector: selector.into(),
            root: None,
            params: Vec::new(),
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }
}

/// Per-element result of a multicast fan-out.
pub struct CallOutcome {
    pub source: Arc<dyn Component>,
    pub outcome: Result<Value, CapabilityError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    selector: String,
    capability: String,
}

struct HydrationEntry {
    component: Arc<dyn Component>,
    activated: bool,
}

struct BusInner {
    tree: Arc<dyn ComponentTree>,
    visibility: Arc<dyn VisibilitySource>,
    hydration: DashMap<String, HydrationEntry>,
    query_cache: DashMap<QueryKey, Vec<Arc<dyn Component>>>,
}

/// Hydration and multicast bus. Cheaply cloneable handle; the hydration
/// registry and query cache are owned by the shared inner state and mutated
/// only through the bus operations.
#[derive(Clone)]
pub struct ComponentBus {
    inner: Arc<BusInner>,
}

/// Snapshot of the bus registries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub tracked_components: usize,
    pub pending_components: usize,
    pub activated_components: usize,
    pub cached_queries: usize,
}

impl ComponentBus {
    pub fn new(tree: Arc<dyn ComponentTree>, visibility: Arc<dyn VisibilitySource>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                tree,
                visibility,
                hydration: DashMap::new(),
                query_cache: DashMap::new(),
            }),
        }
    }

    /// Scan the tree for lazily-hydratable components, register them as
    /// pending and begin visibility monitoring. Components without an id
    /// are skipped with a diagnostic; they can never be hydrated. Returns
    /// the handle of the spawned visibility event pump.
    pub fn init_hydration_lifecycle(&self) -> JoinHandle<()> {
        for component in self.inner.tree.lazy_components() {
            match component.id() {
                Some(id) => {
                    self.inner.hydration.insert(
                        id.to_string(),
                        HydrationEntry {
                            component: component.clone(),
                            activated: false,
                        },
                    );
                    self.inner.visibility.observe(id);
                    log::debug!("tracking component {} for deferred activation", id);
                }
                None => {
                    log::warn!(
                        "component marked for lazy hydration has no id and cannot be activated"
                    );
                }
            }
        }
        log::info!(
            "hydration lifecycle initialized, {} components pending",
            self.inner.hydration.len()
        );

        let inner = self.inner.clone();
        let mut events = inner.visibility.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                inner.activate_if_pending(&event.component_id).await;
            }
        })
    }

    /// Invoke a capability on every matching component, activating pending
    /// ones first. Components that do not expose the capability are
    /// silently excluded; a failing invocation is captured per element and
    /// never aborts the batch. Whole-tree queries are cached per
    /// (selector, capability) until invalidated.
    pub async fn multicall(&self, call: &Multicall) -> Vec<CallOutcome> {
        let whole_tree = call.root().is_none();
        let key = QueryKey {
            selector: call.selector().clone(),
            capability: call.target().clone(),
        };

        let mut from_cache = false;
        let candidates = if whole_tree {
            match self.inner.query_cache.get(&key) {
                Some(hit) => {
                    from_cache = true;
                    log::debug!("query cache hit for {}/{}", key.selector, key.capability);
                    hit.value().clone()
                }
                None => self.inner.tree.select(call.selector(), None),
            }
        } else {
            self.inner.tree.select(call.selector(), call.root().as_deref())
        };

        let mut outcomes = Vec::new();
        let mut matched = Vec::new();
        for component in candidates {
            if !component.has_capability(call.target()) {
                continue;
            }
            if whole_tree && !from_cache {
                matched.push(component.clone());
            }

            // Guarantee the capability never observes an unhydrated
            // component.
            if let Some(id) = component.id() {
                self.inner.activate_if_pending(id).await;
            }

            let outcome = component.invoke(call.target(), call.params()).await;
            if let Err(err) = &outcome {
                log::error!(
                    "multicall {} failed on component {}: {}",
                    call.target(),
                    component.id().unwrap_or("unknown"),
                    err
                );
            }
            outcomes.push(CallOutcome {
                source: component,
                outcome,
            });
        }

        // Cache lazily, only once a component exposing the capability was
        // found: an empty result stays uncached so components added later
        // become visible without explicit invalidation.
        if whole_tree && !from_cache && !matched.is_empty() {
            self.inner.query_cache.insert(key, matched);
        }
        outcomes
    }

    /// Drop cached query membership for a capability. Callers that mutate
    /// the tree must invalidate before the next whole-tree multicall with
    /// the same capability or act on stale membership.
    pub fn clear_cache_for(&self, capability_name: &str) {
        let before = self.inner.query_cache.len();
        self.inner
            .query_cache
            .retain(|key, _| key.capability != capability_name);
        let cleared = before.saturating_sub(self.inner.query_cache.len());
        if cleared > 0 {
            log::debug!(
                "cleared {} cached queries for capability {}",
                cleared,
                capability_name
            );
        }
    }

    pub fn stats(&self) -> BusStats {
        let tracked_components = self.inner.hydration.len();
        let activated_components = self
            .inner
            .hydration
            .iter()
            .filter(|entry| entry.activated)
            .count();

        BusStats {
            tracked_components,
            pending_components: tracked_components.saturating_sub(activated_components),
            activated_components,
            cached_queries: self.inner.query_cache.len(),
        }
    }
}

impl BusInner {
    /// Claim a pending component for activation. The entry lock makes the
    /// check-and-set atomic, so concurrent visibility and multicast
    /// triggers activate at most once.
    fn claim(&self, id: &str) -> Option<Arc<dyn Component>> {
        let mut entry = self.hydration.get_mut(id)?;
        if entry.activated {
            return None;
        }
        entry.activated = true;
        Some(entry.component.clone())
    }

    async fn activate_if_pending(&self, id: &str) {
        if let Some(component) = self.claim(id) {
            self.visibility.unobserve(id);
            log::debug!("activating component {}", id);
            component.activate().await;
        }
    }
}

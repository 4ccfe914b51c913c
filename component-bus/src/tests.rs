use crate::{
    CapabilityError, Component, ComponentBus, ComponentTree, IntersectionFeed, Multicall,
    PollingWatcher, StaticTree,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct TestComponent {
    id: Option<String>,
    lazy: bool,
    capabilities: Vec<String>,
    failing: bool,
    activations: AtomicUsize,
    journal: Arc<Mutex<Vec<String>>>,
}

impl TestComponent {
    fn new(id: &str, capabilities: &[&str]) -> Self {
        Self {
            id: Some(id.to_string()),
            lazy: false,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            failing: false,
            activations: AtomicUsize::new(0),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lazy_loaded(mut self) -> Self {
        self.lazy = true;
        self
    }

    fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    fn with_journal(mut self, journal: Arc<Mutex<Vec<String>>>) -> Self {
        self.journal = journal;
        self
    }

    fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }
}

#[async_trait]
impl Component for TestComponent {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn lazy(&self) -> bool {
        self.lazy
    }

    fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c == name)
    }

    async fn invoke(&self, capability: &str, params: &[Value]) -> Result<Value, CapabilityError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("invoke:{}:{}", self.name(), capability));
        if self.failing {
            return Err(CapabilityError::new("capability blew up"));
        }
        Ok(json!({ "id": self.name(), "params": params }))
    }

    async fn activate(&self) {
        self.activations.fetch_add(1, Ordering::SeqCst);
        self.journal
            .lock()
            .unwrap()
            .push(format!("activate:{}", self.name()));
    }
}

struct CountingTree {
    inner: StaticTree,
    selects: AtomicUsize,
}

impl CountingTree {
    fn new() -> Self {
        Self {
            inner: StaticTree::new(),
            selects: AtomicUsize::new(0),
        }
    }

    fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }
}

impl ComponentTree for CountingTree {
    fn lazy_components(&self) -> Vec<Arc<dyn Component>> {
        self.inner.lazy_components()
    }

    fn select(&self, selector: &str, root: Option<&str>) -> Vec<Arc<dyn Component>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.inner.select(selector, root)
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within timeout");
}

#[tokio::test]
async fn test_visibility_activation_at_most_once() {
    init_logging();
    let tree = Arc::new(StaticTree::new());
    let component = Arc::new(TestComponent::new("a", &["ping"]).lazy_loaded());
    tree.insert(component.clone(), &["#a"]);

    let feed = Arc::new(IntersectionFeed::new());
    let bus = ComponentBus::new(tree, feed.clone());
    let _pump = bus.init_hydration_lifecycle();

    feed.entered("a");
    feed.entered("a");
    feed.entered("a");

    wait_until(|| component.activations() >= 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(component.activations(), 1);

    let stats = bus.stats();
    assert_eq!(stats.tracked_components, 1);
    assert_eq!(stats.activated_components, 1);
    assert_eq!(stats.pending_components, 0);
}

#[tokio::test]
async fn test_multicast_activates_pending_component_first() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let tree = Arc::new(StaticTree::new());
    let component = Arc::new(
        TestComponent::new("a", &["ping"])
            .lazy_loaded()
            .with_journal(journal.clone()),
    );
    tree.insert(component.clone(), &["#a"]);

    let feed = Arc::new(IntersectionFeed::new());
    let bus = ComponentBus::new(tree, feed.clone());
    let _pump = bus.init_hydration_lifecycle();

    let outcomes = bus.multicall(&Multicall::new("ping", "#a")).await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].outcome.is_ok());
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["activate:a".to_string(), "invoke:a:ping".to_string()]
    );

    // The multicast pre-empted the pending hydration; a later visibility
    // event must not activate it again.
    feed.entered("a");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(component.activations(), 1);
}

#[tokio::test]
async fn test_multicall_isolates_failures() {
    let tree = Arc::new(StaticTree::new());
    let x = Arc::new(TestComponent::new("x", &["ping"]));
    let y = Arc::new(TestComponent::new("y", &["ping"]).failing());
    let z = Arc::new(TestComponent::new("z", &["ping"]));
    tree.insert(x, &[".set"]);
    tree.insert(y, &[".set"]);
    tree.insert(z, &[".set"]);

    let bus = ComponentBus::new(tree, Arc::new(IntersectionFeed::new()));
    let outcomes = bus
        .multicall(&Multicall::new("ping", ".set").with_params(vec![json!(1)]))
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].outcome.is_ok());
    assert!(outcomes[1].outcome.is_err());
    assert!(outcomes[2].outcome.is_ok());

    // Document order preserved.
    let ids: Vec<_> = outcomes
        .iter()
        .map(|o| o.source.id().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["x", "y", "z"]);
}

#[tokio::test]
async fn test_components_without_capability_silently_excluded() {
    let tree = Arc::new(StaticTree::new());
    let with_cap = Arc::new(TestComponent::new("a", &["ping"]));
    let without_cap = Arc::new(TestComponent::new("b", &[]));
    tree.insert(with_cap, &[".set"]);
    tree.insert(without_cap.clone(), &[".set"]);

    let bus = ComponentBus::new(tree, Arc::new(IntersectionFeed::new()));
    let outcomes = bus.multicall(&Multicall::new("ping", ".set")).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].source.id(), Some("a"));
    assert_eq!(without_cap.activations(), 0);
}

#[tokio::test]
async fn test_query_cache_reuse_and_invalidation() {
    let tree = Arc::new(CountingTree::new());
    tree.inner
        .insert(Arc::new(TestComponent::new("a", &["ping"])), &[".set"]);
    tree.inner
        .insert(Arc::new(TestComponent::new("b", &["ping"])), &[".set"]);

    let bus = ComponentBus::new(tree.clone(), Arc::new(IntersectionFeed::new()));
    let call = Multicall::new("ping", ".set");

    assert_eq!(bus.multicall(&call).await.len(), 2);
    assert_eq!(bus.multicall(&call).await.len(), 2);
    assert_eq!(tree.selects(), 1);

    // A component added after caching is invisible until invalidation.
    tree.inner
        .insert(Arc::new(TestComponent::new("c", &["ping"])), &[".set"]);
    assert_eq!(bus.multicall(&call).await.len(), 2);

    bus.clear_cache_for("ping");
    assert_eq!(bus.multicall(&call).await.len(), 3);
    assert_eq!(tree.selects(), 2);
}

#[tokio::test]
async fn test_empty_query_result_is_not_cached() {
    let tree = Arc::new(CountingTree::new());

    let bus = ComponentBus::new(tree.clone(), Arc::new(IntersectionFeed::new()));
    let call = Multicall::new("ping", ".late");

    // Nothing matches yet; the miss must not stick in the cache.
    assert!(bus.multicall(&call).await.is_empty());
    assert_eq!(bus.stats().cached_queries, 0);

    // A component added afterwards is found without invalidation.
    tree.inner
        .insert(Arc::new(TestComponent::new("a", &["ping"])), &[".late"]);
    let outcomes = bus.multicall(&call).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].source.id(), Some("a"));
    assert_eq!(tree.selects(), 2);

    // The non-empty result is cached as usual.
    assert_eq!(bus.stats().cached_queries, 1);
    assert_eq!(bus.multicall(&call).await.len(), 1);
    assert_eq!(tree.selects(), 2);
}

#[tokio::test]
async fn test_rooted_queries_bypass_cache() {
    let tree = Arc::new(CountingTree::new());
    tree.inner.insert_under(
        Arc::new(TestComponent::new("a", &["ping"])),
        &[".set"],
        &["panel"],
    );
    tree.inner
        .insert(Arc::new(TestComponent::new("b", &["ping"])), &[".set"]);

    let bus = ComponentBus::new(tree.clone(), Arc::new(IntersectionFeed::new()));
    let call = Multicall::new("ping", ".set").with_root("panel");

    let outcomes = bus.multicall(&call).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].source.id(), Some("a"));

    bus.multicall(&call).await;
    assert_eq!(tree.selects(), 2);
    assert_eq!(bus.stats().cached_queries, 0);
}

#[tokio::test]
async fn test_lazy_component_without_id_is_skipped() {
    let tree = Arc::new(StaticTree::new());
    let component = Arc::new(TestComponent::new("ignored", &["ping"]).lazy_loaded().without_id());
    tree.insert(component.clone(), &[".set"]);

    let feed = Arc::new(IntersectionFeed::new());
    let bus = ComponentBus::new(tree, feed);
    let _pump = bus.init_hydration_lifecycle();

    assert_eq!(bus.stats().tracked_components, 0);

    // Still reachable by multicast, but never hydration-tracked.
    let outcomes = bus.multicall(&Multicall::new("ping", ".set")).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(component.activations(), 0);
}

#[tokio::test]
async fn test_polling_watcher_drives_activation() {
    init_logging();
    let tree = Arc::new(StaticTree::new());
    let component = Arc::new(TestComponent::new("a", &["ping"]).lazy_loaded());
    tree.insert(component.clone(), &["#a"]);

    let visible = Arc::new(AtomicBool::new(false));
    let probe_flag = visible.clone();
    let watcher = Arc::new(PollingWatcher::with_interval(
        move |id| id == "a" && probe_flag.load(Ordering::SeqCst),
        Duration::from_millis(10),
    ));

    let bus = ComponentBus::new(tree, watcher);
    let _pump = bus.init_hydration_lifecycle();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(component.activations(), 0);

    visible.store(true, Ordering::SeqCst);
    wait_until(|| component.activations() >= 1).await;

    // Repeated polls after activation must not re-run the hook.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(component.activations(), 1);
}

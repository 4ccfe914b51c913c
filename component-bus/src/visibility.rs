use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// A tracked component entered the viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityEvent {
    pub component_id: String,
}

/// Source of viewport-entry signals. The bus treats intersection-style and
/// polling-style sources identically: both observe ids on request and emit
/// events on the subscribed stream.
pub trait VisibilitySource: Send + Sync {
    fn observe(&self, component_id: &str);

    fn unobserve(&self, component_id: &str);

    /// Event stream for the single consumer (the bus). A second subscribe
    /// returns a closed stream.
    fn subscribe(&self) -> UnboundedReceiver<VisibilityEvent>;
}

/// Push-style source: the embedder forwards platform intersection events
/// via [`IntersectionFeed::entered`]. Events for ids that are not under
/// observation are ignored.
pub struct IntersectionFeed {
    observed: DashMap<String, ()>,
    sender: UnboundedSender<VisibilityEvent>,
    receiver: Mutex<Option<UnboundedReceiver<VisibilityEvent>>>,
}

impl IntersectionFeed {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            observed: DashMap::new(),
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Report that a component entered the viewport.
    pub fn entered(&self, component_id: &str) {
        if self.observed.contains_key(component_id) {
            let _ = self.sender.send(VisibilityEvent {
                component_id: component_id.to_string(),
            });
        }
    }
}

impl Default for IntersectionFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilitySource for IntersectionFeed {
    fn observe(&self, component_id: &str) {
        self.observed.insert(component_id.to_string(), ());
    }

    fn unobserve(&self, component_id: &str) {
        self.observed.remove(component_id);
    }

    fn subscribe(&self) -> UnboundedReceiver<VisibilityEvent> {
        take_receiver(&self.receiver)
    }
}

/// Visibility probe polled for each observed component id.
pub type VisibilityProbe = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Polling-style source: a fixed-interval task (default 100ms, the
/// scroll-throttle interval) probes each observed id and emits an event
/// when it reports visible. Emission repeats until the bus unobserves the
/// id; the bus-side activation is idempotent.
pub struct PollingWatcher {
    observed: Arc<DashMap<String, ()>>,
    receiver: Mutex<Option<UnboundedReceiver<VisibilityEvent>>>,
    poller: JoinHandle<()>,
}

impl PollingWatcher {
    pub fn new<F>(probe: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::with_interval(probe, Duration::from_millis(100))
    }

    /// Must be created within a tokio runtime; the polling task starts
    /// immediately.
    pub fn with_interval<F>(probe: F, interval: Duration) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let observed: Arc<DashMap<String, ()>> = Arc::new(DashMap::new());

        let poll_set = observed.clone();
        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                // Snapshot the observed set so no table lock is held while
                // the probe runs.
                let ids: Vec<String> = poll_set.iter().map(|entry| entry.key().clone()).collect();
                for component_id in ids {
                    if probe(&component_id) {
                        let _ = sender.send(VisibilityEvent { component_id });
                    }
                }
            }
        });

        Self {
            observed,
            receiver: Mutex::new(Some(receiver)),
            poller,
        }
    }
}

impl Drop for PollingWatcher {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

impl VisibilitySource for PollingWatcher {
    fn observe(&self, component_id: &str) {
        self.observed.insert(component_id.to_string(), ());
    }

    fn unobserve(&self, component_id: &str) {
        self.observed.remove(component_id);
    }

    fn subscribe(&self) -> UnboundedReceiver<VisibilityEvent> {
        take_receiver(&self.receiver)
    }
}

fn take_receiver(
    slot: &Mutex<Option<UnboundedReceiver<VisibilityEvent>>>,
) -> UnboundedReceiver<VisibilityEvent> {
    if let Ok(mut guard) = slot.lock() {
        if let Some(receiver) = guard.take() {
            return receiver;
        }
    }
    log::warn!("visibility event stream already subscribed, returning closed stream");
    let (_, receiver) = mpsc::unbounded_channel();
    receiver
}

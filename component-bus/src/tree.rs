use crate::component::Component;
use std::sync::{Arc, RwLock};

/// External collaborator standing in for the UI tree. The bus only needs
/// two queries: the set of lazily-hydratable components and
/// selector-matched lookup in document order.
pub trait ComponentTree: Send + Sync {
    /// Components explicitly marked for lazy hydration.
    fn lazy_components(&self) -> Vec<Arc<dyn Component>>;

    /// Components matching a selector, in document order. `root` scopes the
    /// query to a subtree by id; `None` queries the whole tree.
    fn select(&self, selector: &str, root: Option<&str>) -> Vec<Arc<dyn Component>>;
}

struct TreeEntry {
    component: Arc<dyn Component>,
    selectors: Vec<String>,
    ancestors: Vec<String>,
}

/// Flat in-memory tree. Each component is registered with the selector
/// tokens it matches (e.g. `"#top"`, `".panel"`) and the ids of its
/// ancestors; insertion order is document order.
pub struct StaticTree {
    entries: RwLock<Vec<TreeEntry>>,
}

impl StaticTree {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, component: Arc<dyn Component>, selectors: &[&str]) {
        self.insert_under(component, selectors, &[]);
    }

    pub fn insert_under(
        &self,
        component: Arc<dyn Component>,
        selectors: &[&str],
        ancestors: &[&str],
    ) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(TreeEntry {
                component,
                selectors: selectors.iter().map(|s| s.to_string()).collect(),
                ancestors: ancestors.iter().map(|s| s.to_string()).collect(),
            });
        }
    }
}

impl Default for StaticTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentTree for StaticTree {
    fn lazy_components(&self) -> Vec<Arc<dyn Component>> {
        match self.entries.read() {
            Ok(entries) => entries
                .iter()
                .filter(|entry| entry.component.lazy())
                .map(|entry| entry.component.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn select(&self, selector: &str, root: Option<&str>) -> Vec<Arc<dyn Component>> {
        match self.entries.read() {
            Ok(entries) => entries
                .iter()
                .filter(|entry| entry.selectors.iter().any(|s| s == selector))
                .filter(|entry| match root {
                    Some(root_id) => entry.ancestors.iter().any(|a| a == root_id),
                    None => true,
                })
                .map(|entry| entry.component.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

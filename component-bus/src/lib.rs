//! Visibility-gated hydration and multicast dispatch for independently
//! defined UI components. Lazily-hydratable components run their one-time
//! activation hook when they become visible or when a multicast first
//! addresses them, whichever comes first; `multicall` fans a capability
//! invocation out over a selector-matched set and collects per-element
//! results.

mod bus;
mod component;
mod error;
mod tree;
mod visibility;

#[cfg(test)]
mod tests;

pub use bus::{BusStats, CallOutcome, ComponentBus, Multicall};
pub use component::Component;
pub use error::CapabilityError;
pub use tree::{ComponentTree, StaticTree};
pub use visibility::{
    IntersectionFeed, PollingWatcher, VisibilityEvent, VisibilityProbe, VisibilitySource,
};

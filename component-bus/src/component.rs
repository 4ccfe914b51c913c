use crate::error::CapabilityError;
use async_trait::async_trait;
use serde_json::Value;

/// An addressable UI instance participating in the bus.
///
/// Capabilities are named callable members; the trait scopes dynamic
/// dispatch to the set of types that opt in, instead of open-ended runtime
/// introspection.
#[async_trait]
pub trait Component: Send + Sync {
    /// Unique identifier. Required for hydration tracking; a component
    /// without one can never be activated by visibility.
    fn id(&self) -> Option<&str>;

    /// Whether the component is marked for deferred, visibility-gated
    /// activation.
    fn lazy(&self) -> bool {
        false
    }

    /// Whether the component exposes a callable capability of this name.
    fn has_capability(&self, name: &str) -> bool;

    /// Invoke a named capability with positional parameters.
    async fn invoke(&self, capability: &str, params: &[Value]) -> Result<Value, CapabilityError>;

    /// One-time activation hook. The bus guarantees it runs at most once,
    /// before the first capability invocation or on first visibility,
    /// whichever comes first.
    async fn activate(&self) {}
}

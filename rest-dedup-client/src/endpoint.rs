use crate::verb::Verb;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with the decoded response body on every successful
/// completion of a call against its endpoint.
pub type ResponseCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Identifies a registered endpoint by verb and path signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    verb: Verb,
    signature: String,
}

impl EndpointKey {
    pub fn new(verb: Verb, signature: impl Into<String>) -> Self {
        Self {
            verb,
            signature: signature.into(),
        }
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.verb, self.signature)
    }
}

/// Substitute `{{name}}` placeholders in a path signature. Unresolved
/// placeholders are left verbatim.
pub fn apply_path_values(signature: &str, path_vars: &HashMap<String, String>) -> String {
    let mut path = signature.to_string();
    for (name, value) in path_vars {
        let token = format!("{{{{{}}}}}", name);
        path = path.replace(&token, value);
    }
    path
}

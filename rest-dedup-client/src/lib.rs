//! REST call interface with in-flight request deduplication and multiple
//! callback support. Concurrent calls with an identical fingerprint
//! (resolved URL, verb, payload, headers) collapse into a single network
//! operation whose response fans out to every callback registered for the
//! endpoint.

mod deduplication;
mod endpoint;
mod error;
mod transport;
mod verb;


pub use deduplication::{InFlightRequest, InFlightStats, InFlightTable};
pub use endpoint::{apply_path_values, EndpointKey, ResponseCallback};
pub use error::{ApiFailure, Error};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, RequestBody, SurfTransport, TransportError};
pub use verb::{HttpMethod, Verb};

use dashmap::DashMap;
use getset::Getters;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use utils::fingerprint::{canonical_json, fingerprint};

/// Handler invoked with every network or decode failure. Failures are never
/// re-raised to the caller of `call`, which has already returned.
pub type FailureHandler = Arc<dyn Fn(&ApiFailure) + Send + Sync>;

/// Optional parts of a call: payload, headers and path variable values.
#[derive(Clone, Debug, Default, Getters)]
#[get = "pub"]
pub struct CallOptions {
    data: Option<Value>,
    headers: BTreeMap<String, String>,
    path_vars: HashMap<String, String>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_path_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_vars.insert(name.into(), value.into());
        self
    }
}

struct Inner {
    host_url: String,
    operations: DashMap<EndpointKey, Vec<ResponseCallback>>,
    in_flight: InFlightTable,
    transport: Arc<dyn HttpTransport>,
    error_handler: FailureHandler,
}

/// Cheaply cloneable handle over the endpoint registry, in-flight table and
/// transport.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

pub struct RestClientBuilder {
    host_url: String,
    transport: Option<Arc<dyn HttpTransport>>,
    error_handler: Option<FailureHandler>,
}

impl RestClientBuilder {
    pub fn host_url(mut self, host_url: impl Into<String>) -> Self {
        self.host_url = host_url.into();
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ApiFailure) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> RestClient {
        RestClient {
            inner: Arc::new(Inner {
                host_url: self.host_url,
                operations: DashMap::new(),
                in_flight: InFlightTable::new(),
                transport: self
                    .transport
                    .unwrap_or_else(|| Arc::new(SurfTransport::new())),
                error_handler: self
                    .error_handler
                    .unwrap_or_else(|| Arc::new(|failure| log::error!("{}", failure))),
            }),
        }
    }
}

impl Default for RestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RestClient {
    /// Client rooted at `/` with the surf transport and a logging error
    /// handler.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RestClientBuilder {
        RestClientBuilder {
            host_url: "/".to_string(),
            transport: None,
            error_handler: None,
        }
    }

    /// Register a callback for an endpoint. Registrations for the same
    /// (verb, signature) accumulate and all fire, in registration order, on
    /// each successful completion. Returns `&self` for chaining.
    pub fn define_endpoint<F>(&self, verb: Verb, signature: &str, callback: F) -> &Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let key = EndpointKey::new(verb, signature);
        self.inner
            .operations
            .entry(key)
            .or_default()
            .push(Arc::new(callback));
        self
    }

    /// Call a defined endpoint with no payload, headers or path variables.
    pub fn call(&self, signature: &str, verb: Verb) -> Result<bool, Error> {
        self.call_with(signature, verb, CallOptions::new())
    }

    /// Call a defined endpoint. Returns `Ok(true)` when a network operation
    /// was launched and `Ok(false)` when an identical request is already in
    /// flight; completion is observed only through the registered
    /// callbacks. Must be invoked within a tokio runtime.
    pub fn call_with(
        &self,
        signature: &str,
        verb: Verb,
        options: CallOptions,
    ) -> Result<bool, Error> {
        let key = EndpointKey::new(verb, signature);
        if !self.inner.operations.contains_key(&key) {
            return Err(Error::UnregisteredEndpoint(key));
        }

        let path = apply_path_values(signature, options.path_vars());
        let url = format!("{}{}", self.inner.host_url, path);

        // The fingerprint covers the caller's intent only: headers the
        // transport adds later (content-type) are excluded.
        let data_repr = canonical_json(options.data().as_ref().unwrap_or(&Value::Null));
        let headers_value = Value::Object(
            options
                .headers()
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        let headers_repr = canonical_json(&headers_value);
        let verb_repr = verb.to_string();
        let request_fingerprint = fingerprint(&[&url, &verb_repr, &data_repr, &headers_repr]);

        if !self.inner.in_flight.try_claim(&request_fingerprint, key) {
            return Ok(false);
        }

        let request = HttpRequest {
            method: verb.method(),
            url,
            headers: options.headers().clone(),
            body: build_body(verb, options.data().as_ref()),
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run(request_fingerprint, request).await;
        });

        Ok(true)
    }

    /// Snapshot of the in-flight table.
    pub fn in_flight_stats(&self) -> InFlightStats {
        self.inner.in_flight.stats()
    }
}

impl Inner {
    async fn run(self: Arc<Self>, request_fingerprint: String, request: HttpRequest) {
        let endpoint = self.in_flight.endpoint_of(&request_fingerprint);
        let url = request.url.clone();
        let outcome = self.transport.execute(request).await;
        self.in_flight.resolve(&request_fingerprint);

        match outcome {
            Ok(response) if response.is_success() => match response.json() {
                Ok(payload) => {
                    if let Some(endpoint) = endpoint {
                        self.dispatch(&endpoint, payload);
                    }
                }
                Err(err) => (self.error_handler)(&ApiFailure::Decode(err)),
            },
            Ok(response) => (self.error_handler)(&ApiFailure::Status {
                url,
                status: response.status,
                body: response.body,
            }),
            Err(err) => (self.error_handler)(&ApiFailure::Transport(err)),
        }

        self.in_flight.purge();
    }

    fn dispatch(&self, endpoint: &EndpointKey, payload: Value) {
        // Callbacks are cloned out before invocation so a callback that
        // re-enters the client never holds a registry lock.
        let callbacks: Vec<ResponseCallback> = match self.operations.get(endpoint) {
            Some(entry) => entry.value().clone(),
            None => return,
        };
        log::debug!("dispatching response for {} to {} callbacks", endpoint, callbacks.len());
        for callback in callbacks {
            callback(payload.clone());
        }
    }
}

/// Resolve the body a verb actually sends. Only the POST variants forward
/// call data; PUT and DELETE drop it.
fn build_body(verb: Verb, data: Option<&Value>) -> Option<RequestBody> {
    let data = data?;
    if !verb.carries_payload() {
        log::debug!("{} carries no payload, dropping call data", verb);
        return None;
    }
    if verb.is_form() {
        let fields = match data {
            Value::Object(map) => map
                .iter()
                .map(|(name, value)| {
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), text)
                })
                .collect(),
            _ => {
                log::warn!("form payload is not an object, sending no fields");
                Vec::new()
            }
        };
        Some(RequestBody::Form(fields))
    } else {
        Some(RequestBody::Json(data.clone()))
    }
}

use crate::endpoint::EndpointKey;
use crate::transport::TransportError;

/// Errors raised synchronously from the client's public calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The (verb, signature) pair was never registered with
    /// `define_endpoint`. Programmer misuse, not recoverable at the call
    /// site.
    #[error("{0} has not been defined")]
    UnregisteredEndpoint(EndpointKey),
}

/// Failure detail delivered to the process-wide error handler. The original
/// caller of `call` has already returned by the time these occur, so they
/// are never re-raised.
#[derive(Debug, thiserror::Error)]
pub enum ApiFailure {
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

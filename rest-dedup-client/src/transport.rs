use crate::verb::HttpMethod;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use surf::http::Method;
use surf::{Client, Url};
use utils::surf_logging::SurfLogging;

/// Payload encoding for a request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully resolved request handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
}

/// Raw response surfaced by the transport. Body decoding is the engine's
/// concern so that decode failures reach the error handler.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("{0}")]
    Network(String),
}

/// Narrow contract the deduplication engine depends on: issue one HTTP
/// request, receive status and body or a failure.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a surf client with request logging.
pub struct SurfTransport {
    http: Client,
}

impl SurfTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new().with(SurfLogging),
        }
    }
}

impl Default for SurfTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for SurfTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = Url::parse(&request.url).map_err(|err| TransportError::InvalidUrl {
            url: request.url.clone(),
            message: err.to_string(),
        })?;

        let method = match request.method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Post => Method::Post,
            HttpMethod::Put => Method::Put,
            HttpMethod::Delete => Method::Delete,
        };

        let mut req = surf::Request::new(method, url);
        for (name, value) in &request.headers {
            req.set_header(name.as_str(), value.as_str());
        }

        match &request.body {
            Some(RequestBody::Json(value)) => {
                let body = surf::Body::from_json(value)
                    .map_err(|err| TransportError::Network(err.to_string()))?;
                req.set_body(body);
            }
            Some(RequestBody::Form(fields)) => {
                let (content_type, body) = multipart_encode(fields);
                req.set_body(body);
                req.set_header("Content-Type", content_type.as_str());
            }
            None => {}
        }

        let mut response = self
            .http
            .send(req)
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        let status: u16 = response.status().into();
        let body = response
            .body_string()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

/// Encode form fields as multipart/form-data. Surf has no multipart
/// support, so the body is assembled by hand; the boundary is derived from
/// the field content so it stays deterministic.
fn multipart_encode(fields: &[(String, String)]) -> (String, String) {
    let parts: Vec<&str> = fields
        .iter()
        .flat_map(|(name, value)| [name.as_str(), value.as_str()])
        .collect();
    let boundary = format!("----{}", &utils::fingerprint::fingerprint(&parts)[..24]);

    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    let content_type = format!("multipart/form-data; boundary={boundary}");
    (content_type, body)
}

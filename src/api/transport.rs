//! HTTP transport with bearer-token injection and error normalization
//!
//! A single `reqwest::Client` serves both cost classes; the deadline travels
//! with each `RequestDescriptor` instead of living in two separate clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use url::Url;

use super::error::ApiError;
use crate::config::ClientConfig;

/// Endpoint whose 401s are expected during silent token checks
const VERIFY_TOKEN_PATH: &str = "verify-token";

/// How expensive a call is expected to be on the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostClass {
    /// Small reads and all writes
    Standard,
    /// Full-dataset listings, aggregate analytics, survival modeling
    Extended,
}

impl CostClass {
    /// The deadline configured for this cost class
    pub fn timeout(self, config: &ClientConfig) -> Duration {
        match self {
            CostClass::Standard => config.standard_timeout,
            CostClass::Extended => config.extended_timeout,
        }
    }
}

/// Everything needed to issue one HTTP call, built fresh per attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub cost: CostClass,
    pub timeout: Duration,
    /// Bearer token attached as `Authorization: Bearer <token>`
    pub bearer: Option<String>,
}

impl RequestDescriptor {
    /// Creates a descriptor with the deadline of its cost class
    pub fn new(method: Method, path: impl Into<String>, cost: CostClass, config: &ClientConfig) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            cost,
            timeout: cost.timeout(config),
            bearer: None,
        }
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Looks up a query parameter by name
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a response that did arrive
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// A response with a JSON body
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }
}

/// Performs HTTP calls
///
/// Implementations report only failures where no response arrived
/// (`ApiError::Connection`, `ApiError::Timeout`); any response, whatever its
/// status, is returned as a `TransportResponse` for `normalize_response`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &RequestDescriptor) -> Result<TransportResponse, ApiError>;
}

/// `Transport` backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url`
    ///
    /// # Returns
    /// * `Err(ApiError::InvalidConfig)` if the URL does not parse or the client cannot be built
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidConfig(format!("invalid base URL '{}': {}", base_url, e)))?;
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// Joins `path` onto the base URL, keeping any path prefix the base carries
    pub fn endpoint_url(&self, path: &str) -> Result<Url, ApiError> {
        endpoint_url(&self.base_url, path)
    }

    /// Builds the reqwest request for a descriptor without sending it
    pub fn build_request(&self, request: &RequestDescriptor) -> Result<reqwest::Request, ApiError> {
        let url = self.endpoint_url(&request.path)?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .timeout(request.timeout)
            .header(reqwest::header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &RequestDescriptor) -> Result<TransportResponse, ApiError> {
        let http_request = self.build_request(request)?;

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            timeout_s = request.timeout.as_secs(),
            "sending request"
        );

        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(|e| transport_failure(e, request))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_failure(e, request))?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Joins a request path onto a base URL
pub fn endpoint_url(base_url: &Url, path: &str) -> Result<Url, ApiError> {
    let joined = format!(
        "{}/{}",
        base_url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ApiError::InvalidConfig(format!("invalid endpoint '{}': {}", joined, e)))
}

/// Percent-encodes one path segment so `/`, `?` and `#` stay inside it
pub fn encode_path_segment(segment: &str) -> String {
    // byte_serialize writes spaces as `+`, which a path would keep literally
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Converts a failure where no usable response arrived
fn transport_failure(error: reqwest::Error, request: &RequestDescriptor) -> ApiError {
    if error.is_timeout() {
        tracing::error!(path = %request.path, "request timed out");
        return ApiError::Timeout {
            seconds: request.timeout.as_secs(),
        };
    }

    tracing::error!(path = %request.path, error = %error, "network error, server unreachable");
    ApiError::connection(error.to_string())
}

/// Turns a received response into its body or a typed error
///
/// A 401 from the verify-token endpoint is routine and only logged at debug.
pub fn normalize_response(
    request: &RequestDescriptor,
    response: TransportResponse,
) -> Result<Vec<u8>, ApiError> {
    if (200..300).contains(&response.status) {
        return Ok(response.body);
    }

    let message = error_message(response.status, &response.body);

    match response.status {
        401 if request.path.contains(VERIFY_TOKEN_PATH) => {
            tracing::debug!(path = %request.path, "token verification rejected");
        }
        401 => {
            tracing::warn!(path = %request.path, "authentication error, token may be invalid or expired");
        }
        status if status >= 500 => {
            tracing::error!(path = %request.path, status, message = %message, "server error");
        }
        status => {
            tracing::warn!(path = %request.path, status, message = %message, "request rejected");
        }
    }

    Err(ApiError::from_status(response.status, message))
}

/// Extracts the server's explanation from an error body
///
/// Prefers the JSON `error` field, then `message`, then the raw body text,
/// then the status reason phrase.
fn error_message(status: u16, body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for field in ["error", "message"] {
            if let Some(Value::String(message)) = map.get(field) {
                return message.clone();
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }

    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

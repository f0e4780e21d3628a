//! Client for the churn analytics REST API
//!
//! `ApiClient` composes the transport, the response cache and the retry
//! policy. Each backend resource gets one method, defined next to its kin:
//!
//! - `customers`: list, get, create, update, delete
//! - `analytics`: aggregate analytics, survival curves, risk factors, predictions
//! - `history`: historical snapshots and CSV export
//! - `auth`: login, token verification, logout
//! - `admin`: dashboard account management
//!
//! Writes never touch the cache. A caller that changes a customer and then
//! wants a current list must clear the list's key (see
//! `CustomerQuery::cache_key`) or pass `force_refresh`.

mod admin;
mod analytics;
pub mod auth;
mod customers;
pub mod error;
mod history;
pub mod retry;
pub mod transport;

pub use analytics::{analytics_cache_key, ANALYTICS_MAX_AGE_SECS, RISK_FACTORS_KEY, SURVIVAL_CURVES_KEY};
pub use auth::{TokenStore, TokenStoreError};
pub use customers::{customer_cache_key, CUSTOMER_MAX_AGE_SECS};
pub use error::ApiError;
pub use history::csv_file_name;
pub use retry::RetryPolicy;
pub use transport::{CostClass, HttpTransport, RequestDescriptor, Transport, TransportResponse};

use std::sync::Arc;

use chrono::Duration;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::config::ClientConfig;
use transport::normalize_response;

/// Entry point for every backend call
#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache>,
    tokens: TokenStore,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("cached_entries", &self.cache.len())
            .field("authenticated", &self.tokens.get().is_some())
            .finish()
    }
}

impl ApiClient {
    /// Creates a client talking HTTP to `config.base_url`
    ///
    /// The token store is file-backed when `config.token_path` is set and
    /// memory-only otherwise.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config.base_url)?;
        let tokens = match &config.token_path {
            Some(path) => TokenStore::file_backed(path.clone())?,
            None => TokenStore::in_memory(),
        };
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(ResponseCache::new()),
            tokens,
        ))
    }

    /// Creates a client from explicit collaborators
    ///
    /// Useful for testing with a scripted transport and an isolated cache.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<ResponseCache>,
        tokens: TokenStore,
    ) -> Self {
        Self {
            config,
            transport,
            cache,
            tokens,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared response cache
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Drops one cached response, or all of them when `key` is `None`
    pub fn clear_cache(&self, key: Option<&str>) {
        tracing::info!(key = key.unwrap_or("*"), "clearing response cache");
        self.cache.clear(key);
    }

    fn request(&self, method: Method, path: impl Into<String>, cost: CostClass) -> RequestDescriptor {
        RequestDescriptor::new(method, path, cost, &self.config)
    }

    /// Sends one request with the current bearer token and returns the raw body
    async fn send(&self, mut request: RequestDescriptor) -> Result<Vec<u8>, ApiError> {
        request.bearer = self.tokens.get();
        self.dispatch(request).await
    }

    /// Sends one request without any Authorization header
    async fn send_unauthenticated(&self, mut request: RequestDescriptor) -> Result<Vec<u8>, ApiError> {
        request.bearer = None;
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: RequestDescriptor) -> Result<Vec<u8>, ApiError> {
        let response = self.transport.execute(&request).await?;
        normalize_response(&request, response)
    }

    async fn send_json(&self, request: RequestDescriptor) -> Result<Value, ApiError> {
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Serves `key` from the cache or fetches it under `retry`
    ///
    /// With `force_refresh` the entry is cleared first and the fetch always
    /// happens. `build` receives the 1-based attempt number.
    async fn cached_read<F>(
        &self,
        key: &str,
        max_age: Duration,
        force_refresh: bool,
        retry: RetryPolicy,
        build: F,
    ) -> Result<Value, ApiError>
    where
        F: Fn(u32) -> RequestDescriptor,
    {
        if force_refresh {
            self.cache.clear(Some(key));
        } else if let Some(cached) = self.cache.get(key, max_age) {
            tracing::debug!(key, "cache hit");
            return Ok(cached);
        }

        tracing::debug!(key, force_refresh, "cache miss, fetching");
        let value = retry
            .run(key, |attempt| self.send_json(build(attempt)))
            .await?;
        Ok(self.cache.set(key, value))
    }
}

/// Parses a JSON body; an empty body is `null`
fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(body)?)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    Ok(serde_json::from_value(value)?)
}

//! Shared fixtures for integration tests
//!
//! `ScriptedTransport` replays queued outcomes in order and records every
//! request it receives, so tests can count attempts and inspect headers,
//! query parameters and deadlines without a server.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use churnctl::api::{ApiClient, ApiError, RequestDescriptor, TokenStore, Transport, TransportResponse};
use churnctl::cache::{ManualClock, ResponseCache};
use churnctl::config::ClientConfig;

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<TransportResponse, ApiError>>>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(Ok(TransportResponse::json(status, &body)));
    }

    pub fn push_raw(&self, status: u16, body: &[u8]) {
        self.push(Ok(TransportResponse {
            status,
            body: body.to_vec(),
        }));
    }

    pub fn push_connection_error(&self) {
        self.push(Err(ApiError::connection("connection refused")));
    }

    pub fn push_timeout(&self, seconds: u64) {
        self.push(Err(ApiError::Timeout { seconds }));
    }

    fn push(&self, outcome: Result<TransportResponse, ApiError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests whose path equals `path`
    pub fn calls_to(&self, path: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &RequestDescriptor) -> Result<TransportResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::connection("no scripted response left")))
    }
}

/// Default configuration without backoff sleeps
pub fn test_config() -> ClientConfig {
    ClientConfig {
        retry_backoff_step: Duration::ZERO,
        ..Default::default()
    }
}

pub fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A client over `transport` with an in-memory token store and a manual clock
pub fn client_with(transport: Arc<ScriptedTransport>) -> (ApiClient, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let cache = Arc::new(ResponseCache::with_clock(clock.clone()));
    let client = ApiClient::with_parts(test_config(), transport, cache, TokenStore::in_memory());
    (client, clock)
}

pub fn customer_page(ids: &[&str]) -> Value {
    let users: Vec<Value> = ids
        .iter()
        .map(|id| json!({"customerID": id, "Contract": "Month-to-month", "MonthlyCharges": 70.35}))
        .collect();
    json!({
        "users": users,
        "pagination": {"page": 1, "per_page": 50, "total": ids.len(), "pages": 1}
    })
}

pub fn analytics_body(total: u64) -> Value {
    json!({
        "total_customers": total,
        "total_revenue": 456116.6,
        "monthly_revenue": 16056.17,
        "churn_distribution": {"Yes": 1869, "No": 5174}
    })
}

pub fn survival_body() -> Value {
    json!({
        "curves": {
            "Two year": {
                "timeline": [0.0, 12.0, 24.0],
                "survival_prob": [1.0, 0.99, 0.97],
                "lower_bound": [1.0, 0.98, 0.96],
                "upper_bound": [1.0, 1.0, 0.98]
            }
        }
    })
}

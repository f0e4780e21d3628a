//! Customer records: paged listing, details, and writes

use chrono::{Duration, Utc};
use reqwest::Method;

use super::transport::encode_path_segment;
use super::{decode, ApiClient, ApiError, CostClass, RetryPolicy};
use crate::data::{Customer, CustomerDetails, CustomerPage, CustomerQuery, MutationAck};

/// Validity window for customer lists and details
pub const CUSTOMER_MAX_AGE_SECS: i64 = 300;

/// Total attempts for a customer listing
const LIST_MAX_ATTEMPTS: u32 = 3;

fn customer_path(id: &str) -> String {
    format!("/customer/{}", encode_path_segment(id))
}

/// Cache key of a single customer's details
pub fn customer_cache_key(id: &str) -> String {
    format!("user-{id}")
}

impl ApiClient {
    /// Lists one page of customers (`GET /users`)
    ///
    /// Served from the cache for five minutes. Asking for every row at once
    /// switches to the extended deadline. Connection failures and timeouts
    /// are retried up to three attempts in total.
    pub async fn list_customers(&self, query: &CustomerQuery) -> Result<CustomerPage, ApiError> {
        let key = query.cache_key();
        let cost = if query.per_page.is_all() {
            CostClass::Extended
        } else {
            CostClass::Standard
        };
        // One cache-busting stamp shared by every attempt of this call
        let cache_buster = query.force_refresh.then(|| Utc::now().timestamp_millis());
        let retry = RetryPolicy::linear(LIST_MAX_ATTEMPTS, self.config.retry_backoff_step);

        let value = self
            .cached_read(
                &key,
                Duration::seconds(CUSTOMER_MAX_AGE_SECS),
                query.force_refresh,
                retry,
                |_| {
                    let mut request = self
                        .request(Method::GET, "/users", cost)
                        .with_query("page", query.page)
                        .with_query("per_page", query.per_page);
                    if let Some(segment) = query.segment {
                        request = request.with_query("segment", segment);
                    }
                    if !query.search.is_empty() {
                        request = request.with_query("search", &query.search);
                    }
                    if let Some(year) = query.year {
                        request = request.with_query("year", year);
                    }
                    if let Some(stamp) = cache_buster {
                        request = request.with_query("_t", stamp);
                    }
                    request
                },
            )
            .await?;

        decode(value)
    }

    /// Fetches one customer with its churn probability (`GET /customer/:id`)
    pub async fn get_customer(&self, id: &str, force_refresh: bool) -> Result<CustomerDetails, ApiError> {
        let path = customer_path(id);
        let value = self
            .cached_read(
                &customer_cache_key(id),
                Duration::seconds(CUSTOMER_MAX_AGE_SECS),
                force_refresh,
                RetryPolicy::single_attempt(),
                |_| self.request(Method::GET, path.as_str(), CostClass::Standard),
            )
            .await?;

        decode(value)
    }

    /// Creates a customer (`POST /customer`)
    ///
    /// Cached lists are left as they are; see the module docs of `api`.
    pub async fn create_customer(&self, customer: &Customer) -> Result<MutationAck, ApiError> {
        let request = self
            .request(Method::POST, "/customer", CostClass::Standard)
            .with_body(serde_json::to_value(customer)?);
        let ack = decode(self.send_json(request).await?)?;
        tracing::info!(customer_id = customer.customer_id.as_deref().unwrap_or("-"), "customer created");
        Ok(ack)
    }

    /// Updates the fields set in `changes` (`PUT /customer/:id`)
    pub async fn update_customer(&self, id: &str, changes: &Customer) -> Result<MutationAck, ApiError> {
        let request = self
            .request(Method::PUT, customer_path(id), CostClass::Standard)
            .with_body(serde_json::to_value(changes)?);
        let ack = decode(self.send_json(request).await?)?;
        tracing::info!(customer_id = id, "customer updated");
        Ok(ack)
    }

    /// Deletes a customer (`DELETE /customer/:id`)
    pub async fn delete_customer(&self, id: &str) -> Result<MutationAck, ApiError> {
        let request = self.request(Method::DELETE, customer_path(id), CostClass::Standard);
        let ack = decode(self.send_json(request).await?)?;
        tracing::info!(customer_id = id, "customer deleted");
        Ok(ack)
    }
}

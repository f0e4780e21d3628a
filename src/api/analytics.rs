//! Aggregate analytics and survival-model output
//!
//! Everything here is computed by the backend and is slow to produce, so all
//! reads use the extended deadline and stay cached for ten minutes.

use chrono::Duration;
use reqwest::Method;
use serde_json::Value;

use super::{decode, ApiClient, ApiError, CostClass, RetryPolicy};
use crate::data::{AnalyticsSummary, PredictionInput, RiskFactors, SurvivalCurves};

/// Validity window for analytics, survival curves and risk factors
pub const ANALYTICS_MAX_AGE_SECS: i64 = 600;

pub const SURVIVAL_CURVES_KEY: &str = "survival_curves";
pub const RISK_FACTORS_KEY: &str = "risk_factors";

/// Total attempts for survival curves
const SURVIVAL_MAX_ATTEMPTS: u32 = 2;

/// `analytics` for all years, `analytics-<year>` otherwise
pub fn analytics_cache_key(year: Option<i32>) -> String {
    match year {
        Some(year) => format!("analytics-{year}"),
        None => "analytics".to_string(),
    }
}

impl ApiClient {
    /// Aggregate churn metrics, optionally restricted to one join year
    /// (`GET /analytics`)
    ///
    /// A forced refresh fetches unconditionally and overwrites the entry; a
    /// failed refresh leaves the previous entry in place.
    pub async fn get_analytics(&self, year: Option<i32>, force_refresh: bool) -> Result<AnalyticsSummary, ApiError> {
        let key = analytics_cache_key(year);
        let max_age = Duration::seconds(ANALYTICS_MAX_AGE_SECS);

        if !force_refresh && self.cache.has(&key, max_age) {
            if let Some(cached) = self.cache.get(&key, max_age) {
                tracing::debug!(key = %key, "cache hit");
                return decode(cached);
            }
        }

        let mut request = self.request(Method::GET, "/analytics", CostClass::Extended);
        if let Some(year) = year {
            request = request.with_query("year", year);
        }
        let value = self.send_json(request).await?;
        decode(self.cache.set(&key, value))
    }

    /// Kaplan-Meier curves per segment (`GET /survival-curve`)
    ///
    /// Two attempts. The second one waits out the backoff and gets the
    /// extended deadline plus `survival_timeout_margin`, so a slow server is
    /// given more room rather than being hit again with the same budget.
    pub async fn get_survival_curves(&self, force_refresh: bool) -> Result<SurvivalCurves, ApiError> {
        let retry = RetryPolicy::linear(SURVIVAL_MAX_ATTEMPTS, self.config.retry_backoff_step)
            .with_timeout_growth(self.config.survival_timeout_margin);
        let base_timeout = CostClass::Extended.timeout(&self.config);

        let value = self
            .cached_read(
                SURVIVAL_CURVES_KEY,
                Duration::seconds(ANALYTICS_MAX_AGE_SECS),
                force_refresh,
                retry,
                |attempt| {
                    self.request(Method::GET, "/survival-curve", CostClass::Extended)
                        .with_timeout(retry.timeout_for(base_timeout, attempt))
                },
            )
            .await?;

        decode(value)
    }

    /// Cox-model hazard ratios with fit diagnostics (`GET /risk-factors`)
    pub async fn get_risk_factors(&self, force_refresh: bool) -> Result<RiskFactors, ApiError> {
        let value = self
            .cached_read(
                RISK_FACTORS_KEY,
                Duration::seconds(ANALYTICS_MAX_AGE_SECS),
                force_refresh,
                RetryPolicy::single_attempt(),
                |_| self.request(Method::GET, "/risk-factors", CostClass::Extended),
            )
            .await?;

        decode(value)
    }

    /// Server-side survival prediction for a hypothetical customer
    /// (`POST /survival-prediction`)
    ///
    /// Not cached and not retried. The response shape belongs to the model,
    /// so it is returned as raw JSON.
    pub async fn predict_customer_survival(&self, input: &PredictionInput) -> Result<Value, ApiError> {
        let request = self
            .request(Method::POST, "/survival-prediction", CostClass::Extended)
            .with_body(serde_json::to_value(input)?);
        self.send_json(request).await
    }
}

//! Historical analytics snapshots and their CSV export

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use reqwest::Method;
use url::Url;

use super::transport::endpoint_url;
use super::{decode, ApiClient, ApiError, CostClass};
use crate::data::{format_api_date, HistoricalPage, HistoricalQuery};

const CSV_PATH: &str = "/historical-analytics/csv";

/// File name of an export: `churn_analytics_<start>_to_<end>.csv`
///
/// An open end of the range is written as `all`.
pub fn csv_file_name(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    let part = |date: Option<NaiveDate>| date.map(format_api_date).unwrap_or_else(|| "all".to_string());
    format!("churn_analytics_{}_to_{}.csv", part(start), part(end))
}

fn date_params(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(start) = start {
        params.push(("start_date", format_api_date(start)));
    }
    if let Some(end) = end {
        params.push(("end_date", format_api_date(end)));
    }
    params
}

impl ApiClient {
    /// One page of stored analytics snapshots (`GET /historical-analytics`)
    ///
    /// Always fetched fresh.
    pub async fn get_historical_analytics(&self, query: &HistoricalQuery) -> Result<HistoricalPage, ApiError> {
        let mut request = self
            .request(Method::GET, "/historical-analytics", CostClass::Standard)
            .with_query("page", query.page)
            .with_query("per_page", query.per_page);
        for (key, value) in date_params(query.start_date, query.end_date) {
            request = request.with_query(key, value);
        }

        decode(self.send_json(request).await?)
    }

    /// Absolute URL of the CSV export for a date range
    pub fn historical_csv_url(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Url, ApiError> {
        let base = Url::parse(&self.config.base_url)
            .map_err(|e| ApiError::InvalidConfig(format!("invalid base URL '{}': {}", self.config.base_url, e)))?;
        let mut url = endpoint_url(&base, CSV_PATH)?;

        let params = date_params(start, end);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Downloads the CSV export into `dir` and returns the written file
    ///
    /// The body is stored as-is, never parsed.
    pub async fn download_historical_csv(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        let mut request = self.request(Method::GET, CSV_PATH, CostClass::Standard);
        for (key, value) in date_params(start, end) {
            request = request.with_query(key, value);
        }

        let body = self.send(request).await?;
        let path = dir.join(csv_file_name(start, end));
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, &body).await?;

        tracing::info!(path = %path.display(), bytes = body.len(), "historical analytics exported");
        Ok(path)
    }
}

//! Core data models for the churn analytics API
//!
//! This module contains the wire types exchanged with the backend: customer
//! records, list pages, aggregate analytics, survival-model output, historical
//! snapshots and the admin user accounts.
//!
//! Statistical payloads (survival curves, hazard ratios) are computed by the
//! server and kept close to their JSON shape; unknown fields are preserved in
//! `extra` maps so nothing the server adds is lost on a round trip.

pub mod auth;
pub mod query;

pub use auth::{AdminUserList, AdminUserUpdate, AuthUser, LoginResponse, NewAdminUser, Role, TokenVerification};
pub use query::{
    format_api_date, CustomerQuery, HistoricalQuery, PerPage, QueryError, Segment, DEFAULT_HISTORY_PER_PAGE, DEFAULT_PER_PAGE,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A customer record as stored by the backend
///
/// Every field is optional so the same type serves full records, creation
/// bodies and partial updates; absent fields are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "customerID", default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// 1 for senior citizens, 0 otherwise
    #[serde(rename = "SeniorCitizen", default, skip_serializing_if = "Option::is_none")]
    pub senior_citizen: Option<u8>,
    #[serde(rename = "Partner", default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<String>,
    #[serde(rename = "Dependents", default, skip_serializing_if = "Option::is_none")]
    pub dependents: Option<String>,
    /// Months as a customer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenure: Option<u32>,
    #[serde(rename = "PhoneService", default, skip_serializing_if = "Option::is_none")]
    pub phone_service: Option<String>,
    #[serde(rename = "MultipleLines", default, skip_serializing_if = "Option::is_none")]
    pub multiple_lines: Option<String>,
    #[serde(rename = "InternetService", default, skip_serializing_if = "Option::is_none")]
    pub internet_service: Option<String>,
    #[serde(rename = "OnlineSecurity", default, skip_serializing_if = "Option::is_none")]
    pub online_security: Option<String>,
    #[serde(rename = "OnlineBackup", default, skip_serializing_if = "Option::is_none")]
    pub online_backup: Option<String>,
    #[serde(rename = "DeviceProtection", default, skip_serializing_if = "Option::is_none")]
    pub device_protection: Option<String>,
    #[serde(rename = "TechSupport", default, skip_serializing_if = "Option::is_none")]
    pub tech_support: Option<String>,
    #[serde(rename = "StreamingTV", default, skip_serializing_if = "Option::is_none")]
    pub streaming_tv: Option<String>,
    #[serde(rename = "StreamingMovies", default, skip_serializing_if = "Option::is_none")]
    pub streaming_movies: Option<String>,
    /// Month-to-month, One year, or Two year
    #[serde(rename = "Contract", default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(rename = "PaperlessBilling", default, skip_serializing_if = "Option::is_none")]
    pub paperless_billing: Option<String>,
    #[serde(rename = "PaymentMethod", default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(rename = "MonthlyCharges", default, skip_serializing_if = "Option::is_none")]
    pub monthly_charges: Option<f64>,
    /// Number or numeric string, depending on how the record was imported
    #[serde(rename = "TotalCharges", default, skip_serializing_if = "Option::is_none")]
    pub total_charges: Option<Value>,
    #[serde(rename = "Churn", default, skip_serializing_if = "Option::is_none")]
    pub churn: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(rename = "joinDate", default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
    /// Fields this client does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pagination block of a customer list response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
}

/// One page of customers (`GET /users`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerPage {
    #[serde(default)]
    pub users: Vec<Customer>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// A single customer with the model's churn estimate (`GET /customer/:id`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub user: Customer,
    /// Percentage, 0-100
    #[serde(default)]
    pub churn_probability: f64,
}

/// Acknowledgment returned by customer writes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        rename = "customerID",
        alias = "customer_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub customer_id: Option<String>,
    /// The record after an update, when the server sends it back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Customer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregate churn metrics (`GET /analytics`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    #[serde(default)]
    pub total_customers: u64,
    #[serde(default)]
    pub total_revenue: f64,
    #[serde(default)]
    pub monthly_revenue: f64,
    #[serde(default)]
    pub churn_distribution: Value,
    #[serde(default)]
    pub churn_by_contract: Value,
    #[serde(default)]
    pub churn_by_payment_method: Value,
    #[serde(default)]
    pub churn_by_tenure_group: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kaplan-Meier estimate for one segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurvivalCurve {
    #[serde(default)]
    pub timeline: Vec<f64>,
    #[serde(default)]
    pub survival_prob: Vec<f64>,
    #[serde(default)]
    pub lower_bound: Vec<f64>,
    #[serde(default)]
    pub upper_bound: Vec<f64>,
}

/// Survival curves keyed by segment name (`GET /survival-curve`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurvivalCurves {
    #[serde(default)]
    pub curves: BTreeMap<String, SurvivalCurve>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Cox-model hazard ratios and fit diagnostics (`GET /risk-factors`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    #[serde(default)]
    pub risk_factors: Vec<Value>,
    #[serde(default)]
    pub model_metrics: Value,
    #[serde(default)]
    pub model_summary: Value,
}

/// One page of historical analytics snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPage {
    #[serde(default)]
    pub records: Vec<Value>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub total: u64,
}

/// Inputs to a survival prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionInput {
    /// Month-to-month, One year, or Two year
    pub contract: String,
    pub monthly_charges: f64,
    /// DSL, Fiber optic, or No
    pub internet_service: String,
}

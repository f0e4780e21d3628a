//! churnctl library
//!
//! API access layer for the customer-churn analytics backend: a cached,
//! retrying `ApiClient`, its wire models, and the CLI definitions shared with
//! the `churnctl` binary and integration tests.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod prediction;

pub use api::{ApiClient, ApiError};
pub use config::ClientConfig;

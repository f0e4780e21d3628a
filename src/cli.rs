//! Command-line interface parsing for churnctl
//!
//! This module holds the clap definitions and the value parsers that turn
//! raw argument text into typed query parameters. Executing the commands is
//! the binary's job.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::api::TokenStore;
use crate::config::{ClientConfig, API_URL_ENV, DEFAULT_BASE_URL};
use crate::data::{Customer, PerPage, QueryError, Role, Segment, DEFAULT_HISTORY_PER_PAGE};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// Unknown segment name or unusable page size
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Invalid date: '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid role: '{0}'. Valid roles: admin, editor, viewer")]
    InvalidRole(String),

    /// A customer body that is not a JSON object
    #[error("Invalid customer JSON: {0}")]
    InvalidJson(String),

    #[error("Nothing to update: pass at least one of --email, --role, --password")]
    EmptyUpdate,
}

/// churnctl - query and manage the customer-churn analytics API
#[derive(Parser, Debug)]
#[command(name = "churnctl")]
#[command(about = "Customer churn analytics from the command line")]
#[command(version)]
pub struct Cli {
    /// Base URL of the analytics API
    #[arg(long, global = true, env = API_URL_ENV, value_name = "URL")]
    pub api_url: Option<String>,

    /// Bearer token to use instead of the saved one (not persisted)
    #[arg(long, global = true, env = "CHURN_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Log requests, retries and cache activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Deadline in seconds for small reads and writes
    #[arg(long, global = true, value_name = "SECS")]
    pub standard_timeout: Option<u64>,

    /// Deadline in seconds for heavy analytics calls
    #[arg(long, global = true, value_name = "SECS")]
    pub extended_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and save the token for later commands
    Login {
        username: String,
        #[arg(long, env = "CHURN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the saved token
    Logout,
    /// Show the account behind the current token
    Whoami,
    /// Browse and edit customer records
    #[command(subcommand)]
    Customers(CustomerCommand),
    /// Aggregate churn metrics
    Analytics {
        /// Restrict to customers who joined in this year
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        refresh: bool,
    },
    /// Kaplan-Meier survival curves per segment
    Survival {
        #[arg(long)]
        refresh: bool,
    },
    /// Cox-model hazard ratios
    RiskFactors {
        #[arg(long)]
        refresh: bool,
    },
    /// Stored historical analytics snapshots
    History {
        #[command(flatten)]
        range: DateRange,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_HISTORY_PER_PAGE)]
        per_page: u32,
    },
    /// Save historical analytics as a CSV file
    ExportCsv {
        #[command(flatten)]
        range: DateRange,
        /// Directory to write into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Predict tenure and lifetime value for a hypothetical customer
    Predict {
        /// Month-to-month, One year, or Two year
        #[arg(long)]
        contract: String,
        #[arg(long)]
        monthly_charges: f64,
        /// DSL, Fiber optic, or No
        #[arg(long)]
        internet_service: String,
    },
    /// Manage dashboard accounts (admin only)
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
pub enum CustomerCommand {
    /// List one page of customers
    List {
        #[arg(long, value_parser = parse_segment)]
        segment: Option<Segment>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Page size, or 'all'
        #[arg(long, value_parser = parse_per_page, default_value = "50")]
        per_page: PerPage,
        /// Customer ID fragment
        #[arg(long, default_value = "")]
        search: String,
        /// Join year
        #[arg(long)]
        year: Option<i32>,
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
    },
    /// Show one customer with its churn probability
    Get {
        id: String,
        #[arg(long)]
        refresh: bool,
    },
    /// Create a customer from a JSON object
    Create {
        #[arg(value_parser = parse_customer_json)]
        customer: Customer,
    },
    /// Update the fields given in a JSON object
    Update {
        id: String,
        #[arg(value_parser = parse_customer_json)]
        changes: Customer,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    List,
    Register {
        username: String,
        #[arg(long, env = "CHURN_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, value_parser = parse_role, default_value = "viewer")]
        role: Role,
        #[arg(long)]
        email: Option<String>,
    },
    Update {
        username: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        #[arg(long)]
        password: Option<String>,
    },
    Delete {
        username: String,
    },
}

/// Optional start and end of a date range
#[derive(Args, Debug, Clone, Default)]
pub struct DateRange {
    /// First day, YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,
    /// Last day, YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,
}

impl Cli {
    /// Client configuration from the global flags
    ///
    /// The token is persisted in the user config directory when one exists.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::with_base_url(self.api_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        if let Some(secs) = self.standard_timeout {
            config.standard_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.extended_timeout {
            config.extended_timeout = Duration::from_secs(secs);
        }
        config.token_path = TokenStore::default_path();
        config
    }
}

pub fn parse_segment(s: &str) -> Result<Segment, CliError> {
    Ok(s.parse()?)
}

pub fn parse_per_page(s: &str) -> Result<PerPage, CliError> {
    Ok(s.parse()?)
}

pub fn parse_date(s: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CliError::InvalidDate(s.to_string()))
}

/// Accepts only the three roles the server assigns
pub fn parse_role(s: &str) -> Result<Role, CliError> {
    match Role::from(s.to_lowercase()) {
        Role::Other(_) => Err(CliError::InvalidRole(s.to_string())),
        role => Ok(role),
    }
}

pub fn parse_customer_json(s: &str) -> Result<Customer, CliError> {
    let value: serde_json::Value = serde_json::from_str(s).map_err(|e| CliError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(CliError::InvalidJson("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| CliError::InvalidJson(e.to_string()))
}

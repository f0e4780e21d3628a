//! Request parameter structures
//!
//! Each list-style operation takes an explicit parameter struct whose
//! `Default` spells out what an omitted option means.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

/// Default page size for the customer list
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Default page size for historical analytics
pub const DEFAULT_HISTORY_PER_PAGE: u32 = 10;

/// Errors raised when parsing query parameters from text
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid segment: '{0}'. Valid segments: high-value, long-term, new, active")]
    InvalidSegment(String),

    #[error("Invalid page size: '{0}'. Use a positive number or 'all'")]
    InvalidPerPage(String),
}

/// A named customer subset, filtered server-side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Monthly charges above 75
    HighValue,
    /// Tenure above 24 months
    LongTerm,
    /// Tenure below 3 months
    New,
    /// Customers that have not churned
    Active,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::HighValue => "high-value",
            Segment::LongTerm => "long-term",
            Segment::New => "new",
            Segment::Active => "active",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high-value" | "high_value" | "highvalue" => Ok(Segment::HighValue),
            "long-term" | "long_term" | "longterm" => Ok(Segment::LongTerm),
            "new" => Ok(Segment::New),
            "active" => Ok(Segment::Active),
            _ => Err(QueryError::InvalidSegment(s.to_string())),
        }
    }
}

/// Page size for the customer list: a count, or everything at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerPage {
    Count(u32),
    /// Skip pagination; the server returns every matching customer
    All,
}

impl PerPage {
    pub fn is_all(&self) -> bool {
        matches!(self, PerPage::All)
    }
}

impl Default for PerPage {
    fn default() -> Self {
        PerPage::Count(DEFAULT_PER_PAGE)
    }
}

impl fmt::Display for PerPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerPage::Count(n) => write!(f, "{}", n),
            PerPage::All => f.write_str("all"),
        }
    }
}

impl FromStr for PerPage {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(PerPage::All);
        }
        match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(PerPage::Count(n)),
            _ => Err(QueryError::InvalidPerPage(s.to_string())),
        }
    }
}

/// Parameters for listing customers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerQuery {
    /// `None` lists every segment
    pub segment: Option<Segment>,
    /// 1-based page number
    pub page: u32,
    pub per_page: PerPage,
    /// Case-insensitive customer ID fragment; empty means no search
    pub search: String,
    /// Join-year filter; `None` means every year
    pub year: Option<i32>,
    /// Skip the cache read and replace the cached entry with a fresh fetch
    pub force_refresh: bool,
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            segment: None,
            page: 1,
            per_page: PerPage::default(),
            search: String::new(),
            year: None,
            force_refresh: false,
        }
    }
}

impl CustomerQuery {
    /// Query for one page with the default filters
    pub fn page(page: u32, per_page: PerPage) -> Self {
        Self {
            page,
            per_page,
            ..Default::default()
        }
    }

    /// Cache fingerprint of every response-affecting parameter
    ///
    /// `force_refresh` is deliberately absent. Segment, page, page size and
    /// year never contain `_`, so the search text between them cannot make two
    /// different queries collide.
    pub fn cache_key(&self) -> String {
        format!(
            "users_{}_{}_{}_{}_{}",
            self.segment.map(|s| s.as_str()).unwrap_or("all"),
            self.page,
            self.per_page,
            self.search,
            self.year.map(|y| y.to_string()).unwrap_or_else(|| "all".to_string())
        )
    }
}

/// Parameters for browsing historical analytics snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for HistoricalQuery {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            page: 1,
            per_page: DEFAULT_HISTORY_PER_PAGE,
        }
    }
}

/// Formats a date the way the API expects (`YYYY-MM-DD`)
pub fn format_api_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

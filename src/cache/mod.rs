//! Cache module for storing API responses in memory
//!
//! This module provides a response cache that maps a request fingerprint to the
//! JSON payload the server returned, together with the time it was stored. Every
//! read checks the entry against a caller-supplied validity window and evicts it
//! when it has gone stale.

mod clock;
mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{CacheEntry, ResponseCache, DEFAULT_MAX_AGE_SECS};

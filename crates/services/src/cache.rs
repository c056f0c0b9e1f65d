//! Cache entries: one locally held result set per query specification.
//!
//! Entries are owned exclusively by the catalog service and never handed
//! out for direct mutation; screens only see `CatalogPage` snapshots.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use domains::{CatalogError, Listing};

/// Lifecycle of a cache entry.
///
/// `Idle → Loading → {Fresh, Error}`; `Fresh → Loading` on refresh or
/// invalidation-triggered refetch; `Error → Loading` on retry. Entries only
/// leave the map through LRU eviction or session teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryState {
    Idle,
    Loading,
    Fresh,
    Error,
}

pub(crate) struct CacheEntry {
    pub listings: Vec<Listing>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub state: EntryState,
    /// Ticket for in-flight fetches. A response whose ticket no longer
    /// matches has been superseded and must be discarded.
    pub generation: u64,
    pub last_used: Instant,
}

impl Default for CacheEntry {
    fn default() -> Self {
        CacheEntry {
            listings: Vec::new(),
            fetched_at: None,
            state: EntryState::Idle,
            generation: 0,
            last_used: Instant::now(),
        }
    }
}

impl CacheEntry {
    /// Snapshot handed to callers. A failed refresh keeps whatever was
    /// previously fresh, so an `Error` entry can still carry stale
    /// listings for the UI to show alongside the error.
    pub fn page(&self, error: Option<CatalogError>) -> CatalogPage {
        CatalogPage {
            listings: self.listings.clone(),
            fetched_at: self.fetched_at,
            error,
        }
    }

    /// Marks the entry stale and discards any in-flight response for it.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.state = EntryState::Idle;
    }
}

/// What a screen renders: the ordered listing sequence plus the freshness
/// and failure context. Read failures degrade to a page with the error
/// attached rather than panicking the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub listings: Vec<Listing>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub error: Option<CatalogError>,
}

impl CatalogPage {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

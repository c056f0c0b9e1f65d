//! poundtrades/crates/storage-adapters/src/lib.rs
//!
//! Listing-source and media-storage implementations of the `domains` ports.
//! The in-memory backends are always compiled (tests and offline use); the
//! SQLite backend and the local-filesystem media store are feature-gated.

pub mod memory;

#[cfg(feature = "db-sqlite")]
pub mod sqlite;

#[cfg(feature = "media-local")]
pub mod media;

pub use memory::{MemoryListingSource, MemoryMediaStore};

#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteListingSource;

#[cfg(feature = "media-local")]
pub use media::LocalMediaStore;

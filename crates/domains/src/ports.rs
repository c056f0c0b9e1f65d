//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the catalog
//! service. The hosted backend owns wire formats; these contracts only fix
//! the semantics the service relies on.

use async_trait::async_trait;
use bytes::Bytes;
use mime::Mime;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::{
    AuthEvent, Category, ChangeEvent, Listing, ListingId, ListingPatch,
    ListingStatus, NewListingRecord, Unlock, UserId,
};
use crate::query::SourceQuery;

/// Durable storage, query, and change notification for listings,
/// categories, favorites, and unlocks.
///
/// Semantics the service depends on:
/// - `insert` assigns id, created/updated timestamps, and the Available
///   status; clients never pick identities.
/// - `update`/`delete` are owner-only; `set_status` is owner-or-admin.
///   Violations surface as `Unauthorized`, distinct from `NotFound`.
/// - `query` returns rows already in canonical rank order.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn query(&self, query: &SourceQuery) -> Result<Vec<Listing>>;
    async fn get(&self, id: ListingId) -> Result<Option<Listing>>;
    async fn insert(&self, record: &NewListingRecord) -> Result<Listing>;
    async fn update(
        &self,
        caller: UserId,
        id: ListingId,
        patch: &ListingPatch,
    ) -> Result<Listing>;
    async fn set_status(
        &self,
        caller: UserId,
        id: ListingId,
        status: ListingStatus,
    ) -> Result<Listing>;
    async fn delete(&self, caller: UserId, id: ListingId) -> Result<()>;

    async fn categories(&self) -> Result<Vec<Category>>;

    async fn favorite_exists(&self, user: UserId, listing: ListingId) -> Result<bool>;
    async fn add_favorite(&self, user: UserId, listing: ListingId) -> Result<()>;
    async fn remove_favorite(&self, user: UserId, listing: ListingId) -> Result<()>;

    async fn unlock_exists(&self, user: UserId, listing: ListingId) -> Result<bool>;
    async fn insert_unlock(
        &self,
        user: UserId,
        listing: ListingId,
        amount_pence: i64,
    ) -> Result<Unlock>;

    /// Realtime change feed. Events may arrive in any order relative to
    /// local writes.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Binary storage for listing images.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Stores image bytes and returns a stable, dereferenceable URI.
    async fn put(&self, data: Bytes, content_type: &Mime) -> Result<String>;
    /// Retrieves previously stored bytes by URI.
    async fn fetch(&self, uri: &str) -> Result<Bytes>;
    /// Removes a blob. Unknown URIs are a benign no-op.
    async fn delete(&self, uri: &str) -> Result<()>;
}

/// The authentication collaborator: who is signed in, and a feed of
/// sign-in/sign-out transitions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthSessions: Send + Sync {
    async fn current_user(&self) -> Option<UserId>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

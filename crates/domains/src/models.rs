//! # Domain Models
//!
//! These structs represent the core entities of the PoundTrades catalog.
//! We use UUID v7 for time-ordered, globally unique identification; ids and
//! created timestamps are assigned by the listing source, never by clients.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use mime::Mime;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type ListingId = Uuid;
pub type CategoryId = Uuid;

/// Canonical listing lifecycle state.
///
/// Backends disagree on the literal strings ("active" vs "available",
/// "suspended" vs "removed"); adapters collapse whatever their store uses
/// onto this tri-state at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Pending,
    Suspended,
}

/// Who is selling. Carried as data; only affects presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellerType {
    Public,
    Tradesman,
    Business,
}

/// A category reference as it occurs in listing rows: either a proper id
/// reference or a legacy free-text display name. Neither form is
/// authoritative; matching resolves both (see `query::CategoryFilter`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryRef {
    Id(CategoryId),
    Name(String),
}

/// Optional coordinate pair attached to a listing's free-text location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A single sellable item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    /// The creating user. A listing always has exactly one owner.
    pub owner: UserId,
    pub title: String,
    pub description: String,
    /// Price in integer pence. Invariant: >= 0.
    pub price_pence: i64,
    pub category: CategoryRef,
    /// Zero or more opaque image URIs.
    pub images: Vec<String>,
    pub location: Option<String>,
    pub coords: Option<GeoPoint>,
    /// Seller contact details. Access-gated by unlocks at the UI layer.
    pub contact: String,
    pub seller_type: SellerType,
    pub status: ListingStatus,
    /// Affects sort order only.
    pub boosted: bool,
    /// Assigned by the source, immutable.
    pub created_at: DateTime<Utc>,
    /// Bumped by the source on every write; last-write-wins comparisons
    /// between local patches and change-feed events use this.
    pub updated_at: DateTime<Utc>,
}

/// A mapping from a stable id to a display name. Read-mostly; fetched once
/// per session and treated as immutable for the session lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

static ALL_CATEGORY: Lazy<Category> = Lazy::new(|| Category {
    id: Uuid::nil(),
    name: "All".to_string(),
    description: None,
});

impl Category {
    /// The client-synthesized pseudo-category meaning "no category filter".
    /// Never persisted.
    pub fn all() -> &'static Category {
        &ALL_CATEGORY
    }
}

/// A user-listing bookmark relation, unique per (user, listing) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub user: UserId,
    pub listing: ListingId,
    pub created_at: DateTime<Utc>,
}

/// A paid grant of visibility into a listing's contact details. Never
/// mutated, never deleted by normal flow; duplicates per pair are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unlock {
    pub id: Uuid,
    pub user: UserId,
    pub listing: ListingId,
    pub amount_pence: i64,
    pub created_at: DateTime<Utc>,
}

/// An image as it arrives from a screen: raw bytes still to be uploaded, or
/// a URI that already points into blob storage.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes { data: Bytes, content_type: Mime },
    Uri(String),
}

/// Raw create-form input, exactly as captured. The price stays a string so
/// validation can preserve the form's "parseable" check and message order.
#[derive(Debug, Clone)]
pub struct NewListingData {
    pub title: String,
    pub description: String,
    pub price: String,
    pub category: CategoryRef,
    pub images: Vec<ImageSource>,
    pub location: Option<String>,
    pub coords: Option<GeoPoint>,
    pub contact: String,
    pub seller_type: SellerType,
    pub boost: bool,
}

/// A validated listing record ready for the source, image URIs resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListingRecord {
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub price_pence: i64,
    pub category: CategoryRef,
    pub images: Vec<String>,
    pub location: Option<String>,
    pub coords: Option<GeoPoint>,
    pub contact: String,
    pub seller_type: SellerType,
    pub boosted: bool,
}

/// Partial field edit applied by a listing's owner. Status changes go
/// through `set_status` instead; they are never an implicit side effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_pence: Option<i64>,
    pub category: Option<CategoryRef>,
    pub images: Option<Vec<String>>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub seller_type: Option<SellerType>,
    pub boosted: Option<bool>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price_pence.is_none()
            && self.category.is_none()
            && self.images.is_none()
            && self.location.is_none()
            && self.contact.is_none()
            && self.seller_type.is_none()
            && self.boosted.is_none()
    }

    /// Applies the patch to a listing in place. The source is responsible
    /// for bumping `updated_at`; this mirrors its application locally.
    pub fn apply(&self, listing: &mut Listing) {
        if let Some(v) = &self.title {
            listing.title = v.clone();
        }
        if let Some(v) = &self.description {
            listing.description = v.clone();
        }
        if let Some(v) = self.price_pence {
            listing.price_pence = v;
        }
        if let Some(v) = &self.category {
            listing.category = v.clone();
        }
        if let Some(v) = &self.images {
            listing.images = v.clone();
        }
        if let Some(v) = &self.location {
            listing.location = Some(v.clone());
        }
        if let Some(v) = &self.contact {
            listing.contact = v.clone();
        }
        if let Some(v) = self.seller_type {
            listing.seller_type = v;
        }
        if let Some(v) = self.boosted {
            listing.boosted = v;
        }
    }
}

/// Which table a change-feed event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Listings,
    Favorites,
    Unlocks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A change notification from the listing source's realtime feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    /// Row identity: the listing id for `Listings`, the listing id the
    /// relation points at for `Favorites`/`Unlocks`.
    pub affected: Uuid,
    /// Source-side timestamp of the write; carries last-write-wins.
    pub at: DateTime<Utc>,
}

/// Sign-in/sign-out transition from the authentication collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(UserId),
    SignedOut(UserId),
}

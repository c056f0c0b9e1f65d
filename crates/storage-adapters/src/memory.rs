//! In-memory listing source and media store.
//!
//! The canonical reference backend: always available, used by the test
//! suites and as the offline inventory the storefront falls back to when no
//! hosted backend is configured. Emits the same change events a hosted feed
//! would, so the catalog service is exercised identically.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use mime::Mime;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use uuid::Uuid;

use domains::{
    rank, CatalogError, Category, ChangeEvent, ChangeOp, ChangeTable, Favorite,
    Listing, ListingId, ListingPatch, ListingSource, ListingStatus, MediaStorage,
    NewListingRecord, Result, Scope, SourceQuery, Unlock, UserId,
};

pub struct MemoryListingSource {
    listings: DashMap<ListingId, Listing>,
    favorites: DashMap<(UserId, ListingId), Favorite>,
    unlocks: Mutex<Vec<Unlock>>,
    /// user id → is_admin
    users: DashMap<UserId, bool>,
    categories: Vec<Category>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryListingSource {
    pub fn new(categories: Vec<Category>) -> Self {
        MemoryListingSource {
            listings: DashMap::new(),
            favorites: DashMap::new(),
            unlocks: Mutex::new(Vec::new()),
            users: DashMap::new(),
            categories,
            events: broadcast::channel(64).0,
        }
    }

    pub fn register_user(&self, user: UserId, is_admin: bool) {
        self.users.insert(user, is_admin);
    }

    /// Inserts a fully formed row without emitting a change event. Test and
    /// seed plumbing; regular creation goes through `insert`.
    pub fn seed_listing(&self, listing: Listing) {
        self.listings.insert(listing.id, listing);
    }

    fn is_admin(&self, user: UserId) -> bool {
        self.users.get(&user).map(|r| *r).unwrap_or(false)
    }

    fn emit(&self, table: ChangeTable, op: ChangeOp, affected: Uuid) {
        // send only fails when nobody subscribed, which is fine
        let _ = self.events.send(ChangeEvent { table, op, affected, at: Utc::now() });
    }
}

#[async_trait]
impl ListingSource for MemoryListingSource {
    async fn query(&self, query: &SourceQuery) -> Result<Vec<Listing>> {
        let mut rows: Vec<Listing> = self
            .listings
            .iter()
            .filter(|entry| query.admits(entry.value()))
            .filter(|entry| match query.scope {
                Scope::FavoritesOf(user) => {
                    self.favorites.contains_key(&(user, entry.value().id))
                }
                _ => true,
            })
            .map(|entry| entry.value().clone())
            .collect();
        rank(&mut rows, query.sort);
        Ok(rows)
    }

    async fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        Ok(self.listings.get(&id).map(|r| r.value().clone()))
    }

    async fn insert(&self, record: &NewListingRecord) -> Result<Listing> {
        let now = Utc::now();
        let listing = Listing {
            id: Uuid::now_v7(),
            owner: record.owner,
            title: record.title.clone(),
            description: record.description.clone(),
            price_pence: record.price_pence,
            category: record.category.clone(),
            images: record.images.clone(),
            location: record.location.clone(),
            coords: record.coords,
            contact: record.contact.clone(),
            seller_type: record.seller_type,
            status: ListingStatus::Available,
            boosted: record.boosted,
            created_at: now,
            updated_at: now,
        };
        self.listings.insert(listing.id, listing.clone());
        self.emit(ChangeTable::Listings, ChangeOp::Insert, listing.id);
        Ok(listing)
    }

    async fn update(
        &self,
        caller: UserId,
        id: ListingId,
        patch: &ListingPatch,
    ) -> Result<Listing> {
        let mut entry = self
            .listings
            .get_mut(&id)
            .ok_or_else(|| CatalogError::not_found("listing", id))?;
        if entry.owner != caller {
            return Err(CatalogError::Unauthorized(
                "only the owner can edit a listing".to_string(),
            ));
        }
        patch.apply(entry.value_mut());
        entry.updated_at = Utc::now();
        let updated = entry.value().clone();
        drop(entry);
        self.emit(ChangeTable::Listings, ChangeOp::Update, id);
        Ok(updated)
    }

    async fn set_status(
        &self,
        caller: UserId,
        id: ListingId,
        status: ListingStatus,
    ) -> Result<Listing> {
        let mut entry = self
            .listings
            .get_mut(&id)
            .ok_or_else(|| CatalogError::not_found("listing", id))?;
        if entry.owner != caller && !self.is_admin(caller) {
            return Err(CatalogError::Unauthorized(
                "only the owner or an admin can change a listing's status".to_string(),
            ));
        }
        entry.status = status;
        entry.updated_at = Utc::now();
        let updated = entry.value().clone();
        drop(entry);
        self.emit(ChangeTable::Listings, ChangeOp::Update, id);
        Ok(updated)
    }

    async fn delete(&self, caller: UserId, id: ListingId) -> Result<()> {
        let Some(entry) = self.listings.get(&id) else {
            return Err(CatalogError::not_found("listing", id));
        };
        if entry.owner != caller {
            return Err(CatalogError::Unauthorized(
                "only the owner can delete a listing".to_string(),
            ));
        }
        drop(entry);
        // Favorites pointing here go dangling; views joining through them
        // treat the missing listing as absent.
        self.listings.remove(&id);
        self.emit(ChangeTable::Listings, ChangeOp::Delete, id);
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let mut cats = self.categories.clone();
        cats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cats)
    }

    async fn favorite_exists(&self, user: UserId, listing: ListingId) -> Result<bool> {
        Ok(self.favorites.contains_key(&(user, listing)))
    }

    async fn add_favorite(&self, user: UserId, listing: ListingId) -> Result<()> {
        if !self.listings.contains_key(&listing) {
            return Err(CatalogError::not_found("listing", listing));
        }
        self.favorites.insert(
            (user, listing),
            Favorite { user, listing, created_at: Utc::now() },
        );
        self.emit(ChangeTable::Favorites, ChangeOp::Insert, listing);
        Ok(())
    }

    async fn remove_favorite(&self, user: UserId, listing: ListingId) -> Result<()> {
        if self.favorites.remove(&(user, listing)).is_none() {
            return Err(CatalogError::not_found("favorite", listing));
        }
        self.emit(ChangeTable::Favorites, ChangeOp::Delete, listing);
        Ok(())
    }

    async fn unlock_exists(&self, user: UserId, listing: ListingId) -> Result<bool> {
        let unlocks = self.unlocks.lock().unwrap();
        Ok(unlocks.iter().any(|u| u.user == user && u.listing == listing))
    }

    async fn insert_unlock(
        &self,
        user: UserId,
        listing: ListingId,
        amount_pence: i64,
    ) -> Result<Unlock> {
        let unlock = Unlock {
            id: Uuid::now_v7(),
            user,
            listing,
            amount_pence,
            created_at: Utc::now(),
        };
        // No uniqueness constraint: duplicate unlocks are tolerated.
        self.unlocks.lock().unwrap().push(unlock.clone());
        self.emit(ChangeTable::Unlocks, ChangeOp::Insert, listing);
        Ok(unlock)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

/// Blob store backed by a map; URIs are content hashes under `mem://`.
#[derive(Default)]
pub struct MemoryMediaStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaStorage for MemoryMediaStore {
    async fn put(&self, data: Bytes, _content_type: &Mime) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(&data);
        let uri = format!("mem://{}", hex::encode(hasher.finalize()));
        self.blobs.insert(uri.clone(), data);
        Ok(uri)
    }

    async fn fetch(&self, uri: &str) -> Result<Bytes> {
        self.blobs
            .get(uri)
            .map(|b| b.value().clone())
            .ok_or_else(|| CatalogError::not_found("blob", uri))
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        self.blobs.remove(uri);
        Ok(())
    }
}

//! # SQLite listing source
//!
//! Implements the data mapping between the relational model and the
//! canonical `domains` types, and translates `SourceQuery` predicates into
//! SQL. This module is the single point where backend representation
//! quirks are absorbed: status literals (`active` vs `available`,
//! `removed` vs `suspended`), category columns holding either a category
//! id or a legacy free-text name, and image columns holding either a JSON
//! array or a bare single URL.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tokio::sync::broadcast;
use uuid::Uuid;

use domains::{
    CatalogError, Category, ChangeEvent, ChangeOp, ChangeTable, GeoPoint, Listing,
    ListingId, ListingPatch, ListingSource, ListingStatus, NewListingRecord,
    Result, Scope, SellerType, SortOrder, SourceQuery, Unlock, UserId,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    id          BLOB PRIMARY KEY,
    owner       BLOB NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    price_pence INTEGER NOT NULL,
    category    TEXT NOT NULL,
    images      TEXT NOT NULL,
    location    TEXT,
    lat         REAL,
    lng         REAL,
    contact     TEXT NOT NULL,
    seller_type TEXT NOT NULL,
    status      TEXT NOT NULL,
    boosted     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS categories (
    id          BLOB PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT
);
CREATE TABLE IF NOT EXISTS favorites (
    user        BLOB NOT NULL,
    listing     BLOB NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (user, listing)
);
CREATE TABLE IF NOT EXISTS unlocks (
    id           BLOB PRIMARY KEY,
    user         BLOB NOT NULL,
    listing      BLOB NOT NULL,
    amount_pence INTEGER NOT NULL,
    created_at   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS users (
    id       BLOB PRIMARY KEY,
    is_admin INTEGER NOT NULL DEFAULT 0
);
"#;

// Helpers for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

/// Canonical literal written on every store.
fn status_to_str(status: ListingStatus) -> &'static str {
    match status {
        ListingStatus::Available => "available",
        ListingStatus::Pending => "pending",
        ListingStatus::Suspended => "suspended",
    }
}

/// Reads tolerate every literal the app variants ever wrote.
fn status_from_str(raw: &str) -> Result<ListingStatus> {
    match raw {
        "available" | "active" => Ok(ListingStatus::Available),
        "pending" => Ok(ListingStatus::Pending),
        "suspended" | "removed" => Ok(ListingStatus::Suspended),
        other => Err(CatalogError::Internal(format!(
            "unknown listing status literal {other:?}"
        ))),
    }
}

fn seller_type_to_str(seller_type: SellerType) -> &'static str {
    match seller_type {
        SellerType::Public => "public",
        SellerType::Tradesman => "tradesman",
        SellerType::Business => "business",
    }
}

fn seller_type_from_str(raw: &str) -> SellerType {
    match raw {
        "tradesman" => SellerType::Tradesman,
        "business" => SellerType::Business,
        _ => SellerType::Public,
    }
}

/// The category column holds either a stringified category id or a legacy
/// free-text display name; neither form is authoritative.
fn category_to_column(cat: &domains::CategoryRef) -> String {
    match cat {
        domains::CategoryRef::Id(id) => id.to_string(),
        domains::CategoryRef::Name(name) => name.clone(),
    }
}

fn category_from_column(raw: &str) -> domains::CategoryRef {
    match Uuid::parse_str(raw) {
        Ok(id) => domains::CategoryRef::Id(id),
        Err(_) => domains::CategoryRef::Name(raw.to_string()),
    }
}

/// Image columns are a JSON array in current rows and a bare URL in rows
/// written by the oldest app variant.
fn images_from_column(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(images) => images,
        Err(_) if raw.trim().is_empty() => Vec::new(),
        Err(_) => vec![raw.to_string()],
    }
}

fn listing_from_row(row: &SqliteRow) -> Result<Listing> {
    let lat: Option<f64> = row.get("lat");
    let lng: Option<f64> = row.get("lng");
    Ok(Listing {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        owner: blob_to_uuid(row.get::<Vec<u8>, _>("owner").as_slice()),
        title: row.get("title"),
        description: row.get("description"),
        price_pence: row.get("price_pence"),
        category: category_from_column(&row.get::<String, _>("category")),
        images: images_from_column(&row.get::<String, _>("images")),
        location: row.get("location"),
        coords: match (lat, lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        },
        contact: row.get("contact"),
        seller_type: seller_type_from_str(&row.get::<String, _>("seller_type")),
        status: status_from_str(&row.get::<String, _>("status"))?,
        boosted: row.get("boosted"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn db_err(err: sqlx::Error) -> CatalogError {
    match &err {
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            CatalogError::Conflict(err.to_string())
        }
        _ => CatalogError::Transient(err.to_string()),
    }
}

pub struct SqliteListingSource {
    pool: SqlitePool,
    events: broadcast::Sender<ChangeEvent>,
}

impl SqliteListingSource {
    /// Opens (or creates) the catalog database and ensures the schema.
    /// `sqlite::memory:` works; the pool is capped at one connection so an
    /// in-memory database is shared.
    pub async fn new(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(db_err)?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await.map_err(db_err)?;
        tracing::debug!(url, "sqlite catalog ready");
        Ok(SqliteListingSource { pool, events: broadcast::channel(64).0 })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn register_user(&self, user: UserId, is_admin: bool) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO users (id, is_admin) VALUES (?, ?)")
            .bind(uuid_to_blob(user))
            .bind(is_admin)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn put_category(&self, category: &Category) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO categories (id, name, description) VALUES (?, ?, ?)")
            .bind(uuid_to_blob(category.id))
            .bind(&category.name)
            .bind(&category.description)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn fetch_by_id(&self, id: ListingId) -> Result<Option<Listing>> {
        let row = sqlx::query("SELECT * FROM listings WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(listing_from_row).transpose()
    }

    async fn is_admin(&self, user: UserId) -> Result<bool> {
        let row = sqlx::query("SELECT is_admin FROM users WHERE id = ?")
            .bind(uuid_to_blob(user))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|r| r.get::<bool, _>("is_admin")).unwrap_or(false))
    }

    async fn store(&self, listing: &Listing) -> Result<()> {
        sqlx::query(
            "UPDATE listings SET title = ?, description = ?, price_pence = ?, \
             category = ?, images = ?, location = ?, lat = ?, lng = ?, \
             contact = ?, seller_type = ?, status = ?, boosted = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price_pence)
        .bind(category_to_column(&listing.category))
        .bind(serde_json::to_string(&listing.images).unwrap_or_default())
        .bind(&listing.location)
        .bind(listing.coords.map(|c| c.lat))
        .bind(listing.coords.map(|c| c.lng))
        .bind(&listing.contact)
        .bind(seller_type_to_str(listing.seller_type))
        .bind(status_to_str(listing.status))
        .bind(listing.boosted)
        .bind(listing.updated_at)
        .bind(uuid_to_blob(listing.id))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    fn emit(&self, table: ChangeTable, op: ChangeOp, affected: Uuid) {
        let _ = self.events.send(ChangeEvent { table, op, affected, at: Utc::now() });
    }
}

#[async_trait]
impl ListingSource for SqliteListingSource {
    /// Predicate translation: term → LIKE over title/description,
    /// category → id or legacy-name equality, location → LIKE, price →
    /// inclusive range, scope → owner column / favorites join.
    async fn query(&self, query: &SourceQuery) -> Result<Vec<Listing>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT l.* FROM listings l");

        if let Scope::FavoritesOf(user) = query.scope {
            qb.push(" JOIN favorites f ON f.listing = l.id AND f.user = ");
            qb.push_bind(uuid_to_blob(user));
        }

        qb.push(" WHERE l.status IN (");
        {
            let mut statuses = qb.separated(", ");
            for status in &query.statuses {
                statuses.push_bind(status_to_str(*status));
            }
            // legacy literals for the same states
            for status in &query.statuses {
                let legacy = match status {
                    ListingStatus::Available => "active",
                    ListingStatus::Suspended => "removed",
                    ListingStatus::Pending => continue,
                };
                statuses.push_bind(legacy);
            }
        }
        qb.push(")");

        if let Scope::ByOwner(owner) = query.scope {
            qb.push(" AND l.owner = ");
            qb.push_bind(uuid_to_blob(owner));
        }

        if let Some(term) = &query.term {
            let pattern = format!("%{}%", term.to_lowercase());
            qb.push(" AND (lower(l.title) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR lower(l.description) LIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }

        if let Some(filter) = &query.category {
            qb.push(" AND (");
            let mut matched = false;
            if let Some(id) = filter.id {
                qb.push("l.category = ");
                qb.push_bind(id.to_string());
                matched = true;
            }
            if let Some(name) = &filter.name {
                if matched {
                    qb.push(" OR ");
                }
                qb.push("lower(l.category) = ");
                qb.push_bind(name.to_lowercase());
                matched = true;
            }
            if !matched {
                qb.push("0");
            }
            qb.push(")");
        }

        if let Some(location) = &query.location {
            qb.push(" AND lower(coalesce(l.location, '')) LIKE ");
            qb.push_bind(format!("%{}%", location.to_lowercase()));
        }

        if let Some(min) = query.price_min {
            qb.push(" AND l.price_pence >= ");
            qb.push_bind(min);
        }
        if let Some(max) = query.price_max {
            qb.push(" AND l.price_pence <= ");
            qb.push_bind(max);
        }

        qb.push(" ORDER BY l.boosted DESC, ");
        qb.push(match query.sort {
            SortOrder::RecencyDesc => "l.created_at DESC",
            SortOrder::PriceAsc => "l.price_pence ASC",
            SortOrder::PriceDesc => "l.price_pence DESC",
        });
        qb.push(", l.id ASC");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(listing_from_row).collect()
    }

    async fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        self.fetch_by_id(id).await
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
        sqlx::query(
            "INSERT INTO listings (id, owner, title, description, price_pence, \
             category, images, location, lat, lng, contact, seller_type, status, \
             boosted, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(listing.id))
        .bind(uuid_to_blob(listing.owner))
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price_pence)
        .bind(category_to_column(&listing.category))
        .bind(serde_json::to_string(&listing.images).unwrap_or_default())
        .bind(&listing.location)
        .bind(listing.coords.map(|c| c.lat))
        .bind(listing.coords.map(|c| c.lng))
        .bind(&listing.contact)
        .bind(seller_type_to_str(listing.seller_type))
        .bind(status_to_str(listing.status))
        .bind(listing.boosted)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        self.emit(ChangeTable::Listings, ChangeOp::Insert, listing.id);
        Ok(listing)
    }

    async fn update(
        &self,
        caller: UserId,
        id: ListingId,
        patch: &ListingPatch,
    ) -> Result<Listing> {
        let mut listing = self
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("listing", id))?;
        if listing.owner != caller {
            return Err(CatalogError::Unauthorized(
                "only the owner can edit a listing".to_string(),
            ));
        }
        patch.apply(&mut listing);
        listing.updated_at = Utc::now();
        self.store(&listing).await?;
        self.emit(ChangeTable::Listings, ChangeOp::Update, id);
        Ok(listing)
    }

    async fn set_status(
        &self,
        caller: UserId,
        id: ListingId,
        status: ListingStatus,
    ) -> Result<Listing> {
        let mut listing = self
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("listing", id))?;
        if listing.owner != caller && !self.is_admin(caller).await? {
            return Err(CatalogError::Unauthorized(
                "only the owner or an admin can change a listing's status".to_string(),
            ));
        }
        listing.status = status;
        listing.updated_at = Utc::now();
        self.store(&listing).await?;
        self.emit(ChangeTable::Listings, ChangeOp::Update, id);
        Ok(listing)
    }

    async fn delete(&self, caller: UserId, id: ListingId) -> Result<()> {
        let listing = self
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("listing", id))?;
        if listing.owner != caller {
            return Err(CatalogError::Unauthorized(
                "only the owner can delete a listing".to_string(),
            ));
        }
        sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        self.emit(ChangeTable::Listings, ChangeOp::Delete, id);
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, description FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
                name: row.get("name"),
                description: row.get("description"),
            })
            .collect())
    }

    async fn favorite_exists(&self, user: UserId, listing: ListingId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM favorites WHERE user = ? AND listing = ?")
            .bind(uuid_to_blob(user))
            .bind(uuid_to_blob(listing))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn add_favorite(&self, user: UserId, listing: ListingId) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO favorites (user, listing, created_at) VALUES (?, ?, ?)",
        )
        .bind(uuid_to_blob(user))
        .bind(uuid_to_blob(listing))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        self.emit(ChangeTable::Favorites, ChangeOp::Insert, listing);
        Ok(())
    }

    async fn remove_favorite(&self, user: UserId, listing: ListingId) -> Result<()> {
        let done = sqlx::query("DELETE FROM favorites WHERE user = ? AND listing = ?")
            .bind(uuid_to_blob(user))
            .bind(uuid_to_blob(listing))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(CatalogError::not_found("favorite", listing));
        }
        self.emit(ChangeTable::Favorites, ChangeOp::Delete, listing);
        Ok(())
    }

    async fn unlock_exists(&self, user: UserId, listing: ListingId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM unlocks WHERE user = ? AND listing = ? LIMIT 1")
            .bind(uuid_to_blob(user))
            .bind(uuid_to_blob(listing))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
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
        sqlx::query(
            "INSERT INTO unlocks (id, user, listing, amount_pence, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(unlock.id))
        .bind(uuid_to_blob(user))
        .bind(uuid_to_blob(listing))
        .bind(amount_pence)
        .bind(unlock.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        self.emit(ChangeTable::Unlocks, ChangeOp::Insert, listing);
        Ok(unlock)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

//! # Catalog Service
//!
//! Orchestrates the flow between query specifications, the cache-entry map,
//! and the listing source. All suspension happens at remote boundaries; the
//! entry map is the only shared mutable state and is never exposed.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;

use domains::{
    rank, AuthEvent, CatalogError, Category, ChangeEvent, ChangeOp, ChangeTable,
    ImageSource, Listing, ListingId, ListingPatch, ListingSource, ListingStatus,
    MediaStorage, NewListingData, NewListingRecord, QuerySpec, Result, Scope,
    Unlock, UserId,
};

use crate::cache::{CacheEntry, CatalogPage, EntryState};
use crate::validate;

/// Runtime knobs. The defaults mirror the storefront's de facto policy:
/// entries stay fresh until something invalidates them, and navigation
/// focus events call `refresh` explicitly.
#[derive(Debug, Clone)]
pub struct CatalogTuning {
    /// Time-based staleness; `None` means fresh until invalidated.
    pub ttl: Option<Duration>,
    /// Cap on cached query specifications; least-recently-used beyond it.
    pub max_entries: usize,
    /// Bound on every remote call. Timeouts surface as `Transient`.
    pub remote_timeout: Duration,
}

impl Default for CatalogTuning {
    fn default() -> Self {
        CatalogTuning {
            ttl: None,
            max_entries: 100,
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// The client-local listing store.
pub struct CatalogService {
    source: Arc<dyn ListingSource>,
    media: Arc<dyn MediaStorage>,
    tuning: CatalogTuning,
    cache: DashMap<QuerySpec, CacheEntry>,
    /// Categories are fetched once per session and treated as immutable.
    categories: OnceCell<Vec<Category>>,
    /// In-flight favorite toggles, keyed per (user, listing). A second
    /// toggle for a key joins the first call's outcome instead of racing it.
    toggles: DashMap<(UserId, ListingId), broadcast::Sender<Result<bool>>>,
}

impl CatalogService {
    pub fn new(
        source: Arc<dyn ListingSource>,
        media: Arc<dyn MediaStorage>,
        tuning: CatalogTuning,
    ) -> Self {
        CatalogService {
            source,
            media,
            tuning,
            cache: DashMap::new(),
            categories: OnceCell::new(),
            toggles: DashMap::new(),
        }
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Returns the view described by `spec`, from cache when fresh.
    pub async fn fetch(&self, spec: &QuerySpec) -> CatalogPage {
        let spec = spec.clone().normalized();
        if let Some(mut entry) = self.cache.get_mut(&spec) {
            if entry.state == EntryState::Fresh && !self.expired(&entry) {
                entry.last_used = Instant::now();
                tracing::debug!(scope = ?spec.scope, "cache hit");
                return entry.page(None);
            }
        }
        self.refresh_normalized(spec).await
    }

    /// Bypasses freshness: the screen-focus / pull-to-refresh path.
    pub async fn refresh(&self, spec: &QuerySpec) -> CatalogPage {
        self.refresh_normalized(spec.clone().normalized()).await
    }

    /// Single listing lookup; absence is an error here, unlike `delete`.
    pub async fn get(&self, id: ListingId) -> Result<Listing> {
        match self.bounded(self.source.get(id)).await? {
            Some(listing) => Ok(listing),
            None => Err(CatalogError::not_found("listing", id)),
        }
    }

    /// The session category list with the synthetic `All` entry prepended.
    pub async fn categories(&self) -> Result<Vec<Category>> {
        let cats = self.session_categories().await?;
        let mut out = Vec::with_capacity(cats.len() + 1);
        out.push(Category::all().clone());
        out.extend(cats);
        Ok(out)
    }

    async fn session_categories(&self) -> Result<Vec<Category>> {
        self.categories
            .get_or_try_init(|| async { self.bounded(self.source.categories()).await })
            .await
            .cloned()
    }

    async fn refresh_normalized(&self, spec: QuerySpec) -> CatalogPage {
        // Category filters resolve against the session category list so
        // id-referenced and legacy free-text rows both match.
        let categories = if spec.category.is_some() {
            match self.session_categories().await {
                Ok(cats) => cats,
                Err(err) => return self.fail_entry(&spec, err),
            }
        } else {
            Vec::new()
        };
        let query = spec.translate(&categories);

        // Take a generation ticket while marking the entry Loading. The
        // guard must not be held across the remote call.
        let my_generation = {
            let mut entry = self.cache.entry(spec.clone()).or_default();
            entry.state = EntryState::Loading;
            entry.generation += 1;
            entry.last_used = Instant::now();
            entry.generation
        };

        let outcome = self.bounded(self.source.query(&query)).await;

        let Some(mut entry) = self.cache.get_mut(&spec) else {
            // Evicted while in flight; nothing to reconcile against.
            return CatalogPage {
                listings: outcome.as_deref().unwrap_or_default().to_vec(),
                fetched_at: Some(Utc::now()),
                error: outcome.err(),
            };
        };
        if entry.generation != my_generation {
            // A newer request for this key started after ours; our response
            // must never overwrite its state.
            tracing::debug!(scope = ?spec.scope, "superseded response discarded");
            return entry.page(None);
        }
        match outcome {
            Ok(listings) => {
                entry.listings = listings;
                entry.fetched_at = Some(Utc::now());
                entry.state = EntryState::Fresh;
                entry.last_used = Instant::now();
                let page = entry.page(None);
                drop(entry);
                self.evict_over_cap();
                page
            }
            Err(err) => {
                tracing::warn!(scope = ?spec.scope, error = %err, "refresh failed");
                // The previously fresh value, if any, is preserved rather
                // than destroyed by a failed refresh.
                entry.state = EntryState::Error;
                entry.page(Some(err))
            }
        }
    }

    fn fail_entry(&self, spec: &QuerySpec, err: CatalogError) -> CatalogPage {
        match self.cache.get_mut(spec) {
            Some(mut entry) => {
                entry.state = EntryState::Error;
                entry.page(Some(err))
            }
            None => CatalogPage {
                listings: Vec::new(),
                fetched_at: None,
                error: Some(err),
            },
        }
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Validates locally, stores image bytes, then writes the record
    /// through. Affected cached views are invalidated before this returns,
    /// so a fetch issued afterwards reflects the new listing.
    pub async fn create(&self, owner: UserId, data: NewListingData) -> Result<Listing> {
        let draft = validate::validate_new_listing(&data)?;

        // Blob writes come first so the record only ever references stored
        // media. A failed insert can orphan a blob; that is tolerated.
        let mut images = Vec::with_capacity(data.images.len());
        for image in &data.images {
            match image {
                ImageSource::Uri(uri) => images.push(uri.clone()),
                ImageSource::Bytes { data, content_type } => {
                    let uri = self
                        .bounded(self.media.put(data.clone(), content_type))
                        .await?;
                    images.push(uri);
                }
            }
        }

        let record = NewListingRecord {
            owner,
            title: draft.title,
            description: draft.description,
            price_pence: draft.price_pence,
            category: data.category.clone(),
            images,
            location: data.location.clone(),
            coords: data.coords,
            contact: draft.contact,
            seller_type: data.seller_type,
            boosted: data.boost,
        };
        let listing = self.bounded(self.source.insert(&record)).await?;

        // Conservative: any public view and the creator's own views may
        // now admit the listing.
        self.invalidate_where(|scope| {
            matches!(scope, Scope::All) || *scope == Scope::ByOwner(owner)
        });
        tracing::info!(listing = %listing.id, "listing created");
        Ok(listing)
    }

    /// Owner field edit. The source enforces ownership; on success every
    /// cached view holding the listing is patched in place (or drops it if
    /// the patch breaks that view's predicate).
    pub async fn update(
        &self,
        caller: UserId,
        id: ListingId,
        patch: ListingPatch,
    ) -> Result<Listing> {
        if let Some(price) = patch.price_pence {
            if price < 0 {
                return Err(CatalogError::validation(
                    "price",
                    "please enter a valid price",
                ));
            }
        }
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(CatalogError::validation(
                    "title",
                    "please enter a title for your listing",
                ));
            }
        }
        let updated = self.bounded(self.source.update(caller, id, &patch)).await?;
        self.reconcile_updated(&updated);
        Ok(updated)
    }

    /// Owner- or admin-triggered status transition; never implicit.
    pub async fn set_status(
        &self,
        caller: UserId,
        id: ListingId,
        status: ListingStatus,
    ) -> Result<Listing> {
        let updated = self
            .bounded(self.source.set_status(caller, id, status))
            .await?;
        self.reconcile_updated(&updated);
        tracing::info!(listing = %id, ?status, "status changed");
        Ok(updated)
    }

    /// Idempotent: deleting an already-deleted id succeeds.
    pub async fn delete(&self, caller: UserId, id: ListingId) -> Result<()> {
        match self.bounded(self.source.delete(caller, id)).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
        self.remove_everywhere(id);
        tracing::info!(listing = %id, "listing deleted");
        Ok(())
    }

    /// Flips the favorite state, returning the new state. Two calls for
    /// the same (user, listing) pair cannot race: the second joins the
    /// first call's outcome instead of issuing remote I/O.
    pub async fn toggle_favorite(&self, user: UserId, listing: ListingId) -> Result<bool> {
        let key = (user, listing);

        let joined = self.toggles.get(&key).map(|tx| tx.subscribe());
        if let Some(mut rx) = joined {
            tracing::debug!(%listing, "joining in-flight favorite toggle");
            return match rx.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(CatalogError::Transient(
                    "favorite toggle interrupted".to_string(),
                )),
            };
        }

        let (tx, _keepalive) = broadcast::channel(1);
        self.toggles.insert(key, tx.clone());
        let outcome = self.toggle_favorite_inner(user, listing).await;
        self.toggles.remove(&key);
        let _ = tx.send(outcome.clone());
        outcome
    }

    async fn toggle_favorite_inner(
        &self,
        user: UserId,
        listing: ListingId,
    ) -> Result<bool> {
        let exists = self
            .bounded(self.source.favorite_exists(user, listing))
            .await?;
        if exists {
            match self.bounded(self.source.remove_favorite(user, listing)).await {
                Ok(()) => {}
                // Already gone remotely; the net state is what we wanted.
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
            self.remove_from_favorites_views(user, listing);
            Ok(false)
        } else {
            match self.bounded(self.source.add_favorite(user, listing)).await {
                Ok(()) => {}
                // The pair already exists; same net state, not an error.
                Err(CatalogError::Conflict(_)) => {}
                Err(err) => return Err(err),
            }
            self.invalidate_where(|scope| *scope == Scope::FavoritesOf(user));
            Ok(true)
        }
    }

    /// Whether `user` has already paid to see this listing's contact.
    /// A missing row is a benign "no", never an error.
    pub async fn check_unlocked(&self, user: UserId, listing: ListingId) -> Result<bool> {
        match self.bounded(self.source.unlock_exists(user, listing)).await {
            Ok(unlocked) => Ok(unlocked),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Records a paid unlock. Only ever invoked after an external payment
    /// confirmation; recording an already-unlocked pair again may create a
    /// duplicate row and is not an error.
    pub async fn record_unlock(
        &self,
        user: UserId,
        listing: ListingId,
        amount_pence: i64,
    ) -> Result<Unlock> {
        let unlock = self
            .bounded(self.source.insert_unlock(user, listing, amount_pence))
            .await?;
        tracing::info!(%listing, "contact unlocked");
        Ok(unlock)
    }

    // ── Invalidation & reconciliation ───────────────────────────────────

    /// Marks the entry for `spec` stale; the next fetch refetches.
    pub fn invalidate(&self, spec: &QuerySpec) {
        let spec = spec.clone().normalized();
        if let Some(mut entry) = self.cache.get_mut(&spec) {
            entry.invalidate();
        }
    }

    /// Drops freshness on every cached view.
    pub fn invalidate_all(&self) {
        for mut entry in self.cache.iter_mut() {
            entry.value_mut().invalidate();
        }
    }

    /// Number of currently cached query specifications.
    pub fn cached_views(&self) -> usize {
        self.cache.len()
    }

    /// Applies a change-feed notification. Events may arrive in any order
    /// relative to local writes; a cached row newer than the event (by
    /// source timestamp) wins.
    pub fn handle_change(&self, event: &ChangeEvent) {
        match event.table {
            ChangeTable::Listings => match event.op {
                ChangeOp::Insert => {
                    // Owner unknown from the event alone; any public or
                    // owner-scoped view may admit the new row.
                    self.invalidate_where(|scope| {
                        matches!(scope, Scope::All | Scope::ByOwner(_))
                    });
                }
                ChangeOp::Update => self.invalidate_containing(event),
                ChangeOp::Delete => self.remove_everywhere(event.affected),
            },
            ChangeTable::Favorites => {
                self.invalidate_where(|scope| matches!(scope, Scope::FavoritesOf(_)));
            }
            // No unlock view is cached.
            ChangeTable::Unlocks => {}
        }
    }

    /// Session transitions from the auth collaborator. Sign-out drops the
    /// user's scoped views entirely.
    pub fn handle_auth(&self, event: &AuthEvent) {
        if let AuthEvent::SignedOut(user) = event {
            self.cache.retain(|spec, _| match spec.scope {
                Scope::ByOwner(u) | Scope::FavoritesOf(u) => u != *user,
                Scope::All => true,
            });
            tracing::debug!(%user, "scoped views dropped on sign-out");
        }
    }

    /// Drives `handle_change` from a source subscription.
    pub fn spawn_change_listener(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<ChangeEvent>,
    ) -> JoinHandle<()> {
        let service = self;
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => service.handle_change(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "change feed lagged; all views stale");
                        service.invalidate_all();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Drives `handle_auth` from an auth subscription.
    pub fn spawn_auth_listener(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<AuthEvent>,
    ) -> JoinHandle<()> {
        let service = self;
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => service.handle_auth(&event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn invalidate_where(&self, mut pred: impl FnMut(&Scope) -> bool) {
        for mut entry in self.cache.iter_mut() {
            let scope = entry.key().scope;
            if pred(&scope) {
                entry.value_mut().invalidate();
            }
        }
    }

    fn invalidate_containing(&self, event: &ChangeEvent) {
        for mut entry in self.cache.iter_mut() {
            let holds_newer = entry
                .value()
                .listings
                .iter()
                .any(|l| l.id == event.affected && l.updated_at >= event.at);
            let holds = entry.value().listings.iter().any(|l| l.id == event.affected);
            if holds && !holds_newer {
                entry.value_mut().invalidate();
            }
        }
    }

    /// Optimistic in-place patch: every view holding the listing is
    /// updated without a refetch; views whose predicate the new revision
    /// no longer satisfies drop it instead.
    fn reconcile_updated(&self, updated: &Listing) {
        let categories = self.categories.get().cloned().unwrap_or_default();
        for mut entry in self.cache.iter_mut() {
            let spec = entry.key().clone();
            let cached = entry.value_mut();
            let Some(pos) = cached.listings.iter().position(|l| l.id == updated.id)
            else {
                continue;
            };
            // Last write wins: never roll a cached row back.
            if cached.listings[pos].updated_at > updated.updated_at {
                continue;
            }
            let query = spec.translate(&categories);
            if query.admits(updated) {
                cached.listings[pos] = updated.clone();
                rank(&mut cached.listings, spec.sort);
            } else {
                cached.listings.remove(pos);
            }
        }
    }

    fn remove_everywhere(&self, id: ListingId) {
        for mut entry in self.cache.iter_mut() {
            entry.value_mut().listings.retain(|l| l.id != id);
        }
    }

    fn remove_from_favorites_views(&self, user: UserId, listing: ListingId) {
        for mut entry in self.cache.iter_mut() {
            if entry.key().scope == Scope::FavoritesOf(user) {
                entry.value_mut().listings.retain(|l| l.id != listing);
            }
        }
    }

    // ── Plumbing ────────────────────────────────────────────────────────

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.tuning.remote_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Transient("remote call timed out".to_string())),
        }
    }

    fn expired(&self, entry: &CacheEntry) -> bool {
        let Some(ttl) = self.tuning.ttl else {
            return false;
        };
        match entry.fetched_at {
            Some(at) => {
                let age = Utc::now()
                    .signed_duration_since(at)
                    .to_std()
                    .unwrap_or_default();
                age > ttl
            }
            None => true,
        }
    }

    fn evict_over_cap(&self) {
        while self.cache.len() > self.tuning.max_entries {
            let victim = self
                .cache
                .iter()
                .filter(|e| e.value().state != EntryState::Loading)
                .min_by_key(|e| e.value().last_used)
                .map(|e| e.key().clone());
            match victim {
                Some(key) => {
                    self.cache.remove(&key);
                    tracing::debug!("evicted least-recently-used view");
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domains::{
        CategoryRef, GeoPoint, MockListingSource, MockMediaStorage, SellerType,
        SourceQuery,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    fn sample_listing(title: &str) -> Listing {
        Listing {
            id: Uuid::now_v7(),
            owner: Uuid::now_v7(),
            title: title.to_string(),
            description: "surplus stock".to_string(),
            price_pence: 1500,
            category: CategoryRef::Name("Timber".to_string()),
            images: vec!["mem://a".to_string()],
            location: Some("Edinburgh".to_string()),
            coords: Some(GeoPoint { lat: 55.95, lng: -3.19 }),
            contact: "seller@example.com".to_string(),
            seller_type: SellerType::Public,
            status: ListingStatus::Available,
            boosted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(source: MockListingSource) -> CatalogService {
        CatalogService::new(
            Arc::new(source),
            Arc::new(MockMediaStorage::new()),
            CatalogTuning::default(),
        )
    }

    #[tokio::test]
    async fn equal_specs_share_one_remote_call() {
        let mut source = MockListingSource::new();
        let listing = sample_listing("Oak beam");
        let rows = vec![listing.clone()];
        source
            .expect_query()
            .times(1)
            .returning(move |_| Ok(rows.clone()));
        let svc = service(source);

        let first = svc.fetch(&QuerySpec::all().with_term("oak")).await;
        // Same view through a different UI path: empty-vs-absent fields
        // normalize onto the same cache key.
        let second = svc
            .fetch(
                &QuerySpec::all()
                    .with_term(" oak ")
                    .with_category(CategoryRef::Name("All".into())),
            )
            .await;

        assert!(first.error.is_none() && second.error.is_none());
        assert_eq!(first.listings.len(), 1);
        assert_eq!(second.listings[0].id, listing.id);
        assert_eq!(svc.cached_views(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_preserves_previous_fresh_value() {
        let mut source = MockListingSource::new();
        let listing = sample_listing("Oak beam");
        let rows = vec![listing.clone()];
        let calls = AtomicUsize::new(0);
        source.expect_query().times(2).returning(move |_| {
            if calls.fetch_add(1, AtomicOrdering::SeqCst) == 0 {
                Ok(rows.clone())
            } else {
                Err(CatalogError::Transient("connection reset".to_string()))
            }
        });
        let svc = service(source);
        let spec = QuerySpec::all();

        let ok = svc.fetch(&spec).await;
        assert_eq!(ok.listings.len(), 1);

        let failed = svc.refresh(&spec).await;
        assert!(failed.error.as_ref().is_some_and(|e| e.is_transient()));
        // Stale data survives the failed refresh for the UI to show.
        assert_eq!(failed.listings[0].id, listing.id);
    }

    #[tokio::test]
    async fn timeout_surfaces_as_transient() {
        let source = Arc::new(GatedSource::new());
        // A gate nobody releases: the query stays pending past the bound.
        let (hold_open, gate) = oneshot::channel();
        source.gates.lock().unwrap().push_back(gate);

        let svc = CatalogService::new(
            source.clone(),
            Arc::new(MockMediaStorage::new()),
            CatalogTuning {
                remote_timeout: Duration::from_millis(20),
                ..CatalogTuning::default()
            },
        );
        let page = svc.fetch(&QuerySpec::all()).await;
        assert!(page.error.as_ref().is_some_and(|e| e.is_transient()));
        drop(hold_open);
    }

    #[tokio::test]
    async fn zero_ttl_refetches_on_every_fetch() {
        let mut source = MockListingSource::new();
        source.expect_query().times(2).returning(|_| Ok(Vec::new()));
        let svc = CatalogService::new(
            Arc::new(source),
            Arc::new(MockMediaStorage::new()),
            CatalogTuning { ttl: Some(Duration::ZERO), ..CatalogTuning::default() },
        );
        svc.fetch(&QuerySpec::all()).await;
        svc.fetch(&QuerySpec::all()).await;
    }

    #[tokio::test]
    async fn lru_cap_evicts_oldest_view() {
        let mut source = MockListingSource::new();
        source.expect_query().returning(|_| Ok(Vec::new()));
        let svc = CatalogService::new(
            Arc::new(source),
            Arc::new(MockMediaStorage::new()),
            CatalogTuning { max_entries: 2, ..CatalogTuning::default() },
        );

        svc.fetch(&QuerySpec::all()).await;
        svc.fetch(&QuerySpec::all().with_term("oak")).await;
        svc.fetch(&QuerySpec::all().with_term("brick")).await;
        assert_eq!(svc.cached_views(), 2);
    }

    /// A listing source whose `query` calls block until released, so tests
    /// can interleave two in-flight fetches deterministically.
    struct GatedSource {
        gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
        results: Mutex<VecDeque<Vec<Listing>>>,
        favorite_gate: Mutex<Option<oneshot::Receiver<()>>>,
        favorite_checks: AtomicUsize,
        favorite_adds: AtomicUsize,
        events: broadcast::Sender<ChangeEvent>,
    }

    impl GatedSource {
        fn new() -> Self {
            GatedSource {
                gates: Mutex::new(VecDeque::new()),
                results: Mutex::new(VecDeque::new()),
                favorite_gate: Mutex::new(None),
                favorite_checks: AtomicUsize::new(0),
                favorite_adds: AtomicUsize::new(0),
                events: broadcast::channel(8).0,
            }
        }
    }

    #[async_trait]
    impl ListingSource for GatedSource {
        async fn query(&self, _query: &SourceQuery) -> Result<Vec<Listing>> {
            // Pair the result with the gate at call time so each call's
            // payload binds to its call order, not to gate-release order.
            let gate = self.gates.lock().unwrap().pop_front();
            let result = self.results.lock().unwrap().pop_front().unwrap_or_default();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(result)
        }
        async fn get(&self, _id: ListingId) -> Result<Option<Listing>> {
            unimplemented!()
        }
        async fn insert(&self, _record: &NewListingRecord) -> Result<Listing> {
            unimplemented!()
        }
        async fn update(
            &self,
            _caller: UserId,
            _id: ListingId,
            _patch: &ListingPatch,
        ) -> Result<Listing> {
            unimplemented!()
        }
        async fn set_status(
            &self,
            _caller: UserId,
            _id: ListingId,
            _status: ListingStatus,
        ) -> Result<Listing> {
            unimplemented!()
        }
        async fn delete(&self, _caller: UserId, _id: ListingId) -> Result<()> {
            unimplemented!()
        }
        async fn categories(&self) -> Result<Vec<Category>> {
            Ok(Vec::new())
        }
        async fn favorite_exists(&self, _user: UserId, _listing: ListingId) -> Result<bool> {
            self.favorite_checks.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(false)
        }
        async fn add_favorite(&self, _user: UserId, _listing: ListingId) -> Result<()> {
            let gate = self.favorite_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.favorite_adds.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
        async fn remove_favorite(&self, _user: UserId, _listing: ListingId) -> Result<()> {
            unimplemented!()
        }
        async fn unlock_exists(&self, _user: UserId, _listing: ListingId) -> Result<bool> {
            unimplemented!()
        }
        async fn insert_unlock(
            &self,
            _user: UserId,
            _listing: ListingId,
            _amount_pence: i64,
        ) -> Result<Unlock> {
            unimplemented!()
        }
        fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
            self.events.subscribe()
        }
    }

    #[tokio::test]
    async fn superseded_fetch_response_is_discarded() {
        let source = Arc::new(GatedSource::new());
        let first_rows = vec![sample_listing("stale answer")];
        let second_rows = vec![sample_listing("current answer")];
        let (release_first, gate_first) = oneshot::channel();
        let (release_second, gate_second) = oneshot::channel();
        {
            let mut gates = source.gates.lock().unwrap();
            gates.push_back(gate_first);
            gates.push_back(gate_second);
            let mut results = source.results.lock().unwrap();
            results.push_back(first_rows);
            results.push_back(second_rows.clone());
        }

        let svc = Arc::new(CatalogService::new(
            source.clone(),
            Arc::new(MockMediaStorage::new()),
            CatalogTuning::default(),
        ));
        let spec = QuerySpec::all();

        let svc1 = Arc::clone(&svc);
        let spec1 = spec.clone();
        let fetch1 = tokio::spawn(async move { svc1.fetch(&spec1).await });
        tokio::task::yield_now().await;
        let svc2 = Arc::clone(&svc);
        let spec2 = spec.clone();
        let fetch2 = tokio::spawn(async move { svc2.fetch(&spec2).await });
        tokio::task::yield_now().await;

        // Resolve the newer request first, then the superseded one.
        release_second.send(()).unwrap();
        let page2 = fetch2.await.unwrap();
        release_first.send(()).unwrap();
        let page1 = fetch1.await.unwrap();

        assert_eq!(page2.listings[0].title, "current answer");
        // The first caller sees the entry's current (newer) state, and the
        // cache never rolls back to call 1's data.
        assert_eq!(page1.listings[0].title, "current answer");
        let cached = svc.fetch(&spec).await;
        assert_eq!(cached.listings[0].title, "current answer");
        assert_eq!(cached.listings.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_favorite_toggles_join_into_one_flip() {
        let source = Arc::new(GatedSource::new());
        let (release, gate) = oneshot::channel();
        *source.favorite_gate.lock().unwrap() = Some(gate);

        let svc = Arc::new(CatalogService::new(
            source.clone(),
            Arc::new(MockMediaStorage::new()),
            CatalogTuning::default(),
        ));
        let user = Uuid::now_v7();
        let listing = Uuid::now_v7();

        let svc1 = Arc::clone(&svc);
        let first = tokio::spawn(async move { svc1.toggle_favorite(user, listing).await });
        tokio::task::yield_now().await;
        let svc2 = Arc::clone(&svc);
        let second = tokio::spawn(async move { svc2.toggle_favorite(user, listing).await });
        tokio::task::yield_now().await;

        release.send(()).unwrap();
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        // Exactly one net flip: both callers observe the same outcome and
        // the source saw a single check and a single insert.
        assert!(first && second);
        assert_eq!(source.favorite_checks.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(source.favorite_adds.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_validates_before_any_remote_call() {
        // No expectations set: any remote call would panic the mock.
        let svc = service(MockListingSource::new());
        let data = NewListingData {
            title: String::new(),
            description: "x".to_string(),
            price: "15".to_string(),
            category: CategoryRef::Name("Timber".to_string()),
            images: vec![ImageSource::Uri("mem://a".to_string())],
            location: None,
            coords: None,
            contact: "x@x.com".to_string(),
            seller_type: SellerType::Public,
            boost: false,
        };
        let err = svc.create(Uuid::now_v7(), data).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "title", .. }));
    }
}

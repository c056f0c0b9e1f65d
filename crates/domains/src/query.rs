//! # Query Specification
//!
//! An immutable, value-comparable description of a requested listing view.
//! Equality is the cache key, so construction normalizes semantically
//! identical inputs (empty search box, the "All" pseudo-category) onto one
//! representation. No I/O, no failure modes.

use serde::{Deserialize, Serialize};

use crate::models::{
    Category, CategoryId, CategoryRef, Listing, ListingStatus, UserId,
};

/// Which slice of the catalog a view asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The public feed.
    All,
    /// A user's own listings ("my listings" dashboard).
    ByOwner(UserId),
    /// Listings the user has bookmarked.
    FavoritesOf(UserId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    RecencyDesc,
    PriceAsc,
    PriceDesc,
}

/// Immutable description of a requested view. Two specifications are equal
/// iff all fields are equal; construct via the builder methods so raw
/// screen input is normalized before it becomes a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySpec {
    pub term: Option<String>,
    pub category: Option<CategoryRef>,
    pub location: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub scope: Scope,
    pub sort: SortOrder,
}

impl QuerySpec {
    pub fn all() -> Self {
        Self::scoped(Scope::All)
    }

    pub fn by_owner(user: UserId) -> Self {
        Self::scoped(Scope::ByOwner(user))
    }

    pub fn favorites_of(user: UserId) -> Self {
        Self::scoped(Scope::FavoritesOf(user))
    }

    pub fn scoped(scope: Scope) -> Self {
        QuerySpec {
            term: None,
            category: None,
            location: None,
            price_min: None,
            price_max: None,
            scope,
            sort: SortOrder::default(),
        }
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self.normalized()
    }

    pub fn with_category(mut self, category: CategoryRef) -> Self {
        self.category = Some(category);
        self.normalized()
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self.normalized()
    }

    /// Inclusive price bounds, in pence. Either end may be open.
    pub fn with_price_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.price_min = min;
        self.price_max = max;
        self
    }

    pub fn sorted_by(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Collapses UI sentinels onto one cache-key representation:
    /// whitespace-only term/location become "no filter", and the synthetic
    /// "All" category (by id or by name, any casing) becomes "no filter".
    pub fn normalized(mut self) -> Self {
        self.term = self.term.and_then(non_empty);
        self.location = self.location.and_then(non_empty);
        self.category = self.category.filter(|c| !is_all_sentinel(c));
        self
    }

    /// Which statuses the view shows. Owner-scoped views keep every status
    /// so sellers can see a suspension; public and favorites views show
    /// available listings only.
    pub fn visible_statuses(&self) -> &'static [ListingStatus] {
        match self.scope {
            Scope::ByOwner(_) => &[
                ListingStatus::Available,
                ListingStatus::Pending,
                ListingStatus::Suspended,
            ],
            Scope::All | Scope::FavoritesOf(_) => &[ListingStatus::Available],
        }
    }

    /// Translates the spec into the predicate handed to a listing source,
    /// resolving the category filter against the session category list so
    /// both id-referenced and legacy free-text rows match.
    pub fn translate(&self, categories: &[Category]) -> SourceQuery {
        SourceQuery {
            term: self.term.clone(),
            category: self
                .category
                .as_ref()
                .map(|c| CategoryFilter::resolve(c, categories)),
            location: self.location.clone(),
            price_min: self.price_min,
            price_max: self.price_max,
            scope: self.scope,
            statuses: self.visible_statuses().to_vec(),
            sort: self.sort,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_all_sentinel(c: &CategoryRef) -> bool {
    match c {
        CategoryRef::Id(id) => *id == Category::all().id,
        CategoryRef::Name(name) => name.trim().eq_ignore_ascii_case("All"),
    }
}

/// A category filter resolved into both forms a listing row might carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub id: Option<CategoryId>,
    pub name: Option<String>,
}

impl CategoryFilter {
    /// Resolves a tagged reference against the category list. An unknown
    /// name degrades to legacy free-text matching; an unknown id matches
    /// id-referenced rows only.
    pub fn resolve(cat: &CategoryRef, categories: &[Category]) -> CategoryFilter {
        match cat {
            CategoryRef::Id(id) => CategoryFilter {
                id: Some(*id),
                name: categories
                    .iter()
                    .find(|c| c.id == *id)
                    .map(|c| c.name.clone()),
            },
            CategoryRef::Name(name) => CategoryFilter {
                id: categories
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                    .map(|c| c.id),
                name: Some(name.clone()),
            },
        }
    }

    pub fn matches(&self, cat: &CategoryRef) -> bool {
        match cat {
            CategoryRef::Id(id) => self.id == Some(*id),
            CategoryRef::Name(name) => self
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name)),
        }
    }
}

/// The translated predicate a listing source executes. Scope membership
/// (owner column, favorites join) is the source's job; everything else is
/// decidable per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub term: Option<String>,
    pub category: Option<CategoryFilter>,
    pub location: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub scope: Scope,
    pub statuses: Vec<ListingStatus>,
    pub sort: SortOrder,
}

impl SourceQuery {
    /// Row-local admission test: content filters plus status visibility,
    /// plus the owner check for owner-scoped queries. Favorites membership
    /// is not decidable here.
    pub fn admits(&self, listing: &Listing) -> bool {
        if !self.statuses.contains(&listing.status) {
            return false;
        }
        if let Scope::ByOwner(owner) = self.scope {
            if listing.owner != owner {
                return false;
            }
        }
        if let Some(term) = &self.term {
            let needle = term.to_lowercase();
            let in_title = listing.title.to_lowercase().contains(&needle);
            let in_description = listing.description.to_lowercase().contains(&needle);
            if !in_title && !in_description {
                return false;
            }
        }
        if let Some(filter) = &self.category {
            if !filter.matches(&listing.category) {
                return false;
            }
        }
        if let Some(loc) = &self.location {
            let needle = loc.to_lowercase();
            let hay = listing.location.as_deref().unwrap_or("").to_lowercase();
            if !hay.contains(&needle) {
                return false;
            }
        }
        if let Some(min) = self.price_min {
            if listing.price_pence < min {
                return false;
            }
        }
        if let Some(max) = self.price_max {
            if listing.price_pence > max {
                return false;
            }
        }
        true
    }
}

/// Canonical result ordering: boosted listings first, then the requested
/// sort, ties broken by id ascending — the id is the only field guaranteed
/// totally ordered and stable.
pub fn rank(listings: &mut [Listing], sort: SortOrder) {
    listings.sort_by(|a, b| {
        b.boosted
            .cmp(&a.boosted)
            .then_with(|| match sort {
                SortOrder::RecencyDesc => b.created_at.cmp(&a.created_at),
                SortOrder::PriceAsc => a.price_pence.cmp(&b.price_pence),
                SortOrder::PriceDesc => b.price_pence.cmp(&a.price_pence),
            })
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, SellerType};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn listing(title: &str, price: i64) -> Listing {
        Listing {
            id: Uuid::now_v7(),
            owner: Uuid::now_v7(),
            title: title.to_string(),
            description: "surplus stock".to_string(),
            price_pence: price,
            category: CategoryRef::Name("Timber".to_string()),
            images: vec![],
            location: Some("Edinburgh, EH1".to_string()),
            coords: Some(GeoPoint { lat: 55.95, lng: -3.19 }),
            contact: "seller@example.com".to_string(),
            seller_type: SellerType::Public,
            status: ListingStatus::Available,
            boosted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_term_and_absent_term_share_a_key() {
        let absent = QuerySpec::all();
        let empty = QuerySpec::all().with_term("   ");
        assert_eq!(absent, empty);
    }

    #[test]
    fn all_sentinel_category_is_no_filter() {
        let by_name = QuerySpec::all().with_category(CategoryRef::Name("all".into()));
        let by_id = QuerySpec::all().with_category(CategoryRef::Id(Category::all().id));
        assert_eq!(by_name, QuerySpec::all());
        assert_eq!(by_id, QuerySpec::all());
    }

    #[test]
    fn term_matches_title_or_description_case_insensitive() {
        let q = QuerySpec::all().with_term("OAK").translate(&[]);
        let mut l = listing("Oak beam", 1500);
        assert!(q.admits(&l));
        l.title = "Beam".to_string();
        l.description = "reclaimed oak".to_string();
        assert!(q.admits(&l));
        l.description = "pine".to_string();
        assert!(!q.admits(&l));
    }

    #[test]
    fn category_filter_resolves_both_row_forms() {
        let timber = Category {
            id: Uuid::now_v7(),
            name: "Timber".to_string(),
            description: None,
        };
        let cats = vec![timber.clone()];

        let by_id = QuerySpec::all()
            .with_category(CategoryRef::Id(timber.id))
            .translate(&cats);
        let by_name = QuerySpec::all()
            .with_category(CategoryRef::Name("timber".into()))
            .translate(&cats);

        let legacy_row = listing("Oak beam", 1500); // category by name
        let mut id_row = listing("Oak post", 900);
        id_row.category = CategoryRef::Id(timber.id);

        for q in [&by_id, &by_name] {
            assert!(q.admits(&legacy_row));
            assert!(q.admits(&id_row));
        }
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let q = QuerySpec::all()
            .with_price_range(Some(1000), Some(1500))
            .translate(&[]);
        assert!(q.admits(&listing("a", 1000)));
        assert!(q.admits(&listing("b", 1500)));
        assert!(!q.admits(&listing("c", 999)));
        assert!(!q.admits(&listing("d", 1501)));
    }

    #[test]
    fn suspended_hidden_from_public_but_not_owner_scope() {
        let mut l = listing("Oak beam", 1500);
        l.status = ListingStatus::Suspended;
        let public = QuerySpec::all().translate(&[]);
        assert!(!public.admits(&l));
        let own = QuerySpec::by_owner(l.owner).translate(&[]);
        assert!(own.admits(&l));
    }

    #[test]
    fn boosted_sorts_first_then_recency_then_id() {
        let now = Utc::now();
        let mut old = listing("old", 100);
        old.created_at = now - Duration::hours(2);
        let mut new = listing("new", 100);
        new.created_at = now;
        let mut boosted = listing("boosted", 100);
        boosted.created_at = now - Duration::hours(5);
        boosted.boosted = true;

        let mut rows = vec![old.clone(), new.clone(), boosted.clone()];
        rank(&mut rows, SortOrder::RecencyDesc);
        assert_eq!(rows[0].id, boosted.id);
        assert_eq!(rows[1].id, new.id);
        assert_eq!(rows[2].id, old.id);
    }
}

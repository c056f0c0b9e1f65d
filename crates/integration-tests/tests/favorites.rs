//! Favorite toggling and the favorites-scoped view.

use domains::{CategoryRef, ListingSource, QuerySpec};
use integration_tests::{listing_form, Harness};
use uuid::Uuid;

#[tokio::test]
async fn double_toggle_returns_to_the_original_state() {
    let h = Harness::new(Vec::new());
    let listing = h
        .catalog
        .create(h.seller, listing_form("Anchor bond", "5", CategoryRef::Name("Fixings".into())))
        .await
        .unwrap();

    assert!(h.catalog.toggle_favorite(h.buyer, listing.id).await.unwrap());
    assert!(!h.catalog.toggle_favorite(h.buyer, listing.id).await.unwrap());
    assert!(!h.source.favorite_exists(h.buyer, listing.id).await.unwrap());
}

#[tokio::test]
async fn favorites_view_follows_the_toggle() {
    let h = Harness::new(Vec::new());
    let listing = h
        .catalog
        .create(h.seller, listing_form("Cleats", "10", CategoryRef::Name("Fixings".into())))
        .await
        .unwrap();

    let favorites = QuerySpec::favorites_of(h.buyer);
    assert!(h.catalog.fetch(&favorites).await.listings.is_empty());

    h.catalog.toggle_favorite(h.buyer, listing.id).await.unwrap();
    let page = h.catalog.fetch(&favorites).await;
    assert_eq!(page.listings.len(), 1);
    assert_eq!(page.listings[0].id, listing.id);

    // Untoggling removes it from the cached view in place.
    h.catalog.toggle_favorite(h.buyer, listing.id).await.unwrap();
    assert!(h.catalog.fetch(&favorites).await.listings.is_empty());
}

#[tokio::test]
async fn each_user_has_their_own_favorites() {
    let h = Harness::new(Vec::new());
    let listing = h
        .catalog
        .create(h.seller, listing_form("Oak beam", "15", CategoryRef::Name("Timber".into())))
        .await
        .unwrap();
    let other = Uuid::now_v7();

    h.catalog.toggle_favorite(h.buyer, listing.id).await.unwrap();
    assert_eq!(
        h.catalog.fetch(&QuerySpec::favorites_of(h.buyer)).await.listings.len(),
        1
    );
    assert!(h
        .catalog
        .fetch(&QuerySpec::favorites_of(other))
        .await
        .listings
        .is_empty());
}

#[tokio::test]
async fn deleting_a_listing_leaves_no_trace_in_favorites_views() {
    let h = Harness::new(Vec::new());
    let listing = h
        .catalog
        .create(h.seller, listing_form("Spray paint", "4", CategoryRef::Name("Paint".into())))
        .await
        .unwrap();
    h.catalog.toggle_favorite(h.buyer, listing.id).await.unwrap();
    let favorites = QuerySpec::favorites_of(h.buyer);
    assert_eq!(h.catalog.fetch(&favorites).await.listings.len(), 1);

    h.catalog.delete(h.seller, listing.id).await.unwrap();
    // The favorite row dangles at the source; every view treats the
    // listing as absent.
    assert!(h.catalog.fetch(&favorites).await.listings.is_empty());
    assert!(h.catalog.refresh(&favorites).await.listings.is_empty());
}

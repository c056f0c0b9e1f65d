//! The full storefront scenario: create → browse → favorite → suspend.

use domains::{CategoryRef, ImageSource, ListingStatus, QuerySpec};
use integration_tests::{listing_form, Harness};

#[tokio::test]
async fn storefront_walkthrough() {
    let (h, timber) = Harness::with_timber_category();

    // Seller posts an oak beam with an already-stored image reference.
    let mut form = listing_form("Oak beam", "15", CategoryRef::Id(timber.id));
    form.description = "x".to_string();
    form.images = vec![ImageSource::Uri("blob1".to_string())];
    form.contact = "x@x.com".to_string();
    let listing = h.catalog.create(h.seller, form).await.unwrap();
    assert_eq!(listing.status, ListingStatus::Available);
    assert_eq!(listing.price_pence, 1500);
    assert_eq!(listing.images, vec!["blob1".to_string()]);

    // Category browse finds exactly that listing.
    let browse = QuerySpec::all().with_category(CategoryRef::Id(timber.id));
    let page = h.catalog.fetch(&browse).await;
    assert_eq!(page.listings.len(), 1);
    assert_eq!(page.listings[0].id, listing.id);

    // Buyer bookmarks it.
    assert!(h.catalog.toggle_favorite(h.buyer, listing.id).await.unwrap());
    let favorites = QuerySpec::favorites_of(h.buyer);
    let page = h.catalog.fetch(&favorites).await;
    assert_eq!(page.listings.len(), 1);

    // An admin suspends the listing; it disappears from the public browse
    // and from the buyer's favorites, but stays on the seller's dashboard
    // with its status visible.
    h.catalog
        .set_status(h.admin, listing.id, ListingStatus::Suspended)
        .await
        .unwrap();

    assert!(h.catalog.fetch(&browse).await.listings.is_empty());
    assert!(h.catalog.fetch(&favorites).await.listings.is_empty());
    let dashboard = h.catalog.fetch(&QuerySpec::by_owner(h.seller)).await;
    assert_eq!(dashboard.listings.len(), 1);
    assert_eq!(dashboard.listings[0].status, ListingStatus::Suspended);

    // Reinstating brings it back to the public browse on the next fetch.
    h.catalog
        .set_status(h.admin, listing.id, ListingStatus::Available)
        .await
        .unwrap();
    assert_eq!(h.catalog.refresh(&browse).await.listings.len(), 1);
}

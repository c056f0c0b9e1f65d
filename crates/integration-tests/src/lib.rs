//! Shared fixtures for the end-to-end suites: a wired-up catalog service
//! over the in-memory backend, plus builders for realistic form input.

use std::sync::Arc;

use fake::faker::lorem::en::Sentence;
use fake::Fake;
use uuid::Uuid;

use domains::{
    Category, CategoryRef, ImageSource, NewListingData, SellerType, UserId,
};
use services::{CatalogService, CatalogTuning};
use storage_adapters::{MemoryListingSource, MemoryMediaStore};

pub struct Harness {
    pub source: Arc<MemoryListingSource>,
    pub catalog: Arc<CatalogService>,
    pub seller: UserId,
    pub buyer: UserId,
    pub admin: UserId,
}

impl Harness {
    /// A storefront with one seller, one buyer, one admin, and the given
    /// categories.
    pub fn new(categories: Vec<Category>) -> Self {
        let source = Arc::new(MemoryListingSource::new(categories));
        let seller = Uuid::now_v7();
        let buyer = Uuid::now_v7();
        let admin = Uuid::now_v7();
        source.register_user(seller, false);
        source.register_user(buyer, false);
        source.register_user(admin, true);
        let catalog = Arc::new(CatalogService::new(
            source.clone(),
            Arc::new(MemoryMediaStore::new()),
            CatalogTuning::default(),
        ));
        Harness { source, catalog, seller, buyer, admin }
    }

    pub fn with_timber_category() -> (Self, Category) {
        let timber = Category {
            id: Uuid::now_v7(),
            name: "Timber".to_string(),
            description: Some("Beams, boards, and offcuts".to_string()),
        };
        (Self::new(vec![timber.clone()]), timber)
    }
}

/// A complete, valid create form.
pub fn listing_form(title: &str, price: &str, category: CategoryRef) -> NewListingData {
    NewListingData {
        title: title.to_string(),
        description: Sentence(3..6).fake(),
        price: price.to_string(),
        category,
        images: vec![ImageSource::Bytes {
            data: bytes::Bytes::from_static(b"jpeg bytes"),
            content_type: mime::IMAGE_JPEG,
        }],
        location: Some("Edinburgh".to_string()),
        coords: None,
        contact: "seller@example.com".to_string(),
        seller_type: SellerType::Public,
        boost: false,
    }
}

//! poundtrades/crates/domains/src/lib.rs
//!
//! The central domain model and interface definitions for the PoundTrades
//! catalog. No I/O lives here; adapters and services depend on this crate,
//! never the other way around.

pub mod error;
pub mod models;
pub mod ports;
pub mod query;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
pub use query::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn listing_creation_v7() {
        let id = Uuid::now_v7();
        let listing = Listing {
            id,
            owner: Uuid::now_v7(),
            title: "Oak beam".to_string(),
            description: "Reclaimed, 2.4m".to_string(),
            price_pence: 1500,
            category: CategoryRef::Name("Timber".to_string()),
            images: vec!["mem://blob1".to_string()],
            location: Some("Edinburgh".to_string()),
            coords: None,
            contact: "x@x.com".to_string(),
            seller_type: SellerType::Public,
            status: ListingStatus::Available,
            boosted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(listing.id, id);
        assert_eq!(listing.status, ListingStatus::Available);
    }

    #[test]
    fn all_category_is_synthetic() {
        let all = Category::all();
        assert_eq!(all.id, Uuid::nil());
        assert_eq!(all.name, "All");
    }
}

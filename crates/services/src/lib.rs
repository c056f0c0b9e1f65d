//! poundtrades/crates/services/src/lib.rs
//!
//! The catalog store: the client-local view of listings. Screens construct
//! query specifications, the store fetches/caches/reconciles, and every
//! mutation writes through to the listing source before the caller gets
//! control back.

pub mod cache;
pub mod catalog;
pub mod validate;

pub use cache::CatalogPage;
pub use catalog::{CatalogService, CatalogTuning};

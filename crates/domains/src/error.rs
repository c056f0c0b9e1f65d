//! # CatalogError
//!
//! Centralized error handling for the PoundTrades catalog.
//! Maps domain-specific failures to actionable error types.

use serde::Serialize;
use thiserror::Error;

/// The primary error type for all catalog operations.
///
/// `Clone` is required because an in-flight favorite toggle broadcasts its
/// outcome to joined callers.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CatalogError {
    /// Locally detected invalid input, raised before any remote call.
    /// Names the first unmet field so user-facing messages stay
    /// deterministic.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Remote-detected attempt to mutate a listing the caller does not
    /// own or administer. Not retried.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (e.g., Listing, Category, Favorite)
    #[error("{entity} not found with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// Concurrent write detected by the source; refetch before retrying.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network failure or timeout. Eligible for caller-directed retry;
    /// state is left consistent so a retry is safe.
    #[error("remote source unavailable: {0}")]
    Transient(String),

    /// Infrastructure failure (e.g., storage corruption)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CatalogError::NotFound { entity, id: id.to_string() }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CatalogError::Validation { field, message: message.into() }
    }

    /// Whether a caller-directed retry is reasonable.
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }
}

/// A specialized Result type for catalog logic.
pub type Result<T> = std::result::Result<T, CatalogError>;

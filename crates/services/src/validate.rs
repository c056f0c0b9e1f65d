//! Create-form validation.
//!
//! Checks run in the same order the original form walks its fields, so the
//! first unmet constraint is deterministic: title, description, price,
//! images, contact. All checks are local; nothing here touches the network.

use domains::{CatalogError, NewListingData, Result};

/// The locally validated part of a new listing, fields trimmed.
#[derive(Debug, Clone)]
pub(crate) struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price_pence: i64,
    pub contact: String,
}

pub(crate) fn validate_new_listing(data: &NewListingData) -> Result<ListingDraft> {
    let title = data.title.trim();
    if title.is_empty() {
        return Err(CatalogError::validation(
            "title",
            "please enter a title for your listing",
        ));
    }

    let description = data.description.trim();
    if description.is_empty() {
        return Err(CatalogError::validation(
            "description",
            "please describe your listing",
        ));
    }

    let price_pence = parse_price(&data.price)?;

    if data.images.is_empty() {
        return Err(CatalogError::validation(
            "images",
            "please add at least one photo",
        ));
    }

    let contact = data.contact.trim();
    if contact.is_empty() {
        return Err(CatalogError::validation(
            "contact",
            "please provide contact information",
        ));
    }

    Ok(ListingDraft {
        title: title.to_string(),
        description: description.to_string(),
        price_pence,
        contact: contact.to_string(),
    })
}

/// Parses form input like `"15"`, `"£4.50"`, `"0.5"` into integer pence.
/// Rejects negatives, non-numeric input, and more than two decimal places.
pub fn parse_price(raw: &str) -> Result<i64> {
    let invalid = || CatalogError::validation("price", "please enter a valid price");

    let cleaned = raw.trim().trim_start_matches('£').trim();
    if cleaned.is_empty() {
        return Err(invalid());
    }

    let (pounds_str, pence_str) = match cleaned.split_once('.') {
        Some((p, f)) => (p, f),
        None => (cleaned, ""),
    };
    if pounds_str.is_empty() && pence_str.is_empty() {
        return Err(invalid());
    }
    if pence_str.len() > 2 {
        return Err(invalid());
    }
    let all_digits =
        |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !pounds_str.is_empty() && !all_digits(pounds_str) {
        return Err(invalid());
    }
    if !pence_str.is_empty() && !all_digits(pence_str) {
        return Err(invalid());
    }

    let pounds: i64 = if pounds_str.is_empty() {
        0
    } else {
        pounds_str.parse().map_err(|_| invalid())?
    };
    let minor: i64 = match pence_str.len() {
        0 => 0,
        1 => pence_str.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => pence_str.parse().map_err(|_| invalid())?,
    };

    pounds
        .checked_mul(100)
        .and_then(|p| p.checked_add(minor))
        .ok_or_else(invalid)
}

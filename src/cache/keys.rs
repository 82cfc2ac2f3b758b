//! Cache key derivation.
//!
//! Every key is a plain string so it can live in any key-value store. Listing
//! keys are canonical: two semantically equal queries always map to the same
//! key.

use std::fmt::Write as _;

use url::form_urlencoded::byte_serialize;
use uuid::Uuid;

use crate::application::articles::{ArticleFilters, SortSpec};
use crate::application::pagination::PageRequest;

pub const HOMEPAGE_KEY: &str = "articles:homepage";
pub const LISTING_PREFIX: &str = "articles:published:";
pub const LISTING_PATTERN: &str = "articles:published:*";
pub const ITEM_PREFIX: &str = "item:";

const NO_FILTERS: &str = "none";

pub fn item_key(id: Uuid) -> String {
    format!("{ITEM_PREFIX}{id}")
}

/// Canonical listing key for a `(page, limit, filters, sort)` tuple.
pub fn listing_key(page: PageRequest, filters: &ArticleFilters, sort: SortSpec) -> String {
    format!(
        "{LISTING_PREFIX}page:{}:limit:{}:filters:{}:sort:{}:{}",
        page.page(),
        page.limit(),
        filter_segment(filters),
        sort.field.as_str(),
        sort.order.as_str()
    )
}

/// Filters rendered in field-name order as `field:value` pairs.
///
/// Values are form-urlencoded so separators inside a value cannot alias
/// another filter combination.
pub fn filter_segment(filters: &ArticleFilters) -> String {
    if filters.is_empty() {
        return NO_FILTERS.to_string();
    }

    let mut segment = String::new();
    for (index, (field, value)) in filters.iter().enumerate() {
        if index > 0 {
            segment.push(':');
        }
        let encoded: String = byte_serialize(value.as_bytes()).collect();
        let _ = write!(segment, "{field}:{encoded}");
    }
    segment
}

/// The unfiltered first page in default order, which the homepage mirrors.
pub fn is_default_listing(page: PageRequest, filters: &ArticleFilters, sort: SortSpec) -> bool {
    page.page() == 1 && filters.is_empty() && sort.is_default()
}

/// Coarse category of a key, used as a metrics label.
pub fn key_scope(key: &str) -> &'static str {
    if key == HOMEPAGE_KEY {
        "homepage"
    } else if key.starts_with(LISTING_PREFIX) {
        "listing"
    } else if key.starts_with(ITEM_PREFIX) {
        "item"
    } else {
        "other"
    }
}

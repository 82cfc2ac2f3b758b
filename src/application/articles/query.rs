//! Filter and sort shapes for published-article listings.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown sort field `{0}`")]
    UnknownSortField(String),
    #[error("unknown sort order `{0}`")]
    UnknownSortOrder(String),
}

/// Filter fields recognized by the published listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Author,
    Search,
    Tag,
}

impl FilterField {
    pub const ALL: [FilterField; 3] = [FilterField::Author, FilterField::Search, FilterField::Tag];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterField::Author => "author",
            FilterField::Search => "search",
            FilterField::Tag => "tag",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

// Ordered by field name so iteration order is the canonical key order.
impl Ord for FilterField {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for FilterField {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active listing filters keyed by field.
///
/// Blank values are never stored, so an empty map means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArticleFilters {
    entries: BTreeMap<FilterField, String>,
}

impl ArticleFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.entries.remove(&field);
        } else {
            self.entries.insert(field, trimmed.to_string());
        }
    }

    /// Build filters from raw query pairs, ignoring unrecognized names.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut filters = Self::new();
        for (name, value) in pairs {
            if let Some(field) = FilterField::parse(name.as_ref()) {
                filters.insert(field, value);
            }
        }
        filters
    }

    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.entries.get(&field).map(String::as_str)
    }

    pub fn tag(&self) -> Option<&str> {
        self.get(FilterField::Tag)
    }

    pub fn author(&self) -> Option<&str> {
        self.get(FilterField::Author)
    }

    pub fn search(&self) -> Option<&str> {
        self.get(FilterField::Search)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate active filters in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &str)> {
        self.entries
            .iter()
            .map(|(field, value)| (*field, value.as_str()))
    }
}

impl<S: Into<String>> FromIterator<(FilterField, S)> for ArticleFilters {
    fn from_iter<I: IntoIterator<Item = (FilterField, S)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (field, value) in iter {
            filters.insert(field, value);
        }
        filters
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortField {
    #[default]
    PublishedAt,
    CreatedAt,
    ViewCount,
    Title,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::PublishedAt => "publishedAt",
            SortField::CreatedAt => "createdAt",
            SortField::ViewCount => "viewCount",
            SortField::Title => "title",
        }
    }
}

impl FromStr for SortField {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "publishedAt" | "published_at" => Ok(SortField::PublishedAt),
            "createdAt" | "created_at" => Ok(SortField::CreatedAt),
            "viewCount" | "view_count" => Ok(SortField::ViewCount),
            "title" => Ok(SortField::Title),
            other => Err(QueryError::UnknownSortField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(QueryError::UnknownSortOrder(value.to_string()))
        }
    }
}

/// Sort specification; defaults to newest published first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Parse optional `sortBy`/`sortOrder` values, falling back to defaults for
    /// missing or blank input.
    pub fn parse(sort_by: Option<&str>, sort_order: Option<&str>) -> Result<Self, QueryError> {
        let field = match sort_by.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value.parse()?,
            None => SortField::default(),
        };
        let order = match sort_order.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value.parse()?,
            None => SortOrder::default(),
        };
        Ok(Self { field, order })
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_is_alphabetical() {
        let mut fields = vec![FilterField::Tag, FilterField::Author, FilterField::Search];
        fields.sort();
        assert_eq!(
            fields,
            vec![FilterField::Author, FilterField::Search, FilterField::Tag]
        );
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a: ArticleFilters = [(FilterField::Tag, "academy"), (FilterField::Author, "7")]
            .into_iter()
            .collect();
        let b: ArticleFilters = [(FilterField::Author, "7"), (FilterField::Tag, "academy")]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        let order: Vec<_> = a.iter().map(|(field, _)| field).collect();
        assert_eq!(order, vec![FilterField::Author, FilterField::Tag]);
    }

    #[test]
    fn blank_values_are_not_active() {
        let filters = ArticleFilters::new()
            .with(FilterField::Tag, "   ")
            .with(FilterField::Search, "")
            .with(FilterField::Author, " coach ");
        assert_eq!(filters.len(), 1);
        assert_eq!(filters.author(), Some("coach"));
    }

    #[test]
    fn blank_value_clears_existing_filter() {
        let mut filters = ArticleFilters::new().with(FilterField::Tag, "academy");
        filters.insert(FilterField::Tag, " ");
        assert!(filters.is_empty());
    }

    #[test]
    fn query_pairs_ignore_unknown_fields() {
        let filters = ArticleFilters::from_query_pairs([
            ("tag", "academy"),
            ("page", "2"),
            ("search", "derby"),
        ]);
        assert_eq!(filters.tag(), Some("academy"));
        assert_eq!(filters.search(), Some("derby"));
        assert_eq!(filters.len(), 2);
    }

    #[test]
    fn sort_parse_defaults_when_missing() {
        let spec = SortSpec::parse(None, Some("")).expect("defaults");
        assert!(spec.is_default());
        assert_eq!(spec.field, SortField::PublishedAt);
        assert_eq!(spec.order, SortOrder::Desc);
    }

    #[test]
    fn sort_parse_accepts_both_spellings() {
        let spec = SortSpec::parse(Some("view_count"), Some("ASC")).expect("valid");
        assert_eq!(spec, SortSpec::new(SortField::ViewCount, SortOrder::Asc));
        let spec = SortSpec::parse(Some("createdAt"), None).expect("valid");
        assert_eq!(spec.field, SortField::CreatedAt);
        assert!(!spec.is_default());
    }

    #[test]
    fn sort_parse_rejects_unknown_values() {
        assert_eq!(
            SortSpec::parse(Some("goals"), None),
            Err(QueryError::UnknownSortField("goals".to_string()))
        );
        assert_eq!(
            SortSpec::parse(None, Some("sideways")),
            Err(QueryError::UnknownSortOrder("sideways".to_string()))
        );
    }
}

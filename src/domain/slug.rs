//! Slug derivation and tag normalization for article writes.

use std::collections::BTreeSet;

use slug::slugify;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a URL slug from human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Trim, lowercase and deduplicate tags, dropping blank entries.
///
/// The first occurrence of each tag keeps its position.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    let mut normalized = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.clone()) {
            normalized.push(tag);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_ascii_slug() {
        assert_eq!(
            derive_slug("First Team: 3-1 Win!").unwrap(),
            "first-team-3-1-win"
        );
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn rejects_symbol_only_input() {
        assert!(matches!(
            derive_slug("!!!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn normalizes_tags_preserving_first_position() {
        let tags = normalize_tags([" Academy", "u18", "academy", "", "  ", "U18", "women"]);
        assert_eq!(tags, vec!["academy", "u18", "women"]);
    }
}

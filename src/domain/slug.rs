//! Category slug validation.
//!
//! Slugs are looked up exactly as stored, so input is only trimmed. Slugs
//! flow into cache keys (`ids:{slug}:{page}`), which is why the `:` key
//! separator is refused.

use thiserror::Error;

const KEY_SEPARATOR: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("category slug is empty")]
    EmptyInput,
    #[error("category slug `{input}` contains the reserved `:` separator")]
    Separator { input: String },
}

/// Validate a category slug received from a URL, webhook, or configuration.
pub fn parse_category_slug(input: &str) -> Result<String, SlugError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if trimmed.contains(KEY_SEPARATOR) {
        return Err(SlugError::Separator {
            input: trimmed.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_slugs_pass_through_unchanged() {
        assert_eq!(parse_category_slug("news").unwrap(), "news");
        assert_eq!(parse_category_slug("release_notes").unwrap(), "release_notes");
        assert_eq!(parse_category_slug("Café").unwrap(), "Café");
        assert_eq!(parse_category_slug(" news ").unwrap(), "news");
    }

    #[test]
    fn rejects_empty_and_separator() {
        assert_eq!(parse_category_slug("   "), Err(SlugError::EmptyInput));
        assert!(matches!(
            parse_category_slug("a:b"),
            Err(SlugError::Separator { .. })
        ));
    }
}

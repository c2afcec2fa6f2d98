//! Text predicates for filtering and search.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a needle is compared against text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Case-insensitive substring.
    #[default]
    Substring,
    /// Exact substring.
    CaseSensitive,
    /// Regular expression (unanchored).
    Regex,
}

/// Rejected matcher construction.
#[derive(Debug, Clone, Error)]
pub enum MatcherError {
    #[error("search text is empty")]
    EmptyNeedle,

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Clone)]
enum Compiled {
    Lowercase(String),
    Exact,
    Pattern(Regex),
}

/// A needle plus a match mode, exposing a single text predicate.
///
/// # Examples
///
/// ```
/// use txview::view_state::matcher::{MatchMode, StringMatcher};
///
/// let matcher = StringMatcher::new("timeout", MatchMode::Substring).unwrap();
/// assert!(matcher.matches("Connection TIMEOUT after 30s"));
/// assert!(!matcher.matches("connected"));
/// ```
#[derive(Debug, Clone)]
pub struct StringMatcher {
    needle: String,
    mode: MatchMode,
    compiled: Compiled,
}

impl StringMatcher {
    /// # Errors
    ///
    /// `EmptyNeedle` for an empty needle, `Regex` for an invalid pattern.
    pub fn new(needle: impl Into<String>, mode: MatchMode) -> Result<Self, MatcherError> {
        let needle = needle.into();
        if needle.is_empty() {
            return Err(MatcherError::EmptyNeedle);
        }
        let compiled = match mode {
            MatchMode::Substring => Compiled::Lowercase(needle.to_lowercase()),
            MatchMode::CaseSensitive => Compiled::Exact,
            MatchMode::Regex => Compiled::Pattern(Regex::new(&needle)?),
        };
        Ok(Self {
            needle,
            mode,
            compiled,
        })
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.compiled {
            Compiled::Lowercase(lower) => {
                if text.is_ascii() && lower.is_ascii() {
                    contains_ignore_ascii_case(text, lower)
                } else {
                    text.to_lowercase().contains(lower.as_str())
                }
            }
            Compiled::Exact => text.contains(self.needle.as_str()),
            Compiled::Pattern(regex) => regex.is_match(text),
        }
    }
}

// The compiled form is derived from needle and mode.
impl PartialEq for StringMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.needle == other.needle && self.mode == other.mode
    }
}

impl Eq for StringMatcher {}

fn contains_ignore_ascii_case(haystack: &str, lower_needle: &str) -> bool {
    let (hay, needle) = (haystack.as_bytes(), lower_needle.as_bytes());
    if needle.len() > hay.len() {
        return false;
    }
    hay.windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_ignores_case() {
        let m = StringMatcher::new("Error", MatchMode::Substring).unwrap();
        assert!(m.matches("an ERROR occurred"));
        assert!(m.matches("error"));
        assert!(!m.matches("err"));
    }

    #[test]
    fn substring_handles_non_ascii() {
        let m = StringMatcher::new("ÉTÉ", MatchMode::Substring).unwrap();
        assert!(m.matches("un été chaud"));
    }

    #[test]
    fn case_sensitive_is_exact() {
        let m = StringMatcher::new("Error", MatchMode::CaseSensitive).unwrap();
        assert!(m.matches("Error: bad"));
        assert!(!m.matches("error: bad"));
    }

    #[test]
    fn regex_is_unanchored() {
        let m = StringMatcher::new(r"id=\d+", MatchMode::Regex).unwrap();
        assert!(m.matches("lookup id=42 failed"));
        assert!(!m.matches("lookup id=x"));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = StringMatcher::new("(unclosed", MatchMode::Regex).unwrap_err();
        assert!(matches!(err, MatcherError::Regex(_)));
    }

    #[test]
    fn empty_needle_is_rejected() {
        let err = StringMatcher::new("", MatchMode::Substring).unwrap_err();
        assert!(matches!(err, MatcherError::EmptyNeedle));
    }

    #[test]
    fn mode_deserializes_from_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: MatchMode,
        }
        let w: Wrapper = toml::from_str(r#"mode = "case-sensitive""#).unwrap();
        assert_eq!(w.mode, MatchMode::CaseSensitive);
    }
}

//! Target file suffix used to select links from a listing.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Default suffix selected from listings.
pub const DEFAULT_SUFFIX: &str = ".zip";

/// Rejected suffix value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SuffixError {
    /// Suffix is empty or only a dot.
    #[error("target suffix must not be empty")]
    Empty,

    /// Suffix contains a path separator or whitespace.
    #[error("invalid target suffix '{value}': must not contain separators or whitespace")]
    Invalid {
        /// The rejected value.
        value: String,
    },
}

/// A file suffix such as `.zip`, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSuffix(String);

impl TargetSuffix {
    /// Builds a suffix, adding the leading dot when missing and lowercasing.
    ///
    /// # Errors
    ///
    /// Returns [`SuffixError`] for empty values or values containing path
    /// separators or whitespace.
    pub fn new(value: &str) -> Result<Self, SuffixError> {
        let trimmed = value.trim();
        let bare = trimmed.trim_start_matches('.');
        if bare.is_empty() {
            return Err(SuffixError::Empty);
        }
        if bare
            .chars()
            .any(|c| matches!(c, '/' | '\\') || c.is_whitespace() || c.is_control())
        {
            return Err(SuffixError::Invalid {
                value: value.to_string(),
            });
        }
        Ok(Self(format!(".{}", bare.to_lowercase())))
    }

    /// Returns the suffix including its leading dot.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when `name` ends with this suffix (ASCII case-insensitive).
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.split_point(name).is_some()
    }

    /// Returns true when the percent-decoded path of `url` ends with this suffix.
    ///
    /// Query strings and fragments do not take part in the match.
    #[must_use]
    pub fn matches_url(&self, url: &Url) -> bool {
        let path = url.path();
        let decoded = urlencoding::decode(path).map_or_else(|_| path.into(), |d| d);
        self.matches(&decoded)
    }

    /// Returns `name` without this suffix, or `None` when it does not match.
    #[must_use]
    pub fn strip_from<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.split_point(name).map(|split| &name[..split])
    }

    fn split_point(&self, name: &str) -> Option<usize> {
        let split = name.len().checked_sub(self.0.len())?;
        if !name.is_char_boundary(split) {
            return None;
        }
        name[split..]
            .eq_ignore_ascii_case(&self.0)
            .then_some(split)
    }
}

impl Default for TargetSuffix {
    fn default() -> Self {
        Self(DEFAULT_SUFFIX.to_string())
    }
}

impl fmt::Display for TargetSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

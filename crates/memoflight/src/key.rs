// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Write};

const SEPARATOR: char = ':';

/// Builds composite cache keys of the form `namespace:segment:segment`.
///
/// Keys that share a namespace can be dropped together with
/// [`MemoCache::invalidate_prefix`](crate::MemoCache::invalidate_prefix) using
/// [`prefix`](Self::prefix).
///
/// # Examples
///
/// ```
/// use memoflight::CacheKey;
///
/// let key = CacheKey::new("lectures").segment("major").segment(2024);
/// assert_eq!(key.as_str(), "lectures:major:2024");
/// assert_eq!(CacheKey::new("lectures").prefix(), "lectures:");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
}

impl CacheKey {
    /// Starts a key in `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { key: namespace.into() }
    }

    /// Appends a segment, separated by `:`.
    #[must_use]
    pub fn segment(mut self, segment: impl Display) -> Self {
        self.key.push(SEPARATOR);
        // Writing into a String cannot fail.
        let _ = write!(self.key, "{segment}");
        self
    }

    /// Returns the key followed by the separator, matching every key extended from this one.
    #[must_use]
    pub fn prefix(&self) -> String {
        let mut prefix = String::with_capacity(self.key.len() + 1);
        prefix.push_str(&self.key);
        prefix.push(SEPARATOR);
        prefix
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_joined() {
        let key = CacheKey::new("user").segment(42).segment("profile");
        assert_eq!(key.to_string(), "user:42:profile");
        assert_eq!(String::from(key), "user:42:profile");
    }

    #[test]
    fn prefix_does_not_match_sibling_namespace() {
        let prefix = CacheKey::new("user").prefix();
        assert!(CacheKey::new("user").segment(1).as_str().starts_with(&prefix));
        assert!(!CacheKey::new("users").segment(1).as_str().starts_with(&prefix));
    }

    #[test]
    fn bare_namespace() {
        assert_eq!(CacheKey::new("order").as_ref(), "order");
    }
}

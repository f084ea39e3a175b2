use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix carried by every derived content key.
pub const CONTENT_KEY_PREFIX: &str = "content_";

/// Errors produced when wrapping raw strings as content keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKeyError {
    Empty,
    MissingPrefix(String),
}

impl fmt::Display for ContentKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKeyError::Empty => write!(f, "content key cannot be empty"),
            ContentKeyError::MissingPrefix(raw) => write!(
                f,
                "content key {raw:?} does not start with {CONTENT_KEY_PREFIX:?}"
            ),
        }
    }
}

impl std::error::Error for ContentKeyError {}

/// Stable identifier of one tracked piece of media, independent of the URL
/// it was watched from.
///
/// Thin wrapper around `String` so store keys that are not progress records
/// (the key index, telemetry, settings) can't be passed where a record key is
/// expected.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    /// Builds the key for an already-reduced identity hash.
    pub fn from_hash(hash: u32) -> Self {
        Self(format!("{CONTENT_KEY_PREFIX}{hash}"))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, ContentKeyError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ContentKeyError::Empty);
        }
        if !value.starts_with(CONTENT_KEY_PREFIX) {
            return Err(ContentKeyError::MissingPrefix(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_prefix() {
        assert_eq!(ContentKey::parse(""), Err(ContentKeyError::Empty));
        assert!(matches!(
            ContentKey::parse("progress_index"),
            Err(ContentKeyError::MissingPrefix(_))
        ));
        let key = ContentKey::parse("content_42").expect("valid key");
        assert_eq!(key, ContentKey::from_hash(42));
    }
}

//! Secret wrapper for provider API keys and cache tokens.
//!
//! ```rust
//! use pulse_search::redact::RedactedString;
//!
//! let key = RedactedString::new("gnews-1234567890");
//! assert_eq!(format!("{key}"), "[REDACTED]");
//! assert_eq!(key.as_str(), "gnews-1234567890");
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer};

/// A string whose value never appears in [`Display`](fmt::Display) or
/// [`Debug`](fmt::Debug) output.
///
/// The only way to read the value is [`as_str`](RedactedString::as_str),
/// which callers use when building request headers or query strings.
#[derive(Clone, PartialEq, Eq)]
pub struct RedactedString {
    inner: String,
}

impl RedactedString {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Access the secret. Never log the result.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Whether the secret is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl fmt::Display for RedactedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Debug for RedactedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedString(\"[REDACTED]\")")
    }
}

impl From<String> for RedactedString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for RedactedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_debug_hide_value() {
        let secret = RedactedString::new("tok_live_abc");
        assert_eq!(secret.to_string(), "[REDACTED]");
        assert_eq!(format!("{secret:?}"), "RedactedString(\"[REDACTED]\")");
        assert!(!format!("{secret:?}").contains("abc"));
    }

    #[test]
    fn explicit_access_returns_value() {
        let secret = RedactedString::from("k".to_string());
        assert_eq!(secret.as_str(), "k");
    }

    #[test]
    fn blank_detection() {
        assert!(RedactedString::new("  ").is_blank());
        assert!(!RedactedString::new("x").is_blank());
    }

    #[test]
    fn deserializes_from_plain_string() {
        let secret: RedactedString = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(secret.as_str(), "abc");
    }
}

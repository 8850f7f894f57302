//! Scan target domain with validation.
//!
//! The orchestrator refuses malformed input here, before any probe starts.
//! This is the only request-level failure a scan can produce.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated, lowercase DNS domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Maximum length of a fully qualified name.
    pub const MAX_LEN: usize = 253;

    /// Parse and validate a domain.
    ///
    /// Surrounding whitespace and a trailing root dot are stripped, and the
    /// name is case-folded.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let s = s.trim().trim_end_matches('.');
        if s.is_empty() {
            return Err(DomainError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(DomainError::TooLong(s.len()));
        }
        if s.parse::<std::net::IpAddr>().is_ok() || !is_valid_hostname(s) {
            return Err(DomainError::InvalidFormat(s.to_string()));
        }

        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The domain as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `www.` variant tried alongside the bare domain.
    pub fn www(&self) -> String {
        format!("www.{}", self.0)
    }

    /// Whether `name` is this domain or one of its subdomains.
    pub fn covers(&self, name: &str) -> bool {
        name == self.0
            || name
                .strip_suffix(self.0.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Domain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Domain {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check if a string is a valid hostname.
///
/// Requires at least two labels; each label is 1-63 characters of ASCII
/// alphanumerics and hyphens, not starting or ending with a hyphen.
pub(crate) fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > Domain::MAX_LEN || !s.contains('.') {
        return false;
    }

    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let domain = Domain::parse("  Example.COM. ").unwrap();
        assert_eq!(domain.as_str(), "example.com");
        assert_eq!(domain.www(), "www.example.com");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Domain::parse(""), Err(DomainError::Empty));
        assert!(matches!(
            Domain::parse("-bad.com"),
            Err(DomainError::InvalidFormat(_))
        ));
        assert!(matches!(
            Domain::parse("localhost"),
            Err(DomainError::InvalidFormat(_))
        ));
        assert!(matches!(
            Domain::parse("10.0.0.1"),
            Err(DomainError::InvalidFormat(_))
        ));
        assert!(matches!(
            Domain::parse("exa mple.com"),
            Err(DomainError::InvalidFormat(_))
        ));
        let long = format!("{}.com", "a".repeat(260));
        assert!(matches!(Domain::parse(&long), Err(DomainError::TooLong(_))));
    }

    #[test]
    fn test_covers() {
        let domain = Domain::parse("example.com").unwrap();
        assert!(domain.covers("example.com"));
        assert!(domain.covers("api.example.com"));
        assert!(!domain.covers("badexample.com"));
        assert!(!domain.covers("example.com.evil.net"));
    }

    #[test]
    fn test_serde_validates() {
        let parsed: Domain = serde_json::from_str("\"Api.Example.com\"").unwrap();
        assert_eq!(parsed.as_str(), "api.example.com");
        assert!(serde_json::from_str::<Domain>("\"not a domain\"").is_err());
    }
}

//! Canonical identifiers for generated entities.
//!
//! Emergency cases and bed allocations are identified by a UUID rendered in a single canonical
//! form: **32 lowercase hexadecimal characters** (no hyphens), the same value you get from
//! `Uuid::new_v4().simple().to_string()`. Externally supplied identifiers must already be
//! canonical; other UUID spellings are rejected rather than normalised, so that a case can only
//! ever be addressed by one string.

use crate::{TypesError, TypesResult};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// A generated identifier guaranteed to be in canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalId(String);

impl Default for CanonicalId {
    fn default() -> Self {
        Self::generate()
    }
}

impl CanonicalId {
    /// Generates a fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validates an externally supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::NonCanonicalId`] if `input` is not exactly 32 lowercase hex
    /// characters.
    pub fn parse(input: &str) -> TypesResult<Self> {
        if Self::is_canonical(input) {
            return Ok(Self(input.to_owned()));
        }
        Err(TypesError::NonCanonicalId(input.to_owned()))
    }

    /// Returns true if `input` is in canonical form.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CanonicalId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalId::parse(s)
    }
}

impl AsRef<str> for CanonicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for CanonicalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for CanonicalId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for CanonicalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CanonicalId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_canonical() {
        let id = CanonicalId::generate();
        assert!(CanonicalId::is_canonical(id.as_str()));
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(CanonicalId::generate(), CanonicalId::generate());
    }

    #[test]
    fn test_parse_accepts_canonical() {
        let canonical = "550e8400e29b41d4a716446655440000";
        assert_eq!(CanonicalId::parse(canonical).unwrap().as_str(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated() {
        match CanonicalId::parse("550e8400-e29b-41d4-a716-446655440000") {
            Err(TypesError::NonCanonicalId(msg)) => assert!(msg.contains('-')),
            other => panic!("expected NonCanonicalId, got {other:?}"),
        }
    }

    #[test]
    fn test_is_canonical_invalid() {
        assert!(!CanonicalId::is_canonical("550E8400E29B41D4A716446655440000"));
        assert!(!CanonicalId::is_canonical("550e8400e29b41d4a71644665544000"));
        assert!(!CanonicalId::is_canonical("550e8400e29b41d4a716446655440zzz"));
        assert!(!CanonicalId::is_canonical(""));
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stable internal identifier of a managed community.
///
/// Generated once when a community is first registered and never changed
/// afterwards. The same string is the key in the document store and the stem
/// of the community's blob (`{id}.json`) inside every snapshot bundle, so it
/// must be a valid single path segment.
///
/// Fresh identifiers are UUID v7 strings. Identifiers read back from older
/// snapshots are accepted in any form that is a valid file stem.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommunityId(String);

impl CommunityId {
    /// Suffix of every community blob inside a bundle.
    pub const FILE_SUFFIX: &'static str = ".json";

    /// Generate a new time-ordered identifier (UUID v7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Validate and wrap an existing identifier.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let reason = if s.is_empty() {
            Some("empty")
        } else if s == "." || s == ".." {
            Some("reserved path segment")
        } else if s.contains(['/', '\\', '\0']) {
            Some("contains a path separator")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(TypeError::InvalidIdentifier {
                id: s.to_string(),
                reason,
            }),
            None => Ok(Self(s.to_string())),
        }
    }

    /// Recover an identifier from a bundle file name.
    ///
    /// Returns `None` when the name does not carry the `.json` suffix.
    pub fn from_file_name(name: &str) -> Option<Result<Self, TypeError>> {
        name.strip_suffix(Self::FILE_SUFFIX).map(Self::parse)
    }

    /// File name of this community's blob inside a bundle.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.0, Self::FILE_SUFFIX)
    }

    /// Returns `true` if this identifier is in generated (UUID) form.
    pub fn is_generated(&self) -> bool {
        uuid::Uuid::parse_str(&self.0).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Default for CommunityId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for CommunityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CommunityId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CommunityId> for String {
    fn from(id: CommunityId) -> Self {
        id.0
    }
}

impl AsRef<str> for CommunityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommunityId({})", self.short_id())
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique_and_generated() {
        let a = CommunityId::new();
        let b = CommunityId::new();
        assert_ne!(a, b);
        assert!(a.is_generated());
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn legacy_stems_are_accepted() {
        let id = CommunityId::parse("initiated").unwrap();
        assert!(!id.is_generated());
        assert_eq!(id.file_name(), "initiated.json");
    }

    #[test]
    fn path_like_ids_are_rejected() {
        assert!(CommunityId::parse("").is_err());
        assert!(CommunityId::parse(".").is_err());
        assert!(CommunityId::parse("..").is_err());
        assert!(CommunityId::parse("a\0b").is_err());
        assert!(CommunityId::parse("a/b").is_err());
        assert!(CommunityId::parse("a\\b").is_err());
    }

    #[test]
    fn file_name_roundtrip() {
        let id = CommunityId::new();
        let back = CommunityId::from_file_name(&id.file_name()).unwrap().unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn non_json_names_are_not_identifiers() {
        assert!(CommunityId::from_file_name("README.md").is_none());
        assert!(matches!(
            CommunityId::from_file_name(".json"),
            Some(Err(TypeError::InvalidIdentifier { .. }))
        ));
    }

    #[test]
    fn serde_is_a_plain_string() {
        let id = CommunityId::parse("guild-a").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"guild-a\"");
        let parsed: CommunityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<CommunityId>("\"a/b\"").is_err());
    }

    #[test]
    fn short_id_is_prefix() {
        let id = CommunityId::parse("abcdefghijkl").unwrap();
        assert_eq!(id.short_id(), "abcdefgh");
        let id = CommunityId::parse("abc").unwrap();
        assert_eq!(id.short_id(), "abc");
    }
}

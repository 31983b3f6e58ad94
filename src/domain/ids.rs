//! Domain identifier types with validation
//!
//! Newtype wrappers for the two identifiers that cross component boundaries:
//! the CCFID natural key and opaque CRM record ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix some CRM exports put in front of record ids
const CRM_ID_PREFIX: &str = "zcrm_";

/// Chain-of-custody form identifier
///
/// The natural key of a test event, unique across every source and over time.
///
/// # Examples
///
/// ```
/// use ccfsync::domain::ids::Ccfid;
///
/// let ccfid = Ccfid::new(" 0123456 ").unwrap();
/// assert_eq!(ccfid.as_str(), "0123456");
/// assert!(Ccfid::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ccfid(String);

impl Ccfid {
    /// Creates a new Ccfid, trimming surrounding whitespace
    pub fn new(id: impl AsRef<str>) -> Result<Self, String> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err("CCFID cannot be empty".to_string());
        }
        Ok(Self(id.to_string()))
    }

    /// Returns the CCFID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Ccfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ccfid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Ccfid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque CRM record id
///
/// Normalized on construction: whitespace and any leading `zcrm_` are removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    /// Parses a raw id, returning `None` when nothing usable remains
    ///
    /// # Examples
    ///
    /// ```
    /// use ccfsync::domain::ids::RemoteId;
    ///
    /// let id = RemoteId::parse("zcrm_4876876000000123").unwrap();
    /// assert_eq!(id.as_str(), "4876876000000123");
    /// assert!(RemoteId::parse("").is_none());
    /// ```
    pub fn parse(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        let stripped = trimmed.strip_prefix(CRM_ID_PREFIX).unwrap_or(trimmed).trim();
        if stripped.is_empty() {
            None
        } else {
            Some(Self(stripped.to_string()))
        }
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

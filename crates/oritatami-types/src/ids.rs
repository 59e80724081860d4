//! Typed identifiers for blocks and toggle roots.
//!
//! `BlockId` wraps a UUIDv7 (time-ordered, globally unique) and is the stable
//! identity a host block keeps across every insert, delete, and move.
//!
//! `RootId` is the parent-link value written onto toggle members. It is a
//! string newtype rather than a UUID because persisted documents carry it as
//! a free-form `fk` string; freshly created roots use UUIDv7 hex. The
//! `short()` forms are for human display only, never used as lookup keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Namespace for [`BlockId::from_external`].
const BLOCK_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x6f72_6974_6174_4d69_8000_626c_6f63_6b73);

/// A block identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(uuid::Uuid);

impl BlockId {
    /// Create a new time-ordered ID (UUIDv7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// First 8 hex characters, for human display only (never a lookup key).
    pub fn short(&self) -> String {
        self.0.as_simple().to_string()[..8].to_string()
    }

    /// Full 32-character hex string (no hyphens).
    pub fn to_hex(&self) -> String {
        self.0.as_simple().to_string()
    }

    /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self)
    }

    /// Stable ID for a block identified by a foreign string.
    ///
    /// UUID strings parse as-is; anything else (e.g. Editor.js ids such as
    /// `oUq2g_tl8y`) maps to a name-based UUIDv5, so the same foreign id
    /// always yields the same `BlockId`.
    pub fn from_external(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|_| Self(uuid::Uuid::new_v5(&BLOCK_NAMESPACE, s.as_bytes())))
    }

    /// A nil / zero ID, for sentinel values only.
    pub fn nil() -> Self {
        Self(uuid::Uuid::nil())
    }

    /// Check if this is the nil ID.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for BlockId {
    fn from(u: uuid::Uuid) -> Self {
        Self(u)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.short())
    }
}

/// Error from parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("root id must not be empty")]
    Empty,
    #[error("root id '{0}' contains whitespace")]
    Whitespace(String),
}

/// A toggle root identifier.
///
/// Generated once when the toggle is created and never changed afterwards;
/// every member of the toggle carries it as its parent link.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RootId(String);

impl RootId {
    /// Generate a fresh root ID (UUIDv7 simple hex).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_simple().to_string())
    }

    /// Validate a persisted root ID.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(IdError::Whitespace(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for human display only (never a lookup key).
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl Default for RootId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RootId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RootId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RootId> for String {
    fn from(id: RootId) -> String {
        id.0
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootId({})", self.short())
    }
}

// ============================================================================
// Tests
// ============================================================================

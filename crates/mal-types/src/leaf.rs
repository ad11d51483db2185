use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::DIGEST_LEN;
use crate::error::TypeError;
use crate::Label;

/// Opaque transaction identifier committed as a Merkle leaf.
///
/// Identifiers are 32 bytes, canonically written as lowercase hex. Parsing
/// accepts either case; the hex text is never hashed, only the decoded bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId([u8; DIGEST_LEN]);

impl LeafId {
    /// Create from raw identifier bytes.
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// A fresh random identifier, as produced by the upstream transaction
    /// generator and by synthetic (non-member) audits.
    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    /// A random identifier drawn from the given RNG.
    pub fn random_with<R: rand::Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; DIGEST_LEN];
        rng.fill(&mut bytes[..]);
        Self(bytes)
    }

    /// The identifier bytes that get hashed into a leaf digest.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Canonical lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex (either case).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; DIGEST_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| TypeError::InvalidLength {
                    expected: DIGEST_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeafId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for LeafId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for LeafId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LeafId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A transaction record as held by the record store.
///
/// The identifier and creation time never change. `commit_label` is set once,
/// when the record is included in a commit, and never cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafRecord {
    pub id: LeafId,
    pub created_at: DateTime<Utc>,
    pub commit_label: Option<Label>,
}

impl LeafRecord {
    /// A new, not-yet-committed record.
    pub fn new(id: LeafId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            commit_label: None,
        }
    }

    /// Returns `true` once the record has been linked to a commit.
    pub fn is_linked(&self) -> bool {
        self.commit_label.is_some()
    }
}

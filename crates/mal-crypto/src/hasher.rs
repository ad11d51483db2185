use std::fmt;
use std::str::FromStr;

use mal_types::{Digest, LeafId, DIGEST_LEN};
use serde::{Deserialize, Serialize};

/// Deterministic 32-byte hash used for both leaves and internal nodes.
///
/// The same function must hash leaves and combine nodes, otherwise a
/// verifier could not recompute a root from a proof path.
pub trait HashPrimitive: Send + Sync {
    /// Hash raw bytes.
    fn hash(&self, data: &[u8]) -> Digest;

    /// Leaf digest of a transaction identifier: the hash of its bytes.
    fn hash_leaf(&self, id: &LeafId) -> Digest {
        self.hash(id.as_bytes())
    }

    /// Parent of two nodes: `hash(min(x, y) ++ max(x, y))`.
    ///
    /// Order is unsigned byte order, so the parent does not depend on which
    /// slot either child occupied.
    fn combine(&self, x: &Digest, y: &Digest) -> Digest {
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let mut buf = [0u8; DIGEST_LEN * 2];
        buf[..DIGEST_LEN].copy_from_slice(lo.as_bytes());
        buf[DIGEST_LEN..].copy_from_slice(hi.as_bytes());
        self.hash(&buf)
    }
}

/// SHA-256, the reference primitive.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hash;

impl HashPrimitive for Sha256Hash {
    fn hash(&self, data: &[u8]) -> Digest {
        use sha2::Digest as _;
        let out = sha2::Sha256::digest(data);
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&out);
        Digest::from_hash(bytes)
    }
}

/// Plain BLAKE3-256 without domain separation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Hash;

impl HashPrimitive for Blake3Hash {
    fn hash(&self, data: &[u8]) -> Digest {
        Digest::from_hash(*blake3::hash(data).as_bytes())
    }
}

/// Configurable choice of hash primitive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashPrimitive for HashAlgorithm {
    fn hash(&self, data: &[u8]) -> Digest {
        match self {
            Self::Sha256 => Sha256Hash.hash(data),
            Self::Blake3 => Blake3Hash.hash(data),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
            Self::Blake3 => f.write_str("blake3"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

use mal_crypto::HashAlgorithm;
use serde::{Deserialize, Serialize};

/// Batching policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Window used for the first commit, when no previous period exists.
    pub lookback_days: u32,
    /// When set, every period starts this many days before its end instead
    /// of at the previous commit's end.
    pub period_offset_days: Option<u32>,
    /// Leaves whose proof rows are written per store call.
    pub proof_chunk_leaves: usize,
    /// Leaf and node hash.
    pub hash: HashAlgorithm,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            period_offset_days: None,
            proof_chunk_leaves: 1000,
            hash: HashAlgorithm::Sha256,
        }
    }
}

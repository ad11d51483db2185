use mal_crypto::{fold_path, HashAlgorithm, HashPrimitive, ProofStep};
use mal_types::{Digest, LeafId};
use serde::{Deserialize, Serialize};

/// Result of recomputing one leaf's path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub included: bool,
    pub leaf_digest: Digest,
    pub computed_root: Digest,
    pub expected_root: Digest,
}

/// Recomputes a root from a leaf and its stored path.
///
/// Siblings are folded in stored order with the sorted-pair rule; the side
/// tag of each step is not consulted.
#[derive(Clone, Copy, Debug, Default)]
pub struct InclusionVerifier {
    hash: HashAlgorithm,
}

impl InclusionVerifier {
    pub fn new(hash: HashAlgorithm) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn verify(&self, leaf_id: &LeafId, path: &[ProofStep], root: &Digest) -> Verdict {
        let leaf_digest = self.hash.hash_leaf(leaf_id);
        let computed_root = fold_path(&self.hash, leaf_digest, path.iter().map(|s| &s.sibling));
        Verdict {
            included: computed_root == *root,
            leaf_digest,
            computed_root,
            expected_root: *root,
        }
    }
}

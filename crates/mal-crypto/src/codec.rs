use mal_types::{Label, LeafId, ProofEntry};

use crate::merkle::ProofStep;

/// Errors from decoding stored proof rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("corrupt proof: {0}")]
    CorruptProof(String),
}

/// Converts in-memory proof paths to storable [`ProofEntry`] rows and back.
///
/// Pure and stateless.
pub struct ProofCodec;

impl ProofCodec {
    /// One row per path step, `index` 0 closest to the leaf.
    pub fn encode(label: Label, leaf_id: LeafId, path: &[ProofStep]) -> Vec<ProofEntry> {
        path.iter()
            .enumerate()
            .map(|(index, step)| ProofEntry {
                commit_label: label,
                leaf_id,
                index: index as u32,
                sibling: step.sibling,
                side: Some(step.side),
            })
            .collect()
    }

    /// Rebuild a path from rows in any order.
    ///
    /// All rows must belong to one `(label, leaf)` pair, carry a side tag, and
    /// have indices exactly `0..rows.len()`.
    pub fn decode(rows: &[ProofEntry]) -> Result<Vec<ProofStep>, CodecError> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };

        if let Some(stray) = rows
            .iter()
            .find(|r| r.commit_label != first.commit_label || r.leaf_id != first.leaf_id)
        {
            return Err(CodecError::CorruptProof(format!(
                "row for commit {} leaf {} mixed into proof of commit {} leaf {}",
                stray.commit_label, stray.leaf_id, first.commit_label, first.leaf_id
            )));
        }

        let mut sorted: Vec<&ProofEntry> = rows.iter().collect();
        sorted.sort_by_key(|r| r.index);

        sorted
            .iter()
            .enumerate()
            .map(|(expected, row)| {
                if row.index as usize != expected {
                    return Err(CodecError::CorruptProof(format!(
                        "leaf {} in commit {}: expected index {expected}, found {}",
                        row.leaf_id, row.commit_label, row.index
                    )));
                }
                let side = row.side.ok_or_else(|| {
                    CodecError::CorruptProof(format!(
                        "leaf {} in commit {}: step {} has no side tag",
                        row.leaf_id, row.commit_label, row.index
                    ))
                })?;
                Ok(ProofStep {
                    sibling: row.sibling,
                    side,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{HashPrimitive, Sha256Hash};
    use crate::merkle::MerkleTree;
    use mal_types::{Digest, Side};
    use proptest::prelude::*;

    fn id(seed: u8) -> LeafId {
        LeafId::from_bytes([seed; 32])
    }

    fn sample_path() -> Vec<ProofStep> {
        vec![
            ProofStep {
                sibling: Digest::from_hash([1; 32]),
                side: Side::Right,
            },
            ProofStep {
                sibling: Digest::from_hash([2; 32]),
                side: Side::Left,
            },
        ]
    }

    #[test]
    fn encode_numbers_rows_from_leaf() {
        let rows = ProofCodec::encode(7, id(1), &sample_path());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].sibling, Digest::from_hash([1; 32]));
        assert_eq!(rows[1].index, 1);
        assert!(rows.iter().all(|r| r.commit_label == 7 && r.leaf_id == id(1)));
    }

    #[test]
    fn decode_accepts_unordered_rows() {
        let mut rows = ProofCodec::encode(1, id(1), &sample_path());
        rows.reverse();
        assert_eq!(ProofCodec::decode(&rows).unwrap(), sample_path());
    }

    #[test]
    fn decode_empty_is_empty_path() {
        assert!(ProofCodec::decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn index_gap_is_corrupt() {
        let mut rows = ProofCodec::encode(1, id(1), &sample_path());
        rows[1].index = 2;
        let err = ProofCodec::decode(&rows).unwrap_err();
        assert!(matches!(err, CodecError::CorruptProof(ref m) if m.contains("expected index 1")));
    }

    #[test]
    fn duplicate_index_is_corrupt() {
        let mut rows = ProofCodec::encode(1, id(1), &sample_path());
        rows[1].index = 0;
        assert!(ProofCodec::decode(&rows).is_err());
    }

    #[test]
    fn missing_side_is_corrupt() {
        let mut rows = ProofCodec::encode(1, id(1), &sample_path());
        rows[1].side = None;
        let err = ProofCodec::decode(&rows).unwrap_err();
        assert!(matches!(err, CodecError::CorruptProof(ref m) if m.contains("no side tag")));
    }

    #[test]
    fn mixed_leaves_are_corrupt() {
        let mut rows = ProofCodec::encode(1, id(1), &sample_path());
        rows[1].leaf_id = id(2);
        assert!(ProofCodec::decode(&rows).is_err());
    }

    #[test]
    fn decoded_tree_proof_still_verifies() {
        let ids: Vec<LeafId> = (0..5).map(id).collect();
        let tree = MerkleTree::from_leaf_ids(&ids, &Sha256Hash).unwrap();
        let proof = tree.proof(3).unwrap();
        let rows = ProofCodec::encode(1, ids[3], &proof.path);
        let path = ProofCodec::decode(&rows).unwrap();
        let recomputed = crate::merkle::fold_path(
            &Sha256Hash,
            Sha256Hash.hash_leaf(&ids[3]),
            path.iter().map(|s| &s.sibling),
        );
        assert_eq!(recomputed, tree.root());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            label in any::<u64>(),
            leaf in any::<[u8; 32]>(),
            steps in prop::collection::vec((any::<[u8; 32]>(), any::<bool>()), 0..20),
        ) {
            let path: Vec<ProofStep> = steps
                .into_iter()
                .map(|(bytes, left)| ProofStep {
                    sibling: Digest::from_hash(bytes),
                    side: if left { Side::Left } else { Side::Right },
                })
                .collect();
            let rows = ProofCodec::encode(label, LeafId::from_bytes(leaf), &path);
            prop_assert_eq!(ProofCodec::decode(&rows).unwrap(), path);
        }
    }
}

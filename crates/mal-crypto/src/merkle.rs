use mal_types::{Digest, LeafId, Side};
use serde::{Deserialize, Serialize};

use crate::hasher::HashPrimitive;

/// Errors from tree construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MerkleError {
    #[error("cannot build a Merkle tree from an empty leaf set")]
    EmptyInput,
}

/// One step of a proof path: the sibling to combine with at one level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Digest,
    pub side: Side,
}

/// Binary Merkle tree with sorted-pair combination.
///
/// Leaves are arranged in ascending byte order before pairing and every
/// parent is `hash(min ++ max)` of its children, so the root depends only on
/// the multiset of leaf digests. When a level has an odd number of nodes, the
/// last node is promoted unchanged and contributes no proof step at that
/// level.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    root: Digest,
    /// Leaf digests in input order.
    leaves: Vec<Digest>,
    /// Input index -> position within `levels[0]`.
    positions: Vec<usize>,
    /// Level 0 = sorted leaves, last level = `[root]`.
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build a tree from already-hashed leaf digests.
    pub fn from_leaves<H>(leaves: Vec<Digest>, hasher: &H) -> Result<Self, MerkleError>
    where
        H: HashPrimitive + ?Sized,
    {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let mut order: Vec<usize> = (0..leaves.len()).collect();
        order.sort_by(|&a, &b| leaves[a].cmp(&leaves[b]));

        let mut positions = vec![0; leaves.len()];
        for (position, &input) in order.iter().enumerate() {
            positions[input] = position;
        }

        let mut current: Vec<Digest> = order.iter().map(|&i| leaves[i]).collect();
        let mut levels = Vec::new();

        while current.len() > 1 {
            let next: Vec<Digest> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hasher.combine(left, right),
                    // Odd node: promoted as-is
                    [lone] => *lone,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(current);
            current = next;
        }

        let root = current[0];
        levels.push(current);

        Ok(Self {
            root,
            leaves,
            positions,
            levels,
        })
    }

    /// Hash each identifier and build the tree over the resulting digests.
    pub fn from_leaf_ids<H>(ids: &[LeafId], hasher: &H) -> Result<Self, MerkleError>
    where
        H: HashPrimitive + ?Sized,
    {
        let leaves = ids.iter().map(|id| hasher.hash_leaf(id)).collect();
        Self::from_leaves(leaves, hasher)
    }

    /// The root hash of the tree.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Number of levels above the leaves (0 for a single leaf).
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Leaf digest at input position `index`.
    pub fn leaf(&self, index: usize) -> Option<Digest> {
        self.leaves.get(index).copied()
    }

    /// Generate an inclusion proof for the leaf at input position `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let mut position = *self.positions.get(index)?;
        let mut path = Vec::with_capacity(self.depth());

        for level in &self.levels[..self.depth()] {
            let sibling = position ^ 1;
            if sibling < level.len() {
                let side = if position % 2 == 0 {
                    Side::Right
                } else {
                    Side::Left
                };
                path.push(ProofStep {
                    sibling: level[sibling],
                    side,
                });
            }
            position /= 2;
        }

        Some(MerkleProof {
            leaf: self.leaves[index],
            path,
            root: self.root,
        })
    }
}

/// Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: Digest,
    /// Sibling steps from leaf to root.
    pub path: Vec<ProofStep>,
    /// Expected root hash.
    pub root: Digest,
}

impl MerkleProof {
    /// Recompute the root from the leaf and path and compare.
    pub fn verify<H: HashPrimitive + ?Sized>(&self, hasher: &H) -> bool {
        fold_path(hasher, self.leaf, self.path.iter().map(|step| &step.sibling)) == self.root
    }

    /// Just the sibling digests, in path order.
    pub fn siblings(&self) -> Vec<Digest> {
        self.path.iter().map(|step| step.sibling).collect()
    }
}

/// Fold a leaf digest with each sibling in order using the sorted-pair rule.
pub fn fold_path<'a, H, I>(hasher: &H, leaf: Digest, siblings: I) -> Digest
where
    H: HashPrimitive + ?Sized,
    I: IntoIterator<Item = &'a Digest>,
{
    siblings
        .into_iter()
        .fold(leaf, |acc, sibling| hasher.combine(&acc, sibling))
}

use serde::{Deserialize, Deserializer, Serialize};

use crate::digest::Digest;
use crate::leaf::LeafId;
use crate::Label;

/// Side of a sibling in a Merkle proof path.
///
/// Informational only: verification always sorts the pair before hashing, so
/// it never needs to trust this tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Left,
    Right,
}

/// One stored step of a leaf's proof path.
///
/// Rows are keyed by `(commit_label, leaf_id, index)`; index 0 is the step
/// closest to the leaf. A row whose side tag is missing or unrecognized
/// still loads with `side: None`, so the damage stays confined to that
/// leaf's proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEntry {
    pub commit_label: Label,
    pub leaf_id: LeafId,
    pub index: u32,
    pub sibling: Digest,
    #[serde(default, deserialize_with = "side_or_none")]
    pub side: Option<Side>,
}

fn side_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Side>, D::Error> {
    let tag = Option::<String>::deserialize(deserializer)?;
    Ok(tag.and_then(|tag| match tag.as_str() {
        "LEFT" => Some(Side::Left),
        "RIGHT" => Some(Side::Right),
        _ => None,
    }))
}

impl ProofEntry {
    /// The storage key of this row.
    pub fn key(&self) -> (Label, LeafId, u32) {
        (self.commit_label, self.leaf_id, self.index)
    }
}

use std::fmt;

use mal_types::Label;
use serde::{Deserialize, Serialize};

use crate::verifier::Verdict;

/// What verification concluded for one identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LeafOutcome {
    /// The path recomputes the anchored root.
    Included { label: Label, verdict: Verdict },
    /// A proof exists but recomputes a different root.
    Mismatch { label: Label, verdict: Verdict },
    /// The commit holds no proof for this identifier.
    ProofNotFound { label: Label },
    /// The identifier is unknown, or known but not yet committed.
    NotCommitted { known: bool },
    /// The stored proof rows do not form a valid path.
    CorruptProof { label: Label, reason: String },
    /// The anchored root could not be read from the ledger.
    AnchorUnavailable { label: Label, reason: String },
    /// The input is not a 32-byte hex identifier.
    InvalidId { reason: String },
}

impl LeafOutcome {
    pub fn is_included(&self) -> bool {
        matches!(self, Self::Included { .. })
    }

    /// Short stable name, used for counting and machine output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Included { .. } => "included",
            Self::Mismatch { .. } => "mismatch",
            Self::ProofNotFound { .. } => "proof_not_found",
            Self::NotCommitted { .. } => "not_committed",
            Self::CorruptProof { .. } => "corrupt_proof",
            Self::AnchorUnavailable { .. } => "anchor_unavailable",
            Self::InvalidId { .. } => "invalid_id",
        }
    }
}

impl fmt::Display for LeafOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Included { label, verdict } => write!(
                f,
                "included in commit {label}: root {} matches anchored root",
                verdict.computed_root
            ),
            Self::Mismatch { label, verdict } => write!(
                f,
                "mismatch in commit {label}: leaf {} recomputes root {}, anchored root is {}",
                verdict.leaf_digest, verdict.computed_root, verdict.expected_root
            ),
            Self::ProofNotFound { label } => write!(f, "no proof path in commit {label}"),
            Self::NotCommitted { known: true } => f.write_str("recorded but not yet committed"),
            Self::NotCommitted { known: false } => f.write_str("unknown identifier"),
            Self::CorruptProof { label, reason } => {
                write!(f, "corrupt proof in commit {label}: {reason}")
            }
            Self::AnchorUnavailable { label, reason } => {
                write!(f, "anchored root of commit {label} unavailable: {reason}")
            }
            Self::InvalidId { reason } => write!(f, "invalid identifier: {reason}"),
        }
    }
}

/// Outcome for one input identifier, in normalized form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafReport {
    pub id: String,
    #[serde(flatten)]
    pub outcome: LeafOutcome,
}

impl fmt::Display for LeafReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.outcome)
    }
}

/// Outcomes of a batch; `ok` only when every identifier is included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub ok: bool,
    pub results: Vec<LeafReport>,
}

impl VerifyReport {
    pub fn new(results: Vec<LeafReport>) -> Self {
        Self {
            ok: results.iter().all(|r| r.outcome.is_included()),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mal_types::Digest;

    fn verdict(included: bool) -> Verdict {
        Verdict {
            included,
            leaf_digest: Digest::from_hash([1; 32]),
            computed_root: Digest::from_hash([2; 32]),
            expected_root: Digest::from_hash([if included { 2 } else { 3 }; 32]),
        }
    }

    #[test]
    fn mismatch_message_names_all_digests() {
        let text = LeafOutcome::Mismatch {
            label: 4,
            verdict: verdict(false),
        }
        .to_string();
        assert!(text.contains("commit 4"));
        assert!(text.contains(&"01".repeat(32)));
        assert!(text.contains(&"02".repeat(32)));
        assert!(text.contains(&"03".repeat(32)));
    }

    #[test]
    fn report_ok_requires_every_inclusion() {
        let included = LeafReport {
            id: "a".into(),
            outcome: LeafOutcome::Included {
                label: 1,
                verdict: verdict(true),
            },
        };
        let missing = LeafReport {
            id: "b".into(),
            outcome: LeafOutcome::ProofNotFound { label: 1 },
        };
        assert!(VerifyReport::new(vec![included.clone()]).ok);
        assert!(!VerifyReport::new(vec![included, missing]).ok);
    }

    #[test]
    fn serializes_with_outcome_tag() {
        let report = LeafReport {
            id: "ab".into(),
            outcome: LeafOutcome::NotCommitted { known: false },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "not_committed");
        assert_eq!(json["id"], "ab");
    }
}

use mal_anchor::AnchorError;
use mal_crypto::MerkleError;
use mal_store::StoreError;
use chrono::{DateTime, Utc};
use mal_types::{AnchorRef, Digest, Label, LeafId, Period, TypeError};

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("no candidate records to commit")]
    EmptyInput,

    #[error("candidate {0} appears more than once")]
    DuplicateCandidate(LeafId),

    #[error("candidate {id} created at {created_at} is outside commit period {period}")]
    OutOfPeriod {
        id: LeafId,
        created_at: DateTime<Utc>,
        period: Period,
    },

    #[error("invalid commit period: {0}")]
    Period(#[from] TypeError),

    #[error("merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("anchor error: {0}")]
    Anchor(AnchorError),

    /// The outcome of the anchor is unknown. Read the reference back before
    /// retrying.
    #[error("anchor for commit {label} not confirmed within {waited_ms} ms (reference {reference})")]
    AnchorTimeout {
        label: Label,
        reference: AnchorRef,
        waited_ms: u64,
    },

    /// The adopted reference anchors a different root than the candidates
    /// produce.
    #[error("commit {label}: reference {reference} anchors {anchored}, candidates give {recomputed}")]
    AnchorMismatch {
        label: Label,
        reference: AnchorRef,
        anchored: Digest,
        recomputed: Digest,
    },

    /// The root is on the ledger but the commit row could not be written.
    /// The reference must be reconciled out of band.
    #[error("commit {label} anchored as {anchor_ref} but not recorded: {source}")]
    OrphanedAnchor {
        label: Label,
        anchor_ref: AnchorRef,
        source: StoreError,
    },

    /// The commit exists; only some proof rows were written.
    #[error("commit {label}: proof rows persisted for {written_leaves} of {total_leaves} leaves: {source}")]
    ProofPersistence {
        label: Label,
        written_leaves: usize,
        total_leaves: usize,
        source: StoreError,
    },

    #[error("commit {label}: stored root {stored} does not match recomputed root {recomputed}")]
    RootMismatch {
        label: Label,
        stored: Digest,
        recomputed: Digest,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type CommitResult<T> = Result<T, CommitError>;

use mal_types::{Commit, Label, LeafId, LeafRecord, Period, ProofEntry};

use crate::error::StoreResult;

/// Storage collaborator of the commit engine.
///
/// All implementations must satisfy these invariants:
/// - `record_commit` is atomic: either the commit row exists and every listed
///   record is linked to it, or nothing changed.
/// - Labels are handed out by `next_label` and claimed by `record_commit`;
///   a commit whose label is not the next one fails with `LabelConflict`.
/// - `insert_proof_entries` is an upsert keyed by `(label, leaf, index)`.
/// - Reads return rows in a deterministic order.
pub trait RecordStore: Send + Sync {
    /// Insert new, unlinked records. Fails on a duplicate identifier without
    /// inserting any record of the batch.
    fn insert_records(&self, records: &[LeafRecord]) -> StoreResult<()>;

    /// Look up one record.
    fn find_record(&self, id: &LeafId) -> StoreResult<Option<LeafRecord>>;

    /// Records created within `period` that are not linked to any commit,
    /// in insertion order.
    fn find_unlinked(&self, period: &Period) -> StoreResult<Vec<LeafRecord>>;

    /// Link records to an existing commit.
    fn link_records(&self, ids: &[LeafId], label: Label) -> StoreResult<()>;

    /// The label the next commit must carry.
    fn next_label(&self) -> StoreResult<Label>;

    /// The commit with the highest label, if any.
    fn latest_commit(&self) -> StoreResult<Option<Commit>>;

    /// Look up a commit by label.
    fn find_commit(&self, label: Label) -> StoreResult<Option<Commit>>;

    /// All commits in label order.
    fn list_commits(&self) -> StoreResult<Vec<Commit>>;

    /// Create `commit` and link every record in `leaf_ids` to it, atomically.
    fn record_commit(&self, commit: &Commit, leaf_ids: &[LeafId]) -> StoreResult<()>;

    /// Upsert proof rows. Returns the number of rows that did not exist before.
    fn insert_proof_entries(&self, rows: &[ProofEntry]) -> StoreResult<usize>;

    /// Proof rows of one leaf in one commit, ordered by index.
    fn find_proof_entries(&self, label: Label, leaf_id: &LeafId) -> StoreResult<Vec<ProofEntry>>;

    /// The frozen leaf set of a commit, in insertion order.
    fn records_for_commit(&self, label: Label) -> StoreResult<Vec<LeafRecord>>;

    /// Number of proof rows stored for a commit.
    fn proof_entry_count(&self, label: Label) -> StoreResult<usize>;
}

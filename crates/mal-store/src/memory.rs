use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use mal_types::{Commit, Label, LeafId, LeafRecord, Period, ProofEntry};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::snapshot::StoreSnapshot;
use crate::traits::RecordStore;

const MIN_LEAF: LeafId = LeafId::from_bytes([0x00; 32]);
const MAX_LEAF: LeafId = LeafId::from_bytes([0xff; 32]);

/// In-memory record store.
///
/// Intended for tests, embedding, and the CLI. All state sits behind one
/// `RwLock`, which makes `record_commit` trivially atomic.
pub struct InMemoryRecordStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    records: Vec<LeafRecord>,
    by_id: HashMap<LeafId, usize>,
    commits: BTreeMap<Label, Commit>,
    proofs: BTreeMap<(Label, LeafId, u32), ProofEntry>,
}

impl StoreState {
    fn next_label(&self) -> Label {
        self.commits.keys().next_back().map_or(1, |last| last + 1)
    }

    /// Check that every id exists and is unlinked, without mutating.
    fn check_linkable(&self, ids: &[LeafId]) -> StoreResult<Vec<usize>> {
        ids.iter()
            .map(|id| {
                let index = *self.by_id.get(id).ok_or(StoreError::RecordNotFound(*id))?;
                match self.records[index].commit_label {
                    Some(label) => Err(StoreError::AlreadyLinked { id: *id, label }),
                    None => Ok(index),
                }
            })
            .collect()
    }
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Rebuild a store from a snapshot, re-checking its invariants.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        let mut state = StoreState::default();

        for record in snapshot.records {
            if state.by_id.contains_key(&record.id) {
                return Err(StoreError::CorruptRecord(format!(
                    "duplicate record {} in snapshot",
                    record.id
                )));
            }
            state.by_id.insert(record.id, state.records.len());
            state.records.push(record);
        }

        for commit in snapshot.commits {
            let expected = state.next_label();
            if commit.label != expected {
                return Err(StoreError::CorruptRecord(format!(
                    "snapshot commit labels not sequential: expected {expected}, found {}",
                    commit.label
                )));
            }
            state.commits.insert(commit.label, commit);
        }

        if let Some(record) = state
            .records
            .iter()
            .find(|r| r.commit_label.is_some_and(|l| !state.commits.contains_key(&l)))
        {
            return Err(StoreError::CorruptRecord(format!(
                "record {} linked to unknown commit",
                record.id
            )));
        }

        for row in snapshot.proofs {
            state.proofs.insert(row.key(), row);
        }

        Ok(Self {
            inner: RwLock::new(state),
        })
    }

    /// Copy the full store contents.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let state = self.read()?;
        Ok(StoreSnapshot {
            records: state.records.clone(),
            commits: state.commits.values().cloned().collect(),
            proofs: state.proofs.values().cloned().collect(),
        })
    }

    /// Number of records.
    pub fn record_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.records.len())
    }

    /// Total number of proof rows across all commits.
    pub fn total_proof_entries(&self) -> StoreResult<usize> {
        Ok(self.read()?.proofs.len())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::Lock)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner.write().map_err(|_| StoreError::Lock)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert_records(&self, records: &[LeafRecord]) -> StoreResult<()> {
        let mut state = self.write()?;

        let mut batch = std::collections::HashSet::with_capacity(records.len());
        for record in records {
            if state.by_id.contains_key(&record.id) || !batch.insert(record.id) {
                return Err(StoreError::DuplicateRecord(record.id));
            }
        }

        for record in records {
            let index = state.records.len();
            state.by_id.insert(record.id, index);
            state.records.push(record.clone());
        }
        debug!(count = records.len(), "inserted records");
        Ok(())
    }

    fn find_record(&self, id: &LeafId) -> StoreResult<Option<LeafRecord>> {
        let state = self.read()?;
        Ok(state.by_id.get(id).map(|&i| state.records[i].clone()))
    }

    fn find_unlinked(&self, period: &Period) -> StoreResult<Vec<LeafRecord>> {
        let state = self.read()?;
        Ok(state
            .records
            .iter()
            .filter(|r| !r.is_linked() && period.contains(&r.created_at))
            .cloned()
            .collect())
    }

    fn link_records(&self, ids: &[LeafId], label: Label) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.commits.contains_key(&label) {
            return Err(StoreError::CommitNotFound(label));
        }
        let indices = state.check_linkable(ids)?;
        for index in indices {
            state.records[index].commit_label = Some(label);
        }
        Ok(())
    }

    fn next_label(&self) -> StoreResult<Label> {
        Ok(self.read()?.next_label())
    }

    fn latest_commit(&self) -> StoreResult<Option<Commit>> {
        Ok(self.read()?.commits.values().next_back().cloned())
    }

    fn find_commit(&self, label: Label) -> StoreResult<Option<Commit>> {
        Ok(self.read()?.commits.get(&label).cloned())
    }

    fn list_commits(&self) -> StoreResult<Vec<Commit>> {
        Ok(self.read()?.commits.values().cloned().collect())
    }

    fn record_commit(&self, commit: &Commit, leaf_ids: &[LeafId]) -> StoreResult<()> {
        let mut state = self.write()?;

        let expected = state.next_label();
        if commit.label != expected {
            return Err(StoreError::LabelConflict {
                expected,
                actual: commit.label,
            });
        }
        let indices = state.check_linkable(leaf_ids)?;

        state.commits.insert(commit.label, commit.clone());
        for index in indices {
            state.records[index].commit_label = Some(commit.label);
        }
        debug!(label = commit.label, linked = leaf_ids.len(), "commit recorded");
        Ok(())
    }

    fn insert_proof_entries(&self, rows: &[ProofEntry]) -> StoreResult<usize> {
        let mut state = self.write()?;
        let mut inserted = 0;
        for row in rows {
            if state.proofs.insert(row.key(), row.clone()).is_none() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn find_proof_entries(&self, label: Label, leaf_id: &LeafId) -> StoreResult<Vec<ProofEntry>> {
        let state = self.read()?;
        Ok(state
            .proofs
            .range((label, *leaf_id, 0)..=(label, *leaf_id, u32::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn records_for_commit(&self, label: Label) -> StoreResult<Vec<LeafRecord>> {
        let state = self.read()?;
        if !state.commits.contains_key(&label) {
            return Err(StoreError::CommitNotFound(label));
        }
        Ok(state
            .records
            .iter()
            .filter(|r| r.commit_label == Some(label))
            .cloned()
            .collect())
    }

    fn proof_entry_count(&self, label: Label) -> StoreResult<usize> {
        let state = self.read()?;
        Ok(state
            .proofs
            .range((label, MIN_LEAF, 0)..=(label, MAX_LEAF, u32::MAX))
            .count())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("InMemoryRecordStore");
        if let Ok(state) = self.inner.read() {
            s.field("records", &state.records.len())
                .field("commits", &state.commits.len())
                .field("proofs", &state.proofs.len());
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use mal_types::{AnchorRef, Digest, Side};

    fn id(seed: u8) -> LeafId {
        LeafId::from_bytes([seed; 32])
    }

    fn at(hours: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::hours(hours)
    }

    fn commit(label: Label, leaf_count: u64) -> Commit {
        Commit {
            label,
            period: Period::new(at(0), at(100)).unwrap(),
            root: Digest::from_hash([label as u8; 32]),
            anchor_ref: AnchorRef::new(format!("tx-{label}")),
            committed_at: at(100),
            leaf_count,
        }
    }

    fn row(label: Label, leaf: LeafId, index: u32) -> ProofEntry {
        ProofEntry {
            commit_label: label,
            leaf_id: leaf,
            index,
            sibling: Digest::from_hash([index as u8; 32]),
            side: Some(Side::Left),
        }
    }

    fn seeded() -> InMemoryRecordStore {
        let store = InMemoryRecordStore::new();
        store
            .insert_records(&[
                LeafRecord::new(id(1), at(1)),
                LeafRecord::new(id(2), at(2)),
                LeafRecord::new(id(3), at(50)),
            ])
            .unwrap();
        store
    }

    #[test]
    fn duplicate_record_rejects_whole_batch() {
        let store = seeded();
        let err = store
            .insert_records(&[LeafRecord::new(id(9), at(1)), LeafRecord::new(id(1), at(1))])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRecord(d) if d == id(1)));
        assert!(store.find_record(&id(9)).unwrap().is_none());
    }

    #[test]
    fn find_unlinked_honors_half_open_period() {
        let store = seeded();
        let period = Period::new(at(1), at(50)).unwrap();
        let found: Vec<LeafId> = store
            .find_unlinked(&period)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(found, vec![id(1), id(2)]);
    }

    #[test]
    fn labels_start_at_one_and_increase() {
        let store = seeded();
        assert_eq!(store.next_label().unwrap(), 1);
        store.record_commit(&commit(1, 1), &[id(1)]).unwrap();
        assert_eq!(store.next_label().unwrap(), 2);
        assert_eq!(store.latest_commit().unwrap().unwrap().label, 1);
    }

    #[test]
    fn record_commit_links_records() {
        let store = seeded();
        store.record_commit(&commit(1, 2), &[id(1), id(2)]).unwrap();
        assert_eq!(store.find_record(&id(1)).unwrap().unwrap().commit_label, Some(1));
        let members: Vec<LeafId> = store
            .records_for_commit(1)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(members, vec![id(1), id(2)]);
    }

    #[test]
    fn stale_label_is_a_conflict() {
        let store = seeded();
        store.record_commit(&commit(1, 1), &[id(1)]).unwrap();
        let err = store.record_commit(&commit(1, 1), &[id(2)]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::LabelConflict {
                expected: 2,
                actual: 1
            }
        ));
        assert!(!store.find_record(&id(2)).unwrap().unwrap().is_linked());
    }

    #[test]
    fn linked_record_cannot_be_claimed_twice() {
        let store = seeded();
        store.record_commit(&commit(1, 1), &[id(1)]).unwrap();
        let err = store.record_commit(&commit(2, 2), &[id(2), id(1)]).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyLinked { label: 1, .. }));
        // Nothing from the failed commit is visible.
        assert!(store.find_commit(2).unwrap().is_none());
        assert!(!store.find_record(&id(2)).unwrap().unwrap().is_linked());
    }

    #[test]
    fn unknown_record_fails_commit() {
        let store = seeded();
        let err = store.record_commit(&commit(1, 1), &[id(42)]).unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(_)));
        assert!(store.latest_commit().unwrap().is_none());
    }

    #[test]
    fn link_records_requires_existing_commit() {
        let store = seeded();
        assert!(matches!(
            store.link_records(&[id(1)], 1),
            Err(StoreError::CommitNotFound(1))
        ));
        store.record_commit(&commit(1, 1), &[id(1)]).unwrap();
        store.link_records(&[id(2)], 1).unwrap();
        assert_eq!(store.records_for_commit(1).unwrap().len(), 2);
    }

    #[test]
    fn proof_rows_upsert_idempotently() {
        let store = seeded();
        let rows = vec![row(1, id(1), 0), row(1, id(1), 1), row(1, id(2), 0)];
        assert_eq!(store.insert_proof_entries(&rows).unwrap(), 3);
        assert_eq!(store.insert_proof_entries(&rows).unwrap(), 0);
        assert_eq!(store.proof_entry_count(1).unwrap(), 3);
        assert_eq!(store.total_proof_entries().unwrap(), 3);
    }

    #[test]
    fn proof_rows_come_back_ordered() {
        let store = seeded();
        store
            .insert_proof_entries(&[
                row(1, id(1), 2),
                row(1, id(1), 0),
                row(1, id(1), 1),
                row(2, id(1), 0),
            ])
            .unwrap();
        let found = store.find_proof_entries(1, &id(1)).unwrap();
        let indices: Vec<u32> = found.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(store.find_proof_entries(1, &id(2)).unwrap().is_empty());
    }

    #[test]
    fn snapshot_roundtrip_preserves_state() {
        let store = seeded();
        store.record_commit(&commit(1, 1), &[id(1)]).unwrap();
        store.insert_proof_entries(&[row(1, id(1), 0)]).unwrap();

        let restored = InMemoryRecordStore::from_snapshot(store.snapshot().unwrap()).unwrap();
        assert_eq!(restored.record_count().unwrap(), 3);
        assert_eq!(restored.next_label().unwrap(), 2);
        assert_eq!(restored.find_proof_entries(1, &id(1)).unwrap().len(), 1);
    }

    #[test]
    fn snapshot_with_dangling_link_is_corrupt() {
        let mut record = LeafRecord::new(id(1), at(1));
        record.commit_label = Some(3);
        let snapshot = StoreSnapshot {
            records: vec![record],
            commits: vec![],
            proofs: vec![],
        };
        assert!(matches!(
            InMemoryRecordStore::from_snapshot(snapshot),
            Err(StoreError::CorruptRecord(_))
        ));
    }
}

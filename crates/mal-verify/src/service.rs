use std::collections::HashMap;
use std::sync::Arc;

use mal_anchor::Anchorer;
use mal_crypto::{ProofCodec, ProofStep};
use mal_store::{RecordStore, StoreError};
use mal_types::{Commit, Digest, Label, LeafId};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{VerifyError, VerifyResult};
use crate::outcome::{LeafOutcome, LeafReport, VerifyReport};
use crate::verifier::InclusionVerifier;

/// Verifies leaves against their commit's anchored root.
///
/// Anchored roots are read through the ledger once per label and cached for
/// the lifetime of the service.
pub struct VerifyService {
    store: Arc<dyn RecordStore>,
    anchorer: Anchorer,
    verifier: InclusionVerifier,
    roots: RwLock<HashMap<Label, Digest>>,
}

impl VerifyService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        anchorer: Anchorer,
        verifier: InclusionVerifier,
    ) -> Self {
        Self {
            store,
            anchorer,
            verifier,
            roots: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Verify a leaf through its own record and commit link.
    pub async fn verify_leaf(&self, leaf_id: &LeafId) -> VerifyResult<LeafOutcome> {
        let Some(record) = self.store.find_record(leaf_id)? else {
            return Ok(LeafOutcome::NotCommitted { known: false });
        };
        match record.commit_label {
            Some(label) => self.verify_in_commit(label, leaf_id).await,
            None => Ok(LeafOutcome::NotCommitted { known: true }),
        }
    }

    /// Verify a leaf against a known commit, whether or not a record for it
    /// exists.
    pub async fn verify_in_commit(
        &self,
        label: Label,
        leaf_id: &LeafId,
    ) -> VerifyResult<LeafOutcome> {
        let commit = self
            .store
            .find_commit(label)?
            .ok_or(StoreError::CommitNotFound(label))?;

        let path = match self.load_path(&commit, leaf_id)? {
            Ok(Some(path)) => path,
            Ok(None) => return Ok(LeafOutcome::ProofNotFound { label }),
            Err(reason) => return Ok(LeafOutcome::CorruptProof { label, reason }),
        };

        let root = match self.anchored_root(&commit).await {
            Ok(root) => root,
            Err(reason) => return Ok(LeafOutcome::AnchorUnavailable { label, reason }),
        };

        let verdict = self.verifier.verify(leaf_id, &path, &root);
        if verdict.included {
            Ok(LeafOutcome::Included { label, verdict })
        } else {
            warn!(
                label,
                leaf = %leaf_id,
                computed = %verdict.computed_root,
                "proof does not reach anchored root"
            );
            Ok(LeafOutcome::Mismatch { label, verdict })
        }
    }

    /// Verify a batch of textual identifiers.
    ///
    /// Identifiers are trimmed and lowercased; one bad identifier or proof
    /// never aborts the rest of the batch.
    pub async fn verify_many<S: AsRef<str>>(&self, ids: &[S]) -> VerifyResult<VerifyReport> {
        if ids.is_empty() {
            return Err(VerifyError::EmptyInput);
        }
        info!(count = ids.len(), "verifying identifiers");

        let mut results = Vec::with_capacity(ids.len());
        for raw in ids {
            let normalized = raw.as_ref().trim().to_ascii_lowercase();
            let outcome = match LeafId::from_hex(&normalized) {
                Ok(leaf_id) => self.verify_leaf(&leaf_id).await?,
                Err(e) => LeafOutcome::InvalidId {
                    reason: e.to_string(),
                },
            };
            results.push(LeafReport {
                id: normalized,
                outcome,
            });
        }

        let report = VerifyReport::new(results);
        info!(count = report.results.len(), ok = report.ok, "verification finished");
        Ok(report)
    }

    /// Stored path of `leaf_id`, `Ok(None)` when there is none, or the
    /// reason the stored rows are unusable.
    fn load_path(
        &self,
        commit: &Commit,
        leaf_id: &LeafId,
    ) -> VerifyResult<Result<Option<Vec<ProofStep>>, String>> {
        let rows = self.store.find_proof_entries(commit.label, leaf_id)?;

        if rows.is_empty() {
            // A one-leaf commit stores no rows: the leaf digest is the root.
            let sole_member = commit.leaf_count == 1
                && self
                    .store
                    .find_record(leaf_id)?
                    .is_some_and(|r| r.commit_label == Some(commit.label));
            return Ok(if sole_member { Ok(Some(Vec::new())) } else { Ok(None) });
        }

        Ok(ProofCodec::decode(&rows).map(Some).map_err(|e| e.to_string()))
    }

    async fn anchored_root(&self, commit: &Commit) -> Result<Digest, String> {
        if let Some(root) = self.roots.read().await.get(&commit.label) {
            return Ok(*root);
        }

        let root = self
            .anchorer
            .read_root(&commit.anchor_ref, commit.label)
            .await
            .map_err(|e| e.to_string())?;
        if root != commit.root {
            warn!(
                label = commit.label,
                anchored = %root,
                stored = %commit.root,
                "anchored root differs from stored root"
            );
        }
        debug!(label = commit.label, root = %root, "anchored root cached");
        self.roots.write().await.insert(commit.label, root);
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use mal_anchor::{AnchorConfig, InMemoryLedger, LedgerAnchor};
    use mal_commit::{BatcherConfig, CommitBatcher};
    use mal_crypto::{HashAlgorithm, HashPrimitive};
    use mal_store::InMemoryRecordStore;
    use mal_types::{LeafRecord, ProofEntry, Side};

    struct Fixture {
        store: Arc<InMemoryRecordStore>,
        ledger: Arc<InMemoryLedger>,
        service: VerifyService,
    }

    fn anchorer(ledger: Arc<InMemoryLedger>) -> Anchorer {
        Anchorer::new(
            ledger,
            AnchorConfig {
                timeout_ms: 1_000,
                poll_interval_ms: 1,
                read_timeout_ms: 1_000,
            },
        )
    }

    fn id(byte: u8) -> LeafId {
        LeafId::from_bytes([byte; 32])
    }

    /// Commit `committed` ids, then record `pending` ids without committing.
    async fn fixture(committed: &[LeafId], pending: &[LeafId]) -> Fixture {
        let store = Arc::new(InMemoryRecordStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        let records: Vec<LeafRecord> = committed
            .iter()
            .map(|id| LeafRecord::new(*id, now - Duration::hours(1)))
            .collect();
        store.insert_records(&records).unwrap();
        if !committed.is_empty() {
            CommitBatcher::new(store.clone(), anchorer(ledger.clone()), BatcherConfig::default())
                .commit_pending(now)
                .await
                .unwrap();
        }
        let later: Vec<LeafRecord> = pending.iter().map(|id| LeafRecord::new(*id, now)).collect();
        store.insert_records(&later).unwrap();

        let service = VerifyService::new(
            store.clone(),
            anchorer(ledger.clone()),
            InclusionVerifier::new(HashAlgorithm::Sha256),
        );
        Fixture { store, ledger, service }
    }

    #[tokio::test]
    async fn committed_leaves_are_included() {
        let ids = [id(0xaa), id(0xbb), id(0xcc)];
        let fx = fixture(&ids, &[]).await;
        for leaf in &ids {
            let outcome = fx.service.verify_leaf(leaf).await.unwrap();
            assert!(outcome.is_included(), "{outcome}");
        }
    }

    #[tokio::test]
    async fn unknown_and_pending_are_not_committed() {
        let fx = fixture(&[id(1), id(2)], &[id(3)]).await;
        assert_eq!(
            fx.service.verify_leaf(&id(9)).await.unwrap(),
            LeafOutcome::NotCommitted { known: false }
        );
        assert_eq!(
            fx.service.verify_leaf(&id(3)).await.unwrap(),
            LeafOutcome::NotCommitted { known: true }
        );
    }

    #[tokio::test]
    async fn synthetic_id_has_no_proof() {
        let fx = fixture(&[id(1), id(2), id(3)], &[]).await;
        assert_eq!(
            fx.service.verify_in_commit(1, &id(0x55)).await.unwrap(),
            LeafOutcome::ProofNotFound { label: 1 }
        );
    }

    #[tokio::test]
    async fn single_leaf_commit_verifies_with_empty_path() {
        let fx = fixture(&[id(7)], &[]).await;
        assert!(fx.service.verify_leaf(&id(7)).await.unwrap().is_included());
        assert_eq!(
            fx.service.verify_in_commit(1, &id(8)).await.unwrap(),
            LeafOutcome::ProofNotFound { label: 1 }
        );
    }

    #[tokio::test]
    async fn tampered_sibling_is_a_mismatch() {
        let fx = fixture(&[id(1), id(2), id(3), id(4)], &[]).await;
        let mut rows = fx.store.find_proof_entries(1, &id(1)).unwrap();
        rows[0].sibling = Digest::from_hash([0x42; 32]);
        fx.store.insert_proof_entries(&rows).unwrap();

        match fx.service.verify_leaf(&id(1)).await.unwrap() {
            LeafOutcome::Mismatch { label, verdict } => {
                assert_eq!(label, 1);
                assert_eq!(verdict.leaf_digest, HashAlgorithm::Sha256.hash_leaf(&id(1)));
                assert_ne!(verdict.computed_root, verdict.expected_root);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn index_gap_is_corrupt() {
        let fx = fixture(&[id(1), id(2), id(3), id(4)], &[]).await;
        fx.store
            .insert_proof_entries(&[ProofEntry {
                commit_label: 1,
                leaf_id: id(1),
                index: 5,
                sibling: Digest::zero(),
                side: Some(Side::Left),
            }])
            .unwrap();
        assert!(matches!(
            fx.service.verify_leaf(&id(1)).await.unwrap(),
            LeafOutcome::CorruptProof { label: 1, .. }
        ));
    }

    #[tokio::test]
    async fn untagged_row_only_affects_its_leaf() {
        let ids = [id(1), id(2), id(3), id(4)];
        let fx = fixture(&ids, &[]).await;
        let mut rows = fx.store.find_proof_entries(1, &id(1)).unwrap();
        rows[0].side = None;
        fx.store.insert_proof_entries(&rows).unwrap();

        match fx.service.verify_leaf(&id(1)).await.unwrap() {
            LeafOutcome::CorruptProof { label, reason } => {
                assert_eq!(label, 1);
                assert!(reason.contains("no side tag"), "{reason}");
            }
            other => panic!("expected corrupt proof, got {other:?}"),
        }

        let inputs: Vec<String> = ids.iter().map(LeafId::to_hex).collect();
        let report = fx.service.verify_many(&inputs).await.unwrap();
        assert!(!report.ok);
        assert_eq!(report.results[0].outcome.kind(), "corrupt_proof");
        assert!(report.results[1..].iter().all(|r| r.outcome.is_included()));
    }

    #[tokio::test]
    async fn unreadable_anchor_is_reported() {
        let fx = fixture(&[id(1), id(2)], &[]).await;
        let ledger_less = VerifyService::new(
            fx.store.clone(),
            anchorer(Arc::new(InMemoryLedger::new())),
            InclusionVerifier::default(),
        );
        assert!(matches!(
            ledger_less.verify_leaf(&id(1)).await.unwrap(),
            LeafOutcome::AnchorUnavailable { label: 1, .. }
        ));
    }

    #[tokio::test]
    async fn anchored_root_is_cached() {
        let fx = fixture(&[id(1), id(2)], &[]).await;
        assert!(fx.service.verify_leaf(&id(1)).await.unwrap().is_included());
        fx.service.roots.write().await.insert(1, Digest::zero());
        assert!(matches!(
            fx.service.verify_leaf(&id(2)).await.unwrap(),
            LeafOutcome::Mismatch { .. }
        ));
        let reference = fx.store.find_commit(1).unwrap().unwrap().anchor_ref;
        assert!(fx.ledger.read_anchor(&reference, 1).await.is_ok());
    }

    #[tokio::test]
    async fn verify_many_normalizes_and_continues() {
        let fx = fixture(&[id(0xaa), id(0xbb)], &[]).await;
        let upper = id(0xaa).to_hex().to_uppercase();
        let inputs = vec![
            format!("  {upper} "),
            "not-hex".to_string(),
            id(0x99).to_hex(),
            id(0xbb).to_hex(),
        ];

        let report = fx.service.verify_many(&inputs).await.unwrap();
        assert!(!report.ok);
        assert_eq!(report.results[0].id, id(0xaa).to_hex());
        assert!(report.results[0].outcome.is_included());
        assert_eq!(report.results[1].outcome.kind(), "invalid_id");
        assert_eq!(report.results[2].outcome, LeafOutcome::NotCommitted { known: false });
        assert!(report.results[3].outcome.is_included());
    }

    #[tokio::test]
    async fn verify_many_rejects_empty_input() {
        let fx = fixture(&[id(1)], &[]).await;
        let none: Vec<String> = Vec::new();
        assert!(matches!(
            fx.service.verify_many(&none).await,
            Err(VerifyError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn unknown_commit_is_an_error() {
        let fx = fixture(&[id(1)], &[]).await;
        assert!(matches!(
            fx.service.verify_in_commit(4, &id(1)).await,
            Err(VerifyError::Store(StoreError::CommitNotFound(4)))
        ));
    }
}

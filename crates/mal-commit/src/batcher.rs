use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mal_anchor::{AnchorError, Anchorer};
use mal_crypto::{MerkleTree, ProofCodec};
use mal_store::{RecordStore, StoreError};
use mal_types::{AnchorRef, Commit, Label, LeafId, LeafRecord, Period, ProofEntry};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::BatcherConfig;
use crate::error::{CommitError, CommitResult};

/// Label and period the next commit will claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPlan {
    pub label: Label,
    pub period: Period,
}

/// Result of a successful commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub commit: Commit,
    /// Proof rows written across all chunks.
    pub proof_rows: usize,
    /// Store calls used to write them.
    pub proof_chunks: usize,
}

/// Result of re-persisting a commit's proofs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub label: Label,
    pub leaves: usize,
    pub proof_rows: usize,
    /// Rows that were missing before the repair.
    pub inserted: usize,
    pub proof_chunks: usize,
}

struct ChunkStats {
    rows: usize,
    inserted: usize,
    chunks: usize,
}

/// Builds, anchors, and persists commits.
///
/// Commits are serialized through an async writer lock. The store enforces
/// the label sequence and the one-time record link on its own, so two
/// batchers over one store still cannot claim the same label or record.
pub struct CommitBatcher {
    store: Arc<dyn RecordStore>,
    anchorer: Anchorer,
    config: BatcherConfig,
    writer: Mutex<()>,
}

impl CommitBatcher {
    pub fn new(store: Arc<dyn RecordStore>, anchorer: Anchorer, config: BatcherConfig) -> Self {
        Self {
            store,
            anchorer,
            config,
            writer: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Plan the commit that would close at `now`.
    ///
    /// The period starts where the latest commit ended, or `lookback_days`
    /// before `now` for the first commit. A configured `period_offset_days`
    /// takes precedence over both.
    pub fn plan(&self, now: DateTime<Utc>) -> CommitResult<CommitPlan> {
        let label = self.store.next_label()?;
        let start = match self.config.period_offset_days {
            Some(days) => now - Duration::days(i64::from(days)),
            None => match self.store.latest_commit()? {
                Some(previous) => previous.period.end,
                None => now - Duration::days(i64::from(self.config.lookback_days)),
            },
        };
        let period = Period::new(start, now)?;
        debug!(label, %period, "commit planned");
        Ok(CommitPlan { label, period })
    }

    /// Plan a commit ending at `now` and commit every unlinked record in its
    /// period.
    pub async fn commit_pending(&self, now: DateTime<Utc>) -> CommitResult<CommitReceipt> {
        let plan = self.plan(now)?;
        let candidates = self.store.find_unlinked(&plan.period)?;
        info!(label = plan.label, candidates = candidates.len(), "pending records found");
        self.commit(&plan, &candidates).await
    }

    /// Commit `candidates` under `plan`.
    ///
    /// Candidates are checked against the store before anything is anchored,
    /// so a stale plan, an already-linked record, or a record outside the
    /// planned period fails without touching the ledger.
    pub async fn commit(
        &self,
        plan: &CommitPlan,
        candidates: &[LeafRecord],
    ) -> CommitResult<CommitReceipt> {
        if candidates.is_empty() {
            return Err(CommitError::EmptyInput);
        }
        let _writer = self.writer.lock().await;
        let label = plan.label;

        let ids = self.check_candidates(plan, candidates)?;
        let tree = MerkleTree::from_leaf_ids(&ids, &self.config.hash)?;
        let root = tree.root();
        info!(
            label,
            leaves = ids.len(),
            depth = tree.depth(),
            root = %root,
            "merkle root computed"
        );

        let anchor_ref = self
            .anchorer
            .anchor(label, root)
            .await
            .map_err(|e| anchor_failure(label, e))?;
        self.finish(plan, &ids, &tree, anchor_ref)
    }

    /// Finish a commit whose root was already submitted as `reference`,
    /// typically after [`CommitError::AnchorTimeout`].
    ///
    /// Waits for the reference to confirm, reads the anchored root back and
    /// requires it to equal the root of `candidates`. Nothing is submitted to
    /// the ledger.
    pub async fn adopt_anchor(
        &self,
        plan: &CommitPlan,
        candidates: &[LeafRecord],
        reference: &AnchorRef,
    ) -> CommitResult<CommitReceipt> {
        if candidates.is_empty() {
            return Err(CommitError::EmptyInput);
        }
        let _writer = self.writer.lock().await;
        let label = plan.label;

        let ids = self.check_candidates(plan, candidates)?;
        let tree = MerkleTree::from_leaf_ids(&ids, &self.config.hash)?;

        self.anchorer
            .await_confirmation(label, reference)
            .await
            .map_err(|e| anchor_failure(label, e))?;
        let anchored = self
            .anchorer
            .read_root(reference, label)
            .await
            .map_err(|e| anchor_failure(label, e))?;
        if anchored != tree.root() {
            return Err(CommitError::AnchorMismatch {
                label,
                reference: reference.clone(),
                anchored,
                recomputed: tree.root(),
            });
        }
        info!(label, reference = %reference, leaves = ids.len(), "submitted anchor adopted");

        self.finish(plan, &ids, &tree, reference.clone())
    }

    /// Record the anchored commit, link its records, and persist its proofs.
    fn finish(
        &self,
        plan: &CommitPlan,
        ids: &[LeafId],
        tree: &MerkleTree,
        anchor_ref: AnchorRef,
    ) -> CommitResult<CommitReceipt> {
        let label = plan.label;
        let commit = Commit {
            label,
            period: plan.period,
            root: tree.root(),
            anchor_ref: anchor_ref.clone(),
            committed_at: Utc::now(),
            leaf_count: ids.len() as u64,
        };
        if let Err(source) = self.store.record_commit(&commit, ids) {
            error!(
                label,
                anchor_ref = %anchor_ref,
                error = %source,
                "anchored commit could not be recorded"
            );
            return Err(CommitError::OrphanedAnchor {
                label,
                anchor_ref,
                source,
            });
        }
        info!(label, anchor_ref = %anchor_ref, "commit recorded");

        let stats = self.persist_proofs(label, ids, tree)?;
        info!(label, rows = stats.rows, chunks = stats.chunks, "proofs persisted");

        Ok(CommitReceipt {
            commit,
            proof_rows: stats.rows,
            proof_chunks: stats.chunks,
        })
    }

    /// Recompute and upsert every proof row of commit `label` from its frozen
    /// leaf set. Safe to run any number of times.
    pub async fn repair_proofs(&self, label: Label) -> CommitResult<RepairReport> {
        let _writer = self.writer.lock().await;

        let commit = self
            .store
            .find_commit(label)?
            .ok_or(StoreError::CommitNotFound(label))?;
        let ids: Vec<LeafId> = self
            .store
            .records_for_commit(label)?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let tree = MerkleTree::from_leaf_ids(&ids, &self.config.hash)?;
        if tree.root() != commit.root {
            return Err(CommitError::RootMismatch {
                label,
                stored: commit.root,
                recomputed: tree.root(),
            });
        }

        let stats = self.persist_proofs(label, &ids, &tree)?;
        if stats.inserted > 0 {
            warn!(label, inserted = stats.inserted, "missing proof rows restored");
        } else {
            info!(label, rows = stats.rows, "proofs already complete");
        }

        Ok(RepairReport {
            label,
            leaves: ids.len(),
            proof_rows: stats.rows,
            inserted: stats.inserted,
            proof_chunks: stats.chunks,
        })
    }

    fn check_candidates(
        &self,
        plan: &CommitPlan,
        candidates: &[LeafRecord],
    ) -> CommitResult<Vec<LeafId>> {
        let next = self.store.next_label()?;
        if plan.label != next {
            return Err(StoreError::LabelConflict {
                expected: next,
                actual: plan.label,
            }
            .into());
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        for record in candidates {
            if !seen.insert(record.id) {
                return Err(CommitError::DuplicateCandidate(record.id));
            }
            match self.store.find_record(&record.id)? {
                None => return Err(StoreError::RecordNotFound(record.id).into()),
                Some(stored) => {
                    if let Some(label) = stored.commit_label {
                        return Err(StoreError::AlreadyLinked {
                            id: record.id,
                            label,
                        }
                        .into());
                    }
                    if !plan.period.contains(&stored.created_at) {
                        return Err(CommitError::OutOfPeriod {
                            id: record.id,
                            created_at: stored.created_at,
                            period: plan.period,
                        });
                    }
                }
            }
        }
        Ok(candidates.iter().map(|r| r.id).collect())
    }

    /// Write proof rows `proof_chunk_leaves` leaves at a time. A chunk never
    /// splits one leaf's path; leaves without a path produce no rows.
    fn persist_proofs(
        &self,
        label: Label,
        ids: &[LeafId],
        tree: &MerkleTree,
    ) -> CommitResult<ChunkStats> {
        let chunk_leaves = self.config.proof_chunk_leaves.max(1);
        let mut stats = ChunkStats {
            rows: 0,
            inserted: 0,
            chunks: 0,
        };

        for (chunk_no, chunk) in ids.chunks(chunk_leaves).enumerate() {
            let first = chunk_no * chunk_leaves;
            let rows: Vec<ProofEntry> = chunk
                .iter()
                .enumerate()
                .filter_map(|(offset, id)| {
                    tree.proof(first + offset)
                        .map(|proof| ProofCodec::encode(label, *id, &proof.path))
                })
                .flatten()
                .collect();
            if rows.is_empty() {
                continue;
            }

            let inserted = self
                .store
                .insert_proof_entries(&rows)
                .map_err(|source| CommitError::ProofPersistence {
                    label,
                    written_leaves: first,
                    total_leaves: ids.len(),
                    source,
                })?;
            debug!(label, chunk = chunk_no, rows = rows.len(), inserted, "proof chunk written");

            stats.rows += rows.len();
            stats.inserted += inserted;
            stats.chunks += 1;
        }
        Ok(stats)
    }
}

fn anchor_failure(label: Label, error: AnchorError) -> CommitError {
    match error {
        AnchorError::Timeout {
            reference,
            waited_ms,
        } => CommitError::AnchorTimeout {
            label,
            reference,
            waited_ms,
        },
        other => CommitError::Anchor(other),
    }
}

//! Sampled audits: statistical confidence that a commit's proofs hold.
//!
//! A pass draws `k` members of a commit uniformly at random (with
//! replacement) and `k` random identifiers that were never recorded, then
//! verifies both populations. Members are expected to be included and
//! synthetic identifiers to have no proof; a synthetic inclusion is a false
//! acceptance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mal_store::RecordStore;
use mal_types::{Label, LeafId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{VerifyError, VerifyResult};
use crate::outcome::LeafOutcome;
use crate::service::VerifyService;

/// Outcome counts and wall-clock time for one population.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub sampled: usize,
    pub included: usize,
    pub mismatch: usize,
    pub proof_not_found: usize,
    pub not_committed: usize,
    pub corrupt_proof: usize,
    pub anchor_unavailable: usize,
    pub elapsed: Duration,
}

impl PopulationStats {
    pub fn record(&mut self, outcome: &LeafOutcome) {
        self.sampled += 1;
        match outcome {
            LeafOutcome::Included { .. } => self.included += 1,
            LeafOutcome::Mismatch { .. } => self.mismatch += 1,
            LeafOutcome::ProofNotFound { .. } => self.proof_not_found += 1,
            LeafOutcome::NotCommitted { .. } | LeafOutcome::InvalidId { .. } => {
                self.not_committed += 1
            }
            LeafOutcome::CorruptProof { .. } => self.corrupt_proof += 1,
            LeafOutcome::AnchorUnavailable { .. } => self.anchor_unavailable += 1,
        }
    }

    /// Fraction of the population that verified as included.
    pub fn inclusion_rate(&self) -> f64 {
        if self.sampled == 0 {
            return 0.0;
        }
        self.included as f64 / self.sampled as f64
    }
}

/// One audit pass over one commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub label: Label,
    pub sample_size: usize,
    pub real: PopulationStats,
    pub synthetic: PopulationStats,
}

impl AuditReport {
    /// Synthetic identifiers that verified as included.
    pub fn false_acceptances(&self) -> usize {
        self.synthetic.included
    }

    /// Members that failed to verify.
    pub fn false_rejections(&self) -> usize {
        self.real.sampled - self.real.included
    }

    pub fn passed(&self) -> bool {
        self.false_acceptances() == 0 && self.false_rejections() == 0
    }
}

/// Drives repeated verification of random members and non-members.
pub struct SampledAudit {
    service: Arc<VerifyService>,
    seed: Option<u64>,
}

impl SampledAudit {
    pub fn new(service: Arc<VerifyService>) -> Self {
        Self { service, seed: None }
    }

    /// Make sampling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// One pass with `k` samples per population.
    pub async fn run(&self, label: Label, k: usize) -> VerifyResult<AuditReport> {
        let members = self.members(label)?;
        let mut rng = self.rng(label, k);
        let real: Vec<LeafId> = (0..k)
            .map(|_| members[rng.gen_range(0..members.len())])
            .collect();
        let synthetic: Vec<LeafId> = (0..k).map(|_| LeafId::random_with(&mut rng)).collect();

        let real = self.verify_population(label, &real).await?;
        let synthetic = self.verify_population(label, &synthetic).await?;
        let report = AuditReport {
            label,
            sample_size: k,
            real,
            synthetic,
        };
        info!(
            label,
            k,
            real_ms = report.real.elapsed.as_millis() as u64,
            synthetic_ms = report.synthetic.elapsed.as_millis() as u64,
            false_acceptances = report.false_acceptances(),
            false_rejections = report.false_rejections(),
            "audit pass finished"
        );
        Ok(report)
    }

    /// One pass per requested sample size, in order.
    pub async fn run_series(
        &self,
        label: Label,
        sizes: &[usize],
    ) -> VerifyResult<Vec<AuditReport>> {
        let mut reports = Vec::with_capacity(sizes.len());
        for &k in sizes {
            reports.push(self.run(label, k).await?);
        }
        Ok(reports)
    }

    /// Up to `count` distinct random members of commit `label`.
    pub fn sample_leaf_ids(&self, label: Label, count: usize) -> VerifyResult<Vec<LeafId>> {
        let members = self.members(label)?;
        let mut rng = self.rng(label, count);
        Ok(members.choose_multiple(&mut rng, count).copied().collect())
    }

    fn members(&self, label: Label) -> VerifyResult<Vec<LeafId>> {
        let members: Vec<LeafId> = self
            .service
            .store()
            .records_for_commit(label)?
            .into_iter()
            .map(|r| r.id)
            .collect();
        if members.is_empty() {
            return Err(VerifyError::NoMembers(label));
        }
        Ok(members)
    }

    fn rng(&self, label: Label, k: usize) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ label.rotate_left(32) ^ k as u64),
            None => StdRng::from_entropy(),
        }
    }

    async fn verify_population(
        &self,
        label: Label,
        ids: &[LeafId],
    ) -> VerifyResult<PopulationStats> {
        let mut stats = PopulationStats::default();
        let started = Instant::now();
        for id in ids {
            let outcome = self.service.verify_in_commit(label, id).await?;
            stats.record(&outcome);
        }
        stats.elapsed = started.elapsed();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use mal_anchor::{AnchorConfig, Anchorer, InMemoryLedger};
    use mal_commit::{BatcherConfig, CommitBatcher};
    use mal_store::{InMemoryRecordStore, StoreError};
    use mal_types::LeafRecord;

    use crate::verifier::InclusionVerifier;

    async fn audit_over(count: usize) -> SampledAudit {
        let store = Arc::new(InMemoryRecordStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let config = AnchorConfig {
            timeout_ms: 1_000,
            poll_interval_ms: 1,
            read_timeout_ms: 1_000,
        };
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let records: Vec<LeafRecord> = (0..count)
            .map(|_| LeafRecord::new(LeafId::random_with(&mut rng), now - ChronoDuration::days(1)))
            .collect();
        store.insert_records(&records).unwrap();
        CommitBatcher::new(
            store.clone(),
            Anchorer::new(ledger.clone(), config.clone()),
            BatcherConfig::default(),
        )
        .commit_pending(now)
        .await
        .unwrap();

        let service = VerifyService::new(
            store,
            Anchorer::new(ledger, config),
            InclusionVerifier::default(),
        );
        SampledAudit::new(Arc::new(service)).with_seed(7)
    }

    #[tokio::test]
    async fn members_pass_and_synthetics_are_rejected() {
        let audit = audit_over(200).await;
        let report = audit.run(1, 50).await.unwrap();

        assert_eq!(report.real.sampled, 50);
        assert_eq!(report.real.included, 50);
        assert_eq!(report.synthetic.sampled, 50);
        assert_eq!(report.synthetic.proof_not_found, 50);
        assert_eq!(report.false_acceptances(), 0);
        assert!(report.passed());
        assert_eq!(report.real.inclusion_rate(), 1.0);
    }

    #[tokio::test]
    async fn series_runs_each_size() {
        let audit = audit_over(20).await;
        let reports = audit.run_series(1, &[1, 5, 30]).await.unwrap();
        let sizes: Vec<usize> = reports.iter().map(|r| r.sample_size).collect();
        assert_eq!(sizes, vec![1, 5, 30]);
        assert!(reports.iter().all(AuditReport::passed));
    }

    #[tokio::test]
    async fn sample_ids_are_distinct_members() {
        let audit = audit_over(10).await;
        let mut ids = audit.sample_leaf_ids(1, 4).unwrap();
        assert_eq!(ids.len(), 4);
        for id in &ids {
            let record = audit.service.store().find_record(id).unwrap().unwrap();
            assert_eq!(record.commit_label, Some(1));
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);

        assert_eq!(audit.sample_leaf_ids(1, 50).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn unknown_commit_fails() {
        let audit = audit_over(3).await;
        assert!(matches!(
            audit.run(2, 1).await,
            Err(VerifyError::Store(StoreError::CommitNotFound(2)))
        ));
    }

    #[test]
    fn stats_count_each_outcome() {
        let mut stats = PopulationStats::default();
        stats.record(&LeafOutcome::ProofNotFound { label: 1 });
        stats.record(&LeafOutcome::NotCommitted { known: false });
        stats.record(&LeafOutcome::CorruptProof {
            label: 1,
            reason: "gap".into(),
        });
        assert_eq!(stats.sampled, 3);
        assert_eq!(stats.proof_not_found, 1);
        assert_eq!(stats.not_committed, 1);
        assert_eq!(stats.corrupt_proof, 1);
        assert_eq!(stats.inclusion_rate(), 0.0);
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use mal_anchor::{Anchorer, InMemoryLedger, LedgerSnapshot};
use mal_commit::{CommitBatcher, CommitPlan};
use mal_store::{InMemoryRecordStore, StoreSnapshot};
use mal_types::{AnchorRef, LeafRecord};
use mal_verify::{InclusionVerifier, VerifyService};
use serde::{Deserialize, Serialize};

use crate::config::MalConfig;

pub const STATE_FILE: &str = "state.json";

/// A commit whose anchor was submitted but not confirmed in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAnchor {
    pub plan: CommitPlan,
    pub candidates: Vec<LeafRecord>,
    pub reference: AnchorRef,
}

/// Everything persisted between invocations.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    store: StoreSnapshot,
    ledger: LedgerSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending: Option<PendingAnchor>,
}

/// Record store, simulated ledger, and configuration of one state directory.
pub struct Workspace {
    path: PathBuf,
    pub config: MalConfig,
    pub store: Arc<InMemoryRecordStore>,
    pub ledger: Arc<InMemoryLedger>,
    pub pending: Option<PendingAnchor>,
}

impl Workspace {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        let config = MalConfig::load(dir)?;
        Self::open_with(dir, config)
    }

    pub fn open_with(dir: &Path, config: MalConfig) -> anyhow::Result<Self> {
        let path = dir.join(STATE_FILE);
        let state: PersistedState = if path.exists() {
            mal_store::read_json(&path).with_context(|| format!("loading {}", path.display()))?
        } else {
            PersistedState::default()
        };
        let store = InMemoryRecordStore::from_snapshot(state.store)
            .with_context(|| format!("restoring records from {}", path.display()))?;

        Ok(Self {
            path,
            config,
            store: Arc::new(store),
            ledger: Arc::new(InMemoryLedger::from_snapshot(state.ledger)),
            pending: state.pending,
        })
    }

    /// An empty workspace that is never written to disk.
    pub fn ephemeral(config: MalConfig) -> Self {
        Self {
            path: PathBuf::new(),
            config,
            store: Arc::new(InMemoryRecordStore::new()),
            ledger: Arc::new(InMemoryLedger::new()),
            pending: None,
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let state = PersistedState {
            store: self.store.snapshot()?,
            ledger: self.ledger.snapshot()?,
            pending: self.pending.clone(),
        };
        mal_store::write_json_atomic(&self.path, &state)
            .with_context(|| format!("saving {}", self.path.display()))?;
        Ok(())
    }

    pub fn anchorer(&self) -> Anchorer {
        Anchorer::new(self.ledger.clone(), self.config.anchor.clone())
    }

    pub fn batcher(&self) -> CommitBatcher {
        CommitBatcher::new(self.store.clone(), self.anchorer(), self.config.batcher.clone())
    }

    pub fn verify_service(&self) -> VerifyService {
        VerifyService::new(
            self.store.clone(),
            self.anchorer(),
            InclusionVerifier::new(self.config.batcher.hash),
        )
    }
}

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use mal_types::{AnchorRef, Digest, Label};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnchorError, AnchorResult};
use crate::payload::{MetadataEntry, PayloadEncoding};
use crate::traits::LedgerAnchor;

/// One transaction on the simulated ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchoredTx {
    pub reference: AnchorRef,
    pub metadata: Vec<MetadataEntry>,
    /// Confirmation polls still needed before the transaction is final.
    pub polls_remaining: u32,
}

impl AnchoredTx {
    pub fn is_confirmed(&self) -> bool {
        self.polls_remaining == 0
    }
}

/// Serializable copy of an [`InMemoryLedger`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub transactions: Vec<AnchoredTx>,
}

/// Simulated immutable ledger.
///
/// A submitted transaction becomes final after `confirm_after` calls to
/// `is_confirmed`. Submission failures and a ledger that never confirms can
/// be injected for testing.
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
}

struct LedgerState {
    transactions: BTreeMap<AnchorRef, AnchoredTx>,
    confirm_after: u32,
    never_confirm: bool,
    fail_submit: bool,
    encoding: PayloadEncoding,
    submissions: u64,
}

impl InMemoryLedger {
    /// A ledger that confirms on the first poll.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState {
                transactions: BTreeMap::new(),
                confirm_after: 1,
                never_confirm: false,
                fail_submit: false,
                encoding: PayloadEncoding::default(),
                submissions: 0,
            }),
        }
    }

    /// Require `polls` confirmation checks before a transaction is final.
    pub fn with_confirm_after(self, polls: u32) -> Self {
        if let Ok(mut state) = self.inner.write() {
            state.confirm_after = polls.max(1);
        }
        self
    }

    /// Submitted transactions never confirm.
    pub fn never_confirming(self) -> Self {
        if let Ok(mut state) = self.inner.write() {
            state.never_confirm = true;
        }
        self
    }

    /// Store future payloads with the given encoding.
    pub fn with_encoding(self, encoding: PayloadEncoding) -> Self {
        if let Ok(mut state) = self.inner.write() {
            state.encoding = encoding;
        }
        self
    }

    /// Make every following `submit` fail.
    pub fn set_fail_submit(&self, fail: bool) -> AnchorResult<()> {
        self.write()?.fail_submit = fail;
        Ok(())
    }

    /// Number of accepted submissions since creation.
    pub fn submission_count(&self) -> AnchorResult<u64> {
        Ok(self.read()?.submissions)
    }

    /// References of all transactions, in reference order.
    pub fn references(&self) -> AnchorResult<Vec<AnchorRef>> {
        Ok(self.read()?.transactions.keys().cloned().collect())
    }

    /// Rebuild a ledger from a snapshot. Confirmation settings start at
    /// their defaults.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let ledger = Self::new();
        if let Ok(mut state) = ledger.inner.write() {
            state.submissions = snapshot.transactions.len() as u64;
            state.transactions = snapshot
                .transactions
                .into_iter()
                .map(|tx| (tx.reference.clone(), tx))
                .collect();
        }
        ledger
    }

    pub fn snapshot(&self) -> AnchorResult<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            transactions: self.read()?.transactions.values().cloned().collect(),
        })
    }

    fn read(&self) -> AnchorResult<RwLockReadGuard<'_, LedgerState>> {
        self.inner.read().map_err(|_| AnchorError::Lock)
    }

    fn write(&self) -> AnchorResult<RwLockWriteGuard<'_, LedgerState>> {
        self.inner.write().map_err(|_| AnchorError::Lock)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Transaction reference: hex BLAKE3 of the submission sequence, label and
/// payload, so resubmitting the same root yields a distinct transaction.
fn transaction_reference(sequence: u64, label: Label, root: &Digest) -> AnchorRef {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&sequence.to_be_bytes());
    hasher.update(&label.to_be_bytes());
    hasher.update(root.as_bytes());
    AnchorRef::new(hex::encode(hasher.finalize().as_bytes()))
}

#[async_trait]
impl LedgerAnchor for InMemoryLedger {
    async fn submit(&self, label: Label, root: Digest) -> AnchorResult<AnchorRef> {
        let mut state = self.write()?;
        if state.fail_submit {
            return Err(AnchorError::Submit("ledger rejected the transaction".into()));
        }

        state.submissions += 1;
        let reference = transaction_reference(state.submissions, label, &root);
        let polls_remaining = if state.never_confirm {
            u32::MAX
        } else {
            state.confirm_after
        };
        let tx = AnchoredTx {
            reference: reference.clone(),
            metadata: vec![MetadataEntry::encode(label, &root, state.encoding)],
            polls_remaining,
        };
        state.transactions.insert(reference.clone(), tx);
        debug!(label, reference = %reference, "transaction accepted");
        Ok(reference)
    }

    async fn is_confirmed(&self, reference: &AnchorRef) -> AnchorResult<bool> {
        let mut state = self.write()?;
        let never_confirm = state.never_confirm;
        let tx = state
            .transactions
            .get_mut(reference)
            .ok_or_else(|| AnchorError::NotFound(reference.to_string()))?;
        if tx.polls_remaining > 0 && !never_confirm {
            tx.polls_remaining -= 1;
        }
        Ok(tx.is_confirmed())
    }

    async fn read_anchor(&self, reference: &AnchorRef, label: Label) -> AnchorResult<Digest> {
        let state = self.read()?;
        let tx = state
            .transactions
            .get(reference)
            .ok_or_else(|| AnchorError::NotFound(reference.to_string()))?;
        if !tx.is_confirmed() {
            return Err(AnchorError::NotFound(format!(
                "{reference} is not confirmed yet"
            )));
        }
        tx.metadata
            .iter()
            .find(|entry| entry.has_label(label))
            .ok_or_else(|| AnchorError::NotFound(format!("{reference} has no label {label}")))?
            .decode_root()
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("InMemoryLedger");
        if let Ok(state) = self.inner.read() {
            s.field("transactions", &state.transactions.len())
                .field("confirm_after", &state.confirm_after);
        }
        s.finish()
    }
}

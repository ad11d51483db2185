use async_trait::async_trait;
use mal_types::{AnchorRef, Digest, Label};

use crate::error::AnchorResult;

/// External immutable ledger used to anchor commit roots.
///
/// Submission and confirmation are separate steps: `submit` returns as soon
/// as the ledger accepted the transaction, `is_confirmed` reports whether it
/// has become final. Retry policy belongs to the caller.
#[async_trait]
pub trait LedgerAnchor: Send + Sync {
    /// Submit `root` as the metadata payload under `label`.
    async fn submit(&self, label: Label, root: Digest) -> AnchorResult<AnchorRef>;

    /// Whether the transaction behind `reference` is final.
    async fn is_confirmed(&self, reference: &AnchorRef) -> AnchorResult<bool>;

    /// Read back the root anchored under `label` in `reference`.
    async fn read_anchor(&self, reference: &AnchorRef, label: Label) -> AnchorResult<Digest>;
}

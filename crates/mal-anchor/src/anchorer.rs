use std::sync::Arc;
use std::time::Duration;

use mal_types::{AnchorRef, Digest, Label};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AnchorError, AnchorResult};
use crate::traits::LedgerAnchor;

/// Bounds on ledger interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Maximum wait for a submitted anchor to confirm.
    pub timeout_ms: u64,
    /// Delay between confirmation polls.
    pub poll_interval_ms: u64,
    /// Maximum wait for reading an anchored root back.
    pub read_timeout_ms: u64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30 * 60 * 1000,
            poll_interval_ms: 5_000,
            read_timeout_ms: 5_000,
        }
    }
}

/// Submit-then-poll wrapper around a [`LedgerAnchor`].
#[derive(Clone)]
pub struct Anchorer {
    ledger: Arc<dyn LedgerAnchor>,
    config: AnchorConfig,
}

impl Anchorer {
    pub fn new(ledger: Arc<dyn LedgerAnchor>, config: AnchorConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Anchor `root` under `label` and wait until the ledger confirms it.
    ///
    /// Expiry of `timeout_ms` yields [`AnchorError::Timeout`] carrying the
    /// submitted reference; the anchor may still confirm afterwards.
    pub async fn anchor(&self, label: Label, root: Digest) -> AnchorResult<AnchorRef> {
        let reference = self.ledger.submit(label, root).await?;
        info!(label, root = %root.short_hex(), reference = %reference, "anchor submitted");
        self.await_confirmation(label, &reference).await?;
        Ok(reference)
    }

    /// Poll an already submitted `reference` until it confirms, bounded by
    /// `timeout_ms`. Never submits.
    pub async fn await_confirmation(
        &self,
        label: Label,
        reference: &AnchorRef,
    ) -> AnchorResult<()> {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let wait = async {
            let mut polls = 0u32;
            loop {
                polls += 1;
                if self.ledger.is_confirmed(reference).await? {
                    return Ok::<u32, AnchorError>(polls);
                }
                debug!(reference = %reference, polls, "waiting for confirmation");
                tokio::time::sleep(poll).await;
            }
        };

        let limit = Duration::from_millis(self.config.timeout_ms);
        let outcome = tokio::time::timeout(limit, wait).await;
        match outcome {
            Ok(Ok(polls)) => {
                info!(label, reference = %reference, polls, "anchor confirmed");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(label, reference = %reference, "anchor confirmation timed out");
                Err(AnchorError::Timeout {
                    reference: reference.clone(),
                    waited_ms: self.config.timeout_ms,
                })
            }
        }
    }

    /// Read the root anchored under `label`, bounded by `read_timeout_ms`.
    pub async fn read_root(&self, reference: &AnchorRef, label: Label) -> AnchorResult<Digest> {
        let read = self.ledger.read_anchor(reference, label);
        match tokio::time::timeout(Duration::from_millis(self.config.read_timeout_ms), read).await
        {
            Ok(result) => result,
            Err(_) => Err(AnchorError::Timeout {
                reference: reference.clone(),
                waited_ms: self.config.read_timeout_ms,
            }),
        }
    }
}

impl std::fmt::Debug for Anchorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anchorer").field("config", &self.config).finish()
    }
}

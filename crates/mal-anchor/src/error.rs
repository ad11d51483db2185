use mal_types::AnchorRef;

/// Errors produced by the ledger collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    #[error("anchor submission failed: {0}")]
    Submit(String),

    /// The ledger did not answer within the bound. The outcome is unknown:
    /// the transaction may still confirm later.
    #[error("timed out after {waited_ms} ms waiting on anchor {reference}")]
    Timeout { reference: AnchorRef, waited_ms: u64 },

    #[error("anchor not found: {0}")]
    NotFound(String),

    #[error("malformed anchor payload: {0}")]
    Malformed(String),

    #[error("ledger lock poisoned")]
    Lock,
}

pub type AnchorResult<T> = Result<T, AnchorError>;

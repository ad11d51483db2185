//! Commit batching for the Merkle Anchor Ledger.
//!
//! [`CommitBatcher`] turns a window of unlinked records into one anchored
//! commit:
//!
//! 1. plan the next label and period ([`CommitBatcher::plan`])
//! 2. hash every identifier and build the Merkle tree
//! 3. anchor the root and wait for confirmation
//! 4. record the commit and link its records in one store transaction
//! 5. persist every leaf's proof path in bounded chunks
//!
//! Failures after step 3 never re-anchor. A failed step 4 is reported as an
//! orphaned anchor; a failed step 5 leaves a valid commit whose proofs can
//! be rebuilt with [`CommitBatcher::repair_proofs`].

pub mod batcher;
pub mod config;
pub mod error;

pub use batcher::{CommitBatcher, CommitPlan, CommitReceipt, RepairReport};
pub use config::BatcherConfig;
pub use error::{CommitError, CommitResult};

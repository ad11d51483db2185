//! Foundation types for the Merkle Anchor Ledger (MAL).
//!
//! Every other MAL crate depends on `mal-types`. The types here are plain
//! data: they carry no storage or ledger behavior.
//!
//! # Key Types
//!
//! - [`Digest`] -- fixed-size 32-byte hash, ordered by unsigned byte value
//! - [`LeafId`] -- opaque 32-byte transaction identifier (lowercase hex)
//! - [`LeafRecord`] -- a leaf identifier with its creation time and commit link
//! - [`Commit`] -- one finalized, anchored batch
//! - [`ProofEntry`] -- one stored step of a leaf's proof path
//! - [`Period`] -- half-open `[start, end)` time window of a batch

pub mod commit;
pub mod digest;
pub mod error;
pub mod leaf;
pub mod proof;

pub use commit::{AnchorRef, Commit, Period};
pub use digest::{Digest, DIGEST_LEN};
pub use error::TypeError;
pub use leaf::{LeafId, LeafRecord};
pub use proof::{ProofEntry, Side};

/// Commit label: the per-batch sequence number, starting at 1.
pub type Label = u64;

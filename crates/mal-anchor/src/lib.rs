//! Ledger anchoring for the Merkle Anchor Ledger.
//!
//! A commit's root is made tamper-evident by writing it to an external,
//! immutable ledger. This crate defines that collaborator as the async
//! [`LedgerAnchor`] trait and wraps it in [`Anchorer`], which turns the
//! ledger's fire-and-poll model into one bounded call.
//!
//! # Anchored Payload
//!
//! The payload is exactly the 32 root bytes, stored as a metadata entry
//! keyed by the commit label. Ledgers hand the bytes back in one of several
//! encodings; [`MetadataEntry::decode_root`] accepts all of them.
//!
//! # Implementations
//!
//! - [`InMemoryLedger`] -- a simulated ledger with configurable confirmation
//!   latency and failure injection, used by tests and the CLI

pub mod anchorer;
pub mod error;
pub mod memory;
pub mod payload;
pub mod traits;

pub use anchorer::{AnchorConfig, Anchorer};
pub use error::{AnchorError, AnchorResult};
pub use memory::{AnchoredTx, InMemoryLedger, LedgerSnapshot};
pub use payload::{MetadataEntry, PayloadEncoding};
pub use traits::LedgerAnchor;

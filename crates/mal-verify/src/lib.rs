//! Inclusion verification for the Merkle Anchor Ledger.
//!
//! - [`InclusionVerifier`] -- pure recomputation of a leaf-to-root path
//! - [`VerifyService`] -- looks up a leaf's commit, stored proof, and
//!   anchored root, and reports a [`LeafOutcome`]
//! - [`SampledAudit`] -- repeated verification of random members and
//!   random non-members of one commit, with timing
//!
//! Per-leaf failures are outcomes, not errors. Only infrastructure failures
//! (the store, an unknown commit, empty input) surface as [`VerifyError`].

pub mod audit;
pub mod error;
pub mod outcome;
pub mod service;
pub mod verifier;

pub use audit::{AuditReport, PopulationStats, SampledAudit};
pub use error::{VerifyError, VerifyResult};
pub use outcome::{LeafOutcome, LeafReport, VerifyReport};
pub use service::VerifyService;
pub use verifier::{InclusionVerifier, Verdict};

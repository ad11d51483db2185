//! Record storage for the Merkle Anchor Ledger.
//!
//! The commit engine never talks to a database directly. It sees the store
//! through the [`RecordStore`] trait: write batches of records, read by
//! filter, and one transactional operation ([`RecordStore::record_commit`])
//! that creates a commit and links its records atomically.
//!
//! # Storage Backends
//!
//! - [`InMemoryRecordStore`] -- `RwLock`-guarded maps for tests, embedding,
//!   and the CLI (persisted between runs as a [`StoreSnapshot`])
//!
//! # Design Rules
//!
//! 1. Records, commits, and proof rows are never deleted.
//! 2. A record is linked to at most one commit, once.
//! 3. Commit labels are a gap-free sequence starting at 1; the store rejects
//!    any commit whose label is not the next one.
//! 4. Proof rows are upserted by `(label, leaf, index)`, so re-inserting is
//!    idempotent.
//! 5. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use snapshot::{read_json, write_json_atomic, StoreSnapshot};
pub use traits::RecordStore;

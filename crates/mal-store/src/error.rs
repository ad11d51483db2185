use mal_types::{Label, LeafId};

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("record not found: {0}")]
    RecordNotFound(LeafId),

    /// The requested commit does not exist.
    #[error("commit not found: label {0}")]
    CommitNotFound(Label),

    /// A record with this identifier was already inserted.
    #[error("duplicate record: {0}")]
    DuplicateRecord(LeafId),

    /// Another writer already claimed this label.
    #[error("label conflict: next label is {expected}, commit carries {actual}")]
    LabelConflict { expected: Label, actual: Label },

    /// The record already belongs to a commit.
    #[error("record {id} is already linked to commit {label}")]
    AlreadyLinked { id: LeafId, label: Label },

    /// Stored data cannot be decoded.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// Serialization failure while persisting.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Lock,

    /// The backend refused or failed the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

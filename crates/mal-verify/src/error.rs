use mal_store::StoreError;
use mal_types::Label;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("no identifiers to verify")]
    EmptyInput,

    #[error("commit {0} has no linked records to sample")]
    NoMembers(Label),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type VerifyResult<T> = Result<T, VerifyError>;

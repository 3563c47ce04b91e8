//! Error type for the notification state store.

use thiserror::Error;

use crate::state::RecordKey;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert was rejected by a constraint other than the key's own
    /// `ON CONFLICT` target.
    #[error("constraint violated for {0}")]
    ConstraintViolation(RecordKey),

    #[error("no record for {0}")]
    NotFound(RecordKey),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("failed preparing database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

impl StoreError {
    pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;

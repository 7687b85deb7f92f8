use thiserror::Error;

/// Coarse error classes surfaced to callers of the row-store layer.
///
/// Several [`RowStoreError`] variants collapse onto the same class; callers
/// that only care about "what kind of failure" match on this instead of on
/// the detailed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Caller broke the API contract.
    Misuse,
    /// A uniqueness or NOT NULL rule would be violated.
    Constraint,
    /// A stored payload could not be decoded.
    Corrupt,
    /// A supplied argument has the wrong shape or type.
    InvalidArgument,
    /// Internal invariant violation.
    Error,
    /// The rowid space of a table is exhausted.
    Full,
}

/// Row-store error types
#[derive(Error, Debug)]
pub enum RowStoreError {
    #[error("misuse: {0}")]
    Misuse(String),

    #[error("constraint failed: {0}")]
    Constraint(String),

    #[error("corrupt record: {0}")]
    CorruptFormat(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("table {0} is full")]
    Full(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Index {0} not found")]
    IndexNotFound(String),

    #[error("B-tree {0} is opened read-only")]
    ReadOnly(String),

    #[error("cursor on {0} is closed")]
    CursorClosed(String),
}

impl RowStoreError {
    /// Returns the error class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RowStoreError::Misuse(_)
            | RowStoreError::TableNotFound(_)
            | RowStoreError::IndexNotFound(_)
            | RowStoreError::ReadOnly(_)
            | RowStoreError::CursorClosed(_) => ErrorCode::Misuse,
            RowStoreError::Constraint(_) => ErrorCode::Constraint,
            RowStoreError::CorruptFormat(_) => ErrorCode::Corrupt,
            RowStoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            RowStoreError::Internal(_) => ErrorCode::Error,
            RowStoreError::Full(_) => ErrorCode::Full,
        }
    }

    pub(crate) fn misuse(msg: impl Into<String>) -> Self {
        RowStoreError::Misuse(msg.into())
    }

    pub(crate) fn constraint(msg: impl Into<String>) -> Self {
        RowStoreError::Constraint(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        RowStoreError::CorruptFormat(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        RowStoreError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RowStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RowStoreError::misuse("x").code(), ErrorCode::Misuse);
        assert_eq!(
            RowStoreError::IndexNotFound("idx".into()).code(),
            ErrorCode::Misuse
        );
        assert_eq!(RowStoreError::constraint("x").code(), ErrorCode::Constraint);
        assert_eq!(RowStoreError::corrupt("x").code(), ErrorCode::Corrupt);
        assert_eq!(RowStoreError::Full("t".into()).code(), ErrorCode::Full);
    }

    #[test]
    fn test_messages_name_the_object() {
        let err = RowStoreError::constraint("Insert fails: unique index idx_name");
        assert!(err.to_string().contains("idx_name"));
        let err = RowStoreError::TableNotFound("users".into());
        assert_eq!(err.to_string(), "Table users not found");
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::value::DataType;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("malformed database: {0}")]
    Malformed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("column '{column}' length {length} outside bounds [{min}, {max}] (0 = unbounded)")]
    Length {
        column: String,
        length: usize,
        min: usize,
        max: usize,
    },

    #[error("column error: {0}")]
    Column(String),

    #[error("column '{column}' expects {expected}, got {found}")]
    Type {
        column: String,
        expected: DataType,
        found: DataType,
    },

    #[error("table error: {0}")]
    Table(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("path error for {}: {reason}", path.display())]
    Path { path: PathBuf, reason: String },

    #[error("password error: {0}")]
    Password(String),
}

/// Discriminant of [`DatabaseError`] for callers that branch on the kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    Length,
    Column,
    Type,
    Table,
    Validation,
    Path,
    Password,
}

impl DatabaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::Malformed(_) | DatabaseError::Io(_) => ErrorKind::Database,
            DatabaseError::Length { .. } => ErrorKind::Length,
            DatabaseError::Column(_) => ErrorKind::Column,
            DatabaseError::Type { .. } => ErrorKind::Type,
            DatabaseError::Table(_) => ErrorKind::Table,
            DatabaseError::Validation(_) => ErrorKind::Validation,
            DatabaseError::Path { .. } => ErrorKind::Path,
            DatabaseError::Password(_) => ErrorKind::Password,
        }
    }

    pub(crate) fn path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DatabaseError::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn authentication() -> Self {
        DatabaseError::Password("authentication failed (wrong password or corrupted file)".into())
    }
}

use std::io;

use thiserror::Error;

use crate::encoding::EncodingError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed path syntax, rejected before any key is built.
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Timeseries creation with no storage group above it and auto-create off.
    #[error("Storage group is not set for path {0}")]
    StorageGroupNotSet(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Path {path} already exists: {reason}")]
    AlreadyExists { path: String, reason: String },

    #[error("Alias {alias} of measurement {path} already exists")]
    AliasAlreadyExists { path: String, alias: String },

    #[error("Storage engine error: {0}")]
    Storage(String),

    /// A commit precondition failed; nothing in the batch was applied.
    #[error("Commit conflict: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Mutex was poisoned")]
    MutexPoisoned,

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

impl Error {
    pub(crate) fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn already_exists(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::AlreadyExists {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for failures of the underlying engine (I/O, conflicts,
    /// undecodable records) as opposed to catalog-level rejections.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Storage(_)
                | Error::Conflict(_)
                | Error::Io(_)
                | Error::MutexPoisoned
                | Error::Corrupted(_)
        )
    }
}

impl From<EncodingError> for Error {
    fn from(err: EncodingError) -> Self {
        Error::Corrupted(err.to_string())
    }
}

impl From<fjall::Error> for Error {
    fn from(err: fjall::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::MutexPoisoned
    }
}

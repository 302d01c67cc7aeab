pub mod bincode;
pub mod format;
pub mod keycode;

use crate::error::Result;
use thiserror::Error;

/// Trait for encoding keys with order preservation.
///
/// Keys must maintain lexicographic ordering after encoding so that prefix
/// and range scans over one depth, or over the children of one node, return
/// exactly the records they name.
pub trait Key {
    /// Encode the key to bytes while preserving sort order
    fn encode(&self) -> Vec<u8>;

    /// Decode bytes back to the original key type
    fn decode(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Trait for encoding values for storage.
///
/// Values don't need to preserve ordering, so we can use more efficient
/// serialization methods.
pub trait Value {
    /// Encode the value to bytes
    fn encode(&self) -> Result<Vec<u8>>;

    /// Decode bytes back to the original value type
    fn decode(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Invalid encoding format: {0}")]
    InvalidFormat(String),
    #[error("Truncated data")]
    TruncatedData,
    #[error("Invalid UTF-8 sequence")]
    InvalidUtf8,
}

//! Error types for upload sessions

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Part {found} out of sequence, expected part {expected}")]
    PartOutOfSequence { expected: u32, found: u32 },

    #[error("Part sizes sum to {parts} bytes but file is {file} bytes")]
    SizeMismatch { parts: u64, file: u64 },

    #[error("Part set mismatch: {0}")]
    PartSetMismatch(String),

    #[error("Empty upload URL for part {0}")]
    MissingUploadUrl(u32),
}

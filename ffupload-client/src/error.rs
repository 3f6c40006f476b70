//! Client error types

use ffupload_core::SessionError;
use thiserror::Error;

/// Failure of a single HTTP exchange
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response is missing the ETag header")]
    MissingEtag,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of an upload, tagged with the phase it happened in
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload negotiation failed: {0}")]
    Negotiation(#[source] RequestError),

    #[error("Upload of part {part_number} failed: {source}")]
    PartUpload {
        part_number: u32,
        #[source]
        source: RequestError,
    },

    #[error("Upload completion failed: {0}")]
    Completion(#[source] RequestError),

    #[error("Finalize failed: {0}")]
    Finalize(#[source] RequestError),

    #[error("Invalid upload session: {0}")]
    InvalidSession(#[from] SessionError),

    #[error("Part task failed: {0}")]
    Task(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether the failure happened after a session was negotiated but
    /// before the object store assembled the object.
    pub fn leaves_open_session(&self) -> bool {
        matches!(
            self,
            UploadError::PartUpload { .. }
                | UploadError::Completion(_)
                | UploadError::InvalidSession(_)
                | UploadError::Task(_)
                | UploadError::Io(_)
        )
    }
}

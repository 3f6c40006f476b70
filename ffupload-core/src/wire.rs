//! Backend request and response bodies
//!
//! Field names match the backend's snake_case JSON. The initialize call
//! answers with an [`UploadSession`](crate::UploadSession) directly.

use serde::{Deserialize, Serialize};

use crate::UploadedPart;

/// Body of `POST {base}/upload-initialize/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub field_id: String,
    pub file_name: String,
    pub file_size: u64,
}

/// Body of `POST {base}/upload-complete/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub upload_signature: String,
    pub upload_id: String,
    pub parts: Vec<UploadedPart>,
}

/// Instructions for the object-store completion call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub complete_url: String,
    /// Opaque payload posted verbatim to `complete_url`
    pub body: String,
}

/// Body of `POST {base}/finalize/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub upload_signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub field_value: String,
}

/// Body of `POST {base}/upload-abort/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortRequest {
    pub upload_signature: String,
    pub upload_id: String,
}

/// Backend endpoint paths, relative to the base URL
pub mod endpoints {
    pub const INITIALIZE: &str = "upload-initialize/";
    pub const COMPLETE: &str = "upload-complete/";
    pub const FINALIZE: &str = "finalize/";
    pub const ABORT: &str = "upload-abort/";
}

//! ffupload Rust client SDK
//!
//! Uploads files to a form backend that hands out pre-signed multipart
//! upload URLs for an object store.

pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod multipart;
pub mod transport;

pub use client::BackendClient;
pub use config::ClientConfig;
pub use error::{RequestError, UploadError};
pub use file::UploadFile;
pub use multipart::{UploadEvent, Uploader};
pub use transport::{HyperTransport, Transport};

pub use ffupload_core::{UploadResult, UploadSession, UploadState, UploadedPart};

pub type Result<T> = std::result::Result<T, UploadError>;

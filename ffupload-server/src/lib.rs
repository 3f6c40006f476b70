//! In-memory development backend for ffupload
//!
//! Serves the backend upload endpoints and a minimal multipart object
//! store, enough to run the client end to end without real storage.

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::ServerError;
pub use server::DevServer;
pub use state::{DevConfig, DevState, DEFAULT_PART_SIZE, MAX_PARTS};

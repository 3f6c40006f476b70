//! Core data types for ffupload

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::SessionError;

/// Upload session negotiated with the backend.
///
/// Created once per upload by the initialize call and never mutated
/// afterwards. The `signature` binds every later backend call to this
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    #[serde(rename = "upload_signature")]
    pub signature: String,
    pub object_key: String,
    pub upload_id: String,
    pub parts: Vec<PartSpec>,
}

impl UploadSession {
    /// Total number of bytes covered by all parts
    pub fn total_size(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }

    /// Number of parts in the session
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Check that `uploaded` covers exactly the session's parts.
    ///
    /// Every part number must appear once, with the size the session
    /// assigned to it.
    pub fn verify_uploaded(&self, uploaded: &[UploadedPart]) -> crate::Result<()> {
        if uploaded.len() != self.parts.len() {
            return Err(SessionError::PartSetMismatch(format!(
                "expected {} parts, got {}",
                self.parts.len(),
                uploaded.len()
            )));
        }

        let mut seen = BTreeSet::new();
        for part in uploaded {
            if !seen.insert(part.part_number) {
                return Err(SessionError::PartSetMismatch(format!(
                    "duplicate part {}",
                    part.part_number
                )));
            }

            let spec = self
                .parts
                .iter()
                .find(|s| s.part_number == part.part_number)
                .ok_or_else(|| {
                    SessionError::PartSetMismatch(format!("unknown part {}", part.part_number))
                })?;

            if spec.size != part.size {
                return Err(SessionError::PartSetMismatch(format!(
                    "part {} has size {}, expected {}",
                    part.part_number, part.size, spec.size
                )));
            }
        }

        Ok(())
    }
}

/// One part of a negotiated upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSpec {
    pub part_number: u32,
    pub size: u64,
    /// Pre-signed URL valid for a single PUT
    pub upload_url: String,
}

/// A part accepted by the object store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadedPart {
    pub part_number: u32,
    pub size: u64,
    pub etag: String,
}

/// Terminal state of an upload as seen by the consuming form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Aborted,
    Successful,
    Error,
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UploadState::Aborted => "aborted",
            UploadState::Successful => "successful",
            UploadState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Result handed back to the form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub value: String,
    pub state: UploadState,
}

impl UploadResult {
    /// Result carrying the finalized field value
    pub fn successful(value: impl Into<String>) -> Self {
        UploadResult {
            value: value.into(),
            state: UploadState::Successful,
        }
    }

    /// Result for an upload that was cancelled before finalizing
    pub fn aborted() -> Self {
        UploadResult {
            value: String::new(),
            state: UploadState::Aborted,
        }
    }

    /// Result for a caller that caught an upload failure
    pub fn errored() -> Self {
        UploadResult {
            value: String::new(),
            state: UploadState::Error,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.state == UploadState::Successful
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(sizes: &[u64]) -> UploadSession {
        UploadSession {
            signature: "sig".to_string(),
            object_key: "key".to_string(),
            upload_id: "id".to_string(),
            parts: sizes
                .iter()
                .enumerate()
                .map(|(i, size)| PartSpec {
                    part_number: i as u32 + 1,
                    size: *size,
                    upload_url: format!("http://store/{}", i + 1),
                })
                .collect(),
        }
    }

    fn uploaded(part_number: u32, size: u64) -> UploadedPart {
        UploadedPart {
            part_number,
            size,
            etag: format!("etag-{}", part_number),
        }
    }

    #[test]
    fn test_verify_uploaded_any_order() {
        let s = session(&[10, 20, 5]);
        let parts = vec![uploaded(3, 5), uploaded(1, 10), uploaded(2, 20)];
        assert!(s.verify_uploaded(&parts).is_ok());
    }

    #[test]
    fn test_verify_uploaded_rejects_mismatches() {
        let s = session(&[10, 20]);

        // Missing
        assert!(s.verify_uploaded(&[uploaded(1, 10)]).is_err());

        // Duplicate
        assert!(s
            .verify_uploaded(&[uploaded(1, 10), uploaded(1, 10)])
            .is_err());

        // Unknown part number
        assert!(s
            .verify_uploaded(&[uploaded(1, 10), uploaded(3, 20)])
            .is_err());

        // Wrong size
        assert!(s
            .verify_uploaded(&[uploaded(1, 10), uploaded(2, 19)])
            .is_err());
    }

    #[test]
    fn test_verify_uploaded_empty_session() {
        let s = session(&[]);
        assert!(s.verify_uploaded(&[]).is_ok());
        assert_eq!(s.total_size(), 0);
    }

    #[test]
    fn test_upload_state_display() {
        assert_eq!(UploadState::Successful.to_string(), "successful");
        assert_eq!(UploadState::Aborted.to_string(), "aborted");
        assert_eq!(UploadState::Error.to_string(), "error");
    }
}

//! Core data models and wire types for ffupload

pub mod error;
pub mod partition;
pub mod types;
pub mod wire;

pub use error::*;
pub use partition::*;
pub use types::*;
pub use wire::*;

/// Result type alias for session validation
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_wire() {
        let json = r#"{
            "upload_signature": "sig-1",
            "object_key": "uploads/avatar/cat.jpg",
            "upload_id": "u-42",
            "parts": [
                {"part_number": 1, "size": 5, "upload_url": "http://store/u-42/1"},
                {"part_number": 2, "size": 3, "upload_url": "http://store/u-42/2"}
            ]
        }"#;

        let session: UploadSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.signature, "sig-1");
        assert_eq!(session.object_key, "uploads/avatar/cat.jpg");
        assert_eq!(session.upload_id, "u-42");
        assert_eq!(session.parts.len(), 2);
        assert_eq!(session.parts[1].size, 3);
        assert_eq!(session.total_size(), 8);
    }

    #[test]
    fn test_upload_result_wire_state() {
        let result = UploadResult::successful("uploads/avatar/cat.jpg");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["state"], "successful");
        assert_eq!(json["value"], "uploads/avatar/cat.jpg");

        let aborted = serde_json::to_value(UploadResult::aborted()).unwrap();
        assert_eq!(aborted["state"], "aborted");
        assert_eq!(aborted["value"], "");

        let errored = serde_json::to_value(UploadResult::errored()).unwrap();
        assert_eq!(errored["state"], "error");
    }

    #[test]
    fn test_uploaded_part_wire_shape() {
        let part = UploadedPart {
            part_number: 1,
            size: 2_097_152,
            etag: "\"a\"".to_string(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"part_number": 1, "size": 2097152, "etag": "\"a\""})
        );
    }
}

//! Client configuration

use std::collections::BTreeMap;
use std::path::Path;

use hyper::header::{HeaderName, HeaderValue};
use hyper::Uri;
use serde::{Deserialize, Serialize};

use crate::{Result, UploadError};

fn default_max_concurrent_parts() -> usize {
    8
}

fn default_abort_on_failure() -> bool {
    true
}

/// Uploader settings.
///
/// Deserializes from JSON, so a whole configuration can be kept in a file:
///
/// ```json
/// { "base_url": "http://localhost:8080/uploads", "max_concurrent_parts": 4 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the backend upload endpoints
    pub base_url: String,

    /// Maximum number of part uploads in flight; 0 means unbounded
    #[serde(default = "default_max_concurrent_parts")]
    pub max_concurrent_parts: usize,

    /// Ask the backend to abort the multipart upload when a transfer fails
    #[serde(default = "default_abort_on_failure")]
    pub abort_on_failure: bool,

    /// Extra headers for backend calls. Never sent to object-store URLs.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            max_concurrent_parts: default_max_concurrent_parts(),
            abort_on_failure: default_abort_on_failure(),
            headers: BTreeMap::new(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| UploadError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn with_max_concurrent_parts(mut self, limit: usize) -> Self {
        self.max_concurrent_parts = limit;
        self
    }

    pub fn with_abort_on_failure(mut self, enabled: bool) -> Self {
        self.abort_on_failure = enabled;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Concurrency bound for part uploads, `None` when unbounded
    pub fn part_concurrency(&self) -> Option<usize> {
        (self.max_concurrent_parts > 0).then_some(self.max_concurrent_parts)
    }

    /// Check the base URL and convert the extra headers
    pub(crate) fn validate(&self) -> Result<Vec<(HeaderName, HeaderValue)>> {
        let uri: Uri = self
            .base_url
            .parse()
            .map_err(|e| UploadError::Config(format!("Invalid base URL: {}", e)))?;

        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(UploadError::Config(format!(
                "Base URL must be absolute: {}",
                self.base_url
            )));
        }

        self.headers
            .iter()
            .map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| UploadError::Config(format!("Invalid header name {}: {}", name, e)))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| UploadError::Config(format!("Invalid value for {}: {}", name, e)))?;
                Ok((name, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "http://localhost:8080/uploads"}"#).unwrap();

        assert_eq!(config.max_concurrent_parts, 8);
        assert!(config.abort_on_failure);
        assert!(config.headers.is_empty());
        assert_eq!(config, ClientConfig::new("http://localhost:8080/uploads"));
    }

    #[test]
    fn test_unbounded_concurrency() {
        let config = ClientConfig::new("http://localhost").with_max_concurrent_parts(0);
        assert_eq!(config.part_concurrency(), None);

        let config = config.with_max_concurrent_parts(3);
        assert_eq!(config.part_concurrency(), Some(3));
    }

    #[test]
    fn test_validate() {
        let headers = ClientConfig::new("http://localhost:8080/api")
            .with_header("X-CSRFToken", "abc123")
            .validate()
            .unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].0, "x-csrftoken");

        assert!(ClientConfig::new("not a url").validate().is_err());
        assert!(ClientConfig::new("/relative/path").validate().is_err());
        assert!(ClientConfig::new("http://localhost")
            .with_header("bad header", "x")
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ffupload.json");
        std::fs::write(
            &path,
            r#"{"base_url": "http://backend", "abort_on_failure": false, "headers": {"Cookie": "s=1"}}"#,
        )
        .unwrap();

        let config = ClientConfig::from_json_file(&path).unwrap();
        assert!(!config.abort_on_failure);
        assert_eq!(config.headers.get("Cookie").map(String::as_str), Some("s=1"));

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            ClientConfig::from_json_file(&path),
            Err(UploadError::Config(_))
        ));
    }
}

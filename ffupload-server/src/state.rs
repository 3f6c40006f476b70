//! In-memory backend and object-store state

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use ffupload_core::{
    AbortRequest, CompleteRequest, CompleteResponse, FinalizeRequest, FinalizeResponse,
    InitializeRequest, PartSpec, UploadSession, UploadedPart,
};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::ServerError;

/// Default part size, the smallest non-final part S3 accepts
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Most parts a single upload may have, as in S3
pub const MAX_PARTS: u64 = 10_000;

/// Dev server settings
#[derive(Debug, Clone)]
pub struct DevConfig {
    /// Size of every part except the last
    pub part_size: u64,
    /// Part numbers whose PUT is answered with a 500
    pub fail_parts: HashSet<u32>,
}

impl Default for DevConfig {
    fn default() -> Self {
        DevConfig {
            part_size: DEFAULT_PART_SIZE,
            fail_parts: HashSet::new(),
        }
    }
}

#[derive(Debug)]
struct PendingUpload {
    signature: String,
    object_key: String,
    part_sizes: Vec<u64>,
    /// part number -> (etag, bytes)
    stored: BTreeMap<u32, (String, Bytes)>,
    /// Completion payload handed out by the backend, once parts were reported
    expected_completion: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    uploads: HashMap<String, PendingUpload>,
    /// signature -> upload id of assembled uploads awaiting finalize
    assembled: HashMap<String, String>,
    objects: HashMap<String, Bytes>,
}

/// Shared server state. Cloning shares the same store.
#[derive(Debug, Clone)]
pub struct DevState {
    config: Arc<DevConfig>,
    public_base: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl DevState {
    /// `public_base` is the URL clients use to reach this server, without a
    /// trailing slash
    pub fn new(config: DevConfig, public_base: impl Into<String>) -> Self {
        let public_base: String = public_base.into();
        DevState {
            config: Arc::new(config),
            public_base: public_base.trim_end_matches('/').into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn config(&self) -> &DevConfig {
        &self.config
    }

    /// Split `file_size` into part sizes of at most `part_size` bytes.
    ///
    /// Files needing more than [`MAX_PARTS`] parts are rejected.
    pub fn split(&self, file_size: u64) -> Result<Vec<u64>, ServerError> {
        let part_size = self.config.part_size.max(1);
        let count = file_size.div_ceil(part_size);
        if count > MAX_PARTS {
            return Err(ServerError::BadRequest(format!(
                "file of {} bytes needs {} parts, at most {} are allowed",
                file_size, count, MAX_PARTS
            )));
        }

        let mut sizes = Vec::with_capacity(count as usize);
        let mut remaining = file_size;
        while remaining > 0 {
            let size = remaining.min(part_size);
            sizes.push(size);
            remaining -= size;
        }
        Ok(sizes)
    }

    /// Negotiate a new upload session
    pub async fn initialize(&self, request: InitializeRequest) -> Result<UploadSession, ServerError> {
        if request.field_id.is_empty() {
            return Err(ServerError::BadRequest("field_id is required".to_string()));
        }
        if request.file_name.is_empty() || request.file_name.contains('/') {
            return Err(ServerError::BadRequest(format!(
                "invalid file name '{}'",
                request.file_name
            )));
        }

        let part_sizes = self.split(request.file_size)?;

        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let upload_id = format!("upload-{}", inner.next_id);
        let object_key = format!("uploads/{}/{}", request.field_id, request.file_name);
        let signature = sign(&upload_id, &object_key);

        let parts = part_sizes
            .iter()
            .enumerate()
            .map(|(i, size)| PartSpec {
                part_number: i as u32 + 1,
                size: *size,
                upload_url: format!("{}/store/{}/{}", self.public_base, upload_id, i + 1),
            })
            .collect();

        inner.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                signature: signature.clone(),
                object_key: object_key.clone(),
                part_sizes,
                stored: BTreeMap::new(),
                expected_completion: None,
            },
        );

        Ok(UploadSession {
            signature,
            object_key,
            upload_id,
            parts,
        })
    }

    /// Store one part and return its ETag
    pub async fn put_part(&self, upload_id: &str, part_number: u32, body: Bytes) -> Result<String, ServerError> {
        if self.config.fail_parts.contains(&part_number) {
            return Err(ServerError::InjectedFailure(part_number));
        }

        let mut inner = self.inner.lock().await;
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| ServerError::NotFound(format!("no such upload {}", upload_id)))?;

        let expected = part_number
            .checked_sub(1)
            .and_then(|i| upload.part_sizes.get(i as usize))
            .copied()
            .ok_or_else(|| ServerError::BadRequest(format!("no part {} in {}", part_number, upload_id)))?;

        if body.len() as u64 != expected {
            return Err(ServerError::BadRequest(format!(
                "part {} is {} bytes, expected {}",
                part_number,
                body.len(),
                expected
            )));
        }

        let etag = format!("\"{:x}\"", Sha256::digest(&body));
        upload.stored.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    /// Check the reported parts and hand out the store completion call
    pub async fn complete(&self, request: CompleteRequest) -> Result<CompleteResponse, ServerError> {
        let mut inner = self.inner.lock().await;
        let upload = inner
            .uploads
            .get_mut(&request.upload_id)
            .ok_or_else(|| ServerError::NotFound(format!("no such upload {}", request.upload_id)))?;

        if upload.signature != request.upload_signature {
            return Err(ServerError::Forbidden("upload signature does not match".to_string()));
        }

        if request.parts.len() != upload.part_sizes.len() {
            return Err(ServerError::BadRequest(format!(
                "expected {} parts, got {}",
                upload.part_sizes.len(),
                request.parts.len()
            )));
        }

        let mut reported: Vec<&UploadedPart> = request.parts.iter().collect();
        reported.sort_by_key(|p| p.part_number);

        let mut body = String::from("<CompleteMultipartUpload>");
        for (index, part) in reported.iter().enumerate() {
            if part.part_number != index as u32 + 1 {
                return Err(ServerError::BadRequest(format!(
                    "part {} reported out of sequence",
                    part.part_number
                )));
            }
            let (etag, bytes) = upload
                .stored
                .get(&part.part_number)
                .ok_or_else(|| ServerError::BadRequest(format!("part {} was never uploaded", part.part_number)))?;
            if *etag != part.etag || bytes.len() as u64 != part.size {
                return Err(ServerError::BadRequest(format!(
                    "part {} does not match the stored part",
                    part.part_number
                )));
            }
            body.push_str(&format!(
                "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
                part.part_number, part.etag
            ));
        }
        body.push_str("</CompleteMultipartUpload>");

        upload.expected_completion = Some(body.clone());

        Ok(CompleteResponse {
            complete_url: format!("{}/store/{}/complete", self.public_base, request.upload_id),
            body,
        })
    }

    /// Assemble the object from its parts
    pub async fn store_complete(
        &self,
        upload_id: &str,
        has_content_type: bool,
        body: &[u8],
    ) -> Result<(), ServerError> {
        if has_content_type {
            return Err(ServerError::Forbidden(
                "request carries a Content-Type it was not signed with".to_string(),
            ));
        }

        let mut inner = self.inner.lock().await;
        let upload = inner
            .uploads
            .get(upload_id)
            .ok_or_else(|| ServerError::NotFound(format!("no such upload {}", upload_id)))?;

        let expected = upload
            .expected_completion
            .as_deref()
            .ok_or_else(|| ServerError::Conflict(format!("upload {} was not completed by the backend", upload_id)))?;
        if expected.as_bytes() != body {
            return Err(ServerError::BadRequest("malformed completion payload".to_string()));
        }

        let mut object = BytesMut::new();
        for (_, bytes) in upload.stored.values() {
            object.extend_from_slice(bytes);
        }

        let signature = upload.signature.clone();
        let object_key = upload.object_key.clone();
        inner.uploads.remove(upload_id);
        inner.objects.insert(object_key.clone(), object.freeze());
        inner.assembled.insert(signature, object_key);
        Ok(())
    }

    /// Return the field value once the object exists
    pub async fn finalize(&self, request: FinalizeRequest) -> Result<FinalizeResponse, ServerError> {
        let mut inner = self.inner.lock().await;

        if let Some(object_key) = inner.assembled.remove(&request.upload_signature) {
            return Ok(FinalizeResponse {
                field_value: object_key,
            });
        }

        let pending = inner
            .uploads
            .values()
            .any(|u| u.signature == request.upload_signature);
        if pending {
            Err(ServerError::Conflict("object is not in the store yet".to_string()))
        } else {
            Err(ServerError::NotFound("unknown upload signature".to_string()))
        }
    }

    /// Drop a pending upload and its stored parts
    pub async fn abort(&self, request: AbortRequest) -> Result<(), ServerError> {
        let mut inner = self.inner.lock().await;
        let upload = inner
            .uploads
            .get(&request.upload_id)
            .ok_or_else(|| ServerError::NotFound(format!("no such upload {}", request.upload_id)))?;

        if upload.signature != request.upload_signature {
            return Err(ServerError::Forbidden("upload signature does not match".to_string()));
        }

        inner.uploads.remove(&request.upload_id);
        Ok(())
    }

    /// Contents of an assembled object
    pub async fn object(&self, object_key: &str) -> Option<Bytes> {
        self.inner.lock().await.objects.get(object_key).cloned()
    }

    /// Number of uploads negotiated but neither assembled nor aborted
    pub async fn pending_uploads(&self) -> usize {
        self.inner.lock().await.uploads.len()
    }
}

fn sign(upload_id: &str, object_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(upload_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(object_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

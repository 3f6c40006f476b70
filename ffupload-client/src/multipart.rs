//! Multipart upload orchestration
//!
//! An upload runs four phases in order: initialize, upload parts,
//! complete, finalize. Only the part phase fans out; it joins every part
//! task before completion starts.

use std::sync::Arc;

use bytes::Bytes;
use ffupload_core::{
    plan_parts, AbortRequest, CompleteRequest, FinalizeRequest, InitializeRequest, UploadResult,
    UploadSession, UploadedPart,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{post_store_completion, put_part, BackendClient};
use crate::{ClientConfig, HyperTransport, Result, Transport, UploadError, UploadFile};

/// Progress notifications emitted while an upload runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Initialized {
        object_key: String,
        parts: usize,
        total_bytes: u64,
    },
    PartUploaded {
        part_number: u32,
        bytes: u64,
    },
    Completed,
    Finalized {
        value: String,
    },
}

/// Drives files through the multipart upload protocol.
///
/// An `Uploader` holds configuration and a transport only; every call to
/// [`Uploader::upload_file`] is independent.
pub struct Uploader<T: Transport = HyperTransport> {
    backend: BackendClient<T>,
    transport: Arc<T>,
    config: ClientConfig,
    events: Option<UnboundedSender<UploadEvent>>,
}

impl Uploader<HyperTransport> {
    /// Create an uploader over plain HTTP
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, HyperTransport::new())
    }
}

impl<T: Transport> Uploader<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let headers = config.validate()?;
        let transport = Arc::new(transport);
        let backend = BackendClient::new(Arc::clone(&transport), config.base_url.clone(), headers);

        Ok(Uploader {
            backend,
            transport,
            config,
            events: None,
        })
    }

    /// Send progress events to `events`
    pub fn with_events(mut self, events: UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Upload `file` for the form field `field_id`.
    ///
    /// Returns a successful result only once the backend has finalized the
    /// object. Any failure is returned as an error tagged with its phase.
    pub async fn upload_file(&self, file: &UploadFile, field_id: &str) -> Result<UploadResult> {
        let session = self.initialize_upload(file, field_id).await?;
        self.assemble(file, &session).await?;
        let value = self.finalize(&session).await?;
        Ok(UploadResult::successful(value))
    }

    /// Like [`Uploader::upload_file`], but stops when `cancel` fires.
    ///
    /// A cancelled upload aborts its in-flight part uploads, asks the
    /// backend to abort the session if one was negotiated, and returns an
    /// `aborted` result. Once the object store has accepted the completion
    /// the object exists, so finalize always runs to its end.
    pub async fn upload_file_with_cancel(
        &self,
        file: &UploadFile,
        field_id: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadResult> {
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(file = file.name(), "upload cancelled before negotiation finished");
                return Ok(UploadResult::aborted());
            }
            session = self.initialize_upload(file, field_id) => session?,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(upload_id = %session.upload_id, "upload cancelled");
                self.abort_session(&session).await;
                return Ok(UploadResult::aborted());
            }
            assembled = self.assemble(file, &session) => assembled?,
        }

        let value = self.finalize(&session).await?;
        Ok(UploadResult::successful(value))
    }

    /// Phase 1: negotiate a session with the backend
    pub async fn initialize_upload(&self, file: &UploadFile, field_id: &str) -> Result<UploadSession> {
        let request = InitializeRequest {
            field_id: field_id.to_string(),
            file_name: file.name().to_string(),
            file_size: file.size(),
        };

        let session = self
            .backend
            .initialize(&request)
            .await
            .map_err(UploadError::Negotiation)?;

        info!(
            upload_id = %session.upload_id,
            object_key = %session.object_key,
            parts = session.part_count(),
            "upload session negotiated"
        );
        self.emit(UploadEvent::Initialized {
            object_key: session.object_key.clone(),
            parts: session.part_count(),
            total_bytes: session.total_size(),
        });

        Ok(session)
    }

    /// Phase 2: PUT every part of `data` to its pre-signed URL.
    ///
    /// Parts run concurrently up to the configured bound. The first failure
    /// cancels the remaining part tasks and is returned once they have
    /// stopped. Results are ordered by part number.
    pub async fn upload_parts(&self, session: &UploadSession, data: Bytes) -> Result<Vec<UploadedPart>> {
        let ranges = plan_parts(&session.parts, data.len() as u64)?;
        if ranges.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.config.part_concurrency();
        let semaphore = limit.map(|n| Arc::new(Semaphore::new(n)));
        debug!(parts = ranges.len(), limit = ?limit, "dispatching part uploads");

        let mut tasks = JoinSet::new();
        for (spec, range) in session.parts.iter().zip(ranges) {
            let transport = Arc::clone(&self.transport);
            let semaphore = semaphore.clone();
            let events = self.events.clone();
            let upload_url = spec.upload_url.clone();
            let body = data.slice(range.as_range());

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => Some(
                        semaphore
                            .acquire_owned()
                            .await
                            .map_err(|e| UploadError::Task(e.to_string()))?,
                    ),
                    None => None,
                };

                debug!(part = range.part_number, bytes = range.len(), "uploading part");
                let etag = put_part(&*transport, &upload_url, body)
                    .await
                    .map_err(|source| UploadError::PartUpload {
                        part_number: range.part_number,
                        source,
                    })?;

                if let Some(events) = events {
                    let _ = events.send(UploadEvent::PartUploaded {
                        part_number: range.part_number,
                        bytes: range.len(),
                    });
                }

                Ok::<_, UploadError>(UploadedPart {
                    part_number: range.part_number,
                    size: range.len(),
                    etag,
                })
            });
        }

        let mut uploaded = Vec::with_capacity(session.parts.len());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| UploadError::Task(e.to_string())).and_then(|r| r);
            match outcome {
                Ok(part) => uploaded.push(part),
                Err(err) => {
                    tasks.shutdown().await;
                    return Err(err);
                }
            }
        }

        uploaded.sort_by_key(|p| p.part_number);
        session.verify_uploaded(&uploaded)?;
        Ok(uploaded)
    }

    /// Phase 3: report the parts to the backend, then complete the upload
    /// at the object store
    pub async fn complete_upload(&self, session: &UploadSession, parts: Vec<UploadedPart>) -> Result<()> {
        let request = CompleteRequest {
            upload_signature: session.signature.clone(),
            upload_id: session.upload_id.clone(),
            parts,
        };

        let instructions = self
            .backend
            .complete(&request)
            .await
            .map_err(UploadError::Completion)?;

        debug!("completing upload at {}", instructions.complete_url);
        post_store_completion(
            &*self.transport,
            &instructions.complete_url,
            Bytes::from(instructions.body),
        )
        .await
        .map_err(UploadError::Completion)?;

        info!(upload_id = %session.upload_id, "multipart upload completed");
        self.emit(UploadEvent::Completed);
        Ok(())
    }

    /// Phase 4: exchange the signature for the form field value
    pub async fn finalize(&self, session: &UploadSession) -> Result<String> {
        let request = FinalizeRequest {
            upload_signature: session.signature.clone(),
        };

        let response = self
            .backend
            .finalize(&request)
            .await
            .map_err(UploadError::Finalize)?;

        info!(object_key = %session.object_key, "upload finalized");
        self.emit(UploadEvent::Finalized {
            value: response.field_value.clone(),
        });
        Ok(response.field_value)
    }

    /// Phases 2 and 3 for an already negotiated session. A failure that
    /// leaves the multipart upload open aborts it.
    async fn assemble(&self, file: &UploadFile, session: &UploadSession) -> Result<()> {
        let assembled = async {
            let data = file.read_all().await?;
            let parts = self.upload_parts(session, data).await?;
            self.complete_upload(session, parts).await
        }
        .await;

        if let Err(err) = &assembled {
            if err.leaves_open_session() {
                self.abort_session(session).await;
            }
        }
        assembled
    }

    /// Best-effort abort of a session whose upload will not complete
    async fn abort_session(&self, session: &UploadSession) {
        if !self.config.abort_on_failure {
            return;
        }

        let request = AbortRequest {
            upload_signature: session.signature.clone(),
            upload_id: session.upload_id.clone(),
        };

        match self.backend.abort(&request).await {
            Ok(()) => info!(upload_id = %session.upload_id, "multipart upload aborted"),
            Err(e) => warn!(upload_id = %session.upload_id, "failed to abort multipart upload: {}", e),
        }
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

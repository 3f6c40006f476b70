//! Backend and object-store calls

use std::sync::Arc;

use bytes::Bytes;
use ffupload_core::{
    endpoints, AbortRequest, CompleteRequest, CompleteResponse, FinalizeRequest, FinalizeResponse,
    InitializeRequest, UploadSession,
};
use hyper::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, ETAG};
use hyper::{Method, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::transport::{ensure_success, parse_uri};
use crate::{RequestError, Transport};

/// Client for the backend's upload endpoints
pub struct BackendClient<T> {
    transport: Arc<T>,
    base_url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T: Transport> BackendClient<T> {
    pub fn new(
        transport: Arc<T>,
        base_url: impl Into<String>,
        headers: Vec<(HeaderName, HeaderValue)>,
    ) -> Self {
        BackendClient {
            transport,
            base_url: base_url.into(),
            headers,
        }
    }

    /// Absolute URL of a backend endpoint
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    pub async fn initialize(&self, request: &InitializeRequest) -> Result<UploadSession, RequestError> {
        self.post_json(endpoints::INITIALIZE, request).await
    }

    pub async fn complete(&self, request: &CompleteRequest) -> Result<CompleteResponse, RequestError> {
        self.post_json(endpoints::COMPLETE, request).await
    }

    pub async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse, RequestError> {
        self.post_json(endpoints::FINALIZE, request).await
    }

    /// Ask the backend to abort the multipart upload. The response body is ignored.
    pub async fn abort(&self, request: &AbortRequest) -> Result<(), RequestError> {
        self.post(endpoints::ABORT, request).await.map(|_| ())
    }

    async fn post_json<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp, RequestError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let response = self.post(endpoint, body).await?;
        serde_json::from_slice(&response).map_err(|e| {
            RequestError::InvalidResponse(format!("{} returned unexpected body: {}", endpoint, e))
        })
    }

    async fn post<Req: Serialize>(&self, endpoint: &str, body: &Req) -> Result<Bytes, RequestError> {
        let url = self.endpoint_url(endpoint);
        let payload = serde_json::to_vec(body)?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(parse_uri(&url)?)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(Bytes::from(payload))
            .map_err(|e| RequestError::InvalidUrl(e.to_string()))?;

        debug!("POST {}", url);
        let response = ensure_success(self.transport.send(request).await?)?;
        Ok(response.into_body())
    }
}

/// PUT one part to its pre-signed URL and return the ETag the store assigned
pub async fn put_part<T: Transport + ?Sized>(
    transport: &T,
    upload_url: &str,
    body: Bytes,
) -> Result<String, RequestError> {
    let request = Request::builder()
        .method(Method::PUT)
        .uri(parse_uri(upload_url)?)
        .body(body)
        .map_err(|e| RequestError::InvalidUrl(e.to_string()))?;

    let response = ensure_success(transport.send(request).await?)?;

    let etag = response
        .headers()
        .get(ETAG)
        .ok_or(RequestError::MissingEtag)?
        .to_str()
        .map_err(|e| RequestError::InvalidResponse(format!("ETag is not ASCII: {}", e)))?;

    Ok(etag.to_string())
}

/// POST the completion payload straight to the object store.
///
/// No `Content-Type` header is set: the store validates the request
/// signature against the exact headers it was signed with.
pub async fn post_store_completion<T: Transport + ?Sized>(
    transport: &T,
    complete_url: &str,
    body: Bytes,
) -> Result<(), RequestError> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(parse_uri(complete_url)?)
        .body(body)
        .map_err(|e| RequestError::InvalidUrl(e.to_string()))?;

    ensure_success(transport.send(request).await?)?;
    Ok(())
}

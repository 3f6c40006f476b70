//! HTTP transport used by the uploader

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::RequestError;

/// Sends one fully-buffered request and returns the fully-buffered response.
///
/// Implementations report transport failures only; status codes are
/// interpreted by the caller.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, RequestError>;
}

/// Transport backed by the hyper connection-pooling client.
///
/// The default connector speaks plain HTTP. Use [`HyperTransport::with_connector`]
/// to plug in a TLS-capable connector.
#[derive(Clone)]
pub struct HyperTransport<C = HttpConnector> {
    client: Client<C, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        HyperTransport {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> HyperTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    pub fn with_connector(connector: C) -> Self {
        HyperTransport {
            client: Client::builder(TokioExecutor::new()).build(connector),
        }
    }
}

#[async_trait]
impl<C> Transport for HyperTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, RequestError> {
        let (parts, body) = request.into_parts();
        let request = Request::from_parts(parts, Full::new(body));

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| RequestError::Connection(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| RequestError::Connection(e.to_string()))?
            .to_bytes();

        Ok(Response::from_parts(parts, body))
    }
}

/// Turn a non-2xx response into [`RequestError::Status`]
pub fn ensure_success(response: Response<Bytes>) -> Result<Response<Bytes>, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(RequestError::Status {
        status: status.as_u16(),
        body: String::from_utf8_lossy(response.body()).into_owned(),
    })
}

pub(crate) fn parse_uri(url: &str) -> Result<hyper::Uri, RequestError> {
    url.parse()
        .map_err(|e| RequestError::InvalidUrl(format!("{}: {}", url, e)))
}

//! HTTP request handlers for the dev server

use bytes::Bytes;
use ffupload_core::{endpoints, AbortRequest, CompleteRequest, FinalizeRequest, InitializeRequest};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE, ETAG};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{DevState, ServerError};

type BoxBody = Full<Bytes>;

/// Main request handler
pub async fn handle_request(
    req: Request<Incoming>,
    state: DevState,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Handling {} {}", method, path);

    let result = route(req, &state, &method, &path).await;

    match result {
        Ok(response) => {
            info!("{} {} -> {}", method, path, response.status());
            Ok(response)
        }
        Err(e) => {
            warn!("{} {} failed: {}", method, path, e);
            Ok(json_response(e.status(), json!({"error": e.to_string()}).to_string()))
        }
    }
}

async fn route(
    req: Request<Incoming>,
    state: &DevState,
    method: &Method,
    path: &str,
) -> Result<Response<BoxBody>, ServerError> {
    let backend = |endpoint: &str| path.strip_prefix('/') == Some(endpoint);

    match method {
        &Method::GET if path == "/health" => Ok(json_response(
            StatusCode::OK,
            json!({"status": "healthy", "service": "ffupload-server"}).to_string(),
        )),

        &Method::POST if backend(endpoints::INITIALIZE) => {
            let request: InitializeRequest = read_json(req).await?;
            reply(&state.initialize(request).await?)
        }
        &Method::POST if backend(endpoints::COMPLETE) => {
            let request: CompleteRequest = read_json(req).await?;
            reply(&state.complete(request).await?)
        }
        &Method::POST if backend(endpoints::FINALIZE) => {
            let request: FinalizeRequest = read_json(req).await?;
            reply(&state.finalize(request).await?)
        }
        &Method::POST if backend(endpoints::ABORT) => {
            let request: AbortRequest = read_json(req).await?;
            state.abort(request).await?;
            reply(&json!({"aborted": true}))
        }

        _ => match parse_store_path(path) {
            Some((upload_id, StoreTarget::Part(part_number))) if method == Method::PUT => {
                let body = read_body(req).await?;
                let etag = state.put_part(upload_id, part_number, body).await?;

                let mut response = Response::new(Full::new(Bytes::new()));
                let etag = HeaderValue::from_str(&etag)
                    .map_err(|e| ServerError::Internal(e.to_string()))?;
                response.headers_mut().insert(ETAG, etag);
                Ok(response)
            }
            Some((upload_id, StoreTarget::Complete)) if method == Method::POST => {
                let has_content_type = req.headers().contains_key(CONTENT_TYPE);
                let body = read_body(req).await?;
                state.store_complete(upload_id, has_content_type, &body).await?;
                Ok(Response::new(Full::new(Bytes::new())))
            }
            _ => Err(ServerError::NotFound(format!("{} {}", method, path))),
        },
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StoreTarget {
    Part(u32),
    Complete,
}

/// Parse object-store paths: `/store/{upload_id}/{part_number}` and
/// `/store/{upload_id}/complete`
fn parse_store_path(path: &str) -> Option<(&str, StoreTarget)> {
    let rest = path.strip_prefix("/store/")?;
    let (upload_id, target) = rest.split_once('/')?;
    if upload_id.is_empty() {
        return None;
    }

    let target = match target {
        "complete" => StoreTarget::Complete,
        number => StoreTarget::Part(number.parse::<u32>().ok().filter(|n| *n > 0)?),
    };
    Some((upload_id, target))
}

async fn read_body(req: Request<Incoming>) -> Result<Bytes, ServerError> {
    Ok(req
        .into_body()
        .collect()
        .await
        .map_err(|e| ServerError::BadRequest(format!("failed to read body: {}", e)))?
        .to_bytes())
}

async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, ServerError> {
    let body = read_body(req).await?;
    Ok(serde_json::from_slice(&body)?)
}

fn reply<T: Serialize>(value: &T) -> Result<Response<BoxBody>, ServerError> {
    let body = serde_json::to_string(value).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(json_response(StatusCode::OK, body))
}

/// JSON response with the given status
pub fn json_response(status: StatusCode, body: impl Into<String>) -> Response<BoxBody> {
    let mut response = Response::new(Full::new(Bytes::from(body.into())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

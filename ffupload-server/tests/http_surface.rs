//! Characterization of the dev server's HTTP surface

use std::net::SocketAddr;

use bytes::Bytes;
use ffupload_core::{
    CompleteRequest, CompleteResponse, FinalizeRequest, FinalizeResponse, InitializeRequest,
    UploadSession, UploadedPart,
};
use ffupload_server::{DevConfig, DevServer};
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, ETAG};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

type HttpClient = Client<hyper_util::client::legacy::connect::HttpConnector, Full<Bytes>>;

async fn send(
    client: &HttpClient,
    method: Method,
    url: &str,
    content_type: Option<&str>,
    body: impl Into<Bytes>,
) -> (StatusCode, hyper::HeaderMap, Bytes) {
    let mut builder = Request::builder().method(method).uri(url);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    let request = builder.body(Full::new(body.into())).unwrap();

    let response = client.request(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

async fn post_json<T: serde::Serialize>(client: &HttpClient, url: &str, value: &T) -> (StatusCode, Bytes) {
    let body = serde_json::to_vec(value).unwrap();
    let (status, _, body) = send(client, Method::POST, url, Some("application/json"), body).await;
    (status, body)
}

#[tokio::test]
async fn net_protocol_walkthrough() {
    let server = DevServer::bind(
        SocketAddr::from(([127, 0, 0, 1], 0)),
        DevConfig {
            part_size: 3,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let base = server.base_url();
    let state = server.state();
    let handle = server.spawn();
    let client: HttpClient = Client::builder(TokioExecutor::new()).build_http();

    let (status, body) = post_json(
        &client,
        &format!("{}/upload-initialize/", base),
        &InitializeRequest {
            field_id: "doc".to_string(),
            file_name: "hello.txt".to_string(),
            file_size: 5,
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session: UploadSession = serde_json::from_slice(&body).unwrap();
    assert_eq!(session.parts.len(), 2);

    let mut uploaded = Vec::new();
    for (spec, chunk) in session.parts.iter().zip([&b"hel"[..], &b"lo"[..]]) {
        let (status, headers, _) = send(
            &client,
            Method::PUT,
            &spec.upload_url,
            None,
            Bytes::copy_from_slice(chunk),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        uploaded.push(UploadedPart {
            part_number: spec.part_number,
            size: spec.size,
            etag: headers[ETAG].to_str().unwrap().to_string(),
        });
    }

    let (status, body) = post_json(
        &client,
        &format!("{}/upload-complete/", base),
        &CompleteRequest {
            upload_signature: session.signature.clone(),
            upload_id: session.upload_id.clone(),
            parts: uploaded,
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let complete: CompleteResponse = serde_json::from_slice(&body).unwrap();

    // A Content-Type on the store completion invalidates the signed request
    let (status, _, _) = send(
        &client,
        Method::POST,
        &complete.complete_url,
        Some("application/xml"),
        complete.body.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(&client, Method::POST, &complete.complete_url, None, complete.body.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &client,
        &format!("{}/finalize/", base),
        &FinalizeRequest {
            upload_signature: session.signature.clone(),
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let finalized: FinalizeResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(finalized.field_value, "uploads/doc/hello.txt");
    assert_eq!(&state.object("uploads/doc/hello.txt").await.unwrap()[..], b"hello");

    handle.abort();
}

#[tokio::test]
async fn net_errors_are_json() {
    let server = DevServer::bind(SocketAddr::from(([127, 0, 0, 1], 0)), DevConfig::default())
        .await
        .unwrap();
    let base = server.base_url();
    let handle = server.spawn();
    let client: HttpClient = Client::builder(TokioExecutor::new()).build_http();

    let (status, headers, body) = send(&client, Method::GET, &format!("{}/nope", base), None, Bytes::new()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers[CONTENT_TYPE], "application/json");
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].is_string());

    let (status, _, _) = send(
        &client,
        Method::POST,
        &format!("{}/finalize/", base),
        Some("application/json"),
        "not json",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&client, Method::GET, &format!("{}/health", base), None, Bytes::new()).await;
    assert_eq!(status, StatusCode::OK);

    handle.abort();
}

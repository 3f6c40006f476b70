//! HTTP server for the dev backend

use std::net::SocketAddr;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::handlers::handle_request;
use crate::{DevConfig, DevState, ServerError};

/// Backend and object store on one listener.
///
/// Backend endpoints live at the root (`/upload-initialize/` and friends),
/// the object store under `/store/`.
pub struct DevServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: DevState,
}

impl DevServer {
    /// Bind to `addr`. Port 0 picks a free port.
    pub async fn bind(addr: SocketAddr, config: DevConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let state = DevState::new(config, format!("http://{}", local_addr));

        Ok(DevServer {
            listener,
            local_addr,
            state,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL for clients, also the backend base URL
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Handle on the shared state, for inspecting stored objects
    pub fn state(&self) -> DevState {
        self.state.clone()
    }

    pub async fn serve(self) -> Result<(), ServerError> {
        info!("ffupload dev server listening on {}", self.local_addr);

        loop {
            let (stream, remote_addr) = self.listener.accept().await?;
            debug!("New connection from {}", remote_addr);

            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(err) = Self::handle_connection(stream, state).await {
                    error!("Connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }

    /// Run the server on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                error!("Server error: {}", e);
            }
        })
    }

    async fn handle_connection(
        stream: TcpStream,
        state: DevState,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let io = TokioIo::new(stream);

        let service = service_fn(move |req| {
            let state = state.clone();
            async move { handle_request(req, state).await }
        });

        auto::Builder::new(TokioExecutor::new())
            .serve_connection(io, service)
            .await
    }
}

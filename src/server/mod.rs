//! HTTP server module
//!
//! Binds the listener, serves each connection on its own task and hands
//! requests to [`routes::route`].
//!
//! # Example
//!
//! ```no_run
//! use repo_uploadr::{config::Config, server::Server};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let server = Server::from_config(&config).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::repository::{GitHubClient, RemoteWriteError, RepositoryClient};
use crate::upload::UploadHandler;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

pub mod routes;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Failed to create repository client: {0}")]
    ClientError(#[from] RemoteWriteError),
}

/// HTTP Server
pub struct Server {
    handler: Arc<UploadHandler>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the configured address, writing through the GitHub client
    pub async fn from_config(config: &Config) -> Result<Self, ServerError> {
        let client = GitHubClient::new((&config.github).into())?;
        Self::new(config, Arc::new(client)).await
    }

    /// Bind the configured address, writing through `client`.
    ///
    /// Port 0 asks the OS for a free port; see [`Server::local_addr`].
    pub async fn new(config: &Config, client: Arc<dyn RepositoryClient>) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            handler: Arc::new(UploadHandler::new(client, config)),
            listener,
            local_addr,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(ctrl_c).await
    }

    /// Serve until `shutdown` completes.
    ///
    /// In-flight connections keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting upload server on {} (repository {}/{}@{})",
            self.local_addr,
            self.handler.target().owner,
            self.handler.target().repo,
            self.handler.target().branch
        );

        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let handler = Arc::clone(&self.handler);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let handler = Arc::clone(&handler);
                    async move { Ok::<_, Infallible>(routes::route(req, &handler).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }

        info!("Shutting down server");
        Ok(())
    }
}

//! Repo Uploadr Library
//!
//! Upload relay that turns multipart form uploads into commits on a GitHub
//! repository.
//!
//! # Features
//!
//! - **One endpoint**: `POST /upload` with `name`, `message` and `file`
//! - **Metadata trail**: every request commits a `message.txt` describing it
//! - **Collision-free paths**: `uploads/<timestamp>-<random hex>/<name>`
//! - **Pluggable backend**: writes go through the [`repository::RepositoryClient`] trait
//! - **Prometheus metrics**: request and commit counters on a scrape port
//!
//! # Example
//!
//! ```no_run
//! use repo_uploadr::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = Server::from_config(&config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod repository;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Repository client module
//!
//! The upload handler writes every file through [`RepositoryClient`], a single
//! create-or-update operation against a hosted version-controlled repository.
//! [`GitHubClient`] implements it on top of the GitHub contents API.
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | create-or-update | `repository.create_or_update_file` | owner, repo, branch, path, bytes, status_code |

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod github;

pub use github::{GitHubClient, GitHubClientConfig};

/// Errors raised by a remote repository write
#[derive(Error, Debug)]
pub enum RemoteWriteError {
    /// The request never produced a response (DNS, TLS, connection reset...)
    #[error("Request error: {0}")]
    Request(String),

    /// The service answered with a non-success status
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// A success status whose body could not be decoded
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl RemoteWriteError {
    /// Structured payload surfaced by the remote service, if any
    pub fn details(&self) -> Option<&Value> {
        match self {
            RemoteWriteError::Status { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// HTTP status returned by the remote service, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteWriteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Repository coordinates a commit is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

/// Result of a successful create-or-update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCommit {
    /// Browsable URL of the written content, when the service reports one
    pub content_url: Option<String>,
}

/// A hosted repository that accepts single-file commits
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Create or update `path` on `target.branch` with base64 encoded content
    async fn create_or_update_file(
        &self,
        target: &RepositoryTarget,
        path: &str,
        commit_message: &str,
        base64_content: &str,
    ) -> Result<FileCommit, RemoteWriteError>;
}

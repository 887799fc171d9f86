//! Upload module
//!
//! Turns one `POST /upload` request into repository commits: a metadata file
//! that is always written, and the attachment when one was sent.

use crate::repository::RemoteWriteError;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod form;
pub mod handler;
pub mod path;

pub use handler::UploadHandler;

/// Largest attachment accepted for a single contents write (100 MiB)
pub const MAX_ATTACHMENT_BYTES: u64 = 100 * 1024 * 1024;

/// Error body returned for attachments above [`MAX_ATTACHMENT_BYTES`]
pub const TOO_LARGE_MESSAGE: &str = "File too large (>100MB). Use other storage.";

/// Logical name of the metadata file written for every request
pub const METADATA_FILE_NAME: &str = "message.txt";

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File too large (>100MB). Use other storage.")]
    TooLarge { size: u64 },

    #[error(transparent)]
    Remote(#[from] RemoteWriteError),

    #[error("{0}")]
    Unexpected(String),
}

impl UploadError {
    /// Structured payload for the `details` field of a failure response
    pub fn details(&self) -> Option<&Value> {
        match self {
            UploadError::Remote(e) => e.details(),
            _ => None,
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::TooLarge { .. } => "too_large",
            UploadError::Remote(_) => "remote_write",
            UploadError::Unexpected(_) => "unexpected",
        }
    }
}

/// Binary attachment received with an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename supplied by the client, if any
    pub file_name: Option<String>,
    /// Total number of bytes received
    pub size: u64,
    /// Received bytes; left empty once `size` passes [`MAX_ATTACHMENT_BYTES`]
    pub content: Bytes,
}

impl Attachment {
    /// Attachment holding all of `content`
    pub fn new(file_name: Option<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            file_name: file_name.filter(|n| !n.is_empty()),
            size: content.len() as u64,
            content,
        }
    }

    /// Attachment whose bytes were counted but not kept
    pub fn oversized(file_name: Option<String>, size: u64) -> Self {
        Self {
            file_name: file_name.filter(|n| !n.is_empty()),
            size,
            content: Bytes::new(),
        }
    }

    pub fn is_too_large(&self) -> bool {
        self.size > MAX_ATTACHMENT_BYTES
    }
}

/// Decoded upload request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    pub sender_name: Option<String>,
    pub message: Option<String>,
    pub attachment: Option<Attachment>,
}

/// Where the attachment ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub path: String,
    pub commit_url: Option<String>,
}

/// Success body of `POST /upload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub ok: bool,
    pub meta_path: String,
    pub file: Option<FileResult>,
}

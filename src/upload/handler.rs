//! Upload handler
//!
//! Commits the metadata file, then the attachment when present, and shapes the
//! result. The two commits are sequential and independent: when the second
//! one fails the metadata file stays in the repository.
//!
//! # Example
//!
//! ```no_run
//! use repo_uploadr::config::Config;
//! use repo_uploadr::repository::{GitHubClient, RepositoryClient};
//! use repo_uploadr::upload::{UploadHandler, UploadRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let client: Arc<dyn RepositoryClient> = Arc::new(GitHubClient::new((&config.github).into())?);
//! let handler = UploadHandler::new(client, &config);
//!
//! let response = handler
//!     .handle(UploadRequest {
//!         sender_name: Some("kiosk".to_string()),
//!         message: Some("hello".to_string()),
//!         attachment: None,
//!     })
//!     .await?;
//! println!("Metadata at {}", response.meta_path);
//! # Ok(())
//! # }
//! ```

use super::path::build_path;
use super::{
    Attachment, FileResult, UploadError, UploadRequest, UploadResponse, METADATA_FILE_NAME,
};
use crate::config::Config;
use crate::metrics;
use crate::repository::{FileCommit, RemoteWriteError, RepositoryClient, RepositoryTarget};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Metadata file body: sender, receipt time and message
pub fn metadata_content(sender: &str, received_at: DateTime<Utc>, message: &str) -> String {
    format!(
        "uploader: {}\nreceived_at: {}\n\nmessage:\n{}\n",
        sender,
        received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        message
    )
}

/// Handles upload requests against one repository target
pub struct UploadHandler {
    client: Arc<dyn RepositoryClient>,
    target: RepositoryTarget,
    default_sender: String,
}

impl UploadHandler {
    /// Create a handler writing to the repository named in `config`
    pub fn new(client: Arc<dyn RepositoryClient>, config: &Config) -> Self {
        Self::with_target(client, config.target(), &config.upload.default_sender)
    }

    /// Create a handler for an explicit target
    pub fn with_target(
        client: Arc<dyn RepositoryClient>,
        target: RepositoryTarget,
        default_sender: &str,
    ) -> Self {
        Self {
            client,
            target,
            default_sender: default_sender.to_string(),
        }
    }

    /// Repository target commits are written to
    pub fn target(&self) -> &RepositoryTarget {
        &self.target
    }

    /// Handle one upload.
    ///
    /// The metadata commit always happens first. An oversized attachment is
    /// rejected afterwards without a second write.
    #[tracing::instrument(
        name = "upload.handle",
        skip(self, request),
        fields(
            upload.sender = tracing::field::Empty,
            upload.attachment_bytes = request.attachment.as_ref().map(|a| a.size),
            upload.meta_path = tracing::field::Empty,
            upload.file_path = tracing::field::Empty
        ),
        err
    )]
    pub async fn handle(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
        let sender = request
            .sender_name
            .unwrap_or_else(|| self.default_sender.clone());
        let message = request.message.unwrap_or_default();

        let span = tracing::Span::current();
        span.record("upload.sender", sender.as_str());

        let meta_content = metadata_content(&sender, Utc::now(), &message);
        let meta_path = build_path(Some(METADATA_FILE_NAME));
        span.record("upload.meta_path", meta_path.as_str());

        self.commit(
            "metadata",
            &meta_path,
            &format!("Upload: message from {}", sender),
            &STANDARD.encode(meta_content.as_bytes()),
        )
        .await?;

        let file = match request.attachment {
            Some(attachment) => Some(self.commit_attachment(&sender, attachment).await?),
            None => None,
        };

        tracing::info!(
            meta_path = %meta_path,
            file_path = ?file.as_ref().map(|f| f.path.as_str()),
            "Upload committed"
        );

        Ok(UploadResponse {
            ok: true,
            meta_path,
            file,
        })
    }

    async fn commit_attachment(
        &self,
        sender: &str,
        attachment: Attachment,
    ) -> Result<FileResult, UploadError> {
        if attachment.is_too_large() {
            tracing::warn!(
                size = attachment.size,
                file_name = ?attachment.file_name,
                "Attachment rejected: too large"
            );
            return Err(UploadError::TooLarge {
                size: attachment.size,
            });
        }

        let path = build_path(attachment.file_name.as_deref());
        tracing::Span::current().record("upload.file_path", path.as_str());

        let display_name = match attachment.file_name.as_deref() {
            Some(name) => name.to_string(),
            None => path.rsplit('/').next().unwrap_or_default().to_string(),
        };

        let commit = self
            .commit(
                "file",
                &path,
                &format!("Upload: file {} from {}", display_name, sender),
                &STANDARD.encode(&attachment.content),
            )
            .await?;

        metrics::record_upload_bytes(attachment.size);

        Ok(FileResult {
            path,
            commit_url: commit.content_url,
        })
    }

    async fn commit(
        &self,
        kind: &str,
        path: &str,
        commit_message: &str,
        base64_content: &str,
    ) -> Result<FileCommit, RemoteWriteError> {
        let start_time = Instant::now();
        let result = self
            .client
            .create_or_update_file(&self.target, path, commit_message, base64_content)
            .await;
        metrics::record_commit(kind, result.is_ok(), start_time.elapsed().as_secs_f64());
        result
    }
}

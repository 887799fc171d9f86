//! Request body decoding
//!
//! `POST /upload` accepts `multipart/form-data` with the fields `name`,
//! `message` and `file`, or a JSON object carrying `name` and `message`.
//! Any other body is ignored and decodes to an empty request.

use super::{Attachment, UploadRequest, MAX_ATTACHMENT_BYTES};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use serde::Deserialize;
use thiserror::Error;

/// Body decoding errors
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Invalid multipart data: {0}")]
    InvalidMultipart(String),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("Only one file may be uploaded per request")]
    MultipleFiles,
}

/// Body encodings accepted by the upload endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    Multipart { boundary: String },
    Json,
    /// No or unrecognised content type; the body carries no fields
    Ignored,
}

impl BodyKind {
    /// Classify a request by its `Content-Type` header
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, FormError> {
        let Some(content_type) = content_type else {
            return Ok(BodyKind::Ignored);
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "multipart/form-data" => multer::parse_boundary(content_type)
                .map(|boundary| BodyKind::Multipart { boundary })
                .map_err(|e| FormError::InvalidMultipart(e.to_string())),
            "application/json" => Ok(BodyKind::Json),
            _ => Ok(BodyKind::Ignored),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct JsonUpload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Decode a JSON body; it never carries an attachment
pub fn read_json(body: &[u8]) -> Result<UploadRequest, FormError> {
    let parsed: JsonUpload =
        serde_json::from_slice(body).map_err(|e| FormError::InvalidJson(e.to_string()))?;

    Ok(UploadRequest {
        sender_name: non_empty(parsed.name),
        message: non_empty(parsed.message),
        attachment: None,
    })
}

/// Decode a multipart body.
///
/// The `file` part is buffered up to [`MAX_ATTACHMENT_BYTES`]; past that the
/// remaining bytes are only counted so the size check stays exact.
pub async fn read_multipart<S, O, E>(stream: S, boundary: &str) -> Result<UploadRequest, FormError>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut request = UploadRequest::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| FormError::InvalidMultipart(e.to_string()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| FormError::InvalidMultipart(e.to_string()))?;
                request.sender_name = non_empty(Some(value));
            }
            Some("message") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| FormError::InvalidMultipart(e.to_string()))?;
                request.message = non_empty(Some(value));
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .map(str::to_string);

                // Browsers send an unnamed, empty part for an unfilled file input.
                if file_name.is_none() {
                    drain(&mut field).await?;
                    continue;
                }

                if request.attachment.is_some() {
                    return Err(FormError::MultipleFiles);
                }

                let mut buffer = BytesMut::new();
                let mut size: u64 = 0;
                let mut retaining = true;

                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| FormError::InvalidMultipart(e.to_string()))?
                {
                    size = size.saturating_add(chunk.len() as u64);
                    if !retaining {
                        continue;
                    }
                    if size > MAX_ATTACHMENT_BYTES {
                        retaining = false;
                        buffer = BytesMut::new();
                    } else {
                        buffer.extend_from_slice(&chunk);
                    }
                }

                let attachment = if retaining {
                    Attachment::new(file_name, buffer.freeze())
                } else {
                    tracing::debug!(size = size, "Attachment exceeds limit, bytes discarded");
                    Attachment::oversized(file_name, size)
                };
                request.attachment = Some(attachment);
            }
            _ => drain(&mut field).await?,
        }
    }

    Ok(request)
}

async fn drain(field: &mut multer::Field<'_>) -> Result<(), FormError> {
    while field
        .chunk()
        .await
        .map_err(|e| FormError::InvalidMultipart(e.to_string()))?
        .is_some()
    {}
    Ok(())
}

//! Request routing and JSON responses
//!
//! # Endpoints
//!
//! * `POST /upload` - multipart or JSON upload, committed to the repository
//! * `GET /health` - liveness probe
//! * anything else - 404

use crate::metrics;
use crate::upload::form::{read_json, read_multipart, BodyKind, FormError};
use crate::upload::{UploadError, UploadHandler, UploadRequest, UploadResponse};
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

/// Failure body: `{ error, details }`
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    details: Option<&'a Value>,
}

/// Route one request
pub async fn route<B>(req: Request<B>, handler: &UploadHandler) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    info!("Handling {} {}", method, path);

    match (&method, path.as_str()) {
        (&Method::POST, "/upload") => upload(req, handler).await,
        (&Method::GET, "/health") => json_response(StatusCode::OK, &json!({"status": "ok"})),
        _ => json_response(StatusCode::NOT_FOUND, &json!({"error": "Not Found"})),
    }
}

async fn upload<B>(req: Request<B>, handler: &UploadHandler) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let request = match read_upload(req).await {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected upload body: {}", e);
            metrics::record_request("rejected");
            metrics::record_error("invalid_body");
            return json_response(StatusCode::BAD_REQUEST, &json!({"error": e.to_string()}));
        }
    };

    // A panic inside the handler still gets a JSON answer.
    let outcome = AssertUnwindSafe(handler.handle(request))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(UploadError::Unexpected(panic_message(panic))));

    match outcome {
        Ok(response) => {
            metrics::record_request("success");
            success_response(&response)
        }
        Err(e) => failure_response(&e),
    }
}

async fn read_upload<B>(req: Request<B>) -> Result<UploadRequest, FormError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match BodyKind::from_content_type(content_type.as_deref())? {
        BodyKind::Multipart { boundary } => {
            read_multipart(req.into_body().into_data_stream(), &boundary).await
        }
        BodyKind::Json => {
            let body = req.into_body().collect().await.map_err(|e| {
                let e: Box<dyn std::error::Error + Send + Sync> = e.into();
                FormError::InvalidJson(e.to_string())
            })?;
            read_json(&body.to_bytes())
        }
        BodyKind::Ignored => {
            debug!(content_type = ?content_type, "Body not decoded");
            Ok(UploadRequest::default())
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

fn success_response(response: &UploadResponse) -> Response<Full<Bytes>> {
    match serde_json::to_value(response) {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(e) => failure_response(&UploadError::Unexpected(e.to_string())),
    }
}

/// Map a handler error onto the wire
pub fn failure_response(err: &UploadError) -> Response<Full<Bytes>> {
    metrics::record_error(err.kind());

    match err {
        UploadError::TooLarge { .. } => {
            metrics::record_request("rejected");
            json_response(StatusCode::BAD_REQUEST, &json!({"error": err.to_string()}))
        }
        _ => {
            metrics::record_request("failed");
            error!(error = %err, kind = err.kind(), details = ?err.details(), "Upload error");
            let message = err.to_string();
            let body = ErrorBody {
                error: &message,
                details: err.details(),
            };
            let body = serde_json::to_value(&body).unwrap_or_else(|_| json!({"error": message}));
            json_response(StatusCode::INTERNAL_SERVER_ERROR, &body)
        }
    }
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

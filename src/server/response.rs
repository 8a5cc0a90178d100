//! HTTP response mapping: successful conversions become attachments, errors
//! become `{"error", "details"}` JSON with the status of their kind.

use crate::error::{ConvertError, ErrorKind};
use crate::output::ConversionOutput;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

/// Number of pages in the returned document or archive.
pub const PAGE_COUNT_HEADER: HeaderName = HeaderName::from_static("x-page-count");

/// JSON body of every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::ConversionFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handler error wrapper so `?` works on [`ConvertError`] inside handlers.
#[derive(Debug)]
pub struct ApiError(pub ConvertError);

impl From<ConvertError> for ApiError {
    fn from(e: ConvertError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self.0);
        }
        let body = ErrorBody {
            error: self.0.summary(),
            details: self.0.details(),
        };
        (status, Json(body)).into_response()
    }
}

/// Binary download of a conversion result.
pub struct Attachment(pub ConversionOutput);

impl IntoResponse for Attachment {
    fn into_response(self) -> Response {
        let result = self.0.result;
        let disposition = format!("attachment; filename=\"{}\"", result.download_name());
        let headers = [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(result.content_type()),
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
            ),
            (PAGE_COUNT_HEADER, HeaderValue::from(result.page_count())),
        ];
        (StatusCode::OK, headers, result.into_bytes()).into_response()
    }
}

//! Route handlers.

use super::response::{ApiError, Attachment};
use super::AppState;
use crate::config::PageLayout;
use crate::error::{ConvertError, Rejection};
use crate::pipeline::validate::UploadedFile;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{debug, warn};

/// Multipart field names accepted for the PDF upload.
const PDF_FIELDS: &[&str] = &["file", "pdf"];
/// Multipart field name for JPEG uploads.
const IMAGE_FIELD: &str = "images";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
    pub limits: Limits,
}

#[derive(Debug, Serialize)]
pub struct Limits {
    pub max_upload_bytes: usize,
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub jpeg_quality: u8,
    pub page_layout: PageLayout,
    pub sniff_content: bool,
    pub request_timeout_secs: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.config;
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "GET /health",
            "POST /api/pdf-to-jpg",
            "POST /api/jpg-to-pdf",
        ],
        limits: Limits {
            max_upload_bytes: config.max_upload_bytes,
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            jpeg_quality: config.jpeg_quality,
            page_layout: config.page_layout,
            sniff_content: config.sniff_content,
            request_timeout_secs: config.request_timeout_secs,
        },
    })
}

pub async fn pdf_to_jpg(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Attachment, ApiError> {
    let files = collect_files(multipart, PDF_FIELDS).await?;
    let output = state.converter.pdf_to_jpg(files).await?;
    Ok(Attachment(output))
}

pub async fn jpg_to_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Attachment, ApiError> {
    let files = collect_files(multipart, &[IMAGE_FIELD]).await?;
    let output = state.converter.jpg_to_pdf(files).await?;
    Ok(Attachment(output))
}

/// Read every file part whose field name is in `fields`, in arrival order.
///
/// A request that is not multipart at all yields no files, so the validator
/// answers with its usual "No ... uploaded" message. Other fields are skipped.
async fn collect_files(
    multipart: Result<Multipart, MultipartRejection>,
    fields: &[&str],
) -> Result<Vec<UploadedFile>, ConvertError> {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            warn!("Not a multipart upload: {}", rejection.body_text());
            return Ok(Vec::new());
        }
    };

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if !fields.contains(&name.as_str()) {
            debug!("Ignoring multipart field '{}'", name);
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        debug!("Received '{}' ({} bytes) in field '{}'", filename, bytes.len(), name);

        let mut file = UploadedFile::new(filename, bytes);
        if let Some(ct) = content_type {
            file = file.with_content_type(ct);
        }
        files.push(file);
    }
    Ok(files)
}

fn multipart_error(e: MultipartError) -> ConvertError {
    let rejection = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Rejection::too_large("Upload too large", e.body_text())
    } else {
        Rejection::bad_request("Malformed upload", e.body_text())
    };
    rejection.into()
}

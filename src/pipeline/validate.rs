//! Upload validation: refuse bad uploads before any rendering work starts.
//!
//! Checks run in a fixed order so the client always gets the most basic
//! problem first: presence, emptiness, extension, per-file size, cumulative
//! size, then (optionally) content sniffing. Nothing here panics or returns
//! anything but a [`Rejection`] on failure.

use crate::config::UploadLimits;
use crate::error::Rejection;
use bytes::Bytes;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// PDF files may carry junk before the header; readers accept `%PDF-`
/// anywhere in the first kilobyte.
const PDF_HEADER_WINDOW: usize = 1024;

/// One file received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied filename (may be empty).
    pub filename: String,
    /// Declared content type; informational only, never trusted.
    pub content_type: Option<String>,
    /// Raw file content.
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lower-cased extension of the filename, if any.
    fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// What a set of uploads is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRole {
    /// Exactly one PDF document.
    Pdf,
    /// One or more JPEG images.
    JpegSet,
}

impl UploadRole {
    fn missing_message(self) -> &'static str {
        match self {
            UploadRole::Pdf => "No PDF file uploaded",
            UploadRole::JpegSet => "No images uploaded",
        }
    }

    fn accepts_extension(self, ext: &str) -> bool {
        match self {
            UploadRole::Pdf => ext == "pdf",
            UploadRole::JpegSet => ext == "jpg" || ext == "jpeg",
        }
    }

    fn expected(self) -> &'static str {
        match self {
            UploadRole::Pdf => "a .pdf file",
            UploadRole::JpegSet => ".jpg or .jpeg images",
        }
    }

    fn content_matches(self, bytes: &[u8]) -> bool {
        match self {
            UploadRole::Pdf => has_pdf_header(bytes),
            UploadRole::JpegSet => matches!(image::guess_format(bytes), Ok(ImageFormat::Jpeg)),
        }
    }
}

/// Validate `files` for `role` against `limits`.
pub fn validate_uploads(
    files: &[UploadedFile],
    role: UploadRole,
    limits: &UploadLimits,
) -> Result<(), Rejection> {
    // (a) presence
    if files.is_empty() {
        return Err(Rejection::bad_request(
            role.missing_message(),
            format!("expected {}", role.expected()),
        ));
    }
    if role == UploadRole::Pdf && files.len() > 1 {
        return Err(Rejection::bad_request(
            "Too many files",
            format!("expected one PDF, got {} files", files.len()),
        ));
    }
    if let Some(empty) = files.iter().find(|f| f.is_empty()) {
        return Err(Rejection::bad_request(
            "Empty file",
            format!("'{}' contains no data", empty.filename),
        ));
    }

    // (b) extension
    for f in files {
        let ok = f
            .extension()
            .is_some_and(|ext| role.accepts_extension(&ext));
        if !ok {
            return Err(Rejection::bad_request(
                "Invalid file type",
                format!("'{}' is not {}", f.filename, role.expected()),
            ));
        }
    }

    // (c) per-file size
    if let Some(big) = files.iter().find(|f| f.len() > limits.max_bytes) {
        return Err(Rejection::too_large(
            "File too large",
            format!(
                "'{}' is {} bytes; the limit is {} bytes",
                big.filename,
                big.len(),
                limits.max_bytes
            ),
        ));
    }

    // (d) cumulative size
    let total: usize = files.iter().map(UploadedFile::len).sum();
    if total > limits.max_bytes {
        return Err(Rejection::too_large(
            "Upload too large",
            format!(
                "{} files total {} bytes; the limit is {} bytes",
                files.len(),
                total,
                limits.max_bytes
            ),
        ));
    }

    // (e) content sniffing
    if limits.sniff_content {
        if let Some(bad) = files.iter().find(|f| !role.content_matches(&f.bytes)) {
            return Err(Rejection::bad_request(
                "Invalid file content",
                format!("'{}' does not contain {}", bad.filename, role.expected()),
            ));
        }
    }

    debug!(
        "Validated {} upload(s) as {:?}, {} bytes",
        files.len(),
        role,
        total
    );
    Ok(())
}

/// Validate a PDF-to-JPG upload and return the single PDF.
pub fn validate_pdf_upload(
    mut files: Vec<UploadedFile>,
    limits: &UploadLimits,
) -> Result<UploadedFile, Rejection> {
    validate_uploads(&files, UploadRole::Pdf, limits)?;
    files
        .pop()
        .ok_or_else(|| Rejection::bad_request(UploadRole::Pdf.missing_message(), "no file"))
}

/// Validate a JPG-to-PDF upload, preserving upload order.
pub fn validate_jpeg_uploads(
    files: Vec<UploadedFile>,
    limits: &UploadLimits,
) -> Result<Vec<UploadedFile>, Rejection> {
    validate_uploads(&files, UploadRole::JpegSet, limits)?;
    Ok(files)
}

/// `true` if `%PDF-` appears within the first kilobyte.
pub fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

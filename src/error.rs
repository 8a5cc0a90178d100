//! Error types for the pdfjpg service.
//!
//! Two types reflect two distinct failure sources:
//!
//! * [`Rejection`]: the upload itself is unacceptable (missing file, wrong
//!   extension, too large, content does not match its name). Produced by the
//!   upload validator before any expensive work starts.
//!
//! * [`ConvertError`]: everything that can go wrong once a request is being
//!   processed: PDFium refusing a document, an unreadable image, an empty
//!   result, a timeout. A [`Rejection`] is carried inside it as
//!   [`ConvertError::Rejected`] so one `Result` type flows through the
//!   pipeline.
//!
//! Every error folds into one of three public [`ErrorKind`]s; the HTTP layer
//! maps each kind to exactly one status code.

use thiserror::Error;

/// Public error category exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, empty, or wrong-type upload (HTTP 400).
    BadRequest,
    /// Upload exceeds the configured size limit (HTTP 413).
    PayloadTooLarge,
    /// Renderer/writer failure, malformed input, empty output (HTTP 500).
    ConversionFailed,
}

/// A structured refusal of an upload.
///
/// `message` is the short, stable summary shown to clients as `error`;
/// `detail` explains which file and which check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}: {detail}")]
pub struct Rejection {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
}

impl Rejection {
    pub fn bad_request(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::BadRequest,
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn too_large(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::PayloadTooLarge,
            message: message.into(),
            detail: detail.into(),
        }
    }
}

/// All errors produced while handling a conversion request.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The upload validator refused the request.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    // ── PDF input errors ──────────────────────────────────────────────────
    /// PDFium could not parse the document.
    #[error("Invalid or corrupt PDF: {detail}")]
    CorruptPdf { detail: String },

    /// The document is encrypted and no password is accepted by this service.
    #[error("PDF is password protected")]
    PasswordProtected,

    /// The document parsed but contains no pages.
    #[error("PDF has no pages")]
    EmptyDocument,

    /// PDFium failed on one page; the whole request fails with it.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Image errors ──────────────────────────────────────────────────────
    /// An uploaded image could not be decoded.
    #[error("Unreadable image '{filename}': {detail}")]
    UnreadableImage { filename: String, detail: String },

    /// JPEG encoding of a page failed.
    #[error("Image encoding failed: {0}")]
    ImageEncoding(#[from] image::ImageError),

    // ── Output errors ─────────────────────────────────────────────────────
    /// A stage produced nothing (no pages, zero-byte entry, empty document).
    #[error("Conversion produced no output: {detail}")]
    EmptyOutput { detail: String },

    /// PDFium failed while building the output PDF.
    #[error("PDF generation failed: {detail}")]
    PdfWriteFailed { detail: String },

    /// Zip writer failure.
    #[error("Archive creation failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    // ── Runtime errors ────────────────────────────────────────────────────
    /// The conversion did not finish within the configured time.
    #[error("Conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Creating or writing the request's temporary directory failed.
    #[error("Request workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or place the library next to the \
executable or in ./lib."
    )]
    PdfiumBindingFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Fold this error into its public category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::Rejected(r) => r.kind,
            _ => ErrorKind::ConversionFailed,
        }
    }

    /// Short client-facing summary, used as the `error` field of the JSON body.
    pub fn summary(&self) -> String {
        match self {
            ConvertError::Rejected(r) => r.message.clone(),
            ConvertError::CorruptPdf { .. } => "Invalid or corrupt PDF".into(),
            ConvertError::PasswordProtected => "PDF is password protected".into(),
            ConvertError::EmptyDocument => "PDF has no pages".into(),
            ConvertError::UnreadableImage { .. } => "Unreadable image".into(),
            ConvertError::Timeout { .. } => "Conversion timed out".into(),
            _ => "Conversion failed".into(),
        }
    }

    /// Client-facing detail, used as the `details` field of the JSON body.
    pub fn details(&self) -> String {
        match self {
            ConvertError::Rejected(r) => r.detail.clone(),
            // Binding hints mention server paths; clients only need to know it broke.
            ConvertError::PdfiumBindingFailed(_) => "rendering engine unavailable".into(),
            other => other.to_string(),
        }
    }
}

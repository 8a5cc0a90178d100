//! Result types returned by the conversion entry points.

use serde::Serialize;

/// The artefact a conversion produced, ready to send as a download.
#[derive(Debug, Clone)]
pub enum ConversionResult {
    /// Zip of `page_N.jpg` entries, one per PDF page.
    Archive { bytes: Vec<u8>, entries: usize },
    /// Multi-page PDF, one page per uploaded image.
    Pdf { bytes: Vec<u8>, pages: usize },
}

impl ConversionResult {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Archive { .. } => "application/zip",
            Self::Pdf { .. } => "application/pdf",
        }
    }

    /// Suggested filename for the `Content-Disposition` header.
    pub fn download_name(&self) -> &'static str {
        match self {
            Self::Archive { .. } => "converted_images.zip",
            Self::Pdf { .. } => "converted.pdf",
        }
    }

    /// Pages rendered (archive) or written (PDF).
    pub fn page_count(&self) -> usize {
        match *self {
            Self::Archive { entries, .. } => entries,
            Self::Pdf { pages, .. } => pages,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Archive { bytes, .. } | Self::Pdf { bytes, .. } => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Archive { bytes, .. } | Self::Pdf { bytes, .. } => bytes,
        }
    }
}

/// Timing and size figures for one conversion, logged on completion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub pages: usize,
    /// Sum of uploaded file sizes.
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub duration_ms: u64,
}

/// Output of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub result: ConversionResult,
    pub stats: ConversionStats,
}

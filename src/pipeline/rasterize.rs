//! PDF rasterisation: one JPEG per page.
//!
//! The [`Rasterizer`] trait is the seam between this module and PDFium: it
//! turns a staged PDF into raw page bitmaps. Everything after that (white
//! flattening, JPEG encoding, zero-output checks) happens here, identically
//! for every backend.
//!
//! All functions are blocking; callers run them inside `spawn_blocking`.

use crate::config::RasterOptions;
use crate::deadline::Deadline;
use crate::error::ConvertError;
use crate::pipeline::normalize::{encode_jpeg, flatten_onto_white};
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// Capability to render every page of a PDF file to a bitmap.
///
/// Implementations must return pages in document order and must not
/// return partial results: any page failure is an error for the whole call.
/// Once `deadline` has passed they should stop and return `Timeout`.
pub trait Rasterizer: Send + Sync {
    fn render_pages(
        &self,
        pdf_path: &Path,
        options: &RasterOptions,
        deadline: &Deadline,
    ) -> Result<Vec<DynamicImage>, ConvertError>;
}

/// One rasterised page, encoded and ready for the archive.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    /// JPEG bytes of the canonical RGB page.
    pub bytes: Vec<u8>,
}

/// Render the PDF at `pdf_path` and encode each page as JPEG.
///
/// # Errors
/// * `EmptyDocument`: the renderer returned no pages
/// * `EmptyOutput`: a page encoded to zero bytes
/// * `Timeout`: `deadline` passed before every page was encoded
/// * whatever the renderer reports for unreadable documents
pub fn rasterize_pdf(
    rasterizer: &dyn Rasterizer,
    pdf_path: &Path,
    options: &RasterOptions,
    deadline: &Deadline,
) -> Result<Vec<PageImage>, ConvertError> {
    let rendered = rasterizer.render_pages(pdf_path, options, deadline)?;
    if rendered.is_empty() {
        return Err(ConvertError::EmptyDocument);
    }

    rendered
        .into_iter()
        .enumerate()
        .map(|(idx, img)| {
            deadline.check()?;
            encode_page(idx + 1, &img, options.jpeg_quality)
        })
        .collect()
}

fn encode_page(
    page_num: usize,
    img: &DynamicImage,
    quality: u8,
) -> Result<PageImage, ConvertError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ConvertError::RasterisationFailed {
            page: page_num,
            detail: "renderer returned an empty bitmap".into(),
        });
    }

    let rgb = flatten_onto_white(img);
    let bytes = encode_jpeg(&rgb, quality)?;
    if bytes.is_empty() {
        return Err(ConvertError::EmptyOutput {
            detail: format!("page {page_num} encoded to zero bytes"),
        });
    }

    debug!(
        "Page {} → {}x{} px, {} bytes",
        page_num,
        rgb.width(),
        rgb.height(),
        bytes.len()
    );

    Ok(PageImage {
        page_num,
        width: rgb.width(),
        height: rgb.height(),
        bytes,
    })
}

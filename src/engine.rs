//! PDFium-backed rendering engine.
//!
//! [`PdfiumEngine`] is the single implementation of both capabilities the
//! pipeline needs: [`Rasterizer`] (PDF → page bitmaps) and [`PdfWriter`]
//! (bitmaps → PDF). It holds no PDFium state between calls; each call binds
//! the library, does its work on the calling (blocking) thread, and drops the
//! bindings, so concurrent requests never share a document handle.
//!
//! PDFium itself is not re-entrant. Every call holds a process-wide lock for
//! the whole bind/use/drop cycle, so conversions run one at a time inside the
//! library while uploads, validation and zip packing stay concurrent. The
//! request [`Deadline`] is checked after the lock is acquired and between
//! pages; a job whose request already timed out gives the lock straight back.
//!
//! ## Library lookup
//!
//! First match wins:
//!
//! 1. `pdfium_lib_path` from the configuration (file or directory)
//! 2. the working directory, then `./lib`
//! 3. the executable's directory, then `<exe>/../lib`
//! 4. the system library search path

use crate::config::RasterOptions;
use crate::deadline::Deadline;
use crate::error::ConvertError;
use crate::pipeline::assemble::{PageStream, PdfWriter};
use crate::pipeline::rasterize::Rasterizer;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Serialise access to the library. A poisoned lock only means an earlier
/// conversion panicked; the guarded state is `()`, so carry on.
fn pdfium_guard() -> MutexGuard<'static, ()> {
    PDFIUM_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Rasteriser and PDF writer backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    lib_path: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Create an engine. `lib_path` may name the library file itself or a
    /// directory containing it.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    /// Bind once and drop, so a missing library is reported at startup rather
    /// than on the first request.
    pub fn verify_binding(&self) -> Result<(), ConvertError> {
        let _guard = pdfium_guard();
        let _pdfium = self.bind()?;
        info!("PDFium library bound successfully");
        Ok(())
    }

    fn bind(&self) -> Result<Pdfium, ConvertError> {
        let bindings = match self.lib_path {
            Some(ref path) => bind_explicit(path),
            None => bind_search(),
        }
        .map_err(|e| ConvertError::PdfiumBindingFailed(format!("{e:?}")))?;
        Ok(Pdfium::new(bindings))
    }
}

fn bind_explicit(path: &Path) -> Result<Box<dyn PdfiumLibraryBindings>, PdfiumError> {
    if path.is_dir() {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
    } else {
        Pdfium::bind_to_library(path)
    }
}

fn bind_search() -> Result<Box<dyn PdfiumLibraryBindings>, PdfiumError> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./lib")))
        .or_else(|e| match exe_dir {
            Some(ref dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| {
                    let lib = dir.parent().map(|p| p.join("lib")).unwrap_or_else(|| dir.clone());
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&lib))
                }),
            None => Err(e),
        })
        .or_else(|_| Pdfium::bind_to_system_library())
}

/// Map a document-load failure to the client-meaningful error.
fn load_error(e: PdfiumError) -> ConvertError {
    let err_str = format!("{e:?}");
    if err_str.contains("Password") || err_str.contains("password") {
        ConvertError::PasswordProtected
    } else {
        ConvertError::CorruptPdf { detail: err_str }
    }
}

impl Rasterizer for PdfiumEngine {
    fn render_pages(
        &self,
        pdf_path: &Path,
        options: &RasterOptions,
        deadline: &Deadline,
    ) -> Result<Vec<DynamicImage>, ConvertError> {
        deadline.check()?;
        let _guard = pdfium_guard();
        // The wait for the lock may have outlived the request.
        deadline.check()?;
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(load_error)?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        debug!("PDF loaded: {} pages", total_pages);
        if total_pages == 0 {
            return Err(ConvertError::EmptyDocument);
        }

        let max_px = options.max_rendered_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(options.scale_factor())
            .set_maximum_width(max_px)
            .set_maximum_height(max_px);

        let mut images = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            deadline.check()?;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ConvertError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                }
            })?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

impl PdfWriter for PdfiumEngine {
    fn write_pdf(
        &self,
        pages: &mut PageStream<'_>,
        deadline: &Deadline,
    ) -> Result<Vec<u8>, ConvertError> {
        let write_err = |e: PdfiumError| ConvertError::PdfWriteFailed {
            detail: format!("{e:?}"),
        };

        deadline.check()?;
        let _guard = pdfium_guard();
        // The wait for the lock may have outlived the request.
        deadline.check()?;
        let pdfium = self.bind()?;
        let mut document = pdfium.create_new_pdf().map_err(write_err)?;

        for prepared in pages {
            let prepared = prepared?;
            deadline.check()?;
            let width = PdfPoints::new(prepared.width_pt);
            let height = PdfPoints::new(prepared.height_pt);
            let mut page = document
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::from_points(width, height))
                .map_err(write_err)?;

            let object =
                PdfPageImageObject::new_with_size(&document, &prepared.image, width, height)
                    .map_err(write_err)?;
            page.objects_mut()
                .add_image_object(object)
                .map_err(write_err)?;
        }

        document.save_to_bytes().map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::assemble::PdfPageSpec;
    use image::{Rgb, RgbImage};

    fn unbindable() -> PdfiumEngine {
        PdfiumEngine::new(Some(PathBuf::from("/nonexistent/libpdfium.so")))
    }

    fn options() -> RasterOptions {
        RasterOptions {
            dpi: 150,
            max_rendered_pixels: 4000,
            jpeg_quality: 90,
        }
    }

    // An expired job must not even try to bind the library.

    #[test]
    fn expired_render_returns_timeout_before_binding() {
        let err = unbindable()
            .render_pages(Path::new("upload.pdf"), &options(), &Deadline::after_secs(0))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Timeout { secs: 0 }), "{err:?}");
    }

    #[test]
    fn expired_write_returns_timeout_before_binding() {
        let mut pages = std::iter::once(Ok::<_, ConvertError>(PdfPageSpec {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))),
            width_pt: 4.0,
            height_pt: 4.0,
        }));
        let err = unbindable()
            .write_pdf(&mut pages, &Deadline::after_secs(0))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Timeout { .. }), "{err:?}");
    }

    #[test]
    fn live_deadline_reaches_the_binding_step() {
        let err = unbindable()
            .render_pages(Path::new("upload.pdf"), &options(), &Deadline::never())
            .unwrap_err();
        assert!(matches!(err, ConvertError::PdfiumBindingFailed(_)), "{err:?}");
    }
}

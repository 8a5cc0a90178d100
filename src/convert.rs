//! Conversion entry points.
//!
//! [`Converter`] ties the pipeline stages together for the two request types:
//!
//! ```text
//! pdf_to_jpg:  validate ─▶ stage in workspace ─▶ rasterize ─▶ archive
//! jpg_to_pdf:  validate ─▶ normalize (each image) ─▶ assemble
//! ```
//!
//! Validation runs on the async side; it is cheap and must reject bad uploads
//! before any blocking work is queued. Everything after it is CPU-bound or
//! touches PDFium, so it runs inside `spawn_blocking` under the configured
//! timeout. The request workspace is created and dropped inside the blocking
//! job, so its directory is gone by the time the job returns.
//!
//! Each call runs inside a `tracing` span named after the operation; the span
//! is re-entered on the blocking thread so backend logs carry it too.

use crate::config::ServiceConfig;
use crate::deadline::Deadline;
use crate::engine::PdfiumEngine;
use crate::error::ConvertError;
use crate::output::{ConversionOutput, ConversionResult, ConversionStats};
use crate::pipeline::archive::{pack_entries, page_entry_name, ArchiveEntry};
use crate::pipeline::assemble::{assemble_pdf, PdfWriter};
use crate::pipeline::normalize::normalize_image;
use crate::pipeline::rasterize::{rasterize_pdf, Rasterizer};
use crate::pipeline::validate::{validate_jpeg_uploads, validate_pdf_upload, UploadedFile};
use crate::workspace::RequestWorkspace;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, Span};

/// Fixed name of the staged upload inside a request workspace.
const STAGED_PDF_NAME: &str = "upload.pdf";

/// Runs conversions against a rendering backend.
///
/// Cheap to clone; all clones share the configuration and backends.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ServiceConfig>,
    rasterizer: Arc<dyn Rasterizer>,
    writer: Arc<dyn PdfWriter>,
}

impl Converter {
    pub fn new(
        config: Arc<ServiceConfig>,
        rasterizer: Arc<dyn Rasterizer>,
        writer: Arc<dyn PdfWriter>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            writer,
        }
    }

    /// Converter backed by PDFium for both directions.
    pub fn with_pdfium(config: Arc<ServiceConfig>) -> Self {
        let engine = Arc::new(PdfiumEngine::new(config.pdfium_lib_path.clone()));
        Self::new(config, engine.clone(), engine)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Rasterise every page of one uploaded PDF and return a zip of
    /// `page_1.jpg … page_N.jpg`.
    ///
    /// # Errors
    /// * `Rejected`: missing, wrong-type, or oversized upload
    /// * `CorruptPdf` / `PasswordProtected` / `EmptyDocument`: PDFium refused it
    /// * `Timeout`: the conversion exceeded `request_timeout_secs`
    #[instrument(name = "pdf_to_jpg", skip_all, fields(files = files.len()))]
    pub async fn pdf_to_jpg(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<ConversionOutput, ConvertError> {
        let start = Instant::now();
        let upload = validate_pdf_upload(files, &self.config.upload_limits())?;
        let input_bytes = upload.len() as u64;
        info!(
            "Converting PDF '{}' ({} bytes) to JPEG pages",
            upload.filename, input_bytes
        );

        let rasterizer = Arc::clone(&self.rasterizer);
        let options = self.config.raster_options();
        let result = self
            .run_blocking(move |deadline| {
                let workspace = RequestWorkspace::new()?;
                let pdf_path = workspace.stage(STAGED_PDF_NAME, &upload.bytes)?;
                let pages = rasterize_pdf(rasterizer.as_ref(), &pdf_path, &options, &deadline)?;
                let entries: Vec<ArchiveEntry> = pages
                    .into_iter()
                    .map(|p| ArchiveEntry {
                        name: page_entry_name(p.page_num),
                        bytes: p.bytes,
                    })
                    .collect();
                let bytes = pack_entries(&entries)?;
                Ok(ConversionResult::Archive {
                    bytes,
                    entries: entries.len(),
                })
            })
            .await?;

        Ok(finish(result, input_bytes, start))
    }

    /// Combine uploaded JPEGs, in upload order, into one PDF.
    ///
    /// Any image that fails to decode fails the whole request; the error
    /// names the file. Images are decoded one at a time as pages are written.
    #[instrument(name = "jpg_to_pdf", skip_all, fields(files = files.len()))]
    pub async fn jpg_to_pdf(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<ConversionOutput, ConvertError> {
        let start = Instant::now();
        let uploads = validate_jpeg_uploads(files, &self.config.upload_limits())?;
        let input_bytes: u64 = uploads.iter().map(|f| f.len() as u64).sum();
        info!(
            "Combining {} image(s) ({} bytes) into a PDF",
            uploads.len(),
            input_bytes
        );

        let writer = Arc::clone(&self.writer);
        let layout = self.config.page_layout;
        let dpi = self.config.dpi;
        let result = self
            .run_blocking(move |deadline| {
                let images = uploads.iter().map(|f| normalize_image(&f.filename, &f.bytes));
                let bytes = assemble_pdf(writer.as_ref(), images, &layout, dpi, &deadline)?;
                Ok(ConversionResult::Pdf {
                    bytes,
                    pages: uploads.len(),
                })
            })
            .await?;

        Ok(finish(result, input_bytes, start))
    }

    /// Run `job` on the blocking pool, bounded by the request timeout.
    ///
    /// A blocking thread cannot be cancelled, so on timeout the job is
    /// abandoned rather than stopped: its result is discarded and its
    /// workspace is still removed when it returns. The job receives the same
    /// deadline and is expected to bail out early once it has passed.
    async fn run_blocking<T, F>(&self, job: F) -> Result<T, ConvertError>
    where
        T: Send + 'static,
        F: FnOnce(Deadline) -> Result<T, ConvertError> + Send + 'static,
    {
        let secs = self.config.request_timeout_secs;
        let deadline = Deadline::after_secs(secs);
        let span = Span::current();
        let handle = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            job(deadline)
        });
        match tokio::time::timeout(Duration::from_secs(secs), handle).await {
            Ok(joined) => {
                joined.map_err(|e| ConvertError::Internal(format!("Task join error: {e}")))?
            }
            Err(_) => Err(ConvertError::Timeout { secs }),
        }
    }
}

fn finish(result: ConversionResult, input_bytes: u64, start: Instant) -> ConversionOutput {
    let stats = ConversionStats {
        pages: result.page_count(),
        input_bytes,
        output_bytes: result.bytes().len() as u64,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} page(s), {} → {} bytes, {}ms",
        stats.pages, stats.input_bytes, stats.output_bytes, stats.duration_ms
    );
    debug!("Download name: {}", result.download_name());
    ConversionOutput { result, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PageLayout, RasterOptions};
    use crate::error::ErrorKind;
    use crate::pipeline::assemble::PageStream;
    use crate::pipeline::normalize::encode_jpeg;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Returns `pages` grey bitmaps and remembers the path it was given.
    struct FakeRasterizer {
        pages: usize,
        seen_path: Mutex<Option<PathBuf>>,
    }

    impl Rasterizer for FakeRasterizer {
        fn render_pages(
            &self,
            pdf_path: &Path,
            _options: &RasterOptions,
            _deadline: &Deadline,
        ) -> Result<Vec<DynamicImage>, ConvertError> {
            assert!(pdf_path.exists(), "staged PDF must exist during render");
            *self.seen_path.lock().unwrap() = Some(pdf_path.to_path_buf());
            Ok((0..self.pages)
                .map(|_| DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 30, Rgb([128, 128, 128]))))
                .collect())
        }
    }

    struct SlowRasterizer;

    impl Rasterizer for SlowRasterizer {
        fn render_pages(
            &self,
            _pdf_path: &Path,
            _options: &RasterOptions,
            _deadline: &Deadline,
        ) -> Result<Vec<DynamicImage>, ConvertError> {
            std::thread::sleep(Duration::from_millis(2500));
            Ok(vec![])
        }
    }

    /// Records the staged path, optionally stalls, then fails like a
    /// truncated document.
    #[derive(Default)]
    struct FailingRasterizer {
        stall: Duration,
        seen_path: Mutex<Option<PathBuf>>,
        finished: AtomicBool,
    }

    impl Rasterizer for FailingRasterizer {
        fn render_pages(
            &self,
            pdf_path: &Path,
            _options: &RasterOptions,
            _deadline: &Deadline,
        ) -> Result<Vec<DynamicImage>, ConvertError> {
            *self.seen_path.lock().unwrap() = Some(pdf_path.to_path_buf());
            std::thread::sleep(self.stall);
            self.finished.store(true, Ordering::SeqCst);
            Err(ConvertError::CorruptPdf {
                detail: "no xref".into(),
            })
        }
    }

    /// Emits a fake document whose body lists the page sizes.
    struct FakeWriter;

    impl PdfWriter for FakeWriter {
        fn write_pdf(
            &self,
            pages: &mut PageStream<'_>,
            _deadline: &Deadline,
        ) -> Result<Vec<u8>, ConvertError> {
            let mut out = b"%PDF-1.7\n".to_vec();
            for p in pages {
                let p = p?;
                out.extend_from_slice(format!("{}x{}\n", p.width_pt, p.height_pt).as_bytes());
            }
            Ok(out)
        }
    }

    fn converter(rasterizer: Arc<dyn Rasterizer>, config: ServiceConfig) -> Converter {
        Converter::new(Arc::new(config), rasterizer, Arc::new(FakeWriter))
    }

    fn fake_pdf() -> UploadedFile {
        UploadedFile::new("doc.pdf", b"%PDF-1.7\n%fake".to_vec())
    }

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        encode_jpeg(&RgbImage::from_pixel(w, h, Rgb([10, 200, 10])), 90).unwrap()
    }

    #[tokio::test]
    async fn pdf_to_jpg_zips_every_page_and_cleans_up() {
        let fake = Arc::new(FakeRasterizer {
            pages: 3,
            seen_path: Mutex::new(None),
        });
        let c = converter(fake.clone(), ServiceConfig::default());

        let out = c.pdf_to_jpg(vec![fake_pdf()]).await.unwrap();
        assert_eq!(out.stats.pages, 3);
        assert_eq!(out.result.content_type(), "application/zip");

        let mut archive = zip::ZipArchive::new(Cursor::new(out.result.into_bytes())).unwrap();
        let names: Vec<_> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["page_1.jpg", "page_2.jpg", "page_3.jpg"]);

        let staged = fake.seen_path.lock().unwrap().clone().unwrap();
        assert!(!staged.exists(), "workspace must be removed after the request");
    }

    #[tokio::test]
    async fn pdf_to_jpg_rejects_before_rendering() {
        let fake = Arc::new(FakeRasterizer {
            pages: 1,
            seen_path: Mutex::new(None),
        });
        let c = converter(fake.clone(), ServiceConfig::default());

        let err = c
            .pdf_to_jpg(vec![UploadedFile::new("doc.pdf", b"hello".to_vec())])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(fake.seen_path.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn slow_conversion_times_out() {
        let config = ServiceConfig::builder()
            .request_timeout_secs(1)
            .build()
            .unwrap();
        let c = converter(Arc::new(SlowRasterizer), config);
        let err = c.pdf_to_jpg(vec![fake_pdf()]).await.unwrap_err();
        assert!(matches!(err, ConvertError::Timeout { secs: 1 }));
        assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    }

    #[tokio::test]
    async fn failed_render_still_removes_workspace() {
        let fake = Arc::new(FailingRasterizer::default());
        let c = converter(fake.clone(), ServiceConfig::default());

        let err = c.pdf_to_jpg(vec![fake_pdf()]).await.unwrap_err();
        assert!(matches!(err, ConvertError::CorruptPdf { .. }));

        let staged = fake.seen_path.lock().unwrap().clone().unwrap();
        assert!(!staged.exists(), "workspace must be removed on error");
        assert!(!staged.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn timed_out_job_removes_workspace_when_it_finishes() {
        let config = ServiceConfig::builder()
            .request_timeout_secs(1)
            .build()
            .unwrap();
        let fake = Arc::new(FailingRasterizer {
            stall: Duration::from_millis(1500),
            ..Default::default()
        });
        let c = converter(fake.clone(), config);

        let err = c.pdf_to_jpg(vec![fake_pdf()]).await.unwrap_err();
        assert!(matches!(err, ConvertError::Timeout { secs: 1 }));
        assert!(!fake.finished.load(Ordering::SeqCst), "job still running");

        let staged = fake.seen_path.lock().unwrap().clone().unwrap();
        assert!(staged.exists(), "workspace lives until the job returns");

        // The abandoned job returns about half a second later.
        for _ in 0..100 {
            if fake.finished.load(Ordering::SeqCst) && !staged.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(fake.finished.load(Ordering::SeqCst));
        assert!(!staged.exists(), "workspace must be removed after a timeout");
        assert!(!staged.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn jpg_to_pdf_keeps_upload_order() {
        let config = ServiceConfig::builder()
            .page_layout(PageLayout::FirstImage)
            .dpi(72)
            .build()
            .unwrap();
        let c = converter(
            Arc::new(FakeRasterizer {
                pages: 0,
                seen_path: Mutex::new(None),
            }),
            config,
        );

        let files = vec![
            UploadedFile::new("a.jpg", jpeg(100, 50)),
            UploadedFile::new("b.jpeg", jpeg(10, 10)),
        ];
        let out = c.jpg_to_pdf(files).await.unwrap();
        assert_eq!(out.stats.pages, 2);
        let body = String::from_utf8(out.result.into_bytes()).unwrap();
        assert!(body.starts_with("%PDF"));
        // Both pages take the first image's size.
        assert_eq!(body.matches("100x50").count(), 2);
    }

    #[tokio::test]
    async fn jpg_to_pdf_without_images_is_rejected() {
        let c = converter(
            Arc::new(FakeRasterizer {
                pages: 0,
                seen_path: Mutex::new(None),
            }),
            ServiceConfig::default(),
        );
        let err = c.jpg_to_pdf(vec![]).await.unwrap_err();
        assert_eq!(err.summary(), "No images uploaded");
    }

    #[tokio::test]
    async fn one_unreadable_image_fails_the_request() {
        let config = ServiceConfig::builder().sniff_content(false).build().unwrap();
        let c = converter(
            Arc::new(FakeRasterizer {
                pages: 0,
                seen_path: Mutex::new(None),
            }),
            config,
        );
        let files = vec![
            UploadedFile::new("ok.jpg", jpeg(8, 8)),
            UploadedFile::new("bad.jpg", b"not a jpeg".to_vec()),
        ];
        let err = c.jpg_to_pdf(files).await.unwrap_err();
        assert!(matches!(err, ConvertError::UnreadableImage { ref filename, .. } if filename == "bad.jpg"));
    }
}

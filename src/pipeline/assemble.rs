//! PDF assembly: normalised images → one multi-page PDF.
//!
//! Page geometry is decided here, once per document, by [`layout_pages`];
//! the [`PdfWriter`] backend only places each prepared bitmap on a page of
//! the given size. That keeps the "every page shares one canvas" rule out of
//! the backend.
//!
//! Pages are produced lazily. The canvas comes from the first image; each
//! later image is decoded, fitted to the canvas and handed to the writer
//! before the next one is decoded, so at most one full-size source bitmap is
//! alive at a time.

use crate::config::PageLayout;
use crate::deadline::Deadline;
use crate::error::ConvertError;
use crate::pipeline::normalize::{letterbox, resize_exact};
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// PDF user space unit: 72 points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// One output page: a bitmap that exactly covers a page of the given size.
#[derive(Debug, Clone)]
pub struct PdfPageSpec {
    pub image: DynamicImage,
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Pages in document order, each built on demand.
pub type PageStream<'a> = dyn Iterator<Item = Result<PdfPageSpec, ConvertError>> + 'a;

/// Capability to write prepared pages into a PDF document.
///
/// Implementations drain `pages` in order, stop at the first `Err`, and draw
/// each image scaled to the full page.
pub trait PdfWriter: Send + Sync {
    fn write_pdf(
        &self,
        pages: &mut PageStream<'_>,
        deadline: &Deadline,
    ) -> Result<Vec<u8>, ConvertError>;
}

/// Pixel canvas for a page of `pt` points at `dpi`.
pub fn points_to_pixels(pt: f32, dpi: u32) -> u32 {
    ((pt * dpi as f32 / POINTS_PER_INCH).round() as u32).max(1)
}

/// Page extent in points for `px` pixels at `dpi`.
pub fn pixels_to_points(px: u32, dpi: u32) -> f32 {
    px as f32 * POINTS_PER_INCH / dpi.max(1) as f32
}

/// The one page size shared by every page of a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCanvas {
    pub width_px: u32,
    pub height_px: u32,
    pub width_pt: f32,
    pub height_pt: f32,
    letterboxed: bool,
}

impl PageCanvas {
    /// Canvas for `layout`, given the first image's pixel size.
    pub fn for_layout(layout: &PageLayout, first: (u32, u32), dpi: u32) -> Self {
        match *layout {
            PageLayout::Fixed {
                width_pt,
                height_pt,
            } => Self {
                width_px: points_to_pixels(width_pt, dpi),
                height_px: points_to_pixels(height_pt, dpi),
                width_pt,
                height_pt,
                letterboxed: true,
            },
            PageLayout::FirstImage => {
                let (w, h) = first;
                Self {
                    width_px: w,
                    height_px: h,
                    width_pt: pixels_to_points(w, dpi),
                    height_pt: pixels_to_points(h, dpi),
                    letterboxed: false,
                }
            }
        }
    }

    /// Fit `img` to the canvas. The source bitmap is consumed.
    pub fn place(&self, img: RgbImage) -> PdfPageSpec {
        let fitted = if self.letterboxed {
            letterbox(&img, self.width_px, self.height_px)
        } else {
            resize_exact(img, self.width_px, self.height_px)
        };
        PdfPageSpec {
            image: DynamicImage::ImageRgb8(fitted),
            width_pt: self.width_pt,
            height_pt: self.height_pt,
        }
    }
}

/// Apply `layout` to `images`, producing pages of one uniform size.
///
/// Only the first image is decoded up front (it fixes the canvas); the rest
/// are pulled from `images` as the returned iterator is advanced.
pub fn layout_pages<I>(
    images: I,
    layout: &PageLayout,
    dpi: u32,
) -> Result<impl Iterator<Item = Result<PdfPageSpec, ConvertError>>, ConvertError>
where
    I: IntoIterator<Item = Result<RgbImage, ConvertError>>,
{
    let mut images = images.into_iter();
    let first = match images.next() {
        Some(first) => first?,
        None => {
            return Err(ConvertError::EmptyOutput {
                detail: "No images to assemble".into(),
            })
        }
    };

    let canvas = PageCanvas::for_layout(layout, first.dimensions(), dpi);
    debug!(
        "Page canvas {}x{} px ({:.1}x{:.1} pt)",
        canvas.width_px, canvas.height_px, canvas.width_pt, canvas.height_pt
    );

    Ok(std::iter::once(Ok(first))
        .chain(images)
        .map(move |img| img.map(|img| canvas.place(img))))
}

/// Lay out `images` and write them as one PDF.
///
/// # Errors
/// `EmptyOutput` for an empty image list or a zero-byte document; the first
/// image error, deadline expiry, or backend error otherwise.
pub fn assemble_pdf<I>(
    writer: &dyn PdfWriter,
    images: I,
    layout: &PageLayout,
    dpi: u32,
    deadline: &Deadline,
) -> Result<Vec<u8>, ConvertError>
where
    I: IntoIterator<Item = Result<RgbImage, ConvertError>>,
{
    deadline.check()?;
    let mut placed = 0usize;
    let bytes = {
        let mut pages = layout_pages(images, layout, dpi)?.inspect(|_| placed += 1);
        writer.write_pdf(&mut pages, deadline)?
    };
    if bytes.is_empty() {
        return Err(ConvertError::EmptyOutput {
            detail: "PDF writer produced zero bytes".into(),
        });
    }
    debug!("Assembled {} page(s) → {} bytes", placed, bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::WHITE;
    use image::{GenericImageView, Rgb};
    use std::cell::Cell;
    use std::sync::Mutex;

    /// Records the page geometry it was asked to write.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u32, u32, f32, f32)>>,
        output: Vec<u8>,
    }

    impl PdfWriter for Recorder {
        fn write_pdf(
            &self,
            pages: &mut PageStream<'_>,
            _deadline: &Deadline,
        ) -> Result<Vec<u8>, ConvertError> {
            for p in pages {
                let p = p?;
                self.seen.lock().unwrap().push((
                    p.image.width(),
                    p.image.height(),
                    p.width_pt,
                    p.height_pt,
                ));
            }
            Ok(self.output.clone())
        }
    }

    fn img(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([0, 0, 0]))
    }

    fn decoded(images: Vec<RgbImage>) -> impl Iterator<Item = Result<RgbImage, ConvertError>> {
        images.into_iter().map(Ok)
    }

    fn pdf_recorder() -> Recorder {
        Recorder {
            output: b"%PDF-1.7".to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn letter_canvas_at_150_dpi() {
        assert_eq!(points_to_pixels(612.0, 150), 1275);
        assert_eq!(points_to_pixels(792.0, 150), 1650);
        assert_eq!(pixels_to_points(1275, 150), 612.0);
    }

    #[test]
    fn fixed_layout_gives_every_page_the_same_canvas() {
        let pages: Vec<_> = layout_pages(
            decoded(vec![img(400, 300), img(100, 900)]),
            &PageLayout::LETTER,
            72,
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(pages.len(), 2);
        for p in &pages {
            assert_eq!(p.image.dimensions(), (612, 792));
            assert_eq!((p.width_pt, p.height_pt), (612.0, 792.0));
        }
        // Landscape image is letterboxed: top margin stays white.
        let first = pages[0].image.to_rgb8();
        assert_eq!(*first.get_pixel(306, 5), WHITE);
        assert_eq!(*first.get_pixel(306, 396), Rgb([0, 0, 0]));
    }

    #[test]
    fn first_image_layout_resizes_later_pages() {
        let pages: Vec<_> = layout_pages(
            decoded(vec![img(300, 200), img(50, 50)]),
            &PageLayout::FirstImage,
            150,
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
        assert!(pages.iter().all(|p| p.image.dimensions() == (300, 200)));
        assert_eq!(pages[1].width_pt, 144.0);
        assert_eq!(pages[1].height_pt, 96.0);
    }

    #[test]
    fn large_sources_reach_the_writer_already_canvas_sized() {
        let writer = pdf_recorder();
        assemble_pdf(
            &writer,
            decoded(vec![img(2400, 3000), img(3000, 1800), img(2000, 2000)]),
            &PageLayout::LETTER,
            72,
            &Deadline::never(),
        )
        .unwrap();
        let seen = writer.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|&(w, h, _, _)| (w, h) == (612, 792)));
    }

    #[test]
    fn images_are_decoded_one_page_at_a_time() {
        let decodes = Cell::new(0usize);
        let images = (0..4).map(|_| {
            decodes.set(decodes.get() + 1);
            Ok::<_, ConvertError>(img(40, 40))
        });

        let mut pages = layout_pages(images, &PageLayout::FirstImage, 72).unwrap();
        assert_eq!(decodes.get(), 1, "only the first image fixes the canvas");
        for expected in 1..=4 {
            pages.next().unwrap().unwrap();
            assert_eq!(decodes.get(), expected);
        }
        assert!(pages.next().is_none());
    }

    #[test]
    fn decode_failure_stops_the_writer() {
        let writer = pdf_recorder();
        let images = vec![
            Ok(img(10, 10)),
            Err(ConvertError::UnreadableImage {
                filename: "bad.jpg".into(),
                detail: "truncated".into(),
            }),
            Ok(img(10, 10)),
        ];
        let err = assemble_pdf(
            &writer,
            images,
            &PageLayout::FirstImage,
            72,
            &Deadline::never(),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::UnreadableImage { ref filename, .. } if filename == "bad.jpg"));
        assert_eq!(writer.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_input_fails() {
        let writer = pdf_recorder();
        let err = assemble_pdf(
            &writer,
            decoded(vec![]),
            &PageLayout::LETTER,
            150,
            &Deadline::never(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("No images to assemble"));
        assert!(writer.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn expired_deadline_writes_nothing() {
        let writer = pdf_recorder();
        let err = assemble_pdf(
            &writer,
            decoded(vec![img(10, 10)]),
            &PageLayout::LETTER,
            72,
            &Deadline::after_secs(0),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Timeout { .. }));
        assert!(writer.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_byte_output_fails() {
        let writer = Recorder::default();
        let err = assemble_pdf(
            &writer,
            decoded(vec![img(10, 10)]),
            &PageLayout::LETTER,
            72,
            &Deadline::never(),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::EmptyOutput { .. }));
    }

    #[test]
    fn writer_sees_pages_in_order() {
        let writer = pdf_recorder();
        let bytes = assemble_pdf(
            &writer,
            decoded(vec![img(10, 20), img(30, 40), img(50, 60)]),
            &PageLayout::FirstImage,
            72,
            &Deadline::never(),
        )
        .unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
        let seen = writer.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|&(w, h, _, _)| (w, h) == (10, 20)));
    }
}

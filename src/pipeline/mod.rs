//! Pipeline stages for PDF ⇄ JPEG conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the rendering backend can be swapped (see the
//! [`rasterize::Rasterizer`] and [`assemble::PdfWriter`] traits) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! validate ──▶ rasterize ──▶ archive        (PDF → zip of JPEGs)
//!          └─▶ normalize ──▶ assemble       (JPEGs → PDF)
//! ```
//!
//! 1. [`validate`]: refuse missing, mistyped or oversized uploads
//! 2. [`rasterize`]: render pages via a `Rasterizer`, flatten, JPEG-encode
//! 3. [`archive`]: pack `page_N.jpg` entries into an in-memory zip
//! 4. [`normalize`]: decode uploads to canonical RGB; letterbox/resize helpers
//! 5. [`assemble`]: apply the page layout and write a PDF via a `PdfWriter`
//!
//! Everything except `validate` is blocking and runs inside `spawn_blocking`.

pub mod archive;
pub mod assemble;
pub mod normalize;
pub mod rasterize;
pub mod validate;

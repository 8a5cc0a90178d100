//! # pdfjpg
//!
//! A small HTTP service that converts between PDF and JPEG:
//!
//! * `POST /api/pdf-to-jpg` rasterises every page of one uploaded PDF and
//!   returns a zip of `page_1.jpg … page_N.jpg`;
//! * `POST /api/jpg-to-pdf` combines uploaded JPEGs, in upload order, into one
//!   multi-page PDF.
//!
//! Rendering and PDF writing go through PDFium (via `pdfium-render`); image
//! decoding, compositing and JPEG encoding use the `image` crate.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Validate   presence, extension, size, magic bytes (async side)
//!  │
//!  ├─ PDF → JPG     (spawn_blocking, under the request timeout)
//!  │   ├─ 2. Stage      write the upload into a per-request temp dir
//!  │   ├─ 3. Rasterize  PDFium renders each page; flatten to RGB; JPEG-encode
//!  │   └─ 4. Archive    zip entries page_N.jpg in page order
//!  │
//!  └─ JPG → PDF     (spawn_blocking, under the request timeout)
//!      ├─ 2. Normalize  decode each image, composite alpha onto white
//!      └─ 3. Assemble   apply the page layout, write one PDF via PDFium
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfjpg::{AppState, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = ServiceConfig::builder().dpi(200).build().expect("valid config");
//!     let state = AppState::with_pdfium(config);
//!     pdfjpg::serve(state, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfjpg-server` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` to embed the router in another axum application:
//! ```toml
//! pdfjpg = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AllowedOrigins, PageLayout, RasterOptions, ServiceConfig, ServiceConfigBuilder, UploadLimits,
    DEFAULT_MAX_UPLOAD_BYTES,
};
pub use convert::Converter;
pub use deadline::Deadline;
pub use engine::PdfiumEngine;
pub use error::{ConvertError, ErrorKind, Rejection};
pub use output::{ConversionOutput, ConversionResult, ConversionStats};
pub use pipeline::assemble::{PageStream, PdfPageSpec, PdfWriter};
pub use pipeline::rasterize::Rasterizer;
pub use pipeline::validate::UploadedFile;
pub use server::{build_router, serve, AppState};

//! Server binary for pdfjpg.
//!
//! A thin shim over the library crate that maps flags and environment
//! variables to `ServiceConfig`, checks that PDFium can be loaded, and serves
//! until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use pdfjpg::{AllowedOrigins, AppState, PageLayout, PdfiumEngine, ServiceConfig};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENDPOINTS:
  GET  /health            Service status and limits
  POST /api/pdf-to-jpg    multipart field "file" (or "pdf"): one PDF → zip of page_N.jpg
  POST /api/jpg-to-pdf    multipart field "images" (repeatable): JPEGs → one PDF

EXAMPLES:
  curl -F file=@report.pdf http://localhost:5001/api/pdf-to-jpg -o pages.zip
  curl -F images=@a.jpg -F images=@b.jpg http://localhost:5001/api/jpg-to-pdf -o out.pdf

PDFIUM:
  The pdfium shared library is looked up in PDFIUM_LIB_PATH, then ./, ./lib,
  next to the executable, <exe>/../lib, and finally the system library path.
"#;

/// HTTP service converting PDFs to JPEG pages and JPEGs to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdfjpg-server",
    version,
    about = "HTTP service converting PDFs to JPEG pages and JPEGs to PDF",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// TCP port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 5001)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Comma-separated CORS origins; `*` allows any.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    allowed_origins: String,

    /// Per-file and per-request upload limit in bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = pdfjpg::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Rasterisation DPI (72–400).
    #[arg(long, env = "RASTER_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Longest edge of a rendered page, in pixels.
    #[arg(long, env = "MAX_RENDERED_PIXELS", default_value_t = 4000)]
    max_rendered_pixels: u32,

    /// JPEG quality for rendered pages (1–100).
    #[arg(long, env = "JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Page size for JPG-to-PDF: letter, a4, or first-image.
    #[arg(long, env = "PAGE_LAYOUT", default_value = "letter")]
    page_layout: String,

    /// Check file content against its extension.
    #[arg(long, env = "SNIFF_CONTENT", default_value_t = true, action = clap::ArgAction::Set)]
    sniff_content: bool,

    /// Upper bound on one conversion, in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 300)]
    request_timeout_secs: u64,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> Result<ServiceConfig> {
        let origins: AllowedOrigins = self
            .allowed_origins
            .parse()
            .context("Invalid ALLOWED_ORIGINS")?;
        let layout: PageLayout = self.page_layout.parse().context("Invalid PAGE_LAYOUT")?;

        let mut builder = ServiceConfig::builder()
            .bind_address(self.bind)
            .listen_port(self.port)
            .allowed_origins(origins)
            .max_upload_bytes(self.max_upload_bytes)
            .dpi(self.dpi)
            .max_rendered_pixels(self.max_rendered_pixels)
            .jpeg_quality(self.jpeg_quality)
            .page_layout(layout)
            .sniff_content(self.sniff_content)
            .request_timeout_secs(self.request_timeout_secs);
        if let Some(ref path) = self.pdfium_lib_path {
            builder = builder.pdfium_lib_path(path);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.to_config()?;
    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("{:?}", config);

    let engine = PdfiumEngine::new(config.pdfium_lib_path.clone());
    tokio::task::spawn_blocking(move || engine.verify_binding())
        .await
        .context("PDFium binding check task failed")?
        .context("PDFium is not available")?;

    let state = AppState::with_pdfium(config);
    pdfjpg::serve(state, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

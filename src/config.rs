//! Service configuration.
//!
//! Everything the service needs to know is held in one [`ServiceConfig`],
//! built once at startup via [`ServiceConfigBuilder`] and passed explicitly
//! into the converter and the router. Nothing reads the environment after
//! startup; the binary maps environment variables onto builder calls.

use crate::error::ConvertError;
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

/// Default per-file and per-request upload limit: 15 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use pdfjpg::{PageLayout, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .dpi(200)
///     .max_upload_bytes(10 * 1024 * 1024)
///     .page_layout(PageLayout::FirstImage)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to. Default: `0.0.0.0`.
    pub bind_address: IpAddr,

    /// TCP port of the HTTP listener. Default: 5001.
    pub listen_port: u16,

    /// Origins allowed by the CORS layer. Default: any origin.
    pub allowed_origins: AllowedOrigins,

    /// Maximum size of one uploaded file, and of all files of one request
    /// combined, in bytes. Default: 15 MiB.
    pub max_upload_bytes: usize,

    /// Rasterisation resolution for PDF pages. Range: 72–400. Default: 150.
    ///
    /// Also used to size the pixel canvas of fixed-size PDF pages, so a
    /// JPG-to-PDF page holds as many pixels as a PDF-to-JPG page produces.
    pub dpi: u32,

    /// Cap on the longest edge of a rasterised page, in pixels. Default: 4000.
    ///
    /// A 150-DPI render of an A0 poster would otherwise allocate hundreds of
    /// megabytes for one page.
    pub max_rendered_pixels: u32,

    /// JPEG quality for rasterised pages (1–100). Default: 90.
    pub jpeg_quality: u8,

    /// Page geometry used when assembling a PDF. Default: US Letter.
    pub page_layout: PageLayout,

    /// Check that file content matches its extension. Default: true.
    ///
    /// With sniffing on, non-PDF bytes named `*.pdf` are rejected as a bad
    /// request (400); with it off they reach PDFium and fail as a conversion
    /// error (500).
    pub sniff_content: bool,

    /// Upper bound on one conversion, in seconds. Default: 300.
    pub request_timeout_secs: u64,

    /// Explicit location of the pdfium shared library (file or directory).
    /// If None, the library is looked up next to the executable, in `./lib`,
    /// then on the system library path.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: 5001,
            allowed_origins: AllowedOrigins::Any,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            dpi: 150,
            max_rendered_pixels: 4000,
            jpeg_quality: 90,
            page_layout: PageLayout::default(),
            sniff_content: true,
            request_timeout_secs: 300,
            pdfium_lib_path: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("listen", &format_args!("{}:{}", self.bind_address, self.listen_port))
            .field("allowed_origins", &self.allowed_origins)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("page_layout", &self.page_layout)
            .field("sniff_content", &self.sniff_content)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Limits applied by the upload validator.
    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_upload_bytes,
            sniff_content: self.sniff_content,
        }
    }

    /// Options handed to the rasteriser.
    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            dpi: self.dpi,
            max_rendered_pixels: self.max_rendered_pixels,
            jpeg_quality: self.jpeg_quality,
        }
    }

    /// Body size accepted by the HTTP layer: the upload limit plus room for
    /// multipart framing. The validator enforces the exact limit.
    pub fn transport_body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(1024 * 1024)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bind_address(mut self, addr: IpAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.listen_port = port;
        self
    }

    pub fn allowed_origins(mut self, origins: AllowedOrigins) -> Self {
        self.config.allowed_origins = origins;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn page_layout(mut self, layout: PageLayout) -> Self {
        self.config.page_layout = layout;
        self
    }

    pub fn sniff_content(mut self, v: bool) -> Self {
        self.config.sniff_content = v;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConvertError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ConvertError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "Maximum upload size must be > 0".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if let PageLayout::Fixed {
            width_pt,
            height_pt,
        } = c.page_layout
        {
            if !(width_pt > 0.0 && height_pt > 0.0) {
                return Err(ConvertError::InvalidConfig(format!(
                    "Page size must be positive, got {width_pt}x{height_pt} pt"
                )));
            }
        }
        if let AllowedOrigins::List(ref origins) = c.allowed_origins {
            if origins.is_empty() {
                return Err(ConvertError::InvalidConfig(
                    "Allowed origin list is empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Derived option sets ──────────────────────────────────────────────────

/// Checks applied to uploads before any conversion work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Per-file and cumulative byte limit.
    pub max_bytes: usize,
    /// Verify magic bytes instead of trusting the extension.
    pub sniff_content: bool,
}

/// Rendering parameters for PDF pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub jpeg_quality: u8,
}

impl RasterOptions {
    /// PDFium scale factor: PDF user space is 72 points per inch.
    pub fn scale_factor(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// CORS origin policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin (`*`). (default)
    #[default]
    Any,
    /// Exactly these origins, e.g. `https://example.com`.
    List(Vec<String>),
}

impl FromStr for AllowedOrigins {
    type Err = ConvertError;

    /// Parse a comma-separated origin list; `*` or an empty string means any.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let origins: Vec<String> = s
            .split(',')
            .map(|o| o.trim().trim_end_matches('/'))
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            return Ok(AllowedOrigins::Any);
        }
        if let Some(bad) = origins
            .iter()
            .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
        {
            return Err(ConvertError::InvalidConfig(format!(
                "CORS origin '{bad}' must start with http:// or https://"
            )));
        }
        Ok(AllowedOrigins::List(origins))
    }
}

/// Page geometry policy for JPG-to-PDF.
///
/// One policy is chosen per service and applied to every page of a document:
///
/// | Policy | Canvas | Fit |
/// |--------|--------|-----|
/// | `Fixed` | page size in points × dpi / 72 | letterboxed, aspect preserved, white margins |
/// | `FirstImage` | first image's pixel size | later pages resized exactly |
///
/// Serialises as `{"fixed":{"width_pt":..,"height_pt":..}}` or
/// `"first_image"` in the health report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLayout {
    /// Every page has this size in PDF points (1/72 inch).
    Fixed { width_pt: f32, height_pt: f32 },
    /// The first image's dimensions define every page.
    FirstImage,
}

impl PageLayout {
    /// US Letter, 8.5 × 11 in.
    pub const LETTER: PageLayout = PageLayout::Fixed {
        width_pt: 612.0,
        height_pt: 792.0,
    };

    /// ISO A4, 210 × 297 mm.
    pub const A4: PageLayout = PageLayout::Fixed {
        width_pt: 595.0,
        height_pt: 842.0,
    };
}

impl Default for PageLayout {
    fn default() -> Self {
        PageLayout::LETTER
    }
}

impl FromStr for PageLayout {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(PageLayout::LETTER),
            "a4" => Ok(PageLayout::A4),
            "first-image" | "first_image" | "first" => Ok(PageLayout::FirstImage),
            other => Err(ConvertError::InvalidConfig(format!(
                "Unknown page layout '{other}' (expected letter, a4, or first-image)"
            ))),
        }
    }
}

//! HTTP surface of the service.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET | `/`, `/health` | — | service status JSON |
//! | POST | `/api/pdf-to-jpg` | multipart `file` (or `pdf`) | `application/zip` |
//! | POST | `/api/jpg-to-pdf` | multipart `images` (repeatable) | `application/pdf` |
//!
//! Errors are JSON `{"error": ..., "details": ...}` with 400, 413 or 500.

pub mod handlers;
pub mod response;

use crate::config::{AllowedOrigins, ServiceConfig};
use crate::convert::Converter;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared, immutable per-process state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub converter: Converter,
}

impl AppState {
    pub fn new(converter: Converter) -> Self {
        let config = Arc::new(converter.config().clone());
        Self { config, converter }
    }

    /// State backed by PDFium.
    pub fn with_pdfium(config: ServiceConfig) -> Self {
        let config = Arc::new(config);
        Self {
            converter: Converter::with_pdfium(Arc::clone(&config)),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.transport_body_limit();
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .route("/api/pdf-to-jpg", post(handlers::pdf_to_jpg))
        .route("/api/jpg-to-pdf", post(handlers::jpg_to_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => AllowOrigin::list(list.iter().filter_map(|o| {
            HeaderValue::from_str(o)
                .map_err(|_| warn!("Skipping unusable CORS origin '{}'", o))
                .ok()
        })),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION, response::PAGE_COUNT_HEADER])
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = SocketAddr::new(state.config.bind_address, state.config.listen_port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

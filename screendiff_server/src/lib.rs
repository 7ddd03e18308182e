// THEORY:
// `screendiff_server` is the transport around the diff engine. It accepts a
// JSON request naming two screenshots, runs the engine, and answers either with
// the PNG artifact itself (statistics in `X-*` headers) or with a JSON document
// embedding the artifact as base64.
//
// The engine is synchronous and CPU-bound, so every diff runs on tokio's
// blocking pool. A semaphore caps how many run at once; that is the only
// shared state in the service and it never touches pixel data.

pub mod assets;
pub mod config;
pub mod error;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use screendiff::{DiffArtifact, DiffRequest, DiffStatistics, RenderMode, compute_diff};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub use config::ServerConfig;
pub use error::ApiError;

pub const HEADER_DIFFERENT_PIXELS: &str = "x-different-pixels";
pub const HEADER_DIFFERENCE_PERCENTAGE: &str = "x-difference-percentage";
pub const HEADER_IMAGE_WIDTH: &str = "x-image-width";
pub const HEADER_IMAGE_HEIGHT: &str = "x-image-height";
pub const HEADER_DIFF_FILE: &str = "x-diff-file";

/// Body of `POST /api/diff` and `POST /api/diff/json`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiffBody {
    #[serde(flatten)]
    pub request: DiffRequest,
    /// Also write the artifact into the output directory.
    #[serde(default)]
    pub save: bool,
}

/// Body returned by `POST /api/diff/json`.
#[derive(Debug, Clone, Serialize)]
pub struct DiffJsonResponse {
    pub stats: DiffStatistics,
    pub mode: RenderMode,
    /// Base64-encoded PNG.
    pub image: String,
    pub file: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    limiter: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_diffs.max(1)));
        Self {
            config: Arc::new(config),
            limiter,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Diff slots not currently taken by a running request.
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Resolves the request paths, runs the engine off the async runtime and,
    /// when asked, stores the artifact. Returns the saved file name, if any.
    pub async fn run_diff(
        &self,
        body: DiffBody,
    ) -> Result<(DiffArtifact, Option<String>), ApiError> {
        let root = self.config.screenshots_dir.as_deref();
        let request = DiffRequest {
            path_a: assets::resolve(root, &body.request.path_a),
            path_b: assets::resolve(root, &body.request.path_b),
            ..body.request
        };

        let permit = self
            .limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::LimiterClosed)?;
        let artifact = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            compute_diff(&request)
        })
        .await??;

        let file = if body.save || self.config.save_artifacts {
            let name = assets::save_artifact(&self.config.output_dir, &artifact.png)
                .await
                .map_err(ApiError::Save)?;
            tracing::info!(file = %name, "diff artifact saved");
            Some(name)
        } else {
            None
        };

        Ok((artifact, file))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/diff", post(diff_png))
        .route("/api/diff/json", post(diff_json))
        .with_state(state)
}

async fn root() -> Html<&'static str> {
    Html(
        "<html><head><title>screendiff</title></head><body>\
         <h1>screendiff</h1>\
         <p>POST <code>/api/diff</code> with <code>{\"imageA\", \"imageB\", \"threshold\", \"mode\"}</code> \
         to receive a PNG diff, or <code>/api/diff/json</code> for JSON.</p>\
         </body></html>",
    )
}

fn header_value(value: String) -> Result<HeaderValue, ApiError> {
    HeaderValue::try_from(value).map_err(|e| ApiError::Response(e.to_string()))
}

/// Statistics headers consumed by UI layers and CI gates.
pub fn stats_headers(stats: &DiffStatistics, file: Option<&str>) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        HeaderName::from_static(HEADER_DIFFERENT_PIXELS),
        HeaderValue::from(stats.different_pixel_count),
    );
    headers.insert(
        HeaderName::from_static(HEADER_DIFFERENCE_PERCENTAGE),
        header_value(format!("{:?}", stats.difference_percentage))?,
    );
    headers.insert(HeaderName::from_static(HEADER_IMAGE_WIDTH), HeaderValue::from(stats.width));
    headers.insert(HeaderName::from_static(HEADER_IMAGE_HEIGHT), HeaderValue::from(stats.height));
    if let Some(file) = file {
        headers.insert(HeaderName::from_static(HEADER_DIFF_FILE), header_value(file.to_string())?);
    }
    Ok(headers)
}

async fn diff_png(
    State(state): State<AppState>,
    Json(body): Json<DiffBody>,
) -> Result<Response, ApiError> {
    let (artifact, file) = state.run_diff(body).await?;
    let headers = stats_headers(&artifact.stats, file.as_deref())?;
    Ok((headers, artifact.png).into_response())
}

async fn diff_json(
    State(state): State<AppState>,
    Json(body): Json<DiffBody>,
) -> Result<Json<DiffJsonResponse>, ApiError> {
    let (artifact, file) = state.run_diff(body).await?;
    Ok(Json(DiffJsonResponse {
        image: BASE64.encode(&artifact.png),
        stats: artifact.stats,
        mode: artifact.mode,
        file,
    }))
}

/// Binds the listener and serves the API on a background task.
pub async fn start_server(cfg: ServerConfig) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let bind_addr = cfg.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        bind = %bind_addr,
        screenshots_dir = ?cfg.screenshots_dir,
        output_dir = %cfg.output_dir.display(),
        max_concurrent_diffs = cfg.max_concurrent_diffs,
        "screendiff server listening"
    );

    let app = router(AppState::new(cfg));
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server stopped");
        }
    });

    Ok(server)
}

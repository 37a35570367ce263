use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::TenkiError;
use crate::api::{ForecastSource, JmaClient};
use crate::config::{ServerConfig, TenkiConfig};
use crate::models::{RegionCatalog, RegionCode, RegionLink};
use crate::render::PageRenderer;
use crate::store::{FetchState, ForecastStore};

/// Everything the handlers share
#[derive(Clone)]
pub struct AppState {
    pub regions: Arc<RegionCatalog>,
    pub store: ForecastStore,
    pub pages: Arc<PageRenderer>,
    /// How long a first view waits for data before showing the placeholder
    pub render_wait: Duration,
}

impl AppState {
    /// Wire the JMA client, cache and renderer described by `config`
    pub fn from_config(config: &TenkiConfig) -> Result<Self> {
        let source = Arc::new(JmaClient::new(&config.forecast)?);
        Self::with_source(config, source)
    }

    pub fn with_source(config: &TenkiConfig, source: Arc<dyn ForecastSource>) -> Result<Self> {
        let pages = PageRenderer::new(
            config.forecast.timezone()?,
            config.server.source_url.clone(),
        )?;
        let regions = config.catalog();
        let store = ForecastStore::new(source, config.forecast.artificial_delay())
            .with_cache_limit(regions.codes(), config.forecast.max_cached_codes);
        Ok(Self {
            regions: Arc::new(regions),
            store,
            pages: Arc::new(pages),
            render_wait: config.forecast.render_wait(),
        })
    }
}

impl IntoResponse for TenkiError {
    fn into_response(self) -> Response {
        let status = match &self {
            TenkiError::Validation { .. } => StatusCode::BAD_REQUEST,
            TenkiError::Fetch(_) => StatusCode::BAD_GATEWAY,
            TenkiError::Config { .. } | TenkiError::Render { .. } | TenkiError::Io { .. } => {
                tracing::error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.user_message()).into_response()
    }
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/regions", get(list_regions))
        .route("/weather/{id}", get(weather_state))
        .route("/weather/{id}/reload", post(reload_state))
        .layer(cors);

    Router::new()
        .route("/", get(index_page))
        .route("/weather/{id}", get(weather_page))
        .route("/weather/{id}/reload", post(reload_page))
        .nest("/api", api)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = router(
        state,
        Duration::from_secs(config.request_timeout_seconds.into()),
    );
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    #[cfg(feature = "tls")]
    {
        if let (Some(cert), Some(key)) = (&config.tls_cert_path, &config.tls_key_path) {
            let _ = rustls::crypto::ring::default_provider().install_default();
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
                .await
                .with_context(|| "Failed to load TLS certificate or key")?;
            let handle = axum_server::Handle::new();
            tokio::spawn(graceful_shutdown(handle.clone()));
            tracing::info!("Web server running at https://{}", addr);
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .with_context(|| "HTTPS server failed")?;
            return Ok(());
        }
    }

    #[cfg(not(feature = "tls"))]
    if config.tls_cert_path.is_some() {
        tracing::warn!("TLS paths configured but built without the `tls` feature, serving plain HTTP");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "HTTP server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(feature = "tls")]
async fn graceful_shutdown(handle: axum_server::Handle) {
    shutdown_signal().await;
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>, TenkiError> {
    Ok(Html(state.pages.render_index(&state.regions)?))
}

async fn weather_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, TenkiError> {
    let code: RegionCode = id.parse()?;
    let mut snapshot = state.store.fetch_weather(code);

    // First view of a code: give the fetch a moment so the page arrives filled in
    if snapshot.data.is_none() && snapshot.is_loading && !state.render_wait.is_zero() {
        if let Some(settled) = state.store.wait_settled(code, state.render_wait).await {
            snapshot = settled;
        }
    }

    Ok(Html(state.pages.render_weather(&snapshot)?))
}

async fn reload_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, TenkiError> {
    let code: RegionCode = id.parse()?;
    state.store.reload(code);
    Ok(Redirect::to(&code.detail_href()))
}

async fn list_regions(State(state): State<AppState>) -> Json<Vec<RegionLink>> {
    Json(state.regions.links())
}

async fn weather_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FetchState>, TenkiError> {
    let code: RegionCode = id.parse()?;
    Ok(Json(state.store.fetch_weather(code)))
}

async fn reload_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FetchState>, TenkiError> {
    let code: RegionCode = id.parse()?;
    Ok(Json(state.store.reload(code)))
}

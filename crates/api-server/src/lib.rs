pub mod harvest_routes;
pub mod request_id;

#[cfg(test)]
mod routes_tests;

use advisor_client::{AdvisorConfig, AnthropicAdvisor};
use anyhow::Context;
use axum::{
    error_handling::HandleErrorLayer,
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use harvest_core::{HarvestError, QuoteProvider, ReplacementAdvisor};
use harvest_engine::{EngineConfig, HarvestingEngine, ReplacementTable};
use quote_client::{PolygonQuoteClient, StaticQuotes};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::{BoxError, ServiceBuilder};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = "Tax-Loss Harvesting API";

#[derive(Clone)]
pub struct AppState {
    pub engine: HarvestingEngine,
    /// Whether a generative advisor is wired in (reported by `/health`)
    pub advisor_backend: Option<&'static str>,
    pub quote_backend: &'static str,
}

/// HTTP-level settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    pub replacements_path: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .context("PORT must be a valid port number")?;
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let request_timeout = Duration::from_secs(
            std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be whole seconds")?,
        );
        let replacements_path = std::env::var("HARVEST_REPLACEMENTS_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout,
            replacements_path,
        })
    }
}

/// Error type returned by handlers
#[derive(Debug)]
pub enum AppError {
    Harvest(HarvestError),
    /// Body could not be read as an analysis request
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<HarvestError> for AppError {
    fn from(err: HarvestError) -> Self {
        AppError::Harvest(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Harvest(HarvestError::Validation(v)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "success": false,
                    "error": format!("Invalid request: {}", v),
                    "fields": v.errors,
                })),
            )
                .into_response(),
            AppError::BadRequest(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "success": false,
                    "error": message,
                })),
            )
                .into_response(),
            AppError::Harvest(err) => {
                tracing::error!("Analysis failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Analysis failed due to an internal error",
                    })),
                )
                    .into_response()
            }
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Internal server error",
                    })),
                )
                    .into_response()
            }
        }
    }
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, Json<serde_json::Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "success": false, "error": "Request timed out" })),
        )
    } else {
        tracing::error!("Unhandled middleware error: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Internal server error" })),
        )
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

/// Routes plus middleware, without binding a socket
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(harvest_routes::root))
        .route("/health", get(harvest_routes::health))
        .merge(harvest_routes::harvest_routes())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(config.request_timeout),
        )
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

/// Wire the engine from environment settings.
///
/// Without `POLYGON_API_KEY` the server still starts, with an empty price
/// sheet, so every position is reported as skipped.
pub fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let engine_config = EngineConfig::from_env().context("invalid engine configuration")?;

    let quotes: Arc<dyn QuoteProvider> = match PolygonQuoteClient::from_env() {
        Some(client) => Arc::new(client),
        None => {
            tracing::warn!("POLYGON_API_KEY not set; no market quotes will be available");
            Arc::new(StaticQuotes::new())
        }
    };
    let quote_backend = quotes.provider_name();

    let mut builder = HarvestingEngine::builder(quotes).config(engine_config.clone());

    let advisor_config = AdvisorConfig {
        timeout: engine_config.advisor_timeout,
        ..AdvisorConfig::default()
    };
    let advisor_backend = match AnthropicAdvisor::new(advisor_config) {
        Some(advisor) => {
            tracing::info!("Replacement advisor enabled (model {})", advisor.model());
            let backend = advisor.backend_name();
            builder = builder.advisor(Arc::new(advisor));
            Some(backend)
        }
        None => {
            tracing::info!("ANTHROPIC_API_KEY not set; using the static replacement table");
            None
        }
    };

    if let Some(path) = &config.replacements_path {
        let table = ReplacementTable::from_json_file(path)?;
        tracing::info!("Loaded replacement table from {}", path);
        builder = builder.replacements(table);
    }

    Ok(AppState {
        engine: builder.build(),
        advisor_backend,
        quote_backend,
    })
}

pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Starting {}", SERVICE_NAME);

    let config = ServerConfig::from_env()?;
    let state = build_state(&config)?;
    let app = build_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

//! Tax-Loss Harvesting API Routes

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use harvest_core::{AnalysisRequest, AnalysisResult};
use serde::Serialize;

use crate::{AppError, AppState, SERVICE_NAME};

#[derive(Serialize)]
pub struct ServiceStatus {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub quotes: &'static str,
    pub advisor: Option<&'static str>,
    pub rate_table: String,
}

pub fn harvest_routes() -> Router<AppState> {
    Router::new().route("/api/analyze-portfolio", post(analyze_portfolio))
}

pub async fn root() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        message: SERVICE_NAME,
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        quotes: state.quote_backend,
        advisor: state.advisor_backend,
        rate_table: state.engine.rate_table().version().to_string(),
    })
}

/// Analyze a portfolio for tax-loss harvesting opportunities
async fn analyze_portfolio(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let result = state.engine.analyze(&request).await?;
    Ok(Json(result))
}

use crate::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use quote_client::StaticQuotes;
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout: Duration::from_secs(30),
        replacements_path: None,
    }
}

fn test_app() -> Router {
    let quotes = StaticQuotes::new()
        .with_price("AAPL", dec!(150))
        .with_price("MSFT", dec!(400));
    let state = AppState {
        engine: HarvestingEngine::builder(Arc::new(quotes)).build(),
        advisor_backend: None,
        quote_backend: "static",
    };
    build_router(state, &test_config())
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/analyze-portfolio")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_root_and_health() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["quotes"], "static");
    assert_eq!(body["advisor"], Value::Null);
}

#[tokio::test]
async fn test_analyze_portfolio() {
    let response = test_app()
        .oneshot(post_json(
            r#"{"positions":[
                {"ticker":"AAPL","shares":100,"cost_basis":20000,"purchase_date":"2024-01-15"},
                {"ticker":"MSFT","shares":10,"cost_basis":3000,"purchase_date":"2024-01-15"}
            ],"tax_bracket":0.32}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    let opportunities = body["opportunities"].as_array().unwrap();
    assert_eq!(opportunities.len(), 1);
    assert_eq!(opportunities[0]["ticker"], "AAPL");
    assert_eq!(opportunities[0]["unrealized_loss"], 5000.0);
    assert_eq!(opportunities[0]["tax_savings"], 750.0);
    assert_eq!(opportunities[0]["is_long_term"], true);
    assert_eq!(body["total_tax_savings"], 750.0);
    assert!(body["summary"].as_str().unwrap().starts_with("Found 1"));
}

#[tokio::test]
async fn test_validation_errors_are_422() {
    let response = test_app()
        .oneshot(post_json(
            r#"{"positions":[
                {"ticker":"AAPL","shares":-5,"cost_basis":20000,"purchase_date":"2024-01-15"}
            ],"tax_bracket":0.32}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["fields"][0]["field"], "positions[0].shares");
}

#[tokio::test]
async fn test_malformed_body_is_422() {
    let response = test_app()
        .oneshot(post_json(r#"{"positions": "nope"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

#[test]
fn test_invariant_violation_maps_to_500() {
    let response =
        AppError::from(HarvestError::InvariantViolation("broken table".to_string())).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = AppError::from(anyhow::anyhow!("boom")).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

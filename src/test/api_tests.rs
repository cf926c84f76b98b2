use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use crate::api::router;
use crate::constants::TRAIN_SPLIT_RATIO;
use crate::data::InMemoryRepository;
use crate::lstm::step_3_lstm_model_arch::StockLstmConfig;
use crate::lstm::step_4_train_model::TrainingConfig;
use crate::service::{ForecastService, ServiceConfig};
use crate::util::model_utils::ModelStore;
use crate::util::test_utils::{linear_observations, StaticFeed};

fn test_app(base_route: &str) -> (Router, TempDir) {
    let dir = tempdir().unwrap();
    let training = TrainingConfig {
        learning_rate: 0.01,
        batch_size: 8,
        epochs: 1,
        seed: Some(1),
    };
    let config = ServiceConfig {
        model_name: "api".into(),
        sequence_length: 5,
        train_ratio: TRAIN_SPLIT_RATIO,
        technical_model: StockLstmConfig::new(5, 4),
        technical_training: training.clone(),
        persisted_model: StockLstmConfig::new(1, 4),
        persisted_training: training,
    };
    let service = ForecastService::new(
        InMemoryRepository::new(),
        // Too short for technical features: /predict always fails
        StaticFeed::new(linear_observations(20, 10.0, 1.0)),
        ModelStore::new(dir.path()),
        config,
    );
    (router(Arc::new(service), base_route), dir)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_predict_missing_parameters() {
    let (app, _dir) = test_app("");

    let (status, body) = send(&app, "POST", "/predict", Some(json!({"symbol": "AAPL"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Missing parameters. Required: [\"symbol\", \"start_date\", \"end_date\"]"
    );

    let (status, _) = send(&app, "POST", "/predict", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_pipeline_failure_is_generic_500() {
    let (app, _dir) = test_app("");
    let (status, body) = send(
        &app,
        "POST",
        "/predict",
        Some(json!({"symbol": "AAPL", "start_date": "2023-01-01", "end_date": "2023-03-01"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Error processing prediction"}));
}

#[tokio::test]
async fn test_unknown_identifier_is_404() {
    let (app, _dir) = test_app("");
    let (status, body) = send(&app, "GET", "/stocks/NOPE?date=2024-01-01", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"data": null}));
}

#[tokio::test]
async fn test_store_train_and_predict_round_trip() {
    let (app, _dir) = test_app("");

    for i in 0..15 {
        let (status, body) = send(
            &app,
            "POST",
            "/stocks/data",
            Some(json!({
                "identifier": " bbas3 ",
                "price": 25.0 + i as f64 * 0.5,
                "utc_date_time": format!("2024-02-{:02}T18:00:00Z", i + 1),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
    }

    // Stored history but nothing trained yet
    let (status, body) = send(&app, "GET", "/stocks/BBAS3?date=2024-02-16", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("No trained model"));

    let (status, body) = send(&app, "POST", "/stocks/train", Some(json!({"identifier": "BBAS3"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["rows"], 15);

    let (status, body) = send(&app, "GET", "/stocks/bbas3?date=2024-02-16", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["identifier"], "BBAS3");
    assert_eq!(body["data"]["date_utc"], "2024-02-16");
    assert!(body["data"]["price"].as_f64().unwrap().is_finite());
}

#[tokio::test]
async fn test_bad_stock_data_rejected() {
    let (app, _dir) = test_app("");

    let (status, body) = send(&app, "POST", "/stocks/data", Some(json!({"identifier": "X"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Missing parameters"));

    let (status, _) = send(
        &app,
        "POST",
        "/stocks/data",
        Some(json!({"identifier": "X", "price": 1.0, "utc_date_time": "soon"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_train_without_history_is_400() {
    let (app, _dir) = test_app("");
    let (status, body) = send(&app, "POST", "/stocks/train", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Insufficient data"));
}

#[tokio::test]
async fn test_base_route_prefixes_stock_routes() {
    let (app, _dir) = test_app("/stocks-guru");

    let (status, body) = send(&app, "GET", "/stocks-guru/stocks/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"data": null}));

    // Unprefixed stock routes are gone, /predict stays at the root
    let (status, body) = send(&app, "GET", "/stocks/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, "POST", "/predict", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

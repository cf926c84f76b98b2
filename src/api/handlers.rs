// External crates
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;

// Internal modules
use super::dto::{
    DateQuery, PredictRequest, PredictResponse, SaveStockDataRequest, StockPriceResponse,
    TrainRequest, TrainResponse, PREDICT_REQUIRED,
};
use crate::data::{PriceFeed, PriceRepository};
use crate::error::{PipelineError, Result};
use crate::service::ForecastService;
use crate::util::resource_usage::measure;

pub type SharedService<R, F> = Arc<ForecastService<R, F>>;

/// Runs a pipeline call off the async workers
async fn run_blocking<T, Op>(op: Op) -> Result<T>
where
    T: Send + 'static,
    Op: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))?
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// `POST /predict`
pub async fn predict<R, F>(State(service): State<SharedService<R, F>>, body: Bytes) -> Response
where
    R: PriceRepository + 'static,
    F: PriceFeed + 'static,
{
    let request: PredictRequest = serde_json::from_slice(&body).unwrap_or_default();
    let Some((symbol, start_date, end_date)) = request.required() else {
        return error_body(
            StatusCode::BAD_REQUEST,
            format!("Missing parameters. Required: {:?}", PREDICT_REQUIRED),
        );
    };
    let (symbol, start_date, end_date) = (symbol.to_string(), start_date.to_string(), end_date.to_string());

    info!("Prediction requested for {} [{}, {})", symbol, start_date, end_date);
    let outcome = run_blocking(move || {
        let (result, measurement) = measure(|| service.predict_range(&symbol, &start_date, &end_date));
        result.map(|forecast| PredictResponse::new(forecast, measurement))
    })
    .await;

    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Prediction failed: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Error processing prediction")
        }
    }
}

/// `POST /stocks/train`
pub async fn train<R, F>(State(service): State<SharedService<R, F>>, body: Bytes) -> Response
where
    R: PriceRepository + 'static,
    F: PriceFeed + 'static,
{
    let request: TrainRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TrainRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "success": false, "error": format!("Invalid request body: {}", e) })),
                )
                    .into_response()
            }
        }
    };

    let outcome = run_blocking(move || service.train_from_store(request.identifier.as_deref())).await;
    match outcome {
        Ok(summary) => (StatusCode::OK, Json(TrainResponse::from(summary))).into_response(),
        Err(e) => {
            warn!("Training failed: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// `POST /stocks/data`
pub async fn save_stock_data<R, F>(State(service): State<SharedService<R, F>>, body: Bytes) -> Response
where
    R: PriceRepository + 'static,
    F: PriceFeed + 'static,
{
    let request: SaveStockDataRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)),
    };
    let (Some(identifier), Some(price), Some(utc_date_time)) =
        (request.identifier.clone(), request.price(), request.utc_date_time.clone())
    else {
        return error_body(
            StatusCode::BAD_REQUEST,
            "Missing parameters. Required: [\"identifier\", \"price\", \"utc_date_time\"]",
        );
    };

    let outcome = run_blocking(move || service.save_observation(&identifier, price, &utc_date_time)).await;
    match outcome {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => error_body(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// `GET /stocks/{identifier}?date=`
pub async fn get_stock_price<R, F>(
    State(service): State<SharedService<R, F>>,
    Path(identifier): Path<String>,
    Query(query): Query<DateQuery>,
) -> Response
where
    R: PriceRepository + 'static,
    F: PriceFeed + 'static,
{
    let date = query
        .date
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| Utc::now().date_naive().to_string());

    let outcome = run_blocking(move || service.predict_stored(&identifier, &date)).await;
    match outcome {
        Ok(Some(price)) => (StatusCode::OK, Json(StockPriceResponse { data: Some(price) })).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(StockPriceResponse { data: None })).into_response(),
        Err(e) => {
            warn!("Stock price lookup failed: {}", e);
            error_body(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

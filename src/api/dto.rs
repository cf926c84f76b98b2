//! Request and response bodies for the HTTP routes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::service::{PredictedPrice, RangeForecast, TrainSummary};
use crate::util::resource_usage::{Measurement, ResourceVariation};

/// Parameters `/predict` cannot run without
pub const PREDICT_REQUIRED: [&str; 3] = ["symbol", "start_date", "end_date"];

#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    pub symbol: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl PredictRequest {
    /// `(symbol, start_date, end_date)` when all three are present and non-blank
    pub fn required(&self) -> Option<(&str, &str, &str)> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        Some((
            present(&self.symbol)?,
            present(&self.start_date)?,
            present(&self.end_date)?,
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub current_price: f64,
    pub prediction: f64,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub response_time_seconds: f64,
    pub resource_variation: ResourceVariation,
}

impl PredictResponse {
    pub fn new(forecast: RangeForecast, measurement: Measurement) -> Self {
        Self {
            current_price: forecast.current_price,
            prediction: forecast.prediction,
            mae: forecast.mae,
            rmse: forecast.rmse,
            mape: forecast.mape,
            response_time_seconds: measurement.response_time_seconds,
            resource_variation: measurement.resource_variation,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrainRequest {
    pub identifier: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainResponse {
    pub success: bool,
    pub message: String,
    pub version: String,
    pub rows: usize,
    pub final_loss: f64,
}

impl From<TrainSummary> for TrainResponse {
    fn from(summary: TrainSummary) -> Self {
        Self {
            success: true,
            message: "Model trained successfully".to_string(),
            version: summary.version,
            rows: summary.rows,
            final_loss: summary.final_loss,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveStockDataRequest {
    pub identifier: Option<String>,
    /// Number or numeric string
    pub price: Option<Value>,
    pub utc_date_time: Option<String>,
}

impl SaveStockDataRequest {
    pub fn price(&self) -> Option<f64> {
        match self.price.as_ref()? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StockPriceResponse {
    pub data: Option<PredictedPrice>,
}

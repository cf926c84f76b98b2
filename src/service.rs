//! Request orchestration: ties the price ports, the feature pipeline, the
//! trainer and the artifact store together behind four operations.

// External crates
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use log::{info, warn};
use serde::{Deserialize, Serialize};

// Internal modules
use crate::constants::{MODEL_FILE_NAME, SEQUENCE_LENGTH, TARGET_COLUMN, TRAIN_SPLIT_RATIO};
use crate::data::{
    normalize_identifier, parse_date, parse_utc_date_time, Observation, PriceFeed, PricePoint,
    PriceRepository,
};
use crate::error::{PipelineError, Result};
use crate::lstm::step_1_tensor_preparation::{
    create_windows, split_train_test, windows_to_tensors, MinMaxScaler,
};
use crate::lstm::step_3_lstm_model_arch::StockLstmConfig;
use crate::lstm::step_4_train_model::{train_model, TrainingConfig};
use crate::lstm::step_5_prediction::Predictor;
use crate::lstm::step_6_model_serialization::ModelMetadata;
use crate::util::feature_engineering::{build_feature_matrix, FeatureSet};
use crate::util::metrics::evaluate;
use crate::util::model_utils::ModelStore;

pub type TrainBackend = Autodiff<NdArray<f32>>;
pub type InferBackend = NdArray<f32>;

/// Hyper-parameters for both training paths
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Artifact name inside the model store
    pub model_name: String,
    pub sequence_length: usize,
    pub train_ratio: f64,
    pub technical_model: StockLstmConfig,
    pub technical_training: TrainingConfig,
    pub persisted_model: StockLstmConfig,
    pub persisted_training: TrainingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_name: MODEL_FILE_NAME.to_string(),
            sequence_length: SEQUENCE_LENGTH,
            train_ratio: TRAIN_SPLIT_RATIO,
            technical_model: StockLstmConfig::technical(),
            technical_training: TrainingConfig::technical(),
            persisted_model: StockLstmConfig::close_only(),
            persisted_training: TrainingConfig::persisted(),
        }
    }
}

impl ServiceConfig {
    pub fn with_model_name(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            ..Self::default()
        }
    }
}

/// Result of an ad-hoc range forecast, prices in currency units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeForecast {
    pub current_price: f64,
    pub prediction: f64,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
}

/// Outcome of retraining the persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSummary {
    pub version: String,
    pub rows: usize,
    pub final_loss: f64,
}

/// Next-price prediction for a stored identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedPrice {
    pub identifier: String,
    pub price: f64,
    pub date_utc: String,
}

/// Trains a throwaway model on `observations` and scores it.
///
/// Technical features are split positionally; the scaler is fit on the train
/// rows only and reused for the test rows and the final window. Metrics are
/// in price units. The next close comes from the last `T` feature rows.
pub fn forecast_from_observations(
    observations: &[Observation],
    config: &ServiceConfig,
    device: &NdArrayDevice,
) -> Result<RangeForecast> {
    let t = config.sequence_length;
    let matrix = build_feature_matrix(observations, FeatureSet::Technical)?;
    let current_price = matrix
        .last_close()
        .ok_or_else(|| PipelineError::insufficient(1, 0))?;

    let (train_raw, test_raw) = split_train_test(&matrix.values, config.train_ratio)?;
    if train_raw.nrows() <= t || test_raw.nrows() <= t {
        // Smallest feature matrix whose train and test parts both exceed T
        let mut required = t + 1;
        while ((required as f64 * config.train_ratio).floor() as usize) <= t
            || required - ((required as f64 * config.train_ratio).floor() as usize) <= t
        {
            required += 1;
        }
        return Err(PipelineError::insufficient(required, matrix.len()));
    }

    let (train_scaled, scaler) = MinMaxScaler::fit_scale(&train_raw, &matrix.columns)?;
    let test_scaled = scaler.transform(&test_raw.view())?;

    let train_windows = create_windows(&train_scaled, t, TARGET_COLUMN)?;
    let test_windows = create_windows(&test_scaled, t, TARGET_COLUMN)?;

    let (x_train, y_train) = windows_to_tensors::<TrainBackend>(&train_windows, device);
    let (model, report) = train_model::<TrainBackend>(
        x_train,
        y_train,
        &config.technical_model,
        &config.technical_training,
        device,
    )?;

    let metadata = ModelMetadata::new(
        FeatureSet::Technical,
        t,
        config.technical_model,
        config.technical_training.clone(),
        &report,
    );
    let predictor = Predictor::<InferBackend>::new(model, scaler, metadata, device);

    let (x_test, _) = windows_to_tensors::<InferBackend>(&test_windows, device);
    let scaled_predictions = predictor.predict_batch(x_test)?;
    let to_price = |v: f64| predictor.scaler().inverse_value(v, TARGET_COLUMN);
    let y_true: Vec<f64> = test_windows.targets.iter().map(|&v| to_price(v as f64)).collect();
    let y_pred: Vec<f64> = scaled_predictions.into_iter().map(to_price).collect();
    let metrics = evaluate(&y_true, &y_pred)?;

    let prediction = predictor.predict_next(&matrix.values)?;

    Ok(RangeForecast {
        current_price,
        prediction,
        mae: metrics.mae,
        rmse: metrics.rmse,
        mape: metrics.mape,
    })
}

/// Stock forecasting service over a price store and a market-data feed
pub struct ForecastService<R, F> {
    repository: R,
    feed: F,
    store: ModelStore,
    config: ServiceConfig,
    device: NdArrayDevice,
}

impl<R: PriceRepository, F: PriceFeed> ForecastService<R, F> {
    pub fn new(repository: R, feed: F, store: ModelStore, config: ServiceConfig) -> Self {
        Self {
            repository,
            feed,
            store,
            config,
            device: NdArrayDevice::default(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Fetches `[start_date, end_date)` for `symbol`, trains, evaluates and
    /// predicts the next close. Nothing is persisted.
    pub fn predict_range(&self, symbol: &str, start_date: &str, end_date: &str) -> Result<RangeForecast> {
        let symbol = normalize_identifier(symbol);
        if symbol.is_empty() {
            return Err(PipelineError::InvalidInput("symbol must not be empty".into()));
        }
        let start = parse_date(start_date)?;
        let end = parse_date(end_date)?;
        if start >= end {
            return Err(PipelineError::InvalidInput(format!(
                "start_date {} must precede end_date {}",
                start, end
            )));
        }

        let observations = self.feed.fetch_daily(&symbol, start, end)?;
        info!("Forecasting {} from {} observations", symbol, observations.len());
        forecast_from_observations(&observations, &self.config, &self.device)
    }

    /// Retrains the persisted model on stored prices: one identifier, or every
    /// stored price when `identifier` is `None`.
    pub fn train_from_store(&self, identifier: Option<&str>) -> Result<TrainSummary> {
        let points = match identifier.map(normalize_identifier) {
            Some(id) if !id.is_empty() => self.repository.get_historical_stock_data(&id)?,
            _ => self.repository.get_historical_prices()?,
        };
        let t = self.config.sequence_length;
        if points.is_empty() {
            return Err(PipelineError::insufficient(t + 1, 0));
        }

        let observations: Vec<Observation> = points.iter().map(Observation::from).collect();
        let matrix = build_feature_matrix(&observations, FeatureSet::CloseOnly)?;
        let (scaled, scaler) = MinMaxScaler::fit_scale(&matrix.values, &matrix.columns)?;
        let windows = create_windows(&scaled, t, TARGET_COLUMN)?;

        let (x, y) = windows_to_tensors::<TrainBackend>(&windows, &self.device);
        let (model, report) = train_model::<TrainBackend>(
            x,
            y,
            &self.config.persisted_model,
            &self.config.persisted_training,
            &self.device,
        )?;

        let metadata = ModelMetadata::new(
            FeatureSet::CloseOnly,
            t,
            self.config.persisted_model,
            self.config.persisted_training.clone(),
            &report,
        );
        let version = self
            .store
            .commit(&self.config.model_name, &model, &scaler, &metadata)?;

        Ok(TrainSummary {
            version,
            rows: matrix.len(),
            final_loss: report.final_loss,
        })
    }

    /// Next price for a stored identifier; `None` when it has no history
    pub fn predict_stored(&self, identifier: &str, date: &str) -> Result<Option<PredictedPrice>> {
        let identifier = normalize_identifier(identifier);
        let points = self.repository.get_historical_stock_data(&identifier)?;
        if points.is_empty() {
            warn!("No stored prices for {}", identifier);
            return Ok(None);
        }

        let predictor = Predictor::<InferBackend>::load(&self.store, &self.config.model_name, &self.device)?;
        let observations: Vec<Observation> = points.iter().map(Observation::from).collect();
        let matrix = build_feature_matrix(&observations, predictor.metadata().feature_set)?;
        let price = predictor.predict_next(&matrix.values)?;

        Ok(Some(PredictedPrice {
            identifier,
            price,
            date_utc: date.trim().to_string(),
        }))
    }

    /// Validates and appends one stored price
    pub fn save_observation(&self, identifier: &str, price: f64, utc_date_time: &str) -> Result<PricePoint> {
        let point = PricePoint::new(identifier, price, parse_utc_date_time(utc_date_time)?)?;
        self.repository.save_price(point.clone())?;
        Ok(point)
    }
}

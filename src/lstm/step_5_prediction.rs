// External imports
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use log::debug;
use ndarray::{s, Array2};

// Internal imports
use super::step_1_tensor_preparation::{window_to_tensor, MinMaxScaler};
use super::step_3_lstm_model_arch::StockLstm;
use super::step_6_model_serialization::ModelMetadata;
use crate::constants::TARGET_COLUMN;
use crate::error::{PipelineError, Result};
use crate::util::model_utils::ModelStore;

/// A trained network paired with the scaler it was fit with.
///
/// The held model is never mutated; every prediction is a forward pass.
#[derive(Debug)]
pub struct Predictor<B: Backend> {
    model: StockLstm<B>,
    scaler: MinMaxScaler,
    metadata: ModelMetadata,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(model: StockLstm<B>, scaler: MinMaxScaler, metadata: ModelMetadata, device: &B::Device) -> Self {
        Self {
            model,
            scaler,
            metadata,
            device: device.clone(),
        }
    }

    /// Loads the artifact `name` currently committed in `store`
    pub fn load(store: &ModelStore, name: &str, device: &B::Device) -> Result<Self> {
        let (model, scaler, metadata) = store.load::<B>(name, device)?;
        Ok(Self::new(model, scaler, metadata, device))
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    pub fn sequence_length(&self) -> usize {
        self.metadata.sequence_length
    }

    /// One forward pass over a scaled `(T, F)` window; scaled output
    pub fn predict_scaled(&self, window: &Array2<f64>) -> Result<f64> {
        let (rows, cols) = window.dim();
        let t = self.sequence_length();
        if rows < t {
            return Err(PipelineError::insufficient(t, rows));
        }
        if rows != t {
            return Err(PipelineError::InvalidInput(format!(
                "window has {} rows, model takes {}",
                rows, t
            )));
        }
        if cols != self.model.input_size() {
            return Err(PipelineError::InvalidInput(format!(
                "window has {} features, model takes {}",
                cols,
                self.model.input_size()
            )));
        }

        let input = window_to_tensor::<B>(&window.view(), &self.device);
        let output = self.predict_batch(input)?;
        output
            .first()
            .copied()
            .ok_or_else(|| PipelineError::Training("model returned no output".into()))
    }

    /// Scaled predictions for every window in `[n, T, F]`
    pub fn predict_batch(&self, features: Tensor<B, 3>) -> Result<Vec<f64>> {
        let output = self.model.forward(features);
        let values = output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| PipelineError::Record(format!("{:?}", e)))?;
        Ok(values.into_iter().map(f64::from).collect())
    }

    /// Predicts the next close in price units
    ///
    /// # Arguments
    ///
    /// * `feature_rows` - Unscaled feature rows; only the last T are used
    ///
    /// # Returns
    ///
    /// Returns the inverse-scaled close, or `InsufficientData` when fewer than
    /// T rows are given
    pub fn predict_next(&self, feature_rows: &Array2<f64>) -> Result<f64> {
        let t = self.sequence_length();
        let rows = feature_rows.nrows();
        if rows < t {
            return Err(PipelineError::insufficient(t, rows));
        }

        let recent = feature_rows.slice(s![rows - t.., ..]);
        let scaled = self.scaler.transform(&recent)?;
        let prediction = self.predict_scaled(&scaled)?;
        let price = self.scaler.inverse_value(prediction, TARGET_COLUMN);
        debug!("Next close: scaled {:.6} -> {:.4}", prediction, price);
        Ok(price)
    }
}

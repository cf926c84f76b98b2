// External imports
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::cast::ToElement;
use burn::tensor::{Int, Tensor, TensorData};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_3_lstm_model_arch::{StockLstm, StockLstmConfig};
use crate::error::{PipelineError, Result};

/// Optimisation settings for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    /// Fixed shuffling seed; `None` draws one per run
    pub seed: Option<u64>,
}

impl TrainingConfig {
    /// Ad-hoc `/predict` runs: 50 epochs, batch 32
    pub fn technical() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 50,
            seed: None,
        }
    }

    /// Persisted-model retraining on close-only history: 50 epochs, batch 32
    pub fn persisted() -> Self {
        Self {
            learning_rate: 0.01,
            batch_size: 32,
            epochs: 50,
            seed: None,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::technical()
    }
}

/// Outcome of [`train_model`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub epochs_run: usize,
    /// Mean batch loss per epoch
    pub loss_history: Vec<f64>,
    pub final_loss: f64,
}

/// Mean squared error over every element
pub fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = predictions - targets;
    (diff.clone() * diff).mean()
}

/// Fits a fresh [`StockLstm`] with Adam and MSE
///
/// # Arguments
///
/// * `features` - Input windows `[n, T, F]`
/// * `targets` - Scaled next-step closes `[n, 1]`
/// * `model_config` - Network dimensions
/// * `config` - Learning rate, batch size, epochs and shuffle seed
/// * `device` - Device to train on
///
/// # Returns
///
/// Returns the trained network on the inner (non-autodiff) backend together
/// with its [`TrainingReport`]
pub fn train_model<B: AutodiffBackend>(
    features: Tensor<B, 3>,
    targets: Tensor<B, 2>,
    model_config: &StockLstmConfig,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<(StockLstm<B::InnerBackend>, TrainingReport)> {
    let [samples, sequence_length, n_features] = features.dims();

    if config.batch_size == 0 || config.epochs == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "batch size and epochs must be positive (got {} and {})",
            config.batch_size, config.epochs
        )));
    }
    if samples == 0 {
        return Err(PipelineError::insufficient(sequence_length + 1, sequence_length));
    }
    if n_features != model_config.input_size {
        return Err(PipelineError::InvalidInput(format!(
            "model expects {} features, windows carry {}",
            model_config.input_size, n_features
        )));
    }
    if targets.dims()[0] != samples {
        return Err(PipelineError::InvalidInput(format!(
            "{} windows but {} targets",
            samples,
            targets.dims()[0]
        )));
    }

    info!(
        "Training LSTM: {} windows of {}x{}, hidden {}, {} epochs, batch {}",
        samples, sequence_length, n_features, model_config.hidden_size, config.epochs, config.batch_size
    );

    let seed = config.seed.unwrap_or_else(|| rand::rng().random::<u64>());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut model: StockLstm<B> = model_config.init(device);
    let mut optimizer = AdamConfig::new().init();
    let mut indices: Vec<i64> = (0..samples as i64).collect();
    let mut loss_history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        indices.shuffle(&mut rng);

        let mut epoch_loss = 0.0;
        let mut batches = 0usize;
        for chunk in indices.chunks(config.batch_size) {
            let batch_idx = Tensor::<B, 1, Int>::from_data(
                TensorData::new(chunk.to_vec(), [chunk.len()]),
                device,
            );
            let batch_x = features.clone().select(0, batch_idx.clone());
            let batch_y = targets.clone().select(0, batch_idx);

            let predictions = model.forward(batch_x);
            let loss_tensor = mse_loss(predictions, batch_y);
            let loss = loss_tensor.clone().into_scalar().to_f64();
            if !loss.is_finite() {
                return Err(PipelineError::Training(format!(
                    "loss diverged to {} in epoch {}",
                    loss, epoch
                )));
            }

            let grads = GradientsParams::from_grads(loss_tensor.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);

            epoch_loss += loss;
            batches += 1;
        }

        let mean_loss = epoch_loss / batches as f64;
        debug!("Epoch {}/{}: loss {:.6}", epoch, config.epochs, mean_loss);
        loss_history.push(mean_loss);
    }

    let final_loss = loss_history.last().copied().unwrap_or(f64::NAN);
    info!("Training finished: final loss {:.6}", final_loss);

    Ok((
        model.valid(),
        TrainingReport {
            samples,
            epochs_run: loss_history.len(),
            loss_history,
            final_loss,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lstm::step_1_tensor_preparation::{create_windows, windows_to_tensors};
    use burn_autodiff::Autodiff;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use ndarray::Array2;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn sine_windows(rows: usize, t: usize) -> (Tensor<TestBackend, 3>, Tensor<TestBackend, 2>) {
        let device = NdArrayDevice::default();
        let matrix = Array2::from_shape_fn((rows, 1), |(i, _)| 0.5 + 0.4 * (i as f64 / 5.0).sin());
        let windows = create_windows(&matrix, t, 0).unwrap();
        windows_to_tensors::<TestBackend>(&windows, &device)
    }

    fn quick_config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            learning_rate: 0.01,
            batch_size: 8,
            epochs,
            seed: Some(42),
        }
    }

    #[test]
    fn test_mse_loss() {
        let device = NdArrayDevice::default();
        let p = Tensor::<NdArray<f32>, 2>::from_floats([[1.0], [3.0]], &device);
        let t = Tensor::<NdArray<f32>, 2>::from_floats([[0.0], [1.0]], &device);
        let loss = mse_loss(p, t).into_scalar().to_f64();
        assert!((loss - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_training_reduces_loss() {
        let device = NdArrayDevice::default();
        let (x, y) = sine_windows(60, 10);
        let (model, report) = train_model::<TestBackend>(
            x,
            y,
            &StockLstmConfig::new(1, 8),
            &quick_config(15),
            &device,
        )
        .unwrap();

        assert_eq!(report.samples, 50);
        assert_eq!(report.epochs_run, 15);
        assert!(report.final_loss.is_finite());
        assert!(report.final_loss < report.loss_history[0]);
        assert_eq!(model.input_size(), 1);
    }

    #[test]
    fn test_training_rejects_bad_config() {
        let device = NdArrayDevice::default();
        let (x, y) = sine_windows(20, 5);

        let zero_batch = TrainingConfig {
            batch_size: 0,
            ..quick_config(1)
        };
        assert!(matches!(
            train_model::<TestBackend>(x.clone(), y.clone(), &StockLstmConfig::new(1, 4), &zero_batch, &device),
            Err(PipelineError::InvalidInput(_))
        ));

        assert!(matches!(
            train_model::<TestBackend>(x, y, &StockLstmConfig::new(3, 4), &quick_config(1), &device),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_training_surfaces_divergence() {
        let device = NdArrayDevice::default();
        let (x, _) = sine_windows(20, 5);
        let y = Tensor::<TestBackend, 2>::full([15, 1], f32::NAN, &device);
        assert!(matches!(
            train_model::<TestBackend>(x, y, &StockLstmConfig::new(1, 4), &quick_config(1), &device),
            Err(PipelineError::Training(_))
        ));
    }
}

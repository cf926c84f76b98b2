use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::step_1_tensor_preparation::MinMaxScaler;
use super::step_3_lstm_model_arch::{StockLstm, StockLstmConfig};
use super::step_4_train_model::{TrainingConfig, TrainingReport};
use crate::built_info;
use crate::error::{PipelineError, Result};
use crate::util::feature_engineering::FeatureSet;

/// Weights file stem; the recorder appends `.bin`
pub const WEIGHTS_STEM: &str = "model";
pub const SCALER_FILE: &str = "scaler.json";
pub const METADATA_FILE: &str = "meta.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelMetadata {
    /// Crate version that produced the artifact
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub feature_set: FeatureSet,
    pub sequence_length: usize,
    pub model: StockLstmConfig,
    pub training: TrainingConfig,
    pub samples: usize,
    pub final_loss: f64,
}

impl ModelMetadata {
    pub fn new(
        feature_set: FeatureSet,
        sequence_length: usize,
        model: StockLstmConfig,
        training: TrainingConfig,
        report: &TrainingReport,
    ) -> Self {
        Self {
            version: built_info::PKG_VERSION.to_string(),
            created_at: Utc::now(),
            feature_set,
            sequence_length,
            model,
            training,
            samples: report.samples,
            final_loss: report.final_loss,
        }
    }
}

/// Writes weights, scaler and metadata into `dir`
pub fn save_artifact<B: Backend>(
    dir: impl AsRef<Path>,
    model: &StockLstm<B>,
    scaler: &MinMaxScaler,
    metadata: &ModelMetadata,
) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    model
        .clone()
        .save_file::<BinFileRecorder<FullPrecisionSettings>, _>(dir.join(WEIGHTS_STEM), &Default::default())?;
    std::fs::write(dir.join(SCALER_FILE), serde_json::to_string_pretty(scaler)?)?;
    std::fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(metadata)?)?;
    Ok(())
}

/// Reads the metadata alone
pub fn load_metadata(dir: impl AsRef<Path>) -> Result<ModelMetadata> {
    let json = std::fs::read_to_string(dir.as_ref().join(METADATA_FILE))?;
    Ok(serde_json::from_str(&json)?)
}

/// Loads an artifact written by [`save_artifact`]
pub fn load_artifact<B: Backend>(
    dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(StockLstm<B>, MinMaxScaler, ModelMetadata)> {
    let dir = dir.as_ref();
    let metadata = load_metadata(dir)?;
    let scaler: MinMaxScaler = serde_json::from_str(&std::fs::read_to_string(dir.join(SCALER_FILE))?)?;

    if scaler.n_features() != metadata.model.input_size {
        return Err(PipelineError::Record(format!(
            "scaler has {} features, model expects {}",
            scaler.n_features(),
            metadata.model.input_size
        )));
    }

    let model = metadata
        .model
        .init::<B>(device)
        .load_file::<BinFileRecorder<FullPrecisionSettings>, _>(dir.join(WEIGHTS_STEM), &Default::default(), device)?;

    Ok((model, scaler, metadata))
}

/// Whether `dir` holds all three artifact files with readable metadata
pub fn verify_artifact(dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref();
    dir.join(WEIGHTS_STEM).with_extension("bin").exists()
        && dir.join(SCALER_FILE).exists()
        && load_metadata(dir).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use ndarray::array;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    fn fixture(device: &NdArrayDevice) -> (StockLstm<TestBackend>, MinMaxScaler, ModelMetadata) {
        let config = StockLstmConfig::new(2, 6);
        let model = config.init::<TestBackend>(device);
        let (_, scaler) =
            MinMaxScaler::fit_scale(&array![[1.0, 10.0], [3.0, 30.0]], &["close".into(), "volume".into()])
                .unwrap();
        let report = TrainingReport {
            samples: 12,
            epochs_run: 1,
            loss_history: vec![0.5],
            final_loss: 0.5,
        };
        let metadata = ModelMetadata::new(FeatureSet::CloseOnly, 4, config, TrainingConfig::persisted(), &report);
        (model, scaler, metadata)
    }

    #[test]
    fn test_artifact_round_trip() {
        let device = NdArrayDevice::default();
        let dir = tempdir().unwrap();
        let (model, scaler, metadata) = fixture(&device);

        assert!(!verify_artifact(dir.path()));
        save_artifact(dir.path(), &model, &scaler, &metadata).unwrap();
        assert!(verify_artifact(dir.path()));

        let (loaded, loaded_scaler, loaded_meta) = load_artifact::<TestBackend>(dir.path(), &device).unwrap();
        assert_eq!(loaded_scaler, scaler);
        assert_eq!(loaded_meta, metadata);
        assert_eq!(loaded_meta.version, env!("CARGO_PKG_VERSION"));

        let x = Tensor::<TestBackend, 3>::ones([1, 4, 2], &device);
        let a = model.forward(x.clone()).into_data();
        let b = loaded.forward(x).into_data();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let device = NdArrayDevice::default();
        let dir = tempdir().unwrap();
        assert!(load_artifact::<TestBackend>(dir.path(), &device).is_err());
    }
}

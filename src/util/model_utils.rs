use burn::prelude::Backend;
use chrono::Utc;
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::constants::{CURRENT_POINTER, RETAINED_VERSIONS};
use crate::error::{PipelineError, Result};
use crate::lstm::step_1_tensor_preparation::MinMaxScaler;
use crate::lstm::step_3_lstm_model_arch::StockLstm;
use crate::lstm::step_6_model_serialization::{load_artifact, save_artifact, ModelMetadata};

/// Versioned on-disk model artifacts.
///
/// Layout: `root/<name>/v<millis>/{model.bin, scaler.json, meta.json}` plus a
/// `root/<name>/CURRENT` file naming the version being served. The pointer is
/// replaced by a rename, so a reader sees either the old or the new version.
#[derive(Debug)]
pub struct ModelStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl ModelStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    pub fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn read_pointer(&self, name: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.model_dir(name).join(CURRENT_POINTER)) {
            Ok(version) => {
                let version = version.trim().to_string();
                Ok((!version.is_empty()).then_some(version))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Version currently served for `name`, if any
    pub fn current_version(&self, name: &str) -> Result<Option<String>> {
        let _guard = self.lock.read();
        self.read_pointer(name)
    }

    /// Writes a new version, points `CURRENT` at it and prunes old versions.
    /// Returns the new version id.
    pub fn commit<B: Backend>(
        &self,
        name: &str,
        model: &StockLstm<B>,
        scaler: &MinMaxScaler,
        metadata: &ModelMetadata,
    ) -> Result<String> {
        let _guard = self.lock.write();
        let model_dir = self.model_dir(name);
        std::fs::create_dir_all(&model_dir)?;

        let previous = self.read_pointer(name)?;

        let stamp = Utc::now().timestamp_millis();
        let mut version = format!("v{}", stamp);
        let mut suffix = 1;
        while model_dir.join(&version).exists() {
            version = format!("v{}-{}", stamp, suffix);
            suffix += 1;
        }

        save_artifact(model_dir.join(&version), model, scaler, metadata)?;

        let mut pointer = NamedTempFile::new_in(&model_dir)?;
        pointer.write_all(version.as_bytes())?;
        pointer.as_file().sync_all()?;
        pointer
            .persist(model_dir.join(CURRENT_POINTER))
            .map_err(|e| PipelineError::Io(e.error))?;

        info!("Committed model {} version {}", name, version);

        let mut keep: HashSet<String> = HashSet::with_capacity(RETAINED_VERSIONS);
        keep.insert(version.clone());
        if let Some(previous) = previous {
            keep.insert(previous);
        }
        self.prune(&model_dir, &keep);

        Ok(version)
    }

    /// Loads the version `CURRENT` points at
    pub fn load<B: Backend>(
        &self,
        name: &str,
        device: &B::Device,
    ) -> Result<(StockLstm<B>, MinMaxScaler, ModelMetadata)> {
        let _guard = self.lock.read();
        let version = self
            .read_pointer(name)?
            .ok_or_else(|| PipelineError::ModelNotFound(name.to_string()))?;

        let version_dir = self.model_dir(name).join(&version);
        if !version_dir.is_dir() {
            return Err(PipelineError::ModelNotFound(format!("{} ({} missing)", name, version)));
        }
        load_artifact::<B>(version_dir, device)
    }

    fn prune(&self, model_dir: &Path, keep: &HashSet<String>) {
        let Ok(entries) = std::fs::read_dir(model_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !file_name.starts_with('v') || keep.contains(&file_name) || !entry.path().is_dir() {
                continue;
            }
            if let Err(e) = std::fs::remove_dir_all(entry.path()) {
                warn!("Could not prune {}: {}", entry.path().display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lstm::step_3_lstm_model_arch::StockLstmConfig;
    use crate::lstm::step_4_train_model::{TrainingConfig, TrainingReport};
    use crate::util::feature_engineering::FeatureSet;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use ndarray::array;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    fn artifact(final_loss: f64) -> (StockLstm<TestBackend>, MinMaxScaler, ModelMetadata) {
        let device = NdArrayDevice::default();
        let config = StockLstmConfig::new(1, 4);
        let (_, scaler) = MinMaxScaler::fit_scale(&array![[1.0], [2.0]], &["close".into()]).unwrap();
        let report = TrainingReport {
            samples: 1,
            epochs_run: 1,
            loss_history: vec![final_loss],
            final_loss,
        };
        let metadata = ModelMetadata::new(FeatureSet::CloseOnly, 3, config, TrainingConfig::persisted(), &report);
        (config.init(&device), scaler, metadata)
    }

    fn version_dirs(store: &ModelStore, name: &str) -> usize {
        std::fs::read_dir(store.model_dir(name))
            .unwrap()
            .flatten()
            .filter(|e| e.path().is_dir())
            .count()
    }

    #[test]
    fn test_load_before_commit_is_model_not_found() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let device = NdArrayDevice::default();
        assert!(store.current_version("prices").unwrap().is_none());
        assert!(matches!(
            store.load::<TestBackend>("prices", &device),
            Err(PipelineError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_commit_swaps_pointer_and_prunes() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let device = NdArrayDevice::default();

        let mut versions = Vec::new();
        for loss in [0.3, 0.2, 0.1] {
            let (model, scaler, metadata) = artifact(loss);
            versions.push(store.commit("prices", &model, &scaler, &metadata).unwrap());
        }

        assert_eq!(store.current_version("prices").unwrap().as_deref(), Some(versions[2].as_str()));
        assert_eq!(version_dirs(&store, "prices"), RETAINED_VERSIONS);
        assert!(!store.model_dir("prices").join(&versions[0]).exists());
        assert!(store.model_dir("prices").join(&versions[1]).exists());

        let (_, scaler, metadata) = store.load::<TestBackend>("prices", &device).unwrap();
        assert_eq!(metadata.final_loss, 0.1);
        assert_eq!(scaler.mins, vec![1.0]);
    }
}

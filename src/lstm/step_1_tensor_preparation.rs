// External crates
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor};
use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// Internal modules
use crate::error::{PipelineError, Result};

/// Per-column min-max scaler mapping each feature to [0, 1].
///
/// Fit once on training rows and reused unchanged for test rows and inference
/// windows. A constant column scales to 0 and inverts to its single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub columns: Vec<String>,
    pub mins: Vec<f64>,
    pub maxs: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(matrix: &Array2<f64>, columns: &[String]) -> Result<Self> {
        if matrix.nrows() == 0 {
            return Err(PipelineError::insufficient(1, 0));
        }
        if columns.len() != matrix.ncols() {
            return Err(PipelineError::InvalidInput(format!(
                "{} column names for {} feature columns",
                columns.len(),
                matrix.ncols()
            )));
        }

        let mins = matrix
            .columns()
            .into_iter()
            .map(|col| col.iter().cloned().fold(f64::INFINITY, f64::min))
            .collect();
        let maxs = matrix
            .columns()
            .into_iter()
            .map(|col| col.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
            .collect();

        Ok(Self {
            columns: columns.to_vec(),
            mins,
            maxs,
        })
    }

    /// Fits on `matrix` and returns it scaled together with the scaler
    pub fn fit_scale(matrix: &Array2<f64>, columns: &[String]) -> Result<(Array2<f64>, Self)> {
        let scaler = Self::fit(matrix, columns)?;
        let scaled = scaler.transform(&matrix.view())?;
        Ok((scaled, scaler))
    }

    pub fn n_features(&self) -> usize {
        self.mins.len()
    }

    fn range(&self, column: usize) -> f64 {
        self.maxs[column] - self.mins[column]
    }

    pub fn scale_value(&self, value: f64, column: usize) -> f64 {
        let range = self.range(column);
        if range.abs() < f64::EPSILON {
            0.0
        } else {
            (value - self.mins[column]) / range
        }
    }

    pub fn inverse_value(&self, value: f64, column: usize) -> f64 {
        let range = self.range(column);
        if range.abs() < f64::EPSILON {
            self.mins[column]
        } else {
            self.mins[column] + value * range
        }
    }

    /// Scales with the fitted bounds; never refits
    pub fn transform(&self, matrix: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if matrix.ncols() != self.n_features() {
            return Err(PipelineError::InvalidInput(format!(
                "scaler fitted on {} features, got {}",
                self.n_features(),
                matrix.ncols()
            )));
        }
        let mut scaled = matrix.to_owned();
        for (j, mut col) in scaled.columns_mut().into_iter().enumerate() {
            col.mapv_inplace(|v| self.scale_value(v, j));
        }
        Ok(scaled)
    }

    pub fn inverse_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features() {
            return Err(PipelineError::InvalidInput(format!(
                "scaler fitted on {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, &v)| self.inverse_value(v, j))
            .collect())
    }
}

/// Splits feature rows into training and test partitions
///
/// # Arguments
///
/// * `matrix` - Feature rows in time order
/// * `train_ratio` - Share of rows for training (0.0 to 1.0)
///
/// # Returns
///
/// Returns a tuple of (train_rows, test_rows), cut at `floor(len * train_ratio)`
pub fn split_train_test(matrix: &Array2<f64>, train_ratio: f64) -> Result<(Array2<f64>, Array2<f64>)> {
    if !(train_ratio > 0.0 && train_ratio <= 1.0) {
        return Err(PipelineError::InvalidInput(format!(
            "train ratio must be in (0, 1], got {}",
            train_ratio
        )));
    }
    let split_idx = (matrix.nrows() as f64 * train_ratio).floor() as usize;
    let train = matrix.slice(s![..split_idx, ..]).to_owned();
    let test = matrix.slice(s![split_idx.., ..]).to_owned();
    Ok((train, test))
}

/// Sliding windows over a scaled matrix, flattened row-major for tensor upload
#[derive(Debug, Clone)]
pub struct SequenceWindows {
    pub samples: usize,
    pub sequence_length: usize,
    pub n_features: usize,
    /// `samples * sequence_length * n_features`
    pub features: Vec<f32>,
    /// `samples`
    pub targets: Vec<f32>,
}

impl SequenceWindows {
    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn window(&self, i: usize) -> &[f32] {
        let stride = self.sequence_length * self.n_features;
        &self.features[i * stride..(i + 1) * stride]
    }
}

/// Builds sliding windows with stride 1 over scaled rows
///
/// # Arguments
///
/// * `scaled` - Scaled feature rows in time order
/// * `sequence_length` - Rows per window (T)
/// * `target_column` - Column whose next value is the target
///
/// # Returns
///
/// Returns `len - T` samples where rows `i..i+T` predict `rows[i+T][target_column]`,
/// or `InsufficientData` when `len <= T`
pub fn create_windows(
    scaled: &Array2<f64>,
    sequence_length: usize,
    target_column: usize,
) -> Result<SequenceWindows> {
    let n_rows = scaled.nrows();
    let n_features = scaled.ncols();
    if sequence_length == 0 {
        return Err(PipelineError::InvalidInput("sequence length must be positive".into()));
    }
    if target_column >= n_features {
        return Err(PipelineError::InvalidInput(format!(
            "target column {} out of range for {} features",
            target_column, n_features
        )));
    }
    if n_rows <= sequence_length {
        return Err(PipelineError::insufficient(sequence_length + 1, n_rows));
    }

    let samples = n_rows - sequence_length;
    let mut features = vec![0f32; samples * sequence_length * n_features];
    let mut targets = vec![0f32; samples];

    features
        .par_chunks_mut(sequence_length * n_features)
        .enumerate()
        .for_each(|(i, chunk)| {
            for j in 0..sequence_length {
                for k in 0..n_features {
                    chunk[j * n_features + k] = scaled[[i + j, k]] as f32;
                }
            }
        });

    targets.par_iter_mut().enumerate().for_each(|(i, target)| {
        *target = scaled[[i + sequence_length, target_column]] as f32;
    });

    Ok(SequenceWindows {
        samples,
        sequence_length,
        n_features,
        features,
        targets,
    })
}

/// `([samples, T, F], [samples, 1])` tensors on `device`
pub fn windows_to_tensors<B: Backend>(
    windows: &SequenceWindows,
    device: &B::Device,
) -> (Tensor<B, 3>, Tensor<B, 2>) {
    let features_shape = Shape::new([windows.samples, windows.sequence_length, windows.n_features]);
    let target_shape = Shape::new([windows.samples, 1]);

    let features = Tensor::<B, 1>::from_floats(windows.features.as_slice(), device)
        .reshape(features_shape);
    let targets = Tensor::<B, 1>::from_floats(windows.targets.as_slice(), device)
        .reshape(target_shape);
    (features, targets)
}

/// A single `(T, F)` window as a `[1, T, F]` tensor
pub fn window_to_tensor<B: Backend>(window: &ArrayView2<f64>, device: &B::Device) -> Tensor<B, 3> {
    let (rows, cols) = window.dim();
    let flat: Vec<f32> = window.iter().map(|&v| v as f32).collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([1, rows, cols])
}

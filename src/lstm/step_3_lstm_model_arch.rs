// External imports
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

// Internal modules
use crate::constants::{DENSE_SIZE, DROPOUT_RATE};
use crate::lstm::step_2_lstm_cell::LstmLayer;

/// Shape of a [`StockLstm`]; stored with every artifact so weights can be
/// loaded into an identically shaped network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockLstmConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub dense_size: usize,
    pub dropout: f64,
}

impl StockLstmConfig {
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            dense_size: DENSE_SIZE,
            dropout: DROPOUT_RATE,
        }
    }

    /// Five technical features, 64 hidden units
    pub fn technical() -> Self {
        Self::new(5, 64)
    }

    /// Close-only input, 50 hidden units
    pub fn close_only() -> Self {
        Self::new(1, 50)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> StockLstm<B> {
        StockLstm::new(self, device)
    }
}

/// Two stacked LSTM layers, each followed by dropout, reduced to one value by
/// two dense layers
#[derive(Module, Debug)]
pub struct StockLstm<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    sequence_lstm: LstmLayer<B>,
    sequence_dropout: Dropout,
    summary_lstm: LstmLayer<B>,
    summary_dropout: Dropout,
    dense: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> StockLstm<B> {
    pub fn new(config: &StockLstmConfig, device: &B::Device) -> Self {
        Self {
            input_size: config.input_size,
            hidden_size: config.hidden_size,
            sequence_lstm: LstmLayer::new(config.input_size, config.hidden_size, device),
            sequence_dropout: DropoutConfig::new(config.dropout).init(),
            summary_lstm: LstmLayer::new(config.hidden_size, config.hidden_size, device),
            summary_dropout: DropoutConfig::new(config.dropout).init(),
            dense: LinearConfig::new(config.hidden_size, config.dense_size).init(device),
            output: LinearConfig::new(config.dense_size, 1).init(device),
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// `[batch, seq_len, input_size]` to `[batch, 1]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let sequence = self.sequence_lstm.forward(x);
        let sequence = self.sequence_dropout.forward(sequence);

        let last = self.summary_lstm.forward_last(sequence);
        let last = self.summary_dropout.forward(last);

        self.output.forward(self.dense.forward(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_model_output_shape() {
        let device = NdArrayDevice::default();
        let config = StockLstmConfig::new(5, 16);
        let model = config.init::<TestBackend>(&device);
        assert_eq!(model.input_size(), 5);
        assert_eq!(model.hidden_size(), 16);

        let x = Tensor::<TestBackend, 3>::zeros([4, 10, 5], &device);
        let y = model.forward(x);
        assert_eq!(y.dims(), [4, 1]);
    }

    #[test]
    fn test_inference_is_deterministic() {
        // Dropout is inert outside autodiff
        let device = NdArrayDevice::default();
        let model = StockLstmConfig::close_only().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::ones([2, 6, 1], &device);

        let a = model.forward(x.clone()).into_data();
        let b = model.forward(x).into_data();
        assert_eq!(a, b);
    }

    #[test]
    fn test_presets() {
        assert_eq!(StockLstmConfig::technical().input_size, 5);
        assert_eq!(StockLstmConfig::technical().hidden_size, 64);
        assert_eq!(StockLstmConfig::close_only().hidden_size, 50);
        assert_eq!(StockLstmConfig::close_only().dense_size, DENSE_SIZE);
    }
}

// External imports
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

/// Single LSTM layer with fused gate projections.
///
/// Gate order in the fused `4 * hidden_size` projection: input, forget, cell,
/// output.
#[derive(Module, Debug)]
pub struct LstmLayer<B: Backend> {
    input_size: usize,
    hidden_size: usize,

    input_weights: Linear<B>,
    hidden_weights: Linear<B>,
}

impl<B: Backend> LstmLayer<B> {
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let gate_size = 4 * hidden_size;

        let input_weights = LinearConfig::new(input_size, gate_size).init(device);
        let hidden_weights = LinearConfig::new(hidden_size, gate_size)
            .with_bias(false)
            .init(device);

        Self {
            input_size,
            hidden_size,
            input_weights,
            hidden_weights,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Runs the whole sequence from zero state.
    ///
    /// `x` is `[batch, seq_len, input_size]`; returns every hidden state as
    /// `[batch, seq_len, hidden_size]`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let device = x.device();
        let [batch_size, seq_len, _] = x.dims();

        let mut h: Tensor<B, 2> = Tensor::zeros([batch_size, self.hidden_size], &device);
        let mut c: Tensor<B, 2> = Tensor::zeros([batch_size, self.hidden_size], &device);
        let mut outputs = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let x_t = x
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, self.input_size]);

            let gates = self.input_weights.forward(x_t) + self.hidden_weights.forward(h);

            let i = activation::sigmoid(gates.clone().narrow(1, 0, self.hidden_size));
            let f = activation::sigmoid(gates.clone().narrow(1, self.hidden_size, self.hidden_size));
            let g = activation::tanh(gates.clone().narrow(1, 2 * self.hidden_size, self.hidden_size));
            let o = activation::sigmoid(gates.narrow(1, 3 * self.hidden_size, self.hidden_size));

            c = f * c + i * g;
            h = o * activation::tanh(c.clone());

            outputs.push(h.clone());
        }

        Tensor::stack::<3>(outputs, 1)
    }

    /// Hidden state after the final time step, `[batch, hidden_size]`
    pub fn forward_last(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let sequence = self.forward(x);
        let [batch_size, seq_len, hidden] = sequence.dims();
        sequence
            .narrow(1, seq_len - 1, 1)
            .reshape([batch_size, hidden])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::cast::ToElement;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_lstm_layer_shapes() {
        let device = NdArrayDevice::default();
        let layer = LstmLayer::<TestBackend>::new(5, 8, &device);
        let x = Tensor::<TestBackend, 3>::ones([3, 7, 5], &device);

        let sequence = layer.forward(x.clone());
        assert_eq!(sequence.dims(), [3, 7, 8]);

        let last = layer.forward_last(x);
        assert_eq!(last.dims(), [3, 8]);
    }

    #[test]
    fn test_hidden_state_is_bounded() {
        let device = NdArrayDevice::default();
        let layer = LstmLayer::<TestBackend>::new(2, 4, &device);
        let x = Tensor::<TestBackend, 3>::ones([1, 20, 2], &device).mul_scalar(50.0);

        // h = o * tanh(c) stays inside (-1, 1)
        let max = layer.forward(x).abs().max().into_scalar().to_f64();
        assert!(max < 1.0);
    }
}

//! Binary classifier for one pair of appliance classes
//!
//! Architecture: Input(features) → Hidden(30) → ReLU → Output(2 logits)

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::{log_softmax, relu};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};

/// Configuration for a pair network
#[derive(Debug, Clone)]
pub struct PairNetConfig {
    /// Length of a trace feature row
    pub input_dim: usize,
    pub hidden_dim: usize,
}

impl PairNetConfig {
    pub fn new(input_dim: usize, hidden_dim: usize) -> Self {
        PairNetConfig {
            input_dim,
            hidden_dim,
        }
    }
}

/// Single hidden layer network emitting logits for `(a, b)`
#[derive(Module, Debug)]
pub struct PairNet<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> PairNet<B> {
    pub fn new(device: &B::Device, config: &PairNetConfig) -> Self {
        PairNet {
            hidden: LinearConfig::new(config.input_dim, config.hidden_dim).init(device),
            output: LinearConfig::new(config.hidden_dim, 2).init(device),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `inputs` - Trace features [batch, input_dim]
    ///
    /// # Returns
    /// Logits [batch, 2]
    pub fn forward(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.hidden.forward(inputs));
        self.output.forward(x)
    }
}

/// Mean softmax cross-entropy against one-hot targets
pub fn softmax_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (targets * log_probs).sum_dim(1).neg().mean()
}

/// Fraction of rows whose largest logit matches the hot target column
pub fn accuracy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> f32 {
    let rows = logits.dims()[0];
    if rows == 0 {
        return 0.0;
    }
    let correct: i64 = logits
        .argmax(1)
        .equal(targets.argmax(1))
        .int()
        .sum()
        .into_scalar()
        .elem();
    correct as f32 / rows as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_pair_net_shapes() {
        let device = Default::default();
        let model = PairNet::<TestBackend>::new(&device, &PairNetConfig::new(16, 30));

        let inputs = Tensor::random(
            [5, 16],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(model.forward(inputs).dims(), [5, 2]);
    }

    #[test]
    fn test_cross_entropy_of_uniform_logits() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        let targets = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[1.0f32, 0.0], [0.0, 1.0], [1.0, 0.0]]),
            &device,
        );
        let loss: f32 = softmax_cross_entropy(logits, targets).into_scalar().elem();
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_accuracy_counts_argmax_matches() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[2.0f32, -1.0], [0.5, 3.0], [1.0, 0.0], [-2.0, 4.0]]),
            &device,
        );
        let targets = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[1.0f32, 0.0], [0.0, 1.0], [0.0, 1.0], [0.0, 1.0]]),
            &device,
        );
        assert!((accuracy(logits, targets) - 0.75).abs() < 1e-6);
    }
}

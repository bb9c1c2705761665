use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{log_softmax, relu},
};

use crate::domain::error::ArtifactError;
use crate::domain::split::{IMAGE_SIDE, NUM_CLASSES};

/// Flattened size after conv2 + pooling: 64 channels × 12 × 12.
pub const FLAT_FEATURES: usize = 9216;

/// Input length the network accepts per sample.
pub const INPUT_FEATURES: usize = IMAGE_SIDE * IMAGE_SIDE;

// Config derive supplies Clone + serde; the layer sizes other than the
// hidden width are fixed by the 28x28 input.
#[derive(Config, Debug)]
pub struct ConvNetConfig {
    #[config(default = 0.25)]
    pub conv_dropout: f64,
    #[config(default = 0.5)]
    pub dense_dropout: f64,
    #[config(default = 128)]
    pub hidden: usize,
}

impl ConvNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvNet<B> {
        ConvNet {
            conv1:    Conv2dConfig::new([1, 32], [3, 3]).init(device),
            conv2:    Conv2dConfig::new([32, 64], [3, 3]).init(device),
            pool:     MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout1: DropoutConfig::new(self.conv_dropout).init(),
            fc1:      LinearConfig::new(FLAT_FEATURES, self.hidden).init(device),
            dropout2: DropoutConfig::new(self.dense_dropout).init(),
            fc2:      LinearConfig::new(self.hidden, NUM_CLASSES).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvNet<B: Backend> {
    pub conv1:    Conv2d<B>,
    pub conv2:    Conv2d<B>,
    pub pool:     MaxPool2d,
    pub dropout1: Dropout,
    pub fc1:      Linear<B>,
    pub dropout2: Dropout,
    pub fc2:      Linear<B>,
}

impl<B: Backend> ConvNet<B> {
    /// images: [batch, 1, 28, 28] → log-probabilities [batch, 10]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(images)); // [b, 32, 26, 26]
        let x = relu(self.conv2.forward(x));      // [b, 64, 24, 24]
        let x = self.pool.forward(x);             // [b, 64, 12, 12]
        let x = self.dropout1.forward(x);
        let x = x.flatten::<2>(1, 3);             // [b, 9216]
        let x = relu(self.fc1.forward(x));
        let x = self.dropout2.forward(x);
        log_softmax(self.fc2.forward(x), 1)
    }

    /// Most likely class per image, shape [batch].
    pub fn classify(&self, images: Tensor<B, 4>) -> Tensor<B, 1, Int> {
        self.forward(images).argmax(1).flatten::<1>(0, 1)
    }

    /// Check every weight tensor has the shape this architecture declares.
    pub fn check_shapes(&self) -> Result<(), ArtifactError> {
        let expected: [(&str, Vec<usize>, Vec<usize>); 4] = [
            ("conv1.weight", vec![32, 1, 3, 3], self.conv1.weight.val().dims().to_vec()),
            ("conv2.weight", vec![64, 32, 3, 3], self.conv2.weight.val().dims().to_vec()),
            ("fc1.weight", vec![FLAT_FEATURES, 128], self.fc1.weight.val().dims().to_vec()),
            ("fc2.weight", vec![128, NUM_CLASSES], self.fc2.weight.val().dims().to_vec()),
        ];

        for (param, expected, found) in expected {
            if expected != found {
                return Err(ArtifactError::ShapeMismatch { param: param.to_string(), expected, found });
            }
        }
        Ok(())
    }
}

/// Negative log-likelihood over log-probabilities, averaged over the batch.
pub fn nll_loss<B: Backend>(log_probs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let [batch_size, _] = log_probs.dims();
    log_probs
        .gather(1, targets.reshape([batch_size, 1]))
        .mean()
        .neg()
}

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use burn::tensor::activation::softmax;

use crate::error::ModelError;

const CONV1_KERNEL: [usize; 2] = [57, 6];
const POOL1: [usize; 2] = [4, 3];
const POOL1_STRIDES: [usize; 2] = [1, 3];
const CONV2_KERNEL: [usize; 2] = [1, 3];
const POOL2: [usize; 2] = [1, 3];
const POOL2_STRIDES: [usize; 2] = [1, 3];

/// Network hyper-parameters. `rows`/`cols` are the spectrogram extents.
#[derive(Config, Debug)]
pub struct SpectrogramCnnConfig {
    pub rows: usize,
    pub cols: usize,
    #[config(default = 2)]
    pub num_classes: usize,
    #[config(default = 32)]
    pub filters: usize,
    #[config(default = 128)]
    pub hidden: usize,
}

/// Two conv/pool stages followed by a three-layer dense head.
#[derive(Module, Debug)]
pub struct SpectrogramCnn<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    output: Linear<B>,
    activation: Relu,
}

/// Output extent of an unpadded window sliding over `input`.
fn valid_extent(input: usize, kernel: usize, stride: usize) -> Option<usize> {
    input.checked_sub(kernel).map(|span| span / stride + 1)
}

impl SpectrogramCnnConfig {
    /// `(rows, cols)` of the feature map entering the dense head.
    pub fn feature_map(&self) -> Result<[usize; 2], ModelError> {
        let dims = [self.rows, self.cols];
        let mut out = [0; 2];
        for axis in 0..2 {
            out[axis] = valid_extent(dims[axis], CONV1_KERNEL[axis], 1)
                .and_then(|d| valid_extent(d, POOL1[axis], POOL1_STRIDES[axis]))
                .and_then(|d| valid_extent(d, CONV2_KERNEL[axis], 1))
                .and_then(|d| valid_extent(d, POOL2[axis], POOL2_STRIDES[axis]))
                .ok_or_else(|| self.too_small())?;
        }
        Ok(out)
    }

    /// Width of the flattened conv output.
    pub fn flattened_len(&self) -> Result<usize, ModelError> {
        let [rows, cols] = self.feature_map()?;
        Ok(self.filters * rows * cols)
    }

    fn too_small(&self) -> ModelError {
        ModelError::InputTooSmall {
            rows: self.rows,
            cols: self.cols,
            min_rows: CONV1_KERNEL[0] + POOL1[0] - 1,
            min_cols: CONV1_KERNEL[1] + (POOL1[1] - 1) + POOL1_STRIDES[1] * (CONV2_KERNEL[1] + POOL2[1] - 2),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SpectrogramCnn<B>, ModelError> {
        if self.num_classes < 2 {
            return Err(ModelError::TooFewClasses(self.num_classes));
        }
        let flattened = self.flattened_len()?;
        let glorot = Initializer::XavierUniform { gain: 1.0 };

        let conv1 = Conv2dConfig::new([1, self.filters], CONV1_KERNEL)
            .with_stride([1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .with_initializer(Initializer::Uniform {
                min: -0.05,
                max: 0.05,
            })
            .init(device);
        let conv2 = Conv2dConfig::new([self.filters, self.filters], CONV2_KERNEL)
            .with_stride([1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .with_initializer(glorot.clone())
            .init(device);

        Ok(SpectrogramCnn {
            conv1,
            pool1: MaxPool2dConfig::new(POOL1).with_strides(POOL1_STRIDES).init(),
            conv2,
            pool2: MaxPool2dConfig::new(POOL2).with_strides(POOL2_STRIDES).init(),
            fc1: LinearConfig::new(flattened, self.hidden)
                .with_initializer(glorot.clone())
                .init(device),
            fc2: LinearConfig::new(self.hidden, self.hidden)
                .with_initializer(glorot.clone())
                .init(device),
            output: LinearConfig::new(self.hidden, self.num_classes)
                .with_initializer(glorot)
                .init(device),
            activation: Relu::new(),
        })
    }
}

impl<B: Backend> SpectrogramCnn<B> {
    /// Class logits for an NCHW batch `[batch, 1, rows, cols]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.conv1.forward(images));
        let x = self.pool1.forward(x);
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.pool2.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.activation.forward(self.fc2.forward(x));
        self.output.forward(x)
    }

    /// Softmax class probabilities; each row sums to 1.
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn full_size_spectrogram_flattens_to_expected_width() {
        let config = SpectrogramCnnConfig::new(513, 125);
        assert_eq!(config.feature_map().unwrap(), [454, 12]);
        assert_eq!(config.flattened_len().unwrap(), 174_336);
    }

    #[test]
    fn undersized_input_is_rejected() {
        let err = SpectrogramCnnConfig::new(40, 125).flattened_len().unwrap_err();
        assert!(matches!(err, ModelError::InputTooSmall { rows: 40, .. }));

        let err = SpectrogramCnnConfig::new(513, 8).flattened_len().unwrap_err();
        assert!(matches!(err, ModelError::InputTooSmall { cols: 8, .. }));
    }

    #[test]
    fn single_class_is_rejected() {
        let device = Default::default();
        let err = SpectrogramCnnConfig::new(60, 20)
            .with_num_classes(1)
            .init::<TestBackend>(&device)
            .unwrap_err();
        assert!(matches!(err, ModelError::TooFewClasses(1)));
    }

    #[test]
    fn forward_yields_one_row_per_image() {
        let device = Default::default();
        let config = SpectrogramCnnConfig::new(60, 20).with_hidden(16);
        let model = config.init::<TestBackend>(&device).unwrap();

        let images = Tensor::<TestBackend, 4>::random(
            [3, 1, 60, 20],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let probs = model.probabilities(images);
        assert_eq!(probs.dims(), [3, 2]);

        let rows = probs.into_data().to_vec::<f32>().unwrap();
        for row in rows.chunks(2) {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-5);
        }
    }
}

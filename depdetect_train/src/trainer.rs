use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::{ElementConversion, TensorData};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::AutodiffBackend;
use depdetect_core::dataset::{ChannelOrder, PreparedSplit, argmax_rows, gather_nchw};
use depdetect_core::{DataError, SpectrogramCnn, SpectrogramCnnConfig};
use ndarray::{Array1, Array2, Array4, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TrainingConfig;
use crate::error::TrainError;

/// Probability clip used when scoring, matching the usual framework epsilon.
const PROB_EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

/// Per-sample arg-max classes and softmax rows.
#[derive(Debug, Clone)]
pub struct Predictions {
    pub classes: Array1<usize>,
    pub probabilities: Array2<f32>,
}

impl Predictions {
    pub fn from_probabilities(probabilities: Array2<f32>) -> Self {
        Self {
            classes: argmax_rows(&probabilities),
            probabilities,
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

pub struct TrainedModel<B: AutodiffBackend> {
    pub model: SpectrogramCnn<B>,
    pub history: Vec<EpochMetrics>,
}

/// Categorical cross-entropy of softmax(logits) against one-hot targets.
pub fn categorical_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (log_softmax(logits, 1) * targets).sum_dim(1).mean().neg()
}

fn batch_images<B: Backend>(
    inputs: &Array4<f32>,
    order: ChannelOrder,
    indices: &[usize],
    device: &B::Device,
) -> Tensor<B, 4> {
    let (data, shape) = gather_nchw(inputs, order, indices);
    Tensor::from_data(TensorData::new(data, shape), device)
}

fn batch_targets<B: Backend>(
    split: &PreparedSplit,
    indices: &[usize],
    device: &B::Device,
) -> Tensor<B, 2> {
    let rows = split.targets.select(Axis(0), indices);
    let shape = [rows.nrows(), rows.ncols()];
    let data: Vec<f32> = rows.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, shape), device)
}

fn tensor_rows<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<f32>, TrainError> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| TrainError::Tensor(format!("{err:?}")))
}

/// Train a fresh network on `train`, scoring `valid` after every epoch.
pub fn fit<B: AutodiffBackend>(
    config: &TrainingConfig,
    model_config: &SpectrogramCnnConfig,
    train: &PreparedSplit,
    valid: &PreparedSplit,
    device: &B::Device,
) -> Result<TrainedModel<B>, TrainError> {
    config.validate()?;
    if train.is_empty() || valid.is_empty() {
        return Err(DataError::Empty.into());
    }

    B::seed(device, config.seed);
    let mut model = model_config.init::<B>(device)?;
    let mut optim = config.optimizer.init::<B, SpectrogramCnn<B>>();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut order: Vec<usize> = (0..train.len()).collect();
    let mut history = Vec::with_capacity(config.num_epochs);

    info!(
        train = train.len(),
        validate = valid.len(),
        epochs = config.num_epochs,
        batch_size = config.batch_size,
        "training started"
    );

    for epoch in 1..=config.num_epochs {
        if config.shuffle {
            order.shuffle(&mut rng);
        }

        let mut loss_sum = 0.0;
        let mut correct = 0usize;
        for (step, batch) in order.chunks(config.batch_size).enumerate() {
            let images = batch_images::<B>(&train.inputs, train.order, batch, device);
            let targets = batch_targets::<B>(train, batch, device);

            let logits = model.forward(images);
            let loss = categorical_cross_entropy(logits.clone(), targets);
            let batch_loss = loss.clone().into_scalar().elem::<f64>();
            loss_sum += batch_loss * batch.len() as f64;
            correct += count_correct(logits.detach(), &train.labels, batch)?;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);
            debug!(epoch, step, loss = batch_loss, "batch");
        }

        let seen = train.len() as f64;
        let val = evaluate(&model.valid(), valid, config.batch_size, device)?;
        let metrics = EpochMetrics {
            epoch,
            loss: loss_sum / seen,
            accuracy: correct as f64 / seen,
            val_loss: val.loss,
            val_accuracy: val.accuracy,
        };
        info!(
            epoch,
            loss = metrics.loss,
            acc = metrics.accuracy,
            val_loss = metrics.val_loss,
            val_acc = metrics.val_accuracy,
            "epoch finished"
        );
        history.push(metrics);
    }

    Ok(TrainedModel { model, history })
}

fn count_correct<B: Backend>(
    logits: Tensor<B, 2>,
    labels: &Array1<usize>,
    batch: &[usize],
) -> Result<usize, TrainError> {
    let [rows, classes] = logits.dims();
    let logits = Array2::from_shape_vec((rows, classes), tensor_rows(logits)?)
        .map_err(|err| TrainError::Tensor(err.to_string()))?;
    Ok(argmax_rows(&logits)
        .iter()
        .zip(batch)
        .filter(|(class, idx)| **class == labels[**idx])
        .count())
}

/// Softmax rows for every image of `inputs`, computed `batch_size` at a time.
pub fn predict_proba<B: Backend>(
    model: &SpectrogramCnn<B>,
    inputs: &Array4<f32>,
    order: ChannelOrder,
    batch_size: usize,
    device: &B::Device,
) -> Result<Array2<f32>, TrainError> {
    let count = inputs.len_of(Axis(0));
    let indices: Vec<usize> = (0..count).collect();
    let mut values = Vec::new();
    let mut classes = 0;

    for batch in indices.chunks(batch_size.max(1)) {
        let probs = model.probabilities(batch_images::<B>(inputs, order, batch, device));
        classes = probs.dims()[1];
        values.extend(tensor_rows(probs)?);
    }

    Array2::from_shape_vec((count, classes), values)
        .map_err(|err| TrainError::Tensor(err.to_string()))
}

pub fn predict_classes<B: Backend>(
    model: &SpectrogramCnn<B>,
    inputs: &Array4<f32>,
    order: ChannelOrder,
    batch_size: usize,
    device: &B::Device,
) -> Result<Array1<usize>, TrainError> {
    let probabilities = predict_proba(model, inputs, order, batch_size, device)?;
    Ok(argmax_rows(&probabilities))
}

pub fn predict<B: Backend>(
    model: &SpectrogramCnn<B>,
    split: &PreparedSplit,
    batch_size: usize,
    device: &B::Device,
) -> Result<Predictions, TrainError> {
    let probabilities = predict_proba(model, &split.inputs, split.order, batch_size, device)?;
    Ok(Predictions::from_probabilities(probabilities))
}

/// Cross-entropy and accuracy of already computed predictions.
pub fn score(predictions: &Predictions, split: &PreparedSplit) -> Evaluation {
    let count = split.len().max(1) as f64;
    let loss: f64 = predictions
        .probabilities
        .rows()
        .into_iter()
        .zip(split.targets.rows())
        .map(|(probs, target)| {
            probs
                .iter()
                .zip(target.iter())
                .map(|(&p, &t)| -(t as f64) * (p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON) as f64).ln())
                .sum::<f64>()
        })
        .sum();
    let correct = predictions
        .classes
        .iter()
        .zip(split.labels.iter())
        .filter(|(p, l)| p == l)
        .count();

    Evaluation {
        loss: loss / count,
        accuracy: correct as f64 / count,
    }
}

pub fn evaluate<B: Backend>(
    model: &SpectrogramCnn<B>,
    split: &PreparedSplit,
    batch_size: usize,
    device: &B::Device,
) -> Result<Evaluation, TrainError> {
    let predictions = predict(model, split, batch_size, device)?;
    Ok(score(&predictions, split))
}

/// Classes and probabilities for both splits.
pub struct Performance {
    pub train: Predictions,
    pub test: Predictions,
}

pub fn model_performance<B: Backend>(
    model: &SpectrogramCnn<B>,
    train: &PreparedSplit,
    test: &PreparedSplit,
    batch_size: usize,
    device: &B::Device,
) -> Result<Performance, TrainError> {
    Ok(Performance {
        train: predict(model, train, batch_size, device)?,
        test: predict(model, test, batch_size, device)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DefaultBackend, TrainBackend};
    use depdetect_core::dataset::{ConstantSamplePolicy, LabeledSplit, prepare};
    use ndarray::{Array3, array};
    use rand::Rng;

    const ROWS: usize = 60;
    const COLS: usize = 20;

    fn synthetic(count: usize, seed: u64, order: ChannelOrder) -> PreparedSplit {
        let mut rng = StdRng::seed_from_u64(seed);
        let labels: Array1<usize> = (0..count).map(|i| i % 2).collect();
        let features = Array3::from_shape_fn((count, ROWS, COLS), |(n, r, _)| {
            let stripe = if labels[n] == 1 && r < ROWS / 2 { 4.0 } else { 0.0 };
            stripe + rng.r#gen::<f32>()
        });
        prepare(
            LabeledSplit::new(features, labels).unwrap(),
            2,
            ConstantSamplePolicy::Reject,
            order,
        )
        .unwrap()
    }

    fn small_net() -> SpectrogramCnnConfig {
        SpectrogramCnnConfig::new(ROWS, COLS).with_filters(4).with_hidden(8)
    }

    #[test]
    fn cross_entropy_of_confident_correct_logits_is_small() {
        let device = Default::default();
        let logits = Tensor::<DefaultBackend, 2>::from_floats([[10.0, -10.0], [-10.0, 10.0]], &device);
        let targets = Tensor::<DefaultBackend, 2>::from_floats([[1.0, 0.0], [0.0, 1.0]], &device);
        let loss = categorical_cross_entropy(logits, targets)
            .into_scalar()
            .elem::<f64>();
        assert!(loss >= 0.0 && loss < 1e-6);
    }

    #[test]
    fn uniform_logits_cost_ln_two() {
        let device = Default::default();
        let logits = Tensor::<DefaultBackend, 2>::zeros([3, 2], &device);
        let targets = Tensor::<DefaultBackend, 2>::from_floats([[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]], &device);
        let loss = categorical_cross_entropy(logits, targets)
            .into_scalar()
            .elem::<f64>();
        assert!((loss - std::f64::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn correct_count_follows_batch_indices() {
        let device = Default::default();
        let logits = Tensor::<DefaultBackend, 2>::from_floats([[0.1, 2.0], [3.0, -1.0]], &device);
        let labels = array![0usize, 1, 1, 0];
        assert_eq!(count_correct(logits, &labels, &[2, 1]).unwrap(), 1);
        let logits = Tensor::<DefaultBackend, 2>::from_floats([[0.1, 2.0], [3.0, -1.0]], &device);
        assert_eq!(count_correct(logits, &labels, &[1, 3]).unwrap(), 2);
    }

    #[test]
    fn score_counts_matches_and_clips() {
        let split = synthetic(2, 1, ChannelOrder::ChannelsFirst);
        let predictions = Predictions::from_probabilities(array![[1.0, 0.0], [1.0, 0.0]]);
        let evaluation = score(&predictions, &split);
        assert_eq!(predictions.classes, array![0usize, 0]);
        assert_eq!(evaluation.accuracy, 0.5);
        // second sample has p = 0 on its true class, clipped to 1e-7
        let expected = -(1.0f64 - 1e-7).ln() / 2.0 - (1e-7f64).ln() / 2.0;
        assert!((evaluation.loss - expected).abs() < 1e-3);
    }

    #[test]
    fn fit_records_one_entry_per_epoch() {
        let device = Default::default();
        let train = synthetic(12, 7, ChannelOrder::ChannelsFirst);
        let valid = synthetic(6, 8, ChannelOrder::ChannelsFirst);
        let config = TrainingConfig::new().with_num_epochs(2).with_batch_size(4);

        let trained = fit::<TrainBackend>(&config, &small_net(), &train, &valid, &device).unwrap();
        assert_eq!(trained.history.len(), 2);
        for (i, m) in trained.history.iter().enumerate() {
            assert_eq!(m.epoch, i + 1);
            assert!(m.loss.is_finite() && m.val_loss.is_finite());
            assert!((0.0..=1.0).contains(&m.accuracy));
            assert!((0.0..=1.0).contains(&m.val_accuracy));
        }

        let model = trained.model.valid();
        let performance = model_performance(&model, &train, &valid, 5, &device).unwrap();
        assert_eq!(performance.train.len(), 12);
        assert_eq!(performance.test.probabilities.dim(), (6, 2));
        for row in performance.test.probabilities.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
        assert_eq!(performance.test.classes, argmax_rows(&performance.test.probabilities));
    }

    #[test]
    fn channel_order_does_not_change_predictions() {
        let device = Default::default();
        let first = synthetic(5, 3, ChannelOrder::ChannelsFirst);
        let last = synthetic(5, 3, ChannelOrder::ChannelsLast);
        let model = small_net().init::<DefaultBackend>(&device).unwrap();

        let a = predict_proba(&model, &first.inputs, first.order, 2, &device).unwrap();
        let b = predict_proba(&model, &last.inputs, last.order, 3, &device).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5);
        }
        assert_eq!(
            predict_classes(&model, &first.inputs, first.order, 4, &device).unwrap(),
            argmax_rows(&a)
        );
    }

    #[test]
    fn zero_epochs_are_rejected() {
        let device = Default::default();
        let split = synthetic(2, 1, ChannelOrder::ChannelsFirst);
        let config = TrainingConfig::new().with_num_epochs(0);
        let err = fit::<TrainBackend>(&config, &small_net(), &split, &split, &device).err();
        assert!(matches!(err, Some(TrainError::InvalidConfig(_))));
    }
}

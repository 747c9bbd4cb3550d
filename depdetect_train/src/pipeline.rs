use std::path::Path;

use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use depdetect_core::dataset::{DatasetPaths, PreparedSplit, input_shape, load_split, prepare};
use depdetect_core::{SpectrogramCnn, SpectrogramCnnConfig};
use tracing::info;

use crate::artifacts::save_trained;
use crate::config::TrainingConfig;
use crate::error::TrainError;
use crate::report::write_predictions_jsonl;
use crate::trainer::{EpochMetrics, Evaluation, Performance, fit, model_performance, score};

pub const TRAIN_PREDICTIONS_FILE: &str = "predictions_train.jsonl";
pub const TEST_PREDICTIONS_FILE: &str = "predictions_test.jsonl";

/// Both splits after loading and preprocessing.
pub struct PreparedData {
    pub train: PreparedSplit,
    pub test: PreparedSplit,
    pub model_config: SpectrogramCnnConfig,
}

pub struct ExperimentOutcome<B: Backend> {
    pub model: SpectrogramCnn<B>,
    pub model_config: SpectrogramCnnConfig,
    pub history: Vec<EpochMetrics>,
    pub train_score: Evaluation,
    pub test_score: Evaluation,
    pub performance: Performance,
    pub train_labels: ndarray::Array1<usize>,
    pub test_labels: ndarray::Array1<usize>,
}

/// Load both splits, scale them and derive the network shape from the data.
pub fn load_and_prepare(
    config: &TrainingConfig,
    paths: &DatasetPaths,
) -> Result<PreparedData, TrainError> {
    let train = load_split(&paths.train_samples, &paths.train_labels)?;
    let test = load_split(&paths.test_samples, &paths.test_labels)?;

    info!(shape = ?train.features.dim(), "X_train shape");
    info!("Train on {} samples, validate on {}", train.len(), test.len());

    let (rows, cols) = train.image_dims();
    if test.image_dims() != (rows, cols) {
        let (test_rows, test_cols) = test.image_dims();
        return Err(TrainError::InvalidConfig(format!(
            "train images are {rows}x{cols} but test images are {test_rows}x{test_cols}"
        )));
    }

    let order = config.channel_order;
    let train = prepare(train, config.num_classes, config.constant_samples, order)?;
    let test = prepare(test, config.num_classes, config.constant_samples, order)?;
    info!(
        shape = ?train.inputs.dim(),
        input_shape = ?input_shape(rows, cols, order),
        %order,
        "prepared network inputs"
    );

    let model_config = SpectrogramCnnConfig::new(rows, cols).with_num_classes(config.num_classes);
    Ok(PreparedData {
        train,
        test,
        model_config,
    })
}

/// Train, score both splits, predict both splits and optionally persist everything.
pub fn run_experiment<B: AutodiffBackend>(
    config: &TrainingConfig,
    paths: &DatasetPaths,
    artifact_dir: Option<&Path>,
    device: &B::Device,
) -> Result<ExperimentOutcome<B::InnerBackend>, TrainError> {
    let PreparedData {
        train,
        test,
        model_config,
    } = load_and_prepare(config, paths)?;

    let trained = fit::<B>(config, &model_config, &train, &test, device)?;
    let model = trained.model.valid();

    let performance = model_performance(&model, &train, &test, config.batch_size, device)?;
    let train_score = score(&performance.train, &train);
    let test_score = score(&performance.test, &test);
    info!(
        train_accuracy = train_score.accuracy,
        test_accuracy = test_score.accuracy,
        "evaluation finished"
    );

    if let Some(dir) = artifact_dir {
        save_trained(dir, config, &model_config, model.clone(), &trained.history)?;
        write_predictions_jsonl(
            &dir.join(TRAIN_PREDICTIONS_FILE),
            &performance.train,
            Some(&train.labels),
        )?;
        write_predictions_jsonl(
            &dir.join(TEST_PREDICTIONS_FILE),
            &performance.test,
            Some(&test.labels),
        )?;
    }

    Ok(ExperimentOutcome {
        model,
        model_config,
        history: trained.history,
        train_score,
        test_score,
        performance,
        train_labels: train.labels,
        test_labels: test.labels,
    })
}

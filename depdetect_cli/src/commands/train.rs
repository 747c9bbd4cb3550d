//! `depdetect train`: load the four processed arrays, fit the CNN, print
//! train/test accuracy and optionally keep the model and predictions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use depdetect_core::dataset::{ChannelOrder, ConstantSamplePolicy, DatasetPaths};
use depdetect_train::{Config, TrainingConfig};
use depdetect_train::backend::TrainBackend;
use depdetect_train::run_experiment;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct TrainCommand {
    /// Directory holding train_samples.npz, train_labels.npz, test_samples.npz, test_labels.npz
    #[arg(long, short = 'd', env = "DEPDETECT_DATA_DIR", default_value = "data/processed")]
    pub data_dir: PathBuf,

    #[arg(long, env = "DEPDETECT_TRAIN_SAMPLES")]
    pub train_samples: Option<PathBuf>,

    #[arg(long, env = "DEPDETECT_TRAIN_LABELS")]
    pub train_labels: Option<PathBuf>,

    #[arg(long, env = "DEPDETECT_TEST_SAMPLES")]
    pub test_samples: Option<PathBuf>,

    #[arg(long, env = "DEPDETECT_TEST_LABELS")]
    pub test_labels: Option<PathBuf>,

    /// JSON training config; flags below override its fields
    #[arg(long, short = 'c', env = "DEPDETECT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, short = 'e', env = "DEPDETECT_EPOCHS")]
    pub epochs: Option<usize>,

    #[arg(long, short = 'b', env = "DEPDETECT_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    #[arg(long, env = "DEPDETECT_SEED")]
    pub seed: Option<u64>,

    #[arg(long, env = "DEPDETECT_LEARNING_RATE")]
    pub learning_rate: Option<f64>,

    /// `th` (channels first) or `tf` (channels last)
    #[arg(long, env = "DEPDETECT_CHANNEL_ORDER")]
    pub channel_order: Option<ChannelOrder>,

    /// `zero` or `reject` for spectrograms with a single value
    #[arg(long, env = "DEPDETECT_CONSTANT_SAMPLES")]
    pub constant_samples: Option<ConstantSamplePolicy>,

    #[arg(long, env = "DEPDETECT_NO_SHUFFLE")]
    pub no_shuffle: bool,

    /// Where to write config, weights, history and predictions
    #[arg(long, short = 'o', env = "DEPDETECT_ARTIFACT_DIR")]
    pub artifact_dir: Option<PathBuf>,
}

impl TrainCommand {
    pub fn paths(&self) -> DatasetPaths {
        let mut paths = DatasetPaths::in_dir(&self.data_dir);
        if let Some(p) = &self.train_samples {
            paths.train_samples = p.clone();
        }
        if let Some(p) = &self.train_labels {
            paths.train_labels = p.clone();
        }
        if let Some(p) = &self.test_samples {
            paths.test_samples = p.clone();
        }
        if let Some(p) = &self.test_labels {
            paths.test_labels = p.clone();
        }
        paths
    }

    pub fn training_config(&self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::load(path)
                .map_err(|err| anyhow::anyhow!("{err:?}"))
                .with_context(|| format!("failed to read training config {}", path.display()))?,
            None => TrainingConfig::new(),
        };

        if let Some(v) = self.epochs {
            config.num_epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = self.channel_order {
            config.channel_order = v;
        }
        if let Some(v) = self.constant_samples {
            config.constant_samples = v;
        }
        if self.no_shuffle {
            config.shuffle = false;
        }
        Ok(config)
    }

    pub fn run(&self) -> Result<()> {
        let config = self.training_config()?;
        let paths = self.paths();
        info!(data_dir = %self.data_dir.display(), "starting training run");

        let device = Default::default();
        let outcome = run_experiment::<TrainBackend>(
            &config,
            &paths,
            self.artifact_dir.as_deref(),
            &device,
        )
        .context("training run failed")?;

        println!(
            "input shape: {:?}",
            depdetect_core::dataset::input_shape(
                outcome.model_config.rows,
                outcome.model_config.cols,
                config.channel_order
            )
        );
        println!("image data format: {}", config.channel_order);
        for m in &outcome.history {
            println!(
                "Epoch {}/{} - loss: {:.4} - acc: {:.4} - val_loss: {:.4} - val_acc: {:.4}",
                m.epoch, config.num_epochs, m.loss, m.accuracy, m.val_loss, m.val_accuracy
            );
        }
        println!("Train accuracy: {}", outcome.train_score.accuracy);
        println!("Test accuracy: {}", outcome.test_score.accuracy);

        let positives = outcome.performance.test.classes.iter().filter(|c| **c == 1).count();
        println!(
            "Test predictions: {} depressed / {} total",
            positives,
            outcome.performance.test.len()
        );
        if let Some(dir) = &self.artifact_dir {
            println!("Artifacts: {}", dir.display());
        }
        Ok(())
    }
}

//! `depdetect predict`: classify a stack of spectrograms with a saved model.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use depdetect_core::dataset::{load_features, prepare_inputs};
use depdetect_train::artifacts::load_trained;
use depdetect_train::backend::DefaultBackend;
use depdetect_train::report::write_predictions_jsonl;
use depdetect_train::{Predictions, predict_proba};
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct PredictCommand {
    /// Directory written by `depdetect train --artifact-dir`
    #[arg(long, short = 'a', env = "DEPDETECT_ARTIFACT_DIR")]
    pub artifact_dir: PathBuf,

    /// `.npz`/`.npy` stack of `(count, rows, cols)` spectrograms
    #[arg(long, short = 's', env = "DEPDETECT_SAMPLES")]
    pub samples: PathBuf,

    /// JSONL output; printed to stdout when absent
    #[arg(long, short = 'o', env = "DEPDETECT_OUTPUT")]
    pub output: Option<PathBuf>,
}

impl PredictCommand {
    pub fn run(&self) -> Result<()> {
        let device = Default::default();
        let loaded = load_trained::<DefaultBackend>(&self.artifact_dir, &device)
            .with_context(|| format!("failed to load model from {}", self.artifact_dir.display()))?;
        let config = &loaded.config;

        let features = load_features(&self.samples)
            .with_context(|| format!("failed to read samples {}", self.samples.display()))?;
        let (_, rows, cols) = features.dim();
        if (rows, cols) != (loaded.model_config.rows, loaded.model_config.cols) {
            anyhow::bail!(
                "model expects {}x{} spectrograms, got {rows}x{cols}",
                loaded.model_config.rows,
                loaded.model_config.cols
            );
        }

        let inputs = prepare_inputs(features, config.constant_samples, config.channel_order)?;
        let probabilities =
            predict_proba(&loaded.model, &inputs, config.channel_order, config.batch_size, &device)?;
        let predictions = Predictions::from_probabilities(probabilities);
        info!(samples = predictions.len(), "predicted");

        match &self.output {
            Some(path) => {
                let written = write_predictions_jsonl(path, &predictions, None)?;
                println!("Wrote: {} ({} predictions)", path.display(), written);
            }
            None => {
                for (i, (class, row)) in predictions
                    .classes
                    .iter()
                    .zip(predictions.probabilities.rows())
                    .enumerate()
                {
                    println!("{i}\t{class}\t{:?}", row.to_vec());
                }
            }
        }
        Ok(())
    }
}

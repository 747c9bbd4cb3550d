//! On-disk layout of a finished run.
//!
//! ```text
//! <dir>/config.json     TrainingConfig
//! <dir>/model.json      SpectrogramCnnConfig
//! <dir>/model.mpk       weights
//! <dir>/history.json    per-epoch metrics
//! ```

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use depdetect_core::{SpectrogramCnn, SpectrogramCnnConfig};
use tracing::info;

use crate::config::TrainingConfig;
use crate::error::TrainError;
use crate::trainer::EpochMetrics;

pub const CONFIG_FILE: &str = "config.json";
pub const MODEL_CONFIG_FILE: &str = "model.json";
/// The recorder appends `.mpk`.
pub const WEIGHTS_STEM: &str = "model";
pub const HISTORY_FILE: &str = "history.json";

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

fn artifact_error(path: &Path, err: impl std::fmt::Debug) -> TrainError {
    TrainError::Artifact {
        path: path.to_path_buf(),
        message: format!("{err:?}"),
    }
}

pub fn save_trained<B: Backend>(
    dir: &Path,
    config: &TrainingConfig,
    model_config: &SpectrogramCnnConfig,
    model: SpectrogramCnn<B>,
    history: &[EpochMetrics],
) -> Result<(), TrainError> {
    std::fs::create_dir_all(dir).map_err(|source| TrainError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(CONFIG_FILE);
    config.save(&path).map_err(|err| artifact_error(&path, err))?;

    let path = dir.join(MODEL_CONFIG_FILE);
    model_config
        .save(&path)
        .map_err(|err| artifact_error(&path, err))?;

    let path = dir.join(WEIGHTS_STEM);
    model
        .save_file(path.clone(), &recorder())
        .map_err(|err| artifact_error(&path, err))?;

    let path = dir.join(HISTORY_FILE);
    let file = File::create(&path).map_err(|source| TrainError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), history)
        .map_err(|source| TrainError::Json { path, source })?;

    info!(dir = %dir.display(), "saved model artifacts");
    Ok(())
}

/// A model restored from an artifact directory, with the settings it was trained under.
pub struct LoadedModel<B: Backend> {
    pub config: TrainingConfig,
    pub model_config: SpectrogramCnnConfig,
    pub model: SpectrogramCnn<B>,
}

pub fn load_trained<B: Backend>(dir: &Path, device: &B::Device) -> Result<LoadedModel<B>, TrainError> {
    let path = dir.join(CONFIG_FILE);
    let config = TrainingConfig::load(&path).map_err(|err| artifact_error(&path, err))?;

    let path = dir.join(MODEL_CONFIG_FILE);
    let model_config =
        SpectrogramCnnConfig::load(&path).map_err(|err| artifact_error(&path, err))?;

    let path: PathBuf = dir.join(WEIGHTS_STEM);
    let model = model_config
        .init::<B>(device)?
        .load_file(path.clone(), &recorder(), device)
        .map_err(|err| artifact_error(&path, err))?;

    Ok(LoadedModel {
        config,
        model_config,
        model,
    })
}

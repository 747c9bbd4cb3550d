use std::path::PathBuf;

use depdetect_core::{DataError, ModelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("tensor readback failed: {0}")]
    Tensor(String),

    #[error("failed to persist {}: {message}", path.display())]
    Artifact { path: PathBuf, message: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

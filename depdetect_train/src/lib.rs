//! Training, evaluation and prediction for the spectrogram classifier.

pub mod artifacts;
pub mod backend;
pub mod config;
pub mod error;
pub mod optim;
pub mod pipeline;
pub mod report;
pub mod trainer;

pub use burn::config::Config;
pub use config::TrainingConfig;
pub use error::TrainError;
pub use pipeline::{ExperimentOutcome, run_experiment};
pub use trainer::{Evaluation, Predictions, evaluate, fit, predict_classes, predict_proba};

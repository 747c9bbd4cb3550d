//! Command-line front end: `train` runs a full experiment, `predict` scores new
//! spectrograms with a saved model.

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::predict::PredictCommand;
pub use commands::train::TrainCommand;

#[derive(Parser, Debug)]
#[command(name = "depdetect", version, about = "Spectrogram CNN for depression detection")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train on processed train/test arrays and report accuracy
    Train(TrainCommand),
    /// Classify spectrograms with a saved model
    Predict(PredictCommand),
}

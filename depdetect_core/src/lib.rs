//! Spectrogram loading, preprocessing and the convolutional classifier used to
//! label speech segments as depressed (1) or non-depressed (0).
//!
//! Arrays come from `.npz`/`.npy` files as `(count, rows, cols)` stacks. They
//! are min-max scaled per sample, given a singleton channel axis, and fed to
//! [`model::SpectrogramCnn`].

pub mod dataset;
pub mod error;
pub mod model;

pub use error::{DataError, ModelError};
pub use model::{SpectrogramCnn, SpectrogramCnnConfig};

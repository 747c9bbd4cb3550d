use std::path::PathBuf;

use ndarray_npy::{ReadNpyError, ReadNpzError};
use thiserror::Error;

/// Failures while reading or shaping spectrogram arrays.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open array file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read npy file {}: {source}", path.display())]
    Npy {
        path: PathBuf,
        #[source]
        source: ReadNpyError,
    },

    #[error("failed to read npz archive {}: {source}", path.display())]
    Npz {
        path: PathBuf,
        #[source]
        source: ReadNpzError,
    },

    #[error("npz archive {} contains no arrays", path.display())]
    EmptyArchive { path: PathBuf },

    #[error("unsupported array file extension: {}", path.display())]
    UnsupportedFile { path: PathBuf },

    #[error("{} holds an element type outside {expected}", path.display())]
    UnsupportedElement { path: PathBuf, expected: &'static str },

    #[error("{} has shape {shape:?}, expected {expected}", path.display())]
    Dimensionality {
        path: PathBuf,
        shape: Vec<usize>,
        expected: &'static str,
    },

    #[error("label {value} at index {index} is not a non-negative integer")]
    InvalidLabel { index: usize, value: f64 },

    #[error("label {label} at index {index} is outside 0..{num_classes}")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    #[error("{features} feature samples but {labels} labels")]
    CountMismatch { features: usize, labels: usize },

    #[error("sample {index} is constant ({value}) and cannot be min-max scaled")]
    ConstantSample { index: usize, value: f32 },

    #[error("sample {index} contains non-finite values")]
    NonFinite { index: usize },

    #[error("split has no samples")]
    Empty,
}

/// Failures while building the convolutional network.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(
        "input of {rows}x{cols} is smaller than the receptive field (needs at least {min_rows}x{min_cols})"
    )]
    InputTooSmall {
        rows: usize,
        cols: usize,
        min_rows: usize,
        min_cols: usize,
    },

    #[error("num_classes must be at least 2, got {0}")]
    TooFewClasses(usize),
}

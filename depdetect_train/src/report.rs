use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use ndarray::Array1;
use serde::Serialize;

use crate::error::TrainError;
use crate::trainer::Predictions;

#[derive(Debug, Serialize)]
struct PredictionLine<'a> {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<usize>,
    predicted: usize,
    probabilities: &'a [f32],
}

/// Write one JSON object per sample. Returns the number of lines written.
pub fn write_predictions_jsonl(
    path: &Path,
    predictions: &Predictions,
    labels: Option<&Array1<usize>>,
) -> Result<usize, TrainError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| TrainError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let io_err = |source| TrainError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    let mut written = 0usize;
    for (index, (row, &predicted)) in predictions
        .probabilities
        .rows()
        .into_iter()
        .zip(predictions.classes.iter())
        .enumerate()
    {
        let probabilities = row.to_vec();
        let line = PredictionLine {
            index,
            label: labels.and_then(|l| l.get(index).copied()),
            predicted,
            probabilities: &probabilities,
        };

        serde_json::to_writer(&mut writer, &line).map_err(|source| TrainError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
        written += 1;
    }

    writer.flush().map_err(io_err)?;
    Ok(written)
}

use anyhow::{Context, Result};
use depdetect_core::dataset::loader::{is_array_file, load_numeric};
use ndarray::ArrayD;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::warn;

#[derive(Debug, Serialize, PartialEq)]
pub struct ManifestLine {
    pub path: String,
    pub shape: Vec<usize>,
    pub min: f64,
    pub max: f64,
    pub nan_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_counts: Option<BTreeMap<u64, usize>>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub kept: usize,
    pub skipped_unreadable: usize,
    pub skipped_other: usize,
}

/// Stats for one array. Class counts only for 1-D (or `(n, 1)`) integral arrays.
pub fn describe(path: &Path, values: &ArrayD<f64>) -> ManifestLine {
    let finite = values.iter().copied().filter(|v| !v.is_nan());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let nan_count = values.iter().filter(|v| v.is_nan()).count();

    let label_like = matches!(values.shape(), [_] | [_, 1])
        && values.iter().all(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0);
    let class_counts = label_like.then(|| {
        let mut counts = BTreeMap::new();
        for v in values.iter() {
            *counts.entry(*v as u64).or_insert(0) += 1;
        }
        counts
    });

    ManifestLine {
        path: path.to_string_lossy().to_string(),
        shape: values.shape().to_vec(),
        min,
        max,
        nan_count,
        class_counts,
    }
}

pub fn summarize(data_dir: &Path, out_path: &Path) -> Result<Summary> {
    println!("Summarizing arrays in {}", data_dir.display());

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(data_dir)
        .with_context(|| format!("Failed to read directory: {}", data_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    let out_file = File::create(out_path)
        .with_context(|| format!("Failed to create output: {}", out_path.display()))?;
    let mut writer = BufWriter::new(out_file);

    let mut summary = Summary::default();
    for path in entries {
        if !path.is_file() || !is_array_file(&path) {
            summary.skipped_other += 1;
            continue;
        }

        let values = match load_numeric(&path) {
            Ok(v) => v,
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping unreadable array");
                summary.skipped_unreadable += 1;
                continue;
            }
        };

        serde_json::to_writer(&mut writer, &describe(&path, &values))?;
        writer.write_all(b"\n")?;
        summary.kept += 1;
    }

    writer.flush()?;

    println!("Wrote: {}", out_path.display());
    println!("Kept: {}", summary.kept);
    println!("Skipped (unreadable): {}", summary.skipped_unreadable);
    println!("Skipped (not an array file): {}", summary.skipped_other);

    Ok(summary)
}

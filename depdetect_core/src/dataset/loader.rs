use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use ndarray::{Array1, Array3, ArrayD, Axis, Ix3};
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpyExt, ReadNpzError, ReadableElement};
use tracing::debug;

use crate::error::DataError;

/// Locations of the four arrays that make up one experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    pub train_samples: PathBuf,
    pub train_labels: PathBuf,
    pub test_samples: PathBuf,
    pub test_labels: PathBuf,
}

impl DatasetPaths {
    /// Default file names inside a processed-data directory.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            train_samples: dir.join("train_samples.npz"),
            train_labels: dir.join("train_labels.npz"),
            test_samples: dir.join("test_samples.npz"),
            test_labels: dir.join("test_labels.npz"),
        }
    }
}

/// Spectrogram matrices `(count, rows, cols)` with one label per matrix.
#[derive(Debug, Clone)]
pub struct LabeledSplit {
    pub features: Array3<f32>,
    pub labels: Array1<usize>,
}

impl LabeledSplit {
    pub fn new(features: Array3<f32>, labels: Array1<usize>) -> Result<Self, DataError> {
        let count = features.len_of(Axis(0));
        if count != labels.len() {
            return Err(DataError::CountMismatch {
                features: count,
                labels: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `(rows, cols)` of every sample.
    pub fn image_dims(&self) -> (usize, usize) {
        let (_, rows, cols) = self.features.dim();
        (rows, cols)
    }
}

pub fn load_split<P: AsRef<Path>, Q: AsRef<Path>>(
    samples: P,
    labels: Q,
) -> Result<LabeledSplit, DataError> {
    let features = load_features(samples)?;
    let labels = load_labels(labels)?;
    LabeledSplit::new(features, labels)
}

/// Load a `(count, rows, cols)` feature stack, narrowing f64 input to f32.
pub fn load_features<P: AsRef<Path>>(path: P) -> Result<Array3<f32>, DataError> {
    let path = path.as_ref();
    let mut file = ArrayFile::open(path)?;

    let array = if let Some(array) = file.read_as::<f32>()? {
        array
    } else if let Some(array) = file.read_as::<f64>()? {
        array.mapv(|v| v as f32)
    } else {
        return Err(DataError::UnsupportedElement {
            path: path.to_path_buf(),
            expected: "f32, f64",
        });
    };

    let shape = array.shape().to_vec();
    let features = array
        .into_dimensionality::<Ix3>()
        .map_err(|_| DataError::Dimensionality {
            path: path.to_path_buf(),
            shape,
            expected: "(count, rows, cols)",
        })?;

    debug!(path = %path.display(), shape = ?features.dim(), "loaded features");
    Ok(features)
}

/// Load integer class labels stored as `(n,)` or `(n, 1)`.
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Array1<usize>, DataError> {
    let path = path.as_ref();
    let values = load_numeric(path)?;

    let shape = values.shape().to_vec();
    let flat_ok = match shape.as_slice() {
        [_] => true,
        [_, 1] => true,
        _ => false,
    };
    if !flat_ok {
        return Err(DataError::Dimensionality {
            path: path.to_path_buf(),
            shape,
            expected: "(count,) or (count, 1)",
        });
    }

    let labels = values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
                Ok(value as usize)
            } else {
                Err(DataError::InvalidLabel { index, value })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(path = %path.display(), count = labels.len(), "loaded labels");
    Ok(Array1::from(labels))
}

/// Read any supported numeric array as f64, whatever its stored dtype.
pub fn load_numeric<P: AsRef<Path>>(path: P) -> Result<ArrayD<f64>, DataError> {
    let path = path.as_ref();
    let mut file = ArrayFile::open(path)?;

    if let Some(a) = file.read_as::<f64>()? {
        return Ok(a);
    }
    if let Some(a) = file.read_as::<f32>()? {
        return Ok(a.mapv(f64::from));
    }
    if let Some(a) = file.read_as::<i64>()? {
        return Ok(a.mapv(|v| v as f64));
    }
    if let Some(a) = file.read_as::<i32>()? {
        return Ok(a.mapv(f64::from));
    }
    if let Some(a) = file.read_as::<u8>()? {
        return Ok(a.mapv(f64::from));
    }

    Err(DataError::UnsupportedElement {
        path: path.to_path_buf(),
        expected: "f64, f32, i64, i32, u8",
    })
}

/// True for the file extensions this loader understands.
pub fn is_array_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("npz") | Some("npy")
    )
}

enum Source {
    Npy,
    Npz { reader: NpzReader<File>, name: String },
}

/// An opened `.npy` file or the primary array of an `.npz` archive.
struct ArrayFile {
    path: PathBuf,
    source: Source,
}

impl ArrayFile {
    fn open(path: &Path) -> Result<Self, DataError> {
        let source = match path.extension().and_then(|e| e.to_str()) {
            Some("npy") => {
                // Surface a missing file as Io rather than a parse failure later.
                open_file(path)?;
                Source::Npy
            }
            Some("npz") => {
                let mut reader =
                    NpzReader::new(open_file(path)?).map_err(|source| DataError::Npz {
                        path: path.to_path_buf(),
                        source,
                    })?;
                let names = reader.names().map_err(|source| DataError::Npz {
                    path: path.to_path_buf(),
                    source,
                })?;
                let name = primary_name(&names).ok_or_else(|| DataError::EmptyArchive {
                    path: path.to_path_buf(),
                })?;
                Source::Npz { reader, name }
            }
            _ => {
                return Err(DataError::UnsupportedFile {
                    path: path.to_path_buf(),
                });
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `Ok(None)` when the stored dtype is not `T`.
    fn read_as<T: ReadableElement>(&mut self) -> Result<Option<ArrayD<T>>, DataError> {
        match &mut self.source {
            Source::Npy => {
                let reader = BufReader::new(open_file(&self.path)?);
                match ArrayD::<T>::read_npy(reader) {
                    Ok(array) => Ok(Some(array)),
                    Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
                    Err(source) => Err(DataError::Npy {
                        path: self.path.clone(),
                        source,
                    }),
                }
            }
            Source::Npz { reader, name } => match reader.by_name::<_, _>(name) {
                Ok(array) => Ok(Some(array)),
                Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => Ok(None),
                Err(source) => Err(DataError::Npz {
                    path: self.path.clone(),
                    source,
                }),
            },
        }
    }
}

fn open_file(path: &Path) -> Result<File, DataError> {
    File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `np.savez` stores positional arrays as `arr_0`, `arr_1`, ...; prefer the first.
fn primary_name(names: &[String]) -> Option<String> {
    names
        .iter()
        .find(|n| n.as_str() == "arr_0" || n.as_str() == "arr_0.npy")
        .or_else(|| names.first())
        .cloned()
}

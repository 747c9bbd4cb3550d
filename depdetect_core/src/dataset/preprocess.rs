use ndarray::{Array1, Array2, Array3, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DataError;

/// What to do with a sample whose values are all equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConstantSamplePolicy {
    /// Scale to all zeros.
    #[default]
    Zero,
    /// Fail the whole split.
    Reject,
}

impl std::str::FromStr for ConstantSamplePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zero" => Ok(Self::Zero),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown constant-sample policy: {other}")),
        }
    }
}

/// Min-max scale every sample of a `(count, rows, cols)` stack into `[0, 1]`.
///
/// Each sample is scaled by its own extremes, so its minimum lands on 0 and
/// its maximum on 1. Returns how many constant samples were zeroed.
pub fn normalize(
    features: &mut Array3<f32>,
    policy: ConstantSamplePolicy,
) -> Result<usize, DataError> {
    let mut constant = 0;
    for (index, sample) in features.axis_iter_mut(Axis(0)).enumerate() {
        if !normalize_sample(index, sample, policy)? {
            constant += 1;
        }
    }

    if constant > 0 {
        warn!(constant, "constant spectrogram samples scaled to zero");
    }
    Ok(constant)
}

/// Returns `false` when the sample was constant.
fn normalize_sample(
    index: usize,
    mut sample: ArrayViewMut2<'_, f32>,
    policy: ConstantSamplePolicy,
) -> Result<bool, DataError> {
    if sample.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFinite { index });
    }

    let min = sample.iter().copied().fold(f32::INFINITY, f32::min);
    let max = sample.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    // f32 extremes can overflow `max - min`.
    let (low, range) = (min as f64, max as f64 - min as f64);

    if range == 0.0 {
        return match policy {
            ConstantSamplePolicy::Zero => {
                sample.fill(0.0);
                Ok(false)
            }
            ConstantSamplePolicy::Reject => Err(DataError::ConstantSample { index, value: min }),
        };
    }

    sample.mapv_inplace(|v| ((v as f64 - low) / range) as f32);
    Ok(true)
}

/// Binary class matrix: row `i` has a single 1.0 at column `labels[i]`.
pub fn one_hot(labels: &Array1<usize>, num_classes: usize) -> Result<Array2<f32>, DataError> {
    let mut encoded = Array2::<f32>::zeros((labels.len(), num_classes));
    for (index, (&label, mut row)) in labels.iter().zip(encoded.rows_mut()).enumerate() {
        if label >= num_classes {
            return Err(DataError::LabelOutOfRange {
                index,
                label,
                num_classes,
            });
        }
        row[label] = 1.0;
    }
    Ok(encoded)
}

/// Column index of the largest value in each row; ties go to the lowest index.
pub fn argmax_rows(matrix: &Array2<f32>) -> Array1<usize> {
    matrix
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, best_v), (i, &v)| {
                    if v > best_v { (i, v) } else { (best, best_v) }
                })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stack() -> Array3<f32> {
        array![
            [[3.0, -1.0], [7.0, 5.0]],
            [[0.25, 0.5], [0.75, 1.0]],
            [[-40.0, -80.0], [-60.0, -20.0]],
        ]
    }

    #[test]
    fn values_land_in_unit_interval() {
        let mut features = stack();
        normalize(&mut features, ConstantSamplePolicy::Reject).unwrap();
        assert!(features.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn extremes_map_to_zero_and_one() {
        let original = stack();
        let mut features = original.clone();
        normalize(&mut features, ConstantSamplePolicy::Reject).unwrap();

        for (before, after) in original.outer_iter().zip(features.outer_iter()) {
            let min = before.iter().copied().fold(f32::INFINITY, f32::min);
            let max = before.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            for (b, a) in before.iter().zip(after.iter()) {
                if *b == min {
                    assert_eq!(*a, 0.0);
                }
                if *b == max {
                    assert_eq!(*a, 1.0);
                }
            }
        }
        assert!((features[[0, 0, 0]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn constant_sample_is_zeroed() {
        let mut features = array![[[2.0f32, 2.0], [2.0, 2.0]], [[0.0, 1.0], [2.0, 3.0]]];
        let constant = normalize(&mut features, ConstantSamplePolicy::Zero).unwrap();
        assert_eq!(constant, 1);
        assert!(features.index_axis(Axis(0), 0).iter().all(|v| *v == 0.0));
        assert_eq!(features[[1, 1, 1]], 1.0);
    }

    #[test]
    fn constant_sample_can_be_rejected() {
        let mut features = array![[[0.0f32, 1.0]], [[4.0, 4.0]]];
        let err = normalize(&mut features, ConstantSamplePolicy::Reject).unwrap_err();
        assert!(matches!(err, DataError::ConstantSample { index: 1, .. }));
    }

    #[test]
    fn full_f32_range_stays_in_unit_interval() {
        let mut features = array![[[-f32::MAX, 0.0], [f32::MAX, f32::MAX / 2.0]]];
        normalize(&mut features, ConstantSamplePolicy::Reject).unwrap();
        assert_eq!(features[[0, 0, 0]], 0.0);
        assert_eq!(features[[0, 1, 0]], 1.0);
        assert!((features[[0, 0, 1]] - 0.5).abs() < 1e-6);
        assert!((features[[0, 1, 1]] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn nan_is_rejected() {
        let mut features = array![[[0.0f32, f32::NAN]]];
        let err = normalize(&mut features, ConstantSamplePolicy::Zero).unwrap_err();
        assert!(matches!(err, DataError::NonFinite { index: 0 }));
    }

    #[test]
    fn one_hot_round_trips_under_argmax() {
        let labels = array![0usize, 1, 1, 0, 1];
        let encoded = one_hot(&labels, 2).unwrap();
        assert_eq!(encoded.dim(), (5, 2));
        assert!(encoded.rows().into_iter().all(|r| r.sum() == 1.0));
        assert_eq!(argmax_rows(&encoded), labels);
    }

    #[test]
    fn label_beyond_classes_is_rejected() {
        let err = one_hot(&array![0usize, 2], 2).unwrap_err();
        assert!(matches!(
            err,
            DataError::LabelOutOfRange {
                index: 1,
                label: 2,
                num_classes: 2
            }
        ));
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Reject".parse::<ConstantSamplePolicy>().unwrap(), ConstantSamplePolicy::Reject);
        assert!("drop".parse::<ConstantSamplePolicy>().is_err());
    }
}

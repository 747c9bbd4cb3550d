use ndarray::{Array1, Array2, Array3, Array4, ArrayView4, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LabeledSplit;
use super::preprocess::{ConstantSamplePolicy, normalize, one_hot};
use crate::error::DataError;

/// Where the channel axis sits relative to the spatial axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelOrder {
    /// `(count, channels, rows, cols)`, the `th` convention.
    #[default]
    ChannelsFirst,
    /// `(count, rows, cols, channels)`, the `tf` convention.
    ChannelsLast,
}

impl ChannelOrder {
    pub fn channel_axis(self) -> Axis {
        match self {
            Self::ChannelsFirst => Axis(1),
            Self::ChannelsLast => Axis(3),
        }
    }
}

impl std::str::FromStr for ChannelOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "th" | "channels_first" | "first" => Ok(Self::ChannelsFirst),
            "tf" | "channels_last" | "last" => Ok(Self::ChannelsLast),
            other => Err(format!("unknown channel order: {other}")),
        }
    }
}

impl std::fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelsFirst => f.write_str("channels_first"),
            Self::ChannelsLast => f.write_str("channels_last"),
        }
    }
}

/// Add a singleton channel axis in the position `order` dictates.
pub fn add_channel_axis(features: Array3<f32>, order: ChannelOrder) -> Array4<f32> {
    features.insert_axis(order.channel_axis())
}

/// Per-sample input shape for a single-channel image.
pub fn input_shape(rows: usize, cols: usize, order: ChannelOrder) -> [usize; 3] {
    match order {
        ChannelOrder::ChannelsFirst => [1, rows, cols],
        ChannelOrder::ChannelsLast => [rows, cols, 1],
    }
}

/// View a batch in NCHW order regardless of how it is stored.
pub fn to_channels_first(batch: ArrayView4<'_, f32>, order: ChannelOrder) -> ArrayView4<'_, f32> {
    match order {
        ChannelOrder::ChannelsFirst => batch,
        ChannelOrder::ChannelsLast => batch.permuted_axes([0, 3, 1, 2]),
    }
}

/// A split ready for the network: scaled images, one-hot targets, raw labels.
#[derive(Debug, Clone)]
pub struct PreparedSplit {
    pub inputs: Array4<f32>,
    pub targets: Array2<f32>,
    pub labels: Array1<usize>,
    pub order: ChannelOrder,
}

impl PreparedSplit {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `(rows, cols)` of each image.
    pub fn image_dims(&self) -> (usize, usize) {
        let (_, a, b, c) = self.inputs.dim();
        match self.order {
            ChannelOrder::ChannelsFirst => (b, c),
            ChannelOrder::ChannelsLast => (a, b),
        }
    }
}

/// Gather `indices` of a stored image stack into one NCHW batch.
pub fn gather_nchw(
    inputs: &Array4<f32>,
    order: ChannelOrder,
    indices: &[usize],
) -> (Vec<f32>, [usize; 4]) {
    let batch = inputs.select(Axis(0), indices);
    let nchw = to_channels_first(batch.view(), order);
    let shape = nchw.dim();
    let data = nchw.iter().copied().collect();
    (data, [shape.0, shape.1, shape.2, shape.3])
}

/// Scale and reshape unlabeled features for prediction.
pub fn prepare_inputs(
    mut features: Array3<f32>,
    policy: ConstantSamplePolicy,
    order: ChannelOrder,
) -> Result<Array4<f32>, DataError> {
    if features.len_of(Axis(0)) == 0 {
        return Err(DataError::Empty);
    }
    normalize(&mut features, policy)?;
    Ok(add_channel_axis(features, order))
}

/// Normalize, one-hot encode and reshape one split.
pub fn prepare(
    split: LabeledSplit,
    num_classes: usize,
    policy: ConstantSamplePolicy,
    order: ChannelOrder,
) -> Result<PreparedSplit, DataError> {
    if split.is_empty() {
        return Err(DataError::Empty);
    }

    let LabeledSplit {
        mut features,
        labels,
    } = split;
    normalize(&mut features, policy)?;
    let targets = one_hot(&labels, num_classes)?;
    let inputs = add_channel_axis(features, order);
    debug!(shape = ?inputs.dim(), %order, "prepared split");

    Ok(PreparedSplit {
        inputs,
        targets,
        labels,
        order,
    })
}

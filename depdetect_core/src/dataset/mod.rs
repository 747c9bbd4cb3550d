pub mod layout;
pub mod loader;
pub mod preprocess;

pub use layout::{
    ChannelOrder, PreparedSplit, add_channel_axis, gather_nchw, input_shape, prepare,
    prepare_inputs,
};
pub use loader::{DatasetPaths, LabeledSplit, load_features, load_labels, load_numeric, load_split};
pub use preprocess::{ConstantSamplePolicy, argmax_rows, normalize, one_hot};

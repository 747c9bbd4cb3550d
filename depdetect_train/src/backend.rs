//! Backend selection. CPU `ndarray` by default, GPU with the `wgpu` feature.

use burn::backend::Autodiff;

#[cfg(not(feature = "wgpu"))]
pub type DefaultBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu;

pub type TrainBackend = Autodiff<DefaultBackend>;

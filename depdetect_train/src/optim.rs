//! Adadelta as a `burn` optimizer.
//!
//! Keeps two running averages per parameter, of squared gradients and of
//! squared updates, and scales each step by the ratio of their roots:
//!
//! ```text
//! a = rho * a + (1 - rho) * g^2
//! u = g * sqrt(d + eps) / sqrt(a + eps)
//! p = p - lr * u
//! d = rho * d + (1 - rho) * u^2
//! ```

use burn::module::AutodiffModule;
use burn::optim::{LearningRate, SimpleOptimizer};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::prelude::*;
use burn::record::Record;
use burn::tensor::backend::AutodiffBackend;

#[derive(Config, Debug)]
pub struct AdadeltaConfig {
    /// Decay of both running averages.
    #[config(default = 0.95)]
    pub rho: f64,
    #[config(default = 1e-7)]
    pub epsilon: f64,
}

#[derive(Clone, Debug)]
pub struct Adadelta {
    rho: f32,
    epsilon: f32,
}

/// Running averages for one parameter tensor.
#[derive(Record, Clone)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    pub square_avg: Tensor<B, D>,
    pub delta_avg: Tensor<B, D>,
}

impl AdadeltaConfig {
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(
        &self,
    ) -> OptimizerAdaptor<Adadelta, M, B> {
        OptimizerAdaptor::from(self.build())
    }

    fn build(&self) -> Adadelta {
        Adadelta {
            rho: self.rho as f32,
            epsilon: self.epsilon as f32,
        }
    }
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (square_avg, delta_avg) = match state {
            Some(state) => (state.square_avg, state.delta_avg),
            None => (grad.zeros_like(), grad.zeros_like()),
        };
        let keep = 1.0 - self.rho;

        let square_avg = square_avg
            .mul_scalar(self.rho)
            .add(grad.clone().mul(grad.clone()).mul_scalar(keep));
        let update = delta_avg
            .clone()
            .add_scalar(self.epsilon)
            .sqrt()
            .div(square_avg.clone().add_scalar(self.epsilon).sqrt())
            .mul(grad);
        let delta_avg = delta_avg
            .mul_scalar(self.rho)
            .add(update.clone().mul(update.clone()).mul_scalar(keep));

        let tensor = tensor.sub(update.mul_scalar(lr));
        (
            tensor,
            Some(AdadeltaState {
                square_avg,
                delta_avg,
            }),
        )
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.square_avg = state.square_avg.to_device(device);
        state.delta_avg = state.delta_avg.to_device(device);
        state
    }
}

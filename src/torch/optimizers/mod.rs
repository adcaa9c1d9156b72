//! Optimizers
mod coptimizer;

pub use coptimizer::AdamConfig;

use std::error::Error;
use tch::{nn::VarStore, Tensor};
use thiserror::Error;

/// Base optimizer interface
pub trait BaseOptimizer {
    /// Zero out the gradients of all optimized tensors
    fn zero_grad(&mut self) -> Result<(), OptimizerStepError>;
}

/// Optimizer that minimizes a loss tensor using a single gradient evaluation per step.
pub trait OnceOptimizer: BaseOptimizer {
    /// Perform a loss minimization step (parameter update).
    ///
    /// Uses the existing gradients stored with the parameter tensors.
    fn step_once(&mut self) -> Result<(), OptimizerStepError>;

    /// Zero the gradients, back-propagate `loss`, and perform an optimization step.
    ///
    /// If the loss is NaN the parameters are left unchanged and
    /// [`OptimizerStepError::NaNLoss`] is returned.
    fn backward_step_once(&mut self, loss: &Tensor) -> Result<(), OptimizerStepError> {
        if f64::from(loss).is_nan() {
            return Err(OptimizerStepError::NaNLoss);
        }
        self.zero_grad()?;
        loss.backward();
        self.step_once()
    }
}

/// Error performing an optimization step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerStepError {
    #[error("loss is NaN")]
    NaNLoss,
    #[error("torch optimizer error: {0}")]
    Backend(String),
}

/// Build an optimizer
pub trait BuildOptimizer {
    type Optimizer;
    type Error: Error;

    /// Build an optimizer for the trainable variables in a variable store.
    fn build_optimizer(&self, vs: &VarStore) -> Result<Self::Optimizer, Self::Error>;
}

//! Torch optimizer wrappers and configuration
use super::{BaseOptimizer, BuildOptimizer, OnceOptimizer, OptimizerStepError};
use serde::{Deserialize, Serialize};
use std::convert::{TryFrom, TryInto};
use tch::{nn::VarStore, COptimizer, TchError};

impl From<TchError> for OptimizerStepError {
    fn from(error: TchError) -> Self {
        Self::Backend(error.to_string())
    }
}

impl BaseOptimizer for COptimizer {
    fn zero_grad(&mut self) -> Result<(), OptimizerStepError> {
        COptimizer::zero_grad(self)?;
        Ok(())
    }
}

impl OnceOptimizer for COptimizer {
    fn step_once(&mut self) -> Result<(), OptimizerStepError> {
        COptimizer::step(self)?;
        Ok(())
    }
}

impl<T> BuildOptimizer for T
where
    for<'a> &'a T: TryInto<COptimizer, Error = TchError>,
{
    type Optimizer = COptimizer;
    type Error = TchError;

    fn build_optimizer(&self, vs: &VarStore) -> Result<COptimizer, TchError> {
        let mut optimizer: COptimizer = self.try_into()?;
        let variables = vs.variables_.lock().unwrap();
        for var in &variables.trainable_variables {
            optimizer.add_parameters(&var.tensor, var.group)?;
        }
        Ok(optimizer)
    }
}

/// Configuration for the Adam optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Coefficient for the running average of the gradient
    pub beta1: f64,
    /// Coefficient for the running average of the square of the gradient
    pub beta2: f64,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.0,
        }
    }
}

impl TryFrom<&AdamConfig> for COptimizer {
    type Error = TchError;
    fn try_from(config: &AdamConfig) -> Result<Self, Self::Error> {
        COptimizer::adam(
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.weight_decay,
        )
    }
}

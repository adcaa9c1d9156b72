//! Reward learning with torch
pub mod evaluate;
pub mod loss;
pub mod optimizers;
pub mod reward;
pub mod trainer;

pub use evaluate::{evaluate, relabel_rewards, Evaluation};
pub use loss::{bradley_terry_loss, preference_probability};
pub use optimizers::{AdamConfig, BaseOptimizer, BuildOptimizer, OnceOptimizer, OptimizerStepError};
pub use reward::{CheckpointError, RewardModel, RewardNetwork, RewardNetworkConfig};
pub use trainer::{LossHistory, TrainError, TrainPhase, Trainer, TrainerConfig};

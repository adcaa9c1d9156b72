//! Pointwise reward network
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tch::{
    nn::{self, Linear, Module, VarStore},
    Device, Kind, TchError, Tensor,
};
use thiserror::Error;

/// Configuration for the [`RewardNetwork`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardNetworkConfig {
    /// Width of each of the three input projections.
    pub hidden_dim: usize,
    /// Device on which the parameters are stored.
    #[serde(skip, default = "default_device")]
    pub device: Device,
}

const fn default_device() -> Device {
    Device::Cpu
}

impl Default for RewardNetworkConfig {
    fn default() -> Self {
        Self {
            hidden_dim: 64,
            device: default_device(),
        }
    }
}

/// Per-step reward function `R(observation, action, next_observation)`.
///
/// Observation, action, and next observation are each projected to the hidden width
/// and passed through a ReLU. The concatenated features are projected to a scalar.
#[derive(Debug)]
pub struct RewardNetwork {
    obs_layer: Linear,
    act_layer: Linear,
    next_obs_layer: Linear,
    output_layer: Linear,
}

impl RewardNetwork {
    pub fn new(
        vs: &nn::Path,
        obs_dim: usize,
        act_dim: usize,
        config: &RewardNetworkConfig,
    ) -> Self {
        let obs_dim = obs_dim as i64;
        let act_dim = act_dim as i64;
        let hidden_dim = config.hidden_dim as i64;
        let linear_config = nn::LinearConfig::default();
        Self {
            obs_layer: nn::linear(vs / "obs", obs_dim, hidden_dim, linear_config),
            act_layer: nn::linear(vs / "act", act_dim, hidden_dim, linear_config),
            next_obs_layer: nn::linear(vs / "next_obs", obs_dim, hidden_dim, linear_config),
            output_layer: nn::linear(vs / "output", 3 * hidden_dim, 1, linear_config),
        }
    }

    /// Reward of each step.
    ///
    /// Inputs share any leading batch shape `[..]` and have feature dimension last.
    /// The output has shape `[..]`.
    pub fn forward(&self, obs: &Tensor, act: &Tensor, next_obs: &Tensor) -> Tensor {
        let features = Tensor::cat(
            &[
                self.obs_layer.forward(obs).relu(),
                self.act_layer.forward(act).relu(),
                self.next_obs_layer.forward(next_obs).relu(),
            ],
            -1,
        );
        self.output_layer.forward(&features).squeeze_dim(-1)
    }
}

/// Error saving or restoring reward model weights.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("file error {0}")]
    Io(#[from] std::io::Error),
    #[error("torch error {0}")]
    Torch(#[from] TchError),
}

/// A [`RewardNetwork`] together with the variable store that owns its parameters.
pub struct RewardModel {
    vs: VarStore,
    network: RewardNetwork,
    obs_dim: usize,
    act_dim: usize,
}

impl fmt::Debug for RewardModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RewardModel")
            .field("network", &self.network)
            .field("obs_dim", &self.obs_dim)
            .field("act_dim", &self.act_dim)
            .finish()
    }
}

impl RewardModel {
    /// Create a freshly initialized model.
    pub fn new(obs_dim: usize, act_dim: usize, config: &RewardNetworkConfig) -> Self {
        let vs = VarStore::new(config.device);
        let network = RewardNetwork::new(&vs.root(), obs_dim, act_dim, config);
        Self {
            vs,
            network,
            obs_dim,
            act_dim,
        }
    }

    /// Restore a model from `path` if a checkpoint exists there, otherwise initialize it fresh.
    pub fn load_or_init<P: AsRef<Path>>(
        obs_dim: usize,
        act_dim: usize,
        config: &RewardNetworkConfig,
        path: P,
    ) -> Result<Self, CheckpointError> {
        let mut model = Self::new(obs_dim, act_dim, config);
        let path = path.as_ref();
        if path.is_file() {
            model.vs.load(path)?;
        }
        Ok(model)
    }

    /// Save the model parameters, creating missing parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.vs.save(path)?;
        Ok(())
    }

    #[inline]
    pub const fn var_store(&self) -> &VarStore {
        &self.vs
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.vs.device()
    }

    #[inline]
    pub const fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    #[inline]
    pub const fn act_dim(&self) -> usize {
        self.act_dim
    }

    /// Reward of each step. See [`RewardNetwork::forward`].
    #[inline]
    pub fn step_rewards(&self, obs: &Tensor, act: &Tensor, next_obs: &Tensor) -> Tensor {
        self.network.forward(obs, act, next_obs)
    }

    /// Sum of step rewards over each segment in a batch.
    ///
    /// # Args
    /// * `obs`      - Observations. `[B, T, obs_dim]`
    /// * `act`      - Actions. `[B, T, act_dim]`
    /// * `next_obs` - Next observations. `[B, T, obs_dim]`
    /// * `mask`     - 1 for real steps and 0 for padding. `[B, T]`
    ///
    /// # Returns
    /// Segment returns. `[B]`
    pub fn segment_returns(
        &self,
        obs: &Tensor,
        act: &Tensor,
        next_obs: &Tensor,
        mask: &Tensor,
    ) -> Tensor {
        (self.step_rewards(obs, act, next_obs) * mask).sum_dim_intlist(&[-1], false, Kind::Float)
    }

    /// Predicted reward of a single transition.
    ///
    /// # Panics
    /// If the slice lengths do not match the model's observation and action dimensions.
    pub fn predict(&self, obs: &[f32], act: &[f32], next_obs: &[f32]) -> f64 {
        assert_eq!(obs.len(), self.obs_dim, "observation dimension mismatch");
        assert_eq!(act.len(), self.act_dim, "action dimension mismatch");
        assert_eq!(next_obs.len(), self.obs_dim, "observation dimension mismatch");
        let device = self.device();
        let reward = tch::no_grad(|| {
            self.step_rewards(
                &Tensor::of_slice(obs).to_device(device),
                &Tensor::of_slice(act).to_device(device),
                &Tensor::of_slice(next_obs).to_device(device),
            )
        });
        f64::from(&reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::tempdir;

    #[fixture]
    fn model() -> RewardModel {
        tch::manual_seed(0);
        RewardModel::new(3, 2, &RewardNetworkConfig::default())
    }

    #[rstest]
    fn step_rewards_shape(model: RewardModel) {
        let obs = Tensor::rand(&[4, 5, 3], (Kind::Float, Device::Cpu));
        let act = Tensor::rand(&[4, 5, 2], (Kind::Float, Device::Cpu));
        let next_obs = Tensor::rand(&[4, 5, 3], (Kind::Float, Device::Cpu));
        assert_eq!(model.step_rewards(&obs, &act, &next_obs).size(), vec![4, 5]);
    }

    #[rstest]
    fn segment_returns_sum_masked_steps(model: RewardModel) {
        let obs = Tensor::rand(&[2, 3, 3], (Kind::Float, Device::Cpu));
        let act = Tensor::rand(&[2, 3, 2], (Kind::Float, Device::Cpu));
        let next_obs = Tensor::rand(&[2, 3, 3], (Kind::Float, Device::Cpu));
        let mask = Tensor::of_slice(&[1.0_f32, 1.0, 1.0, 1.0, 1.0, 0.0]).reshape(&[2, 3]);

        let steps = model.step_rewards(&obs, &act, &next_obs);
        let returns = model.segment_returns(&obs, &act, &next_obs, &mask);
        assert_eq!(returns.size(), vec![2]);

        let expected_second = f64::from(steps.get(1).get(0)) + f64::from(steps.get(1).get(1));
        assert!((f64::from(returns.get(1)) - expected_second).abs() < 1e-5);
    }

    #[rstest]
    fn predict_matches_batched(model: RewardModel) {
        let obs = [0.1_f32, 0.2, 0.3];
        let act = [1.0_f32, -1.0];
        let next_obs = [0.4_f32, 0.5, 0.6];
        let single = model.predict(&obs, &act, &next_obs);
        let batched = model.step_rewards(
            &Tensor::of_slice(&obs).reshape(&[1, 3]),
            &Tensor::of_slice(&act).reshape(&[1, 2]),
            &Tensor::of_slice(&next_obs).reshape(&[1, 3]),
        );
        assert!((single - f64::from(batched.get(0))).abs() < 1e-6);
    }

    #[rstest]
    #[should_panic]
    fn predict_wrong_dim_panics(model: RewardModel) {
        model.predict(&[0.0], &[0.0, 0.0], &[0.0, 0.0, 0.0]);
    }

    #[rstest]
    fn save_then_load_restores(model: RewardModel) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("reward.ot");
        model.save(&path).unwrap();

        tch::manual_seed(1);
        let restored =
            RewardModel::load_or_init(3, 2, &RewardNetworkConfig::default(), &path).unwrap();
        let input = ([0.5_f32, -0.5, 1.0], [0.2_f32, 0.3], [0.0_f32, 0.1, 0.2]);
        assert_eq!(
            model.predict(&input.0, &input.1, &input.2),
            restored.predict(&input.0, &input.1, &input.2)
        );
    }

    #[test]
    fn missing_checkpoint_initializes_fresh() {
        let dir = tempdir().unwrap();
        let model = RewardModel::load_or_init(
            3,
            2,
            &RewardNetworkConfig::default(),
            dir.path().join("missing.ot"),
        )
        .unwrap();
        assert_eq!(model.var_store().trainable_variables().len(), 8);
    }
}

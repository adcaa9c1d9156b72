//! Reward model evaluation
use super::loss::preference_probability;
use super::reward::RewardModel;
use crate::dataset::{Dataset, DatasetError};
use crate::loader::PreferenceLoader;
use crate::utils::fmt::Percent;
use ndarray::{Array1, Array2};
use ndarray_stats::CorrelationExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use tch::Tensor;

/// Preference probabilities within this distance of 0.5 count as indifferent.
const INDIFFERENCE_TOLERANCE: f64 = 1e-6;

/// Agreement of a reward model with labeled preference pairs.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Fraction of pairs on which the predicted preference agrees with the label.
    pub accuracy: f64,
    /// Mean squared difference between the predicted preference probability and the label.
    pub mse: f64,
    /// Pearson correlation between predicted and true segment returns.
    pub pcc: f64,
    pub num_pairs: usize,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "accuracy {:.2}  mse {:.6}  pcc {:.4}  ({} pairs)",
            Percent(self.accuracy),
            self.mse,
            self.pcc,
            self.num_pairs
        )
    }
}

/// Evaluate `model` on every pair of `loader`.
pub fn evaluate(model: &RewardModel, loader: &PreferenceLoader) -> Evaluation {
    let num_pairs = loader.num_pairs();
    let mut probabilities = Vec::with_capacity(num_pairs);
    let mut predicted_returns = Vec::with_capacity(2 * num_pairs);
    tch::no_grad(|| {
        for batch in loader.batches() {
            let returns0 =
                model.segment_returns(&batch.obs0, &batch.act0, &batch.next_obs0, &batch.mask0);
            let returns1 =
                model.segment_returns(&batch.obs1, &batch.act1, &batch.next_obs1, &batch.mask1);
            probabilities.extend(to_f64s(&preference_probability(&returns0, &returns1)));
            predicted_returns.extend(to_f64s(&Tensor::stack(&[returns0, returns1], 1)));
        }
    });

    let dataset = loader.dataset();
    let true_returns: Vec<f64> = loader
        .records()
        .iter()
        .flat_map(|r| {
            [
                dataset.segment_return(r.segment0()),
                dataset.segment_return(r.segment1()),
            ]
        })
        .collect();

    let mut agreed = 0;
    let mut counted = 0;
    let mut squared_error = 0.0;
    for (&p, record) in probabilities.iter().zip(loader.records()) {
        if let Some(agrees) = agrees(p, record.mu) {
            counted += 1;
            if agrees {
                agreed += 1;
            }
        }
        squared_error += (p - record.mu).powi(2);
    }

    Evaluation {
        accuracy: if counted == 0 {
            0.0
        } else {
            f64::from(agreed) / f64::from(counted)
        },
        mse: squared_error / num_pairs as f64,
        pcc: pearson(&predicted_returns, &true_returns),
        num_pairs,
    }
}

/// Whether predicted preference `p` agrees with label `mu`.
///
/// `None` for an indifferent label that the prediction does not reproduce;
/// such pairs are left out of the accuracy.
fn agrees(p: f64, mu: f64) -> Option<bool> {
    if mu > 0.5 {
        Some(p > 0.5)
    } else if mu < 0.5 {
        Some(p < 0.5)
    } else if (p - 0.5).abs() < INDIFFERENCE_TOLERANCE {
        Some(true)
    } else {
        None
    }
}

/// Pearson correlation coefficient of two equal-length samples.
///
/// Zero if either sample has no variance or there are fewer than two observations.
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mut data = Array2::zeros((2, n));
    data.row_mut(0).assign(&Array1::from(x[..n].to_vec()));
    data.row_mut(1).assign(&Array1::from(y[..n].to_vec()));
    match data.pearson_correlation() {
        Ok(corr) if corr[[0, 1]].is_finite() => corr[[0, 1]].clamp(-1.0, 1.0),
        _ => 0.0,
    }
}

fn to_f64s(tensor: &Tensor) -> Vec<f64> {
    Vec::<f32>::from(&tensor.reshape(&[-1]))
        .into_iter()
        .map(f64::from)
        .collect()
}

/// Copy of `dataset` with every reward replaced by the model's prediction.
///
/// The next observation of a step is the following step of the same trajectory.
/// The last step of a trajectory uses its own observation.
pub fn relabel_rewards(model: &RewardModel, dataset: &Dataset) -> Result<Dataset, DatasetError> {
    let len = dataset.len();
    if len == 0 {
        return dataset.with_rewards(Array1::zeros(0));
    }
    let observations = dataset.observations();
    let next_indices: Vec<i64> = (0..len)
        .map(|i| {
            if i + 1 < len && !dataset.is_trajectory_end(i) {
                (i + 1) as i64
            } else {
                i as i64
            }
        })
        .collect();

    let device = model.device();
    let to_tensor = |data: Vec<f32>, cols: usize| {
        Tensor::of_slice(&data)
            .reshape(&[len as i64, cols as i64])
            .to_device(device)
    };
    let obs = to_tensor(observations.iter().copied().collect(), dataset.obs_dim());
    let act = to_tensor(
        dataset.actions().iter().copied().collect(),
        dataset.act_dim(),
    );
    let next_obs = obs.index_select(0, &Tensor::of_slice(&next_indices).to_device(device));

    let rewards = tch::no_grad(|| model.step_rewards(&obs, &act, &next_obs));
    let rewards: Vec<f32> = Vec::from(&rewards.to_device(tch::Device::Cpu));
    dataset.with_rewards(Array1::from(rewards))
}

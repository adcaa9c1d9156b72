//! Bradley-Terry reward model training
use super::loss::bradley_terry_loss;
use super::optimizers::{AdamConfig, BuildOptimizer, OnceOptimizer, OptimizerStepError};
use super::reward::{CheckpointError, RewardModel};
use crate::loader::{PreferenceBatch, PreferenceLoader};
use crate::logging::{EpochSummary, TrainLogger};
use crate::utils::stats::OnlineMeanVariance;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tch::{COptimizer, TchError, Tensor};
use thiserror::Error;

/// Configuration for a [`Trainer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of passes over the training pairs.
    pub num_epochs: usize,
    /// Number of pairs per optimization step.
    pub batch_size: usize,
    /// Save the model weights every this many epochs.
    ///
    /// Requires a checkpoint path to be set on the trainer.
    pub checkpoint_every: Option<usize>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            batch_size: 64,
            checkpoint_every: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("epoch {epoch} produced no batches")]
    NoBatches { epoch: usize },
    #[error("optimization step failed: {0}")]
    Optimizer(#[from] OptimizerStepError),
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Stage of the training loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TrainPhase {
    /// Shuffle the pairs and start a pass over them.
    EpochStart { epoch: usize },
    /// Take one optimization step on the next batch.
    BatchStep { epoch: usize },
    /// Summarize and report the finished epoch.
    EpochEnd { epoch: usize },
    Done,
}

/// Mean loss of every epoch.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    /// Mean training batch loss per epoch.
    pub train: Vec<f64>,
    /// Loss on the held-out pairs at the end of each epoch.
    ///
    /// Empty if no held-out pairs were given.
    pub test: Vec<f64>,
}

/// Fits a [`RewardModel`] to preference pairs by minimizing the Bradley-Terry loss.
///
/// The trainer borrows the model whose parameters its optimizer updates.
#[derive(Debug)]
pub struct Trainer<'a, O = COptimizer> {
    model: &'a RewardModel,
    optimizer: O,
    config: TrainerConfig,
    checkpoint_path: Option<PathBuf>,
}

impl<'a> Trainer<'a, COptimizer> {
    /// Create a trainer that optimizes the parameters of `model` with Adam.
    pub fn new(
        model: &'a RewardModel,
        config: TrainerConfig,
        optimizer_config: &AdamConfig,
    ) -> Result<Self, TchError> {
        let optimizer = optimizer_config.build_optimizer(model.var_store())?;
        Ok(Self::with_optimizer(model, optimizer, config))
    }
}

impl<'a, O: OnceOptimizer> Trainer<'a, O> {
    /// Create a trainer from an optimizer already built over the parameters of `model`.
    pub fn with_optimizer(model: &'a RewardModel, optimizer: O, config: TrainerConfig) -> Self {
        Self {
            model,
            optimizer,
            config,
            checkpoint_path: None,
        }
    }

    /// Set where periodic checkpoints are written.
    #[must_use]
    pub fn with_checkpoint_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    #[inline]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// The model being trained.
    #[inline]
    pub fn model(&self) -> &'a RewardModel {
        self.model
    }

    /// Train the model on the pairs of `loader` for the configured number of epochs.
    ///
    /// The pairs are reshuffled at the start of every epoch.
    /// If `test_loader` is given its mean loss is measured at the end of every epoch.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        loader: &PreferenceLoader,
        test_loader: Option<&PreferenceLoader>,
        rng: &mut R,
        logger: &mut dyn TrainLogger,
    ) -> Result<LossHistory, TrainError> {
        let model = self.model;
        let num_epochs = self.config.num_epochs;
        let mut history = LossHistory::default();
        let mut batches = None;
        let mut batch_losses = OnlineMeanVariance::<f64>::default();
        let mut epoch_start = Instant::now();

        let mut phase = TrainPhase::EpochStart { epoch: 0 };
        loop {
            phase = match phase {
                TrainPhase::EpochStart { epoch } if epoch >= num_epochs => TrainPhase::Done,
                TrainPhase::EpochStart { epoch } => {
                    batches = Some(loader.shuffled_batches(rng));
                    batch_losses = OnlineMeanVariance::default();
                    epoch_start = Instant::now();
                    TrainPhase::BatchStep { epoch }
                }
                TrainPhase::BatchStep { epoch } => {
                    match batches.as_mut().and_then(Iterator::next) {
                        Some(batch) => {
                            let loss = batch_loss(model, &batch);
                            self.optimizer.backward_step_once(&loss)?;
                            batch_losses.push(f64::from(&loss));
                            TrainPhase::BatchStep { epoch }
                        }
                        None => TrainPhase::EpochEnd { epoch },
                    }
                }
                TrainPhase::EpochEnd { epoch } => {
                    let train_loss = batch_losses
                        .mean()
                        .ok_or(TrainError::NoBatches { epoch })?;
                    let test_loss = test_loader.map(|test| mean_loss(model, test));
                    history.train.push(train_loss);
                    history.test.extend(test_loss);

                    logger.log_epoch(&EpochSummary {
                        epoch,
                        num_epochs,
                        train_loss,
                        train_loss_stddev: batch_losses.stddev().unwrap_or(0.0),
                        test_loss,
                        num_batches: batch_losses.count() as usize,
                        elapsed: epoch_start.elapsed(),
                    });
                    self.checkpoint(epoch)?;
                    TrainPhase::EpochStart { epoch: epoch + 1 }
                }
                TrainPhase::Done => break,
            };
        }
        logger.flush();
        Ok(history)
    }

    fn checkpoint(&self, epoch: usize) -> Result<(), CheckpointError> {
        if let (Some(every), Some(path)) = (self.config.checkpoint_every, &self.checkpoint_path) {
            if every > 0 && (epoch + 1) % every == 0 {
                self.model.save(path)?;
            }
        }
        Ok(())
    }
}

/// Bradley-Terry loss of the model on one batch.
pub fn batch_loss(model: &RewardModel, batch: &PreferenceBatch) -> Tensor {
    let returns0 = model.segment_returns(&batch.obs0, &batch.act0, &batch.next_obs0, &batch.mask0);
    let returns1 = model.segment_returns(&batch.obs1, &batch.act1, &batch.next_obs1, &batch.mask1);
    bradley_terry_loss(&returns0, &returns1, &batch.mu)
}

/// Mean Bradley-Terry loss over every pair of a loader, without tracking gradients.
pub fn mean_loss(model: &RewardModel, loader: &PreferenceLoader) -> f64 {
    tch::no_grad(|| {
        let total: f64 = loader
            .batches()
            .map(|batch| f64::from(&batch_loss(model, &batch)) * batch.num_pairs() as f64)
            .sum();
        total / loader.num_pairs() as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{testing, Dataset};
    use crate::loader::testing::labeled_records;
    use crate::logging::LossRecorder;
    use crate::pairs::{LabelPolicy, PairRecord};
    use crate::torch::RewardNetworkConfig;
    use crate::Prng;
    use rand::SeedableRng;
    use rstest::{fixture, rstest};
    use tch::Device;
    use tempfile::tempdir;

    #[fixture]
    fn dataset() -> Dataset {
        testing::trajectories(&[20, 15, 30])
    }

    fn model(dataset: &Dataset) -> RewardModel {
        tch::manual_seed(0);
        RewardModel::new(
            dataset.obs_dim(),
            dataset.act_dim(),
            &RewardNetworkConfig::default(),
        )
    }

    fn config(num_epochs: usize) -> TrainerConfig {
        TrainerConfig {
            num_epochs,
            batch_size: 16,
            checkpoint_every: None,
        }
    }

    #[rstest]
    fn loss_decreases(dataset: Dataset) {
        let records = labeled_records(&dataset, 100, LabelPolicy::Binary, 0);
        let loader = PreferenceLoader::new(&dataset, records, 16, Device::Cpu).unwrap();
        let model = model(&dataset);
        let optimizer = AdamConfig {
            learning_rate: 1e-2,
            ..AdamConfig::default()
        };
        let mut trainer = Trainer::new(&model, config(20), &optimizer).unwrap();
        let mut rng = Prng::seed_from_u64(0);
        let history = trainer
            .train(&loader, None, &mut rng, &mut ())
            .unwrap();

        assert_eq!(history.train.len(), 20);
        assert!(history.test.is_empty());
        assert!(history.train.iter().all(|l| l.is_finite()));
        assert!(history.train[19] < history.train[0]);
    }

    #[rstest]
    fn reports_every_epoch(dataset: Dataset) {
        let train = labeled_records(&dataset, 40, LabelPolicy::Sigmoid, 0);
        let test = labeled_records(&dataset, 10, LabelPolicy::Sigmoid, 1);
        let loader = PreferenceLoader::new(&dataset, train, 16, Device::Cpu).unwrap();
        let test_loader = PreferenceLoader::new(&dataset, test, 16, Device::Cpu).unwrap();
        let model = model(&dataset);
        let mut trainer = Trainer::new(&model, config(3), &AdamConfig::default()).unwrap();
        let mut recorder = LossRecorder::default();
        let mut rng = Prng::seed_from_u64(0);
        let history = trainer
            .train(&loader, Some(&test_loader), &mut rng, &mut recorder)
            .unwrap();

        assert_eq!(recorder.summaries.len(), 3);
        assert_eq!(recorder.train_losses(), history.train);
        assert_eq!(history.test.len(), 3);
        for (epoch, summary) in recorder.summaries.iter().enumerate() {
            assert_eq!(summary.epoch, epoch);
            assert_eq!(summary.num_epochs, 3);
            assert_eq!(summary.num_batches, 3);
            assert_eq!(summary.test_loss, Some(history.test[epoch]));
        }
    }

    #[rstest]
    fn zero_epochs_leaves_model_unchanged(dataset: Dataset) {
        let records = labeled_records(&dataset, 10, LabelPolicy::Binary, 0);
        let loader = PreferenceLoader::new(&dataset, records, 4, Device::Cpu).unwrap();
        let model = model(&dataset);
        let before = model.predict(&[1.0, 0.0], &[0.0], &[2.0, 0.0]);
        let mut trainer = Trainer::new(&model, config(0), &AdamConfig::default()).unwrap();
        let mut rng = Prng::seed_from_u64(0);
        let history = trainer
            .train(&loader, None, &mut rng, &mut ())
            .unwrap();
        assert_eq!(history, LossHistory::default());
        assert_eq!(model.predict(&[1.0, 0.0], &[0.0], &[2.0, 0.0]), before);
    }

    #[rstest]
    fn updates_the_model_it_was_built_for(dataset: Dataset) {
        let records = labeled_records(&dataset, 20, LabelPolicy::Binary, 0);
        let loader = PreferenceLoader::new(&dataset, records, 8, Device::Cpu).unwrap();
        let model = model(&dataset);
        let bystander = RewardModel::new(
            dataset.obs_dim(),
            dataset.act_dim(),
            &RewardNetworkConfig::default(),
        );
        let input = ([1.0_f32, 0.0], [0.0_f32], [2.0_f32, 0.0]);
        let before = model.predict(&input.0, &input.1, &input.2);
        let bystander_before = bystander.predict(&input.0, &input.1, &input.2);

        let mut trainer = Trainer::new(&model, config(2), &AdamConfig::default()).unwrap();
        assert!(std::ptr::eq(trainer.model(), &model));
        let mut rng = Prng::seed_from_u64(0);
        trainer
            .train(&loader, None, &mut rng, &mut ())
            .unwrap();

        assert_ne!(model.predict(&input.0, &input.1, &input.2), before);
        assert_eq!(
            bystander.predict(&input.0, &input.1, &input.2),
            bystander_before
        );
    }

    #[rstest]
    fn loss_invariant_to_swapping_segments(dataset: Dataset) {
        let records = labeled_records(&dataset, 20, LabelPolicy::Sigmoid, 3);
        let swapped: Vec<PairRecord> = records
            .iter()
            .map(|r| PairRecord {
                s0: r.s1,
                s1: r.s0,
                mu: 1.0 - r.mu,
                normalized_mu: None,
            })
            .collect();
        let model = model(&dataset);
        let loader = PreferenceLoader::new(&dataset, records, 8, Device::Cpu).unwrap();
        let swapped_loader = PreferenceLoader::new(&dataset, swapped, 8, Device::Cpu).unwrap();
        let loss = mean_loss(&model, &loader);
        let swapped_loss = mean_loss(&model, &swapped_loader);
        assert!(
            (loss - swapped_loss).abs() < 1e-4 * loss.abs().max(1.0),
            "{} != {}",
            loss,
            swapped_loss
        );
    }

    #[rstest]
    fn writes_checkpoints(dataset: Dataset) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model").join("reward.ot");
        let records = labeled_records(&dataset, 10, LabelPolicy::Binary, 0);
        let loader = PreferenceLoader::new(&dataset, records, 4, Device::Cpu).unwrap();
        let model = model(&dataset);
        let config = TrainerConfig {
            checkpoint_every: Some(2),
            ..config(2)
        };
        let mut trainer = Trainer::new(&model, config, &AdamConfig::default())
            .unwrap()
            .with_checkpoint_path(&path);
        let mut rng = Prng::seed_from_u64(0);
        trainer
            .train(&loader, None, &mut rng, &mut ())
            .unwrap();
        assert!(path.is_file());

        let restored = RewardModel::load_or_init(
            dataset.obs_dim(),
            dataset.act_dim(),
            &RewardNetworkConfig::default(),
            &path,
        )
        .unwrap();
        let input = ([3.0_f32, 1.0], [1.0_f32], [4.0_f32, 1.0]);
        assert_eq!(
            model.predict(&input.0, &input.1, &input.2),
            restored.predict(&input.0, &input.1, &input.2)
        );
    }
}

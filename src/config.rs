//! Experiment configuration
use crate::pairs::{LabelPolicy, DEFAULT_MIN_LENGTH};
use crate::torch::{AdamConfig, RewardNetworkConfig, TrainerConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Dataset split that a pair archive belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    /// Pairs the reward model is fit to.
    Train,
    /// Held-out pairs labeled like the training pairs, for the test loss.
    Test,
    /// Held-out pairs with a fixed labeling policy, for evaluation metrics.
    Eval,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Test => "test",
            Self::Eval => "eval",
        })
    }
}

/// Names and storage location of an experiment.
///
/// Resolves the paths of every persisted artifact so that no component
/// has to construct file names on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory under which all artifacts are stored.
    pub root: PathBuf,
    /// Name of the environment the dataset was recorded in.
    pub env_name: String,
    /// Name of this experiment.
    pub exp_name: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            env_name: "maze2d-medium-dense-v1".into(),
            exp_name: "full".into(),
        }
    }
}

impl ExperimentConfig {
    /// Path of the CBOR-encoded source dataset.
    pub fn dataset_path(&self) -> PathBuf {
        self.root
            .join("dataset")
            .join(&self.env_name)
            .join("dataset.cbor")
    }

    /// Path of a pair archive.
    pub fn pair_path(&self, split: Split, num_pairs: usize, policy: LabelPolicy) -> PathBuf {
        self.root
            .join("pair")
            .join(&self.env_name)
            .join(&self.exp_name)
            .join(split.to_string())
            .join(format!("{}_{}.cbor", num_pairs, policy))
    }

    /// Directory holding artifacts of reward models trained on one pair set.
    fn reward_dir(&self, kind: &str, num_pairs: usize, policy: LabelPolicy) -> PathBuf {
        self.root
            .join(kind)
            .join(&self.env_name)
            .join(&self.exp_name)
            .join("reward")
            .join(format!("{}_{}", num_pairs, policy))
    }

    /// Path of reward model weights.
    pub fn reward_model_path(&self, num_pairs: usize, policy: LabelPolicy, tag: &str) -> PathBuf {
        self.reward_dir("model", num_pairs, policy)
            .join(format!("{}.ot", tag))
    }

    /// Directory for the training logs of a reward model.
    pub fn reward_log_dir(&self, num_pairs: usize, policy: LabelPolicy, tag: &str) -> PathBuf {
        self.reward_dir("log", num_pairs, policy).join(tag)
    }

    /// Path of a log file for the experiment as a whole.
    pub fn log_path(&self, file_name: &str) -> PathBuf {
        self.root
            .join("log")
            .join(&self.env_name)
            .join(&self.exp_name)
            .join(file_name)
    }
}

/// Pair generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairGenConfig {
    /// Minimum number of steps for a trajectory to be compared.
    pub min_length: usize,
    /// Number of training pairs; one experiment is run per entry.
    pub pair_counts: Vec<usize>,
    /// Number of held-out pairs in each test and eval archive.
    pub test_pairs: usize,
    /// Labeling policies; one reward model is trained per policy and pair count.
    pub policies: Vec<LabelPolicy>,
}

impl Default for PairGenConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            pair_counts: vec![100, 200, 500, 1000],
            test_pairs: 500,
            policies: vec![LabelPolicy::Binary, LabelPolicy::Continuous],
        }
    }
}

/// Settings for a full sweep over pair counts and labeling policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub experiment: ExperimentConfig,
    pub pairs: PairGenConfig,
    pub network: RewardNetworkConfig,
    pub optimizer: AdamConfig,
    pub trainer: TrainerConfig,
    /// Tag distinguishing reward models trained with different settings.
    pub model_tag: String,
    /// Labeling policy of the held-out evaluation pairs.
    pub eval_policy: LabelPolicy,
    pub seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            experiment: ExperimentConfig::default(),
            pairs: PairGenConfig::default(),
            network: RewardNetworkConfig::default(),
            optimizer: AdamConfig::default(),
            trainer: TrainerConfig::default(),
            model_tag: "MR".into(),
            eval_policy: LabelPolicy::Sigmoid,
            seed: 0,
        }
    }
}

impl SweepConfig {
    /// Read a (possibly partial) configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, serde_json::Error> {
        let file = File::open(path).map_err(serde_json::Error::io)?;
        serde_json::from_reader(BufReader::new(file))
    }
}

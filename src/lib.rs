//! Preference-based reward learning from offline reinforcement learning datasets.
//!
//! Trajectories are split into segments, pairs of segments are labeled with a synthetic
//! preference under one of several [`LabelPolicy`] variants,
//! and a [`RewardModel`] is fit to the labels with a Bradley-Terry objective.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::for_kv_map)] // part of warn(clippy::all), specifically style?
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
pub mod cli;
pub mod config;
pub mod dataset;
mod error;
pub mod loader;
pub mod logging;
pub mod pairs;
pub mod segments;
pub mod torch;
pub mod utils;

pub use config::{ExperimentConfig, PairGenConfig, Split, SweepConfig};
pub use dataset::{Dataset, DatasetError};
pub use error::PrefError;
pub use loader::{PreferenceBatch, PreferenceLoader};
pub use pairs::{LabelPolicy, LabeledPair, PairSampler, RawPair};
pub use segments::{extract_segments, Segment, TrajectoryStats};
pub use torch::{RewardModel, Trainer, TrainerConfig};

/// Pseudo-random number generator type used throughout the crate.
pub type Prng = rand_chacha::ChaCha8Rng;

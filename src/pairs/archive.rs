//! Persisted preference pair sets
use super::{label_pairs, LabelPolicy, LabeledPair, PairSampler};
use crate::config::{ExperimentConfig, Split};
use crate::error::PrefError;
use crate::segments::Segment;
use crate::utils::save::{SaveLoad, SerdeSaveLoadError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use yansi::Paint;

/// One stored preference: two step ranges and the preference strength for the second.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub s0: [usize; 2],
    pub s1: [usize; 2],
    pub mu: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_mu: Option<f64>,
}

impl PairRecord {
    #[inline]
    pub fn segment0(&self) -> Segment {
        self.s0.into()
    }

    #[inline]
    pub fn segment1(&self) -> Segment {
        self.s1.into()
    }
}

impl From<&LabeledPair> for PairRecord {
    fn from(labeled: &LabeledPair) -> Self {
        Self {
            s0: labeled.pair.segment0.into(),
            s1: labeled.pair.segment1.into(),
            mu: labeled.mu,
            normalized_mu: labeled.normalized_mu,
        }
    }
}

/// A set of preference pairs labeled under a single policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairArchive {
    pub policy: LabelPolicy,
    pub records: Vec<PairRecord>,
}

impl PairArchive {
    pub fn new(policy: LabelPolicy, labeled: &[LabeledPair]) -> Self {
        Self {
            policy,
            records: labeled.iter().map(PairRecord::from).collect(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SerdeSaveLoadError> {
        <Self as SaveLoad>::load(path)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Identifies one pair archive within an experiment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArchiveKey {
    pub split: Split,
    pub num_pairs: usize,
    pub policy: LabelPolicy,
}

impl ArchiveKey {
    pub fn path(&self, config: &ExperimentConfig) -> PathBuf {
        config.pair_path(self.split, self.num_pairs, self.policy)
    }
}

/// Result of requesting a pair archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// A new archive was written to this path.
    Created(PathBuf),
    /// An archive already existed at this path and was left untouched.
    Skipped(PathBuf),
}

impl GenerationOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(path) | Self::Skipped(path) => path,
        }
    }
}

/// Generate one pair archive per labeling policy from a single batch of sampled pairs.
///
/// Archives that already exist are never overwritten.
/// When every requested archive exists no pairs are sampled at all.
/// All labels are computed before anything is written so a labeling failure leaves
/// the store unchanged.
pub fn generate_pair_archives<R: Rng + ?Sized>(
    config: &ExperimentConfig,
    sampler: &PairSampler,
    split: Split,
    num_pairs: usize,
    policies: &[LabelPolicy],
    rng: &mut R,
) -> Result<Vec<GenerationOutcome>, PrefError> {
    let keys: Vec<ArchiveKey> = policies
        .iter()
        .map(|&policy| ArchiveKey {
            split,
            num_pairs,
            policy,
        })
        .collect();

    let pending: Vec<&ArchiveKey> = keys
        .iter()
        .filter(|key| !key.path(config).exists())
        .collect();
    let raw_pairs = if pending.is_empty() {
        Vec::new()
    } else {
        sampler.sample_pairs(num_pairs, rng)
    };

    let mut archives = Vec::with_capacity(pending.len());
    for key in pending {
        let labeled = label_pairs(&raw_pairs, key.policy)?;
        archives.push((key.path(config), PairArchive::new(key.policy, &labeled)));
    }

    let mut outcomes = Vec::with_capacity(keys.len());
    for key in &keys {
        let path = key.path(config);
        if let Some(index) = archives.iter().position(|(p, _)| *p == path) {
            let (path, archive) = archives.swap_remove(index);
            archive.save(&path)?;
            println!(
                "{} {} pairs ({}) at {}",
                Paint::green("saved"),
                archive.len(),
                archive.policy,
                path.display()
            );
            outcomes.push(GenerationOutcome::Created(path));
        } else {
            println!(
                "{} {}",
                Paint::yellow("pair archive exists, skipping"),
                path.display()
            );
            outcomes.push(GenerationOutcome::Skipped(path));
        }
    }
    Ok(outcomes)
}

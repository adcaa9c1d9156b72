//! Offline trajectory datasets
use crate::segments::Segment;
use crate::utils::save::{SaveLoad, SerdeSaveLoadError};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::path::Path;
use thiserror::Error;

/// A columnar, step-indexed dataset of recorded trajectories.
///
/// Index `i` refers to the same time step in every column.
/// A trajectory ends on any step where either `terminals` or `timeouts` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetColumns")]
pub struct Dataset {
    observations: Array2<f32>,
    actions: Array2<f32>,
    rewards: Array1<f32>,
    terminals: Vec<bool>,
    timeouts: Vec<bool>,
    success: Option<Array1<f32>>,
}

/// Unvalidated dataset columns as they appear in an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetColumns {
    pub observations: Array2<f32>,
    pub actions: Array2<f32>,
    pub rewards: Array1<f32>,
    pub terminals: Vec<bool>,
    pub timeouts: Vec<bool>,
    #[serde(default)]
    pub success: Option<Array1<f32>>,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("column \"{column}\" has length {len}, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("error loading dataset: {0}")]
    Load(#[from] SerdeSaveLoadError),
}

impl TryFrom<DatasetColumns> for Dataset {
    type Error = DatasetError;

    fn try_from(columns: DatasetColumns) -> Result<Self, Self::Error> {
        let expected = columns.observations.nrows();
        let check = |column, len| {
            if len == expected {
                Ok(())
            } else {
                Err(DatasetError::LengthMismatch {
                    column,
                    len,
                    expected,
                })
            }
        };
        check("actions", columns.actions.nrows())?;
        check("rewards", columns.rewards.len())?;
        check("terminals", columns.terminals.len())?;
        check("timeouts", columns.timeouts.len())?;
        if let Some(success) = &columns.success {
            check("success", success.len())?;
        }
        Ok(Self {
            observations: columns.observations,
            actions: columns.actions,
            rewards: columns.rewards,
            terminals: columns.terminals,
            timeouts: columns.timeouts,
            success: columns.success,
        })
    }
}

impl Dataset {
    /// Create a dataset from its columns, checking that all columns have equal length.
    pub fn new(
        observations: Array2<f32>,
        actions: Array2<f32>,
        rewards: Array1<f32>,
        terminals: Vec<bool>,
        timeouts: Vec<bool>,
    ) -> Result<Self, DatasetError> {
        Self::try_from(DatasetColumns {
            observations,
            actions,
            rewards,
            terminals,
            timeouts,
            success: None,
        })
    }

    /// Attach a per-step success column.
    pub fn with_success(mut self, success: Array1<f32>) -> Result<Self, DatasetError> {
        if success.len() != self.len() {
            return Err(DatasetError::LengthMismatch {
                column: "success",
                len: success.len(),
                expected: self.len(),
            });
        }
        self.success = Some(success);
        Ok(self)
    }

    /// Load a CBOR-encoded dataset archive.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        Ok(<Self as SaveLoad>::load(path)?)
    }

    /// Number of steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observation feature dimension.
    #[inline]
    pub fn obs_dim(&self) -> usize {
        self.observations.ncols()
    }

    /// Action feature dimension.
    #[inline]
    pub fn act_dim(&self) -> usize {
        self.actions.ncols()
    }

    #[inline]
    pub fn observations(&self) -> ArrayView2<f32> {
        self.observations.view()
    }

    #[inline]
    pub fn actions(&self) -> ArrayView2<f32> {
        self.actions.view()
    }

    #[inline]
    pub fn rewards(&self) -> ArrayView1<f32> {
        self.rewards.view()
    }

    #[inline]
    pub fn terminals(&self) -> &[bool] {
        &self.terminals
    }

    #[inline]
    pub fn timeouts(&self) -> &[bool] {
        &self.timeouts
    }

    #[inline]
    pub fn success(&self) -> Option<ArrayView1<f32>> {
        self.success.as_ref().map(Array1::view)
    }

    /// Whether a trajectory ends at step `i`.
    #[inline]
    pub fn is_trajectory_end(&self, i: usize) -> bool {
        self.terminals[i] || self.timeouts[i]
    }

    /// Sum of rewards over a segment, accumulated in double precision.
    pub fn segment_return(&self, segment: Segment) -> f64 {
        self.rewards
            .slice(s![segment.start..segment.end])
            .iter()
            .map(|&r| f64::from(r))
            .sum()
    }

    /// A copy of this dataset with its reward column replaced.
    pub fn with_rewards(&self, rewards: Array1<f32>) -> Result<Self, DatasetError> {
        if rewards.len() != self.len() {
            return Err(DatasetError::LengthMismatch {
                column: "rewards",
                len: rewards.len(),
                expected: self.len(),
            });
        }
        Ok(Self {
            rewards,
            ..self.clone()
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array};
    use tempfile::tempdir;

    #[test]
    fn new_rejects_mismatched_columns() {
        let result = Dataset::new(
            Array::zeros((3, 2)),
            Array::zeros((3, 1)),
            arr1(&[0.0, 1.0]),
            vec![false; 3],
            vec![false; 3],
        );
        assert!(matches!(
            result,
            Err(DatasetError::LengthMismatch {
                column: "rewards",
                len: 2,
                expected: 3
            })
        ));
    }

    #[test]
    fn segment_return_sums_rewards() {
        let dataset = testing::trajectories(&[3, 2]);
        assert_eq!(dataset.segment_return(Segment::new(0, 3)), 3.0);
        assert_eq!(dataset.segment_return(Segment::new(2, 5)), 5.0);
    }

    #[test]
    fn dims() {
        let dataset = testing::trajectories(&[4]);
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.obs_dim(), 2);
        assert_eq!(dataset.act_dim(), 1);
    }

    #[test]
    fn save_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.cbor");
        let dataset = testing::trajectories(&[3, 4])
            .with_success(arr1(&[0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]))
            .unwrap();
        dataset.save(&path).unwrap();
        assert_eq!(Dataset::from_file(&path).unwrap(), dataset);
    }

    #[test]
    fn load_validates_lengths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.cbor");
        let columns = DatasetColumns {
            observations: Array::zeros((2, 1)),
            actions: Array::zeros((2, 1)),
            rewards: arr1(&[0.0, 0.0]),
            terminals: vec![false],
            timeouts: vec![true, true],
            success: None,
        };
        columns.save(&path).unwrap();
        assert!(Dataset::from_file(&path).is_err());
    }

    #[test]
    fn load_missing_column_fails() {
        #[derive(Serialize, Deserialize)]
        struct NoTimeouts {
            observations: Array2<f32>,
            actions: Array2<f32>,
            rewards: Array1<f32>,
            terminals: Vec<bool>,
        }
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.cbor");
        NoTimeouts {
            observations: Array::zeros((1, 1)),
            actions: Array::zeros((1, 1)),
            rewards: arr1(&[0.0]),
            terminals: vec![true],
        }
        .save(&path)
        .unwrap();
        assert!(matches!(
            Dataset::from_file(&path),
            Err(DatasetError::Load(_))
        ));
    }

    #[test]
    fn with_rewards_replaces_column() {
        let dataset = testing::trajectories(&[2]);
        let relabeled = dataset.with_rewards(arr1(&[5.0, 6.0])).unwrap();
        assert_eq!(relabeled.rewards(), arr1(&[5.0, 6.0]).view());
        assert_eq!(relabeled.observations(), dataset.observations());
    }
}

//! Trajectory segmentation
use crate::dataset::Dataset;
use crate::utils::stats::OnlineMeanVariance;
use ndarray::Array1;
use ndarray_stats::{interpolate::Midpoint, Quantile1dExt};
use noisy_float::types::n64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// A half-open range `[start, end)` of dataset step indices.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of steps in the segment.
    #[inline]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Shorten the segment to at most `len` steps, keeping its start.
    #[inline]
    #[must_use]
    pub fn truncate(self, len: usize) -> Self {
        Self {
            start: self.start,
            end: self.start + len.min(self.len()),
        }
    }

    #[inline]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<[usize; 2]> for Segment {
    #[inline]
    fn from([start, end]: [usize; 2]) -> Self {
        Self { start, end }
    }
}

impl From<Segment> for [usize; 2] {
    #[inline]
    fn from(segment: Segment) -> Self {
        [segment.start, segment.end]
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Split a dataset into its trajectories.
///
/// A segment ends immediately after every step flagged as terminal or timeout.
/// Steps after the last such flag belong to an unfinished trajectory and are dropped.
pub fn extract_segments(dataset: &Dataset) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut start = 0;
    for i in 0..dataset.len() {
        if dataset.is_trajectory_end(i) {
            segments.push(Segment::new(start, i + 1));
            start = i + 1;
        }
    }
    segments
}

/// Summary of the trajectories in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStats {
    pub num_trajectories: usize,
    pub mean_length: f64,
    pub median_length: f64,
    pub min_length: usize,
    pub max_length: usize,
    /// Number of trajectories with a positive `success` value on any step.
    ///
    /// `None` if the dataset has no success column.
    pub num_successful: Option<usize>,
}

impl TrajectoryStats {
    /// Summarize the trajectories of a dataset. `None` if it contains no complete trajectory.
    pub fn from_dataset(dataset: &Dataset) -> Option<Self> {
        let segments = extract_segments(dataset);
        let lengths: Vec<usize> = segments.iter().map(Segment::len).collect();
        let length_stats: OnlineMeanVariance<f64> =
            lengths.iter().map(|&len| len as f64).collect();
        let num_successful = dataset.success().map(|success| {
            segments
                .iter()
                .filter(|segment| success.slice(ndarray::s![segment.range()]).sum() > 0.0)
                .count()
        });
        Some(Self {
            num_trajectories: segments.len(),
            mean_length: length_stats.mean()?,
            median_length: median_length(&lengths)?,
            min_length: *lengths.iter().min()?,
            max_length: *lengths.iter().max()?,
            num_successful,
        })
    }
}

/// Median of the lengths; the midpoint of the two middle values for an even count.
fn median_length(lengths: &[usize]) -> Option<f64> {
    let mut lengths: Array1<_> = lengths.iter().map(|&len| n64(len as f64)).collect();
    lengths
        .quantile_mut(n64(0.5), &Midpoint)
        .ok()
        .map(|median| median.raw())
}

impl fmt::Display for TrajectoryStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "trajectories: {}", self.num_trajectories)?;
        writeln!(f, "mean length: {:.2}", self.mean_length)?;
        writeln!(f, "median length: {}", self.median_length)?;
        write!(f, "length range: {} - {}", self.min_length, self.max_length)?;
        if let Some(n) = self.num_successful {
            write!(f, "\nsuccessful: {}", n)?;
        }
        Ok(())
    }
}

//! Preference pairs: sampling, labeling, and persistence.
pub mod archive;
mod label;

pub use archive::{generate_pair_archives, ArchiveKey, GenerationOutcome, PairArchive, PairRecord};
pub use label::{label_pairs, LabelError, LabelPolicy, LabeledPair};

use crate::dataset::Dataset;
use crate::segments::Segment;
use rand::{seq::index, Rng};
use thiserror::Error;

/// Default minimum number of steps for a segment to be eligible for comparison.
pub const DEFAULT_MIN_LENGTH: usize = 10;

/// Two equal-length segments and their returns.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RawPair {
    pub segment0: Segment,
    pub segment1: Segment,
    pub return0: f64,
    pub return1: f64,
}

impl RawPair {
    /// Number of steps in each segment.
    #[inline]
    pub const fn len(&self) -> usize {
        self.segment0.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.segment0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SamplerError {
    #[error("need at least 2 segments with >= {min_length} steps, found {eligible}")]
    InsufficientSegments { eligible: usize, min_length: usize },
}

/// Samples pairs of dataset segments for comparison.
///
/// Each draw picks two distinct segments uniformly at random,
/// redrawing while either is shorter than the minimum length.
/// The longer segment is then truncated to the length of the shorter one,
/// keeping the start index of both fixed.
#[derive(Debug, Clone)]
pub struct PairSampler<'a> {
    dataset: &'a Dataset,
    segments: Vec<Segment>,
    min_length: usize,
}

impl<'a> PairSampler<'a> {
    /// Create a sampler over `segments` of `dataset`.
    ///
    /// Fails if fewer than two segments are at least `min_length` steps long
    /// since no draw could ever be accepted.
    pub fn new(
        dataset: &'a Dataset,
        segments: Vec<Segment>,
        min_length: usize,
    ) -> Result<Self, SamplerError> {
        // Zero-length segments are never comparable.
        let min_length = min_length.max(1);
        let eligible = segments.iter().filter(|s| s.len() >= min_length).count();
        if eligible < 2 {
            return Err(SamplerError::InsufficientSegments {
                eligible,
                min_length,
            });
        }
        Ok(Self {
            dataset,
            segments,
            min_length,
        })
    }

    #[inline]
    pub const fn min_length(&self) -> usize {
        self.min_length
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Draw one length-matched pair.
    pub fn sample_pair<R: Rng + ?Sized>(&self, rng: &mut R) -> RawPair {
        let (segment0, segment1) = loop {
            let draw = index::sample(rng, self.segments.len(), 2);
            let segment0 = self.segments[draw.index(0)];
            let segment1 = self.segments[draw.index(1)];
            if segment0.len() >= self.min_length && segment1.len() >= self.min_length {
                break (segment0, segment1);
            }
        };

        let len = segment0.len().min(segment1.len());
        let segment0 = segment0.truncate(len);
        let segment1 = segment1.truncate(len);
        RawPair {
            segment0,
            segment1,
            return0: self.dataset.segment_return(segment0),
            return1: self.dataset.segment_return(segment1),
        }
    }

    /// Draw `num_pairs` independent pairs. The same segment may appear in several pairs.
    pub fn sample_pairs<R: Rng + ?Sized>(&self, num_pairs: usize, rng: &mut R) -> Vec<RawPair> {
        (0..num_pairs).map(|_| self.sample_pair(rng)).collect()
    }
}

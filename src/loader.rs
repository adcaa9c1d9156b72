//! Batches of materialized preference pairs
use crate::dataset::Dataset;
use crate::pairs::{PairArchive, PairRecord};
use crate::segments::Segment;
use rand::{seq::SliceRandom, Rng};
use std::iter::FusedIterator;
use tch::{Device, Tensor};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("no preference pairs to load")]
    Empty,
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("pair {index}: segment {segment} is outside the dataset of {len} steps")]
    OutOfBounds {
        index: usize,
        segment: Segment,
        len: usize,
    },
    #[error("pair {index}: segment {segment} is empty")]
    EmptySegment { index: usize, segment: Segment },
    #[error("pair {index}: segment lengths {len0} and {len1} differ")]
    LengthMismatch {
        index: usize,
        len0: usize,
        len1: usize,
    },
}

/// A batch of preference pairs expanded to step tensors.
///
/// `B` is the number of pairs and `T` the length of the longest pair in the batch.
/// Shorter pairs are right-padded with zeros; the masks mark the real steps.
#[derive(Debug)]
pub struct PreferenceBatch {
    /// Segment 0 observations. `[B, T, obs_dim]`
    pub obs0: Tensor,
    /// Segment 0 actions. `[B, T, act_dim]`
    pub act0: Tensor,
    /// Segment 0 next observations. `[B, T, obs_dim]`
    pub next_obs0: Tensor,
    /// 1 for real segment 0 steps, 0 for padding. `[B, T]`
    pub mask0: Tensor,
    /// Segment 1 observations. `[B, T, obs_dim]`
    pub obs1: Tensor,
    /// Segment 1 actions. `[B, T, act_dim]`
    pub act1: Tensor,
    /// Segment 1 next observations. `[B, T, obs_dim]`
    pub next_obs1: Tensor,
    /// 1 for real segment 1 steps, 0 for padding. `[B, T]`
    pub mask1: Tensor,
    /// Preference strength for segment 1. `[B]`
    pub mu: Tensor,
}

impl PreferenceBatch {
    /// Number of pairs in the batch.
    pub fn num_pairs(&self) -> usize {
        self.mu.size()[0] as usize
    }
}

/// Serves stored preference pairs as [`PreferenceBatch`]es.
#[derive(Debug, Clone)]
pub struct PreferenceLoader<'a> {
    dataset: &'a Dataset,
    records: Vec<PairRecord>,
    batch_size: usize,
    device: Device,
}

impl<'a> PreferenceLoader<'a> {
    /// Create a loader after checking every record against the dataset.
    pub fn new(
        dataset: &'a Dataset,
        records: Vec<PairRecord>,
        batch_size: usize,
        device: Device,
    ) -> Result<Self, LoaderError> {
        if records.is_empty() {
            return Err(LoaderError::Empty);
        }
        if batch_size == 0 {
            return Err(LoaderError::ZeroBatchSize);
        }
        for (index, record) in records.iter().enumerate() {
            check_record(dataset, index, record)?;
        }
        Ok(Self {
            dataset,
            records,
            batch_size,
            device,
        })
    }

    /// Create a loader over the records of a pair archive.
    pub fn from_archive(
        dataset: &'a Dataset,
        archive: PairArchive,
        batch_size: usize,
        device: Device,
    ) -> Result<Self, LoaderError> {
        Self::new(dataset, archive.records, batch_size, device)
    }

    #[inline]
    pub const fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    #[inline]
    pub fn records(&self) -> &[PairRecord] {
        &self.records
    }

    #[inline]
    pub fn num_pairs(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches in one pass over the pairs.
    #[inline]
    pub fn num_batches(&self) -> usize {
        (self.records.len() + self.batch_size - 1) / self.batch_size
    }

    /// Iterate over batches in stored pair order.
    pub fn batches(&self) -> Batches<'_, 'a> {
        Batches {
            loader: self,
            order: (0..self.records.len()).collect(),
            position: 0,
        }
    }

    /// Iterate over batches after shuffling the pair order.
    pub fn shuffled_batches<R: Rng + ?Sized>(&self, rng: &mut R) -> Batches<'_, 'a> {
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.shuffle(rng);
        Batches {
            loader: self,
            order,
            position: 0,
        }
    }

    fn materialize(&self, indices: &[usize]) -> PreferenceBatch {
        let records: Vec<&PairRecord> = indices.iter().map(|&i| &self.records[i]).collect();
        let max_len = records
            .iter()
            .map(|r| r.segment0().len())
            .max()
            .unwrap_or(0);
        let (obs0, act0, next_obs0, mask0) =
            self.segment_tensors(records.iter().map(|r| r.segment0()), max_len);
        let (obs1, act1, next_obs1, mask1) =
            self.segment_tensors(records.iter().map(|r| r.segment1()), max_len);
        let mu: Vec<f32> = records.iter().map(|r| r.mu as f32).collect();
        PreferenceBatch {
            obs0,
            act0,
            next_obs0,
            mask0,
            obs1,
            act1,
            next_obs1,
            mask1,
            mu: Tensor::of_slice(&mu).to_device(self.device),
        }
    }

    /// Observation, action, next observation, and mask tensors for a list of segments.
    fn segment_tensors<I>(&self, segments: I, max_len: usize) -> (Tensor, Tensor, Tensor, Tensor)
    where
        I: ExactSizeIterator<Item = Segment>,
    {
        let batch_size = segments.len();
        let obs_dim = self.dataset.obs_dim();
        let act_dim = self.dataset.act_dim();
        let observations = self.dataset.observations();
        let actions = self.dataset.actions();

        let mut obs = vec![0.0_f32; batch_size * max_len * obs_dim];
        let mut act = vec![0.0_f32; batch_size * max_len * act_dim];
        let mut next_obs = vec![0.0_f32; batch_size * max_len * obs_dim];
        let mut mask = vec![0.0_f32; batch_size * max_len];

        for (b, segment) in segments.enumerate() {
            for (t, step) in segment.range().enumerate() {
                let next_step = if step + 1 < segment.end {
                    step + 1
                } else {
                    step
                };
                let o = (b * max_len + t) * obs_dim;
                let a = (b * max_len + t) * act_dim;
                for (dst, src) in obs[o..o + obs_dim].iter_mut().zip(observations.row(step)) {
                    *dst = *src;
                }
                for (dst, src) in next_obs[o..o + obs_dim]
                    .iter_mut()
                    .zip(observations.row(next_step))
                {
                    *dst = *src;
                }
                for (dst, src) in act[a..a + act_dim].iter_mut().zip(actions.row(step)) {
                    *dst = *src;
                }
                mask[b * max_len + t] = 1.0;
            }
        }

        let (b, t) = (batch_size as i64, max_len as i64);
        let to_tensor = |data: &[f32], shape: &[i64]| {
            Tensor::of_slice(data).reshape(shape).to_device(self.device)
        };
        (
            to_tensor(&obs, &[b, t, obs_dim as i64]),
            to_tensor(&act, &[b, t, act_dim as i64]),
            to_tensor(&next_obs, &[b, t, obs_dim as i64]),
            to_tensor(&mask, &[b, t]),
        )
    }
}

fn check_record(dataset: &Dataset, index: usize, record: &PairRecord) -> Result<(), LoaderError> {
    for segment in [record.segment0(), record.segment1()] {
        if segment.end > dataset.len() {
            return Err(LoaderError::OutOfBounds {
                index,
                segment,
                len: dataset.len(),
            });
        }
        if segment.is_empty() {
            return Err(LoaderError::EmptySegment { index, segment });
        }
    }
    let (len0, len1) = (record.segment0().len(), record.segment1().len());
    if len0 != len1 {
        return Err(LoaderError::LengthMismatch { index, len0, len1 });
    }
    Ok(())
}

/// Iterator over the batches of one pass through a [`PreferenceLoader`].
#[derive(Debug, Clone)]
pub struct Batches<'l, 'a> {
    loader: &'l PreferenceLoader<'a>,
    order: Vec<usize>,
    position: usize,
}

impl Iterator for Batches<'_, '_> {
    type Item = PreferenceBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.order.len() {
            return None;
        }
        let end = (self.position + self.loader.batch_size).min(self.order.len());
        let batch = self.loader.materialize(&self.order[self.position..end]);
        self.position = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len() - self.position;
        let num_batches = (remaining + self.loader.batch_size - 1) / self.loader.batch_size;
        (num_batches, Some(num_batches))
    }
}

impl ExactSizeIterator for Batches<'_, '_> {}

impl FusedIterator for Batches<'_, '_> {}

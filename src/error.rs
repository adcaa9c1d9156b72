//! Error type
use crate::dataset::DatasetError;
use crate::loader::LoaderError;
use crate::pairs::{LabelError, SamplerError};
use crate::torch::TrainError;
use crate::utils::save::SerdeSaveLoadError;
use thiserror::Error;

/// Error from the preference learning crate.
#[derive(Error, Debug)]
pub enum PrefError {
    #[error("dataset error")]
    Dataset(#[from] DatasetError),
    #[error("error sampling preference pairs")]
    Sampler(#[from] SamplerError),
    #[error("error labeling preference pairs")]
    Label(#[from] LabelError),
    #[error("error loading preference batches")]
    Loader(#[from] LoaderError),
    #[error("error training reward model")]
    Train(#[from] TrainError),
    #[error("error saving or loading an archive")]
    SaveLoad(#[from] SerdeSaveLoadError),
    #[error("torch error")]
    Torch(#[from] tch::TchError),
    #[error("file error")]
    Io(#[from] std::io::Error),
}

//! Persistence of serializable values.
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Serialize to a file or load from a serialized file.
pub trait SaveLoad {
    type SaveErr;
    type LoadErr;

    /// Serialize to a file, creating missing parent directories.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Self::SaveErr>;

    /// Load from a file created by [`SaveLoad::save`].
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, Self::LoadErr>
    where
        Self: Sized;
}

#[derive(Debug, Error)]
pub enum SerdeSaveLoadError {
    #[error("file error {0}")]
    Io(#[from] std::io::Error),
    #[error("(de)serialization error {0}")]
    Serialize(#[from] serde_cbor::Error),
}

/// CBOR encoding for any serde type.
impl<T: Serialize + DeserializeOwned> SaveLoad for T {
    type SaveErr = SerdeSaveLoadError;
    type LoadErr = SerdeSaveLoadError;

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Self::SaveErr> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_cbor::to_writer(writer, self)?;
        Ok(())
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<Self, Self::LoadErr>
    where
        Self: Sized,
    {
        let reader = BufReader::new(File::open(path)?);
        let this = serde_cbor::from_reader(reader)?;
        Ok(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("values.cbor");
        vec![1_u32, 2, 3].save(&path).unwrap();
        let loaded: Vec<u32> = SaveLoad::load(&path).unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);
    }

    #[test]
    fn load_missing_is_io_error() {
        let dir = tempdir().unwrap();
        let result: Result<Vec<u32>, _> = SaveLoad::load(dir.path().join("missing.cbor"));
        assert!(matches!(result, Err(SerdeSaveLoadError::Io(_))));
    }
}
